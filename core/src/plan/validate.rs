use std::fmt;

use serde::Serialize;

pub const ROOT_ELEMENT: &str = "jmeterTestPlan";
pub const REQUIRED_ELEMENTS: [&str; 3] = ["TestPlan", "ThreadGroup", "HTTPSamplerProxy"];

/// Why a document failed the structural check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Defect {
    NotWellFormed(String),
    WrongRoot { found: String },
    MissingElement(&'static str),
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotWellFormed(e) => write!(f, "not well-formed XML: {e}"),
            Self::WrongRoot { found } => {
                write!(f, "root element is <{found}>, expected <{ROOT_ELEMENT}>")
            }
            Self::MissingElement(name) => write!(f, "missing <{name}> element"),
        }
    }
}

/// Shape check only: well-formed, right root, each required element present
/// at least once. Says nothing about whether the plan is useful.
pub fn check_test_plan(xml: &str) -> Result<(), Defect> {
    let doc = roxmltree::Document::parse(xml).map_err(|e| Defect::NotWellFormed(e.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != ROOT_ELEMENT {
        return Err(Defect::WrongRoot {
            found: root.tag_name().name().to_string(),
        });
    }

    for required in REQUIRED_ELEMENTS {
        let present = root
            .descendants()
            .any(|n| n.is_element() && n.tag_name().name() == required);
        if !present {
            return Err(Defect::MissingElement(required));
        }
    }
    Ok(())
}

pub fn is_valid_test_plan(xml: &str) -> bool {
    check_test_plan(xml).is_ok()
}

/// A generated test plan. Validity is re-derived on demand, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct TestPlanArtifact {
    pub content: String,
    pub attempt_count: u32,
}

impl TestPlanArtifact {
    pub fn is_valid(&self) -> bool {
        is_valid_test_plan(&self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::VALID_PLAN;

    #[test]
    fn accepts_plan_with_all_required_elements() {
        assert_eq!(check_test_plan(VALID_PLAN), Ok(()));
    }

    #[test]
    fn rejects_each_missing_element() {
        for required in REQUIRED_ELEMENTS {
            let open = format!("<{required} ");
            let close = format!("</{required}>");
            let stripped = VALID_PLAN
                .replace(&open, "<Removed ")
                .replace(&close, "</Removed>");
            assert_eq!(
                check_test_plan(&stripped),
                Err(Defect::MissingElement(required)),
                "expected {required} to be required"
            );
        }
    }

    #[test]
    fn attribute_mentions_do_not_count_as_elements() {
        let xml = r#"<jmeterTestPlan><hashTree testclass="TestPlan ThreadGroup HTTPSamplerProxy"/></jmeterTestPlan>"#;
        assert_eq!(
            check_test_plan(xml),
            Err(Defect::MissingElement("TestPlan"))
        );
    }

    #[test]
    fn rejects_wrong_root_and_malformed_xml() {
        let wrong_root = VALID_PLAN.replace("jmeterTestPlan", "testPlan");
        assert!(matches!(
            check_test_plan(&wrong_root),
            Err(Defect::WrongRoot { .. })
        ));
        assert!(matches!(
            check_test_plan("<jmeterTestPlan><TestPlan></jmeterTestPlan>"),
            Err(Defect::NotWellFormed(_))
        ));
        assert!(!is_valid_test_plan("not xml at all"));
    }

    #[test]
    fn artifact_validity_is_derived() {
        let mut artifact = TestPlanArtifact {
            content: VALID_PLAN.to_string(),
            attempt_count: 1,
        };
        assert!(artifact.is_valid());
        artifact.content.clear();
        assert!(!artifact.is_valid());
    }
}
