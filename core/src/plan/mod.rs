//! Test-plan generation: prompt → model → fenced XML → structural check → store.

mod extract;
mod generator;
mod validate;

pub use extract::extract_fenced_xml;
pub use generator::{build_prompt, GeneratedPlan, PlanGenerator};
pub use validate::{
    check_test_plan, is_valid_test_plan, Defect, TestPlanArtifact, REQUIRED_ELEMENTS,
    ROOT_ELEMENT,
};
