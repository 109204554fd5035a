use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::GenerationConfig;
use crate::error::PipelineError;
use crate::store::{ArtifactKind, ObjectStore, Principal};
use crate::task::{TaskExecutor, TaskOutput, TaskPayload};

use super::extract::extract_fenced_xml;
use super::validate::{check_test_plan, TestPlanArtifact};

const PLAN_INSTRUCTIONS: &str = "Now generate a valid Apache JMeter .jmx test plan XML file based on the above description.
- It must be valid for Apache JMeter 5.6.3.
- Return XML in markdown code block using ```xml ... ```.
- Do not return explanations or comments outside the XML block.";

/// The user's description followed by the fixed output instructions.
pub fn build_prompt(description: &str) -> String {
    format!("{description}\n\n{PLAN_INSTRUCTIONS}")
}

/// A persisted, structurally valid test plan.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedPlan {
    pub filename: String,
    pub key: String,
    #[serde(flatten)]
    pub artifact: TestPlanArtifact,
}

pub struct PlanGenerator {
    executor: TaskExecutor,
    store: Arc<dyn ObjectStore>,
    cfg: GenerationConfig,
}

impl PlanGenerator {
    pub fn new(executor: TaskExecutor, store: Arc<dyn ObjectStore>, cfg: GenerationConfig) -> Self {
        Self {
            executor,
            store,
            cfg,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.cfg.max_attempts
    }

    /// Generate with the configured attempt bound and store the result under
    /// the principal's prefix.
    pub async fn generate(
        &self,
        principal: &Principal,
        description: &str,
    ) -> Result<GeneratedPlan, PipelineError> {
        self.generate_with_attempts(principal, description, self.cfg.max_attempts)
            .await
    }

    pub async fn generate_with_attempts(
        &self,
        principal: &Principal,
        description: &str,
        max_attempts: u32,
    ) -> Result<GeneratedPlan, PipelineError> {
        let artifact = self.produce_valid(description, max_attempts).await?;

        let filename = ArtifactKind::TestPlan.filename_now();
        let key = principal.key(&filename);
        self.store
            .put(&key, artifact.content.clone().into_bytes())
            .await?;

        tracing::info!(
            principal = %principal,
            key = %key,
            attempts = artifact.attempt_count,
            "test plan stored"
        );

        Ok(GeneratedPlan {
            filename,
            key,
            artifact,
        })
    }

    /// Ask the model until a response passes the structural check, at most
    /// `max_attempts` times. Model failures abort immediately; only invalid
    /// output is retried.
    pub async fn produce_valid(
        &self,
        description: &str,
        max_attempts: u32,
    ) -> Result<TestPlanArtifact, PipelineError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(PipelineError::InvalidRequest(
                "test plan description is empty".into(),
            ));
        }

        let prompt = build_prompt(description);
        let wait = Duration::from_secs(self.cfg.wait_secs);

        for attempt in 1..=max_attempts {
            let response = self
                .executor
                .submit(TaskPayload::GenerateText {
                    prompt: prompt.clone(),
                })?
                .wait(wait)
                .await
                .and_then(TaskOutput::into_text)?;

            let content = extract_fenced_xml(&response);
            match check_test_plan(&content) {
                Ok(()) => {
                    tracing::info!(attempt, max_attempts, "model produced a valid test plan");
                    return Ok(TestPlanArtifact {
                        content,
                        attempt_count: attempt,
                    });
                }
                Err(defect) => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        defect = %defect,
                        "model output rejected"
                    );
                }
            }
        }

        Err(PipelineError::GenerationExhausted {
            attempts: max_attempts,
        })
    }
}
