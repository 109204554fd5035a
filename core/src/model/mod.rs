//! Generative model boundary: prompt in, text out.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::PipelineError;
use crate::task::{TaskContext, TaskHandler, TaskOutput, TaskPayload};

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model request timed out: {0}")]
    Timeout(String),
    #[error("model request failed: {0}")]
    Request(String),
    #[error("model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model response could not be decoded: {0}")]
    Decode(String),
    #[error("model returned no text")]
    Empty,
}

/// Stateless text completion. No streaming, no structured output contract.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;
}

/// Serves `GenerateText` tasks.
pub struct TextGenerationHandler {
    client: Arc<dyn ModelClient>,
}

impl TextGenerationHandler {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TaskHandler for TextGenerationHandler {
    fn name(&self) -> &str {
        "text-generation"
    }

    async fn handle(
        &self,
        payload: TaskPayload,
        ctx: TaskContext,
    ) -> Result<TaskOutput, PipelineError> {
        let TaskPayload::GenerateText { prompt } = payload else {
            return Err(crate::task::unexpected_payload(self.name(), &payload));
        };

        tracing::debug!(
            task_id = %ctx.task_id,
            model = self.client.name(),
            prompt_chars = prompt.chars().count(),
            "calling model"
        );

        let text = self
            .client
            .complete(&prompt)
            .await
            .map_err(|e| PipelineError::Upstream(e.to_string()))?;
        Ok(TaskOutput::Text(text.trim().to_string()))
    }
}
