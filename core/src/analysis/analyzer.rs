use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::error::PipelineError;
use crate::store::{ArtifactKind, ObjectStore, Principal};
use crate::task::{TaskExecutor, TaskOutput, TaskPayload};

use super::aggregate::{aggregate, AggregatedMetrics};
use super::narrate::{build_analysis_prompt, render_bullets};
use super::normalize::normalize;
use super::parse::parse_records;

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub narrative_text: String,
    pub source_metrics: Vec<AggregatedMetrics>,
    pub filename: String,
    pub key: String,
}

pub struct ResultAnalyzer {
    executor: TaskExecutor,
    store: Arc<dyn ObjectStore>,
    cfg: AnalysisConfig,
}

impl ResultAnalyzer {
    pub fn new(executor: TaskExecutor, store: Arc<dyn ObjectStore>, cfg: AnalysisConfig) -> Self {
        Self {
            executor,
            store,
            cfg,
        }
    }

    /// Analyze a stored `.jtl` belonging to `principal`.
    pub async fn analyze(
        &self,
        principal: &Principal,
        results_filename: &str,
    ) -> Result<AnalysisReport, PipelineError> {
        ArtifactKind::RawResults.check_filename(results_filename)?;
        let key = principal.key(results_filename);
        let data = self.store.get(&key).await?;
        tracing::debug!(principal = %principal, key = %key, bytes = data.len(), "analyzing raw results");
        self.analyze_bytes(principal, &data).await
    }

    /// Parse and aggregate before any model call; nothing is written unless
    /// the narrative comes back.
    pub async fn analyze_bytes(
        &self,
        principal: &Principal,
        data: &[u8],
    ) -> Result<AnalysisReport, PipelineError> {
        let records = parse_records(data)?;
        let rows = aggregate(&records)?;
        let narrative_text = self.narrate(&rows).await?;

        let filename = ArtifactKind::Report.filename_now();
        let key = principal.key(&filename);
        self.store
            .put(&key, narrative_text.clone().into_bytes())
            .await?;

        tracing::info!(
            principal = %principal,
            key = %key,
            records = records.len(),
            labels = rows.len(),
            "analysis report stored"
        );

        Ok(AnalysisReport {
            narrative_text,
            source_metrics: rows,
            filename,
            key,
        })
    }

    pub async fn narrate(&self, rows: &[AggregatedMetrics]) -> Result<String, PipelineError> {
        let prompt = build_analysis_prompt(&render_bullets(rows));
        let raw = self
            .executor
            .submit(TaskPayload::GenerateText { prompt })?
            .wait(Duration::from_secs(self.cfg.wait_secs))
            .await
            .and_then(TaskOutput::into_text)?;
        Ok(normalize(raw))
    }
}
