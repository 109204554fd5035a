mod common;

use std::sync::Arc;

use common::LOGIN_RESULTS;
use loadpilot_core::api::{ArtifactKind, JobStatus, MemoryObjectStore, ObjectStore, PipelineError, Principal};
use loadpilot_core::testing::{
    build_pipeline, fenced_xml, test_config, valid_plan_for, FakeRun, FakeRuntime, ScriptedModel,
};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn login_flow_end_to_end() {
    let work = tempfile::tempdir().unwrap();
    let cfg = test_config(work.path());
    let model = ScriptedModel::new(vec![
        Ok(format!("Here is the plan:\n{}", fenced_xml(&valid_plan_for("/api/login")))),
        Ok(r#"{"analysis": "```markdown\n## Login\nTwo requests failed with 401.\n```"}"#.into()),
    ]);
    let runtime = FakeRuntime::new(FakeRun {
        exit_code: 0,
        console: "Creating summariser <summary>\nsummary =     50 in 00:00:06 =    8.3/s Avg:   121 Err:     2 (4.00%)\n".into(),
        results: Some(LOGIN_RESULTS.into()),
        hang: false,
    });
    let store = Arc::new(MemoryObjectStore::new());
    let pipeline = build_pipeline(&cfg, model.clone(), runtime.clone(), store.clone());
    let principal = Principal::new("qa@example.com").unwrap();

    let e2e = pipeline
        .run_end_to_end(&principal, "a login flow hitting /api/login 50 times")
        .await
        .unwrap();

    assert_eq!(e2e.plan.artifact.attempt_count, 1);
    assert_eq!(e2e.run.job.status(), JobStatus::Succeeded);
    assert_eq!(e2e.run.outcome.exit_code, 0);
    assert!(e2e.run.outcome.summary.as_str().starts_with("summary =     50"));
    assert_eq!(runtime.removed().len(), 1);

    let rows = &e2e.report.source_metrics;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].label, "login");
    assert_eq!(rows[0].throughput, 50);
    assert_eq!(rows[0].avg_response_time_ms, 121.9);
    assert_eq!(rows[0].error_rate_pct, 4.0);
    assert_eq!(rows[0].concurrent_users, 10);
    assert_eq!(e2e.report.narrative_text, "## Login\nTwo requests failed with 401.");
    assert_eq!(model.calls(), 2);

    let stored = store.get(&e2e.report.key).await.unwrap();
    assert_eq!(String::from_utf8(stored).unwrap(), e2e.report.narrative_text);
    for kind in [ArtifactKind::TestPlan, ArtifactKind::RawResults, ArtifactKind::Report] {
        let names = pipeline.list_artifacts(&principal, kind).await.unwrap();
        assert_eq!(names.len(), 1, "{kind:?}");
    }
}

#[tokio::test]
async fn generation_stops_exactly_at_the_bound() {
    for bound in 1..=4u32 {
        let work = tempfile::tempdir().unwrap();
        let mut cfg = test_config(work.path());
        cfg.generation.max_attempts = bound;
        let model = ScriptedModel::new(vec![Ok(fenced_xml("<jmeterTestPlan><TestPlan/></jmeterTestPlan>"))]);
        let store = Arc::new(MemoryObjectStore::new());
        let pipeline = build_pipeline(
            &cfg,
            model.clone(),
            FakeRuntime::new(FakeRun::default()),
            store.clone(),
        );

        let err = pipeline
            .generate_plan(&Principal::new("p").unwrap(), "anything")
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::GenerationExhausted { attempts } if attempts == bound));
        assert_eq!(model.calls(), bound);
        assert!(store.is_empty());
    }
}

#[tokio::test]
async fn non_zero_exit_aborts_before_analysis() {
    let work = tempfile::tempdir().unwrap();
    let cfg = test_config(work.path());
    let model = ScriptedModel::new(vec![Ok(fenced_xml(&valid_plan_for("/api/login")))]);
    let runtime = FakeRuntime::new(FakeRun {
        exit_code: 1,
        console: "Error generating the report\n".into(),
        results: Some(LOGIN_RESULTS.into()),
        hang: false,
    });
    let store = Arc::new(MemoryObjectStore::new());
    let pipeline = build_pipeline(&cfg, model.clone(), runtime, store.clone());
    let principal = Principal::new("p").unwrap();

    let err = pipeline
        .run_end_to_end(&principal, "login flow")
        .await
        .unwrap_err();

    match err {
        PipelineError::SandboxFailure { exit_code, console, .. } => {
            assert_eq!(exit_code, Some(1));
            assert_eq!(console, "Error generating the report\n");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // Only the plan was stored; the model was never asked for a report.
    assert_eq!(model.calls(), 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn clean_exit_without_results_cannot_be_analyzed() {
    let work = tempfile::tempdir().unwrap();
    let cfg = test_config(work.path());
    let model = ScriptedModel::new(vec![Ok(fenced_xml(&valid_plan_for("/")))]);
    let store = Arc::new(MemoryObjectStore::new());
    let pipeline = build_pipeline(&cfg, model, FakeRuntime::new(FakeRun::default()), store);
    let principal = Principal::new("p").unwrap();

    let plan = pipeline.generate_plan(&principal, "smoke").await.unwrap();
    let run = pipeline.run_test(&principal, &plan.filename).await.unwrap();
    assert!(!run.outcome.results_present);
    assert_eq!(run.results_filename, None);
    assert_eq!(run.job.raw_result_key(), None);
    assert_eq!(run.outcome.summary.as_str(), "No summary found.");

    let err = pipeline.run_end_to_end(&principal, "smoke").await.unwrap_err();
    assert!(matches!(err, PipelineError::MalformedInput(_)));
}
