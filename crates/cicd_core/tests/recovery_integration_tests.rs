//! Integration tests for the error-recovery layer.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cicd_core::{
    DetectionResult, ErrorKind, ErrorRecovery, FallbackConfig, GenerationError, GenerationStage,
    PartialGenerationStage, RetryConfig,
};
use tempfile::tempdir;

fn fast_recovery() -> ErrorRecovery {
    ErrorRecovery::new(
        RetryConfig::new()
            .max_attempts(4)
            .base_delay(Duration::from_millis(1)),
        FallbackConfig::default(),
    )
}

#[tokio::test]
async fn test_pipeline_with_retry_and_degradation() {
    let recovery = fast_recovery();
    let loads = AtomicUsize::new(0);
    let recovery_ref = &recovery;
    let loads_ref = &loads;

    let result = recovery
        .attempt_partial_generation(vec![
            PartialGenerationStage::required(GenerationStage::TemplateLoading, move || async move {
                recovery_ref
                    .with_retry(
                        move || async move {
                            if loads_ref.fetch_add(1, Ordering::SeqCst) < 2 {
                                Err(GenerationError::template_load("store busy"))
                            } else {
                                Ok("template".to_string())
                            }
                        },
                        GenerationStage::TemplateLoading,
                    )
                    .await
                    .map(|r| r.data)
            }),
            PartialGenerationStage::optional(GenerationStage::Optimization, move || async move {
                recovery_ref
                    .with_graceful_degradation(
                        || async { Err(GenerationError::optimization("no cache hints")) },
                        || async { Ok("unoptimized".to_string()) },
                        GenerationStage::Optimization,
                    )
                    .await
                    .map(|r| r.data)
            }),
            PartialGenerationStage::optional(GenerationStage::Rendering, || async {
                Err(GenerationError::rendering("serializer crashed"))
            }),
        ])
        .await
        .unwrap();

    assert_eq!(loads.load(Ordering::SeqCst), 3);
    assert_eq!(
        result.completed_stages,
        vec![GenerationStage::TemplateLoading, GenerationStage::Optimization]
    );
    assert_eq!(result.output(GenerationStage::Optimization).unwrap(), "unoptimized");
    assert_eq!(result.errors.len(), 1);
    assert!(!result.errors[0].recoverable());
    assert!(!result.is_usable);
}

#[tokio::test]
async fn test_required_failure_aggregate() {
    let recovery = fast_recovery();
    let third_ran = AtomicUsize::new(0);
    let third_ran_ref = &third_ran;

    let err = recovery
        .attempt_partial_generation(vec![
            PartialGenerationStage::required(GenerationStage::Initialization, || async { Ok(()) }),
            PartialGenerationStage::required(GenerationStage::StepGeneration, || async {
                Err(GenerationError::step_generation("unknown package manager")
                    .with_component("step-generator"))
            }),
            PartialGenerationStage::required(GenerationStage::Output, move || async move {
                third_ran_ref.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        ])
        .await
        .unwrap_err();

    assert_eq!(third_ran.load(Ordering::SeqCst), 0);
    let partial = err.partial().unwrap();
    assert_eq!(partial.completed_stages, vec![GenerationStage::Initialization]);
    assert_eq!(partial.failed_stage, GenerationStage::StepGeneration);

    let by_stage = err.errors_by_stage();
    assert_eq!(by_stage[&GenerationStage::StepGeneration].len(), 1);
    assert_eq!(err.recoverable_errors().len(), 1);
    assert!(err.critical_errors().is_empty());

    let record = err.errors()[0].to_log_format();
    assert_eq!(record.component, "step-generator");
    assert_eq!(record.kind, ErrorKind::StepGeneration);
}

#[tokio::test]
async fn test_detection_file_round_trip() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("detection.json");
    fs::write(
        &path,
        r#"{
            "frameworks": [
                {"name": "Django", "confidence": 0.8, "category": "backend"},
                {"name": "React", "confidence": 0.9, "category": "frontend"}
            ],
            "languages": [{"name": "Python", "version": "3.12", "primary": true}]
        }"#,
    )
    .unwrap();

    let detection = DetectionResult::from_file(&path).await.unwrap();
    assert_eq!(detection.top_framework().unwrap().name, "React");
    assert_eq!(detection.primary_language().unwrap().version.as_deref(), Some("3.12"));

    let err = DetectionResult::from_file(&temp.path().join("missing.yaml"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FrameworkData);
}
