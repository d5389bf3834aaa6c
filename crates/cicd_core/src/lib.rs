//! # cicd_core
//!
//! Error taxonomy, configuration and error recovery for cicdgen.
//!
//! This crate provides the pieces of the generation pipeline that do not
//! depend on templates:
//!
//! - **Detection**: the read-only snapshot of what the README analyzer found
//! - **Errors**: the closed, stage-tagged [`GenerationError`] taxonomy and its aggregate
//! - **Config**: retry and fallback switches
//! - **Recovery**: retry with backoff, graceful degradation and partial generation
//!
//! # Example
//!
//! ```rust,no_run
//! use cicd_core::{ErrorRecovery, GenerationError, GenerationStage, PartialGenerationStage};
//!
//! # async fn run() -> Result<(), cicd_core::AggregateGenerationError> {
//! let recovery = ErrorRecovery::default();
//!
//! let result = recovery
//!     .attempt_partial_generation(vec![
//!         PartialGenerationStage::required(GenerationStage::TemplateLoading, || async {
//!             Ok("template")
//!         }),
//!         PartialGenerationStage::optional(GenerationStage::Optimization, || async {
//!             Err(GenerationError::optimization("no cache hints"))
//!         }),
//!     ])
//!     .await?;
//!
//! assert!(!result.is_usable);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod detection;
pub mod error;
pub mod recovery;

pub use config::{FallbackConfig, FallbackConfigUpdate, GenericTier, RetryConfig};
pub use detection::{
    DeploymentTarget, DetectionResult, FrameworkCategory, FrameworkInfo, LanguageInfo,
    PackageManagerInfo, ProjectMetadata,
};
pub use error::{
    AggregateGenerationError, ErrorCause, ErrorKind, ErrorLogRecord, GenerationError,
    GenerationResult, GenerationStage, PartialFailure,
};
pub use recovery::{
    ErrorRecovery, PartialGenerationResult, PartialGenerationStage, Recovered, StageFuture,
};
pub use tokio_util::sync::CancellationToken;
