//! Error recovery for the generation pipeline.
//!
//! [`ErrorRecovery`] wraps fallible async operations:
//!
//! - **Retry** with exponential backoff, for recoverable errors on retry-eligible stages
//! - **Template fallback** over an ordered list of template names
//! - **Graceful degradation** to a fallback operation
//! - **Partial generation** over a list of required/optional stages
//! - **Safe execution** that trades an error for a default value
//!
//! All operations run their sub-operations sequentially.

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{FallbackConfig, FallbackConfigUpdate, RetryConfig};
use crate::error::{
    AggregateGenerationError, GenerationError, GenerationResult, GenerationStage, PartialFailure,
};

const COMPONENT: &str = "error-recovery";

/// A successful value together with the warnings collected while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered<T> {
    pub data: T,
    pub warnings: Vec<String>,
}

impl<T> Recovered<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Recovered<U> {
        Recovered {
            data: f(self.data),
            warnings: self.warnings,
        }
    }
}

/// Boxed future returned by a partial-generation stage.
pub type StageFuture<'a, T> = Pin<Box<dyn Future<Output = GenerationResult<T>> + Send + 'a>>;

type StageOperation<'a, T> = Box<dyn FnOnce() -> StageFuture<'a, T> + Send + 'a>;

/// A named pipeline stage for [`ErrorRecovery::attempt_partial_generation`].
pub struct PartialGenerationStage<'a, T> {
    pub name: GenerationStage,
    pub required: bool,
    operation: StageOperation<'a, T>,
}

impl<'a, T> PartialGenerationStage<'a, T> {
    pub fn new<F, Fut>(name: GenerationStage, required: bool, operation: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = GenerationResult<T>> + Send + 'a,
    {
        Self {
            name,
            required,
            operation: Box::new(move || Box::pin(operation())),
        }
    }

    pub fn required<F, Fut>(name: GenerationStage, operation: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = GenerationResult<T>> + Send + 'a,
    {
        Self::new(name, true, operation)
    }

    pub fn optional<F, Fut>(name: GenerationStage, operation: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = GenerationResult<T>> + Send + 'a,
    {
        Self::new(name, false, operation)
    }
}

impl<T> std::fmt::Debug for PartialGenerationStage<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartialGenerationStage")
            .field("name", &self.name)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

/// Outcome of a partial generation run that did not hit a required failure.
#[derive(Debug)]
pub struct PartialGenerationResult<T> {
    pub completed_stages: Vec<GenerationStage>,
    /// Output of every completed stage, in execution order
    pub outputs: Vec<(GenerationStage, T)>,
    pub errors: Vec<GenerationError>,
    pub warnings: Vec<String>,
    /// True iff no stage recorded an error
    pub is_usable: bool,
}

impl<T> PartialGenerationResult<T> {
    fn new() -> Self {
        Self {
            completed_stages: Vec::new(),
            outputs: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            is_usable: true,
        }
    }

    /// Output of a specific stage, if it completed.
    pub fn output(&self, stage: GenerationStage) -> Option<&T> {
        self.outputs
            .iter()
            .find(|(name, _)| *name == stage)
            .map(|(_, output)| output)
    }
}

/// Retry, fallback, degradation and partial-generation executor.
#[derive(Debug, Clone, Default)]
pub struct ErrorRecovery {
    retry: RetryConfig,
    fallback: FallbackConfig,
}

impl ErrorRecovery {
    pub fn new(retry: RetryConfig, fallback: FallbackConfig) -> Self {
        Self { retry, fallback }
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn fallback_config(&self) -> &FallbackConfig {
        &self.fallback
    }

    pub fn update_retry_config(&mut self, retry: RetryConfig) {
        self.retry = retry;
    }

    pub fn update_fallback_config(&mut self, update: FallbackConfigUpdate) {
        self.fallback.apply(update);
    }

    /// Run `operation`, retrying recoverable failures on retry-eligible stages.
    pub async fn with_retry<T, F, Fut>(
        &self,
        operation: F,
        stage: GenerationStage,
    ) -> GenerationResult<Recovered<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GenerationResult<T>>,
    {
        self.retry_loop(operation, stage, None).await
    }

    /// Like [`with_retry`](Self::with_retry), but stops waiting for the next
    /// attempt as soon as `cancel` fires. The last error is returned with a
    /// `cancelled` context entry.
    pub async fn with_retry_cancellable<T, F, Fut>(
        &self,
        operation: F,
        stage: GenerationStage,
        cancel: &CancellationToken,
    ) -> GenerationResult<Recovered<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GenerationResult<T>>,
    {
        self.retry_loop(operation, stage, Some(cancel)).await
    }

    async fn retry_loop<T, F, Fut>(
        &self,
        mut operation: F,
        stage: GenerationStage,
        cancel: Option<&CancellationToken>,
    ) -> GenerationResult<Recovered<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GenerationResult<T>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!("Attempt {}/{} for stage {}", attempt, max_attempts, stage);

            let err = match operation().await {
                Ok(data) => {
                    let mut recovered = Recovered::new(data);
                    if attempt > 1 {
                        info!("Stage {} succeeded after {} attempts", stage, attempt);
                        recovered = recovered
                            .with_warning(format!("Operation succeeded after {} attempts", attempt));
                    }
                    return Ok(recovered);
                }
                Err(err) => err,
            };

            if !err.recoverable() || !self.retry.is_retryable(stage) {
                debug!(
                    "Not retrying stage {} (recoverable={}): {}",
                    stage,
                    err.recoverable(),
                    err
                );
                return Err(err);
            }

            if attempt >= max_attempts {
                error!(
                    "Stage {} failed after {} attempts: {}",
                    stage, attempt, err
                );
                return Err(err);
            }

            let delay = self.retry.delay_for(attempt);
            warn!(
                "Attempt {}/{} for stage {} failed: {}; retrying in {:?}",
                attempt, max_attempts, stage, err, delay
            );

            match cancel {
                Some(token) => {
                    tokio::select! {
                        _ = token.cancelled() => {
                            warn!("Retry of stage {} cancelled after {} attempts", stage, attempt);
                            return Err(err.with_context("cancelled", true));
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => tokio::time::sleep(delay).await,
            }
        }
    }

    /// Try `primary`, then each of `fallbacks` in order, returning the first
    /// template `loader` produces.
    pub async fn with_template_fallback<T, I, F, Fut>(
        &self,
        primary: &str,
        fallbacks: I,
        mut loader: F,
    ) -> GenerationResult<Recovered<T>>
    where
        I: IntoIterator,
        I::Item: Into<String>,
        F: FnMut(String) -> Fut,
        Fut: Future<Output = GenerationResult<T>>,
    {
        let mut candidates = vec![primary.to_string()];
        if self.fallback.enable_template_fallback {
            candidates.extend(fallbacks.into_iter().map(Into::into));
        }

        let mut attempted = Vec::new();
        let mut last_error = None;

        for candidate in candidates {
            if attempted.contains(&candidate) {
                continue;
            }
            attempted.push(candidate.clone());

            match loader(candidate.clone()).await {
                Ok(data) => {
                    let mut recovered = Recovered::new(data);
                    if candidate != primary {
                        warn!("Using fallback template '{}' for '{}'", candidate, primary);
                        recovered = recovered.with_warning(format!(
                            "Used fallback template '{}' instead of '{}'",
                            candidate, primary
                        ));
                    }
                    return Ok(recovered);
                }
                Err(err) => {
                    debug!("Template '{}' failed: {}", candidate, err);
                    last_error = Some(err);
                }
            }
        }

        let mut err = GenerationError::template_load(format!(
            "All template candidates failed for '{}'",
            primary
        ))
        .with_code("TEMPLATE_FALLBACK_EXHAUSTED")
        .with_component(COMPONENT)
        .with_context("primary", primary)
        .with_context("attempted", &attempted);
        if let Some(cause) = last_error {
            err = err.with_cause(cause);
        }
        error!("{}", err);
        Err(err)
    }

    /// Run `primary`; if it fails, run `fallback` instead.
    pub async fn with_graceful_degradation<T, P, PFut, B, BFut>(
        &self,
        primary: P,
        fallback: B,
        stage: GenerationStage,
    ) -> GenerationResult<Recovered<T>>
    where
        P: FnOnce() -> PFut,
        PFut: Future<Output = GenerationResult<T>>,
        B: FnOnce() -> BFut,
        BFut: Future<Output = GenerationResult<T>>,
    {
        self.with_graceful_degradation_if(primary, fallback, stage, |_| true)
            .await
    }

    /// Run `primary`; if it fails and `condition` accepts the error, run
    /// `fallback` instead. Otherwise the primary error is returned.
    pub async fn with_graceful_degradation_if<T, P, PFut, B, BFut, C>(
        &self,
        primary: P,
        fallback: B,
        stage: GenerationStage,
        condition: C,
    ) -> GenerationResult<Recovered<T>>
    where
        P: FnOnce() -> PFut,
        PFut: Future<Output = GenerationResult<T>>,
        B: FnOnce() -> BFut,
        BFut: Future<Output = GenerationResult<T>>,
        C: FnOnce(&GenerationError) -> bool,
    {
        let primary_error = match primary().await {
            Ok(data) => return Ok(Recovered::new(data)),
            Err(err) => err,
        };

        if !condition(&primary_error) {
            debug!(
                "Degradation not applicable for stage {}: {}",
                stage, primary_error
            );
            return Err(primary_error);
        }

        warn!(
            "Primary operation for stage {} failed, degrading: {}",
            stage, primary_error
        );

        match fallback().await {
            Ok(data) => Ok(Recovered::new(data).with_warning(format!(
                "Used fallback operation due to {}",
                primary_error.message()
            ))),
            Err(fallback_error) => {
                error!(
                    "Fallback operation for stage {} also failed: {}",
                    stage, fallback_error
                );
                Err(primary_error)
            }
        }
    }

    /// Run `stages` in order, tolerating failures of optional stages.
    pub async fn attempt_partial_generation<'a, T>(
        &self,
        stages: Vec<PartialGenerationStage<'a, T>>,
    ) -> Result<PartialGenerationResult<T>, AggregateGenerationError> {
        if !self.fallback.enable_partial_generation {
            return self.run_all_or_nothing(stages).await;
        }

        let total = stages.len();
        let mut result = PartialGenerationResult::new();

        for (i, stage) in stages.into_iter().enumerate() {
            let PartialGenerationStage {
                name,
                required,
                operation,
            } = stage;
            info!(
                "Running stage [{}/{}]: {}{}",
                i + 1,
                total,
                name,
                if required { "" } else { " (optional)" }
            );

            match operation().await {
                Ok(output) => {
                    result.completed_stages.push(name);
                    result.outputs.push((name, output));
                }
                Err(err) if required => {
                    error!("Required stage '{}' failed: {}", name, err);
                    let mut warnings = result.warnings;
                    warnings.push(format!(
                        "Required stage '{}' failed: {}",
                        name,
                        err.message()
                    ));
                    let partial = PartialFailure {
                        completed_stages: result.completed_stages,
                        failed_stage: name,
                        warnings,
                    };
                    let mut errors = result.errors;
                    errors.push(err);
                    return Err(AggregateGenerationError::new(errors).with_partial(partial));
                }
                Err(err) => {
                    warn!("Optional stage '{}' failed: {}", name, err);
                    result
                        .warnings
                        .push(format!("Optional stage '{}' failed: {}", name, err.message()));
                    result.errors.push(err);
                }
            }
        }

        result.is_usable = result.errors.is_empty();
        info!(
            "Partial generation finished: {} completed, {} error(s)",
            result.completed_stages.len(),
            result.errors.len()
        );
        Ok(result)
    }

    async fn run_all_or_nothing<'a, T>(
        &self,
        stages: Vec<PartialGenerationStage<'a, T>>,
    ) -> Result<PartialGenerationResult<T>, AggregateGenerationError> {
        if stages.is_empty() {
            return Err(AggregateGenerationError::default());
        }

        let mut result = PartialGenerationResult::new();
        for stage in stages {
            let name = stage.name;
            match (stage.operation)().await {
                Ok(output) => {
                    result.completed_stages.push(name);
                    result.outputs.push((name, output));
                }
                Err(err) => {
                    error!("Stage '{}' failed with partial generation disabled: {}", name, err);
                    return Err(AggregateGenerationError::from(err));
                }
            }
        }
        Ok(result)
    }

    /// Run `operation`, returning `default` if it fails.
    pub async fn safely<T, F, Fut>(&self, operation: F, default: T, stage: GenerationStage) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GenerationResult<T>>,
    {
        self.safely_with(operation, default, stage, |_| {}).await
    }

    /// Run `operation`, handing any error to `on_error` and returning `default`.
    pub async fn safely_with<T, F, Fut, E>(
        &self,
        operation: F,
        default: T,
        stage: GenerationStage,
        on_error: E,
    ) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GenerationResult<T>>,
        E: FnOnce(&GenerationError),
    {
        match operation().await {
            Ok(value) => value,
            Err(err) => {
                warn!("Stage {} failed, using default value: {}", stage, err);
                on_error(&err);
                default
            }
        }
    }

    /// Return `value` if `predicate` accepts it, otherwise a validation error.
    pub fn validate_input<T>(
        &self,
        value: T,
        predicate: impl FnOnce(&T) -> bool,
        message: impl Into<String>,
        stage: GenerationStage,
    ) -> GenerationResult<T> {
        if predicate(&value) {
            Ok(value)
        } else {
            Err(GenerationError::workflow_validation(message)
                .with_code("INPUT_VALIDATION_FAILED")
                .with_component(COMPONENT)
                .with_stage(stage))
        }
    }
}
