//! Combines the built-in engine with an optional, externally supplied validator.
//!
//! | standard methods | standard result | custom validator | outcome                          |
//! |------------------|-----------------|------------------|----------------------------------|
//! | configured       | success         | present          | both must pass, fields merged    |
//! | configured       | success         | absent           | standard result                  |
//! | configured       | failure         | present          | custom result (fallback)         |
//! | configured       | failure         | absent           | standard failure                 |
//! | none             | -               | present          | custom result                    |
//! | none             | -               | absent           | `NoMethodsConfigured`            |
//!
//! The two checks run one after the other, never concurrently.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri};
use tracing::debug;

use crate::services::auth::detect::AuthDetectionResult;
use crate::services::auth::engine::MultiAuthEngine;
use crate::services::auth::types::{AuthFailure, AuthResult};

/// What a custom validator gets to look at.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Externally injected authentication hook.
#[async_trait]
pub trait CustomValidator: Send + Sync {
    async fn validate(&self, request: &RawRequest) -> AuthResult;
}

/// Adapts a plain function into a [`CustomValidator`].
pub struct FnValidator<F>(pub F);

#[async_trait]
impl<F> CustomValidator for FnValidator<F>
where
    F: Fn(&RawRequest) -> AuthResult + Send + Sync,
{
    async fn validate(&self, request: &RawRequest) -> AuthResult {
        (self.0)(request)
    }
}

pub fn validator_fn<F>(f: F) -> Arc<dyn CustomValidator>
where
    F: Fn(&RawRequest) -> AuthResult + Send + Sync + 'static,
{
    Arc::new(FnValidator(f))
}

pub struct CustomValidatorOverlay {
    engine: MultiAuthEngine,
    custom: Option<Arc<dyn CustomValidator>>,
}

impl fmt::Debug for CustomValidatorOverlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomValidatorOverlay")
            .field("engine", &self.engine)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

impl CustomValidatorOverlay {
    pub fn new(engine: MultiAuthEngine, custom: Option<Arc<dyn CustomValidator>>) -> Self {
        Self { engine, custom }
    }

    pub fn detection(&self) -> &AuthDetectionResult {
        self.engine.detection()
    }

    pub fn has_custom_validator(&self) -> bool {
        self.custom.is_some()
    }

    pub async fn authenticate(&self, credential: &str, request: &RawRequest) -> AuthResult {
        let custom = self.custom.as_ref();

        if !self.engine.has_methods() {
            return match custom {
                Some(custom) => custom.validate(request).await,
                None => Err(AuthFailure::no_methods_configured()),
            };
        }

        match self.engine.authenticate(credential) {
            Ok(standard) => match custom {
                None => Ok(standard),
                Some(custom) => {
                    let refined = custom.validate(request).await?;
                    Ok(standard.merged_with(refined))
                }
            },
            Err(failure) => match custom {
                Some(custom) => {
                    debug!(kind = ?failure.kind, "standard auth failed, deferring to custom validator");
                    custom.validate(request).await
                }
                None => Err(failure),
            },
        }
    }
}
