/// Factory: build the per-process `RequestAuthenticator` from application `Config`.
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::services::auth::custom::{CustomValidator, CustomValidatorOverlay};
use crate::services::auth::engine::MultiAuthEngine;
use crate::services::auth::request::RequestAuthenticator;
use crate::services::catalog::{Catalog, PublicAccessClassifier};

/// The custom validator is injected here, never looked up from global state.
pub fn build_request_authenticator(
    config: &AuthConfig,
    catalog: Arc<dyn Catalog>,
    custom: Option<Arc<dyn CustomValidator>>,
) -> Arc<RequestAuthenticator> {
    let engine = MultiAuthEngine::from_config(config);
    let overlay = CustomValidatorOverlay::new(engine, custom);

    Arc::new(RequestAuthenticator::new(
        config.enabled,
        PublicAccessClassifier::new(catalog),
        overlay,
    ))
}
