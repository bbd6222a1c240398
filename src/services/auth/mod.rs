pub mod custom;
pub mod detect;
pub mod engine;
pub mod factory;
pub mod request;
pub mod token_codec;
pub mod types;
pub mod verifiers;

pub use custom::{CustomValidator, CustomValidatorOverlay, RawRequest, validator_fn};
pub use detect::{AuthDetectionResult, detect};
pub use engine::MultiAuthEngine;
pub use factory::build_request_authenticator;
pub use request::{AccessDecision, AccessScope, RequestAuthenticator};
pub use token_codec::{TokenCodec, TokenError};
pub use types::{AuthErrorKind, AuthFailure, AuthIdentity, AuthMethod, AuthResult, Payload};
