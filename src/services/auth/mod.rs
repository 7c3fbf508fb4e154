pub mod clock;
pub mod factory;
pub mod jwks;
pub mod token_verifier;

pub use factory::build_token_verifier;
pub use token_verifier::{AuthError, TokenVerifier, VerifiedIdentity};
