pub mod auth;

pub use auth::{AuthError, AuthGate, Identity, require_identity};
