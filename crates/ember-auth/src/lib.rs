//! Session and credential lifecycle for the Ember app.
//!
//! This crate provides:
//! - [`SessionCoordinator`], the single owner of in-memory session state,
//!   orchestrating the auth gateway and credential store with rollback
//!   semantics on partial storage failures
//! - [`AuthGateway`], the contract for the backend auth endpoints, plus a
//!   REST implementation
//! - [`RefreshInterceptor`], which coalesces concurrent token refreshes
//!   triggered by authorization failures into a single attempt
//! - The [`AuthError`] taxonomy, tagged with the operation that provoked it

mod error;
mod gateway;
mod interceptor;
mod rest;
mod session;
#[cfg(test)]
mod test_support;

pub use error::{AuthError, AuthOperation, AuthResult};
pub use gateway::{AuthGateway, GatewayError, NewUserProfile, SessionPayload, User};
pub use interceptor::RefreshInterceptor;
pub use rest::RestAuthGateway;
pub use session::{DeviceRegistrar, SessionCoordinator, SessionState};
