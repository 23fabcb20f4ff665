/// Router Module Index
///
/// Organizes the application's routing into security-segregated modules so
/// access control is applied explicitly at the module level via Axum layers.

/// Routes accessible to all clients: category browsing, the advertised feed,
/// user registration, and the credential issuer.
pub mod public;

/// Routes protected by the token-verification stage. Role checks happen
/// inside the handlers via the parameterized guard.
pub mod authenticated;

/// Routes restricted to users with the `admin` role, nested under /admin.
pub mod admin;
