use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, put},
};

/// Admin Router Module
///
/// Routes exclusively for users whose directory record carries the `admin`
/// role. Every handler here authenticates via the `AuthUser` extractor and
/// then applies the role guard with `Role::Admin` before touching the store.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/users?role=seller|buyer
        // Lists directory records by role for the moderation dashboard.
        .route("/users", get(handlers::get_users_by_role))
        // PUT /admin/sellers/{id}/verify
        // Flips the `verified` flag on a seller record.
        .route("/sellers/{id}/verify", put(handlers::verify_seller))
        // DELETE /admin/users/{id}
        // The external admin deletion operation; nothing else deletes users.
        .route("/users/{id}", delete(handlers::delete_user))
}
