use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that are unauthenticated and accessible to any client. Data
/// retrieval here is limited to categories and the advertised feed; everything
/// else behind these routes is the identity gateway (registration + issuer).
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated liveness probe for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /categories
        // Lists every product category for the browse page.
        .route("/categories", get(handlers::get_categories))
        // GET /listings/advertised
        // The promoted-listings feed: advertised and not yet sold.
        .route(
            "/listings/advertised",
            get(handlers::get_advertised_listings),
        )
        // POST /users
        // Saves a directory record for a new user. Duplicate emails are
        // rejected with 409 and no write.
        .route("/users", post(handlers::create_user))
        // GET /jwt?email=...
        // The credential issuer: a known email gets a 7-day access token,
        // an unknown one gets 403 and an empty token.
        .route("/jwt", get(handlers::issue_jwt))
}
