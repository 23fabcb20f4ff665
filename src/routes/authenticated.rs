use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Authenticated Router Module
///
/// Routes for any caller holding a valid access token. The token-verification
/// middleware on this router establishes identity only; the buyer/seller
/// handlers below apply the parameterized role guard themselves, since the
/// required role differs per route.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // The caller's own directory record.
        .route("/me", get(handlers::get_me))
        // GET /categories/{id}/listings
        // Unsold listings in a category. Login required, any role accepted.
        .route(
            "/categories/{id}/listings",
            get(handlers::get_category_listings),
        )
        // --- Seller routes ---
        // POST /listings
        // Submits a new listing under the caller's seller identity.
        .route("/listings", post(handlers::create_listing))
        // GET /listings/mine
        // All of the caller's listings, sold or not.
        .route("/listings/mine", get(handlers::get_my_listings))
        // DELETE /listings/{id}
        // Owner-only removal of a listing.
        .route("/listings/{id}", delete(handlers::delete_listing))
        // PUT /listings/{id}/advertise
        // Promotes an unsold listing onto the advertised feed. Sold listings
        // report 409.
        .route(
            "/listings/{id}/advertise",
            put(handlers::advertise_listing),
        )
        // --- Buyer routes ---
        // POST /bookings
        // Books a listing and marks it sold.
        .route("/bookings", post(handlers::create_booking))
        // GET /bookings/mine
        // The caller's bookings.
        .route("/bookings/mine", get(handlers::get_my_bookings))
}
