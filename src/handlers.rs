use crate::{
    AppState,
    auth::{AuthUser, issue_token, require_role},
    error::{ApiError, ErrorBody},
    repository::DirectoryError,
    models::{
        Booking, Category, CreateBookingRequest, CreateListingRequest, CreateUserRequest, Listing,
        Role, TokenResponse, User,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

// --- Filter Structs ---

/// TokenQuery
///
/// Query parameters for the credential issuer endpoint (GET /jwt).
#[derive(Deserialize, utoipa::IntoParams)]
pub struct TokenQuery {
    /// The email to issue a credential for.
    pub email: String,
}

/// RoleFilter
///
/// Query parameters for the admin user listing (GET /admin/users).
#[derive(Deserialize, utoipa::IntoParams)]
pub struct RoleFilter {
    /// The role to list users for (typically `seller` or `buyer`).
    pub role: Role,
}

// --- Public Handlers ---

/// get_categories
///
/// [Public Route] Lists all product categories.
#[utoipa::path(
    get,
    path = "/categories",
    responses((status = 200, description = "All categories", body = [Category]))
)]
pub async fn get_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    let categories = state.repo.list_categories().await?;
    Ok(Json(categories))
}

/// get_advertised_listings
///
/// [Public Route] Lists every advertised listing that has not yet been sold.
#[utoipa::path(
    get,
    path = "/listings/advertised",
    responses((status = 200, description = "Advertised listings", body = [Listing]))
)]
pub async fn get_advertised_listings(
    State(state): State<AppState>,
) -> Result<Json<Vec<Listing>>, ApiError> {
    let listings = state.repo.advertised_listings().await?;
    Ok(Json(listings))
}

/// create_user
///
/// [Public Route] Saves a directory record for a new user.
///
/// *Idempotency*: if the email already has a record, no write is performed and
/// the request fails with 409 Conflict rather than overwriting.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = User),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    if state.repo.find_user(&payload.email).await?.is_some() {
        return Err(ApiError::Conflict("user already exists"));
    }

    let user = User {
        id: Uuid::new_v4(),
        email: payload.email,
        role: payload.role,
        // Sellers start unverified; an admin flips this later.
        verified: false,
    };
    let created = match state.repo.create_user(user).await {
        Ok(created) => created,
        // Covers the window between the pre-check and the insert: a racing
        // registration for the same email is a conflict, not a server error.
        Err(DirectoryError::Duplicate) => return Err(ApiError::Conflict("user already exists")),
        Err(e) => return Err(e.into()),
    };
    Ok((StatusCode::CREATED, Json(created)))
}

/// issue_jwt
///
/// [Public Route] The credential issuer: exchanges a known email for a signed
/// access token valid for 7 days.
///
/// An email without a directory record gets 403 and an empty `accessToken`,
/// which downstream guards will always refuse.
#[utoipa::path(
    get,
    path = "/jwt",
    params(TokenQuery),
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 403, description = "No directory record", body = TokenResponse)
    )
)]
pub async fn issue_jwt(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    match state.repo.find_user(&query.email).await? {
        Some(user) => {
            let token = issue_token(&user.email, &state.config.jwt_secret)?;
            Ok((
                StatusCode::OK,
                Json(TokenResponse {
                    access_token: token,
                }),
            ))
        }
        None => Ok((
            StatusCode::FORBIDDEN,
            Json(TokenResponse {
                access_token: String::new(),
            }),
        )),
    }
}

// --- Authenticated Handlers (any role) ---

/// get_me
///
/// [Authenticated Route] The caller's own directory record, resolved from the
/// verified token identity.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Profile", body = User),
        (status = 404, description = "Record deleted since issuance", body = ErrorBody)
    )
)]
pub async fn get_me(
    AuthUser { email }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .repo
        .find_user(&email)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(user))
}

/// get_category_listings
///
/// [Authenticated Route] Unsold listings within a category. Requires a login
/// but no particular role.
#[utoipa::path(
    get,
    path = "/categories/{id}/listings",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses((status = 200, description = "Listings in category", body = [Listing]))
)]
pub async fn get_category_listings(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
) -> Result<Json<Vec<Listing>>, ApiError> {
    let listings = state.repo.category_listings(category_id).await?;
    Ok(Json(listings))
}

// --- Seller Handlers ---

/// create_listing
///
/// [Seller Route] Submits a new listing. The seller identity comes from the
/// authenticated session, never from the payload.
#[utoipa::path(
    post,
    path = "/listings",
    request_body = CreateListingRequest,
    responses(
        (status = 201, description = "Created", body = Listing),
        (status = 403, description = "Caller is not a seller", body = ErrorBody)
    )
)]
pub async fn create_listing(
    AuthUser { email }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateListingRequest>,
) -> Result<(StatusCode, Json<Listing>), ApiError> {
    let seller = require_role(&state.repo, &email, Role::Seller).await?;

    let listing = Listing {
        id: Uuid::new_v4(),
        category_id: payload.category_id,
        seller_email: seller.email,
        name: payload.name,
        price: payload.price,
        original_price: payload.original_price,
        condition: payload.condition,
        location: payload.location,
        description: payload.description,
        advertised: false,
        sold: false,
        created_at: Utc::now(),
    };
    let created = state.repo.create_listing(listing).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// get_my_listings
///
/// [Seller Route] All listings owned by the caller, sold or not.
#[utoipa::path(
    get,
    path = "/listings/mine",
    responses((status = 200, description = "My listings", body = [Listing]))
)]
pub async fn get_my_listings(
    AuthUser { email }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Listing>>, ApiError> {
    let seller = require_role(&state.repo, &email, Role::Seller).await?;
    let listings = state.repo.listings_for_seller(&seller.email).await?;
    Ok(Json(listings))
}

/// delete_listing
///
/// [Seller Route] Removes one of the caller's own listings. A listing that is
/// absent or owned by someone else reports 404 either way.
#[utoipa::path(
    delete,
    path = "/listings/{id}",
    params(("id" = Uuid, Path, description = "Listing ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found or not owned", body = ErrorBody)
    )
)]
pub async fn delete_listing(
    AuthUser { email }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let seller = require_role(&state.repo, &email, Role::Seller).await?;
    if state.repo.delete_listing(id, &seller.email).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("listing"))
    }
}

/// advertise_listing
///
/// [Seller Route] Promotes one of the caller's listings onto the public
/// advertised feed. A listing that has already been sold can no longer be
/// advertised and reports 409.
#[utoipa::path(
    put,
    path = "/listings/{id}/advertise",
    params(("id" = Uuid, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Advertised", body = Listing),
        (status = 404, description = "Not found or not owned", body = ErrorBody),
        (status = 409, description = "Already sold", body = ErrorBody)
    )
)]
pub async fn advertise_listing(
    AuthUser { email }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Listing>, ApiError> {
    let seller = require_role(&state.repo, &email, Role::Seller).await?;

    let listing = state
        .repo
        .find_listing(id)
        .await?
        .ok_or(ApiError::NotFound("listing"))?;
    if listing.seller_email != seller.email {
        // Not the owner; indistinguishable from a missing listing.
        return Err(ApiError::NotFound("listing"));
    }
    if listing.sold {
        return Err(ApiError::Conflict("listing already sold"));
    }

    match state.repo.set_advertised(id, &seller.email).await? {
        Some(updated) => Ok(Json(updated)),
        // Sold out from under us between the read and the update.
        None => Err(ApiError::Conflict("listing already sold")),
    }
}

// --- Buyer Handlers ---

/// create_booking
///
/// [Buyer Route] Books a listing for the caller and marks it sold, taking it
/// off the category and advertised feeds.
#[utoipa::path(
    post,
    path = "/bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booked", body = Booking),
        (status = 404, description = "Unknown listing", body = ErrorBody),
        (status = 409, description = "Already booked", body = ErrorBody)
    )
)]
pub async fn create_booking(
    AuthUser { email }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    let buyer = require_role(&state.repo, &email, Role::Buyer).await?;

    let listing = state
        .repo
        .find_listing(payload.listing_id)
        .await?
        .ok_or(ApiError::NotFound("listing"))?;

    // mark_sold only flips an unsold row, so a concurrent double-booking
    // loses here even after the read above saw the listing available.
    if listing.sold || !state.repo.mark_sold(listing.id).await? {
        return Err(ApiError::Conflict("listing already booked"));
    }

    let booking = Booking {
        id: Uuid::new_v4(),
        listing_id: listing.id,
        buyer_email: buyer.email,
        item_name: listing.name,
        price: listing.price,
        meeting_location: payload.meeting_location,
        phone: payload.phone,
        created_at: Utc::now(),
    };
    // The sold flip and the booking insert are two separate writes. When the
    // insert fails, walk the flip back so the listing is not stranded as sold
    // with no booking behind it.
    let created = match state.repo.create_booking(booking).await {
        Ok(created) => created,
        Err(e) => {
            let _ = state.repo.unmark_sold(listing.id).await;
            return Err(e.into());
        }
    };
    Ok((StatusCode::CREATED, Json(created)))
}

/// get_my_bookings
///
/// [Buyer Route] The caller's bookings, newest first.
#[utoipa::path(
    get,
    path = "/bookings/mine",
    responses((status = 200, description = "My bookings", body = [Booking]))
)]
pub async fn get_my_bookings(
    AuthUser { email }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let buyer = require_role(&state.repo, &email, Role::Buyer).await?;
    let bookings = state.repo.bookings_for_buyer(&buyer.email).await?;
    Ok(Json(bookings))
}

// --- Admin Handlers ---

/// get_users_by_role
///
/// [Admin Route] Lists directory records by role. One parameterized endpoint
/// instead of twin /sellers and /buyers listings.
#[utoipa::path(
    get,
    path = "/admin/users",
    params(RoleFilter),
    responses((status = 200, description = "Users with the role", body = [User]))
)]
pub async fn get_users_by_role(
    AuthUser { email }: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<RoleFilter>,
) -> Result<Json<Vec<User>>, ApiError> {
    require_role(&state.repo, &email, Role::Admin).await?;
    let users = state.repo.users_by_role(filter.role).await?;
    Ok(Json(users))
}

/// verify_seller
///
/// [Admin Route] Marks a seller as verified. Ids that do not reference a
/// seller record report 404.
#[utoipa::path(
    put,
    path = "/admin/sellers/{id}/verify",
    params(("id" = Uuid, Path, description = "Seller's user ID")),
    responses(
        (status = 200, description = "Verified"),
        (status = 404, description = "No such seller", body = ErrorBody)
    )
)]
pub async fn verify_seller(
    AuthUser { email }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_role(&state.repo, &email, Role::Admin).await?;
    if state.repo.set_seller_verified(id).await? {
        Ok(StatusCode::OK)
    } else {
        Err(ApiError::NotFound("seller"))
    }
}

/// delete_user
///
/// [Admin Route] Removes a directory record. This is the external admin
/// deletion path; nothing else in the system deletes users.
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn delete_user(
    AuthUser { email }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_role(&state.repo, &email, Role::Admin).await?;
    if state.repo.delete_user(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("user"))
    }
}
