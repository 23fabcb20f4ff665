use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, Validation, decode};
use listing_mart::{
    AppState,
    auth::{Claims, issue_token},
    config::{AppConfig, Env},
    create_router,
    models::{Category, Listing, Role, User},
    repository::{Directory, DirectoryState, InMemoryDirectory},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

// --- Test Harness ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

struct TestApp {
    router: Router,
    dir: Arc<InMemoryDirectory>,
}

/// Builds the full router over an in-memory directory, so every test runs the
/// real middleware stack without a network or database connection.
fn spawn_app() -> TestApp {
    let dir = Arc::new(InMemoryDirectory::new());

    let mut config = AppConfig::default();
    config.env = Env::Production;
    config.jwt_secret = TEST_JWT_SECRET.to_string();

    let state = AppState {
        repo: dir.clone() as DirectoryState,
        config,
    };

    TestApp {
        router: create_router(state),
        dir,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_auth(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn request_json(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn user(email: &str, role: Role) -> User {
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        role,
        verified: false,
    }
}

fn listing(category_id: Uuid, seller_email: &str, sold: bool) -> Listing {
    Listing {
        id: Uuid::new_v4(),
        category_id,
        seller_email: seller_email.to_string(),
        name: "ThinkPad X220".to_string(),
        price: 250,
        original_price: 900,
        condition: "good".to_string(),
        location: "Dhaka".to_string(),
        description: None,
        advertised: false,
        sold,
        created_at: Utc::now(),
    }
}

fn token_for(email: &str) -> String {
    issue_token(email, TEST_JWT_SECRET).unwrap()
}

// --- Public Surface ---

#[tokio::test]
async fn health_check_works() {
    let app = spawn_app();
    let response = app.router.clone().oneshot(get("/health")).await.unwrap();
    assert!(response.status().is_success());
}

#[tokio::test]
async fn categories_are_public() {
    let app = spawn_app();
    app.dir.seed_category(Category {
        id: Uuid::new_v4(),
        name: "Laptops".to_string(),
    });

    let (status, body) = app.send(get("/categories")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "Laptops");
}

// --- Credential Issuer ---

#[tokio::test]
async fn issuer_refuses_an_unknown_email() {
    let app = spawn_app();

    let (status, body) = app.send(get("/jwt?email=ghost@x.com")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["accessToken"], "");
}

#[tokio::test]
async fn issuer_signs_a_token_for_a_known_email() {
    let app = spawn_app();
    app.dir.seed_user(user("seller@x.com", Role::Seller));

    let (status, body) = app.send(get("/jwt?email=seller@x.com")).await;
    assert_eq!(status, StatusCode::OK);

    let token = body["accessToken"].as_str().unwrap();
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
        &Validation::default(),
    )
    .expect("issued token must verify within its validity window");
    assert_eq!(data.claims.sub, "seller@x.com");
}

// --- User Registration ---

#[tokio::test]
async fn duplicate_user_creation_performs_no_write() {
    let app = spawn_app();

    let payload = json!({ "email": "dup@x.com", "role": "buyer" });
    let (status, _) = app
        .send(request_json("POST", "/users", None, payload.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Second attempt reports the conflict and leaves the directory untouched.
    let (status, body) = app.send(request_json("POST", "/users", None, payload)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    let buyers = app.dir.users_by_role(Role::Buyer).await.unwrap();
    assert_eq!(buyers.len(), 1);
}

// --- Access Guard: token-verification stage ---

#[tokio::test]
async fn missing_token_is_unauthenticated() {
    let app = spawn_app();

    let (status, body) = app.send(get("/me")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthenticated");
}

#[tokio::test]
async fn garbage_token_is_rejected_before_the_role_check() {
    let app = spawn_app();
    app.dir.seed_user(user("admin@x.com", Role::Admin));

    let (status, body) = app
        .send(get_auth("/admin/users?role=seller", "garbage"))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    // invalid_credential, not forbidden: the request never reached the guard.
    assert_eq!(body["kind"], "invalid_credential");
    assert_eq!(body["message"], "forbidden access");
}

// --- Access Guard: role-check stage ---

#[tokio::test]
async fn seller_token_passes_seller_guard_and_fails_admin_guard() {
    let app = spawn_app();
    app.dir.seed_user(user("seller@x.com", Role::Seller));
    let token = token_for("seller@x.com");

    let (status, _) = app.send(get_auth("/listings/mine", &token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(get_auth("/admin/users?role=seller", &token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");
}

#[tokio::test]
async fn deleted_record_invalidates_an_otherwise_valid_token() {
    let app = spawn_app();
    let seller = user("gone@x.com", Role::Seller);
    let seller_id = seller.id;
    app.dir.seed_user(seller);
    let token = token_for("gone@x.com");

    app.dir.delete_user(seller_id).await.unwrap();

    // Signature and expiry still check out, but the role is re-derived from
    // the directory, which no longer has the record.
    let (status, body) = app.send(get_auth("/listings/mine", &token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");
}

// --- Seller Lifecycle ---

#[tokio::test]
async fn seller_creates_advertises_and_feeds_a_listing() {
    let app = spawn_app();
    app.dir.seed_user(user("seller@x.com", Role::Seller));
    let category_id = Uuid::new_v4();
    app.dir.seed_category(Category {
        id: category_id,
        name: "Laptops".to_string(),
    });
    let token = token_for("seller@x.com");

    let (status, created) = app
        .send(request_json(
            "POST",
            "/listings",
            Some(&token),
            json!({
                "category_id": category_id,
                "name": "ThinkPad T480",
                "price": 400,
                "original_price": 1200,
                "condition": "excellent",
                "location": "Chittagong"
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["seller_email"], "seller@x.com");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, advertised) = app
        .send(request_json(
            "PUT",
            &format!("/listings/{id}/advertise"),
            Some(&token),
            Value::Null,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(advertised["advertised"], true);

    // Now visible on the public advertised feed.
    let (status, feed) = app.send(get("/listings/advertised")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed.as_array().unwrap().len(), 1);
    assert_eq!(feed[0]["id"].as_str().unwrap(), id);
}

#[tokio::test]
async fn advertising_a_sold_listing_conflicts() {
    let app = spawn_app();
    app.dir.seed_user(user("seller@x.com", Role::Seller));
    let sold = listing(Uuid::new_v4(), "seller@x.com", true);
    let sold_id = sold.id;
    app.dir.seed_listing(sold);
    let token = token_for("seller@x.com");

    let (status, body) = app
        .send(request_json(
            "PUT",
            &format!("/listings/{sold_id}/advertise"),
            Some(&token),
            Value::Null,
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");
}

#[tokio::test]
async fn advertising_someone_elses_listing_reads_as_not_found() {
    let app = spawn_app();
    app.dir.seed_user(user("seller@x.com", Role::Seller));
    app.dir.seed_user(user("other@x.com", Role::Seller));
    let foreign = listing(Uuid::new_v4(), "other@x.com", false);
    let foreign_id = foreign.id;
    app.dir.seed_listing(foreign);
    let token = token_for("seller@x.com");

    let (status, body) = app
        .send(request_json(
            "PUT",
            &format!("/listings/{foreign_id}/advertise"),
            Some(&token),
            Value::Null,
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn seller_deletes_only_their_own_listing() {
    let app = spawn_app();
    app.dir.seed_user(user("seller@x.com", Role::Seller));
    let own = listing(Uuid::new_v4(), "seller@x.com", false);
    let own_id = own.id;
    app.dir.seed_listing(own);
    let token = token_for("seller@x.com");

    let (status, _) = app
        .send(request_json(
            "DELETE",
            &format!("/listings/{own_id}"),
            Some(&token),
            Value::Null,
        ))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(request_json(
            "DELETE",
            &format!("/listings/{own_id}"),
            Some(&token),
            Value::Null,
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// --- Buyer Lifecycle ---

#[tokio::test]
async fn booking_marks_the_listing_sold_and_double_booking_conflicts() {
    let app = spawn_app();
    app.dir.seed_user(user("buyer@x.com", Role::Buyer));
    app.dir.seed_user(user("rival@x.com", Role::Buyer));
    let category_id = Uuid::new_v4();
    let item = listing(category_id, "seller@x.com", false);
    let item_id = item.id;
    app.dir.seed_listing(item);

    let payload = json!({ "listing_id": item_id, "meeting_location": "Mirpur 10" });

    let token = token_for("buyer@x.com");
    let (status, booking) = app
        .send(request_json("POST", "/bookings", Some(&token), payload.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["buyer_email"], "buyer@x.com");
    assert_eq!(booking["item_name"], "ThinkPad X220");

    let stored = app.dir.find_listing(item_id).await.unwrap().unwrap();
    assert!(stored.sold);

    // The category feed only shows unsold stock.
    let viewer_token = token_for("buyer@x.com");
    let (status, feed) = app
        .send(get_auth(
            &format!("/categories/{category_id}/listings"),
            &viewer_token,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(feed.as_array().unwrap().is_empty());

    // A rival's booking of the same listing conflicts.
    let rival_token = token_for("rival@x.com");
    let (status, body) = app
        .send(request_json("POST", "/bookings", Some(&rival_token), payload))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");
}

#[tokio::test]
async fn failed_booking_write_releases_the_listing() {
    let app = spawn_app();
    app.dir.seed_user(user("buyer@x.com", Role::Buyer));
    let item = listing(Uuid::new_v4(), "seller@x.com", false);
    let item_id = item.id;
    app.dir.seed_listing(item);
    let token = token_for("buyer@x.com");

    let payload = json!({ "listing_id": item_id, "meeting_location": "Gulshan 1" });

    app.dir.fail_bookings(true);
    let (status, body) = app
        .send(request_json("POST", "/bookings", Some(&token), payload.clone()))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "internal");

    // The sold flip was walked back, so the listing is still on the market
    // and can be booked once the store recovers.
    let stored = app.dir.find_listing(item_id).await.unwrap().unwrap();
    assert!(!stored.sold);

    app.dir.fail_bookings(false);
    let (status, _) = app
        .send(request_json("POST", "/bookings", Some(&token), payload))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn sellers_cannot_book() {
    let app = spawn_app();
    app.dir.seed_user(user("seller@x.com", Role::Seller));
    let item = listing(Uuid::new_v4(), "someone@x.com", false);
    let item_id = item.id;
    app.dir.seed_listing(item);

    let token = token_for("seller@x.com");
    let (status, body) = app
        .send(request_json(
            "POST",
            "/bookings",
            Some(&token),
            json!({ "listing_id": item_id, "meeting_location": "Uttara" }),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "forbidden");
}

#[tokio::test]
async fn buyer_sees_their_own_bookings() {
    let app = spawn_app();
    app.dir.seed_user(user("buyer@x.com", Role::Buyer));
    let item = listing(Uuid::new_v4(), "seller@x.com", false);
    let item_id = item.id;
    app.dir.seed_listing(item);
    let token = token_for("buyer@x.com");

    let (status, _) = app
        .send(request_json(
            "POST",
            "/bookings",
            Some(&token),
            json!({ "listing_id": item_id, "meeting_location": "Banani", "phone": "01700000000" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, bookings) = app.send(get_auth("/bookings/mine", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bookings.as_array().unwrap().len(), 1);
    assert_eq!(bookings[0]["phone"], "01700000000");
}

// --- Admin Operations ---

#[tokio::test]
async fn admin_lists_verifies_and_deletes_users() {
    let app = spawn_app();
    app.dir.seed_user(user("admin@x.com", Role::Admin));
    let seller = user("seller@x.com", Role::Seller);
    let seller_id = seller.id;
    app.dir.seed_user(seller);
    let token = token_for("admin@x.com");

    let (status, sellers) = app.send(get_auth("/admin/users?role=seller", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sellers.as_array().unwrap().len(), 1);
    assert_eq!(sellers[0]["verified"], false);

    let (status, _) = app
        .send(request_json(
            "PUT",
            &format!("/admin/sellers/{seller_id}/verify"),
            Some(&token),
            Value::Null,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let stored = app.dir.find_user("seller@x.com").await.unwrap().unwrap();
    assert!(stored.verified);

    let (status, _) = app
        .send(request_json(
            "DELETE",
            &format!("/admin/users/{seller_id}"),
            Some(&token),
            Value::Null,
        ))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // With the record gone the issuer refuses the email again.
    let (status, body) = app.send(get("/jwt?email=seller@x.com")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["accessToken"], "");
}

#[tokio::test]
async fn verifying_a_buyer_as_seller_reads_as_not_found() {
    let app = spawn_app();
    app.dir.seed_user(user("admin@x.com", Role::Admin));
    let buyer = user("buyer@x.com", Role::Buyer);
    let buyer_id = buyer.id;
    app.dir.seed_user(buyer);
    let token = token_for("admin@x.com");

    let (status, body) = app
        .send(request_json(
            "PUT",
            &format!("/admin/sellers/{buyer_id}/verify"),
            Some(&token),
            Value::Null,
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}
