use listing_mart::{
    error::ErrorBody,
    models::{CreateUserRequest, Role, TokenResponse, User},
};
use serde_json::json;
use sqlx::{Postgres, Type, TypeInfo};

#[test]
fn role_serializes_lowercase() {
    assert_eq!(serde_json::to_value(Role::Buyer).unwrap(), json!("buyer"));
    assert_eq!(serde_json::to_value(Role::Seller).unwrap(), json!("seller"));
    assert_eq!(serde_json::to_value(Role::Admin).unwrap(), json!("admin"));
    assert_eq!(serde_json::to_value(Role::Unset).unwrap(), json!("unset"));

    let parsed: Role = serde_json::from_value(json!("seller")).unwrap();
    assert_eq!(parsed, Role::Seller);
    assert_eq!(parsed.as_str(), "seller");
}

#[test]
fn role_maps_to_the_builtin_text_column_type() {
    // The users table stores role as plain TEXT; a custom database-side enum
    // type would make every role bind and decode fail at runtime.
    let info = <Role as Type<Postgres>>::type_info();
    assert_eq!(info.name(), "TEXT");
    assert!(<Role as Type<Postgres>>::compatible(
        &<String as Type<Postgres>>::type_info()
    ));
}

#[test]
fn role_round_trips_through_its_text_form() {
    for role in [Role::Buyer, Role::Seller, Role::Admin, Role::Unset] {
        assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
    }
    assert!("moderator".parse::<Role>().is_err());
}

#[test]
fn token_response_uses_the_access_token_casing() {
    let body = TokenResponse {
        access_token: "abc".to_string(),
    };
    let value = serde_json::to_value(&body).unwrap();
    assert_eq!(value, json!({ "accessToken": "abc" }));
}

#[test]
fn create_user_request_defaults_to_the_unset_role() {
    let req: CreateUserRequest =
        serde_json::from_value(json!({ "email": "new@x.com" })).unwrap();
    assert_eq!(req.role, Role::Unset);
}

#[test]
fn user_serializes_with_role_and_verified_flag() {
    let user = User {
        role: Role::Seller,
        email: "s@x.com".to_string(),
        ..User::default()
    };
    let value = serde_json::to_value(&user).unwrap();
    assert_eq!(value["role"], "seller");
    assert_eq!(value["verified"], false);
}

#[test]
fn error_envelope_carries_kind_and_message() {
    let body = ErrorBody {
        kind: "conflict",
        message: "user already exists".to_string(),
    };
    let value = serde_json::to_value(&body).unwrap();
    assert_eq!(value, json!({ "kind": "conflict", "message": "user already exists" }));
}
