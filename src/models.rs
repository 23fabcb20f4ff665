use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The RBAC field stored on every directory record. Serialized lowercase both
/// on the wire and in the `role` TEXT column. `Unset` covers records created
/// before the caller picked an account type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Buyer,
    Seller,
    Admin,
    #[default]
    Unset,
}

impl Role {
    /// Lowercase wire form, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Seller => "seller",
            Role::Admin => "admin",
            Role::Unset => "unset",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buyer" => Ok(Role::Buyer),
            "seller" => Ok(Role::Seller),
            "admin" => Ok(Role::Admin),
            "unset" => Ok(Role::Unset),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

// The `role` column is plain TEXT, so the sqlx mapping delegates to the
// builtin string type rather than declaring a database-side enum.
impl sqlx::Type<sqlx::Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for Role {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Role {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

/// User
///
/// A directory record. The email is the unique lookup key used by both the
/// credential issuer and the role guard; `verified` is meaningful only for
/// sellers and is flipped by the admin verify endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    // Unique directory key.
    pub email: String,
    pub role: Role,
    pub verified: bool,
}

/// Category
///
/// A browsable product category.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

/// Listing
///
/// A stored product record owned by a seller. `advertised` promotes the
/// listing onto the public advertised feed; `sold` is flipped when a buyer
/// books it and blocks any further advertising.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Listing {
    pub id: Uuid,
    pub category_id: Uuid,
    // The owning seller's directory key.
    pub seller_email: String,
    pub name: String,
    // Asking price and original retail price, in whole currency units.
    pub price: i64,
    pub original_price: i64,
    pub condition: String,
    pub location: String,
    pub description: Option<String>,
    pub advertised: bool,
    pub sold: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Booking
///
/// A buyer's claim on a listing. The item name and price are denormalized at
/// booking time so the record stays meaningful if the listing is later removed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Booking {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub buyer_email: String,
    pub item_name: String,
    pub price: i64,
    pub meeting_location: String,
    pub phone: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// CreateUserRequest
///
/// Input payload for saving a directory record (POST /users). Duplicate emails
/// are rejected without a write.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateUserRequest {
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

/// CreateListingRequest
///
/// Input payload for a seller submitting a new listing (POST /listings).
/// The seller identity is taken from the authenticated session, never from
/// this payload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateListingRequest {
    pub category_id: Uuid,
    pub name: String,
    pub price: i64,
    pub original_price: i64,
    pub condition: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// CreateBookingRequest
///
/// Input payload for a buyer booking a listing (POST /bookings).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateBookingRequest {
    pub listing_id: Uuid,
    pub meeting_location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

// --- Token Schemas ---

/// TokenResponse
///
/// Output of the credential issuer (GET /jwt). The `accessToken` casing is
/// part of the public contract; an empty string signals "no credential issued".
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TokenResponse {
    #[serde(rename = "accessToken")]
    #[ts(rename = "accessToken")]
    pub access_token: String,
}
