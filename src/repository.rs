use crate::models::{Booking, Category, Listing, Role, User};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// DirectoryError
///
/// Failure talking to the external store. Never retried here; the request that
/// hit it surfaces a generic server error and retry policy stays with the
/// store client.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// An insert collided with an existing record on a unique key.
    #[error("duplicate key")]
    Duplicate,
    /// The store refused the write outright.
    #[error("store unavailable")]
    Unavailable,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Directory Trait
///
/// The abstract contract for the keyed document store the application depends
/// on. Nothing here assumes query capability beyond exact-match lookup by
/// email or record id, plus insert and single-field update.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Directory>`) safely shareable across Axum's task boundaries.
#[async_trait]
pub trait Directory: Send + Sync {
    // --- User records ---
    /// Exact-match lookup by the unique email key.
    async fn find_user(&self, email: &str) -> Result<Option<User>, DirectoryError>;
    async fn create_user(&self, user: User) -> Result<User, DirectoryError>;
    async fn users_by_role(&self, role: Role) -> Result<Vec<User>, DirectoryError>;
    /// Flips `verified` on a seller record. Returns false when the id does not
    /// reference a seller.
    async fn set_seller_verified(&self, id: Uuid) -> Result<bool, DirectoryError>;
    async fn delete_user(&self, id: Uuid) -> Result<bool, DirectoryError>;

    // --- Categories ---
    async fn list_categories(&self) -> Result<Vec<Category>, DirectoryError>;
    /// Unsold listings in a category, newest first.
    async fn category_listings(&self, category_id: Uuid) -> Result<Vec<Listing>, DirectoryError>;

    // --- Listings ---
    async fn create_listing(&self, listing: Listing) -> Result<Listing, DirectoryError>;
    async fn listings_for_seller(
        &self,
        seller_email: &str,
    ) -> Result<Vec<Listing>, DirectoryError>;
    async fn find_listing(&self, id: Uuid) -> Result<Option<Listing>, DirectoryError>;
    /// Owner-only delete: removes the listing only when `seller_email` matches.
    async fn delete_listing(&self, id: Uuid, seller_email: &str) -> Result<bool, DirectoryError>;
    /// Owner-only advertise: flips `advertised` on an unsold listing and
    /// returns the updated record, or None when nothing matched.
    async fn set_advertised(
        &self,
        id: Uuid,
        seller_email: &str,
    ) -> Result<Option<Listing>, DirectoryError>;
    async fn advertised_listings(&self) -> Result<Vec<Listing>, DirectoryError>;
    /// Flips `sold`. Returns false when the listing is absent or already sold.
    async fn mark_sold(&self, id: Uuid) -> Result<bool, DirectoryError>;
    /// Reverts `sold` on a sold listing. Compensation for a booking write that
    /// failed after the flip.
    async fn unmark_sold(&self, id: Uuid) -> Result<bool, DirectoryError>;

    // --- Bookings ---
    async fn create_booking(&self, booking: Booking) -> Result<Booking, DirectoryError>;
    async fn bookings_for_buyer(
        &self,
        buyer_email: &str,
    ) -> Result<Vec<Booking>, DirectoryError>;
}

/// DirectoryState
///
/// The concrete type used to share store access across the application state.
pub type DirectoryState = Arc<dyn Directory>;

const LISTING_COLUMNS: &str = "id, category_id, seller_email, name, price, original_price, \
     condition, location, description, advertised, sold, created_at";

const BOOKING_COLUMNS: &str =
    "id, listing_id, buyer_email, item_name, price, meeting_location, phone, created_at";

/// PostgresDirectory
///
/// The concrete implementation of the `Directory` trait, backed by Postgres.
/// Queries use the runtime sqlx API so the crate builds without a live
/// database connection.
pub struct PostgresDirectory {
    pool: PgPool,
}

impl PostgresDirectory {
    /// Creates a new directory instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for PostgresDirectory {
    async fn find_user(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        let user =
            sqlx::query_as::<_, User>("SELECT id, email, role, verified FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    async fn create_user(&self, user: User) -> Result<User, DirectoryError> {
        let created = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, email, role, verified) VALUES ($1, $2, $3, $4) \
             RETURNING id, email, role, verified",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(user.role)
        .bind(user.verified)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            // A concurrent insert on the same email lands here instead of the
            // handler's pre-check.
            sqlx::Error::Database(db) if db.is_unique_violation() => DirectoryError::Duplicate,
            _ => DirectoryError::Database(e),
        })?;
        Ok(created)
    }

    async fn users_by_role(&self, role: Role) -> Result<Vec<User>, DirectoryError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, email, role, verified FROM users WHERE role = $1 ORDER BY email",
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn set_seller_verified(&self, id: Uuid) -> Result<bool, DirectoryError> {
        // The role filter keeps the flag meaningless for non-sellers.
        let result = sqlx::query("UPDATE users SET verified = true WHERE id = $1 AND role = $2")
            .bind(id)
            .bind(Role::Seller)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, DirectoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, DirectoryError> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(categories)
    }

    async fn category_listings(&self, category_id: Uuid) -> Result<Vec<Listing>, DirectoryError> {
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM listings \
             WHERE category_id = $1 AND sold = false ORDER BY created_at DESC"
        );
        let listings = sqlx::query_as::<_, Listing>(&sql)
            .bind(category_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(listings)
    }

    async fn create_listing(&self, listing: Listing) -> Result<Listing, DirectoryError> {
        let sql = format!(
            "INSERT INTO listings ({LISTING_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {LISTING_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Listing>(&sql)
            .bind(listing.id)
            .bind(listing.category_id)
            .bind(&listing.seller_email)
            .bind(&listing.name)
            .bind(listing.price)
            .bind(listing.original_price)
            .bind(&listing.condition)
            .bind(&listing.location)
            .bind(&listing.description)
            .bind(listing.advertised)
            .bind(listing.sold)
            .bind(listing.created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn listings_for_seller(
        &self,
        seller_email: &str,
    ) -> Result<Vec<Listing>, DirectoryError> {
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM listings \
             WHERE seller_email = $1 ORDER BY created_at DESC"
        );
        let listings = sqlx::query_as::<_, Listing>(&sql)
            .bind(seller_email)
            .fetch_all(&self.pool)
            .await?;
        Ok(listings)
    }

    async fn find_listing(&self, id: Uuid) -> Result<Option<Listing>, DirectoryError> {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1");
        let listing = sqlx::query_as::<_, Listing>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(listing)
    }

    async fn delete_listing(&self, id: Uuid, seller_email: &str) -> Result<bool, DirectoryError> {
        let result = sqlx::query("DELETE FROM listings WHERE id = $1 AND seller_email = $2")
            .bind(id)
            .bind(seller_email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_advertised(
        &self,
        id: Uuid,
        seller_email: &str,
    ) -> Result<Option<Listing>, DirectoryError> {
        // Sold listings are excluded here as well as in the handler, so the
        // guard holds even under a concurrent booking.
        let sql = format!(
            "UPDATE listings SET advertised = true \
             WHERE id = $1 AND seller_email = $2 AND sold = false \
             RETURNING {LISTING_COLUMNS}"
        );
        let listing = sqlx::query_as::<_, Listing>(&sql)
            .bind(id)
            .bind(seller_email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(listing)
    }

    async fn advertised_listings(&self) -> Result<Vec<Listing>, DirectoryError> {
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM listings \
             WHERE advertised = true AND sold = false ORDER BY created_at DESC"
        );
        let listings = sqlx::query_as::<_, Listing>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(listings)
    }

    async fn mark_sold(&self, id: Uuid) -> Result<bool, DirectoryError> {
        let result = sqlx::query("UPDATE listings SET sold = true WHERE id = $1 AND sold = false")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn unmark_sold(&self, id: Uuid) -> Result<bool, DirectoryError> {
        let result = sqlx::query("UPDATE listings SET sold = false WHERE id = $1 AND sold = true")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_booking(&self, booking: Booking) -> Result<Booking, DirectoryError> {
        let sql = format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {BOOKING_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Booking>(&sql)
            .bind(booking.id)
            .bind(booking.listing_id)
            .bind(&booking.buyer_email)
            .bind(&booking.item_name)
            .bind(booking.price)
            .bind(&booking.meeting_location)
            .bind(&booking.phone)
            .bind(booking.created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn bookings_for_buyer(
        &self,
        buyer_email: &str,
    ) -> Result<Vec<Booking>, DirectoryError> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE buyer_email = $1 ORDER BY created_at DESC"
        );
        let bookings = sqlx::query_as::<_, Booking>(&sql)
            .bind(buyer_email)
            .fetch_all(&self.pool)
            .await?;
        Ok(bookings)
    }
}

// --- The In-Memory Implementation (For Tests and Local Experiments) ---

/// InMemoryDirectory
///
/// A `Directory` implementation over plain vectors behind a mutex. Used by the
/// integration tests to exercise handlers without a network connection to
/// Postgres, keeping the test boundary at the trait.
#[derive(Default)]
pub struct InMemoryDirectory {
    inner: Mutex<Inner>,
    bookings_unavailable: AtomicBool,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    categories: Vec<Category>,
    listings: Vec<Listing>,
    bookings: Vec<Booking>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    // Seed helpers for test setup.

    pub fn seed_user(&self, user: User) {
        self.lock().users.push(user);
    }

    pub fn seed_category(&self, category: Category) {
        self.lock().categories.push(category);
    }

    pub fn seed_listing(&self, listing: Listing) {
        self.lock().listings.push(listing);
    }

    /// Makes every booking write fail, to exercise failure paths in tests.
    pub fn fail_bookings(&self, fail: bool) {
        self.bookings_unavailable.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("directory mutex poisoned")
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn find_user(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: User) -> Result<User, DirectoryError> {
        let mut inner = self.lock();
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(DirectoryError::Duplicate);
        }
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn users_by_role(&self, role: Role) -> Result<Vec<User>, DirectoryError> {
        Ok(self
            .lock()
            .users
            .iter()
            .filter(|u| u.role == role)
            .cloned()
            .collect())
    }

    async fn set_seller_verified(&self, id: Uuid) -> Result<bool, DirectoryError> {
        let mut inner = self.lock();
        match inner
            .users
            .iter_mut()
            .find(|u| u.id == id && u.role == Role::Seller)
        {
            Some(user) => {
                user.verified = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, DirectoryError> {
        let mut inner = self.lock();
        let before = inner.users.len();
        inner.users.retain(|u| u.id != id);
        Ok(inner.users.len() < before)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, DirectoryError> {
        Ok(self.lock().categories.clone())
    }

    async fn category_listings(&self, category_id: Uuid) -> Result<Vec<Listing>, DirectoryError> {
        Ok(self
            .lock()
            .listings
            .iter()
            .filter(|l| l.category_id == category_id && !l.sold)
            .cloned()
            .collect())
    }

    async fn create_listing(&self, listing: Listing) -> Result<Listing, DirectoryError> {
        self.lock().listings.push(listing.clone());
        Ok(listing)
    }

    async fn listings_for_seller(
        &self,
        seller_email: &str,
    ) -> Result<Vec<Listing>, DirectoryError> {
        Ok(self
            .lock()
            .listings
            .iter()
            .filter(|l| l.seller_email == seller_email)
            .cloned()
            .collect())
    }

    async fn find_listing(&self, id: Uuid) -> Result<Option<Listing>, DirectoryError> {
        Ok(self.lock().listings.iter().find(|l| l.id == id).cloned())
    }

    async fn delete_listing(&self, id: Uuid, seller_email: &str) -> Result<bool, DirectoryError> {
        let mut inner = self.lock();
        let before = inner.listings.len();
        inner
            .listings
            .retain(|l| !(l.id == id && l.seller_email == seller_email));
        Ok(inner.listings.len() < before)
    }

    async fn set_advertised(
        &self,
        id: Uuid,
        seller_email: &str,
    ) -> Result<Option<Listing>, DirectoryError> {
        let mut inner = self.lock();
        match inner
            .listings
            .iter_mut()
            .find(|l| l.id == id && l.seller_email == seller_email && !l.sold)
        {
            Some(listing) => {
                listing.advertised = true;
                Ok(Some(listing.clone()))
            }
            None => Ok(None),
        }
    }

    async fn advertised_listings(&self) -> Result<Vec<Listing>, DirectoryError> {
        Ok(self
            .lock()
            .listings
            .iter()
            .filter(|l| l.advertised && !l.sold)
            .cloned()
            .collect())
    }

    async fn mark_sold(&self, id: Uuid) -> Result<bool, DirectoryError> {
        let mut inner = self.lock();
        match inner.listings.iter_mut().find(|l| l.id == id && !l.sold) {
            Some(listing) => {
                listing.sold = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn unmark_sold(&self, id: Uuid) -> Result<bool, DirectoryError> {
        let mut inner = self.lock();
        match inner.listings.iter_mut().find(|l| l.id == id && l.sold) {
            Some(listing) => {
                listing.sold = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_booking(&self, booking: Booking) -> Result<Booking, DirectoryError> {
        if self.bookings_unavailable.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable);
        }
        self.lock().bookings.push(booking.clone());
        Ok(booking)
    }

    async fn bookings_for_buyer(
        &self,
        buyer_email: &str,
    ) -> Result<Vec<Booking>, DirectoryError> {
        Ok(self
            .lock()
            .bookings
            .iter()
            .filter(|b| b.buyer_email == buyer_email)
            .cloned()
            .collect())
    }
}
