use listing_mart::{
    models::{Listing, Role, User},
    repository::{Directory, DirectoryError, InMemoryDirectory},
};
use uuid::Uuid;

fn user(email: &str, role: Role) -> User {
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        role,
        verified: false,
    }
}

fn sold_listing(seller_email: &str) -> Listing {
    Listing {
        id: Uuid::new_v4(),
        seller_email: seller_email.to_string(),
        name: "Desk lamp".to_string(),
        sold: true,
        ..Listing::default()
    }
}

#[tokio::test]
async fn duplicate_insert_is_reported_as_a_duplicate_key() {
    let dir = InMemoryDirectory::new();
    dir.create_user(user("dup@x.com", Role::Buyer)).await.unwrap();

    // A second insert on the same email must be distinguishable from a store
    // failure so callers can answer 409 instead of 500.
    let err = dir
        .create_user(user("dup@x.com", Role::Seller))
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::Duplicate));

    // The original record is untouched.
    let stored = dir.find_user("dup@x.com").await.unwrap().unwrap();
    assert_eq!(stored.role, Role::Buyer);
}

#[tokio::test]
async fn unmark_sold_releases_only_a_sold_listing() {
    let dir = InMemoryDirectory::new();
    let item = sold_listing("seller@x.com");
    let id = item.id;
    dir.seed_listing(item);

    assert!(dir.unmark_sold(id).await.unwrap());
    let stored = dir.find_listing(id).await.unwrap().unwrap();
    assert!(!stored.sold);

    // Already unsold and unknown ids both report no change.
    assert!(!dir.unmark_sold(id).await.unwrap());
    assert!(!dir.unmark_sold(Uuid::new_v4()).await.unwrap());
}
