//! Fixture data for the connection workflow tests

use std::sync::Arc;

use serde_json::json;

use bp_common::collections;
use bp_common::model::{AccountType, ConnectTarget, UserProfile};
use bp_common::store::DocumentStore;

pub fn artist(n: u32) -> UserProfile {
    UserProfile {
        id: format!("artist-{}", n),
        name: format!("Artist {}", n),
        email: format!("artist{}@example.com", n),
        avatar: Some(format!("https://cdn.example.com/a{}.png", n)),
        account_type: AccountType::Artist,
    }
}

pub fn producer(n: u32) -> UserProfile {
    UserProfile {
        id: format!("producer-{}", n),
        name: format!("Producer {}", n),
        email: format!("producer{}@example.com", n),
        avatar: None,
        account_type: AccountType::Producer,
    }
}

/// Directory entry for a user's own profile (artist or producer).
pub fn person_target(user: &UserProfile) -> ConnectTarget {
    ConnectTarget {
        id: user.id.clone(),
        display_name: user.name.clone(),
        account_type: user.account_type,
        owner_id: None,
        owner_name: None,
    }
}

/// Directory entry for a studio owned by `owner`. Studio ids are the
/// owner's user id.
pub fn studio_entry(owner: &UserProfile, studio_name: &str) -> ConnectTarget {
    ConnectTarget {
        id: owner.id.clone(),
        display_name: studio_name.to_string(),
        account_type: AccountType::Studio,
        owner_id: Some(owner.id.clone()),
        owner_name: Some(owner.name.clone()),
    }
}

/// Write a studio document the way the rest of the platform does, including
/// profile fields this workflow never touches.
pub async fn seed_studio(
    store: &Arc<dyn DocumentStore>,
    owner: &UserProfile,
    studio_name: &str,
    member_ids: &[&str],
) {
    store
        .put(
            collections::STUDIOS,
            &owner.id,
            json!({
                "ownerId": owner.id,
                "name": studio_name,
                "memberIds": member_ids,
                "genres": ["electronic"],
                "hourlyRate": 45,
                "updatedAt": "2024-03-01T12:00:00Z",
            }),
        )
        .await
        .expect("studio seed should write");
}
