//! Studio membership
//!
//! Membership lives in the `studios` collection as a `memberIds` array on
//! each studio document (keyed by the owning producer's user id). Writes go
//! through an array-union patch so concurrent adds from accept flows and
//! repair passes cannot drop ids.

use std::sync::Arc;

use tracing::{debug, info};

use bp_common::collections;
use bp_common::model::Studio;
use bp_common::store::{DocumentStore, Filter, Patch};
use bp_common::{time, Error, Result};

/// A studio document paired with its store id.
#[derive(Debug, Clone, PartialEq)]
pub struct StudioRecord {
    pub id: String,
    pub studio: Studio,
}

#[derive(Clone)]
pub struct StudioMembership {
    store: Arc<dyn DocumentStore>,
}

impl StudioMembership {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Ensure `user_id` is in the studio's member set.
    ///
    /// Returns `Ok(true)` when the id was added and `Ok(false)` when
    /// membership already held, so callers can report repairs precisely.
    /// Fails with `NotFound` when the studio document is missing.
    pub async fn add_member(&self, studio_id: &str, user_id: &str) -> Result<bool> {
        let document = self
            .store
            .get(collections::STUDIOS, studio_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("studio {}", studio_id)))?;
        let studio: Studio = document.decode()?;

        if studio.has_member(user_id) {
            debug!("User {} already a member of studio {}", user_id, studio_id);
            return Ok(false);
        }

        self.store
            .update(
                collections::STUDIOS,
                studio_id,
                Patch::new()
                    .array_union("memberIds", user_id)
                    .set("updatedAt", serde_json::to_value(time::now())?),
            )
            .await?;
        info!("User {} added to studio {}", user_id, studio_id);
        Ok(true)
    }

    /// Studios whose member set contains the user.
    pub async fn studios_with_member(&self, user_id: &str) -> Result<Vec<StudioRecord>> {
        let documents = self
            .store
            .query(
                collections::STUDIOS,
                &[Filter::contains("memberIds", user_id)],
            )
            .await?;
        documents
            .into_iter()
            .map(|doc| {
                Ok(StudioRecord {
                    studio: doc.decode()?,
                    id: doc.id,
                })
            })
            .collect()
    }
}
