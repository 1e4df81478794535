//! Legacy membership back-fill
//!
//! Earlier account imports left some studio member lists holding a user's
//! legacy directory id instead of their platform user id. This one-shot
//! migration makes the platform id a member of every studio that lists the
//! legacy id. The legacy id is left in place so re-runs and audit both
//! work; the pass is idempotent.

use std::sync::Arc;

use tracing::{info, warn};

use bp_common::store::DocumentStore;
use bp_common::{Error, Result};

use crate::membership::StudioMembership;

/// What one back-fill run found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Studios whose member list carries the legacy id.
    pub studios_with_legacy_id: usize,
    /// Studios the platform id was newly added to.
    pub members_added: usize,
}

/// Mirror the legacy id's studio memberships onto `user_id`.
pub async fn backfill_legacy_membership(
    store: Arc<dyn DocumentStore>,
    legacy_id: &str,
    user_id: &str,
) -> Result<BackfillReport> {
    let membership = StudioMembership::new(store);
    let studios = membership.studios_with_member(legacy_id).await?;

    let mut report = BackfillReport {
        studios_with_legacy_id: studios.len(),
        ..Default::default()
    };
    for record in &studios {
        if record.studio.has_member(user_id) {
            continue;
        }
        match membership.add_member(&record.id, user_id).await {
            Ok(true) => report.members_added += 1,
            Ok(false) => {}
            Err(Error::NotFound(_)) => {
                warn!("Studio {} vanished mid back-fill, skipping", record.id);
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        "Back-fill {} -> {}: {} studio(s) list the legacy id, {} membership(s) added",
        legacy_id, user_id, report.studios_with_legacy_id, report.members_added
    );
    Ok(report)
}
