//! Accepted join-request repair
//!
//! An accept can commit the request status and then fail the membership
//! write, leaving a request marked accepted whose sender is not in the
//! studio's member set. This task closes that gap for one user: each pass
//! scans their accepted studio-join requests and re-ensures membership.
//! Passes are idempotent; the periodic runner simply repeats them.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use bp_common::collections;
use bp_common::config::SyncConfig;
use bp_common::model::{ConnectionRequest, RequestKind, RequestStatus};
use bp_common::store::{DocumentStore, Filter};
use bp_common::{Error, Result};

use crate::membership::StudioMembership;

/// What one repair pass found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Accepted studio-join requests examined.
    pub requests_checked: usize,
    /// Memberships that were missing and have been restored.
    pub members_added: usize,
    /// Requests skipped because they could not be decoded or their studio
    /// is gone.
    pub skipped: usize,
}

/// Periodic membership repair for a single user.
pub struct MembershipSync {
    store: Arc<dyn DocumentStore>,
    membership: StudioMembership,
    user_id: String,
    config: SyncConfig,
}

impl MembershipSync {
    pub fn new(store: Arc<dyn DocumentStore>, user_id: impl Into<String>, config: SyncConfig) -> Self {
        Self {
            membership: StudioMembership::new(store.clone()),
            store,
            user_id: user_id.into(),
            config,
        }
    }

    /// Run one repair pass.
    ///
    /// Requests that fail to decode and requests whose studio no longer
    /// exists are logged and skipped so the rest of the pass still runs.
    /// Store failures abort the pass and surface to the caller.
    pub async fn run_once(&self) -> Result<SyncReport> {
        let documents = self
            .store
            .query(
                collections::CONNECTION_REQUESTS,
                &[
                    Filter::eq("senderId", self.user_id.as_str()),
                    Filter::eq("requestType", "studio_join"),
                    Filter::eq("status", RequestStatus::Accepted.as_str()),
                ],
            )
            .await?;

        let mut report = SyncReport {
            requests_checked: documents.len(),
            ..Default::default()
        };
        for document in documents {
            let request: ConnectionRequest = match document.decode() {
                Ok(request) => request,
                Err(e) => {
                    warn!("Skipping undecodable request {}: {}", document.id, e);
                    report.skipped += 1;
                    continue;
                }
            };
            let RequestKind::StudioJoin { studio_id, .. } = &request.kind else {
                // The requestType filter already excludes connection requests
                report.skipped += 1;
                continue;
            };
            match self.membership.add_member(studio_id, &self.user_id).await {
                Ok(true) => report.members_added += 1,
                Ok(false) => {}
                Err(Error::NotFound(_)) => {
                    warn!(
                        "Studio {} from request {} no longer exists, skipping",
                        studio_id, document.id
                    );
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        if report.members_added > 0 {
            info!(
                "Membership sync for {}: restored {} membership(s) across {} accepted request(s)",
                self.user_id, report.members_added, report.requests_checked
            );
        } else {
            debug!(
                "Membership sync for {}: nothing to repair ({} accepted request(s))",
                self.user_id, report.requests_checked
            );
        }
        Ok(report)
    }

    /// Start the periodic repair task (spawns a background task).
    pub fn run(self: Arc<Self>) {
        if !self.config.enabled {
            info!("Membership sync disabled by configuration");
            return;
        }

        // interval() panics on a zero period; floor the configured value
        let period_secs = self.config.interval_secs.max(1);

        info!(
            "Starting membership sync for {} (interval: {}s)",
            self.user_id, period_secs
        );

        tokio::spawn(async move {
            let mut timer = interval(Duration::from_secs(period_secs));
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                timer.tick().await;
                if let Err(e) = self.run_once().await {
                    warn!("Membership sync pass failed (will retry): {}", e);
                }
            }
        });
    }
}
