//! Connection request lifecycle
//!
//! Sending, listing, accepting, and rejecting requests in the
//! `connectionRequests` collection. Studio entries in the directory redirect
//! to their owning producer at send time, so every request is addressed to a
//! real user. Accepting drives the side effects: edge-pair creation for
//! connection requests, membership for studio-join requests.

use std::sync::Arc;

use tracing::{debug, info, warn};

use bp_common::collections;
use bp_common::model::{
    AccountType, ConnectTarget, ConnectionRequest, RequestKind, RequestStatus, UserProfile,
};
use bp_common::store::{DocumentStore, Filter, LiveQuery, Patch};
use bp_common::{time, Error, Result};

use crate::ledger::ConnectionLedger;
use crate::membership::StudioMembership;

/// A request document paired with its store id.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestRecord {
    pub id: String,
    pub request: ConnectionRequest,
}

/// What sending a request did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// A new pending request was written.
    Sent { request_id: String },
    /// The receiver is already a contact; nothing was written.
    AlreadyConnected,
    /// A pending request to this receiver already exists; nothing was
    /// written.
    AlreadyPending,
}

/// What accepting a request did beyond marking it accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// `edges_created` is false when the pair already existed (a replayed
    /// accept).
    Connection { edges_created: bool },
    /// `member_added` is false when membership already held.
    StudioJoin { member_added: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectOutcome {
    Rejected,
    /// The request was already rejected; rejection is idempotent.
    AlreadyRejected,
}

/// Entry point for the request workflow. Owns a ledger and a membership
/// service bound to the same store.
#[derive(Clone)]
pub struct ConnectionRequests {
    store: Arc<dyn DocumentStore>,
    ledger: ConnectionLedger,
    membership: StudioMembership,
}

impl ConnectionRequests {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            ledger: ConnectionLedger::new(store.clone()),
            membership: StudioMembership::new(store.clone()),
            store,
        }
    }

    /// The ledger bound to this workflow's store.
    pub fn ledger(&self) -> &ConnectionLedger {
        &self.ledger
    }

    /// The membership service bound to this workflow's store.
    pub fn membership(&self) -> &StudioMembership {
        &self.membership
    }

    /// Send a connection request from the signed-in user to a directory
    /// entry.
    ///
    /// Studio entries resolve to their owner: the request is addressed to
    /// the owning producer and tagged `studio_join`, carrying the studio
    /// identification inline. Duplicate sends and sends to existing contacts
    /// return their outcome without writing anything.
    pub async fn send(
        &self,
        sender: Option<&UserProfile>,
        target: &ConnectTarget,
    ) -> Result<SendOutcome> {
        let sender = sender.ok_or_else(|| {
            Error::Unauthenticated("sending a connection request requires an account".to_string())
        })?;

        let (receiver_id, receiver_name, kind) = resolve_target(target)?;

        if sender.id == receiver_id {
            return Err(Error::InvalidInput(
                "cannot send a connection request to yourself".to_string(),
            ));
        }

        if self.ledger.has_connection(&sender.id, &receiver_id).await? {
            debug!(
                "{} is already connected to {}, not sending a request",
                sender.id, receiver_id
            );
            return Ok(SendOutcome::AlreadyConnected);
        }

        if self.has_pending(&sender.id, &receiver_id).await? {
            debug!(
                "Pending request from {} to {} already exists",
                sender.id, receiver_id
            );
            return Ok(SendOutcome::AlreadyPending);
        }

        let request = ConnectionRequest {
            sender_id: sender.id.clone(),
            sender_name: sender.name.clone(),
            sender_email: sender.email.clone(),
            sender_avatar: sender.avatar.clone(),
            sender_account_type: sender.account_type,
            receiver_id: receiver_id.clone(),
            receiver_name,
            kind,
            status: RequestStatus::Pending,
            created_at: time::now(),
            accepted_at: None,
            rejected_at: None,
        };
        let request_id = self
            .store
            .create(
                collections::CONNECTION_REQUESTS,
                serde_json::to_value(&request)?,
            )
            .await?;
        info!(
            "Request {} ({}) sent from {} to {}",
            request_id,
            request.kind.type_str(),
            sender.id,
            receiver_id
        );
        Ok(SendOutcome::Sent { request_id })
    }

    async fn has_pending(&self, sender_id: &str, receiver_id: &str) -> Result<bool> {
        let pending = self
            .store
            .query(
                collections::CONNECTION_REQUESTS,
                &[
                    Filter::eq("senderId", sender_id),
                    Filter::eq("receiverId", receiver_id),
                    Filter::eq("status", RequestStatus::Pending.as_str()),
                ],
            )
            .await?;
        Ok(!pending.is_empty())
    }

    /// Pending requests addressed to the user (the inbox).
    pub async fn pending_for_receiver(&self, receiver_id: &str) -> Result<Vec<RequestRecord>> {
        self.pending_matching(Filter::eq("receiverId", receiver_id))
            .await
    }

    /// Pending requests the user has sent (the outbox).
    pub async fn pending_from_sender(&self, sender_id: &str) -> Result<Vec<RequestRecord>> {
        self.pending_matching(Filter::eq("senderId", sender_id)).await
    }

    async fn pending_matching(&self, party: Filter) -> Result<Vec<RequestRecord>> {
        let documents = self
            .store
            .query(
                collections::CONNECTION_REQUESTS,
                &[party, Filter::eq("status", RequestStatus::Pending.as_str())],
            )
            .await?;
        documents
            .into_iter()
            .map(|doc| {
                Ok(RequestRecord {
                    request: doc.decode()?,
                    id: doc.id,
                })
            })
            .collect()
    }

    /// Live view of the user's pending inbox. Each snapshot is the full
    /// current result set.
    pub fn watch_pending_for_receiver(&self, receiver_id: &str) -> LiveQuery {
        LiveQuery::new(
            self.store.clone(),
            collections::CONNECTION_REQUESTS,
            vec![
                Filter::eq("receiverId", receiver_id),
                Filter::eq("status", RequestStatus::Pending.as_str()),
            ],
        )
    }

    /// Accept a request as its receiver and apply the side effects.
    ///
    /// Re-accepting an already-accepted request replays the side effects
    /// without rewriting the status: the ledger writes only missing edges
    /// and membership only adds absent ids, so an accept interrupted
    /// between the status write and a side effect is completed by
    /// retrying. An accept of a rejected request is a conflict.
    pub async fn accept(
        &self,
        request_id: &str,
        accepter: Option<&UserProfile>,
    ) -> Result<AcceptOutcome> {
        let accepter = accepter.ok_or_else(|| {
            Error::Unauthenticated("accepting a request requires an account".to_string())
        })?;

        let document = self
            .store
            .get(collections::CONNECTION_REQUESTS, request_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("connection request {}", request_id)))?;
        let request: ConnectionRequest = document.decode()?;

        if accepter.id != request.receiver_id {
            return Err(Error::Forbidden(format!(
                "only the receiver may accept request {}",
                request_id
            )));
        }
        if request.status == RequestStatus::Rejected {
            return Err(Error::Conflict(format!(
                "request {} was already rejected",
                request_id
            )));
        }

        if request.status == RequestStatus::Pending {
            self.store
                .update(
                    collections::CONNECTION_REQUESTS,
                    request_id,
                    Patch::new()
                        .set("status", RequestStatus::Accepted.as_str())
                        .set("acceptedAt", serde_json::to_value(time::now())?),
                )
                .await?;
            info!("Request {} accepted by {}", request_id, accepter.id);
        } else {
            debug!("Request {} already accepted, replaying side effects", request_id);
        }

        match &request.kind {
            RequestKind::Connection => {
                match self
                    .ledger
                    .create_pair(&accepter.peer(), &request.sender_peer())
                    .await
                {
                    Ok(edges_written) => Ok(AcceptOutcome::Connection {
                        edges_created: edges_written > 0,
                    }),
                    Err(e) => {
                        warn!(
                            "Request {} is accepted but edge creation failed: {}",
                            request_id, e
                        );
                        Err(e)
                    }
                }
            }
            RequestKind::StudioJoin { studio_id, .. } => {
                match self.membership.add_member(studio_id, &request.sender_id).await {
                    Ok(member_added) => Ok(AcceptOutcome::StudioJoin { member_added }),
                    Err(e) => {
                        warn!(
                            "Request {} is accepted but the membership write failed: {}",
                            request_id, e
                        );
                        Err(e)
                    }
                }
            }
        }
    }

    /// Reject a request as its receiver.
    ///
    /// Rejecting twice is an idempotent no-op; rejecting an accepted
    /// request is a conflict.
    pub async fn reject(
        &self,
        request_id: &str,
        rejecter: Option<&UserProfile>,
    ) -> Result<RejectOutcome> {
        let rejecter = rejecter.ok_or_else(|| {
            Error::Unauthenticated("rejecting a request requires an account".to_string())
        })?;

        let document = self
            .store
            .get(collections::CONNECTION_REQUESTS, request_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("connection request {}", request_id)))?;
        let request: ConnectionRequest = document.decode()?;

        if rejecter.id != request.receiver_id {
            return Err(Error::Forbidden(format!(
                "only the receiver may reject request {}",
                request_id
            )));
        }

        match request.status {
            RequestStatus::Accepted => Err(Error::Conflict(format!(
                "request {} was already accepted",
                request_id
            ))),
            RequestStatus::Rejected => {
                debug!("Request {} already rejected", request_id);
                Ok(RejectOutcome::AlreadyRejected)
            }
            RequestStatus::Pending => {
                self.store
                    .update(
                        collections::CONNECTION_REQUESTS,
                        request_id,
                        Patch::new()
                            .set("status", RequestStatus::Rejected.as_str())
                            .set("rejectedAt", serde_json::to_value(time::now())?),
                    )
                    .await?;
                info!("Request {} rejected by {}", request_id, rejecter.id);
                Ok(RejectOutcome::Rejected)
            }
        }
    }
}

/// Resolve a directory entry to the user who receives the request and the
/// request kind to write.
fn resolve_target(target: &ConnectTarget) -> Result<(String, String, RequestKind)> {
    if target.account_type == AccountType::Studio {
        let owner_id = target.owner_id.clone().ok_or_else(|| {
            Error::InvalidInput(format!("studio entry {} is missing ownerId", target.id))
        })?;
        let owner_name = target.owner_name.clone().ok_or_else(|| {
            Error::InvalidInput(format!("studio entry {} is missing ownerName", target.id))
        })?;
        let kind = RequestKind::StudioJoin {
            studio_id: target.id.clone(),
            studio_name: target.display_name.clone(),
            studio_owner_id: owner_id.clone(),
            studio_owner_name: owner_name.clone(),
        };
        Ok((owner_id, owner_name, kind))
    } else {
        Ok((
            target.id.clone(),
            target.display_name.clone(),
            RequestKind::Connection,
        ))
    }
}
