//! Connection ledger
//!
//! Directional edge documents in the `connections` collection. A mutual
//! connection between two users is a pair of edges, one owned by each side,
//! each denormalizing the other user's display fields. The pair is written
//! when a connection request is accepted; removal deletes one edge at a
//! time, so a half-removed pair is observable.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use bp_common::collections;
use bp_common::model::{Connection, Peer};
use bp_common::store::{DocumentStore, Filter};
use bp_common::{time, Result};

/// An edge document paired with its store id.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionRecord {
    pub id: String,
    pub connection: Connection,
}

/// Reads and writes connection edges.
#[derive(Clone)]
pub struct ConnectionLedger {
    store: Arc<dyn DocumentStore>,
}

impl ConnectionLedger {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// True when the edge owned by `user_id` pointing at `other_user_id`
    /// exists.
    pub async fn has_connection(&self, user_id: &str, other_user_id: &str) -> Result<bool> {
        let edges = self
            .store
            .query(
                collections::CONNECTIONS,
                &[
                    Filter::eq("userId", user_id),
                    Filter::eq("connectedUserId", other_user_id),
                ],
            )
            .await?;
        Ok(!edges.is_empty())
    }

    /// Ensure both directional edges of a mutual connection exist, writing
    /// the missing ones with a shared creation timestamp.
    ///
    /// Each direction is checked before it is written: a repeat call on a
    /// complete pair writes nothing, and a call after a failure that left
    /// only one edge writes the missing direction. The store has no
    /// uniqueness constraint on edges; the per-direction check is the only
    /// duplicate guard. Returns the number of edges written.
    pub async fn create_pair(&self, a: &Peer, b: &Peer) -> Result<usize> {
        let created_at = time::now();
        let mut written = 0;
        if !self.has_connection(&a.id, &b.id).await? {
            self.create_edge(a, b, created_at).await?;
            written += 1;
        }
        if !self.has_connection(&b.id, &a.id).await? {
            self.create_edge(b, a, created_at).await?;
            written += 1;
        }
        match written {
            2 => info!("Connection pair created between {} and {}", a.id, b.id),
            1 => info!("Completed the connection pair between {} and {}", a.id, b.id),
            _ => debug!("Connection pair between {} and {} already complete", a.id, b.id),
        }
        Ok(written)
    }

    async fn create_edge(&self, owner: &Peer, other: &Peer, created_at: DateTime<Utc>) -> Result<()> {
        let edge = Connection {
            user_id: owner.id.clone(),
            connected_user_id: other.id.clone(),
            connected_user_name: other.name.clone(),
            connected_user_avatar: other.avatar.clone(),
            connected_user_account_type: other.account_type,
            created_at,
        };
        self.store
            .create(collections::CONNECTIONS, serde_json::to_value(&edge)?)
            .await?;
        Ok(())
    }

    /// All edges owned by the user, i.e. their contacts list.
    pub async fn connections_for(&self, user_id: &str) -> Result<Vec<ConnectionRecord>> {
        let documents = self
            .store
            .query(collections::CONNECTIONS, &[Filter::eq("userId", user_id)])
            .await?;
        documents
            .into_iter()
            .map(|doc| {
                Ok(ConnectionRecord {
                    connection: doc.decode()?,
                    id: doc.id,
                })
            })
            .collect()
    }

    /// Delete a single edge by id. The reverse edge is left in place; a
    /// missing id is a no-op.
    pub async fn remove(&self, edge_id: &str) -> Result<()> {
        self.store.delete(collections::CONNECTIONS, edge_id).await?;
        debug!("Connection edge {} removed", edge_id);
        Ok(())
    }
}
