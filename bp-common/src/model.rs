//! Document model types for the connection workflow
//!
//! These structs are the wire contract with the backing store: field names
//! serialize in camelCase, timestamps as RFC 3339 strings, and the
//! studio-join fields of a request exist exactly when `requestType` is
//! `studio_join` (the serde tag on [`RequestKind`]). Documents are built and
//! validated by the services before any store write; nothing here assembles
//! ad hoc field bags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account category of a platform user or directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Artist,
    Producer,
    Studio,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Artist => "artist",
            AccountType::Producer => "producer",
            AccountType::Studio => "studio",
        }
    }
}

/// Lifecycle state of a connection request.
///
/// `Accepted` and `Rejected` are terminal; a request never moves between
/// them or back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }
}

/// Discriminated request kind, tagged on the wire as `requestType`.
///
/// Studio-join requests carry the studio identification fields inline in the
/// request document (flattened next to the tag).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "requestType", rename_all = "snake_case")]
pub enum RequestKind {
    Connection,
    #[serde(rename_all = "camelCase")]
    StudioJoin {
        studio_id: String,
        studio_name: String,
        studio_owner_id: String,
        studio_owner_name: String,
    },
}

impl RequestKind {
    pub fn type_str(&self) -> &'static str {
        match self {
            RequestKind::Connection => "connection",
            RequestKind::StudioJoin { .. } => "studio_join",
        }
    }
}

/// A connection or studio-join request document (`connectionRequests`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    pub sender_id: String,
    pub sender_name: String,
    pub sender_email: String,
    pub sender_avatar: Option<String>,
    pub sender_account_type: AccountType,
    pub receiver_id: String,
    pub receiver_name: String,
    #[serde(flatten)]
    pub kind: RequestKind,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
}

impl ConnectionRequest {
    /// The sender's identity as a ledger peer (used when accepting).
    pub fn sender_peer(&self) -> Peer {
        Peer {
            id: self.sender_id.clone(),
            name: self.sender_name.clone(),
            avatar: self.sender_avatar.clone(),
            account_type: self.sender_account_type,
        }
    }
}

/// A directional connection edge document (`connections`).
///
/// Two edges with mirrored (userId, connectedUserId) together represent a
/// mutual connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub user_id: String,
    pub connected_user_id: String,
    pub connected_user_name: String,
    pub connected_user_avatar: Option<String>,
    pub connected_user_account_type: AccountType,
    pub created_at: DateTime<Utc>,
}

/// The subset of a studio document (`studios`) this workflow reads.
///
/// Studio documents carry further profile fields owned by the rest of the
/// platform; membership writes patch only `memberIds` and `updatedAt`, so
/// those fields survive untouched and are defaulted here on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Studio {
    pub owner_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub member_ids: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl Studio {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.member_ids.iter().any(|m| m == user_id)
    }
}

/// Authenticated caller identity, supplied by the session layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub account_type: AccountType,
}

impl UserProfile {
    pub fn peer(&self) -> Peer {
        Peer {
            id: self.id.clone(),
            name: self.name.clone(),
            avatar: self.avatar.clone(),
            account_type: self.account_type,
        }
    }
}

/// Directory entry a request is aimed at.
///
/// For studio entries, `owner_id`/`owner_name` identify the producer who
/// actually receives the join request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectTarget {
    pub id: String,
    pub display_name: String,
    pub account_type: AccountType,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub owner_name: Option<String>,
}

/// One side of a connection edge pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Peer {
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
    pub account_type: AccountType,
}
