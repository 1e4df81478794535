//! Store collection names
//!
//! Field names and collection names are the wire contract shared with the
//! rest of the platform; they use camelCase regardless of Rust conventions.

/// Connection request documents (pending/accepted/rejected proposals).
pub const CONNECTION_REQUESTS: &str = "connectionRequests";

/// Directional connection edges ("userId considers connectedUserId a contact").
pub const CONNECTIONS: &str = "connections";

/// Studio documents; the document id equals the owner's user id.
pub const STUDIOS: &str = "studios";
