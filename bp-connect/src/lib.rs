//! bp-connect library - BeatPlanner connection workflow
//!
//! Request lifecycle (send, accept, reject), the mutual-connection ledger,
//! studio membership writes, the periodic membership repair task, and the
//! one-shot legacy back-fill migration. Everything runs against the
//! `DocumentStore` abstraction from bp-common.

pub mod ledger;
pub mod membership;
pub mod migrate;
pub mod requests;
pub mod sync;

pub use ledger::ConnectionLedger;
pub use membership::StudioMembership;
pub use requests::ConnectionRequests;
pub use sync::MembershipSync;
