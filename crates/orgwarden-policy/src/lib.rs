//! orgwarden policy engine
//!
//! Multi-tenant access decision engine. A request `(subject, object,
//! action)` is allowed iff some stored policy tuple satisfies one of seven
//! fixed matcher clauses:
//!
//! 1. direct user grant
//! 2. department grant
//! 3. organization grant
//! 4. team grant (membership in the requester's team set)
//! 5. role expansion (`owner` → read, write, download, share, delete)
//! 6. org-admin override, scoped to the tuple's organization
//! 7. public sharing (subject sentinel `"0"`)
//!
//! There are no deny tuples. Any error during evaluation is surfaced to the
//! caller and must never be read as an allow.
//!
//! The [`Enforcer`] publishes immutable [`PolicySnapshot`]s; evaluation is
//! a pure function of (snapshot, request) and runs concurrently with
//! reloads and mutations.

pub mod enforcer;
pub mod error;
pub mod grouping;
pub mod matcher;
pub mod model;
pub mod rows;
pub mod store;
pub mod types;

// Re-export primary types for convenience
pub use enforcer::{Enforcer, EnforcerOptions};
pub use error::{ErrorClass, PolicyError, PolicyErrorKind, PolicyResult};
pub use grouping::GroupingResolver;
pub use matcher::{first_match, matching_clauses, Clause, MatchOutcome};
pub use model::{
    Effect, PolicyModel, ADMIN_ROLE, OWNER_PERMISSIONS, OWNER_ROLE, POLICY_TYPE, ROLE_RELATION,
};
pub use rows::{PolicyRows, Row};
pub use store::{CsvFilePolicyStore, InMemoryPolicyStore};
pub use types::{Decision, MatchedGrant, PolicySnapshot, SnapshotVersion};
