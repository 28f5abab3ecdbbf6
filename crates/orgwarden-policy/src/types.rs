use orgwarden_core::{AccessRequest, GroupingTuple, PolicyTuple, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PolicyError, PolicyResult};
use crate::grouping::GroupingResolver;
use crate::matcher::{first_match, matching_clauses, Clause, MatchOutcome};

// ---------------------------------------------------------------------------
// SnapshotVersion: monotonically increasing per published snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotVersion(pub u64);

impl SnapshotVersion {
    pub fn initial() -> Self {
        Self(1)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SnapshotVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PolicySnapshot: the immutable state every evaluation runs against
// ---------------------------------------------------------------------------

/// Policies plus role relation as loaded at one point in time.
///
/// Never mutated once published; the enforcer replaces it wholesale.
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    pub version: SnapshotVersion,
    pub loaded_at: Timestamp,
    policies: Vec<PolicyTuple>,
    roles: GroupingResolver,
}

impl PolicySnapshot {
    /// Build a snapshot, rejecting any tuple that violates the stored-tuple
    /// invariants.
    pub fn build(
        version: SnapshotVersion,
        policies: Vec<PolicyTuple>,
        groupings: &[GroupingTuple],
    ) -> PolicyResult<Self> {
        for (i, p) in policies.iter().enumerate() {
            p.validate()
                .map_err(|e| PolicyError::LoadError(format!("policy #{} ({}): {}", i + 1, p, e)))?;
        }
        for g in groupings {
            g.validate()
                .map_err(|e| PolicyError::LoadError(format!("grouping ({}): {}", g, e)))?;
        }
        Ok(Self {
            version,
            loaded_at: Timestamp::now(),
            policies,
            roles: GroupingResolver::from_tuples(groupings),
        })
    }

    pub(crate) fn from_parts(
        version: SnapshotVersion,
        policies: Vec<PolicyTuple>,
        roles: GroupingResolver,
    ) -> Self {
        Self {
            version,
            loaded_at: Timestamp::now(),
            policies,
            roles,
        }
    }

    pub fn policies(&self) -> &[PolicyTuple] {
        &self.policies
    }

    pub fn roles(&self) -> &GroupingResolver {
        &self.roles
    }

    /// Pure function of (snapshot, request). The request is assumed to be
    /// well formed; the enforcer validates before calling this.
    pub fn decide(&self, request: &AccessRequest<'_>) -> Decision {
        match first_match(&self.policies, request, &self.roles) {
            Some(outcome) => Decision {
                allowed: true,
                grant: Some(MatchedGrant {
                    clause: outcome.clause,
                    policy_index: outcome.policy_index,
                    policy: self.policies[outcome.policy_index].clone(),
                }),
                snapshot_version: self.version,
            },
            None => Decision::deny(self.version),
        }
    }

    /// Every satisfying (tuple, clause) pair, tuples in load order.
    pub fn all_matches(&self, request: &AccessRequest<'_>) -> Vec<MatchOutcome> {
        self.policies
            .iter()
            .enumerate()
            .flat_map(|(policy_index, policy)| {
                matching_clauses(policy, request, &self.roles)
                    .into_iter()
                    .map(move |clause| MatchOutcome {
                        policy_index,
                        clause,
                    })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Decision: allow/deny with provenance
// ---------------------------------------------------------------------------

/// The tuple and clause that granted access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedGrant {
    pub clause: Clause,
    pub policy_index: usize,
    pub policy: PolicyTuple,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant: Option<MatchedGrant>,
    pub snapshot_version: SnapshotVersion,
}

impl Decision {
    pub fn deny(snapshot_version: SnapshotVersion) -> Self {
        Self {
            allowed: false,
            grant: None,
            snapshot_version,
        }
    }

    /// Collapse an evaluation result into an allow flag, treating every
    /// error as deny.
    pub fn deny_on_error(result: &PolicyResult<Decision>) -> bool {
        matches!(result, Ok(Decision { allowed: true, .. }))
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.grant {
            Some(g) if self.allowed => write!(
                f,
                "allow via {} on [{}] ({})",
                g.clause, g.policy, self.snapshot_version
            ),
            _ => write!(f, "deny ({})", self.snapshot_version),
        }
    }
}
