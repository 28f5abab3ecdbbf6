use orgwarden_core::{AccessRequest, PolicyGroup, PolicyTuple, PUBLIC_SUBJECT};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::grouping::GroupingResolver;
use crate::model::ADMIN_ROLE;

// ---------------------------------------------------------------------------
// Clause: the seven matcher predicates
// ---------------------------------------------------------------------------

/// One disjunct of the matcher. A policy tuple satisfies a request if any
/// clause holds; clauses are tried in [`Clause::ORDERED`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clause {
    /// Direct individual grant, including ownership tuples.
    UserGrant,
    DeptGrant,
    OrgGrant,
    /// Tuple subject is one of the requester's teams.
    TeamGrant,
    /// Tuple action is a role whose expansion contains the requested action.
    RoleExpansion,
    /// Requester is an admin of the tuple's organization. Object and action
    /// are not checked.
    OrgAdminOverride,
    PublicShare,
}

impl Clause {
    pub const ORDERED: [Clause; 7] = [
        Clause::UserGrant,
        Clause::DeptGrant,
        Clause::OrgGrant,
        Clause::TeamGrant,
        Clause::RoleExpansion,
        Clause::OrgAdminOverride,
        Clause::PublicShare,
    ];

    /// 1-based position in the matcher.
    pub fn number(self) -> u8 {
        match self {
            Clause::UserGrant => 1,
            Clause::DeptGrant => 2,
            Clause::OrgGrant => 3,
            Clause::TeamGrant => 4,
            Clause::RoleExpansion => 5,
            Clause::OrgAdminOverride => 6,
            Clause::PublicShare => 7,
        }
    }

    /// The clause written in matcher-expression notation.
    pub fn expression(self) -> &'static str {
        match self {
            Clause::UserGrant => {
                r#"p.sub == r.sub.userId && p.act == r.act && p.obj == r.obj && p.pgrp == "user""#
            }
            Clause::DeptGrant => {
                r#"p.sub == r.sub.deptId && p.act == r.act && p.obj == r.obj && p.pgrp == "dept""#
            }
            Clause::OrgGrant => {
                r#"p.sub == r.sub.orgId && p.act == r.act && p.obj == r.obj && p.pgrp == "org""#
            }
            Clause::TeamGrant => {
                r#"p.sub in r.sub.teams && p.act == r.act && p.obj == r.obj && p.pgrp == "team""#
            }
            Clause::RoleExpansion => {
                r#"p.sub == r.sub.userId && g(p.act, r.act) && p.obj == r.obj && p.pgrp == "user""#
            }
            Clause::OrgAdminOverride => r#""admin" in r.sub.roles && p.orgId == r.sub.orgId"#,
            Clause::PublicShare => {
                r#"p.sub == "0" && p.act == r.act && p.obj == r.obj && p.pgrp == "public""#
            }
        }
    }

    /// Evaluate this clause for one (policy, request) pair.
    pub fn matches(
        self,
        policy: &PolicyTuple,
        request: &AccessRequest<'_>,
        roles: &GroupingResolver,
    ) -> bool {
        let sub = &request.subject;
        match self {
            Clause::UserGrant => {
                policy.group == PolicyGroup::User
                    && same_id(&policy.subject, &sub.user_id)
                    && same_target(policy, request)
            }
            Clause::DeptGrant => {
                policy.group == PolicyGroup::Dept
                    && same_id(&policy.subject, &sub.dept_id)
                    && same_target(policy, request)
            }
            Clause::OrgGrant => {
                policy.group == PolicyGroup::Org
                    && same_id(&policy.subject, &sub.org_id)
                    && same_target(policy, request)
            }
            Clause::TeamGrant => {
                policy.group == PolicyGroup::Team
                    && sub.in_team(&policy.subject)
                    && same_target(policy, request)
            }
            Clause::RoleExpansion => {
                policy.group == PolicyGroup::User
                    && same_id(&policy.subject, &sub.user_id)
                    && policy.object == request.object
                    && roles.resolve(&policy.action, &request.action)
            }
            // Scoped by organization only. Comparing org ids is what keeps
            // an admin of one org out of another org's objects.
            Clause::OrgAdminOverride => {
                sub.has_role(ADMIN_ROLE) && same_id(&policy.org_id, &sub.org_id)
            }
            Clause::PublicShare => {
                policy.group == PolicyGroup::Public
                    && policy.subject == PUBLIC_SUBJECT
                    && same_target(policy, request)
            }
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Clause::UserGrant => "user-grant",
            Clause::DeptGrant => "dept-grant",
            Clause::OrgGrant => "org-grant",
            Clause::TeamGrant => "team-grant",
            Clause::RoleExpansion => "role-expansion",
            Clause::OrgAdminOverride => "org-admin-override",
            Clause::PublicShare => "public-share",
        };
        write!(f, "#{} {}", self.number(), name)
    }
}

/// An empty requester field never matches; stored tuples never carry
/// empty identifiers, but the check keeps that from being load-bearing.
fn same_id(policy_value: &str, subject_value: &str) -> bool {
    !subject_value.is_empty() && policy_value == subject_value
}

fn same_target(policy: &PolicyTuple, request: &AccessRequest<'_>) -> bool {
    policy.action == request.action && policy.object == request.object
}

// ---------------------------------------------------------------------------
// Evaluation over a policy list
// ---------------------------------------------------------------------------

/// The (tuple, clause) pair that satisfied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub policy_index: usize,
    pub clause: Clause,
}

/// Find the first satisfying (tuple, clause) pair, walking tuples in load
/// order and clauses in matcher order for each tuple.
pub fn first_match(
    policies: &[PolicyTuple],
    request: &AccessRequest<'_>,
    roles: &GroupingResolver,
) -> Option<MatchOutcome> {
    policies
        .iter()
        .enumerate()
        .find_map(|(policy_index, policy)| {
            Clause::ORDERED
                .into_iter()
                .find(|clause| clause.matches(policy, request, roles))
                .map(|clause| MatchOutcome {
                    policy_index,
                    clause,
                })
        })
}

/// All clauses satisfied by a single tuple, in matcher order.
pub fn matching_clauses(
    policy: &PolicyTuple,
    request: &AccessRequest<'_>,
    roles: &GroupingResolver,
) -> Vec<Clause> {
    Clause::ORDERED
        .into_iter()
        .filter(|clause| clause.matches(policy, request, roles))
        .collect()
}
