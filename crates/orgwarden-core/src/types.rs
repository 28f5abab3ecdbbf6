use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{WardenError, WardenResult};

/// Subject value carried by every `public` policy tuple.
pub const PUBLIC_SUBJECT: &str = "0";

// ---------------------------------------------------------------------------
// Timestamp: canonical time representation (seconds + nanoseconds)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds_since_epoch: u64,
    pub nanoseconds: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        chrono::Utc::now().into()
    }

    pub fn from_seconds(seconds: u64) -> Self {
        Self {
            seconds_since_epoch: seconds,
            nanoseconds: 0,
        }
    }

    pub fn to_rfc3339(&self) -> String {
        let dt =
            chrono::DateTime::from_timestamp(self.seconds_since_epoch as i64, self.nanoseconds);
        dt.map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "invalid".to_string())
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Timestamp {
    fn from(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            seconds_since_epoch: dt.timestamp() as u64,
            nanoseconds: dt.timestamp_subsec_nanos(),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// PolicyGroup: the scope tag of a policy tuple
// ---------------------------------------------------------------------------

/// Selects which subject-descriptor field a tuple's subject is compared
/// against. Closed set; a new scope forces review of every matcher clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyGroup {
    User,
    Team,
    Dept,
    Org,
    Public,
}

impl PolicyGroup {
    pub const ALL: [PolicyGroup; 5] = [
        PolicyGroup::User,
        PolicyGroup::Team,
        PolicyGroup::Dept,
        PolicyGroup::Org,
        PolicyGroup::Public,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PolicyGroup::User => "user",
            PolicyGroup::Team => "team",
            PolicyGroup::Dept => "dept",
            PolicyGroup::Org => "org",
            PolicyGroup::Public => "public",
        }
    }
}

impl fmt::Display for PolicyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyGroup {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PolicyGroup::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| {
                WardenError::InvalidValue(format!(
                    "unknown policy group '{}' (expected user, team, dept, org or public)",
                    s
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// PolicyTuple: a single allow grant
// ---------------------------------------------------------------------------

/// `(subject, object, action, group, org_id)` access grant. The effect is
/// always allow; there are no deny tuples.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyTuple {
    pub subject: String,
    pub object: String,
    pub action: String,
    pub group: PolicyGroup,
    pub org_id: String,
}

impl PolicyTuple {
    pub fn new(
        subject: impl Into<String>,
        object: impl Into<String>,
        action: impl Into<String>,
        group: PolicyGroup,
        org_id: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            action: action.into(),
            group,
            org_id: org_id.into(),
        }
    }

    /// A public-sharing grant for `object`/`action`, owned by `org_id`.
    pub fn public(
        object: impl Into<String>,
        action: impl Into<String>,
        org_id: impl Into<String>,
    ) -> Self {
        Self::new(PUBLIC_SUBJECT, object, action, PolicyGroup::Public, org_id)
    }

    /// Checks the structural invariants a stored tuple must satisfy.
    pub fn validate(&self) -> WardenResult<()> {
        let fields = [
            ("subject", &self.subject),
            ("object", &self.object),
            ("action", &self.action),
            ("org_id", &self.org_id),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(WardenError::InvalidValue(format!(
                    "policy {} must not be empty",
                    name
                )));
            }
        }
        if self.group == PolicyGroup::Public && self.subject != PUBLIC_SUBJECT {
            return Err(WardenError::InvalidValue(format!(
                "public policy subject must be '{}', got '{}'",
                PUBLIC_SUBJECT, self.subject
            )));
        }
        Ok(())
    }
}

impl fmt::Display for PolicyTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p, {}, {}, {}, {}, {}",
            self.subject, self.object, self.action, self.group, self.org_id
        )
    }
}

// ---------------------------------------------------------------------------
// GroupingTuple: one edge of the role relation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupingTuple {
    pub role: String,
    pub permission: String,
}

impl GroupingTuple {
    pub fn new(role: impl Into<String>, permission: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            permission: permission.into(),
        }
    }

    pub fn validate(&self) -> WardenResult<()> {
        if self.role.trim().is_empty() {
            return Err(WardenError::InvalidValue(
                "grouping role must not be empty".into(),
            ));
        }
        if self.permission.trim().is_empty() {
            return Err(WardenError::InvalidValue(
                "grouping permission must not be empty".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for GroupingTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g, {}, {}", self.role, self.permission)
    }
}

// ---------------------------------------------------------------------------
// SubjectDescriptor: who is asking
// ---------------------------------------------------------------------------

/// Verified identity of the requester. All identifiers are opaque; an
/// empty field means "not a member of any such scope".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectDescriptor {
    pub user_id: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub dept_id: String,
    #[serde(default)]
    pub org_id: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub teams: BTreeSet<String>,
}

impl SubjectDescriptor {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = team_id.into();
        self
    }

    pub fn with_dept(mut self, dept_id: impl Into<String>) -> Self {
        self.dept_id = dept_id.into();
        self
    }

    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = org_id.into();
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_teams<I, S>(mut self, teams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.teams.extend(teams.into_iter().map(Into::into));
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn in_team(&self, team: &str) -> bool {
        self.teams.contains(team)
    }
}

// ---------------------------------------------------------------------------
// AccessRequest: (subject, object, action)
// ---------------------------------------------------------------------------

/// A request borrows its subject; evaluation never needs to own it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessRequest<'a> {
    pub subject: &'a SubjectDescriptor,
    pub object: &'a str,
    pub action: &'a str,
}

impl<'a> AccessRequest<'a> {
    pub fn new(subject: &'a SubjectDescriptor, object: &'a str, action: &'a str) -> Self {
        Self {
            subject,
            object,
            action,
        }
    }
}
