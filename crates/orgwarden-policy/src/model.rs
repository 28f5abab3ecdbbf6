use std::fmt;

use crate::error::{PolicyError, PolicyResult};
use crate::matcher::Clause;

/// Role whose expansion is seeded at startup.
pub const OWNER_ROLE: &str = "owner";

/// Concrete permissions implied by [`OWNER_ROLE`].
pub const OWNER_PERMISSIONS: [&str; 5] = ["read", "write", "download", "share", "delete"];

/// Role that triggers the org-admin override.
pub const ADMIN_ROLE: &str = "admin";

/// Row tag of policy tuples.
pub const POLICY_TYPE: &str = "p";

/// Row tag of the role relation (the owner-role-expansion relation).
pub const ROLE_RELATION: &str = "g";

/// How per-tuple matcher results combine into a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Allow iff some tuple satisfies the matcher.
    SomeAllow,
}

/// The fixed schema of the engine: request and policy shapes, the role
/// relation, the effect rule and the ordered matcher clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyModel {
    request_fields: &'static [&'static str],
    policy_fields: &'static [&'static str],
    effect: Effect,
    clauses: Vec<Clause>,
}

impl Default for PolicyModel {
    fn default() -> Self {
        Self {
            request_fields: &["sub", "obj", "act"],
            policy_fields: &["sub", "obj", "act", "pgrp", "orgId"],
            effect: Effect::SomeAllow,
            clauses: Clause::ORDERED.to_vec(),
        }
    }
}

impl PolicyModel {
    pub fn request_fields(&self) -> &[&'static str] {
        self.request_fields
    }

    pub fn policy_fields(&self) -> &[&'static str] {
        self.policy_fields
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Reject a model whose shapes or clause list deviate from the schema.
    pub fn validate(&self) -> PolicyResult<()> {
        if self.request_fields.len() != 3 {
            return Err(PolicyError::ModelError(format!(
                "request definition must have 3 fields, got {}",
                self.request_fields.len()
            )));
        }
        if self.policy_fields.len() != 5 {
            return Err(PolicyError::ModelError(format!(
                "policy definition must have 5 fields, got {}",
                self.policy_fields.len()
            )));
        }
        if self.clauses.as_slice() != Clause::ORDERED.as_slice() {
            let listed: Vec<String> = self.clauses.iter().map(|c| c.to_string()).collect();
            return Err(PolicyError::ModelError(format!(
                "matcher must list the seven clauses in order, got [{}]",
                listed.join(", ")
            )));
        }
        Ok(())
    }
}

impl fmt::Display for PolicyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[request_definition]")?;
        writeln!(f, "r = {}", self.request_fields.join(", "))?;
        writeln!(f)?;
        writeln!(f, "[policy_definition]")?;
        writeln!(f, "{} = {}", POLICY_TYPE, self.policy_fields.join(", "))?;
        writeln!(f)?;
        writeln!(f, "[role_definition]")?;
        writeln!(f, "{} = _, _", ROLE_RELATION)?;
        writeln!(f)?;
        writeln!(f, "[policy_effect]")?;
        match self.effect {
            Effect::SomeAllow => writeln!(f, "e = some(where (p.eft == allow))")?,
        }
        writeln!(f)?;
        writeln!(f, "[matchers]")?;
        let last = self.clauses.len().saturating_sub(1);
        for (i, clause) in self.clauses.iter().enumerate() {
            let lead = if i == 0 { "m = " } else { "    " };
            let tail = if i == last { "" } else { " || \\" };
            writeln!(f, "{}({}){}", lead, clause.expression(), tail)?;
        }
        Ok(())
    }
}
