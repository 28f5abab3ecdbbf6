//! Row codec for the persisted tuple format.
//!
//! One record per line, comma separated, fields trimmed:
//!
//! ```text
//! p, sub, obj, act, pgrp, orgId
//! g, role, permission
//! ```
//!
//! Blank lines and `#` comments are skipped. Anything else that does not
//! parse is a [`WardenError::MalformedRow`] carrying the 1-based line number.

use orgwarden_core::{GroupingTuple, PolicyGroup, PolicyTuple, WardenError, WardenResult};

use crate::model::{POLICY_TYPE, ROLE_RELATION};

/// A single decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Policy(PolicyTuple),
    Grouping(GroupingTuple),
}

/// Every record of a policy document, split by kind, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyRows {
    pub policies: Vec<PolicyTuple>,
    pub groupings: Vec<GroupingTuple>,
}

impl PolicyRows {
    pub fn parse(text: &str) -> WardenResult<Self> {
        let mut rows = Self::default();
        for (idx, line) in text.lines().enumerate() {
            match parse_line(idx + 1, line)? {
                Some(Row::Policy(p)) => rows.policies.push(p),
                Some(Row::Grouping(g)) => rows.groupings.push(g),
                None => {}
            }
        }
        Ok(rows)
    }

    /// Render back to the row format, policies first.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for p in &self.policies {
            out.push_str(&p.to_string());
            out.push('\n');
        }
        for g in &self.groupings {
            out.push_str(&g.to_string());
            out.push('\n');
        }
        out
    }
}

/// Decode one line. `Ok(None)` for blank and comment lines.
pub fn parse_line(line_no: usize, line: &str) -> WardenResult<Option<Row>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let fields: Vec<&str> = trimmed.split(',').map(str::trim).collect();
    let malformed = |reason: String| WardenError::MalformedRow {
        line: line_no,
        reason,
    };

    if let Some(empty) = fields.iter().position(|f| f.is_empty()) {
        return Err(malformed(format!("field {} is empty", empty + 1)));
    }

    match fields[0] {
        POLICY_TYPE => {
            if fields.len() != 6 {
                return Err(malformed(format!(
                    "policy row needs 6 fields (p, sub, obj, act, pgrp, orgId), got {}",
                    fields.len()
                )));
            }
            let group: PolicyGroup = fields[4]
                .parse()
                .map_err(|e: WardenError| malformed(e.to_string()))?;
            let policy = PolicyTuple::new(fields[1], fields[2], fields[3], group, fields[5]);
            policy
                .validate()
                .map_err(|e| malformed(e.to_string()))?;
            Ok(Some(Row::Policy(policy)))
        }
        ROLE_RELATION => {
            if fields.len() != 3 {
                return Err(malformed(format!(
                    "grouping row needs 3 fields (g, role, permission), got {}",
                    fields.len()
                )));
            }
            Ok(Some(Row::Grouping(GroupingTuple::new(fields[1], fields[2]))))
        }
        other => Err(malformed(format!("unknown record type '{}'", other))),
    }
}
