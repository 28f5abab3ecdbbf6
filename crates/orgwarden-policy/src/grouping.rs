use orgwarden_core::GroupingTuple;
use std::collections::{BTreeMap, BTreeSet};

/// The role relation `g`: role → concrete permissions it implies.
///
/// Membership is single-hop: `resolve("owner", "read")` is true only for a
/// registered `(owner, read)` edge, never through a chain of roles. Edges
/// are a set, so every insertion is idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingResolver {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl GroupingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tuples<'a, I>(tuples: I) -> Self
    where
        I: IntoIterator<Item = &'a GroupingTuple>,
    {
        let mut resolver = Self::new();
        for t in tuples {
            resolver.ensure_edge(&t.role, &t.permission);
        }
        resolver
    }

    pub fn resolve(&self, role: &str, permission: &str) -> bool {
        self.edges
            .get(role)
            .is_some_and(|perms| perms.contains(permission))
    }

    /// Insert `(role, permission)` if absent; true if it was inserted.
    pub fn ensure_edge(&mut self, role: &str, permission: &str) -> bool {
        if self.resolve(role, permission) {
            return false;
        }
        self.edges
            .entry(role.to_string())
            .or_default()
            .insert(permission.to_string())
    }

    /// Batch form of [`ensure_edge`](Self::ensure_edge). Returns the
    /// permissions that were newly inserted, in input order.
    pub fn ensure_edges<I, S>(&mut self, role: &str, permissions: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        permissions
            .into_iter()
            .filter_map(|p| {
                let p = p.as_ref();
                self.ensure_edge(role, p).then(|| p.to_string())
            })
            .collect()
    }

    pub fn remove_edge(&mut self, role: &str, permission: &str) -> bool {
        let Some(perms) = self.edges.get_mut(role) else {
            return false;
        };
        let removed = perms.remove(permission);
        if perms.is_empty() {
            self.edges.remove(role);
        }
        removed
    }

    pub fn permissions_of(&self, role: &str) -> Vec<&str> {
        self.edges
            .get(role)
            .map(|perms| perms.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// All edges, ordered by role then permission.
    pub fn edges(&self) -> impl Iterator<Item = GroupingTuple> + '_ {
        self.edges.iter().flat_map(|(role, perms)| {
            perms
                .iter()
                .map(move |perm| GroupingTuple::new(role.clone(), perm.clone()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OWNER_PERMISSIONS, OWNER_ROLE};

    #[test]
    fn test_resolve_registered_edge() {
        let mut r = GroupingResolver::new();
        assert!(!r.resolve("owner", "read"));
        assert!(r.ensure_edge("owner", "read"));
        assert!(r.resolve("owner", "read"));
        assert!(!r.resolve("owner", "write"));
        assert!(!r.resolve("read", "owner"));
    }

    #[test]
    fn test_ensure_edge_idempotent() {
        let mut r = GroupingResolver::new();
        assert!(r.ensure_edge("owner", "read"));
        assert!(!r.ensure_edge("owner", "read"));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_ensure_edges_reports_only_new() {
        let mut r = GroupingResolver::new();
        r.ensure_edge(OWNER_ROLE, "write");
        let added = r.ensure_edges(OWNER_ROLE, OWNER_PERMISSIONS);
        assert_eq!(added, vec!["read", "download", "share", "delete"]);
        let again = r.ensure_edges(OWNER_ROLE, OWNER_PERMISSIONS);
        assert!(again.is_empty());
        assert_eq!(r.len(), 5);
    }

    #[test]
    fn test_single_hop_only() {
        let mut r = GroupingResolver::new();
        r.ensure_edge("owner", "editor");
        r.ensure_edge("editor", "write");
        assert!(!r.resolve("owner", "write"));
    }

    #[test]
    fn test_remove_edge() {
        let mut r = GroupingResolver::new();
        r.ensure_edge("owner", "read");
        assert!(r.remove_edge("owner", "read"));
        assert!(!r.remove_edge("owner", "read"));
        assert!(!r.remove_edge("viewer", "read"));
        assert!(r.is_empty());
    }

    #[test]
    fn test_from_tuples_dedups() {
        let tuples = vec![
            GroupingTuple::new("owner", "read"),
            GroupingTuple::new("owner", "read"),
            GroupingTuple::new("viewer", "read"),
        ];
        let r = GroupingResolver::from_tuples(&tuples);
        assert_eq!(r.len(), 2);
        let edges: Vec<GroupingTuple> = r.edges().collect();
        assert_eq!(edges[0], GroupingTuple::new("owner", "read"));
        assert_eq!(edges[1], GroupingTuple::new("viewer", "read"));
    }

    #[test]
    fn test_permissions_of() {
        let mut r = GroupingResolver::new();
        r.ensure_edges(OWNER_ROLE, ["write", "read"]);
        assert_eq!(r.permissions_of(OWNER_ROLE), vec!["read", "write"]);
        assert!(r.permissions_of("nobody").is_empty());
    }
}
