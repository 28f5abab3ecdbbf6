use orgwarden_core::{GroupingTuple, PolicyStore, PolicyTuple, WardenError, WardenResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::rows::PolicyRows;

// ---------------------------------------------------------------------------
// InMemoryPolicyStore
// ---------------------------------------------------------------------------

/// In-memory policy store.
///
/// Useful for tests and for embedding callers that assemble tuples
/// programmatically.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPolicyStore {
    rows: PolicyRows,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: PolicyRows) -> Self {
        Self { rows }
    }

    /// Parse a document in the row format.
    pub fn from_text(text: &str) -> WardenResult<Self> {
        Ok(Self::from_rows(PolicyRows::parse(text)?))
    }

    pub fn with_policy(mut self, policy: PolicyTuple) -> Self {
        self.rows.policies.push(policy);
        self
    }

    pub fn with_grouping(mut self, grouping: GroupingTuple) -> Self {
        self.rows.groupings.push(grouping);
        self
    }

    pub fn rows(&self) -> &PolicyRows {
        &self.rows
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn load_policies(&self) -> WardenResult<Vec<PolicyTuple>> {
        Ok(self.rows.policies.clone())
    }

    fn load_groupings(&self) -> WardenResult<Vec<GroupingTuple>> {
        Ok(self.rows.groupings.clone())
    }

    fn has_grouping(&self, role: &str, permission: &str) -> WardenResult<bool> {
        Ok(has_edge(&self.rows, role, permission))
    }

    fn add_grouping(&mut self, role: &str, permission: &str) -> WardenResult<bool> {
        Ok(insert_edge(&mut self.rows, role, permission))
    }

    fn remove_grouping(&mut self, role: &str, permission: &str) -> WardenResult<bool> {
        Ok(remove_edge(&mut self.rows, role, permission))
    }

    fn add_policy(&mut self, policy: &PolicyTuple) -> WardenResult<bool> {
        Ok(insert_policy(&mut self.rows, policy))
    }

    fn remove_policy(&mut self, policy: &PolicyTuple) -> WardenResult<bool> {
        Ok(remove_policy(&mut self.rows, policy))
    }
}

// ---------------------------------------------------------------------------
// CsvFilePolicyStore
// ---------------------------------------------------------------------------

/// Policy store backed by a single row-format file.
///
/// Every read parses the whole file. Every mutation rewrites it through a
/// temporary sibling file and a rename, so readers never see a partially
/// written document. Comments are not preserved across a rewrite.
#[derive(Debug, Clone)]
pub struct CsvFilePolicyStore {
    path: PathBuf,
}

impl CsvFilePolicyStore {
    /// Open an existing policy file.
    pub fn open(path: impl Into<PathBuf>) -> WardenResult<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(WardenError::Io(format!(
                "policy file not found: {}",
                path.display()
            )));
        }
        Ok(Self { path })
    }

    /// Open a policy file, creating an empty one (and its parent
    /// directories) if it does not exist.
    pub fn open_or_create(path: impl Into<PathBuf>) -> WardenResult<Self> {
        let path = path.into();
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, "")?;
            tracing::info!(path = %path.display(), "created empty policy file");
        }
        Self::open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_rows(&self) -> WardenResult<PolicyRows> {
        let text = std::fs::read_to_string(&self.path)?;
        PolicyRows::parse(&text)
    }

    /// Sibling temp file, unique per process and per write.
    fn temp_path(&self) -> WardenResult<PathBuf> {
        static WRITES: AtomicU64 = AtomicU64::new(0);
        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                WardenError::Store(format!("invalid policy file path: {}", self.path.display()))
            })?;
        let seq = WRITES.fetch_add(1, Ordering::Relaxed);
        Ok(self.path.with_file_name(format!(
            ".{}.{}.{}.tmp",
            file_name,
            std::process::id(),
            seq
        )))
    }

    fn write_rows(&self, rows: &PolicyRows) -> WardenResult<()> {
        let tmp = self.temp_path()?;
        std::fs::write(&tmp, rows.render())?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            WardenError::Store(format!(
                "failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Read, apply `f`, and write back only if `f` reports a change.
    fn update<T>(&mut self, f: impl FnOnce(&mut PolicyRows) -> (T, bool)) -> WardenResult<T> {
        let mut rows = self.read_rows()?;
        let (result, changed) = f(&mut rows);
        if changed {
            self.write_rows(&rows)?;
        }
        Ok(result)
    }
}

impl PolicyStore for CsvFilePolicyStore {
    fn load_policies(&self) -> WardenResult<Vec<PolicyTuple>> {
        Ok(self.read_rows()?.policies)
    }

    fn load_groupings(&self) -> WardenResult<Vec<GroupingTuple>> {
        Ok(self.read_rows()?.groupings)
    }

    fn load_all(&self) -> WardenResult<(Vec<PolicyTuple>, Vec<GroupingTuple>)> {
        let rows = self.read_rows()?;
        Ok((rows.policies, rows.groupings))
    }

    fn has_grouping(&self, role: &str, permission: &str) -> WardenResult<bool> {
        Ok(has_edge(&self.read_rows()?, role, permission))
    }

    fn add_grouping(&mut self, role: &str, permission: &str) -> WardenResult<bool> {
        self.update(|rows| {
            let added = insert_edge(rows, role, permission);
            (added, added)
        })
    }

    fn add_groupings(&mut self, edges: &[GroupingTuple]) -> WardenResult<Vec<GroupingTuple>> {
        self.update(|rows| {
            let added: Vec<GroupingTuple> = edges
                .iter()
                .filter(|e| insert_edge(rows, &e.role, &e.permission))
                .cloned()
                .collect();
            let changed = !added.is_empty();
            (added, changed)
        })
    }

    fn remove_grouping(&mut self, role: &str, permission: &str) -> WardenResult<bool> {
        self.update(|rows| {
            let removed = remove_edge(rows, role, permission);
            (removed, removed)
        })
    }

    fn add_policy(&mut self, policy: &PolicyTuple) -> WardenResult<bool> {
        self.update(|rows| {
            let added = insert_policy(rows, policy);
            (added, added)
        })
    }

    fn remove_policy(&mut self, policy: &PolicyTuple) -> WardenResult<bool> {
        self.update(|rows| {
            let removed = remove_policy(rows, policy);
            (removed, removed)
        })
    }
}

// ---------------------------------------------------------------------------
// Row set helpers shared by both stores
// ---------------------------------------------------------------------------

fn has_edge(rows: &PolicyRows, role: &str, permission: &str) -> bool {
    rows.groupings
        .iter()
        .any(|g| g.role == role && g.permission == permission)
}

fn insert_edge(rows: &mut PolicyRows, role: &str, permission: &str) -> bool {
    if has_edge(rows, role, permission) {
        return false;
    }
    rows.groupings.push(GroupingTuple::new(role, permission));
    true
}

fn remove_edge(rows: &mut PolicyRows, role: &str, permission: &str) -> bool {
    let before = rows.groupings.len();
    rows.groupings
        .retain(|g| !(g.role == role && g.permission == permission));
    rows.groupings.len() != before
}

fn insert_policy(rows: &mut PolicyRows, policy: &PolicyTuple) -> bool {
    if rows.policies.contains(policy) {
        return false;
    }
    rows.policies.push(policy.clone());
    true
}

fn remove_policy(rows: &mut PolicyRows, policy: &PolicyTuple) -> bool {
    let before = rows.policies.len();
    rows.policies.retain(|p| p != policy);
    rows.policies.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgwarden_core::PolicyGroup;

    fn temp_policy_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "orgwarden-store-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir.join("policy.csv")
    }

    #[test]
    fn test_in_memory_grouping_idempotent() {
        let mut store = InMemoryPolicyStore::new();
        assert!(store.add_grouping("owner", "read").unwrap());
        assert!(!store.add_grouping("owner", "read").unwrap());
        assert!(store.has_grouping("owner", "read").unwrap());
        assert_eq!(store.load_groupings().unwrap().len(), 1);
    }

    #[test]
    fn test_in_memory_batch_add_reports_new_edges() {
        let mut store =
            InMemoryPolicyStore::new().with_grouping(GroupingTuple::new("owner", "read"));
        let added = store
            .add_groupings(&[
                GroupingTuple::new("owner", "read"),
                GroupingTuple::new("owner", "write"),
            ])
            .unwrap();
        assert_eq!(added, vec![GroupingTuple::new("owner", "write")]);
    }

    #[test]
    fn test_in_memory_policy_add_remove() {
        let p = PolicyTuple::new("1", "2", "read", PolicyGroup::Org, "1");
        let mut store = InMemoryPolicyStore::new();
        assert!(store.add_policy(&p).unwrap());
        assert!(!store.add_policy(&p).unwrap());
        assert!(store.remove_policy(&p).unwrap());
        assert!(!store.remove_policy(&p).unwrap());
        assert!(store.load_policies().unwrap().is_empty());
    }

    #[test]
    fn test_in_memory_from_text_rejects_malformed() {
        let err = InMemoryPolicyStore::from_text("p, 1, 2, read\n").unwrap_err();
        assert!(matches!(err, WardenError::MalformedRow { line: 1, .. }));
    }

    #[test]
    fn test_file_store_open_missing() {
        let path = temp_policy_path("missing");
        assert!(matches!(
            CsvFilePolicyStore::open(&path),
            Err(WardenError::Io(_))
        ));
    }

    #[test]
    fn test_file_store_write_through() {
        let path = temp_policy_path("write-through");
        let mut store = CsvFilePolicyStore::open_or_create(&path).unwrap();
        assert!(store.load_policies().unwrap().is_empty());

        let p = PolicyTuple::new("2", "1", "owner", PolicyGroup::User, "1");
        assert!(store.add_policy(&p).unwrap());
        assert!(store.add_grouping("owner", "read").unwrap());
        assert!(!store.add_grouping("owner", "read").unwrap());

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "p, 2, 1, owner, user, 1\ng, owner, read\n");

        let reopened = CsvFilePolicyStore::open(&path).unwrap();
        let (policies, groupings) = reopened.load_all().unwrap();
        assert_eq!(policies, vec![p]);
        assert_eq!(groupings, vec![GroupingTuple::new("owner", "read")]);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_store_batch_add_single_rewrite() {
        let path = temp_policy_path("batch");
        let mut store = CsvFilePolicyStore::open_or_create(&path).unwrap();
        let edges: Vec<GroupingTuple> = ["read", "write"]
            .iter()
            .map(|p| GroupingTuple::new("owner", *p))
            .collect();
        assert_eq!(store.add_groupings(&edges).unwrap().len(), 2);
        assert!(store.add_groupings(&edges).unwrap().is_empty());
        assert_eq!(store.load_groupings().unwrap().len(), 2);
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "policy.csv")
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_temp_path_unique_per_write() {
        let store = CsvFilePolicyStore {
            path: PathBuf::from("/var/lib/orgwarden/policy.csv"),
        };
        let a = store.temp_path().unwrap();
        let b = store.temp_path().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.parent(), store.path().parent());
        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(&format!(".policy.csv.{}.", std::process::id())));
        assert!(name.ends_with(".tmp"));
    }

    #[test]
    fn test_file_store_remove() {
        let path = temp_policy_path("remove");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "p, 1, 1, read, team, 1\ng, owner, read\n").unwrap();
        let mut store = CsvFilePolicyStore::open(&path).unwrap();

        let p = PolicyTuple::new("1", "1", "read", PolicyGroup::Team, "1");
        assert!(store.remove_policy(&p).unwrap());
        assert!(store.remove_grouping("owner", "read").unwrap());
        assert!(!store.remove_grouping("owner", "read").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_store_malformed_file() {
        let path = temp_policy_path("malformed");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "p, 1, 1, read, team, 1\nx, broken\n").unwrap();
        let store = CsvFilePolicyStore::open(&path).unwrap();
        assert!(matches!(
            store.load_all(),
            Err(WardenError::MalformedRow { line: 2, .. })
        ));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
