use crate::error::WardenResult;
use crate::types::{GroupingTuple, PolicyTuple};

// ---------------------------------------------------------------------------
// PolicyStore: persistence behind the decision engine
//
// Read in full when an enforcer is built or reloaded. Mutations are only
// ever issued from the enforcer's single writer section, so
// implementations need not make check-then-insert sequences atomic across
// calls; each individual call must still be atomic.
// ---------------------------------------------------------------------------

pub trait PolicyStore: Send {
    fn load_policies(&self) -> WardenResult<Vec<PolicyTuple>>;
    fn load_groupings(&self) -> WardenResult<Vec<GroupingTuple>>;

    /// Policies and groupings read as one consistent view. Stores backed
    /// by a single document should override this to read it once.
    fn load_all(&self) -> WardenResult<(Vec<PolicyTuple>, Vec<GroupingTuple>)> {
        Ok((self.load_policies()?, self.load_groupings()?))
    }

    fn has_grouping(&self, role: &str, permission: &str) -> WardenResult<bool>;

    /// Insert the edge if absent. Returns true if an insertion occurred;
    /// an already-present edge is not an error.
    fn add_grouping(&mut self, role: &str, permission: &str) -> WardenResult<bool>;

    /// Batch form of `add_grouping`; returns the edges actually inserted.
    fn add_groupings(&mut self, edges: &[GroupingTuple]) -> WardenResult<Vec<GroupingTuple>> {
        let mut added = Vec::new();
        for edge in edges {
            if self.add_grouping(&edge.role, &edge.permission)? {
                added.push(edge.clone());
            }
        }
        Ok(added)
    }

    fn remove_grouping(&mut self, role: &str, permission: &str) -> WardenResult<bool>;

    /// Returns true if the tuple was not already stored.
    fn add_policy(&mut self, policy: &PolicyTuple) -> WardenResult<bool>;

    fn remove_policy(&mut self, policy: &PolicyTuple) -> WardenResult<bool>;
}
