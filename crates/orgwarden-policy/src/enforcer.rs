use arc_swap::ArcSwap;
use orgwarden_core::{AccessRequest, GroupingTuple, PolicyStore, PolicyTuple, SubjectDescriptor};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ErrorClass, PolicyError, PolicyResult};
use crate::grouping::GroupingResolver;
use crate::matcher::MatchOutcome;
use crate::model::{PolicyModel, OWNER_PERMISSIONS, OWNER_ROLE};
use crate::types::{Decision, PolicySnapshot, SnapshotVersion};

/// Construction options for [`Enforcer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnforcerOptions {
    /// Seed the owner role expansion into every loaded snapshot. This never
    /// writes to the store; [`Enforcer::bootstrap_owner_role`] does.
    pub bootstrap_owner_role: bool,
}

impl Default for EnforcerOptions {
    fn default() -> Self {
        Self {
            bootstrap_owner_role: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Enforcer: the decision facade
// ---------------------------------------------------------------------------

/// Decision facade over a published [`PolicySnapshot`].
///
/// Readers load the current `Arc<PolicySnapshot>` without taking a lock;
/// matching runs against that `Arc`. Writers (bootstrap, reload, add/remove)
/// are serialized by the mutex that owns the store: they write through the
/// store first and only then publish a complete replacement snapshot, so an
/// evaluation sees either the old state or the new one, never a mix.
pub struct Enforcer {
    model: PolicyModel,
    options: EnforcerOptions,
    current: ArcSwap<PolicySnapshot>,
    writer: Mutex<Box<dyn PolicyStore>>,
}

impl Enforcer {
    /// Load from `store` with default options. Fails rather than starting
    /// with a partial snapshot.
    pub fn new(store: impl PolicyStore + 'static) -> PolicyResult<Self> {
        Self::with_options(Box::new(store), EnforcerOptions::default())
    }

    pub fn with_options(
        store: Box<dyn PolicyStore>,
        options: EnforcerOptions,
    ) -> PolicyResult<Self> {
        let model = PolicyModel::default();
        model.validate()?;

        let snapshot = load_snapshot(store.as_ref(), SnapshotVersion::initial(), options)
            .map_err(startup_error)?;
        tracing::info!(
            policies = snapshot.policies().len(),
            groupings = snapshot.roles().len(),
            version = %snapshot.version,
            loaded_at = %snapshot.loaded_at,
            "policy snapshot loaded"
        );

        Ok(Self {
            model,
            options,
            current: ArcSwap::from_pointee(snapshot),
            writer: Mutex::new(store),
        })
    }

    pub fn model(&self) -> &PolicyModel {
        &self.model
    }

    pub fn options(&self) -> EnforcerOptions {
        self.options
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.current.load_full()
    }

    /// Decide whether `subject` may perform `action` on `object`.
    pub fn evaluate(
        &self,
        subject: &SubjectDescriptor,
        object: &str,
        action: &str,
    ) -> PolicyResult<bool> {
        let request = AccessRequest::new(subject, object, action);
        Ok(self.evaluate_request(&request)?.allowed)
    }

    /// Like [`evaluate`](Self::evaluate), but returns the matched tuple and
    /// clause as well.
    pub fn evaluate_explained(
        &self,
        subject: &SubjectDescriptor,
        object: &str,
        action: &str,
    ) -> PolicyResult<Decision> {
        self.evaluate_request(&AccessRequest::new(subject, object, action))
    }

    pub fn evaluate_request(&self, request: &AccessRequest<'_>) -> PolicyResult<Decision> {
        validate_request(request)?;
        let snapshot = self.current.load();
        let decision = snapshot.decide(request);
        tracing::debug!(
            user = %request.subject.user_id,
            object = %request.object,
            action = %request.action,
            allowed = decision.allowed,
            clause = ?decision.grant.as_ref().map(|g| g.clause.number()),
            version = %decision.snapshot_version,
            "access evaluated"
        );
        Ok(decision)
    }

    /// Every (tuple, clause) pair that grants the request, not just the
    /// first. Empty when the request is denied.
    pub fn all_matches(
        &self,
        subject: &SubjectDescriptor,
        object: &str,
        action: &str,
    ) -> PolicyResult<Vec<MatchOutcome>> {
        let request = AccessRequest::new(subject, object, action);
        validate_request(&request)?;
        Ok(self.current.load().all_matches(&request))
    }

    /// Ensure the owner role expands to the fixed permission set, in the
    /// store and in the published snapshot. Idempotent; returns the
    /// permissions that were missing from either.
    pub fn bootstrap_owner_role(&self) -> PolicyResult<Vec<String>> {
        let mut store = self.lock_writer()?;
        let current = self.snapshot();

        let edges: Vec<GroupingTuple> = OWNER_PERMISSIONS
            .iter()
            .map(|perm| GroupingTuple::new(OWNER_ROLE, *perm))
            .collect();
        let stored = store.add_groupings(&edges)?;

        let mut roles = current.roles().clone();
        let mut added = apply_owner_bootstrap(&mut roles);
        let published = !added.is_empty();
        for edge in stored {
            if !added.contains(&edge.permission) {
                added.push(edge.permission);
            }
        }
        if !added.is_empty() {
            tracing::info!(added = ?added, "owner role expansion bootstrapped");
        }
        if published {
            self.publish(PolicySnapshot::from_parts(
                current.version.next(),
                current.policies().to_vec(),
                roles,
            ));
        }
        Ok(added)
    }

    /// Re-read the store and publish a fresh snapshot. On failure the
    /// previous snapshot stays in place and the error is returned.
    pub fn reload(&self) -> PolicyResult<()> {
        let store = self.lock_writer()?;
        let current = self.snapshot();

        match load_snapshot(&**store, current.version.next(), self.options) {
            Ok(snapshot) => {
                tracing::info!(
                    policies = snapshot.policies().len(),
                    groupings = snapshot.roles().len(),
                    version = %snapshot.version,
                    loaded_at = %snapshot.loaded_at,
                    "policy snapshot reloaded"
                );
                self.publish(snapshot);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    version = %current.version,
                    "reload failed, keeping last good snapshot"
                );
                Err(e)
            }
        }
    }

    /// Add a policy tuple. Returns false if it was already stored.
    pub fn add_policy(&self, policy: PolicyTuple) -> PolicyResult<bool> {
        policy
            .validate()
            .map_err(|e| PolicyError::InvalidRequest(e.to_string()))?;
        let mut store = self.lock_writer()?;
        if !store.add_policy(&policy)? {
            return Ok(false);
        }
        let current = self.snapshot();
        let mut policies = current.policies().to_vec();
        if !policies.contains(&policy) {
            policies.push(policy);
        }
        self.publish(PolicySnapshot::from_parts(
            current.version.next(),
            policies,
            current.roles().clone(),
        ));
        Ok(true)
    }

    /// Remove every copy of a policy tuple. Returns false if none was stored.
    pub fn remove_policy(&self, policy: &PolicyTuple) -> PolicyResult<bool> {
        let mut store = self.lock_writer()?;
        if !store.remove_policy(policy)? {
            return Ok(false);
        }
        let current = self.snapshot();
        let policies: Vec<PolicyTuple> = current
            .policies()
            .iter()
            .filter(|p| *p != policy)
            .cloned()
            .collect();
        self.publish(PolicySnapshot::from_parts(
            current.version.next(),
            policies,
            current.roles().clone(),
        ));
        Ok(true)
    }

    /// Add a role edge. Returns false if it already existed.
    pub fn add_grouping(&self, role: &str, permission: &str) -> PolicyResult<bool> {
        GroupingTuple::new(role, permission)
            .validate()
            .map_err(|e| PolicyError::InvalidRequest(e.to_string()))?;
        let mut store = self.lock_writer()?;
        let current = self.snapshot();
        let stored = store.add_grouping(role, permission)?;
        let mut roles = current.roles().clone();
        let added = roles.ensure_edge(role, permission);
        if added {
            self.publish(PolicySnapshot::from_parts(
                current.version.next(),
                current.policies().to_vec(),
                roles,
            ));
        }
        Ok(stored || added)
    }

    pub fn remove_grouping(&self, role: &str, permission: &str) -> PolicyResult<bool> {
        let mut store = self.lock_writer()?;
        let current = self.snapshot();
        let stored = store.remove_grouping(role, permission)?;
        let mut roles = current.roles().clone();
        let removed = roles.remove_edge(role, permission);
        if removed {
            self.publish(PolicySnapshot::from_parts(
                current.version.next(),
                current.policies().to_vec(),
                roles,
            ));
        }
        Ok(stored || removed)
    }

    pub fn has_grouping(&self, role: &str, permission: &str) -> bool {
        self.current.load().roles().resolve(role, permission)
    }

    pub fn policies(&self) -> Vec<PolicyTuple> {
        self.current.load().policies().to_vec()
    }

    pub fn groupings(&self) -> Vec<GroupingTuple> {
        self.current.load().roles().edges().collect()
    }

    fn lock_writer(&self) -> PolicyResult<MutexGuard<'_, Box<dyn PolicyStore>>> {
        self.writer
            .lock()
            .map_err(|_| PolicyError::InternalError("policy writer lock poisoned".into()))
    }

    fn publish(&self, snapshot: PolicySnapshot) {
        self.current.store(Arc::new(snapshot));
    }
}

/// Reject requests that cannot be evaluated instead of defaulting them.
fn validate_request(request: &AccessRequest<'_>) -> PolicyResult<()> {
    if request.subject.user_id.trim().is_empty() {
        return Err(PolicyError::InvalidRequest(
            "subject user_id must not be empty".to_string(),
        ));
    }
    if request.object.trim().is_empty() {
        return Err(PolicyError::InvalidRequest(
            "object must not be empty".to_string(),
        ));
    }
    if request.action.trim().is_empty() {
        return Err(PolicyError::InvalidRequest(
            "action must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Read the store into a snapshot. With the bootstrap option on, the owner
/// edges are added to the snapshot only; the store is left untouched.
fn load_snapshot(
    store: &dyn PolicyStore,
    version: SnapshotVersion,
    options: EnforcerOptions,
) -> PolicyResult<PolicySnapshot> {
    let (policies, groupings) = store.load_all()?;
    let snapshot = PolicySnapshot::build(version, policies, &groupings)?;
    if !options.bootstrap_owner_role {
        return Ok(snapshot);
    }
    let mut roles = snapshot.roles().clone();
    let added = apply_owner_bootstrap(&mut roles);
    if !added.is_empty() {
        tracing::debug!(added = ?added, "owner role expansion seeded in memory");
    }
    Ok(PolicySnapshot::from_parts(
        version,
        snapshot.policies().to_vec(),
        roles,
    ))
}

fn apply_owner_bootstrap(roles: &mut GroupingResolver) -> Vec<String> {
    roles.ensure_edges(OWNER_ROLE, OWNER_PERMISSIONS)
}

/// Any failure while constructing means the engine never started.
fn startup_error(e: PolicyError) -> PolicyError {
    match e.class() {
        ErrorClass::Startup => e,
        _ => PolicyError::LoadError(e.to_string()),
    }
}
