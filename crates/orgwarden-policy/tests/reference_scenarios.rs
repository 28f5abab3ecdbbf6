//! Decisions against the reference policy set in `config/policy.csv`.
//!
//! The set has one owner (user 2 on object 1), one team grant (team 1 may
//! read object 1) and an org-wide grant (org 1 may read and download
//! object 2). Every tuple belongs to org 1.

use orgwarden_core::{PolicyStore, PolicyTuple, SubjectDescriptor};
use orgwarden_policy::{
    Clause, CsvFilePolicyStore, Enforcer, InMemoryPolicyStore, OWNER_PERMISSIONS, OWNER_ROLE,
};

const REFERENCE_POLICY: &str = include_str!("../../../config/policy.csv");

fn enforcer() -> Enforcer {
    let store = InMemoryPolicyStore::from_text(REFERENCE_POLICY).unwrap();
    Enforcer::new(store).unwrap()
}

fn member(user: &str) -> SubjectDescriptor {
    SubjectDescriptor::new(user)
        .with_team("2")
        .with_dept("1")
        .with_org("1")
        .with_roles(["slave"])
        .with_teams(["1"])
}

#[test]
fn user_without_grant_cannot_read_unlisted_object() {
    let e = enforcer();
    assert!(!e.evaluate(&member("1"), "3", "read").unwrap());
}

#[test]
fn owner_gets_every_owner_permission() {
    let e = enforcer();
    let owner = member("2").with_team("1");
    for action in ["read", "download", "delete"] {
        let decision = e.evaluate_explained(&owner, "1", action).unwrap();
        assert!(decision.allowed, "owner should be allowed to {action}");
        assert_eq!(decision.grant.unwrap().clause, Clause::RoleExpansion);
    }
    for action in OWNER_PERMISSIONS {
        assert!(e.evaluate(&owner, "1", action).unwrap());
    }
    assert!(!e.evaluate(&owner, "1", "administer").unwrap());
}

#[test]
fn team_member_can_only_read() {
    let e = enforcer();
    let sub = SubjectDescriptor::new("3")
        .with_team("1")
        .with_teams(["1", "2"]);
    let read = e.evaluate_explained(&sub, "1", "read").unwrap();
    assert!(read.allowed);
    assert_eq!(read.grant.unwrap().clause, Clause::TeamGrant);
    assert!(!e.evaluate(&sub, "1", "share").unwrap());
}

#[test]
fn org_members_read_and_download_only() {
    let e = enforcer();
    let sub = SubjectDescriptor::new("3").with_org("1");
    let download = e.evaluate_explained(&sub, "2", "download").unwrap();
    assert!(download.allowed);
    assert_eq!(download.grant.unwrap().clause, Clause::OrgGrant);
    assert!(e.evaluate(&sub, "2", "read").unwrap());
    assert!(!e.evaluate(&sub, "2", "delete").unwrap());
}

#[test]
fn org_admin_has_full_access_in_own_org() {
    let e = enforcer();
    let admin = SubjectDescriptor::new("4")
        .with_team("1")
        .with_dept("1")
        .with_org("1")
        .with_roles(["admin", "team_lead"])
        .with_teams(["1", "2"]);
    for (object, action) in [("1", "write"), ("1", "delete"), ("2", "write"), ("2", "delete")] {
        assert!(
            e.evaluate(&admin, object, action).unwrap(),
            "admin should be allowed to {action} object {object}"
        );
    }
    let decision = e.evaluate_explained(&admin, "1", "write").unwrap();
    assert_eq!(decision.grant.unwrap().clause, Clause::OrgAdminOverride);
}

#[test]
fn admin_of_other_org_is_denied() {
    let e = enforcer();
    let admin = SubjectDescriptor::new("5")
        .with_team("4")
        .with_dept("4")
        .with_org("2")
        .with_roles(["admin", "team_lead"])
        .with_teams(["1", "2"]);
    assert!(!e.evaluate(&admin, "2", "write").unwrap());
    assert!(!e.evaluate(&admin, "2", "delete").unwrap());
    // team 1 membership still grants the team read on object 1
    assert!(e.evaluate(&admin, "1", "read").unwrap());
}

#[test]
fn public_share_reaches_every_subject() {
    let e = enforcer();
    e.add_policy(PolicyTuple::public("4", "read", "1")).unwrap();
    let subjects = [
        SubjectDescriptor::new("99"),
        member("1"),
        SubjectDescriptor::new("5").with_org("2").with_roles(["admin"]),
    ];
    for sub in &subjects {
        assert!(e.evaluate(sub, "4", "read").unwrap());
        assert!(!e.evaluate(sub, "4", "write").unwrap());
    }
}

#[test]
fn evaluation_is_repeatable() {
    let e = enforcer();
    let sub = member("2");
    let first = e.evaluate_explained(&sub, "1", "share").unwrap();
    for _ in 0..10 {
        assert_eq!(e.evaluate_explained(&sub, "1", "share").unwrap(), first);
    }
}

#[test]
fn loading_a_file_never_rewrites_it() {
    let dir = std::env::temp_dir().join(format!("orgwarden-readonly-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("policy.csv");
    std::fs::write(&path, REFERENCE_POLICY).unwrap();

    let e = Enforcer::new(CsvFilePolicyStore::open(&path).unwrap()).unwrap();
    assert!(e.evaluate(&member("2"), "1", "delete").unwrap());
    e.reload().unwrap();
    assert_eq!(e.groupings().len(), 5);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), REFERENCE_POLICY);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn explicit_bootstrap_persists_owner_edges_once() {
    let dir = std::env::temp_dir().join(format!("orgwarden-scenarios-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("policy.csv");
    std::fs::write(&path, REFERENCE_POLICY).unwrap();

    let e = Enforcer::new(CsvFilePolicyStore::open(&path).unwrap()).unwrap();
    assert_eq!(e.bootstrap_owner_role().unwrap().len(), 5);
    assert!(e.bootstrap_owner_role().unwrap().is_empty());
    drop(e);

    let store = CsvFilePolicyStore::open(&path).unwrap();
    let groupings = store.load_groupings().unwrap();
    assert_eq!(groupings.len(), 5);
    assert!(groupings.iter().all(|g| g.role == OWNER_ROLE));
    assert_eq!(store.load_policies().unwrap().len(), 4);

    // a second engine over the same file adds nothing
    let e = Enforcer::new(store).unwrap();
    assert!(e.bootstrap_owner_role().unwrap().is_empty());
    assert_eq!(e.groupings().len(), 5);
    assert_eq!(
        std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .filter(|l| l.starts_with("g,"))
            .count(),
        5
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn reload_picks_up_file_changes() {
    let dir = std::env::temp_dir().join(format!("orgwarden-reload-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("policy.csv");
    std::fs::write(&path, REFERENCE_POLICY).unwrap();

    let e = Enforcer::new(CsvFilePolicyStore::open(&path).unwrap()).unwrap();
    let sub = SubjectDescriptor::new("8").with_dept("7");
    assert!(!e.evaluate(&sub, "6", "write").unwrap());

    let mut text = std::fs::read_to_string(&path).unwrap();
    text.push_str("p, 7, 6, write, dept, 1\n");
    std::fs::write(&path, &text).unwrap();
    e.reload().unwrap();
    assert!(e.evaluate(&sub, "6", "write").unwrap());

    // a broken edit is rejected and the last good snapshot keeps serving
    text.push_str("p, 7, 6\n");
    std::fs::write(&path, &text).unwrap();
    assert!(e.reload().is_err());
    assert!(e.evaluate(&sub, "6", "write").unwrap());

    let _ = std::fs::remove_dir_all(&dir);
}
