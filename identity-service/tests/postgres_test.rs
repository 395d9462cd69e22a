//! Concurrency and cascade behaviour against a real PostgreSQL database.
//!
//! Run with `TEST_DATABASE_URL=postgres://... cargo test -- --ignored`.
//! Every test uses uuid-suffixed names, so a shared database can be reused.

use futures::future::join_all;
use identity_service::{
    config::DatabaseConfig,
    models::{NewAccount, NewGroup},
    services::{CredentialStore, GroupRegistry, MembershipGraph, ServiceError},
    store::{IdentityStore, PostgresStore},
    utils::{CredentialHasher, Password},
};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

struct PgServices {
    credentials: CredentialStore,
    groups: GroupRegistry,
    membership: MembershipGraph,
}

async fn setup() -> PgServices {
    service_core::observability::init_test_tracing();

    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let config = DatabaseConfig {
        url,
        max_connections: 8,
        min_connections: 1,
        acquire_timeout_seconds: 10,
    };
    let store = PostgresStore::connect(&config)
        .await
        .expect("Failed to connect to PostgreSQL");
    store
        .run_migrations()
        .await
        .expect("Failed to run migrations");

    let store: Arc<dyn IdentityStore> = Arc::new(store);
    let hasher = CredentialHasher::with_cost(1024, 1, 1).expect("Failed to build hasher");
    let membership = MembershipGraph::new(store.clone());
    PgServices {
        credentials: CredentialStore::new(store.clone(), hasher, membership.clone()),
        groups: GroupRegistry::new(store, membership.clone()),
        membership,
    }
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

fn new_account(username: &str, email: &str) -> NewAccount {
    NewAccount {
        username: username.to_string(),
        email: email.to_string(),
        password: Password::new("secret1"),
        is_admin: false,
        is_active: true,
        group_ids: Vec::new(),
    }
}

async fn create_account(services: &PgServices, prefix: &str) -> Uuid {
    let username = unique(prefix);
    services
        .credentials
        .create_account(new_account(&username, &format!("{}@x.com", username)))
        .await
        .expect("Failed to create account")
        .account_id
}

async fn create_group(services: &PgServices, prefix: &str) -> Uuid {
    services
        .groups
        .create_group(NewGroup {
            name: unique(prefix),
            description: String::new(),
        })
        .await
        .expect("Failed to create group")
        .group
        .group_id
}

async fn group_set(services: &PgServices, account_id: Uuid) -> BTreeSet<Uuid> {
    services
        .membership
        .groups_of(account_id)
        .await
        .unwrap()
        .into_iter()
        .map(|g| g.group_id)
        .collect()
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL (TEST_DATABASE_URL)
async fn concurrent_same_username_creates_yield_one_account() {
    let services = setup().await;
    let username = unique("bob");

    let results = join_all((0..4).map(|i| {
        services.credentials.create_account(new_account(
            &username,
            &format!("{}-{}@x.com", username, i),
        ))
    }))
    .await;

    let created = results.iter().filter(|r| r.is_ok()).count();
    let taken = results
        .iter()
        .filter(|r| matches!(r, Err(ServiceError::UsernameTaken)))
        .count();
    assert_eq!(created, 1);
    assert_eq!(taken, 3);

    let matching = services
        .credentials
        .list_accounts()
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.username == username)
        .count();
    assert_eq!(matching, 1);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL (TEST_DATABASE_URL)
async fn concurrent_toggles_do_not_lose_updates() {
    let services = setup().await;
    let account_id = create_account(&services, "toggle").await;

    // An even number of flips must land back on the starting value.
    let results = join_all((0..6).map(|_| services.credentials.toggle_active(account_id))).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let account = services.credentials.get_account(account_id).await.unwrap();
    assert!(account.is_active);

    let results = join_all((0..5).map(|_| services.credentials.toggle_admin(account_id))).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let account = services.credentials.get_account(account_id).await.unwrap();
    assert!(account.is_admin);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL (TEST_DATABASE_URL)
async fn account_delete_cascades_memberships() {
    let services = setup().await;
    let editors = create_group(&services, "editors").await;
    let alice = create_account(&services, "alice").await;
    let bob = create_account(&services, "bob").await;
    services.membership.add_membership(alice, editors).await.unwrap();
    services.membership.add_membership(bob, editors).await.unwrap();

    services.credentials.delete_account(alice).await.unwrap();

    let members: Vec<Uuid> = services
        .membership
        .members_of(editors)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.account_id)
        .collect();
    assert_eq!(members, vec![bob]);
    assert!(matches!(
        services.credentials.get_account(alice).await,
        Err(ServiceError::AccountNotFound)
    ));
    assert_eq!(services.groups.get_group(editors).await.unwrap().member_count, 1);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL (TEST_DATABASE_URL)
async fn group_delete_cascades_memberships() {
    let services = setup().await;
    let editors = create_group(&services, "editors").await;
    let viewers = create_group(&services, "viewers").await;
    let alice = create_account(&services, "alice").await;
    services
        .membership
        .replace_groups_of(alice, &[editors, viewers])
        .await
        .unwrap();

    services.groups.delete_group(editors).await.unwrap();

    assert_eq!(group_set(&services, alice).await, BTreeSet::from([viewers]));
    assert!(matches!(
        services.groups.get_group(editors).await,
        Err(ServiceError::GroupNotFound)
    ));
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL (TEST_DATABASE_URL)
async fn concurrent_replacements_apply_one_after_another() {
    let services = setup().await;
    let editors = create_group(&services, "editors").await;
    let viewers = create_group(&services, "viewers").await;
    let alice = create_account(&services, "alice").await;

    for _ in 0..25 {
        services.membership.replace_groups_of(alice, &[]).await.unwrap();

        let editors_only = [editors];
        let viewers_only = [viewers];
        let (a, b) = tokio::join!(
            services.membership.replace_groups_of(alice, &editors_only),
            services.membership.replace_groups_of(alice, &viewers_only),
        );
        a.unwrap();
        b.unwrap();

        let groups = group_set(&services, alice).await;
        assert!(
            groups == BTreeSet::from([editors]) || groups == BTreeSet::from([viewers]),
            "group set {:?} was not requested by either caller",
            groups
        );
    }
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL (TEST_DATABASE_URL)
async fn concurrent_bulk_add_and_replace_keep_exact_set() {
    let services = setup().await;
    let editors = create_group(&services, "editors").await;
    let viewers = create_group(&services, "viewers").await;
    let alice = create_account(&services, "alice").await;

    for _ in 0..25 {
        services.membership.replace_groups_of(alice, &[]).await.unwrap();

        let editors_only = [editors];
        let viewers_only = [viewers];
        let (added, replaced) = tokio::join!(
            services.membership.add_memberships(alice, &editors_only),
            services.membership.replace_groups_of(alice, &viewers_only),
        );
        added.unwrap();
        replaced.unwrap();

        // Either the add ran last (both edges) or the replace did (viewers only).
        let groups = group_set(&services, alice).await;
        assert!(
            groups == BTreeSet::from([editors, viewers]) || groups == BTreeSet::from([viewers]),
            "unexpected group set {:?}",
            groups
        );
    }
}
