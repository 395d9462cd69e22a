use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Account, Group, NewAccount};
use crate::services::{CredentialStore, MembershipGraph};
use crate::store::{IdentityStore, MemoryStore};
use crate::utils::{CredentialHasher, Password};

pub fn fast_hasher() -> CredentialHasher {
    CredentialHasher::with_cost(1024, 1, 1).expect("Failed to build hasher")
}

pub fn credential_store() -> (Arc<dyn IdentityStore>, CredentialStore, MembershipGraph) {
    let store: Arc<dyn IdentityStore> = Arc::new(MemoryStore::new());
    let membership = MembershipGraph::new(store.clone());
    let credentials = CredentialStore::new(store.clone(), fast_hasher(), membership.clone());
    (store, credentials, membership)
}

pub fn new_account(username: &str, email: &str, password: &str) -> NewAccount {
    NewAccount {
        username: username.to_string(),
        email: email.to_string(),
        password: Password::new(password),
        is_admin: false,
        is_active: true,
        group_ids: Vec::new(),
    }
}

/// Insert an account row directly, bypassing hashing.
pub async fn seed_account(store: &Arc<dyn IdentityStore>, username: &str) -> Uuid {
    let account = Account::new(
        username.to_string(),
        format!("{}@x.com", username),
        "unused".to_string(),
        false,
        true,
    );
    let mut uow = store.begin().await.unwrap();
    uow.insert_account(&account).await.unwrap();
    uow.commit().await.unwrap();
    account.account_id
}

pub async fn seed_group(store: &Arc<dyn IdentityStore>, name: &str) -> Uuid {
    let group = Group::new(name.to_string(), String::new());
    let mut uow = store.begin().await.unwrap();
    uow.insert_group(&group).await.unwrap();
    uow.commit().await.unwrap();
    group.group_id
}
