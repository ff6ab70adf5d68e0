/// Integration tests for tenant provisioning
///
/// These run the full workflow against the in-memory store:
/// - All-new provisioning and its defaults
/// - Admission failures that must not write anything
/// - Existing accounts, directories and scopes
/// - Rollback on fatal failures and policy-downgraded failures
/// - Standalone scope creation

mod common;

use common::{assert_empty, broken_engine, engine, new_bundle, TestContext, PASSWORD};
use tenantry_provisioner::orchestrator::{ProvisionState, TenantBundle};
use tenantry_provisioner::policy::ProvisioningPolicy;
use tenantry_shared::error::{IdentityError, StoreError};
use tenantry_shared::models::directory::{DEFAULT_ADMIN_DIRECTORY_DESCRIPTION, DEFAULT_ADMIN_DIRECTORY_LABEL};
use tenantry_shared::models::scope::{DEFAULT_ADMIN_SCOPE_DESCRIPTION, DEFAULT_ADMIN_SCOPE_LABEL};
use tenantry_shared::models::{account::Account, directory::Directory, scope::Scope, tenant::Tenant};
use tenantry_shared::store::memory::Fault;
use tenantry_shared::store::{AccountStore, Store, Transaction};
use uuid::Uuid;

#[tokio::test]
async fn test_provision_all_new() {
    let ctx = TestContext::new();
    let mut bundle = new_bundle("admin@acme.test");

    ctx.provisioner.provision(&mut bundle).await.expect("Provisioning should succeed");

    let tenant_id = bundle.tenant.id.expect("tenant persisted");
    assert_eq!(bundle.tenant.status, "active");

    let directory = bundle.directory.as_ref().expect("directory created");
    assert_eq!(directory.label, DEFAULT_ADMIN_DIRECTORY_LABEL);
    assert_eq!(directory.description, DEFAULT_ADMIN_DIRECTORY_DESCRIPTION);
    assert_eq!(directory.status, "active");
    assert_eq!(directory.tenant_uid, Some(tenant_id));

    let account = bundle.account.as_ref().expect("account kept");
    let account_id = account.id.expect("account persisted");
    assert!(engine().match_password(account, PASSWORD).is_ok());

    let key = bundle.key.as_ref().expect("key issued");
    assert_eq!(key.account_id, Some(account_id));
    assert_eq!(key.status, "active");
    assert!(key.public_key_pem.starts_with("-----BEGIN PUBLIC KEY-----"));

    let scope = bundle.scope.as_ref().expect("scope created");
    assert_eq!(scope.label, DEFAULT_ADMIN_SCOPE_LABEL);
    assert_eq!(scope.description, DEFAULT_ADMIN_SCOPE_DESCRIPTION);
    assert_eq!(scope.tenant_id, Some(tenant_id));

    let state = ctx.state().await;
    assert_eq!(state.tenants.len(), 1);
    assert_eq!(state.directories.len(), 1);
    assert_eq!(state.accounts.len(), 1);
    assert_eq!(state.keys.len(), 1);
    assert_eq!(state.scopes.len(), 1);

    let directory_id = directory.id.unwrap();
    assert!(state.directory_accounts.contains_key(&(directory_id, account_id)));

    let binding = &state.directory_scopes[&(directory_id, scope.id.unwrap())];
    assert_eq!(binding.priority, 1);
    assert!(binding.is_default_account_store);
    assert!(binding.is_default_group_store);
    assert!(binding.is_default_rbac_store);
}

#[tokio::test]
async fn test_provision_rejects_tenant_id() {
    let ctx = TestContext::new();
    let mut bundle = new_bundle("admin@acme.test");
    bundle.tenant.id = Some(Uuid::new_v4());

    let err = ctx.provisioner.provision(&mut bundle).await.unwrap_err();

    assert!(matches!(err.error, IdentityError::IdNotNull));
    assert_eq!(err.reached, ProvisionState::Start);
    assert_empty(&ctx.state().await);
}

#[tokio::test]
async fn test_provision_requires_account() {
    let ctx = TestContext::new();
    let mut bundle = TenantBundle::new(Tenant::new("Acme Corp"));

    let err = ctx.provisioner.provision(&mut bundle).await.unwrap_err();

    assert!(matches!(err.error, IdentityError::AccountNotProvided));
    assert_empty(&ctx.state().await);
}

#[tokio::test]
async fn test_provision_rejects_invalid_account() {
    let ctx = TestContext::new();

    let mut bundle = new_bundle("not-an-email");
    let err = ctx.provisioner.provision(&mut bundle).await.unwrap_err();
    assert!(matches!(err.error, IdentityError::InvalidEmail));

    let mut bundle = TenantBundle::new(Tenant::new("Acme Corp")).with_account(Account::new("a@b.c", ""), PASSWORD);
    let err = ctx.provisioner.provision(&mut bundle).await.unwrap_err();
    assert!(matches!(err.error, IdentityError::InvalidName));

    assert_empty(&ctx.state().await);
}

#[tokio::test]
async fn test_provision_with_existing_account() {
    let ctx = TestContext::new();
    let mut first = new_bundle("admin@acme.test");
    ctx.provisioner.provision(&mut first).await.unwrap();
    let admin = first.account.clone().unwrap();

    let mut second = TenantBundle::new(Tenant::new("Globex")).with_existing_account(admin.clone());
    ctx.provisioner.provision(&mut second).await.expect("Provisioning should succeed");

    assert!(second.key.is_none());
    assert_eq!(second.account.as_ref().unwrap().id, admin.id);

    let state = ctx.state().await;
    assert_eq!(state.tenants.len(), 2);
    assert_eq!(state.accounts.len(), 1);
    assert_eq!(state.keys.len(), 1);
    assert_eq!(state.directory_accounts.len(), 2);

    let directory_id = second.directory.unwrap().id.unwrap();
    assert!(state.directory_accounts.contains_key(&(directory_id, admin.id.unwrap())));
}

#[tokio::test]
async fn test_provision_rejects_deleted_existing_account() {
    let ctx = TestContext::new();
    let mut first = new_bundle("admin@acme.test");
    ctx.provisioner.provision(&mut first).await.unwrap();
    let admin = first.account.clone().unwrap();

    let mut tx = ctx.store.begin().await.unwrap();
    assert!(tx.delete_account(admin.id.unwrap()).await.unwrap());
    tx.commit().await.unwrap();

    let mut second = TenantBundle::new(Tenant::new("Globex")).with_existing_account(admin);
    let err = ctx.provisioner.provision(&mut second).await.unwrap_err();

    assert!(matches!(err.error, IdentityError::Store(StoreError::NotFound { entity: "account" })));
    assert_eq!(err.reached, ProvisionState::DirectoryResolved);
    assert!(second.tenant.id.is_none());

    let state = ctx.state().await;
    assert_eq!(state.tenants.len(), 1);
    assert_eq!(state.directories.len(), 1);
    assert_eq!(state.directory_accounts.len(), 1);
}

#[tokio::test]
async fn test_provision_duplicate_email_rolls_back() {
    let ctx = TestContext::new();
    let mut first = new_bundle("admin@acme.test");
    ctx.provisioner.provision(&mut first).await.unwrap();

    let mut second = new_bundle("ADMIN@acme.test");
    let err = ctx.provisioner.provision(&mut second).await.unwrap_err();

    assert!(matches!(err.error, IdentityError::DupEmail));
    assert_eq!(err.reached, ProvisionState::DirectoryResolved);
    assert!(second.tenant.id.is_none());
    assert!(second.directory.is_none());

    let state = ctx.state().await;
    assert_eq!(state.tenants.len(), 1);
    assert_eq!(state.directories.len(), 1);
    assert_eq!(state.accounts.len(), 1);
}

#[tokio::test]
async fn test_key_save_failure_restores_bundle() {
    let ctx = TestContext::new();
    ctx.store.fail_on(Fault::SaveKey);

    let mut bundle = new_bundle("admin@acme.test");
    let before = serde_json::to_value(&bundle).unwrap();

    let err = ctx.provisioner.provision(&mut bundle).await.unwrap_err();

    assert!(matches!(err.error, IdentityError::Store(StoreError::Unavailable(_))));
    assert_eq!(err.reached, ProvisionState::DirectoryResolved);
    assert_eq!(serde_json::to_value(&bundle).unwrap(), before);
    assert_eq!(bundle.password.as_deref(), Some(PASSWORD));
    assert!(bundle.account.as_ref().unwrap().password_hash.is_none());
    assert!(bundle.key.is_none());
    assert_empty(&ctx.state().await);
}

#[tokio::test]
async fn test_store_failures_roll_back_every_step() {
    let cases = [
        (Fault::Begin, ProvisionState::Start),
        (Fault::SaveTenant, ProvisionState::Start),
        (Fault::SaveDirectory, ProvisionState::TenantPersisted),
        (Fault::SaveAccount, ProvisionState::DirectoryResolved),
        (Fault::UpsertDirectoryAccount, ProvisionState::DirectoryResolved),
        (Fault::SaveScope, ProvisionState::AccountResolved),
        (Fault::UpsertDirectoryScope, ProvisionState::ScopeResolved),
    ];

    for (fault, reached) in cases {
        let ctx = TestContext::new();
        ctx.store.fail_on(fault);

        let mut bundle = new_bundle("admin@acme.test");
        let before = serde_json::to_value(&bundle).unwrap();

        let err = ctx.provisioner.provision(&mut bundle).await.unwrap_err();

        assert!(
            matches!(err.error, IdentityError::Store(StoreError::Unavailable(_))),
            "{:?}: {}",
            fault,
            err
        );
        assert_eq!(err.reached, reached, "{:?}", fault);
        assert_eq!(serde_json::to_value(&bundle).unwrap(), before, "{:?}", fault);
        assert_eq!(bundle.password.as_deref(), Some(PASSWORD));
        assert!(bundle.key.is_none());
        assert_empty(&ctx.state().await);
    }
}

#[tokio::test]
async fn test_commit_failure_rolls_back() {
    let ctx = TestContext::new();
    ctx.store.fail_on(Fault::Commit);

    let mut bundle = new_bundle("admin@acme.test");
    let err = ctx.provisioner.provision(&mut bundle).await.unwrap_err();

    assert_eq!(err.reached, ProvisionState::Bound);
    assert!(bundle.tenant.id.is_none());
    assert_empty(&ctx.state().await);
}

#[tokio::test]
async fn test_bad_password_warns_by_default() {
    let ctx = TestContext::new();
    let mut bundle =
        TenantBundle::new(Tenant::new("Acme Corp")).with_account(Account::new("admin@acme.test", "Admin"), "short");

    ctx.provisioner.provision(&mut bundle).await.expect("Provisioning should succeed");

    let account = bundle.account.as_ref().unwrap();
    assert!(account.id.is_some());
    assert!(!account.has_password());
    assert!(bundle.key.is_some());
}

#[tokio::test]
async fn test_missing_password_warns_by_default() {
    let ctx = TestContext::new();
    let mut bundle = new_bundle("admin@acme.test");
    bundle.password = None;

    ctx.provisioner.provision(&mut bundle).await.expect("Provisioning should succeed");
    assert!(!bundle.account.as_ref().unwrap().has_password());
}

#[tokio::test]
async fn test_hashing_failure_warns_by_default() {
    let ctx = TestContext::with_engine(broken_engine(), ProvisioningPolicy::default());
    let mut bundle = new_bundle("admin@acme.test");

    ctx.provisioner.provision(&mut bundle).await.expect("Hashing failure is tolerated");

    let account = bundle.account.as_ref().unwrap();
    assert!(account.id.is_some());
    assert!(!account.has_password());
    assert!(bundle.key.is_some());
    assert_eq!(ctx.state().await.accounts.len(), 1);
}

#[tokio::test]
async fn test_hashing_failure_fatal_under_strict_policy() {
    let ctx = TestContext::with_engine(broken_engine(), ProvisioningPolicy::strict());
    let mut bundle = new_bundle("admin@acme.test");

    let err = ctx.provisioner.provision(&mut bundle).await.unwrap_err();

    assert!(matches!(err.error, IdentityError::HashingFailure(_)));
    assert_eq!(err.reached, ProvisionState::DirectoryResolved);
    assert!(bundle.tenant.id.is_none());
    assert_empty(&ctx.state().await);
}

#[tokio::test]
async fn test_bad_password_fatal_under_strict_policy() {
    let ctx = TestContext::with_policy(ProvisioningPolicy::strict());
    let mut bundle =
        TenantBundle::new(Tenant::new("Acme Corp")).with_account(Account::new("admin@acme.test", "Admin"), "short");

    let err = ctx.provisioner.provision(&mut bundle).await.unwrap_err();

    assert!(matches!(err.error, IdentityError::InvalidPassword));
    assert_eq!(err.reached, ProvisionState::DirectoryResolved);
    assert_empty(&ctx.state().await);
}

#[tokio::test]
async fn test_key_listing_failure_follows_policy() {
    let ctx = TestContext::new();
    ctx.store.fail_on(Fault::ListActiveKeys);
    let mut bundle = new_bundle("admin@acme.test");
    ctx.provisioner.provision(&mut bundle).await.expect("Listing failure is tolerated");
    assert_eq!(ctx.state().await.tenants.len(), 1);

    let ctx = TestContext::with_policy(ProvisioningPolicy::strict());
    ctx.store.fail_on(Fault::ListActiveKeys);
    let mut bundle = new_bundle("admin@acme.test");
    let err = ctx.provisioner.provision(&mut bundle).await.unwrap_err();
    assert_eq!(err.reached, ProvisionState::AccountResolved);
    assert_empty(&ctx.state().await);
}

#[tokio::test]
async fn test_supplied_directory_and_scope_are_reused() {
    let ctx = TestContext::new();
    let mut first = new_bundle("admin@acme.test");
    ctx.provisioner.provision(&mut first).await.unwrap();

    let directory = first.directory.clone().unwrap();
    let scope = first.scope.clone().unwrap();
    let mut second = TenantBundle::new(Tenant::new("Acme Subsidiary"))
        .with_existing_account(first.account.clone().unwrap())
        .with_directory(directory.clone())
        .with_scope(scope.clone());

    ctx.provisioner.provision(&mut second).await.expect("Provisioning should succeed");

    let reused = second.directory.as_ref().unwrap();
    assert_eq!(reused.id, directory.id);
    assert_eq!(reused.tenant_uid, first.tenant.id);
    assert!(reused.updated > directory.updated);
    assert_eq!(second.scope.as_ref().unwrap().id, scope.id);

    let state = ctx.state().await;
    assert_eq!(state.tenants.len(), 2);
    assert_eq!(state.directories.len(), 1);
    assert_eq!(state.scopes.len(), 1);
    assert_eq!(state.directory_accounts.len(), 1);
    assert_eq!(state.directory_scopes.len(), 1);

    let link = state.directory_accounts.values().next().unwrap();
    assert!(link.updated > link.created);
}

#[tokio::test]
async fn test_supplied_directory_without_id_keeps_label() {
    let ctx = TestContext::new();
    let directory = Directory {
        label: "Operators".to_string(),
        ..Default::default()
    };
    let mut bundle = new_bundle("admin@acme.test").with_directory(directory);

    ctx.provisioner.provision(&mut bundle).await.unwrap();

    let directory = bundle.directory.unwrap();
    assert_eq!(directory.label, "Operators");
    assert_eq!(directory.description, DEFAULT_ADMIN_DIRECTORY_DESCRIPTION);
    assert_eq!(directory.tenant_uid, bundle.tenant.id);
}

#[tokio::test]
async fn test_concurrent_provisioning() {
    let ctx = TestContext::new();
    let other = ctx.provisioner.clone();

    let mut a = new_bundle("a@acme.test");
    let mut b = new_bundle("b@globex.test");
    let (ra, rb) = tokio::join!(ctx.provisioner.provision(&mut a), other.provision(&mut b));

    ra.unwrap();
    rb.unwrap();
    let state = ctx.state().await;
    assert_eq!(state.tenants.len(), 2);
    assert_eq!(state.keys.len(), 2);
}

#[tokio::test]
async fn test_create_scope() {
    let ctx = TestContext::new();
    let mut bundle = new_bundle("admin@acme.test");
    ctx.provisioner.provision(&mut bundle).await.unwrap();
    let tenant_id = bundle.tenant.id.unwrap();

    let mut missing_tenant = Scope {
        label: "Billing".to_string(),
        ..Default::default()
    };
    let err = ctx.provisioner.create_scope(&mut missing_tenant).await.unwrap_err();
    assert!(matches!(err, IdentityError::TenantNotProvided));

    let mut with_id = Scope {
        id: Some(Uuid::new_v4()),
        tenant_id: Some(tenant_id),
        ..Default::default()
    };
    let err = ctx.provisioner.create_scope(&mut with_id).await.unwrap_err();
    assert!(matches!(err, IdentityError::IdNotNull));

    let mut unknown_tenant = Scope {
        tenant_id: Some(Uuid::new_v4()),
        ..Default::default()
    };
    let err = ctx.provisioner.create_scope(&mut unknown_tenant).await.unwrap_err();
    assert!(err.is_store());
    assert!(unknown_tenant.id.is_none());

    let mut billing = Scope {
        tenant_id: Some(tenant_id),
        label: "Billing".to_string(),
        ..Default::default()
    };
    ctx.provisioner.create_scope(&mut billing).await.expect("Scope creation should succeed");
    assert!(billing.id.is_some());
    assert_eq!(billing.status, "active");

    let scopes = ctx.provisioner.list_scopes(tenant_id).await.unwrap();
    let labels: Vec<&str> = scopes.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, vec![DEFAULT_ADMIN_SCOPE_LABEL, "Billing"]);
}
