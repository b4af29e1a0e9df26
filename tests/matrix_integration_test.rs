use treasury::backend::{DirectoryBackend, GroupBackend, UserBackend};
use treasury::models::{Credentials, Group, IdentityProvider, Organization};
use treasury::{AppError, TreasuryDb};

mod common;

use common::TestDatabaseType;

// Macro to run the same test with different database types
macro_rules! matrix_test {
    ($test_name:ident, $test_fn:ident) => {
        paste::paste! {
            #[tokio::test]
            async fn [<$test_name _sqlite>]() {
                $test_fn(TestDatabaseType::Sqlite).await;
            }

            #[tokio::test]
            async fn [<$test_name _postgres>]() {
                $test_fn(TestDatabaseType::Postgres).await;
            }
        }
    };
}

matrix_test!(test_user_vault_versioning, user_vault_versioning);
matrix_test!(test_user_email_uniqueness, user_email_uniqueness);
matrix_test!(test_group_vault_roles_and_members, group_vault_roles_and_members);
matrix_test!(test_authorize_through_group_roles, authorize_through_group_roles);
matrix_test!(test_authenticate_folds_email_case, authenticate_folds_email_case);

async fn user_vault_versioning(db_type: TestDatabaseType) {
    let db = common::setup_test_database(db_type).await;
    let treasury = &db.treasury;
    let (org, idp) = common::seed_directory(treasury).await;

    let mut user = common::create_user(treasury, &org, &idp, "vault@example.com").await;
    assert_eq!(user.version, 1);
    assert!(user.password.is_none());
    assert_eq!(user.organization.name, org.name);

    let stale = user.clone();
    user.name = "Renamed".to_string();
    treasury.user_vault(&mut user).await.unwrap();
    assert_eq!(user.version, 2);
    assert_eq!(user.name, "Renamed");

    let mut stale = stale;
    assert!(matches!(
        treasury.user_vault(&mut stale).await.unwrap_err(),
        AppError::PreconditionFailed
    ));

    // An update without a password keeps the stored hash
    let hash = treasury.backend().find_password_hash(user.id).await.unwrap();
    assert!(hash.is_some());
    treasury.user_vault(&mut user).await.unwrap();
    assert_eq!(
        treasury.backend().find_password_hash(user.id).await.unwrap(),
        hash
    );
}

async fn user_email_uniqueness(db_type: TestDatabaseType) {
    let db = common::setup_test_database(db_type).await;
    let treasury = &db.treasury;
    let (org, idp) = common::seed_directory(treasury).await;
    common::create_user(treasury, &org, &idp, "dup@example.com").await;

    let mut duplicate = common::new_user(&org, &idp, "Dup", "DUP@example.com");
    assert!(matches!(
        treasury.user_vault(&mut duplicate).await.unwrap_err(),
        AppError::Conflict(_)
    ));

    let other = treasury
        .backend()
        .create_organization(&Organization::new(format!("other-{}", uuid::Uuid::new_v4())))
        .await
        .unwrap();
    common::create_user(treasury, &other, &idp, "dup@example.com").await;
}

async fn group_vault_roles_and_members(db_type: TestDatabaseType) {
    let db = common::setup_test_database(db_type).await;
    let treasury = &db.treasury;
    let (org, idp) = common::seed_directory(treasury).await;
    let alice = common::create_user(treasury, &org, &idp, "alice@example.com").await;
    let bob = common::create_user(treasury, &org, &idp, "bob@example.com").await;

    let mut group = Group::new(org.id, "ops")
        .with_roles(["deploy", "read", "deploy"])
        .with_members([alice.id, bob.id, alice.id]);
    treasury.group_vault(&mut group).await.unwrap();
    assert_eq!(group.version, 1);
    assert_eq!(group.roles.len(), 2);

    let mut members = group.members.clone();
    members.sort();
    let mut expected = vec![alice.id, bob.id];
    expected.sort();
    assert_eq!(members, expected);

    group.members = vec![bob.id];
    treasury.group_vault(&mut group).await.unwrap();
    assert_eq!(group.version, 2);
    assert_eq!(group.members, vec![bob.id]);

    let mut clash = Group::new(org.id, "OPS");
    assert!(matches!(
        treasury.group_vault(&mut clash).await.unwrap_err(),
        AppError::Conflict(_)
    ));

    let groups = treasury
        .backend()
        .find_groups_by_organization(org.id)
        .await
        .unwrap();
    assert_eq!(groups.len(), 1);
}

async fn authorize_through_group_roles(db_type: TestDatabaseType) {
    let db = common::setup_test_database(db_type).await;
    let treasury = &db.treasury;
    let (org, idp) = common::seed_directory(treasury).await;
    let alice = common::create_user(treasury, &org, &idp, "alice@example.com").await;
    let bob = common::create_user(treasury, &org, &idp, "bob@example.com").await;

    let mut admins = Group::new(org.id, "admins")
        .with_roles(["admin"])
        .with_members([alice.id]);
    treasury.group_vault(&mut admins).await.unwrap();

    let decision = treasury.authorize_user(alice.id, "admin").await.unwrap();
    assert!(decision.granted);
    assert_eq!(decision.groups, vec![admins.id]);

    assert!(!treasury.authorize_user(alice.id, "Admin").await.unwrap().granted);
    assert!(!treasury.authorize_user(bob.id, "admin").await.unwrap().granted);

    treasury.add_member(admins.id, bob.id).await.unwrap();
    assert!(treasury.authorize_user(bob.id, "admin").await.unwrap().granted);

    let mut inactive = alice.clone();
    inactive.active = false;
    treasury.user_vault(&mut inactive).await.unwrap();
    assert!(!treasury.authorize_user(alice.id, "admin").await.unwrap().granted);

    let err = treasury
        .authorize_user(uuid::Uuid::new_v4(), "admin")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

async fn authenticate_folds_email_case(db_type: TestDatabaseType) {
    let db = common::setup_test_database(db_type).await;
    let treasury = &db.treasury;
    let (org, idp) = common::seed_directory(treasury).await;
    let user = common::create_user(treasury, &org, &idp, "ÉLODIE@acme.test").await;

    for email in ["élodie@acme.test", "Élodie@ACME.test"] {
        let authenticated = treasury
            .authenticate_user(&Credentials {
                organization_id: org.id,
                email: email.to_string(),
                password: common::TEST_PASSWORD.to_string(),
            })
            .await
            .unwrap();
        assert_eq!(authenticated.id, user.id);
    }

    let federated = treasury
        .backend()
        .create_identity_provider(&IdentityProvider::federated(
            format!("corp-{}", uuid::Uuid::new_v4()),
            "https://sso.example.com",
        ))
        .await
        .unwrap();
    common::create_user(treasury, &org, &federated, "sso@example.com").await;

    let err = treasury
        .authenticate_user(&Credentials {
            organization_id: org.id,
            email: "sso@example.com".to_string(),
            password: common::TEST_PASSWORD.to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}
