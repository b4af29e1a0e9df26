use treasury::backend::DirectoryBackend;
use treasury::models::{Credentials, Group, IdentityProvider, Organization, User};
use treasury::{AppError, TreasuryDb};
use uuid::Uuid;

mod common;

fn credentials(org: &Organization, email: &str, password: &str) -> Credentials {
    Credentials {
        organization_id: org.id,
        email: email.to_string(),
        password: password.to_string(),
    }
}

fn assert_invalid_credentials(err: AppError) {
    match err {
        AppError::Unauthorized(message) => assert_eq!(message, "Invalid credentials"),
        other => panic!("expected Unauthorized, got {:?}", other),
    }
}

#[tokio::test]
async fn test_authenticate_success_records_login() {
    let treasury = common::setup_test_treasury().await;
    let (org, idp) = common::seed_directory(&treasury).await;
    let user = common::create_user(&treasury, &org, &idp, "alice@example.com").await;
    assert!(user.last_login_at.is_none());

    let authenticated = treasury
        .authenticate_user(&credentials(&org, "Alice@Example.com", common::TEST_PASSWORD))
        .await
        .unwrap();

    assert_eq!(authenticated.id, user.id);
    assert!(authenticated.password.is_none());
    assert!(authenticated.last_login_at.is_some());

    let stored = treasury.get_user(user.id).await.unwrap();
    assert!(stored.last_login_at.is_some());
    // Recording a login is not a record change
    assert_eq!(stored.version, user.version);
}

#[tokio::test]
async fn test_authenticate_non_ascii_email_any_case() {
    let treasury = common::setup_test_treasury().await;
    let (org, idp) = common::seed_directory(&treasury).await;
    let user = common::create_user(&treasury, &org, &idp, "ÉLODIE@acme.test").await;
    assert_eq!(user.email, "élodie@acme.test");

    for email in ["ÉLODIE@acme.test", "élodie@acme.test", "Élodie@ACME.test"] {
        let authenticated = treasury
            .authenticate_user(&credentials(&org, email, common::TEST_PASSWORD))
            .await
            .unwrap();
        assert_eq!(authenticated.id, user.id);
    }
}

#[tokio::test]
async fn test_authentication_failures_are_indistinguishable() {
    let treasury = common::setup_test_treasury().await;
    let (org, idp) = common::seed_directory(&treasury).await;
    common::create_user(&treasury, &org, &idp, "bob@example.com").await;

    let mut inactive = common::new_user(&org, &idp, "Inactive", "inactive@example.com");
    inactive.active = false;
    treasury.user_vault(&mut inactive).await.unwrap();

    let mut no_password = User::new(
        Uuid::nil(),
        "No Password",
        "nopass@example.com",
        Organization::reference(org.id),
        IdentityProvider::reference(idp.id),
    );
    treasury.user_vault(&mut no_password).await.unwrap();

    let other_org = treasury
        .backend()
        .create_organization(&Organization::new("Other"))
        .await
        .unwrap();

    let attempts = [
        credentials(&org, "bob@example.com", "Wrong123!"),
        credentials(&org, "nobody@example.com", common::TEST_PASSWORD),
        credentials(&org, "inactive@example.com", common::TEST_PASSWORD),
        credentials(&org, "nopass@example.com", common::TEST_PASSWORD),
        credentials(&other_org, "bob@example.com", common::TEST_PASSWORD),
        credentials(&org, "bob@example.com", ""),
    ];

    for attempt in &attempts {
        let err = treasury.authenticate_user(attempt).await.unwrap_err();
        assert_invalid_credentials(err);
    }
}

#[tokio::test]
async fn test_federated_user_cannot_authenticate_locally() {
    let treasury = common::setup_test_treasury().await;
    let (org, _) = common::seed_directory(&treasury).await;
    let sso = treasury
        .backend()
        .create_identity_provider(&IdentityProvider::federated(
            "corp-sso",
            "https://sso.example.com",
        ))
        .await
        .unwrap();

    let user = common::create_user(&treasury, &org, &sso, "fed@example.com").await;
    assert!(!user.idp.is_local());

    let err = treasury
        .authenticate_user(&credentials(&org, "fed@example.com", common::TEST_PASSWORD))
        .await
        .unwrap_err();
    match err {
        AppError::Unauthorized(message) => assert!(message.contains("corp-sso")),
        other => panic!("expected Unauthorized, got {:?}", other),
    }
}

#[tokio::test]
async fn test_authorization_follows_group_roles() {
    let treasury = common::setup_test_treasury().await;
    let (org, idp) = common::seed_directory(&treasury).await;
    let alice = common::create_user(&treasury, &org, &idp, "alice@example.com").await;
    let bob = common::create_user(&treasury, &org, &idp, "bob@example.com").await;

    let mut admins = Group::new(org.id, "admins")
        .with_roles(["admin", "audit"])
        .with_members([alice.id]);
    treasury.group_vault(&mut admins).await.unwrap();

    let mut auditors = Group::new(org.id, "auditors")
        .with_roles(["audit"])
        .with_members([alice.id, bob.id]);
    treasury.group_vault(&mut auditors).await.unwrap();

    let decision = treasury.authorize_user(alice.id, "admin").await.unwrap();
    assert!(decision.granted);
    assert_eq!(decision.groups, vec![admins.id]);

    let decision = treasury.authorize_user(alice.id, "audit").await.unwrap();
    assert!(decision.granted);
    assert_eq!(decision.groups.len(), 2);

    let decision = treasury.authorize_user(bob.id, "admin").await.unwrap();
    assert!(!decision.granted);
    assert!(decision.groups.is_empty());
    assert!(decision.reason.is_some());

    // Role names are matched exactly
    let decision = treasury.authorize_user(alice.id, "Admin").await.unwrap();
    assert!(!decision.granted);
}

#[tokio::test]
async fn test_authorization_denies_inactive_and_rejects_unknown() {
    let treasury = common::setup_test_treasury().await;
    let (org, idp) = common::seed_directory(&treasury).await;
    let mut carol = common::create_user(&treasury, &org, &idp, "carol@example.com").await;

    let mut admins = Group::new(org.id, "admins")
        .with_roles(["admin"])
        .with_members([carol.id]);
    treasury.group_vault(&mut admins).await.unwrap();
    assert!(treasury.authorize_user(carol.id, "admin").await.unwrap().granted);

    carol.active = false;
    treasury.user_vault(&mut carol).await.unwrap();
    let decision = treasury.authorize_user(carol.id, "admin").await.unwrap();
    assert!(!decision.granted);

    let err = treasury
        .authorize_user(Uuid::new_v4(), "admin")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
