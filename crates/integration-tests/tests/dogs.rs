//! Integration tests for dog profiles and the profile page.

use axum::http::StatusCode;

use waggle_core::{DogId, UserUid};
use waggle_integration_tests::TestApp;
use waggle_web::db::DogRepository;

const PASSWORD: &str = "hunter22";

async fn signed_in(app: &TestApp, email: &str, name: &str) -> UserUid {
    let identity = app.add_user(email, PASSWORD, Some(name));
    let response = app.login(email, PASSWORD).await;
    assert_eq!(response.location(), Some("/dogs"));
    identity.uid
}

#[tokio::test]
async fn test_create_then_view_dog() {
    let app = TestApp::new();
    let uid = signed_in(&app, "jane@waggle.dog", "Jane Doglover").await;

    let response = app
        .post_form(
            "/dogs",
            &[
                ("name", "Bella"),
                ("breed", "Beagle"),
                ("gender", "female"),
                ("birthDate", "2024-01-04"),
            ],
        )
        .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/dogs/d1"));

    let page = app.get("/dogs/d1").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Bella"));
    assert!(page.body.contains("Jan 4, 2024"));
    assert!(page.body.contains("This is one of your dogs."));

    let repository = DogRepository::new(&app.documents, "dogs");
    let stored = repository
        .get_by_id(&DogId::new("d1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.owner_id, Some(uid));
}

#[tokio::test]
async fn test_document_requests_carry_the_signed_in_user() {
    let app = TestApp::new();
    app.get("/").await;
    assert!(app.documents.last_id_token().is_none());

    signed_in(&app, "jane@waggle.dog", "Jane Doglover").await;
    app.post_form("/dogs", &[("name", "Bella")]).await;
    let token = app.documents.last_id_token();
    assert!(token.as_deref().is_some_and(|t| !t.is_empty()));

    app.get("/dogs").await;
    assert_eq!(app.documents.last_id_token(), token);

    app.post_form("/auth/logout", &[]).await;
    app.get("/dogs/d1").await;
    assert!(app.documents.last_id_token().is_none());
}

#[tokio::test]
async fn test_my_dogs_lists_only_own_dogs() {
    let app = TestApp::new();
    signed_in(&app, "jane@waggle.dog", "Jane Doglover").await;
    app.post_form("/dogs", &[("name", "Bella")]).await;
    app.post_form("/auth/logout", &[]).await;

    signed_in(&app, "sam@waggle.dog", "Sam Barker").await;
    let empty = app.get("/dogs").await;
    assert!(empty.body.contains("You haven"));
    assert!(!empty.body.contains("Bella"));

    app.post_form("/dogs", &[("name", "Max")]).await;
    let page = app.get("/dogs").await;
    assert!(page.body.contains("Max"));
    assert!(!page.body.contains("Bella"));
}

#[tokio::test]
async fn test_invalid_dog_form_is_rerendered() {
    let app = TestApp::new();
    signed_in(&app, "jane@waggle.dog", "Jane Doglover").await;

    let response = app
        .post_form("/dogs", &[("name", ""), ("breed", "Beagle")])
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body.contains("Please give your dog a name."));
    assert!(response.body.contains("value=\"Beagle\""));

    let repository = DogRepository::new(&app.documents, "dogs");
    assert!(repository.list_featured().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_requires_sign_in() {
    let app = TestApp::new();
    let response = app.post_form("/dogs", &[("name", "Bella")]).await;
    assert_eq!(response.location(), Some("/auth/login"));
}

#[tokio::test]
async fn test_dog_page_is_public() {
    let app = TestApp::new();
    signed_in(&app, "jane@waggle.dog", "Jane Doglover").await;
    app.post_form("/dogs", &[("name", "Bella")]).await;
    app.post_form("/auth/logout", &[]).await;

    let page = app.get("/dogs/d1").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Bella"));
    assert!(!page.body.contains("This is one of your dogs."));
}

// =============================================================================
// Profile
// =============================================================================

#[tokio::test]
async fn test_profile_update() {
    let app = TestApp::new();
    let uid = signed_in(&app, "jane@waggle.dog", "Jane Doglover").await;

    let response = app
        .post_form(
            "/profile",
            &[
                ("displayName", "Mary Ann"),
                ("photoURL", "https://images.example.com/mary.jpg"),
            ],
        )
        .await;
    assert_eq!(response.location(), Some("/profile?saved=true"));

    let page = app.get("/profile?saved=true").await;
    assert!(page.body.contains("Profile updated."));
    assert!(page.body.contains("value=\"Mary Ann\""));
    assert!(page.body.contains("src=\"https://images.example.com/mary.jpg\""));

    let stored = app.identity.account(&uid).unwrap();
    assert_eq!(stored.display_name.as_deref(), Some("Mary Ann"));
}

#[tokio::test]
async fn test_profile_update_fails_after_revocation() {
    let app = TestApp::new();
    let uid = signed_in(&app, "jane@waggle.dog", "Jane Doglover").await;
    app.identity.revoke_sessions(&uid);

    let response = app
        .post_form("/profile", &[("displayName", "Mary Ann")])
        .await;
    assert_eq!(response.location(), Some("/profile"));

    let page = app.get("/profile").await;
    assert!(page.body.contains("Your session has expired."));
    assert!(!page.body.contains("Profile updated."));
}
