mod common;

use common::{json_body, TestClient, TestServer};
use reqwest::StatusCode;

async fn create_playlist(client: &TestClient, name: &str) -> (String, String) {
    let response = client.create_playlist(name, "e2e playlist").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    let id = body["id"].as_str().unwrap().to_string();
    let token = body["shareLink"]["token"].as_str().unwrap().to_string();
    (id, token)
}

#[tokio::test]
async fn only_the_owner_regenerates_the_share_link() {
    let server = TestServer::spawn().await;
    let alice = TestClient::authenticated(&server.base_url, "alice").await;
    let bob = TestClient::authenticated(&server.base_url, "bob").await;
    let (id, token) = create_playlist(&alice, "Guarded").await;

    // Not even as a collaborator.
    let response = bob.join_share(&token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = bob.regenerate_share(&id).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The denial changed nothing.
    let response = bob.view_share(&token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = alice.regenerate_share(&id).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn playlist_reads_are_restricted_to_members() {
    let server = TestServer::spawn().await;
    let alice = TestClient::authenticated(&server.base_url, "alice").await;
    let carol = TestClient::authenticated(&server.base_url, "carol").await;
    let (id, _) = create_playlist(&alice, "Private").await;

    let response = carol.get_playlist(&id).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = alice.get_playlist(&id).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = alice.get_playlist("nosuchplaylist00").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn playlist_names_are_unique_per_owner() {
    let server = TestServer::spawn().await;
    let alice = TestClient::authenticated(&server.base_url, "alice").await;
    let bob = TestClient::authenticated(&server.base_url, "bob").await;

    let response = alice.create_playlist("Mix", "first").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = alice.create_playlist("Mix", "second").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // A different owner can reuse the name.
    let response = bob.create_playlist("Mix", "bobs").await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn playlist_creation_validates_the_name() {
    let server = TestServer::spawn().await;
    let alice = TestClient::authenticated(&server.base_url, "alice").await;

    let response = alice.create_playlist("", "no name").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = alice.create_playlist("   ", "whitespace").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
