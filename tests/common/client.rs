#![allow(dead_code)]

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};

use super::constants::{REQUEST_TIMEOUT_SECS, TEST_AVATAR, TEST_PASSWORD};

/// A cookie-keeping http client bound to one server, one method per
/// endpoint.
pub struct TestClient {
    base_url: String,
    client: Client,
}

impl TestClient {
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap();
        Self {
            base_url: base_url.to_string(),
            client,
        }
    }

    /// Registers `username` with the default password and logs in, so the
    /// client starts out with a live session.
    pub async fn authenticated(base_url: &str, username: &str) -> Self {
        let client = Self::new(base_url);
        let email = format!("{}@example.com", username);
        let response = client.register(username, &email, TEST_PASSWORD).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let response = client.login(username, TEST_PASSWORD).await;
        assert_eq!(response.status(), StatusCode::OK);
        client
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    pub async fn get_with_bearer(&self, path: &str, token: &str) -> Response {
        self.client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .unwrap()
    }

    pub async fn post(&self, path: &str) -> Response {
        self.client.post(self.url(path)).send().await.unwrap()
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn patch(&self, path: &str) -> Response {
        self.client.patch(self.url(path)).send().await.unwrap()
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> Response {
        let body = json!({
            "username": username,
            "email": email,
            "password": password,
            "avatar": TEST_AVATAR,
        });
        self.post_json("/v1/auth/register", &body).await
    }

    pub async fn login(&self, username: &str, password: &str) -> Response {
        let body = json!({ "username": username, "password": password });
        self.post_json("/v1/auth/login", &body).await
    }

    pub async fn login_with_email(&self, email: &str, password: &str) -> Response {
        let body = json!({ "email": email, "password": password });
        self.post_json("/v1/auth/login", &body).await
    }

    pub async fn logout(&self) -> Response {
        self.post("/v1/auth/logout").await
    }

    /// Refreshes from the jar's refreshToken cookie.
    pub async fn refresh(&self) -> Response {
        self.post("/v1/auth/refresh").await
    }

    /// Refreshes with an explicit token, which takes precedence over the
    /// cookie.
    pub async fn refresh_with_token(&self, refresh_token: &str) -> Response {
        let body = json!({ "refreshToken": refresh_token });
        self.post_json("/v1/auth/refresh", &body).await
    }

    pub async fn me(&self) -> Response {
        self.get("/v1/auth/me").await
    }

    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Response {
        let body = json!({ "oldPassword": old_password, "newPassword": new_password });
        self.post_json("/v1/auth/change-password", &body).await
    }

    pub async fn create_playlist(&self, name: &str, description: &str) -> Response {
        let body = json!({ "name": name, "description": description });
        self.post_json("/v1/playlists", &body).await
    }

    pub async fn get_playlist(&self, playlist_id: &str) -> Response {
        self.get(&format!("/v1/playlists/{}", playlist_id)).await
    }

    pub async fn view_share(&self, token: &str) -> Response {
        self.get(&format!("/v1/playlists/share/{}", token)).await
    }

    pub async fn join_share(&self, token: &str) -> Response {
        let body = json!({ "token": token });
        self.post_json("/v1/playlists/share/join", &body).await
    }

    pub async fn regenerate_share(&self, playlist_id: &str) -> Response {
        self.patch(&format!("/v1/playlists/{}/share", playlist_id))
            .await
    }
}

/// Parses the response body as JSON, panicking with the raw body on failure.
pub async fn json_body(response: Response) -> Value {
    let text = response.text().await.unwrap();
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("Invalid JSON ({}): {}", e, text))
}
