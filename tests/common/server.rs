#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use vidstream_server::server::{make_app, ServerConfig};
use vidstream_server::{RequestsLoggingLevel, SqlitePlaylistStore, SqliteUserStore, TokenIssuer};

use super::constants::{SERVER_READY_POLL_INTERVAL_MS, SERVER_READY_TIMEOUT_MS};

/// A full server instance on a random port, backed by throwaway SQLite
/// databases. The stores are exposed so tests can assert on persisted state
/// directly.
pub struct TestServer {
    pub base_url: String,
    pub user_store: Arc<SqliteUserStore>,
    pub playlist_store: Arc<SqlitePlaylistStore>,
    _db_dir: TempDir,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let db_dir = TempDir::new().unwrap();
        let user_store = Arc::new(SqliteUserStore::new(db_dir.path().join("user.db")).unwrap());
        let playlist_store =
            Arc::new(SqlitePlaylistStore::new(db_dir.path().join("playlist.db")).unwrap());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port,
            // Tests talk plain http, Secure cookies would never come back.
            cookie_secure: false,
            public_base_url: base_url.clone(),
        };
        let app = make_app(
            config,
            user_store.clone(),
            playlist_store.clone(),
            TokenIssuer::new("test-access-secret", "test-refresh-secret"),
        )
        .unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        let server = TestServer {
            base_url,
            user_store,
            playlist_store,
            _db_dir: db_dir,
            shutdown_tx: Some(shutdown_tx),
        };
        server.wait_for_ready().await;
        server
    }

    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .unwrap();
        let deadline = Instant::now() + Duration::from_millis(SERVER_READY_TIMEOUT_MS);
        loop {
            if let Ok(response) = client.get(&self.base_url).send().await {
                if response.status().is_success() {
                    return;
                }
            }
            if Instant::now() > deadline {
                panic!("Server did not become ready within {}ms", SERVER_READY_TIMEOUT_MS);
            }
            tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            tx.send(()).ok();
        }
    }
}
