use anyhow::Result;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::playlist::{PlaylistManager, PlaylistStore};
use crate::token::{TokenIssuer, TokenPair, ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL};
use crate::user::{ProfileFields, UserManager, UserStore};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::error::ApiError;
use super::session::{Session, COOKIE_ACCESS_TOKEN_KEY, COOKIE_REFRESH_TOKEN_KEY};
use super::state::*;
use super::{log_requests, RequestsLoggingLevel, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct RegisterBody {
    pub username: String,
    pub email: String,
    pub password: String,
    pub avatar: String,
    #[serde(rename = "coverImage")]
    pub cover_image: Option<String>,
}

#[derive(Deserialize, Debug)]
struct LoginBody {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Deserialize, Debug)]
struct RefreshBody {
    #[serde(rename = "refreshToken")]
    pub refresh_token: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChangePasswordBody {
    #[serde(rename = "oldPassword")]
    pub old_password: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

#[derive(Deserialize, Debug)]
struct CreatePlaylistBody {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize, Debug)]
struct JoinPlaylistBody {
    pub token: String,
}

fn auth_cookie(name: &'static str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age.as_secs() as i64))
        .build()
}

fn expired_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .expires(time::OffsetDateTime::now_utc() - time::Duration::days(1))
        .build()
}

fn token_cookies(jar: CookieJar, pair: &TokenPair, secure: bool) -> CookieJar {
    jar.add(auth_cookie(
        COOKIE_ACCESS_TOKEN_KEY,
        pair.access_token.clone(),
        ACCESS_TOKEN_TTL,
        secure,
    ))
    .add(auth_cookie(
        COOKIE_REFRESH_TOKEN_KEY,
        pair.refresh_token.clone(),
        REFRESH_TOKEN_TTL,
        secure,
    ))
}

fn cleared_token_cookies(jar: CookieJar, secure: bool) -> CookieJar {
    jar.add(expired_cookie(COOKIE_ACCESS_TOKEN_KEY, secure))
        .add(expired_cookie(COOKIE_REFRESH_TOKEN_KEY, secure))
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
    };
    Json(stats)
}

async fn register(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError> {
    // Argon2 hashing is CPU-bound, keep it off the async workers.
    let profile = tokio::task::spawn_blocking(move || {
        user_manager.register(
            &body.username,
            &body.email,
            &body.password,
            ProfileFields {
                avatar: body.avatar,
                cover_image: body.cover_image,
            },
        )
    })
    .await
    .map_err(anyhow::Error::from)??;

    info!("Registered user {} ({})", profile.username, profile.id);
    Ok((StatusCode::CREATED, Json(json!({ "user": profile }))))
}

async fn login(
    State(state): State<ServerState>,
    jar: CookieJar,
    Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = body
        .username
        .or(body.email)
        .ok_or_else(|| ApiError::Validation("username or email is required".into()))?;

    let user_manager = state.user_manager.clone();
    let user = tokio::task::spawn_blocking(move || {
        user_manager.verify_password(&handle, &body.password)
    })
    .await
    .map_err(anyhow::Error::from)??;

    let pair = state.token_issuer.issue(user.id)?;
    state.user_manager.start_session(user.id, &pair.refresh_token)?;
    let profile = state
        .user_manager
        .get_profile(user.id)?
        .ok_or(ApiError::Unauthenticated)?;

    let jar = token_cookies(jar, &pair, state.config.cookie_secure);
    let body = json!({
        "user": profile,
        "accessToken": pair.access_token,
        "refreshToken": pair.refresh_token,
    });
    Ok((jar, Json(body)))
}

async fn logout(
    State(state): State<ServerState>,
    jar: CookieJar,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    state.user_manager.end_session(session.user_id)?;
    let jar = cleared_token_cookies(jar, state.config.cookie_secure);
    Ok((jar, Json(json!({ "success": true }))))
}

async fn refresh(
    State(state): State<ServerState>,
    jar: CookieJar,
    body: Option<Json<RefreshBody>>,
) -> Result<impl IntoResponse, ApiError> {
    let presented = body
        .and_then(|Json(b)| b.refresh_token)
        .or_else(|| {
            jar.get(COOKIE_REFRESH_TOKEN_KEY)
                .map(|c| c.value().to_string())
        })
        .ok_or(ApiError::Unauthenticated)?;

    let user_id = state.token_issuer.verify_refresh(&presented)?;
    let pair = state.token_issuer.issue(user_id)?;
    // Only the compare-and-swap winner gets the new pair; a replayed token
    // loses here with a 401.
    state
        .user_manager
        .rotate_session(user_id, &presented, &pair.refresh_token)?;

    let jar = token_cookies(jar, &pair, state.config.cookie_secure);
    Ok((jar, Json(pair)))
}

async fn me(session: Session) -> impl IntoResponse {
    Json(json!({ "user": session.profile }))
}

async fn change_password(
    State(state): State<ServerState>,
    jar: CookieJar,
    session: Session,
    Json(body): Json<ChangePasswordBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user_manager = state.user_manager.clone();
    tokio::task::spawn_blocking(move || {
        user_manager.change_password(session.user_id, &body.old_password, &body.new_password)
    })
    .await
    .map_err(anyhow::Error::from)??;

    // The stored refresh token is gone, so the cookies are dead weight too.
    let jar = cleared_token_cookies(jar, state.config.cookie_secure);
    Ok((jar, Json(json!({ "success": true }))))
}

async fn post_playlist(
    session: Session,
    State(playlist_manager): State<GuardedPlaylistManager>,
    Json(body): Json<CreatePlaylistBody>,
) -> Result<impl IntoResponse, ApiError> {
    let playlist =
        playlist_manager.create_playlist(session.user_id, &body.name, &body.description)?;
    Ok((StatusCode::CREATED, Json(playlist)))
}

async fn get_playlist(
    session: Session,
    State(playlist_manager): State<GuardedPlaylistManager>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let playlist = playlist_manager.get_for_user(&id, session.user_id)?;
    Ok(Json(playlist))
}

async fn get_shared_playlist(
    State(playlist_manager): State<GuardedPlaylistManager>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let playlist = playlist_manager.view_by_share_token(&token)?;
    Ok(Json(playlist))
}

async fn join_shared_playlist(
    session: Session,
    State(playlist_manager): State<GuardedPlaylistManager>,
    Json(body): Json<JoinPlaylistBody>,
) -> Result<impl IntoResponse, ApiError> {
    let playlist = playlist_manager.join_by_share_token(&body.token, session.user_id)?;
    Ok(Json(playlist))
}

async fn regenerate_share_link(
    session: Session,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let playlist = state
        .playlist_manager
        .regenerate_share_link(&id, session.user_id)?;

    let share_url = format!(
        "{}/v1/playlists/share/{}",
        state.config.public_base_url.trim_end_matches('/'),
        playlist.share_link.token
    );
    Ok(Json(json!({
        "shareLink": playlist.share_link,
        "shareUrl": share_url,
    })))
}

pub fn make_app(
    config: ServerConfig,
    user_store: Arc<dyn UserStore>,
    playlist_store: Arc<dyn PlaylistStore>,
    token_issuer: TokenIssuer,
) -> Result<Router> {
    let state = ServerState {
        config: config.clone(),
        start_time: Instant::now(),
        user_manager: Arc::new(UserManager::new(user_store)),
        playlist_manager: Arc::new(PlaylistManager::new(playlist_store)),
        token_issuer: Arc::new(token_issuer),
        hash: env!("GIT_HASH").to_owned(),
    };

    let auth_routes: Router = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh", post(refresh))
        .route("/me", get(me))
        .route("/change-password", post(change_password))
        .with_state(state.clone());

    let playlist_routes: Router = Router::new()
        .route("/", post(post_playlist))
        .route("/share/join", post(join_shared_playlist))
        .route("/share/{token}", get(get_shared_playlist))
        .route("/{id}", get(get_playlist))
        .route("/{id}/share", patch(regenerate_share_link))
        .with_state(state.clone());

    let home_router: Router = Router::new().route("/", get(home)).with_state(state.clone());

    let mut app: Router = home_router
        .nest("/v1/auth", auth_routes)
        .nest("/v1/playlists", playlist_routes);

    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

#[allow(clippy::too_many_arguments)]
pub async fn run_server(
    user_store: Arc<dyn UserStore>,
    playlist_store: Arc<dyn PlaylistStore>,
    token_issuer: TokenIssuer,
    requests_logging_level: RequestsLoggingLevel,
    port: u16,
    cookie_secure: bool,
    public_base_url: Option<String>,
) -> Result<()> {
    let config = ServerConfig {
        port,
        requests_logging_level,
        cookie_secure,
        public_base_url: public_base_url.unwrap_or_else(|| format!("http://localhost:{}", port)),
    };
    let app = make_app(config, user_store, playlist_store, token_issuer)?;

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    info!("Listening on port {}", port);

    Ok(axum::serve(listener, app).await?)
}
