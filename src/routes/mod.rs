pub mod feeds;
pub mod posts;
pub mod social;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use rusqlite::params;
use serde::Deserialize;

use crate::auth;
use crate::error::AppResult;
use crate::state::AppState;

/// Every page of the site. State is attached by the caller.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(feeds::router())
        .merge(posts::router())
        .merge(social::router())
}

pub fn profile_url(username: &str) -> String {
    format!("/profile/{}/", username)
}

pub fn post_url(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}

pub fn group_url(slug: &str) -> String {
    format!("/group/{}/", slug)
}

#[derive(Debug, Deserialize)]
pub struct SeedParams {
    pub username: Option<String>,
}

/// Test-only: seed a user + session and return the session cookie.
/// Only mounted when YATUBE_TEST_SEED is set.
pub async fn test_seed(
    State(state): State<AppState>,
    Query(params): Query<SeedParams>,
) -> AppResult<impl IntoResponse> {
    let username = params.username.unwrap_or_else(|| "testuser".to_string());

    let user_id: i64 = {
        let conn = state.db.get()?;
        conn.execute(
            "INSERT OR IGNORE INTO users (username) VALUES (?1)",
            params![username],
        )?;
        conn.query_row(
            "SELECT id FROM users WHERE username = ?1",
            params![username],
            |r| r.get(0),
        )?
    };

    let token = auth::session::create_session(&state.db, user_id, state.config.auth.session_hours)?;

    let cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age=3600",
        state.config.auth.cookie_name, token
    );
    let body = serde_json::json!({ "user_id": user_id, "username": username });

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        axum::Json(body),
    ))
}

pub fn test_seed_router() -> Router<AppState> {
    Router::new().route("/test/seed", get(test_seed))
}
