use axum::extract::{Path, State};
use axum::response::Redirect;
use axum::routing::get;
use axum::Router;

use crate::blog::query::find_author;
use crate::blog::social;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::routes::{post_url, profile_url};
use crate::state::AppState;

// Links in pages are plain anchors, so every edge toggle answers GET too.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/profile/{username}/follow/",
            get(follow_author).post(follow_author),
        )
        .route(
            "/profile/{username}/unfollow/",
            get(unfollow_author).post(unfollow_author),
        )
        .route("/posts/{post_id}/like/", get(like_post).post(like_post))
        .route(
            "/posts/{post_id}/unlike/",
            get(unlike_post).post(unlike_post),
        )
}

async fn follow_author(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Redirect> {
    let repo = state.repo();
    let author = find_author(&repo, &username).await?;
    social::follow(&repo, &user.viewer(), &author).await?;
    Ok(Redirect::to(&profile_url(&author.username)))
}

async fn unfollow_author(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(username): Path<String>,
) -> AppResult<Redirect> {
    let repo = state.repo();
    let author = find_author(&repo, &username).await?;
    social::unfollow(&repo, &user.viewer(), &author).await?;
    Ok(Redirect::to(&profile_url(&author.username)))
}

async fn like_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
) -> AppResult<Redirect> {
    let repo = state.repo();
    social::like(&repo, &user.viewer(), post_id).await?;
    Ok(Redirect::to(&post_url(post_id)))
}

async fn unlike_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
) -> AppResult<Redirect> {
    let repo = state.repo();
    social::unlike(&repo, &user.viewer(), post_id).await?;
    Ok(Redirect::to(&post_url(post_id)))
}
