use std::collections::HashMap;

use axum::extract::{OriginalUri, Path, RawQuery, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;

use crate::blog::views::{self, SearchKind};
use crate::blog::PageRequest;
use crate::cache::PageCache;
use crate::error::AppResult;
use crate::extractors::{CurrentUser, MaybeUser};
use crate::state::AppState;

/// Query-string values for the read-only feeds. A key given more than once
/// keeps its last value, so `?page=1&page=2` is page 2 rather than an error.
#[derive(Debug, Default)]
pub struct QueryParams(HashMap<String, String>);

impl QueryParams {
    pub fn from_raw(raw: Option<&str>) -> Self {
        let values = raw
            .map(|query| url::form_urlencoded::parse(query.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self(values)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/posts/{post_id}/", get(post_detail))
        .route("/follow/", get(follow_index))
        .route("/most_popular/", get(most_popular))
        .route("/like/", get(like_index))
        .route("/search/", get(search))
}

fn page_request(state: &AppState, params: &QueryParams) -> PageRequest {
    PageRequest::parse(params.get("page"), state.config.feed.page_size)
}

/// Newest posts first. Served from the page cache while fresh.
async fn index(
    State(state): State<AppState>,
    viewer: MaybeUser,
    OriginalUri(uri): OriginalUri,
    RawQuery(query): RawQuery,
) -> AppResult<Response> {
    let viewer = viewer.viewer();
    let page = page_request(&state, &QueryParams::from_raw(query.as_deref()));
    let key = PageCache::key(&viewer, uri.path(), page.number);

    let body = match state.page_cache.get(&key).await {
        Some(body) => body,
        None => {
            let repo = state.repo();
            let context = views::index(&repo, &viewer, page).await?;
            let body = Bytes::from(serde_json::to_vec(&context)?);
            state.page_cache.insert(key, body.clone()).await;
            body
        }
    };

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

async fn group_posts(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(slug): Path<String>,
    RawQuery(query): RawQuery,
) -> AppResult<Json<views::GroupPage>> {
    let repo = state.repo();
    let page = page_request(&state, &QueryParams::from_raw(query.as_deref()));
    let context = views::group_posts(&repo, &viewer.viewer(), &slug, page).await?;
    Ok(Json(context))
}

async fn profile(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(username): Path<String>,
    RawQuery(query): RawQuery,
) -> AppResult<Json<views::ProfilePage>> {
    let repo = state.repo();
    let page = page_request(&state, &QueryParams::from_raw(query.as_deref()));
    let context = views::profile(&repo, &viewer.viewer(), &username, page).await?;
    Ok(Json(context))
}

async fn post_detail(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(post_id): Path<i64>,
) -> AppResult<Json<views::PostDetail>> {
    let repo = state.repo();
    let context = views::post_detail(&repo, &viewer.viewer(), post_id).await?;
    Ok(Json(context))
}

async fn follow_index(
    State(state): State<AppState>,
    user: CurrentUser,
    RawQuery(query): RawQuery,
) -> AppResult<Json<views::FeedPage>> {
    let repo = state.repo();
    let page = page_request(&state, &QueryParams::from_raw(query.as_deref()));
    let context = views::follow_index(&repo, &user.viewer(), page).await?;
    Ok(Json(context))
}

async fn most_popular(
    State(state): State<AppState>,
    viewer: MaybeUser,
    RawQuery(query): RawQuery,
) -> AppResult<Json<views::FeedPage>> {
    let repo = state.repo();
    let page = page_request(&state, &QueryParams::from_raw(query.as_deref()));
    let context = views::most_popular_index(&repo, &viewer.viewer(), page).await?;
    Ok(Json(context))
}

async fn like_index(
    State(state): State<AppState>,
    user: CurrentUser,
    RawQuery(query): RawQuery,
) -> AppResult<Json<views::FeedPage>> {
    let repo = state.repo();
    let page = page_request(&state, &QueryParams::from_raw(query.as_deref()));
    let context = views::like_index(&repo, &user.viewer(), page).await?;
    Ok(Json(context))
}

async fn search(
    State(state): State<AppState>,
    viewer: MaybeUser,
    RawQuery(query): RawQuery,
) -> AppResult<Json<views::SearchPage>> {
    let repo = state.repo();
    let params = QueryParams::from_raw(query.as_deref());
    let page = page_request(&state, &params);
    let kind = SearchKind::parse(params.get("type"));
    let context = views::search(&repo, &viewer.viewer(), params.get("q"), kind, page).await?;
    Ok(Json(context))
}
