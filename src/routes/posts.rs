use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Serialize;

use crate::blog::authoring;
use crate::blog::domain::{CommentForm, GroupForm, PostForm};
use crate::blog::{BlogError, BlogRepository, ValidationErrors};
use crate::db::models::Group;
use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::routes::{group_url, post_url, profile_url};
use crate::state::AppState;

// --- Form contexts ---

#[derive(Debug, Serialize)]
pub struct PostFormPage {
    pub form: PostForm,
    pub errors: ValidationErrors,
    pub groups: Vec<Group>,
    pub is_edit: bool,
    pub post_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CommentFormPage {
    pub post_id: i64,
    pub form: CommentForm,
    pub errors: ValidationErrors,
}

#[derive(Debug, Serialize)]
pub struct GroupFormPage {
    pub form: GroupForm,
    pub errors: ValidationErrors,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create/", get(new_post).post(create_post))
        .route("/posts/{post_id}/edit/", get(edit_post_form).post(edit_post))
        .route("/posts/{post_id}/delete/", post(delete_post))
        .route("/posts/{post_id}/comment/", post(add_comment))
        .route("/create_group/", get(new_group).post(create_group))
}

async fn post_form_page(
    repo: &dyn BlogRepository,
    form: PostForm,
    errors: ValidationErrors,
    post_id: Option<i64>,
) -> AppResult<PostFormPage> {
    Ok(PostFormPage {
        form,
        errors,
        groups: repo.list_groups().await?,
        is_edit: post_id.is_some(),
        post_id,
    })
}

fn rejected<T: Serialize>(context: T) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, Json(context)).into_response()
}

// --- Handlers ---

async fn new_post(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<PostFormPage>> {
    let repo = state.repo();
    let page = post_form_page(&repo, PostForm::default(), ValidationErrors::new(), None).await?;
    Ok(Json(page))
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    let repo = state.repo();

    match authoring::create_post(&repo, &user.viewer(), &form).await {
        Ok(_) => Ok(Redirect::to(&profile_url(&user.username)).into_response()),
        Err(BlogError::Validation(errors)) => {
            Ok(rejected(post_form_page(&repo, form, errors, None).await?))
        }
        Err(e) => Err(e.into()),
    }
}

async fn edit_post_form(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
) -> AppResult<Json<PostFormPage>> {
    let repo = state.repo();
    let form = authoring::edit_form(&repo, &user.viewer(), post_id).await?;
    let page = post_form_page(&repo, form, ValidationErrors::new(), Some(post_id)).await?;
    Ok(Json(page))
}

async fn edit_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    let repo = state.repo();

    match authoring::edit_post(&repo, &user.viewer(), post_id, &form).await {
        Ok(_) => Ok(Redirect::to(&post_url(post_id)).into_response()),
        Err(BlogError::Validation(errors)) => Ok(rejected(
            post_form_page(&repo, form, errors, Some(post_id)).await?,
        )),
        Err(e) => Err(e.into()),
    }
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
) -> AppResult<Redirect> {
    let repo = state.repo();
    authoring::delete_post(&repo, &user.viewer(), post_id).await?;
    Ok(Redirect::to(&profile_url(&user.username)))
}

async fn add_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let repo = state.repo();

    match authoring::add_comment(&repo, &user.viewer(), post_id, &form).await {
        Ok(_) => Ok(Redirect::to(&post_url(post_id)).into_response()),
        Err(BlogError::Validation(errors)) => Ok(rejected(CommentFormPage {
            post_id,
            form,
            errors,
        })),
        Err(e) => Err(e.into()),
    }
}

async fn new_group(_user: CurrentUser) -> Json<GroupFormPage> {
    Json(GroupFormPage {
        form: GroupForm::default(),
        errors: ValidationErrors::new(),
    })
}

async fn create_group(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<GroupForm>,
) -> AppResult<Response> {
    let repo = state.repo();

    match authoring::create_group(&repo, &user.viewer(), &form).await {
        Ok(group) => Ok(Redirect::to(&group_url(&group.slug)).into_response()),
        Err(BlogError::Validation(errors)) => Ok(rejected(GroupFormPage { form, errors })),
        Err(e) => Err(e.into()),
    }
}
