//! Writing posts, comments and groups. Forms are validated into drafts
//! first; only a valid draft reaches the store.

use chrono::Utc;

use crate::blog::domain::{
    BlogError, CommentForm, GroupForm, PostDraft, PostForm, ValidationErrors, Viewer,
    DUPLICATE_SLUG, INVALID_CHOICE,
};
use crate::blog::query::find_post;
use crate::blog::repository::{
    BlogRepository, NewComment, NewGroup, NewPost, PostChanges, RepositoryError,
};
use crate::db::models::{Comment, Group, Post};

/// Validate a post form, including that the chosen group exists.
async fn validate_post(repo: &dyn BlogRepository, form: &PostForm) -> Result<PostDraft, BlogError> {
    let draft = form.validate()?;

    if let Some(group_id) = draft.group_id {
        if !repo.group_exists(group_id).await? {
            return Err(ValidationErrors::single("group", INVALID_CHOICE).into());
        }
    }

    Ok(draft)
}

pub async fn create_post(
    repo: &dyn BlogRepository,
    viewer: &Viewer,
    form: &PostForm,
) -> Result<Post, BlogError> {
    let user = viewer.require_user()?;
    let draft = validate_post(repo, form).await?;

    let post_id = repo
        .insert_post(&NewPost {
            author_id: user.id,
            text: draft.text,
            group_id: draft.group_id,
            image: draft.image,
            pub_date: Utc::now(),
        })
        .await?;

    tracing::info!("{} created post {}", user.username, post_id);
    find_post(repo, post_id).await
}

/// The author's current post, as a form to edit.
pub async fn edit_form(
    repo: &dyn BlogRepository,
    viewer: &Viewer,
    post_id: i64,
) -> Result<PostForm, BlogError> {
    viewer.require_user()?;
    let post = find_post(repo, post_id).await?;
    if !viewer.is(post.author_id) {
        return Err(BlogError::Forbidden { post_id });
    }

    Ok(PostForm {
        text: post.text,
        group: post.group.map(|g| g.id.to_string()),
        image: post.image,
    })
}

/// Replace text, group and image. Authorship is checked before the form.
pub async fn edit_post(
    repo: &dyn BlogRepository,
    viewer: &Viewer,
    post_id: i64,
    form: &PostForm,
) -> Result<Post, BlogError> {
    let user = viewer.require_user()?;
    let post = find_post(repo, post_id).await?;
    if post.author_id != user.id {
        return Err(BlogError::Forbidden { post_id });
    }

    let draft = validate_post(repo, form).await?;
    repo.update_post(
        post_id,
        &PostChanges {
            text: draft.text,
            group_id: draft.group_id,
            image: draft.image,
        },
    )
    .await?;

    tracing::info!("{} edited post {}", user.username, post_id);
    find_post(repo, post_id).await
}

pub async fn delete_post(
    repo: &dyn BlogRepository,
    viewer: &Viewer,
    post_id: i64,
) -> Result<(), BlogError> {
    let user = viewer.require_user()?;
    let post = find_post(repo, post_id).await?;
    if post.author_id != user.id {
        return Err(BlogError::Forbidden { post_id });
    }

    repo.delete_post(post_id).await?;
    tracing::info!("{} deleted post {}", user.username, post_id);
    Ok(())
}

pub async fn add_comment(
    repo: &dyn BlogRepository,
    viewer: &Viewer,
    post_id: i64,
    form: &CommentForm,
) -> Result<Comment, BlogError> {
    let user = viewer.require_user()?;
    find_post(repo, post_id).await?;
    let draft = form.validate()?;

    let created = Utc::now();
    let comment_id = repo
        .insert_comment(&NewComment {
            post_id,
            author_id: user.id,
            text: draft.text.clone(),
            created,
        })
        .await?;

    tracing::info!("{} commented on post {}", user.username, post_id);
    Ok(Comment {
        id: comment_id,
        post_id,
        author_id: user.id,
        author_username: user.username.clone(),
        text: draft.text,
        created,
    })
}

pub async fn create_group(
    repo: &dyn BlogRepository,
    viewer: &Viewer,
    form: &GroupForm,
) -> Result<Group, BlogError> {
    let user = viewer.require_user()?;
    let draft = form.validate()?;

    let new_group = NewGroup {
        title: draft.title,
        slug: draft.slug,
        description: draft.description,
        creator_id: user.id,
    };

    let group_id = match repo.insert_group(&new_group).await {
        Ok(id) => id,
        Err(RepositoryError::Conflict(_)) => {
            return Err(ValidationErrors::single("slug", DUPLICATE_SLUG).into());
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!("{} created group {}", user.username, new_group.slug);
    Ok(Group {
        id: group_id,
        title: new_group.title,
        slug: new_group.slug,
        description: new_group.description,
        creator_id: Some(user.id),
    })
}
