//! Follow and like edges. Every operation needs a signed-in viewer and is
//! idempotent: repeating it leaves the store as the first call did. The
//! returned bool says whether anything changed.

use crate::blog::domain::{BlogError, Viewer};
use crate::blog::query::find_post;
use crate::blog::repository::BlogRepository;
use crate::db::models::{Follow, Like, User};

pub async fn follow(
    repo: &dyn BlogRepository,
    viewer: &Viewer,
    author: &User,
) -> Result<bool, BlogError> {
    let user = viewer.require_user()?;
    if user.id == author.id {
        return Ok(false);
    }

    let created = repo
        .insert_follow(&Follow {
            user_id: user.id,
            author_id: author.id,
        })
        .await?;

    if created {
        tracing::info!("{} followed {}", user.username, author.username);
    }
    Ok(created)
}

pub async fn unfollow(
    repo: &dyn BlogRepository,
    viewer: &Viewer,
    author: &User,
) -> Result<bool, BlogError> {
    let user = viewer.require_user()?;

    let removed = repo
        .delete_follow(&Follow {
            user_id: user.id,
            author_id: author.id,
        })
        .await?;

    if removed {
        tracing::info!("{} unfollowed {}", user.username, author.username);
    }
    Ok(removed)
}

pub async fn like(
    repo: &dyn BlogRepository,
    viewer: &Viewer,
    post_id: i64,
) -> Result<bool, BlogError> {
    let user = viewer.require_user()?;
    find_post(repo, post_id).await?;

    let created = repo
        .insert_like(&Like {
            user_id: user.id,
            post_id,
        })
        .await?;

    if created {
        tracing::info!("{} liked post {}", user.username, post_id);
    }
    Ok(created)
}

pub async fn unlike(
    repo: &dyn BlogRepository,
    viewer: &Viewer,
    post_id: i64,
) -> Result<bool, BlogError> {
    let user = viewer.require_user()?;
    find_post(repo, post_id).await?;

    let removed = repo
        .delete_like(&Like {
            user_id: user.id,
            post_id,
        })
        .await?;

    if removed {
        tracing::info!("{} unliked post {}", user.username, post_id);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blog::testing::{seed_post, seed_user, test_repo};
    use chrono::Utc;

    fn count(pool: &crate::state::DbPool, sql: &str) -> i64 {
        pool.get()
            .unwrap()
            .query_row(sql, [], |row| row.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn double_like_leaves_one_edge() {
        let (repo, pool) = test_repo();
        let leo = seed_user(&pool, "leo");
        let post_id = seed_post(&repo, leo, "hi", Utc::now()).await;
        let viewer = Viewer::user(leo, "leo");

        assert!(like(&repo, &viewer, post_id).await.unwrap());
        assert!(!like(&repo, &viewer, post_id).await.unwrap());
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM likes"), 1);
    }

    #[tokio::test]
    async fn unlike_without_edge_is_noop() {
        let (repo, pool) = test_repo();
        let leo = seed_user(&pool, "leo");
        let post_id = seed_post(&repo, leo, "hi", Utc::now()).await;
        let viewer = Viewer::user(leo, "leo");

        assert!(!unlike(&repo, &viewer, post_id).await.unwrap());

        like(&repo, &viewer, post_id).await.unwrap();
        assert!(unlike(&repo, &viewer, post_id).await.unwrap());
        assert!(!unlike(&repo, &viewer, post_id).await.unwrap());
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM likes"), 0);
    }

    #[tokio::test]
    async fn like_unknown_post_is_not_found() {
        let (repo, pool) = test_repo();
        let leo = seed_user(&pool, "leo");
        let viewer = Viewer::user(leo, "leo");

        let result = like(&repo, &viewer, 404).await;
        assert!(matches!(result, Err(BlogError::NotFound(_))));
    }

    #[tokio::test]
    async fn self_follow_never_creates_edge() {
        let (repo, pool) = test_repo();
        let leo_id = seed_user(&pool, "leo");
        let leo = repo.user_by_username("leo").await.unwrap().unwrap();
        let viewer = Viewer::user(leo_id, "leo");

        assert!(!follow(&repo, &viewer, &leo).await.unwrap());
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM follows"), 0);
    }

    #[tokio::test]
    async fn follow_and_unfollow_are_idempotent() {
        let (repo, pool) = test_repo();
        let leo_id = seed_user(&pool, "leo");
        seed_user(&pool, "ann");
        let ann = repo.user_by_username("ann").await.unwrap().unwrap();
        let viewer = Viewer::user(leo_id, "leo");

        assert!(follow(&repo, &viewer, &ann).await.unwrap());
        assert!(!follow(&repo, &viewer, &ann).await.unwrap());
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM follows"), 1);

        assert!(unfollow(&repo, &viewer, &ann).await.unwrap());
        assert!(!unfollow(&repo, &viewer, &ann).await.unwrap());
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM follows"), 0);
    }

    #[tokio::test]
    async fn anonymous_mutations_are_unauthorized() {
        let (repo, pool) = test_repo();
        let leo_id = seed_user(&pool, "leo");
        let leo = repo.user_by_username("leo").await.unwrap().unwrap();
        let post_id = seed_post(&repo, leo_id, "hi", Utc::now()).await;
        let anon = Viewer::Anonymous;

        assert!(matches!(
            follow(&repo, &anon, &leo).await,
            Err(BlogError::Unauthorized)
        ));
        assert!(matches!(
            unfollow(&repo, &anon, &leo).await,
            Err(BlogError::Unauthorized)
        ));
        assert!(matches!(
            like(&repo, &anon, post_id).await,
            Err(BlogError::Unauthorized)
        ));
        assert!(matches!(
            unlike(&repo, &anon, post_id).await,
            Err(BlogError::Unauthorized)
        ));
    }
}
