use crate::blog::domain::Viewer;
use crate::blog::pagination::Page;
use crate::blog::repository::{BlogRepository, RepositoryError};
use crate::db::models::{Follow, Post, User};

/// Mark each post on the page the viewer has liked. One membership query per
/// page; anonymous viewers never touch the store and see no likes.
pub async fn annotate_like_state(
    repo: &dyn BlogRepository,
    page: &mut Page<Post>,
    viewer: &Viewer,
) -> Result<(), RepositoryError> {
    let Some(user) = viewer.as_user() else {
        for post in page.iter_mut() {
            post.liked_by_viewer = false;
        }
        return Ok(());
    };

    let post_ids: Vec<i64> = page.iter().map(|p| p.id).collect();
    let liked = repo.liked_post_ids(user.id, &post_ids).await?;

    for post in page.iter_mut() {
        post.liked_by_viewer = liked.contains(&post.id);
    }

    Ok(())
}

/// Whether the viewer follows `author`. Always false for anonymous viewers
/// and for an author looking at their own profile.
pub async fn compute_follow_state(
    repo: &dyn BlogRepository,
    viewer: &Viewer,
    author: &User,
) -> Result<bool, RepositoryError> {
    match viewer.as_user() {
        Some(user) if user.id != author.id => {
            repo.follow_exists(&Follow {
                user_id: user.id,
                author_id: author.id,
            })
            .await
        }
        _ => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blog::pagination::{paginate, PageRequest};
    use crate::blog::query::feed_by_recency;
    use crate::blog::testing::{seed_post, seed_user, test_repo};
    use crate::db::models::Like;
    use chrono::Utc;

    #[tokio::test]
    async fn marks_only_liked_posts() {
        let (repo, pool) = test_repo();
        let leo = seed_user(&pool, "leo");
        let liked = seed_post(&repo, leo, "liked", Utc::now()).await;
        let plain = seed_post(&repo, leo, "plain", Utc::now()).await;
        repo.insert_like(&Like {
            user_id: leo,
            post_id: liked,
        })
        .await
        .unwrap();

        let posts = feed_by_recency(&repo);
        let mut page = paginate(&posts, PageRequest::default()).await.unwrap();
        annotate_like_state(&repo, &mut page, &Viewer::user(leo, "leo"))
            .await
            .unwrap();

        for post in page.iter() {
            assert_eq!(post.liked_by_viewer, post.id == liked, "post {}", post.id);
        }
        assert!(page.iter().any(|p| p.id == plain));
    }

    #[tokio::test]
    async fn anonymous_viewer_sees_no_likes() {
        let (repo, pool) = test_repo();
        let leo = seed_user(&pool, "leo");
        let post_id = seed_post(&repo, leo, "liked", Utc::now()).await;
        repo.insert_like(&Like {
            user_id: leo,
            post_id,
        })
        .await
        .unwrap();

        let posts = feed_by_recency(&repo);
        let mut page = paginate(&posts, PageRequest::default()).await.unwrap();
        page.items[0].liked_by_viewer = true;
        annotate_like_state(&repo, &mut page, &Viewer::Anonymous)
            .await
            .unwrap();

        assert!(page.iter().all(|p| !p.liked_by_viewer));
        assert_eq!(page.items[0].like_count, 1);
    }

    #[tokio::test]
    async fn follow_state_rules() {
        let (repo, pool) = test_repo();
        let leo_id = seed_user(&pool, "leo");
        let ann_id = seed_user(&pool, "ann");
        let ann = repo.user_by_username("ann").await.unwrap().unwrap();
        let leo = repo.user_by_username("leo").await.unwrap().unwrap();
        let viewer = Viewer::user(leo_id, "leo");

        assert!(!compute_follow_state(&repo, &viewer, &ann).await.unwrap());

        repo.insert_follow(&Follow {
            user_id: leo_id,
            author_id: ann_id,
        })
        .await
        .unwrap();
        assert!(compute_follow_state(&repo, &viewer, &ann).await.unwrap());
        assert!(!compute_follow_state(&repo, &Viewer::Anonymous, &ann)
            .await
            .unwrap());
        assert!(!compute_follow_state(&repo, &viewer, &leo).await.unwrap());
    }
}
