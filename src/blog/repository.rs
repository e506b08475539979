// Repository pattern - isolates all database side effects
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};
use std::collections::HashSet;
use thiserror::Error;

use crate::db::models::{AuthorSummary, Comment, Follow, Group, GroupRef, Like, Post, User};
use crate::db::{encode_timestamp, timestamp_column};
use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Which posts a feed draws from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFilter {
    All,
    /// Matches nothing, without touching the store.
    Nothing,
    Group(i64),
    Author(i64),
    /// Posts by any author the given user follows.
    FollowedBy(i64),
    LikedBy(i64),
    /// Case-insensitive substring match on the post text.
    TextContains(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOrder {
    /// `pub_date` descending, newest id first on ties.
    Newest,
    /// Like count descending, then as `Newest`.
    MostLiked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostQuery {
    pub filter: PostFilter,
    pub order: PostOrder,
}

impl PostQuery {
    pub fn newest(filter: PostFilter) -> Self {
        Self {
            filter,
            order: PostOrder::Newest,
        }
    }

    pub fn most_liked(filter: PostFilter) -> Self {
        Self {
            filter,
            order: PostOrder::MostLiked,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: i64,
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PostChanges {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub creator_id: i64,
}

/// Repository trait - all database operations
#[async_trait]
pub trait BlogRepository: Send + Sync {
    async fn user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;

    async fn group_by_slug(&self, slug: &str) -> Result<Option<Group>, RepositoryError>;

    async fn group_exists(&self, group_id: i64) -> Result<bool, RepositoryError>;

    /// All groups, for the group picker on the post form.
    async fn list_groups(&self) -> Result<Vec<Group>, RepositoryError>;

    /// Insert a group. A taken slug is a `Conflict`.
    async fn insert_group(&self, group: &NewGroup) -> Result<i64, RepositoryError>;

    async fn post_by_id(&self, post_id: i64) -> Result<Option<Post>, RepositoryError>;

    async fn count_posts(&self, query: &PostQuery) -> Result<u64, RepositoryError>;

    /// One window of an ordered post set.
    async fn list_posts(
        &self,
        query: &PostQuery,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Post>, RepositoryError>;

    async fn insert_post(&self, post: &NewPost) -> Result<i64, RepositoryError>;

    async fn update_post(&self, post_id: i64, changes: &PostChanges)
        -> Result<bool, RepositoryError>;

    /// Delete a post; its comments and likes go with it.
    async fn delete_post(&self, post_id: i64) -> Result<bool, RepositoryError>;

    async fn insert_comment(&self, comment: &NewComment) -> Result<i64, RepositoryError>;

    /// Comments on a post, newest first.
    async fn comments_for_post(&self, post_id: i64) -> Result<Vec<Comment>, RepositoryError>;

    /// Users whose username, first or last name contains `term`.
    async fn count_authors(&self, term: &str) -> Result<u64, RepositoryError>;

    async fn list_authors(
        &self,
        term: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<AuthorSummary>, RepositoryError>;

    /// Batched membership check: which of `post_ids` has `user_id` liked.
    async fn liked_post_ids(
        &self,
        user_id: i64,
        post_ids: &[i64],
    ) -> Result<HashSet<i64>, RepositoryError>;

    async fn follow_exists(&self, edge: &Follow) -> Result<bool, RepositoryError>;

    /// Returns false if the edge was already there.
    async fn insert_follow(&self, edge: &Follow) -> Result<bool, RepositoryError>;

    async fn delete_follow(&self, edge: &Follow) -> Result<bool, RepositoryError>;

    /// Returns false if the edge was already there.
    async fn insert_like(&self, edge: &Like) -> Result<bool, RepositoryError>;

    async fn delete_like(&self, edge: &Like) -> Result<bool, RepositoryError>;
}

const POST_SELECT: &str = "SELECT p.id, p.text, p.pub_date, p.author_id, u.username,
        g.id, g.slug, g.title, p.image,
        (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS like_count
     FROM posts p
     JOIN users u ON u.id = p.author_id
     LEFT JOIN post_groups g ON g.id = p.group_id";

const AUTHOR_MATCH: &str = "instr(casefold(u.username), ?1) > 0
        OR instr(casefold(u.first_name), ?1) > 0
        OR instr(casefold(u.last_name), ?1) > 0";

/// SQLite implementation
pub struct SqliteBlogRepository {
    pool: DbPool,
}

impl SqliteBlogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// WHERE clause and its bound values for a filter. `?1` is the first value.
fn filter_clause(filter: &PostFilter) -> (&'static str, Vec<Value>) {
    match filter {
        PostFilter::All | PostFilter::Nothing => ("", Vec::new()),
        PostFilter::Group(id) => ("WHERE p.group_id = ?1", vec![Value::Integer(*id)]),
        PostFilter::Author(id) => ("WHERE p.author_id = ?1", vec![Value::Integer(*id)]),
        PostFilter::FollowedBy(user_id) => (
            "WHERE p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ?1)",
            vec![Value::Integer(*user_id)],
        ),
        PostFilter::LikedBy(user_id) => (
            "WHERE p.id IN (SELECT l.post_id FROM likes l WHERE l.user_id = ?1)",
            vec![Value::Integer(*user_id)],
        ),
        PostFilter::TextContains(term) => (
            "WHERE instr(casefold(p.text), ?1) > 0",
            vec![Value::Text(term.to_lowercase())],
        ),
    }
}

fn order_clause(order: PostOrder) -> &'static str {
    match order {
        PostOrder::Newest => "ORDER BY p.pub_date DESC, p.id DESC",
        PostOrder::MostLiked => "ORDER BY like_count DESC, p.pub_date DESC, p.id DESC",
    }
}

fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    let group_id: Option<i64> = row.get(5)?;
    let group = match group_id {
        Some(id) => Some(GroupRef {
            id,
            slug: row.get(6)?,
            title: row.get(7)?,
        }),
        None => None,
    };

    Ok(Post {
        id: row.get(0)?,
        text: row.get(1)?,
        pub_date: timestamp_column(row, 2)?,
        author_id: row.get(3)?,
        author_username: row.get(4)?,
        group,
        image: row.get(8)?,
        like_count: row.get(9)?,
        liked_by_viewer: false,
    })
}

fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        creator_id: row.get(4)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[async_trait]
impl BlogRepository for SqliteBlogRepository {
    async fn user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;

        let user = conn
            .query_row(
                "SELECT id, username, first_name, last_name FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        first_name: row.get(2)?,
                        last_name: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(user)
    }

    async fn group_by_slug(&self, slug: &str) -> Result<Option<Group>, RepositoryError> {
        let conn = self.pool.get()?;

        let group = conn
            .query_row(
                "SELECT id, title, slug, description, creator_id FROM post_groups WHERE slug = ?1",
                params![slug],
                row_to_group,
            )
            .optional()?;

        Ok(group)
    }

    async fn group_exists(&self, group_id: i64) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;

        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM post_groups WHERE id = ?1",
            params![group_id],
            |row| row.get(0),
        )?;

        Ok(exists)
    }

    async fn list_groups(&self) -> Result<Vec<Group>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT id, title, slug, description, creator_id FROM post_groups ORDER BY title, id",
        )?;
        let groups = stmt
            .query_map([], row_to_group)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(groups)
    }

    async fn insert_group(&self, group: &NewGroup) -> Result<i64, RepositoryError> {
        let conn = self.pool.get()?;

        let result = conn.execute(
            "INSERT INTO post_groups (title, slug, description, creator_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![group.title, group.slug, group.description, group.creator_id],
        );

        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::Conflict(format!(
                "group slug '{}' is taken",
                group.slug
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn post_by_id(&self, post_id: i64) -> Result<Option<Post>, RepositoryError> {
        let conn = self.pool.get()?;

        let sql = format!("{} WHERE p.id = ?1", POST_SELECT);
        let post = conn
            .query_row(&sql, params![post_id], row_to_post)
            .optional()?;

        Ok(post)
    }

    async fn count_posts(&self, query: &PostQuery) -> Result<u64, RepositoryError> {
        if query.filter == PostFilter::Nothing {
            return Ok(0);
        }

        let conn = self.pool.get()?;
        let (where_clause, args) = filter_clause(&query.filter);

        let sql = format!("SELECT COUNT(*) FROM posts p {}", where_clause);
        let count: i64 = conn.query_row(&sql, params_from_iter(args.iter()), |row| row.get(0))?;

        Ok(count.max(0) as u64)
    }

    async fn list_posts(
        &self,
        query: &PostQuery,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Post>, RepositoryError> {
        if query.filter == PostFilter::Nothing || limit == 0 {
            return Ok(Vec::new());
        }

        let conn = self.pool.get()?;
        let (where_clause, mut args) = filter_clause(&query.filter);

        let limit_idx = args.len() + 1;
        args.push(Value::Integer(to_i64(limit)));
        args.push(Value::Integer(to_i64(offset)));

        let sql = format!(
            "{} {} {} LIMIT ?{} OFFSET ?{}",
            POST_SELECT,
            where_clause,
            order_clause(query.order),
            limit_idx,
            limit_idx + 1
        );

        let mut stmt = conn.prepare(&sql)?;
        let posts = stmt
            .query_map(params_from_iter(args.iter()), row_to_post)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(posts)
    }

    async fn insert_post(&self, post: &NewPost) -> Result<i64, RepositoryError> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO posts (text, pub_date, author_id, group_id, image)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                post.text,
                encode_timestamp(&post.pub_date),
                post.author_id,
                post.group_id,
                post.image
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    async fn update_post(
        &self,
        post_id: i64,
        changes: &PostChanges,
    ) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            "UPDATE posts SET text = ?1, group_id = ?2, image = ?3 WHERE id = ?4",
            params![changes.text, changes.group_id, changes.image, post_id],
        )?;

        Ok(rows > 0)
    }

    async fn delete_post(&self, post_id: i64) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;

        let rows = conn.execute("DELETE FROM posts WHERE id = ?1", params![post_id])?;

        Ok(rows > 0)
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<i64, RepositoryError> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO comments (post_id, author_id, text, created) VALUES (?1, ?2, ?3, ?4)",
            params![
                comment.post_id,
                comment.author_id,
                comment.text,
                encode_timestamp(&comment.created)
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    async fn comments_for_post(&self, post_id: i64) -> Result<Vec<Comment>, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT c.id, c.post_id, c.author_id, u.username, c.text, c.created
             FROM comments c
             JOIN users u ON u.id = c.author_id
             WHERE c.post_id = ?1
             ORDER BY c.created DESC, c.id DESC",
        )?;

        let comments = stmt
            .query_map(params![post_id], |row| {
                Ok(Comment {
                    id: row.get(0)?,
                    post_id: row.get(1)?,
                    author_id: row.get(2)?,
                    author_username: row.get(3)?,
                    text: row.get(4)?,
                    created: timestamp_column(row, 5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(comments)
    }

    async fn count_authors(&self, term: &str) -> Result<u64, RepositoryError> {
        let conn = self.pool.get()?;

        let sql = format!("SELECT COUNT(*) FROM users u WHERE {}", AUTHOR_MATCH);
        let count: i64 = conn.query_row(&sql, params![term.to_lowercase()], |row| row.get(0))?;

        Ok(count.max(0) as u64)
    }

    async fn list_authors(
        &self,
        term: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<AuthorSummary>, RepositoryError> {
        let conn = self.pool.get()?;

        let sql = format!(
            "SELECT u.id, u.username, u.first_name, u.last_name,
                (SELECT COUNT(*) FROM posts p WHERE p.author_id = u.id) AS posts_count
             FROM users u
             WHERE {}
             ORDER BY u.username, u.id
             LIMIT ?2 OFFSET ?3",
            AUTHOR_MATCH
        );

        let mut stmt = conn.prepare(&sql)?;
        let authors = stmt
            .query_map(
                params![term.to_lowercase(), to_i64(limit), to_i64(offset)],
                |row| {
                    Ok(AuthorSummary {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        first_name: row.get(2)?,
                        last_name: row.get(3)?,
                        posts_count: row.get(4)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(authors)
    }

    async fn liked_post_ids(
        &self,
        user_id: i64,
        post_ids: &[i64],
    ) -> Result<HashSet<i64>, RepositoryError> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let conn = self.pool.get()?;

        let placeholders: Vec<String> = (0..post_ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect();
        let sql = format!(
            "SELECT post_id FROM likes WHERE user_id = ?1 AND post_id IN ({})",
            placeholders.join(", ")
        );

        let args: Vec<Value> = std::iter::once(user_id)
            .chain(post_ids.iter().copied())
            .map(Value::Integer)
            .collect();

        let mut stmt = conn.prepare(&sql)?;
        let liked = stmt
            .query_map(params_from_iter(args.iter()), |row| row.get::<_, i64>(0))?
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(liked)
    }

    async fn follow_exists(&self, edge: &Follow) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;

        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM follows WHERE user_id = ?1 AND author_id = ?2",
            params![edge.user_id, edge.author_id],
            |row| row.get(0),
        )?;

        Ok(exists)
    }

    async fn insert_follow(&self, edge: &Follow) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;

        // The unique index settles concurrent duplicates
        let rows = conn.execute(
            "INSERT INTO follows (user_id, author_id) VALUES (?1, ?2)
             ON CONFLICT(user_id, author_id) DO NOTHING",
            params![edge.user_id, edge.author_id],
        )?;

        Ok(rows > 0)
    }

    async fn delete_follow(&self, edge: &Follow) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            "DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2",
            params![edge.user_id, edge.author_id],
        )?;

        Ok(rows > 0)
    }

    async fn insert_like(&self, edge: &Like) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            "INSERT INTO likes (user_id, post_id) VALUES (?1, ?2)
             ON CONFLICT(user_id, post_id) DO NOTHING",
            params![edge.user_id, edge.post_id],
        )?;

        Ok(rows > 0)
    }

    async fn delete_like(&self, edge: &Like) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;

        let rows = conn.execute(
            "DELETE FROM likes WHERE user_id = ?1 AND post_id = ?2",
            params![edge.user_id, edge.post_id],
        )?;

        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blog::testing::{seed_post, seed_user, test_repo};
    use chrono::TimeZone;

    #[tokio::test]
    async fn user_lookup_by_username() {
        let (repo, pool) = test_repo();
        seed_user(&pool, "leo");

        let user = repo.user_by_username("leo").await.unwrap().unwrap();
        assert_eq!(user.username, "leo");
        assert!(repo.user_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn newest_order_breaks_ties_by_id() {
        let (repo, pool) = test_repo();
        let author = seed_user(&pool, "leo");
        let when = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let first = seed_post(&repo, author, "first", when).await;
        let second = seed_post(&repo, author, "second", when).await;

        let posts = repo
            .list_posts(&PostQuery::newest(PostFilter::All), 10, 0)
            .await
            .unwrap();
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[tokio::test]
    async fn nothing_filter_is_empty() {
        let (repo, pool) = test_repo();
        let author = seed_user(&pool, "leo");
        seed_post(&repo, author, "hello", Utc::now()).await;

        let query = PostQuery::newest(PostFilter::Nothing);
        assert_eq!(repo.count_posts(&query).await.unwrap(), 0);
        assert!(repo.list_posts(&query, 10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_follow_is_ignored() {
        let (repo, pool) = test_repo();
        let leo = seed_user(&pool, "leo");
        let ann = seed_user(&pool, "ann");
        let edge = Follow {
            user_id: leo,
            author_id: ann,
        };

        assert!(repo.insert_follow(&edge).await.unwrap());
        assert!(!repo.insert_follow(&edge).await.unwrap());
        assert!(repo.follow_exists(&edge).await.unwrap());
        assert!(repo.delete_follow(&edge).await.unwrap());
        assert!(!repo.delete_follow(&edge).await.unwrap());
    }

    #[tokio::test]
    async fn liked_post_ids_only_reports_requested_posts() {
        let (repo, pool) = test_repo();
        let leo = seed_user(&pool, "leo");
        let a = seed_post(&repo, leo, "a", Utc::now()).await;
        let b = seed_post(&repo, leo, "b", Utc::now()).await;
        let c = seed_post(&repo, leo, "c", Utc::now()).await;
        for post_id in [a, c] {
            repo.insert_like(&Like {
                user_id: leo,
                post_id,
            })
            .await
            .unwrap();
        }

        let liked = repo.liked_post_ids(leo, &[a, b]).await.unwrap();
        assert_eq!(liked, HashSet::from([a]));
        assert!(repo.liked_post_ids(leo, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_group_slug_is_conflict() {
        let (repo, pool) = test_repo();
        let leo = seed_user(&pool, "leo");
        let group = NewGroup {
            title: "Cats".into(),
            slug: "cats".into(),
            description: "About cats".into(),
            creator_id: leo,
        };

        repo.insert_group(&group).await.unwrap();
        let err = repo.insert_group(&group).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn deleting_group_keeps_posts() {
        let (repo, pool) = test_repo();
        let leo = seed_user(&pool, "leo");
        let group_id = repo
            .insert_group(&NewGroup {
                title: "Cats".into(),
                slug: "cats".into(),
                description: "About cats".into(),
                creator_id: leo,
            })
            .await
            .unwrap();
        let post_id = repo
            .insert_post(&NewPost {
                author_id: leo,
                text: "meow".into(),
                group_id: Some(group_id),
                image: None,
                pub_date: Utc::now(),
            })
            .await
            .unwrap();

        pool.get()
            .unwrap()
            .execute("DELETE FROM post_groups WHERE id = ?1", params![group_id])
            .unwrap();

        let post = repo.post_by_id(post_id).await.unwrap().unwrap();
        assert_eq!(post.group, None);
    }
}
