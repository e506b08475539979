// Fixtures shared by the blog unit tests.
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::blog::repository::{BlogRepository, NewPost, SqliteBlogRepository};
use crate::db;
use crate::state::DbPool;

pub fn test_repo() -> (SqliteBlogRepository, DbPool) {
    let pool = db::create_memory_pool().unwrap();
    db::run_migrations(&pool).unwrap();
    (SqliteBlogRepository::new(pool.clone()), pool)
}

pub fn seed_user(pool: &DbPool, username: &str) -> i64 {
    seed_named_user(pool, username, "", "")
}

pub fn seed_named_user(pool: &DbPool, username: &str, first_name: &str, last_name: &str) -> i64 {
    let conn = pool.get().unwrap();
    conn.execute(
        "INSERT INTO users (username, first_name, last_name) VALUES (?1, ?2, ?3)",
        params![username, first_name, last_name],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub async fn seed_post(
    repo: &SqliteBlogRepository,
    author_id: i64,
    text: &str,
    pub_date: DateTime<Utc>,
) -> i64 {
    repo.insert_post(&NewPost {
        author_id,
        text: text.to_string(),
        group_id: None,
        image: None,
        pub_date,
    })
    .await
    .unwrap()
}
