use rand::Rng;
use rusqlite::params;

use crate::error::AppError;
use crate::state::DbPool;

/// Create a new session for a user. Returns the session token.
pub fn create_session(pool: &DbPool, user_id: i64, hours: u64) -> Result<String, AppError> {
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at)
         VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    tracing::info!("Created session for user {}", user_id);
    Ok(token)
}

/// Delete a session by token.
pub fn delete_session(pool: &DbPool, token: &str) -> Result<(), AppError> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn pool_with_user() -> (DbPool, i64) {
        let pool = db::create_memory_pool().unwrap();
        db::run_migrations(&pool).unwrap();
        let conn = pool.get().unwrap();
        conn.execute("INSERT INTO users (username) VALUES ('leo')", [])
            .unwrap();
        let id = conn.last_insert_rowid();
        drop(conn);
        (pool, id)
    }

    fn live_sessions(pool: &DbPool, token: &str) -> i64 {
        pool.get()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM sessions WHERE token = ?1 AND expires_at > datetime('now')",
                params![token],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
    }

    #[test]
    fn session_lives_until_deleted() {
        let (pool, user_id) = pool_with_user();
        let token = create_session(&pool, user_id, 1).unwrap();
        assert_eq!(live_sessions(&pool, &token), 1);

        delete_session(&pool, &token).unwrap();
        assert_eq!(live_sessions(&pool, &token), 0);
    }

    #[test]
    fn zero_hour_session_is_already_expired() {
        let (pool, user_id) = pool_with_user();
        let token = create_session(&pool, user_id, 0).unwrap();
        assert_eq!(live_sessions(&pool, &token), 0);
    }
}
