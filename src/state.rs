use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::blog::SqliteBlogRepository;
use crate::cache::PageCache;
use crate::config::Config;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub page_cache: Arc<PageCache>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let page_cache = Arc::new(PageCache::new(
            config.feed.index_cache_ttl(),
            config.feed.index_cache_max_entries,
        ));
        Self {
            db,
            config,
            page_cache,
        }
    }

    pub fn repo(&self) -> SqliteBlogRepository {
        SqliteBlogRepository::new(self.db.clone())
    }
}
