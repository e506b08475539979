use async_trait::async_trait;
use serde::Serialize;

use crate::blog::repository::RepositoryError;

pub const PAGE_SIZE: u64 = 10;

/// An ordered sequence that can be counted and sliced without loading all of it.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    async fn count(&self) -> Result<u64, RepositoryError>;

    async fn slice(&self, offset: u64, limit: u64) -> Result<Vec<Self::Item>, RepositoryError>;
}

/// Already-materialised sequences.
#[async_trait]
impl<T: Clone + Send + Sync> PageSource for Vec<T> {
    type Item = T;

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.len() as u64)
    }

    async fn slice(&self, offset: u64, limit: u64) -> Result<Vec<T>, RepositoryError> {
        Ok(self
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

/// The `?page=` the client asked for, and how big pages are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: u64,
    pub per_page: u64,
}

impl PageRequest {
    pub fn new(number: u64, per_page: u64) -> Self {
        Self {
            number: number.max(1),
            per_page: per_page.max(1),
        }
    }

    pub fn first(per_page: u64) -> Self {
        Self::new(1, per_page)
    }

    /// Anything that is not a positive integer means page 1. Integers too
    /// large for `u64` saturate, so they clamp to the last page like any
    /// other page past the end.
    pub fn parse(raw: Option<&str>, per_page: u64) -> Self {
        let number = raw.map(str::trim).and_then(parse_page_number).unwrap_or(1);
        Self::new(number, per_page)
    }
}

fn parse_page_number(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if raw.bytes().all(|b| b == b'0') {
        return None;
    }
    Some(raw.parse::<u64>().unwrap_or(u64::MAX))
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(PAGE_SIZE)
    }
}

/// One window of an ordered sequence plus navigation metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub per_page: u64,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page_number: Option<u64>,
    pub next_page_number: Option<u64>,
}

impl<T> Page<T> {
    fn build(items: Vec<T>, number: u64, num_pages: u64, count: u64, per_page: u64) -> Self {
        let has_previous = number > 1;
        let has_next = number < num_pages;
        Self {
            items,
            number,
            num_pages,
            count,
            per_page,
            has_previous,
            has_next,
            previous_page_number: has_previous.then(|| number - 1),
            next_page_number: has_next.then(|| number + 1),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }
}

/// Number of pages for `count` items. An empty sequence still has one
/// (empty) page so that page 1 is always valid.
pub fn page_count(count: u64, per_page: u64) -> u64 {
    let per_page = per_page.max(1);
    count.div_ceil(per_page).max(1)
}

/// Cut the requested page out of `source`. Pages past the end clamp to the
/// last page.
pub async fn paginate<S>(source: &S, request: PageRequest) -> Result<Page<S::Item>, RepositoryError>
where
    S: PageSource + ?Sized,
{
    let per_page = request.per_page.max(1);
    let count = source.count().await?;
    let num_pages = page_count(count, per_page);
    let number = request.number.clamp(1, num_pages);

    let items = if count == 0 {
        Vec::new()
    } else {
        source.slice((number - 1) * per_page, per_page).await?
    };

    Ok(Page::build(items, number, num_pages, count, per_page))
}
