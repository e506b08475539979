//! Feed selection: turns a feed request into a filtered, ordered post (or
//! author) set. Lookups on slugs and usernames fail with `NotFound` here,
//! before anything is paginated.

use async_trait::async_trait;

use crate::blog::domain::{BlogError, Viewer};
use crate::blog::pagination::PageSource;
use crate::blog::repository::{BlogRepository, PostFilter, PostQuery, RepositoryError};
use crate::db::models::{AuthorSummary, Group, Post, User};

/// A lazily evaluated, ordered set of posts.
pub struct PostSet<'a> {
    repo: &'a dyn BlogRepository,
    query: PostQuery,
}

impl<'a> PostSet<'a> {
    pub fn new(repo: &'a dyn BlogRepository, query: PostQuery) -> Self {
        Self { repo, query }
    }
}

#[async_trait]
impl PageSource for PostSet<'_> {
    type Item = Post;

    async fn count(&self) -> Result<u64, RepositoryError> {
        self.repo.count_posts(&self.query).await
    }

    async fn slice(&self, offset: u64, limit: u64) -> Result<Vec<Post>, RepositoryError> {
        self.repo.list_posts(&self.query, limit, offset).await
    }
}

/// Authors matching a search term. A `None` term matches nobody.
pub struct AuthorSet<'a> {
    repo: &'a dyn BlogRepository,
    term: Option<String>,
}

#[async_trait]
impl PageSource for AuthorSet<'_> {
    type Item = AuthorSummary;

    async fn count(&self) -> Result<u64, RepositoryError> {
        match &self.term {
            Some(term) => self.repo.count_authors(term).await,
            None => Ok(0),
        }
    }

    async fn slice(&self, offset: u64, limit: u64) -> Result<Vec<AuthorSummary>, RepositoryError> {
        match &self.term {
            Some(term) => self.repo.list_authors(term, limit, offset).await,
            None => Ok(Vec::new()),
        }
    }
}

pub struct GroupFeed<'a> {
    pub group: Group,
    pub posts: PostSet<'a>,
}

pub struct AuthorFeed<'a> {
    pub author: User,
    pub posts: PostSet<'a>,
    pub post_count: u64,
}

pub fn feed_by_recency(repo: &dyn BlogRepository) -> PostSet<'_> {
    PostSet::new(repo, PostQuery::newest(PostFilter::All))
}

pub async fn feed_by_group<'a>(
    repo: &'a dyn BlogRepository,
    slug: &str,
) -> Result<GroupFeed<'a>, BlogError> {
    let group = repo
        .group_by_slug(slug)
        .await?
        .ok_or_else(|| BlogError::NotFound(format!("group '{}'", slug)))?;

    let posts = PostSet::new(repo, PostQuery::newest(PostFilter::Group(group.id)));
    Ok(GroupFeed { group, posts })
}

pub async fn feed_by_author<'a>(
    repo: &'a dyn BlogRepository,
    username: &str,
) -> Result<AuthorFeed<'a>, BlogError> {
    let author = find_author(repo, username).await?;

    let posts = PostSet::new(repo, PostQuery::newest(PostFilter::Author(author.id)));
    let post_count = posts.count().await?;

    Ok(AuthorFeed {
        author,
        posts,
        post_count,
    })
}

pub fn feed_by_following<'a>(
    repo: &'a dyn BlogRepository,
    viewer: &Viewer,
) -> Result<PostSet<'a>, BlogError> {
    let user = viewer.require_user()?;
    Ok(PostSet::new(
        repo,
        PostQuery::newest(PostFilter::FollowedBy(user.id)),
    ))
}

pub fn feed_by_liked<'a>(
    repo: &'a dyn BlogRepository,
    viewer: &Viewer,
) -> Result<PostSet<'a>, BlogError> {
    let user = viewer.require_user()?;
    Ok(PostSet::new(
        repo,
        PostQuery::newest(PostFilter::LikedBy(user.id)),
    ))
}

pub fn feed_most_popular(repo: &dyn BlogRepository) -> PostSet<'_> {
    PostSet::new(repo, PostQuery::most_liked(PostFilter::All))
}

/// Posts whose text contains `query`, ignoring case. A blank or missing
/// query matches nothing rather than everything.
pub fn search_posts<'a>(repo: &'a dyn BlogRepository, query: Option<&str>) -> PostSet<'a> {
    let filter = match search_term(query) {
        Some(term) => PostFilter::TextContains(term),
        None => PostFilter::Nothing,
    };
    PostSet::new(repo, PostQuery::newest(filter))
}

/// Users whose username, first name or last name contains `query`.
pub fn search_authors<'a>(repo: &'a dyn BlogRepository, query: Option<&str>) -> AuthorSet<'a> {
    AuthorSet {
        repo,
        term: search_term(query),
    }
}

pub async fn find_author(repo: &dyn BlogRepository, username: &str) -> Result<User, BlogError> {
    repo.user_by_username(username)
        .await?
        .ok_or_else(|| BlogError::NotFound(format!("user '{}'", username)))
}

pub async fn find_post(repo: &dyn BlogRepository, post_id: i64) -> Result<Post, BlogError> {
    repo.post_by_id(post_id)
        .await?
        .ok_or_else(|| BlogError::NotFound(format!("post {}", post_id)))
}

fn search_term(query: Option<&str>) -> Option<String> {
    query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
}
