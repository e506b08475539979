//! Per-endpoint composition: pick the post set, paginate it, decorate the
//! page for the viewer, and hand back the context the presentation layer
//! renders.

use serde::{Deserialize, Serialize};

use crate::blog::annotate::{annotate_like_state, compute_follow_state};
use crate::blog::domain::{BlogError, Viewer};
use crate::blog::pagination::{paginate, Page, PageRequest};
use crate::blog::query::{self, find_post, PostSet};
use crate::blog::repository::BlogRepository;
use crate::db::models::{AuthorSummary, Comment, Group, Post, User};

#[derive(Debug, Serialize)]
pub struct FeedPage {
    pub page_obj: Page<Post>,
}

#[derive(Debug, Serialize)]
pub struct GroupPage {
    pub group: Group,
    pub page_obj: Page<Post>,
}

#[derive(Debug, Serialize)]
pub struct ProfilePage {
    pub author: User,
    pub page_obj: Page<Post>,
    pub posts_count: u64,
    pub following: bool,
}

#[derive(Debug, Serialize)]
pub struct PostDetail {
    pub post: Post,
    pub author: User,
    pub posts_count: u64,
    pub comments: Vec<Comment>,
    pub likes: i64,
    pub now_liker: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    #[default]
    Posts,
    Authors,
}

impl SearchKind {
    /// Unknown or missing values search posts.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("authors") => Self::Authors,
            _ => Self::Posts,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "page_obj", rename_all = "lowercase")]
pub enum SearchResults {
    Posts(Page<Post>),
    Authors(Page<AuthorSummary>),
}

#[derive(Debug, Serialize)]
pub struct SearchPage {
    pub query: String,
    pub results: SearchResults,
}

/// Paginate a post set and mark what the viewer has liked.
async fn decorated_page(
    repo: &dyn BlogRepository,
    posts: &PostSet<'_>,
    viewer: &Viewer,
    page: PageRequest,
) -> Result<Page<Post>, BlogError> {
    let mut page = paginate(posts, page).await?;
    annotate_like_state(repo, &mut page, viewer).await?;
    Ok(page)
}

pub async fn index(
    repo: &dyn BlogRepository,
    viewer: &Viewer,
    page: PageRequest,
) -> Result<FeedPage, BlogError> {
    let posts = query::feed_by_recency(repo);
    let page_obj = decorated_page(repo, &posts, viewer, page).await?;
    Ok(FeedPage { page_obj })
}

pub async fn group_posts(
    repo: &dyn BlogRepository,
    viewer: &Viewer,
    slug: &str,
    page: PageRequest,
) -> Result<GroupPage, BlogError> {
    let feed = query::feed_by_group(repo, slug).await?;
    let page_obj = decorated_page(repo, &feed.posts, viewer, page).await?;
    Ok(GroupPage {
        group: feed.group,
        page_obj,
    })
}

pub async fn profile(
    repo: &dyn BlogRepository,
    viewer: &Viewer,
    username: &str,
    page: PageRequest,
) -> Result<ProfilePage, BlogError> {
    let feed = query::feed_by_author(repo, username).await?;
    let page_obj = decorated_page(repo, &feed.posts, viewer, page).await?;
    let following = compute_follow_state(repo, viewer, &feed.author).await?;

    Ok(ProfilePage {
        author: feed.author,
        page_obj,
        posts_count: feed.post_count,
        following,
    })
}

pub async fn post_detail(
    repo: &dyn BlogRepository,
    viewer: &Viewer,
    post_id: i64,
) -> Result<PostDetail, BlogError> {
    let mut post = find_post(repo, post_id).await?;

    // The author row is looked up by name so the profile link and counts agree
    let author_feed = query::feed_by_author(repo, &post.author_username).await?;
    let comments = repo.comments_for_post(post_id).await?;

    let now_liker = match viewer.as_user() {
        Some(user) => repo
            .liked_post_ids(user.id, &[post_id])
            .await?
            .contains(&post_id),
        None => false,
    };
    post.liked_by_viewer = now_liker;

    Ok(PostDetail {
        likes: post.like_count,
        post,
        author: author_feed.author,
        posts_count: author_feed.post_count,
        comments,
        now_liker,
    })
}

pub async fn follow_index(
    repo: &dyn BlogRepository,
    viewer: &Viewer,
    page: PageRequest,
) -> Result<FeedPage, BlogError> {
    let posts = query::feed_by_following(repo, viewer)?;
    let page_obj = decorated_page(repo, &posts, viewer, page).await?;
    Ok(FeedPage { page_obj })
}

pub async fn most_popular_index(
    repo: &dyn BlogRepository,
    viewer: &Viewer,
    page: PageRequest,
) -> Result<FeedPage, BlogError> {
    let posts = query::feed_most_popular(repo);
    let page_obj = decorated_page(repo, &posts, viewer, page).await?;
    Ok(FeedPage { page_obj })
}

pub async fn like_index(
    repo: &dyn BlogRepository,
    viewer: &Viewer,
    page: PageRequest,
) -> Result<FeedPage, BlogError> {
    let posts = query::feed_by_liked(repo, viewer)?;
    let page_obj = decorated_page(repo, &posts, viewer, page).await?;
    Ok(FeedPage { page_obj })
}

pub async fn search(
    repo: &dyn BlogRepository,
    viewer: &Viewer,
    q: Option<&str>,
    kind: SearchKind,
    page: PageRequest,
) -> Result<SearchPage, BlogError> {
    let results = match kind {
        SearchKind::Posts => {
            let posts = query::search_posts(repo, q);
            SearchResults::Posts(decorated_page(repo, &posts, viewer, page).await?)
        }
        SearchKind::Authors => {
            let authors = query::search_authors(repo, q);
            SearchResults::Authors(paginate(&authors, page).await?)
        }
    };

    Ok(SearchPage {
        query: q.unwrap_or_default().to_string(),
        results,
    })
}
