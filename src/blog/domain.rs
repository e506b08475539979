// Domain types - request data in, typed drafts or errors out. No I/O here.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::blog::repository::RepositoryError;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_SLUG: &str =
    "Enter a valid slug consisting of letters, numbers, underscores or hyphens.";
pub const DUPLICATE_SLUG: &str = "Group with this slug already exists.";

const MAX_TITLE_LEN: usize = 200;
const MAX_SLUG_LEN: usize = 200;

/// The authenticated half of a viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRef {
    pub id: i64,
    pub username: String,
}

/// Whoever is making the request, as told to us by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    User(UserRef),
}

impl Viewer {
    pub fn user(id: i64, username: impl Into<String>) -> Self {
        Self::User(UserRef {
            id,
            username: username.into(),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::User(_))
    }

    pub fn as_user(&self) -> Option<&UserRef> {
        match self {
            Self::User(user) => Some(user),
            Self::Anonymous => None,
        }
    }

    /// The authenticated user, or `Unauthorized`.
    pub fn require_user(&self) -> Result<&UserRef, BlogError> {
        self.as_user().ok_or(BlogError::Unauthorized)
    }

    pub fn is(&self, user_id: i64) -> bool {
        self.as_user().map(|u| u.id == user_id).unwrap_or(false)
    }

    /// Short identity tag for per-viewer cache keys.
    pub fn scope(&self) -> String {
        match self {
            Self::User(user) => format!("u{}", user.id),
            Self::Anonymous => "anon".to_string(),
        }
    }
}

/// Field name -> messages, in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    fn finish<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

#[derive(Debug, Error)]
pub enum BlogError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Only the author may change post {post_id}")]
    Forbidden { post_id: i64 },

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<ValidationErrors> for BlogError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

// --- Forms ---

/// Raw post submission. Also used to echo the form back on errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostForm {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

impl PostForm {
    /// Shape checks only; whether the group exists is decided by the store.
    pub fn validate(&self) -> Result<PostDraft, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let text = self.text.trim().to_string();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }

        let group_id = match non_blank(&self.group) {
            None => None,
            Some(raw) => match raw.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.add("group", INVALID_CHOICE);
                    None
                }
            },
        };

        let image = non_blank(&self.image).map(str::to_string);

        errors.finish(PostDraft {
            text,
            group_id,
            image,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentDraft {
    pub text: String,
}

impl CommentForm {
    pub fn validate(&self) -> Result<CommentDraft, ValidationErrors> {
        let text = self.text.trim().to_string();
        if text.is_empty() {
            return Err(ValidationErrors::single("text", REQUIRED));
        }
        Ok(CommentDraft { text })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDraft {
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl GroupForm {
    pub fn validate(&self) -> Result<GroupDraft, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = self.title.trim().to_string();
        if title.is_empty() {
            errors.add("title", REQUIRED);
        } else if title.chars().count() > MAX_TITLE_LEN {
            errors.add("title", too_long(MAX_TITLE_LEN, title.chars().count()));
        }

        let slug = self.slug.trim().to_string();
        if slug.is_empty() {
            errors.add("slug", REQUIRED);
        } else {
            if !is_valid_slug(&slug) {
                errors.add("slug", INVALID_SLUG);
            }
            if slug.chars().count() > MAX_SLUG_LEN {
                errors.add("slug", too_long(MAX_SLUG_LEN, slug.chars().count()));
            }
        }

        let description = self.description.trim().to_string();
        if description.is_empty() {
            errors.add("description", REQUIRED);
        }

        errors.finish(GroupDraft {
            title,
            slug,
            description,
        })
    }
}

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn too_long(max: usize, actual: usize) -> String {
    format!(
        "Ensure this value has at most {} characters (it has {}).",
        max, actual
    )
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_viewer_is_not_authenticated() {
        let viewer = Viewer::Anonymous;
        assert!(!viewer.is_authenticated());
        assert!(matches!(viewer.require_user(), Err(BlogError::Unauthorized)));
        assert!(!viewer.is(1));
        assert_eq!(viewer.scope(), "anon");
    }

    #[test]
    fn authenticated_viewer_identity() {
        let viewer = Viewer::user(7, "leo");
        assert!(viewer.is_authenticated());
        assert!(viewer.is(7));
        assert!(!viewer.is(8));
        assert_eq!(viewer.require_user().unwrap().username, "leo");
        assert_eq!(viewer.scope(), "u7");
    }

    #[test]
    fn post_form_requires_text() {
        let form = PostForm {
            text: "   ".into(),
            ..Default::default()
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.field("text"), [REQUIRED.to_string()]);
    }

    #[test]
    fn post_form_trims_and_parses_group() {
        let form = PostForm {
            text: "  hello  ".into(),
            group: Some("3".into()),
            image: Some("".into()),
        };
        let draft = form.validate().unwrap();
        assert_eq!(draft.text, "hello");
        assert_eq!(draft.group_id, Some(3));
        assert_eq!(draft.image, None);
    }

    #[test]
    fn post_form_blank_group_means_none() {
        let form = PostForm {
            text: "hello".into(),
            group: Some(" ".into()),
            image: Some("posts/cat.gif".into()),
        };
        let draft = form.validate().unwrap();
        assert_eq!(draft.group_id, None);
        assert_eq!(draft.image.as_deref(), Some("posts/cat.gif"));
    }

    #[test]
    fn post_form_rejects_garbage_group() {
        let form = PostForm {
            text: "hello".into(),
            group: Some("books".into()),
            image: None,
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.field("group"), [INVALID_CHOICE.to_string()]);
        assert!(errors.field("text").is_empty());
    }

    #[test]
    fn comment_form_requires_text() {
        assert!(CommentForm { text: "\n".into() }.validate().is_err());
        assert_eq!(
            CommentForm { text: " nice ".into() }.validate().unwrap().text,
            "nice"
        );
    }

    #[test]
    fn group_form_collects_every_error() {
        let form = GroupForm {
            title: "".into(),
            slug: "not a slug".into(),
            description: "".into(),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.field("title"), [REQUIRED.to_string()]);
        assert_eq!(errors.field("slug"), [INVALID_SLUG.to_string()]);
        assert_eq!(errors.field("description"), [REQUIRED.to_string()]);
    }

    #[test]
    fn group_form_limits_slug_length() {
        let form = GroupForm {
            title: "Cats".into(),
            slug: "c".repeat(201),
            description: "All about cats".into(),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.field("slug").len(), 1);
        assert!(errors.field("slug")[0].contains("at most 200"));
    }

    #[test]
    fn slug_charset() {
        assert!(is_valid_slug("test-slug_1"));
        assert!(!is_valid_slug("тест"));
        assert!(!is_valid_slug("a/b"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn validation_errors_serialize_as_map() {
        let errors = ValidationErrors::single("text", REQUIRED);
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["text"][0], REQUIRED);
    }
}
