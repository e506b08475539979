use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use rusqlite::{params, OptionalExtension};

use crate::blog::Viewer;
use crate::error::AppError;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

impl CurrentUser {
    pub fn viewer(&self) -> Viewer {
        Viewer::user(self.id, self.username.clone())
    }
}

/// Extractor that requires authentication.
/// Anonymous requests are redirected to the login page with `next` set to
/// the requested path.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match lookup_session(parts, state)? {
            Some(user) => Ok(user),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                Err(AppError::login_required(&state.config.auth.login_url, next))
            }
        }
    }
}

/// Optional user extractor: anonymous instead of a redirect when not
/// authenticated.
pub struct MaybeUser(pub Option<CurrentUser>);

impl MaybeUser {
    pub fn viewer(&self) -> Viewer {
        match &self.0 {
            Some(user) => user.viewer(),
            None => Viewer::Anonymous,
        }
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(lookup_session(parts, state)?))
    }
}

/// Resolve the session cookie to a user. Unknown or expired tokens are
/// treated as no session at all.
fn lookup_session(parts: &Parts, state: &AppState) -> Result<Option<CurrentUser>, AppError> {
    let Some(token) = extract_session_token(parts, &state.config.auth.cookie_name) else {
        return Ok(None);
    };

    let conn = state.db.get()?;
    let user = conn
        .query_row(
            "SELECT u.id, u.username FROM sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.token = ?1 AND s.expires_at > datetime('now')",
            params![token],
            |row| {
                Ok(CurrentUser {
                    id: row.get(0)?,
                    username: row.get(1)?,
                })
            },
        )
        .optional()?;

    Ok(user)
}

fn extract_session_token<'a>(parts: &'a Parts, cookie_name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == cookie_name {
                Some(val)
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_cookie(cookie: &str) -> Parts {
        let (parts, _) = Request::builder()
            .uri("/follow/")
            .header(header::COOKIE, cookie)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn finds_named_cookie_among_others() {
        let parts = parts_with_cookie("theme=dark; yatube_session=abc123; lang=ru");
        assert_eq!(
            extract_session_token(&parts, "yatube_session"),
            Some("abc123")
        );
        assert_eq!(extract_session_token(&parts, "other"), None);
    }

    #[test]
    fn missing_cookie_header_is_none() {
        let (parts, _) = Request::builder()
            .uri("/")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(extract_session_token(&parts, "yatube_session"), None);
    }

    #[test]
    fn viewer_from_maybe_user() {
        assert_eq!(MaybeUser(None).viewer(), Viewer::Anonymous);
        let user = CurrentUser {
            id: 3,
            username: "leo".into(),
        };
        assert_eq!(MaybeUser(Some(user)).viewer(), Viewer::user(3, "leo"));
    }
}
