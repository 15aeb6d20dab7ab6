//! Login, registration and logout payloads.

use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// `?redirect=` on the login and registration routes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedirectQuery {
    pub redirect: Option<String>,
}

impl RedirectQuery {
    /// The requested target if it is a same-site absolute path, otherwise `/`.
    pub fn target(&self) -> String {
        self.redirect
            .as_deref()
            .filter(|target| is_local_path(target))
            .unwrap_or("/")
            .to_string()
    }
}

/// Only `/...` paths are honoured. Control characters are refused outright
/// since browsers drop them before resolving, which can turn `/\t/host` into
/// `//host`. What remains must resolve against a placeholder origin without
/// leaving it.
fn is_local_path(target: &str) -> bool {
    if !target.starts_with('/') || target.starts_with("//") || target.contains('\\') || target.chars().any(char::is_control) {
        return false;
    }
    let Ok(base) = Url::parse("http://localhost/") else {
        return false;
    };
    base.join(target).is_ok_and(|resolved| resolved.origin() == base.origin())
}

/// Body of `GET /login` for an anonymous visitor.
#[derive(Debug, Clone, Serialize)]
pub struct LoginPageResponse {
    pub redirect: String,
}
