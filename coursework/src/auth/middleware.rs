//! Request authentication and the route policy.
//!
//! Two layers, applied outermost first:
//!
//! 1. [`resolve_session`] reads the session cookie, validates it, inserts the
//!    [`RequestContext`] and refreshes (or clears) the cookie on the way out.
//! 2. [`enforce_route_policy`] lets public paths through and turns every
//!    other anonymous request into a login redirect (pages) or a 401 (API).

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument, trace, warn};

use crate::{
    AppState,
    auth::{
        current_user::RequestContext,
        session::{clear_session_cookie, session_cookie},
    },
    config::RoutesConfig,
    errors::Error,
};

/// Value of the named cookie from the request's `Cookie` headers.
///
/// Headers that are not valid visible ASCII are skipped. An empty value is
/// treated as no cookie.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(cookie_name, _)| *cookie_name == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// True if the response already sets the named cookie.
fn sets_cookie(response: &Response, name: &str) -> bool {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.split_once('=').is_some_and(|(cookie_name, _)| cookie_name.trim() == name))
}

/// A `302 Found` response.
pub fn redirect_found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(e) => Error::Internal {
            operation: format!("build redirect location: {e}"),
        }
        .into_response(),
    }
}

/// Deny-by-default route policy over the configured prefixes.
#[derive(Debug, Clone, Copy)]
pub struct RoutePolicy<'a> {
    routes: &'a RoutesConfig,
}

impl<'a> RoutePolicy<'a> {
    pub fn new(routes: &'a RoutesConfig) -> Self {
        Self { routes }
    }

    /// `/` and anything under a public prefix is reachable without a session.
    pub fn is_public(&self, path: &str) -> bool {
        path == "/" || self.routes.public_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// API paths get status codes rather than redirects.
    pub fn is_api(&self, path: &str) -> bool {
        self.routes.api_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Where to send an anonymous request for `original_path`.
    pub fn login_redirect(&self, original_path: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("redirect", original_path)
            .finish();
        format!("{}?{query}", self.routes.login_path)
    }
}

/// Resolve the session cookie into a [`RequestContext`].
///
/// A live session has its cookie re-sent with the (possibly renewed) expiry; a
/// dead one has its cookie cleared. Handlers that set the session cookie
/// themselves (login, logout) take precedence.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn resolve_session(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, Error> {
    let session_config = &state.config.auth.session;
    let token = read_cookie(request.headers(), &session_config.cookie_name).map(str::to_owned);

    let (context, cookie) = match token {
        None => {
            trace!("No session cookie");
            (RequestContext::anonymous(), None)
        }
        Some(token) => match state.sessions.validate_token(&token).await? {
            Some(found) => {
                debug!(session_id = %found.session.id.abbrev(), "Resolved session");
                let cookie = session_cookie(session_config, &token, found.session.expires_at);
                (RequestContext::authenticated(found), Some(cookie))
            }
            None => {
                debug!("Session cookie did not resolve, clearing");
                (RequestContext::anonymous(), Some(clear_session_cookie(session_config)))
            }
        },
    };

    request.extensions_mut().insert(context);
    let mut response = next.run(request).await;

    if let Some(cookie) = cookie
        && !sets_cookie(&response, &session_config.cookie_name)
    {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "Could not encode session cookie"),
        }
    }

    Ok(response)
}

/// Reject anonymous requests to non-public paths.
pub async fn enforce_route_policy(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let policy = RoutePolicy::new(&state.config.auth.routes);
    let path = request.uri().path();

    if policy.is_public(path) {
        return next.run(request).await;
    }

    let authenticated = request
        .extensions()
        .get::<RequestContext>()
        .is_some_and(RequestContext::is_authenticated);
    if authenticated {
        return next.run(request).await;
    }

    if policy.is_api(path) {
        debug!(path, "Anonymous API request rejected");
        Error::Unauthenticated.into_response()
    } else {
        debug!(path, "Anonymous page request redirected to login");
        redirect_found(&policy.login_redirect(path))
    }
}
