//! Login, registration, logout and profile handlers.

use axum::{
    Json,
    extract::{Query, State},
    http::header,
    response::{AppendHeaders, IntoResponse, Response},
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    AppState,
    api::models::{
        auth::{LoginPageResponse, LoginRequest, RedirectQuery, RegisterRequest},
        users::UserResponse,
    },
    auth::{
        accounts::{self, AccountPolicy, NewAccount},
        current_user::{CurrentUser, RequestContext},
        middleware::redirect_found,
        session::{clear_session_cookie, generate_token, session_cookie},
    },
    errors::Error,
    types::{PermissionSet, UserId, abbrev_uuid},
};

/// Create a session for `user_id`, set its cookie and redirect to `target`.
async fn start_session(state: &AppState, user_id: UserId, target: &str) -> Result<Response, Error> {
    let token = generate_token();
    let session = state.sessions.create_session(&token, user_id).await?;
    let cookie = session_cookie(&state.config.auth.session, &token, session.expires_at);

    Ok((AppendHeaders([(header::SET_COOKIE, cookie)]), redirect_found(target)).into_response())
}

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub authenticated: bool,
}

/// `GET /`
pub async fn home(context: RequestContext) -> Json<HomeResponse> {
    Json(HomeResponse {
        authenticated: context.is_authenticated(),
    })
}

/// `GET /login`: signed-in visitors are sent on; everyone else gets the sanitised target.
pub async fn login_page(context: RequestContext, Query(query): Query<RedirectQuery>) -> Response {
    let target = query.target();
    if context.is_authenticated() {
        redirect_found(&target)
    } else {
        Json(LoginPageResponse { redirect: target }).into_response()
    }
}

/// `POST /login`
#[tracing::instrument(skip_all, err)]
pub async fn login(
    State(state): State<AppState>,
    Query(query): Query<RedirectQuery>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, Error> {
    let user = accounts::login(state.store.as_ref(), &request.email, &request.password).await?;
    info!(user_id = %abbrev_uuid(&user.id), "User logged in");

    start_session(&state, user.id, &query.target()).await
}

/// `POST /register`
#[tracing::instrument(skip_all, err)]
pub async fn register(
    State(state): State<AppState>,
    Query(query): Query<RedirectQuery>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, Error> {
    let accounts_config = &state.config.auth.accounts;
    if !accounts_config.allow_registration {
        return Err(Error::validation("registration", "Registration is disabled"));
    }

    let account = NewAccount {
        email: request.email,
        username: request.username,
        password: request.password,
    };
    let user_id = accounts::create_account(
        state.store.as_ref(),
        &AccountPolicy::registration(accounts_config),
        account,
        PermissionSet::empty(),
    )
    .await?
    .into_result()?;
    state.user_list_cache.invalidate_all();

    start_session(&state, user_id, &query.target()).await
}

/// `POST /api/auth/logout`
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, current: CurrentUser) -> Response {
    if !state.sessions.invalidate_session(&current.session.id).await {
        warn!(user_id = %abbrev_uuid(&current.user.id), "Session could not be invalidated; clearing cookie anyway");
    }
    let cookie = clear_session_cookie(&state.config.auth.session);

    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        redirect_found(&state.config.auth.routes.login_path),
    )
        .into_response()
}

/// `GET /api/profile`
pub async fn profile(current: CurrentUser) -> Json<UserResponse> {
    Json(current.user.into())
}
