//! Admin user management.
//!
//! Every handler checks its permission against the request's snapshot
//! before touching the store, so a caller without the permission gets 403
//! whether or not the target user exists.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        pagination::Pagination,
        users::{PermissionsUpdate, UserCreate, UserCreatedResponse, UserResponse, UserUpdate},
    },
    auth::{
        accounts::{self, AccountPolicy, NewAccount},
        current_user::CurrentUser,
    },
    db::models::users::UserFilter,
    errors::Error,
    types::{Permission, PermissionSet, UserId},
};

/// `GET /admin/api/users`
#[tracing::instrument(skip_all, err)]
pub async fn list_users(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<UserResponse>>, Error> {
    current.require_permission(Permission::UserView)?;

    let filter = UserFilter::from(&pagination);
    let store = state.store.clone();
    let users = state
        .user_list_cache
        .get_or_load(filter, || async move { store.list_users(&filter).await })
        .await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// `POST /admin/api/users`
#[tracing::instrument(skip_all, err)]
pub async fn create_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(create): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserCreatedResponse>), Error> {
    current.require_permission(Permission::UserCreate)?;

    let permissions =
        PermissionSet::try_from_tags(&create.permissions).map_err(|e| Error::validation("permissions", e.to_string()))?;
    let account = NewAccount {
        email: create.email,
        username: create.username,
        password: create.password,
    };
    let id = accounts::create_account(
        state.store.as_ref(),
        &AccountPolicy::admin(&state.config.auth.accounts),
        account,
        permissions,
    )
    .await?
    .into_result()?;
    state.user_list_cache.invalidate_all();

    Ok((StatusCode::CREATED, Json(UserCreatedResponse { id })))
}

/// `GET /admin/api/users/{user_id}`
#[tracing::instrument(skip_all, fields(user_id = %user_id), err)]
pub async fn get_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<UserResponse>, Error> {
    current.require_permission(Permission::UserView)?;

    match state.store.find_user_by_id(user_id).await? {
        Some(user) => Ok(Json(user.into())),
        None => Err(Error::NotFound {
            resource: "User".to_string(),
            id: user_id.to_string(),
        }),
    }
}

/// `PATCH /admin/api/users/{user_id}`
#[tracing::instrument(skip_all, fields(user_id = %user_id), err)]
pub async fn update_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<UserId>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<UserResponse>, Error> {
    current.require_permission(Permission::UserEdit)?;

    let user = accounts::update_user(
        state.store.as_ref(),
        &AccountPolicy::admin(&state.config.auth.accounts),
        user_id,
        accounts::UserUpdate {
            email: update.email,
            username: update.username,
        },
    )
    .await?;
    state.user_list_cache.invalidate_all();

    Ok(Json(user.into()))
}

/// `PUT /admin/api/users/{user_id}/permissions`
#[tracing::instrument(skip_all, fields(user_id = %user_id), err)]
pub async fn update_permissions(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<UserId>,
    Json(update): Json<PermissionsUpdate>,
) -> Result<Json<UserResponse>, Error> {
    current.require_permission(Permission::UserEdit)?;

    let user = accounts::update_permissions(state.store.as_ref(), user_id, &update.permissions).await?;
    state.user_list_cache.invalidate_all();

    Ok(Json(user.into()))
}

/// `DELETE /admin/api/users/{user_id}`
#[tracing::instrument(skip_all, fields(user_id = %user_id), err)]
pub async fn delete_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<UserId>,
) -> Result<StatusCode, Error> {
    current.require_permission(Permission::UserDelete)?;

    accounts::delete_user(state.store.as_ref(), user_id).await?;
    state.user_list_cache.invalidate_all();

    Ok(StatusCode::NO_CONTENT)
}

/// `GET /admin/api/permissions`
pub async fn list_permissions(current: CurrentUser) -> Result<Json<Vec<Permission>>, Error> {
    current.require_permission(Permission::UserView)?;
    Ok(Json(Permission::ALL.to_vec()))
}
