//! Account creation, credential checks and user maintenance.
//!
//! Registration and admin user creation both go through [`create_account`];
//! they differ only in the [`AccountPolicy`] they pass. Every input bound is
//! checked before anything is hashed or stored.

use tracing::{info, instrument, warn};

use crate::{
    auth::{
        password::{self, HashedPassword},
        session::generate_token,
    },
    config::AccountsConfig,
    db::{
        errors::DbError,
        handlers::CredentialStore,
        models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
    errors::Error,
    types::{PermissionSet, UserId, abbrev_uuid},
};

/// Form-level bound on login email length.
pub const LOGIN_MAX_EMAIL_LENGTH: usize = 320;
/// Form-level bound on login password length.
pub const LOGIN_MAX_PASSWORD_LENGTH: usize = 640;

/// Length limits applied to account fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountPolicy {
    pub max_email_length: usize,
    pub max_username_length: usize,
}

impl AccountPolicy {
    /// Limits for self-service registration.
    pub fn registration(config: &AccountsConfig) -> Self {
        Self {
            max_email_length: config.registration_max_email_length,
            max_username_length: config.max_username_length,
        }
    }

    /// Limits for accounts created or edited by an administrator.
    pub fn admin(config: &AccountsConfig) -> Self {
        Self {
            max_email_length: config.admin_max_email_length,
            max_username_length: config.max_username_length,
        }
    }

    pub fn validate_email(&self, email: &str) -> Result<(), Error> {
        if email.is_empty() {
            return Err(Error::validation("email", "Email is required"));
        }
        if email.chars().count() > self.max_email_length {
            return Err(Error::validation(
                "email",
                format!("Email must be at most {} characters", self.max_email_length),
            ));
        }
        if !email.contains('@') {
            return Err(Error::validation("email", "Email must contain an @"));
        }
        Ok(())
    }

    pub fn validate_username(&self, username: &str) -> Result<(), Error> {
        if username.is_empty() {
            return Err(Error::validation("username", "Username is required"));
        }
        if username.chars().count() > self.max_username_length {
            return Err(Error::validation(
                "username",
                format!("Username must be at most {} characters", self.max_username_length),
            ));
        }
        Ok(())
    }
}

/// Input to [`create_account`].
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Result of [`create_account`]. Conflicts are outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateAccountOutcome {
    Created(UserId),
    EmailAlreadyExists,
    UsernameAlreadyExists,
}

impl CreateAccountOutcome {
    /// Turn a conflict into the matching [`Error`].
    pub fn into_result(self) -> Result<UserId, Error> {
        match self {
            CreateAccountOutcome::Created(id) => Ok(id),
            CreateAccountOutcome::EmailAlreadyExists => Err(Error::EmailAlreadyExists),
            CreateAccountOutcome::UsernameAlreadyExists => Err(Error::UsernameAlreadyExists),
        }
    }
}

/// Map a store-level uniqueness race onto the conflict it represents.
fn conflict_from(err: DbError) -> Result<CreateAccountOutcome, Error> {
    if err.is_unique_violation_on("email") {
        Ok(CreateAccountOutcome::EmailAlreadyExists)
    } else if err.is_unique_violation_on("username") {
        Ok(CreateAccountOutcome::UsernameAlreadyExists)
    } else {
        Err(err.into())
    }
}

/// Validate, check uniqueness (email first, then username), hash and store a new account.
#[instrument(skip_all, fields(username = %account.username), err)]
pub async fn create_account(
    store: &dyn CredentialStore,
    policy: &AccountPolicy,
    account: NewAccount,
    permissions: PermissionSet,
) -> Result<CreateAccountOutcome, Error> {
    policy.validate_email(&account.email)?;
    policy.validate_username(&account.username)?;
    password::validate_password_length(&account.password)?;

    if store.find_user_by_email(&account.email).await?.is_some() {
        return Ok(CreateAccountOutcome::EmailAlreadyExists);
    }
    if store.find_user_by_username(&account.username).await?.is_some() {
        return Ok(CreateAccountOutcome::UsernameAlreadyExists);
    }

    let password_hash = password::hash_password_async(account.password).await?;
    let request = UserCreateDBRequest {
        email: account.email,
        username: account.username,
        password_hash,
        permissions,
    };

    match store.insert_user(&request).await {
        Ok(user) => {
            info!(user_id = %abbrev_uuid(&user.id), "Created account");
            Ok(CreateAccountOutcome::Created(user.id))
        }
        Err(e) => conflict_from(e),
    }
}

/// Check an email/password pair. Unknown email and wrong password are the same error.
#[instrument(skip_all, err)]
pub async fn login(store: &dyn CredentialStore, email: &str, password: &str) -> Result<UserDBResponse, Error> {
    if email.chars().count() > LOGIN_MAX_EMAIL_LENGTH {
        return Err(Error::validation("email", "Email is too long"));
    }
    if password.chars().count() >= LOGIN_MAX_PASSWORD_LENGTH {
        return Err(Error::validation("password", "Password is too long"));
    }

    let Some(credentials) = store.find_credentials_by_email(email).await? else {
        return Err(Error::WrongCredentials);
    };

    if !password::verify_password_async(credentials.password_hash, password.to_string()).await? {
        return Err(Error::WrongCredentials);
    }
    Ok(credentials.user)
}

/// Requested changes to a user's identity fields.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub username: Option<String>,
}

/// Update email and/or username. Unchanged values are not re-checked; a changed
/// email is checked for conflicts before a changed username.
#[instrument(skip(store, policy, update), fields(user_id = %abbrev_uuid(&id)), err)]
pub async fn update_user(
    store: &dyn CredentialStore,
    policy: &AccountPolicy,
    id: UserId,
    update: UserUpdate,
) -> Result<UserDBResponse, Error> {
    let existing = store.find_user_by_id(id).await?.ok_or_else(|| user_not_found(id))?;

    let email = update.email.filter(|e| *e != existing.email);
    let username = update.username.filter(|u| *u != existing.username);

    if let Some(email) = &email {
        policy.validate_email(email)?;
    }
    if let Some(username) = &username {
        policy.validate_username(username)?;
    }
    if let Some(email) = &email
        && store.find_user_by_email(email).await?.is_some()
    {
        return Err(Error::EmailAlreadyExists);
    }
    if let Some(username) = &username
        && store.find_user_by_username(username).await?.is_some()
    {
        return Err(Error::UsernameAlreadyExists);
    }

    if email.is_none() && username.is_none() {
        return Ok(existing);
    }

    let request = UserUpdateDBRequest {
        email,
        username,
        ..Default::default()
    };
    store.update_user(id, &request).await.map_err(|e| match e {
        DbError::NotFound => user_not_found(id),
        e if e.is_unique_violation_on("email") => Error::EmailAlreadyExists,
        e if e.is_unique_violation_on("username") => Error::UsernameAlreadyExists,
        e => e.into(),
    })
}

/// Replace a user's permissions. Every tag must belong to the known enumeration.
#[instrument(skip(store, tags), fields(user_id = %abbrev_uuid(&id)), err)]
pub async fn update_permissions(store: &dyn CredentialStore, id: UserId, tags: &[String]) -> Result<UserDBResponse, Error> {
    let permissions = PermissionSet::try_from_tags(tags).map_err(|e| Error::validation("permissions", e.to_string()))?;

    let request = UserUpdateDBRequest {
        permissions: Some(permissions),
        ..Default::default()
    };
    store.update_user(id, &request).await.map_err(|e| match e {
        DbError::NotFound => user_not_found(id),
        e => e.into(),
    })
}

/// Delete a user together with their sessions and submissions.
#[instrument(skip(store), fields(user_id = %abbrev_uuid(&id)), err)]
pub async fn delete_user(store: &dyn CredentialStore, id: UserId) -> Result<(), Error> {
    if store.delete_user(id).await? {
        info!("Deleted user");
        Ok(())
    } else {
        Err(user_not_found(id))
    }
}

/// Make sure the configured administrator exists and holds every permission.
///
/// With a password configured, a stored hash that no longer matches it is
/// replaced and the admin's sessions are revoked. Without one, a new admin
/// gets an unguessable password and cannot log in until one is set.
#[instrument(skip(store, password), err)]
pub async fn ensure_initial_admin(store: &dyn CredentialStore, email: &str, password: Option<&str>) -> Result<UserDBResponse, Error> {
    match store.find_credentials_by_email(email).await? {
        None => {
            let password_hash = match password {
                Some(p) => password::hash_password_async(p.to_string()).await?,
                None => {
                    warn!("No admin password configured; admin account will not be able to log in");
                    password::hash_password_async(generate_token()).await?
                }
            };
            let user = store
                .insert_user(&UserCreateDBRequest {
                    email: email.to_string(),
                    username: email.to_string(),
                    password_hash,
                    permissions: PermissionSet::all(),
                })
                .await?;
            info!(user_id = %abbrev_uuid(&user.id), "Created initial admin user");
            Ok(user)
        }
        Some(credentials) => {
            let mut request = UserUpdateDBRequest::default();
            if credentials.user.permissions != PermissionSet::all() {
                request.permissions = Some(PermissionSet::all());
            }
            let mut rotated = false;
            if let Some(p) = password
                && !password_matches(&credentials.password_hash, p).await
            {
                request.password_hash = Some(password::hash_password_async(p.to_string()).await?);
                rotated = true;
            }

            if request.permissions.is_none() && request.password_hash.is_none() {
                return Ok(credentials.user);
            }

            let user = store.update_user(credentials.user.id, &request).await?;
            if rotated {
                let revoked = store.delete_sessions_by_user(user.id).await?;
                info!(revoked, "Admin password changed; revoked existing sessions");
            }
            Ok(user)
        }
    }
}

/// A corrupt stored hash counts as a mismatch so it gets replaced.
async fn password_matches(hash: &HashedPassword, password: &str) -> bool {
    password::verify_password_async(hash.clone(), password.to_string())
        .await
        .unwrap_or(false)
}

fn user_not_found(id: UserId) -> Error {
    Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    }
}
