use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    actions::memberships::is_subscribed,
    constants::{EMAIL_MAX_LENGTH, USER_NAME_MAX_LENGTH},
    cryptography::{hash_password, verify_password},
    error::Error,
    images::ImageStore,
    jwt::{SessionData, SessionKeys},
    pagination::{PageContext, PageRequest},
    schema::{Id, NewUser, User},
    store::Store,
};

#[derive(Deserialize, Debug, Clone)]
pub struct RegisterForm {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PasswordForm {
    pub new_password: String,
    pub current_password: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DeleteAccountForm {
    pub current_password: String,
}

/// Returned once on registration.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct RegisteredUser {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// A user as seen by the caller.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub email: String,
    pub id: Id,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[\w.@+-]+$").expect("valid username pattern"))
}

fn validate_name(field: &str, value: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::validation(field, "This field may not be blank"));
    }
    if value.chars().count() > USER_NAME_MAX_LENGTH {
        return Err(Error::validation(
            field,
            format!("Ensure this field has no more than {USER_NAME_MAX_LENGTH} characters"),
        ));
    }
    Ok(())
}

fn validate_registration(form: &RegisterForm) -> Result<(), Error> {
    let email = form.email.trim();
    if email.is_empty() {
        return Err(Error::validation("email", "This field may not be blank"));
    }
    if email.chars().count() > EMAIL_MAX_LENGTH {
        return Err(Error::validation(
            "email",
            format!("Ensure this field has no more than {EMAIL_MAX_LENGTH} characters"),
        ));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
        _ => return Err(Error::validation("email", "Enter a valid email address")),
    }

    validate_name("username", &form.username)?;
    if !username_pattern().is_match(&form.username) {
        return Err(Error::validation(
            "username",
            "Enter a valid username; letters, digits and @/./+/-/_ only",
        ));
    }
    validate_name("first_name", &form.first_name)?;
    validate_name("last_name", &form.last_name)?;

    if form.password.is_empty() {
        return Err(Error::validation("password", "This field may not be blank"));
    }
    Ok(())
}

/// Creates an account; the email and the username must both be unused.
pub async fn register_user(form: RegisterForm, store: &dyn Store) -> Result<RegisteredUser, Error> {
    validate_registration(&form)?;

    let user = store
        .create_user(NewUser {
            email: form.email.trim().to_string(),
            username: form.username,
            first_name: form.first_name,
            last_name: form.last_name,
            password: hash_password(&form.password)?,
        })
        .await
        .map_err(|e| match e {
            Error::Conflict(_) => {
                Error::conflict("A user with this email or username already exists")
            }
            e => e,
        })?;
    log::info!("> Registered user {} ({})", user.username, user.id);

    Ok(RegisteredUser {
        email: user.email,
        id: user.id,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
    })
}

/// Exchanges credentials for a session token.
pub async fn login_user(
    email: &str,
    password: &str,
    keys: &SessionKeys,
    store: &dyn Store,
) -> Result<String, Error> {
    let invalid = || Error::unauthorized("Invalid credentials");

    let user = store
        .find_user_by_email(email.trim())
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(password, &user.password)? {
        log::debug!("> Failed login for user {}", user.id);
        return Err(invalid());
    }

    keys.generate_session(&user)
}

pub async fn get_user_by_id(id: Id, store: &dyn Store) -> Result<User, Error> {
    store
        .get_user(id)
        .await?
        .ok_or_else(|| Error::not_found("User does not exist"))
}

/// Resolves the session back to its account; tokens of deleted accounts fail.
pub async fn current_user(session: &SessionData, store: &dyn Store) -> Result<User, Error> {
    store
        .get_user(session.user_id)
        .await?
        .ok_or_else(|| Error::unauthorized("Invalid session; User no longer exists"))
}

pub async fn user_profile(
    user: User,
    viewer: Option<&SessionData>,
    store: &dyn Store,
) -> Result<UserProfile, Error> {
    let is_subscribed = is_subscribed(viewer, user.id, store).await?;

    Ok(UserProfile {
        email: user.email,
        id: user.id,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        is_subscribed,
    })
}

pub async fn list_profiles(
    viewer: Option<&SessionData>,
    request: PageRequest,
    path: &str,
    store: &dyn Store,
) -> Result<PageContext<UserProfile>, Error> {
    let (users, count) = store.list_users(request.offset(), request.limit).await?;

    let mut profiles = Vec::with_capacity(users.len());
    for user in users {
        profiles.push(user_profile(user, viewer, store).await?);
    }

    PageContext::from_rows(profiles, count, request, path)
}

pub async fn set_password(
    session: &SessionData,
    form: PasswordForm,
    store: &dyn Store,
) -> Result<(), Error> {
    let user = current_user(session, store).await?;
    if !verify_password(&form.current_password, &user.password)? {
        return Err(Error::validation(
            "current_password",
            "Incorrect current password",
        ));
    }
    if form.new_password.is_empty() {
        return Err(Error::validation(
            "new_password",
            "This field may not be blank",
        ));
    }

    store
        .set_password(user.id, &hash_password(&form.new_password)?)
        .await?;
    log::info!("> Changed password of user {}", user.id);

    Ok(())
}

/// Removes the account and everything owned by it, image files included.
pub async fn delete_account(
    session: &SessionData,
    form: DeleteAccountForm,
    images: &ImageStore,
    store: &dyn Store,
) -> Result<(), Error> {
    let user = current_user(session, store).await?;
    if !verify_password(&form.current_password, &user.password)? {
        return Err(Error::validation(
            "current_password",
            "Incorrect current password",
        ));
    }

    let authored = store.author_recipes(user.id, None).await?;
    if !store.delete_user(user.id).await? {
        return Err(Error::not_found("User does not exist"));
    }
    for recipe in authored.iter() {
        images.remove(&recipe.image).await;
    }
    log::info!(
        "> Deleted user {} with {} recipes",
        user.id,
        authored.len()
    );

    Ok(())
}
