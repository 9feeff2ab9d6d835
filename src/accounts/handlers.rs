use axum::{
    extract::{FromRef, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    addresses,
    claims::{ActivationClaims, PendingAccount},
    dto::{
        ActivationRequest, AddressInput, ChangePasswordRequest, LoginRequest, MessageEnvelope,
        UpdateInfoRequest, UserEnvelope,
    },
    extractors::{ApiJson, AuthUser},
    password::{hash_password, verify_password},
    repo_types::User,
    tokens::JwtKeys,
};
use crate::{error::ApiError, state::AppState};

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

/// One uploaded file pulled out of a multipart body.
struct UploadedFile {
    body: Bytes,
    content_type: String,
}

/// Puts an uploaded file into the object store under a fresh key and returns
/// the key. The caller owns cleanup if the request fails later on.
async fn stage_avatar(state: &AppState, file: UploadedFile) -> Result<String, ApiError> {
    let ext = ext_from_mime(&file.content_type).unwrap_or("bin");
    let key = format!("avatars/{}.{}", Uuid::new_v4(), ext);
    state
        .storage
        .put_object(&key, file.body, &file.content_type)
        .await?;
    Ok(key)
}

/// Best-effort removal of a staged file. Never fails the request; a leaked
/// object is preferable to failing a mutation that already committed.
async fn discard_staged(state: &AppState, key: &str) {
    if let Err(e) = state.storage.delete_object(key).await {
        warn!(error = %e, key, "failed to delete staged avatar file");
    }
}

fn session_cookie(token: String, lifetime: time::Duration) -> Cookie<'static> {
    Cookie::build(("token", token))
        .http_only(true)
        .path("/")
        .expires(OffsetDateTime::now_utc() + lifetime)
        .build()
}

fn issue_session(keys: &JwtKeys, jar: CookieJar, user_id: Uuid) -> Result<CookieJar, ApiError> {
    let token = keys.sign_session(user_id)?;
    Ok(jar.add(session_cookie(token, keys.session_lifetime())))
}

/// Drops the upload that was staged for a registration that cannot proceed.
/// Split out so the cleanup contract is testable without a database.
async fn reject_duplicate_signup(state: &AppState, avatar: &str) -> ApiError {
    discard_staged(state, avatar).await;
    ApiError::DuplicateAccount
}

/// Validates a password change and returns the replacement hash. The stored
/// hash is untouched unless every check passes; the old password is checked
/// before the confirmation.
fn check_password_change(
    stored_hash: &str,
    payload: &ChangePasswordRequest,
) -> Result<String, ApiError> {
    if !verify_password(&payload.old_password, stored_hash)? {
        return Err(ApiError::InvalidCredentials);
    }
    if payload.new_password != payload.confirm_password {
        return Err(ApiError::PasswordMismatch);
    }
    Ok(hash_password(&payload.new_password)?)
}

/// The parsed multipart body of POST /create-user.
struct SignupForm {
    name: String,
    email: String,
    password: String,
    file: UploadedFile,
}

impl SignupForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut name = None;
        let mut email = None;
        let mut password = None;
        let mut file = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::Validation(e.to_string()))?
        {
            match field.name() {
                Some("name") => name = Some(text(field).await?),
                Some("email") => email = Some(text(field).await?),
                Some("password") => password = Some(text(field).await?),
                Some("file") => file = Some(binary(field).await?),
                _ => {}
            }
        }

        let (Some(name), Some(email), Some(password), Some(file)) = (name, email, password, file)
        else {
            return Err(ApiError::Validation("Please provide all the fields!".into()));
        };
        Ok(Self {
            name,
            email,
            password,
            file,
        })
    }
}

async fn text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::Validation(e.to_string()))
}

async fn binary(field: axum::extract::multipart::Field<'_>) -> Result<UploadedFile, ApiError> {
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let body = field
        .bytes()
        .await
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    if body.is_empty() {
        return Err(ApiError::Validation("Uploaded file is empty".into()));
    }
    Ok(UploadedFile { body, content_type })
}

// --- handlers ---

/// POST /create-user. Nothing is written to the database here: the only
/// durable effects of success are the staged avatar and the activation email.
#[instrument(skip(state, multipart))]
pub async fn create_user(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<MessageEnvelope>), ApiError> {
    let form = SignupForm::from_multipart(multipart).await?;
    let email = form.email.trim().to_lowercase();

    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if form.password.len() < 8 {
        return Err(ApiError::Validation("Password too short".into()));
    }

    let avatar = stage_avatar(&state, form.file).await?;

    if User::find_by_email(&state.db, &email).await?.is_some() {
        return Err(reject_duplicate_signup(&state, &avatar).await);
    }

    // The hash, not the plaintext, goes into the ticket.
    let password_hash = hash_password(&form.password)?;
    let pending = PendingAccount {
        name: form.name,
        email: email.clone(),
        password_hash,
        avatar,
    };

    let keys = JwtKeys::from_ref(&state);
    let ticket = keys.sign_activation(&pending)?;
    let activation_url = format!(
        "{}/activation/{}",
        state.config.frontend_url.trim_end_matches('/'),
        ticket
    );

    state
        .mailer
        .send_activation(&email, &pending.name, &activation_url)
        .await
        .map_err(ApiError::MailDelivery)?;

    info!(email = %email, "activation email sent");
    Ok((
        StatusCode::CREATED,
        Json(MessageEnvelope::new(format!(
            "please check your email:- {email} to activate your account!"
        ))),
    ))
}

async fn persist_activation(state: &AppState, claims: &ActivationClaims) -> Result<User, ApiError> {
    if User::find_by_email(&state.db, &claims.email).await?.is_some() {
        return Err(ApiError::DuplicateAccount);
    }
    User::create(
        &state.db,
        &claims.name,
        &claims.email,
        &claims.password_hash,
        &claims.avatar,
    )
    .await
}

/// POST /activation. Redeems the ticket exactly once and persists the user.
#[instrument(skip(state, jar, payload))]
pub async fn activation(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(payload): ApiJson<ActivationRequest>,
) -> Result<(StatusCode, CookieJar, Json<UserEnvelope>), ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_activation(&payload.activation_token)
        .map_err(|_| ApiError::InvalidOrExpiredTicket)?;

    if !state.replay.redeem(claims.jti, claims.exp as i64) {
        warn!(jti = %claims.jti, "activation ticket replayed");
        return Err(ApiError::InvalidOrExpiredTicket);
    }

    // The redemption only sticks once the row exists; a failure past this
    // point releases the claim so the still-valid ticket can be retried.
    let user = match persist_activation(&state, &claims).await {
        Ok(user) => user,
        Err(e) => {
            state.replay.release(claims.jti);
            return Err(e);
        }
    };

    info!(user_id = %user.id, email = %user.email, "account activated");
    let jar = issue_session(&keys, jar, user.id)?;
    Ok((StatusCode::CREATED, jar, Json(UserEnvelope::new(user))))
}

/// POST /login-user.
#[instrument(skip(state, jar, payload))]
pub async fn login_user(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<(StatusCode, CookieJar, Json<UserEnvelope>), ApiError> {
    let (Some(email), Some(password)) = (payload.email, payload.password) else {
        return Err(ApiError::Validation("Please provide all the fields!".into()));
    };
    let email = email.trim().to_lowercase();

    let creds = User::credentials_by_email(&state.db, &email)
        .await?
        .ok_or(ApiError::NotFound)?;
    if !verify_password(&password, &creds.password_hash)? {
        warn!(email = %email, "login with invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let user = User::find_by_id(&state.db, creds.id)
        .await?
        .ok_or(ApiError::NotFound)?;

    info!(user_id = %user.id, "user logged in");
    let keys = JwtKeys::from_ref(&state);
    let jar = issue_session(&keys, jar, user.id)?;
    Ok((StatusCode::CREATED, jar, Json(UserEnvelope::new(user))))
}

/// GET /getuser.
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserEnvelope>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(UserEnvelope::new(user)))
}

/// GET /logout. Overwrites the cookie with an empty, already-expired value.
#[instrument(skip(jar))]
pub async fn logout(
    AuthUser(_user_id): AuthUser,
    jar: CookieJar,
) -> (StatusCode, CookieJar, Json<MessageEnvelope>) {
    let cleared = Cookie::build(("token", ""))
        .http_only(true)
        .path("/")
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build();
    (
        StatusCode::CREATED,
        jar.add(cleared),
        Json(MessageEnvelope::new("Log out successful!")),
    )
}

/// PUT /update-user-info. The mutation binds to the session identity; the
/// submitted email is the new value, never the lookup key.
#[instrument(skip(state, payload))]
pub async fn update_user_info(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<UpdateInfoRequest>,
) -> Result<(StatusCode, Json<UserEnvelope>), ApiError> {
    let email = payload.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::Validation("Invalid email".into()));
    }

    let creds = User::credentials_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if !verify_password(&payload.password, &creds.password_hash)? {
        return Err(ApiError::InvalidCredentials);
    }

    if let Some(other) = User::find_by_email(&state.db, &email).await? {
        if other.id != user_id {
            return Err(ApiError::DuplicateAccount);
        }
    }

    let user = User::update_profile(
        &state.db,
        user_id,
        &payload.name,
        &email,
        payload.phone_number.as_deref(),
    )
    .await?;

    info!(user_id = %user.id, "profile updated");
    Ok((StatusCode::CREATED, Json(UserEnvelope::new(user))))
}

/// PUT /update-avatar. Stage the new file, commit, then retire the old file
/// best-effort: a failed deletion must not roll back a committed update.
#[instrument(skip(state, multipart))]
pub async fn update_avatar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<UserEnvelope>, ApiError> {
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(e.to_string()))?
    {
        if field.name() == Some("image") {
            file = Some(binary(field).await?);
        }
    }
    let file = file.ok_or_else(|| ApiError::Validation("Please provide an image".into()))?;

    let current = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let new_key = stage_avatar(&state, file).await?;
    let user = User::update_avatar(&state.db, user_id, &new_key).await?;
    discard_staged(&state, &current.avatar).await;

    info!(user_id = %user.id, avatar = %new_key, "avatar updated");
    Ok(Json(UserEnvelope::new(user)))
}

/// PUT /update-user-addresses.
#[instrument(skip(state, payload))]
pub async fn update_user_addresses(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<AddressInput>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let plan = addresses::plan_upsert(&user.addresses, payload)?;
    let updated = addresses::apply_upsert(user.addresses.0, plan);
    let user = User::update_addresses(&state.db, user_id, &updated).await?;

    Ok(Json(UserEnvelope::new(user)))
}

/// DELETE /delete-user-address/:id. Idempotent.
#[instrument(skip(state))]
pub async fn delete_user_address(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(address_id): Path<Uuid>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let remaining = addresses::remove(user.addresses.0, address_id);
    let user = User::update_addresses(&state.db, user_id, &remaining).await?;

    Ok(Json(UserEnvelope::new(user)))
}

/// PUT /update-user-password.
#[instrument(skip(state, payload))]
pub async fn update_user_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<Json<MessageEnvelope>, ApiError> {
    let creds = User::credentials_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let hash = check_password_change(&creds.password_hash, &payload)?;
    User::update_password(&state.db, user_id, &hash).await?;

    info!(user_id = %user_id, "password changed");
    Ok(Json(MessageEnvelope::new("Password updated successfully!")))
}

/// GET /user-info/:id. Public profile lookup, no authentication.
#[instrument(skip(state))]
pub async fn user_info(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<UserEnvelope>), ApiError> {
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok((StatusCode::CREATED, Json(UserEnvelope::new(user))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@shop.example.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("two@at@signs.com"));
        assert!(!is_valid_email("spaces in@mail.com"));
    }

    #[test]
    fn ext_from_mime_known_and_unknown() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[tokio::test]
    async fn stage_avatar_keys_under_avatars_with_extension() {
        let state = AppState::fake();
        let file = UploadedFile {
            body: Bytes::from_static(b"not a real png"),
            content_type: "image/png".into(),
        };
        let key = stage_avatar(&state, file).await.unwrap();
        assert!(key.starts_with("avatars/"));
        assert!(key.ends_with(".png"));
    }

    #[tokio::test]
    async fn stage_avatar_falls_back_to_bin_for_unknown_mime() {
        let state = AppState::fake();
        let file = UploadedFile {
            body: Bytes::from_static(b"???"),
            content_type: "application/pdf".into(),
        };
        let key = stage_avatar(&state, file).await.unwrap();
        assert!(key.ends_with(".bin"));
    }

    #[tokio::test]
    async fn duplicate_signup_deletes_the_staged_file() {
        let (state, storage, _mailer) = AppState::fake_with_recorders();
        let file = UploadedFile {
            body: Bytes::from_static(b"not a real png"),
            content_type: "image/png".into(),
        };
        let key = stage_avatar(&state, file).await.unwrap();
        assert_eq!(*storage.puts.lock().unwrap(), [key.clone()]);

        let err = reject_duplicate_signup(&state, &key).await;
        assert!(matches!(err, ApiError::DuplicateAccount));
        assert_eq!(*storage.deletes.lock().unwrap(), [key]);
    }

    #[test]
    fn password_change_rejects_wrong_old_password_before_confirmation() {
        let stored = hash_password("current-pass").unwrap();
        // Both checks would fail here; the old password must be reported.
        let payload = ChangePasswordRequest {
            old_password: "wrong".into(),
            new_password: "next-pass".into(),
            confirm_password: "other".into(),
        };
        assert!(matches!(
            check_password_change(&stored, &payload),
            Err(ApiError::InvalidCredentials)
        ));
    }

    #[test]
    fn password_change_mismatch_yields_no_replacement_hash() {
        let stored = hash_password("current-pass").unwrap();
        let payload = ChangePasswordRequest {
            old_password: "current-pass".into(),
            new_password: "next-pass".into(),
            confirm_password: "different".into(),
        };
        assert!(matches!(
            check_password_change(&stored, &payload),
            Err(ApiError::PasswordMismatch)
        ));
    }

    #[test]
    fn password_change_produces_hash_of_the_new_password() {
        let stored = hash_password("current-pass").unwrap();
        let payload = ChangePasswordRequest {
            old_password: "current-pass".into(),
            new_password: "next-pass".into(),
            confirm_password: "next-pass".into(),
        };
        let hash = check_password_change(&stored, &payload).unwrap();
        assert!(verify_password("next-pass", &hash).unwrap());
        assert_ne!(hash, stored);
    }

    #[test]
    fn session_cookie_is_http_only_and_scoped_to_root() {
        let cookie = session_cookie("abc".into(), time::Duration::minutes(5));
        assert_eq!(cookie.name(), "token");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert!(cookie.expires().is_some());
    }
}
