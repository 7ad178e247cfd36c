use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use rand::{Rng, distributions::Alphanumeric};
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    audit,
    config::AppConfig,
    dto::auth::{
        AuthResponse, ChangePasswordRequest, Claims, EmailRequest, LoginRequest, RegisterRequest,
        ResetPasswordRequest, UpdateProfileRequest,
    },
    entity::{
        Users,
        users::{self, AuthProvider, Column as UserCol, UserRole},
    },
    error::{AppError, AppResult},
    mailer::{self, Email},
    middleware::auth::AuthUser,
    models::User,
    response::{Ack, ApiResponse},
    state::AppState,
};

const VERIFICATION_TTL_HOURS: i64 = 24;
const RESET_TTL_HOURS: i64 = 1;
const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn issue_token(config: &AppConfig, user: &users::Model) -> AppResult<String> {
    let now = Utc::now();
    let expiration = now
        .checked_add_signed(Duration::days(config.jwt_expires_days))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let role = match user.role {
        UserRole::Admin => "admin",
        UserRole::Customer => "customer",
    };
    let claims = Claims {
        sub: user.id.to_string(),
        role: role.to_string(),
        iat: now.timestamp(),
        exp: expiration.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

/// Opaque single-use token for verification and reset links.
pub fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn auth_response(config: &AppConfig, user: users::Model) -> AppResult<AuthResponse> {
    let token = issue_token(config, &user)?;
    Ok(AuthResponse {
        token,
        token_type: "Bearer".to_string(),
        user: User::from(user),
    })
}

async fn find_user(state: &AppState, user_id: Uuid) -> AppResult<users::Model> {
    match Users::find_by_id(user_id).one(&state.orm).await? {
        Some(u) => Ok(u),
        None => Err(AppError::NotFound),
    }
}

async fn find_by_email(state: &AppState, email: &str) -> AppResult<Option<users::Model>> {
    Ok(Users::find()
        .filter(UserCol::Email.eq(normalize_email(email)))
        .one(&state.orm)
        .await?)
}

pub async fn register(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let email = normalize_email(&payload.email);
    if find_by_email(state, &email).await?.is_some() {
        return Err(AppError::bad_request("Email is already registered"));
    }

    let username = payload
        .username
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    if let Some(username) = &username {
        let taken = Users::find()
            .filter(UserCol::Username.eq(username.as_str()))
            .one(&state.orm)
            .await?;
        if taken.is_some() {
            return Err(AppError::bad_request("Username is already taken"));
        }
    }

    let password_hash = hash_password(&payload.password)?;
    let verification_token = random_token();
    let now = Utc::now();

    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        email: Set(email),
        username: Set(username),
        password_hash: Set(Some(password_hash)),
        role: Set(UserRole::Customer),
        phone: Set(payload.phone),
        street: Set(None),
        city: Set(None),
        state: Set(None),
        postal_code: Set(None),
        country: Set(None),
        avatar: Set(None),
        is_active: Set(true),
        email_verified: Set(false),
        verification_token: Set(Some(verification_token.clone())),
        verification_token_expires: Set(Some(
            (now + Duration::hours(VERIFICATION_TTL_HOURS)).fixed_offset(),
        )),
        reset_password_token: Set(None),
        reset_password_expires: Set(None),
        google_id: Set(None),
        auth_provider: Set(AuthProvider::Local),
        last_login: Set(Some(now.fixed_offset())),
        created_at: Set(now.fixed_offset()),
        updated_at: Set(now.fixed_offset()),
    }
    .insert(&state.orm)
    .await?;

    mailer::send(&Email::verification(
        &user.email,
        &user.name,
        &state.config.verification_url(&verification_token),
    ));

    audit::record(
        &state.orm,
        Some(user.id),
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;
    tracing::info!(user_id = %user.id, "user registered");

    let resp = auth_response(&state.config, user)?;
    Ok(ApiResponse::ok("User registered", resp))
}

pub async fn login(state: &AppState, payload: LoginRequest) -> AppResult<ApiResponse<AuthResponse>> {
    let identifier = payload.email.trim();
    let user = Users::find()
        .filter(
            Condition::any()
                .add(UserCol::Email.eq(normalize_email(identifier)))
                .add(UserCol::Username.eq(identifier)),
        )
        .one(&state.orm)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::bad_request("Invalid credentials")),
    };

    if !user.is_active {
        return Err(AppError::unauthorized("Account is deactivated"));
    }

    let hash = match user.password_hash.as_deref() {
        Some(hash) => hash,
        None => {
            return Err(AppError::bad_request(
                "This account uses Google sign-in. Please continue with Google",
            ));
        }
    };

    if !verify_password(&payload.password, hash) {
        return Err(AppError::bad_request("Invalid credentials"));
    }

    let mut active: users::ActiveModel = user.into();
    active.last_login = Set(Some(Utc::now().fixed_offset()));
    let user = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.id),
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    let resp = auth_response(&state.config, user)?;
    Ok(ApiResponse::ok("Logged in", resp))
}

/// Claims returned by Google's `tokeninfo` endpoint for an ID token.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub sub: String,
    pub email: String,
    /// Google sends this as the string `"true"`; accept a bool as well.
    #[serde(default)]
    pub email_verified: Option<serde_json::Value>,
    pub name: Option<String>,
    pub picture: Option<String>,
    #[serde(default)]
    pub aud: String,
}

impl GoogleProfile {
    pub fn is_email_verified(&self) -> bool {
        match &self.email_verified {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => s == "true",
            _ => false,
        }
    }
}

pub async fn verify_google_credential(
    state: &AppState,
    credential: &str,
) -> AppResult<GoogleProfile> {
    let client_id = match state.config.google_client_id.as_deref() {
        Some(id) => id,
        None => return Err(AppError::bad_request("Google sign-in is not configured")),
    };

    let resp = state
        .http
        .get(GOOGLE_TOKENINFO_URL)
        .query(&[("id_token", credential)])
        .send()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Google tokeninfo request failed: {e}")))?;

    if !resp.status().is_success() {
        tracing::debug!(status = %resp.status(), "google credential rejected");
        return Err(AppError::unauthorized("Invalid Google credential"));
    }

    let profile = resp
        .json::<GoogleProfile>()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to parse Google tokeninfo: {e}")))?;

    if profile.aud != client_id {
        return Err(AppError::unauthorized("Invalid Google credential"));
    }
    if !profile.is_email_verified() {
        return Err(AppError::bad_request("Google email is not verified"));
    }

    Ok(profile)
}

pub async fn google_login(
    state: &AppState,
    credential: &str,
) -> AppResult<ApiResponse<AuthResponse>> {
    let profile = verify_google_credential(state, credential).await?;
    sign_in_with_google(state, profile).await
}

/// Find the account for a verified Google profile, linking by email or
/// creating a new one.
pub async fn sign_in_with_google(
    state: &AppState,
    profile: GoogleProfile,
) -> AppResult<ApiResponse<AuthResponse>> {
    let now = Utc::now().fixed_offset();
    let email = normalize_email(&profile.email);

    let by_google = Users::find()
        .filter(UserCol::GoogleId.eq(profile.sub.as_str()))
        .one(&state.orm)
        .await?;

    let user = match by_google {
        Some(user) => user,
        None => match find_by_email(state, &email).await? {
            Some(existing) => {
                let avatar = existing.avatar.clone().or(profile.picture.clone());
                let mut active: users::ActiveModel = existing.into();
                active.google_id = Set(Some(profile.sub.clone()));
                active.email_verified = Set(true);
                active.verification_token = Set(None);
                active.verification_token_expires = Set(None);
                active.avatar = Set(avatar);
                active.updated_at = Set(now);
                let linked = active.update(&state.orm).await?;
                tracing::info!(user_id = %linked.id, "google account linked");
                linked
            }
            None => {
                let name = profile
                    .name
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
                let created = users::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    name: Set(name),
                    email: Set(email.clone()),
                    username: Set(None),
                    password_hash: Set(None),
                    role: Set(UserRole::Customer),
                    phone: Set(None),
                    street: Set(None),
                    city: Set(None),
                    state: Set(None),
                    postal_code: Set(None),
                    country: Set(None),
                    avatar: Set(profile.picture.clone()),
                    is_active: Set(true),
                    email_verified: Set(true),
                    verification_token: Set(None),
                    verification_token_expires: Set(None),
                    reset_password_token: Set(None),
                    reset_password_expires: Set(None),
                    google_id: Set(Some(profile.sub.clone())),
                    auth_provider: Set(AuthProvider::Google),
                    last_login: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&state.orm)
                .await?;
                tracing::info!(user_id = %created.id, "google account created");
                created
            }
        },
    };

    if !user.is_active {
        return Err(AppError::unauthorized("Account is deactivated"));
    }

    let mut active: users::ActiveModel = user.into();
    active.last_login = Set(Some(now));
    let user = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.id),
        "user_login_google",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    let resp = auth_response(&state.config, user)?;
    Ok(ApiResponse::ok("Logged in with Google", resp))
}

pub async fn me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let model = find_user(state, user.user_id).await?;
    Ok(ApiResponse::ok("OK", User::from(model)))
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    let model = find_user(state, user.user_id).await?;

    let username = payload
        .username
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    if let Some(username) = &username {
        let taken = Users::find()
            .filter(UserCol::Username.eq(username.as_str()))
            .filter(UserCol::Id.ne(model.id))
            .one(&state.orm)
            .await?;
        if taken.is_some() {
            return Err(AppError::bad_request("Username is already taken"));
        }
    }

    let mut active: users::ActiveModel = model.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if username.is_some() {
        active.username = Set(username);
    }
    if payload.phone.is_some() {
        active.phone = Set(payload.phone);
    }
    if payload.avatar.is_some() {
        active.avatar = Set(payload.avatar);
    }
    if let Some(address) = payload.address {
        active.street = Set(address.street);
        active.city = Set(address.city);
        active.state = Set(address.state);
        active.postal_code = Set(address.postal_code);
        active.country = Set(address.country);
    }
    active.updated_at = Set(Utc::now().fixed_offset());
    let model = active.update(&state.orm).await?;

    Ok(ApiResponse::ok("Profile updated", User::from(model)))
}

pub async fn change_password(
    state: &AppState,
    user: &AuthUser,
    payload: ChangePasswordRequest,
) -> AppResult<ApiResponse<Ack>> {
    let model = find_user(state, user.user_id).await?;

    if let Some(hash) = model.password_hash.as_deref() {
        let current = payload.current_password.as_deref().unwrap_or_default();
        if !verify_password(current, hash) {
            return Err(AppError::bad_request("Current password is incorrect"));
        }
    }

    let new_hash = hash_password(&payload.new_password)?;
    let mut active: users::ActiveModel = model.into();
    active.password_hash = Set(Some(new_hash));
    active.updated_at = Set(Utc::now().fixed_offset());
    let model = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(model.id),
        "password_change",
        "users",
        serde_json::json!({ "user_id": model.id }),
    )
    .await;

    Ok(ApiResponse::ok("Password updated", Ack { id: Some(model.id) }))
}

pub async fn verify_email(state: &AppState, token: &str) -> AppResult<ApiResponse<Ack>> {
    let now = Utc::now();
    let user = Users::find()
        .filter(UserCol::VerificationToken.eq(token))
        .one(&state.orm)
        .await?;

    let user = match user {
        Some(u) if u.verification_token_expires.is_some_and(|exp| exp > now) => u,
        _ => return Err(AppError::bad_request("Invalid or expired verification token")),
    };

    let mut active: users::ActiveModel = user.into();
    active.email_verified = Set(true);
    active.verification_token = Set(None);
    active.verification_token_expires = Set(None);
    active.updated_at = Set(now.fixed_offset());
    let user = active.update(&state.orm).await?;

    tracing::info!(user_id = %user.id, "email verified");
    Ok(ApiResponse::ok("Email verified", Ack { id: Some(user.id) }))
}

pub async fn resend_verification(
    state: &AppState,
    payload: EmailRequest,
) -> AppResult<ApiResponse<Ack>> {
    if let Some(user) = find_by_email(state, &payload.email).await? {
        if !user.email_verified {
            let token = random_token();
            let now = Utc::now();
            let (email, name) = (user.email.clone(), user.name.clone());
            let mut active: users::ActiveModel = user.into();
            active.verification_token = Set(Some(token.clone()));
            active.verification_token_expires =
                Set(Some((now + Duration::hours(VERIFICATION_TTL_HOURS)).fixed_offset()));
            active.updated_at = Set(now.fixed_offset());
            active.update(&state.orm).await?;

            mailer::send(&Email::verification(
                &email,
                &name,
                &state.config.verification_url(&token),
            ));
        }
    }

    Ok(ApiResponse::ok(
        "If the account exists and is unverified, a verification email has been sent",
        Ack { id: None },
    ))
}

pub async fn forgot_password(
    state: &AppState,
    payload: EmailRequest,
) -> AppResult<ApiResponse<Ack>> {
    if let Some(user) = find_by_email(state, &payload.email).await? {
        if user.is_active {
            let token = random_token();
            let now = Utc::now();
            let (email, name) = (user.email.clone(), user.name.clone());
            let mut active: users::ActiveModel = user.into();
            active.reset_password_token = Set(Some(token.clone()));
            active.reset_password_expires =
                Set(Some((now + Duration::hours(RESET_TTL_HOURS)).fixed_offset()));
            active.updated_at = Set(now.fixed_offset());
            active.update(&state.orm).await?;

            mailer::send(&Email::password_reset(
                &email,
                &name,
                &state.config.reset_password_url(&token),
            ));
        }
    }

    Ok(ApiResponse::ok(
        "If the account exists, a password reset email has been sent",
        Ack { id: None },
    ))
}

pub async fn reset_password(
    state: &AppState,
    payload: ResetPasswordRequest,
) -> AppResult<ApiResponse<Ack>> {
    let now = Utc::now();
    let user = Users::find()
        .filter(UserCol::ResetPasswordToken.eq(payload.token.as_str()))
        .one(&state.orm)
        .await?;

    let user = match user {
        Some(u) if u.reset_password_expires.is_some_and(|exp| exp > now) => u,
        _ => return Err(AppError::bad_request("Invalid or expired reset token")),
    };

    let new_hash = hash_password(&payload.password)?;
    let mut active: users::ActiveModel = user.into();
    active.password_hash = Set(Some(new_hash));
    active.reset_password_token = Set(None);
    active.reset_password_expires = Set(None);
    active.updated_at = Set(now.fixed_offset());
    let user = active.update(&state.orm).await?;

    audit::record(
        &state.orm,
        Some(user.id),
        "password_reset",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::ok("Password has been reset", Ack { id: Some(user.id) }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter22").unwrap();
        assert_ne!(hash, "hunter22");
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not-a-phc-string"));
    }

    #[test]
    fn random_tokens_differ() {
        let a = random_token();
        let b = random_token();
        assert_eq!(a.len(), 48);
        assert_ne!(a, b);
    }

    #[test]
    fn google_email_verified_accepts_string_or_bool() {
        let profile: GoogleProfile = serde_json::from_value(serde_json::json!({
            "sub": "123",
            "email": "a@b.c",
            "email_verified": "true",
            "aud": "client"
        }))
        .unwrap();
        assert!(profile.is_email_verified());

        let profile: GoogleProfile = serde_json::from_value(serde_json::json!({
            "sub": "123",
            "email": "a@b.c",
            "email_verified": false
        }))
        .unwrap();
        assert!(!profile.is_email_verified());
    }
}
