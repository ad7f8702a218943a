//! Authentication: password hashing, signed tokens, login and account recovery.

use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::role::Role;
use crate::models::user::{GuestStatus, User};
use crate::services::email_service::Mailer;
use crate::services::metrics_service;
use crate::services::settings_service::SettingsService;
use crate::services::user_service::{NewUser, UserService, MIN_PASSWORD_LEN};

/// Guest login links stay valid for 15 minutes.
pub const GUEST_LINK_TTL_SECS: i64 = 15 * 60;
/// Password reset links stay valid for 60 minutes.
pub const RESET_LINK_TTL_SECS: i64 = 60 * 60;

pub const FORGOT_PASSWORD_MESSAGE: &str = "If an account with that identifier exists, a password reset link has been sent to the registered email address.";

/// What a signed token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Session,
    GuestLogin,
    PasswordReset,
}

/// JWT claims shared by session and link tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id for session/reset tokens, email address for guest links
    pub sub: String,
    pub purpose: TokenPurpose,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    bcrypt::hash(password, cost).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Malformed hashes verify as `false`.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

fn validate_new_password(new_password: &str, confirm_password: &str) -> Result<()> {
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(
            "Password must be at least 8 characters.".to_string(),
        ));
    }
    if new_password != confirm_password {
        return Err(AppError::Validation("Passwords do not match.".to_string()));
    }
    Ok(())
}

/// `G-` followed by eight upper-case hex digits.
pub fn generate_guest_code() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("G-{}", hex[..8].to_uppercase())
}

pub struct AuthService {
    db: SqlitePool,
    config: Arc<Config>,
}

impl AuthService {
    pub fn new(db: SqlitePool, config: Arc<Config>) -> Self {
        Self { db, config }
    }

    fn users(&self) -> UserService {
        UserService::new(self.db.clone())
    }

    pub fn issue_token(
        &self,
        sub: String,
        purpose: TokenPurpose,
        role: Option<String>,
        ttl_secs: i64,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub,
            purpose,
            role,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl_secs)).timestamp(),
        };
        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )?)
    }

    /// Decode a token and require the given purpose. Expired and tampered
    /// tokens are reported with distinct messages.
    pub fn decode_token(&self, token: &str, purpose: TokenPurpose) -> Result<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::Authentication("Link has expired".to_string()),
            _ => AppError::Authentication("Invalid or expired token".to_string()),
        })?;

        if data.claims.purpose != purpose {
            return Err(AppError::Authentication(
                "Invalid or expired token".to_string(),
            ));
        }
        Ok(data.claims)
    }

    pub fn session_token(&self, user: &User) -> Result<String> {
        self.issue_token(
            user.user_id.to_string(),
            TokenPurpose::Session,
            Some(user.role_name.clone()),
            self.config.jwt_expiration_secs as i64,
        )
    }

    /// Resolve a bearer token to an active account.
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let claims = self.decode_token(token, TokenPurpose::Session)?;
        let user_id: i64 = claims
            .sub
            .parse()
            .map_err(|_| AppError::Authentication("Invalid or expired token".to_string()))?;
        let user = self
            .users()
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Authentication("Account no longer exists".to_string()))?;

        if user.is_guest() && (user.is_disabled() || user.guest_expired_at(Utc::now())) {
            return Err(AppError::Authentication(
                "Guest account is no longer active".to_string(),
            ));
        }
        Ok(user)
    }

    /// Log in with a username (students only) or an email address.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginResponse> {
        let identifier = identifier.trim();
        let users = self.users();
        let mut user = None;

        if !identifier.is_empty() {
            if let Some(by_username) = users.find_by_username(identifier).await? {
                if by_username.has_role(Role::Student) {
                    user = Some(by_username);
                } else {
                    metrics_service::record_login("password", false);
                    return Err(AppError::Authentication(
                        "Non-students must login with email.".to_string(),
                    ));
                }
            }

            if user.is_none() {
                if let Some(by_email) = users.find_by_email(identifier).await? {
                    if by_email.has_role(Role::Student) && by_email.username.is_some() {
                        metrics_service::record_login("password", false);
                        return Err(AppError::Authentication(
                            "Students must login using username.".to_string(),
                        ));
                    }
                    user = Some(by_email);
                }
            }
        }

        let user = match user {
            Some(u) if verify_password(password, &u.password) => u,
            _ => {
                metrics_service::record_login("password", false);
                return Err(AppError::Authentication(
                    "Invalid email or password".to_string(),
                ));
            }
        };

        if user.is_guest() {
            if user.guest_expired_at(Utc::now()) {
                users
                    .set_guest_status(user.user_id, GuestStatus::Expired)
                    .await?;
                return Err(AppError::Authentication(
                    "Guest account expired. Please request a new guest account.".to_string(),
                ));
            }
            if user.is_disabled() {
                return Err(AppError::Authentication(
                    "Guest account has been disabled.".to_string(),
                ));
            }
        }

        metrics_service::record_login("password", true);
        tracing::info!(user_id = user.user_id, role = %user.role_name, "User logged in");
        Ok(LoginResponse {
            token: self.session_token(&user)?,
            user,
        })
    }

    /// Mail a one-time guest login link.
    pub async fn request_guest_link(&self, email: &str, mailer: &dyn Mailer) -> Result<()> {
        if !SettingsService::new(self.db.clone()).guest_enabled().await? {
            return Err(AppError::Authorization(
                "Guest login is disabled".to_string(),
            ));
        }

        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::Validation(
                "Please provide a valid email address".to_string(),
            ));
        }

        if let Some(existing) = self.users().find_by_email(&email).await? {
            if !existing.is_guest() {
                return Err(AppError::Conflict(
                    "This email is already registered. Please login using your account."
                        .to_string(),
                ));
            }
        }

        let token = self.issue_token(
            email.clone(),
            TokenPurpose::GuestLogin,
            None,
            GUEST_LINK_TTL_SECS,
        )?;
        let verify_url = format!(
            "{}/api/v1/auth/guest/email/verify?token={}",
            self.config.base_url, token
        );
        let body = format!(
            "Hello,\n\nUse the link below to login as a guest (valid for 15 minutes):\n\n{}\n\nIf you did not request this, ignore this email.",
            verify_url
        );

        mailer
            .send(&email, "Your Guest Login Link", &body)
            .await
            .map_err(|e| {
                tracing::error!("Failed to send guest login email: {}", e);
                e
            })
    }

    /// Exchange a guest link for a session, creating the guest on first use.
    pub async fn verify_guest_link(&self, token: &str) -> Result<LoginResponse> {
        let claims = self.decode_token(token, TokenPurpose::GuestLogin)?;
        let email = claims.sub.trim().to_lowercase();
        if email.is_empty() {
            return Err(AppError::Authentication("Invalid token payload".to_string()));
        }

        let users = self.users();
        let user = match users.find_by_email(&email).await? {
            Some(existing) => {
                if !existing.is_guest() {
                    return Err(AppError::Conflict(
                        "This email is registered with an existing account. Please login with your credentials.".to_string(),
                    ));
                }
                if existing.username.is_none() {
                    let code = self.unique_guest_code().await?;
                    users.set_username(existing.user_id, &code).await?;
                }
                if existing.guest_expired_at(Utc::now()) {
                    users
                        .set_guest_status(existing.user_id, GuestStatus::Expired)
                        .await?;
                    return Err(AppError::Authentication(
                        "Guest account expired. Please request a new guest account."
                            .to_string(),
                    ));
                }
                if existing.is_disabled() {
                    return Err(AppError::Authentication(
                        "Guest account has been disabled.".to_string(),
                    ));
                }
                users.get_by_id(existing.user_id).await?
            }
            None => {
                let validity_days = SettingsService::new(self.db.clone())
                    .guest_validity_days()
                    .await?;
                let local_part = email.split('@').next().unwrap_or_default();
                let random_password = uuid::Uuid::new_v4().simple().to_string();
                let guest = users
                    .create(NewUser {
                        full_name: format!("Guest {}", local_part),
                        username: Some(self.unique_guest_code().await?),
                        email: Some(email.clone()),
                        password_hash: hash_password(&random_password, self.config.bcrypt_cost)?,
                        role: Role::Guest,
                        dept_id: None,
                        expiry_date: Some(Utc::now() + Duration::days(validity_days)),
                    })
                    .await?;
                tracing::info!(user_id = guest.user_id, "Guest account created");
                guest
            }
        };

        metrics_service::record_login("guest_link", true);
        Ok(LoginResponse {
            token: self.session_token(&user)?,
            user,
        })
    }

    async fn unique_guest_code(&self) -> Result<String> {
        let users = self.users();
        loop {
            let code = generate_guest_code();
            if !users.username_taken(&code, None).await? {
                return Ok(code);
            }
        }
    }

    pub async fn change_password(
        &self,
        user: &User,
        old_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<()> {
        if user.is_guest() {
            return Err(AppError::Authorization(
                "Guest accounts cannot change password.".to_string(),
            ));
        }
        if !verify_password(old_password, &user.password) {
            return Err(AppError::Validation(
                "Current password is incorrect.".to_string(),
            ));
        }
        if new_password != confirm_password {
            return Err(AppError::Validation(
                "New passwords do not match.".to_string(),
            ));
        }
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(
                "Password must be at least 8 characters.".to_string(),
            ));
        }

        let hash = hash_password(new_password, self.config.bcrypt_cost)?;
        self.users().update_password(user.user_id, &hash).await
    }

    /// Always succeeds from the caller's point of view so account existence
    /// is never revealed.
    pub async fn forgot_password(&self, identifier: &str, mailer: &dyn Mailer) -> Result<()> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Ok(());
        }

        let users = self.users();
        let user = match users.find_by_email(identifier).await? {
            Some(u) => Some(u),
            None => users.find_by_username(identifier).await?,
        };
        let Some(user) = user else {
            return Ok(());
        };

        let token = self.issue_token(
            user.user_id.to_string(),
            TokenPurpose::PasswordReset,
            None,
            RESET_LINK_TTL_SECS,
        )?;
        let reset_url = format!("{}/api/v1/auth/reset-password/{}", self.config.base_url, token);

        match &user.email {
            Some(email) => {
                let body = format!(
                    "Hello {},\n\nWe received a request to reset your password. Use the link below to set a new password (valid for 60 minutes):\n\n{}\n\nIf you didn't request this, you can ignore this email.",
                    user.full_name, reset_url
                );
                if let Err(e) = mailer
                    .send(email, "Reset your Campus Events password", &body)
                    .await
                {
                    tracing::warn!("Failed to send password reset email: {}", e);
                }
            }
            None => {
                tracing::info!(user_id = user.user_id, reset_url = %reset_url, "Password reset link for user without email");
            }
        }
        Ok(())
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<()> {
        let claims = self.decode_token(token, TokenPurpose::PasswordReset)?;
        let invalid = || {
            AppError::Authentication("Invalid reset link. Please request a new one.".to_string())
        };
        let user_id: i64 = claims.sub.parse().map_err(|_| invalid())?;
        let user = self.users().find_by_id(user_id).await?.ok_or_else(invalid)?;

        validate_new_password(new_password, confirm_password)?;

        let hash = hash_password(new_password, self.config.bcrypt_cost)?;
        self.users().update_password(user.user_id, &hash).await?;
        tracing::info!(user_id = user.user_id, "Password reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        let pool = SqlitePool::connect_lazy("sqlite::memory:").unwrap();
        AuthService::new(pool, Arc::new(Config::for_tests()))
    }

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("secret123", 4).unwrap();
        assert!(verify_password("secret123", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("secret123", "not-a-hash"));
    }

    #[test]
    fn test_guest_code_shape() {
        let code = generate_guest_code();
        assert_eq!(code.len(), 10);
        assert!(code.starts_with("G-"));
        assert!(code[2..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[tokio::test]
    async fn test_token_purpose_is_enforced() {
        let svc = service();
        let token = svc
            .issue_token("a@b.c".into(), TokenPurpose::GuestLogin, None, 60)
            .unwrap();
        assert!(svc.decode_token(&token, TokenPurpose::GuestLogin).is_ok());
        assert!(matches!(
            svc.decode_token(&token, TokenPurpose::PasswordReset),
            Err(AppError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let svc = service();
        let token = svc
            .issue_token("1".into(), TokenPurpose::PasswordReset, None, -3600)
            .unwrap();
        match svc.decode_token(&token, TokenPurpose::PasswordReset) {
            Err(AppError::Authentication(msg)) => assert_eq!(msg, "Link has expired"),
            other => panic!("expected expiry error, got {:?}", other.map(|c| c.sub)),
        }
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_rejected() {
        let svc = service();
        let mut other_config = Config::for_tests();
        other_config.jwt_secret = "another-secret".into();
        let other = AuthService::new(
            SqlitePool::connect_lazy("sqlite::memory:").unwrap(),
            Arc::new(other_config),
        );
        let token = other
            .issue_token("1".into(), TokenPurpose::Session, None, 60)
            .unwrap();
        assert!(svc.decode_token(&token, TokenPurpose::Session).is_err());
    }

    #[test]
    fn test_new_password_rules() {
        assert!(validate_new_password("short", "short").is_err());
        assert!(validate_new_password("longenough", "different1").is_err());
        assert!(validate_new_password("longenough", "longenough").is_ok());
    }
}
