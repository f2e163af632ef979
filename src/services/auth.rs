use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        auth::{Claims, RefreshClaims},
        user::{LoginResponse, RefreshToken, SessionUser, SignUpRequest, SignUpResponse, User, UserRole},
    },
    services::{email::EmailService, metrics::LOGINS_COUNTER},
};

pub const MIN_PASSWORD_LEN: usize = 6;

const USER_COLUMNS: &str = "id, email, password_hash, name, phone, is_admin, is_active,
    email_confirmed_at, created_at, updated_at";

/// Secrets and lifetimes for the token pair.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub jwt_secret: String,
    pub refresh_secret: String,
    pub access_ttl: u64,
    pub refresh_ttl_days: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmailTokenPurpose {
    ConfirmEmail,
    ResetPassword,
}

impl EmailTokenPurpose {
    fn as_str(self) -> &'static str {
        match self {
            EmailTokenPurpose::ConfirmEmail => "confirm_email",
            EmailTokenPurpose::ResetPassword => "reset_password",
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Checks a new password and its optional confirmation.
pub fn validate_new_password(password: &str, confirm: Option<&str>) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(AppError::validation("Please enter a password"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if let Some(confirm) = confirm {
        if confirm != password {
            return Err(AppError::validation("Passwords do not match"));
        }
    }
    Ok(())
}

pub fn validate_sign_up(req: &SignUpRequest) -> Result<(), AppError> {
    if req.name.trim().is_empty()
        || req.phone.trim().is_empty()
        || req.email.trim().is_empty()
        || req.password.is_empty()
    {
        return Err(AppError::validation("All fields are required"));
    }
    if !req.email.contains('@') {
        return Err(AppError::validation("Please enter a valid email address"));
    }
    validate_new_password(&req.password, req.confirm_password.as_deref())
}

/// Random URL-safe token and the SHA-256 digest that gets stored.
fn generate_email_token() -> (String, String) {
    let token: String = rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(48)
        .map(char::from)
        .collect();
    let digest = hash_email_token(&token);
    (token, digest)
}

fn hash_email_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn email_taken() -> AppError {
    AppError::auth(
        "email_taken",
        "This email is already registered. Please log in or reset your password.",
    )
}

fn build_link(base_url: &str, path: &str, token: &str) -> String {
    format!("{}/{path}?token={token}", base_url.trim_end_matches('/'))
}

pub struct AuthService;

impl AuthService {
    /// Registers a user. With SMTP configured a confirmation link is mailed and
    /// the account cannot log in until it is followed; otherwise it is confirmed immediately.
    pub async fn sign_up(
        pool: &PgPool,
        email_svc: Option<&EmailService>,
        req: &SignUpRequest,
        base_url: &str,
    ) -> Result<SignUpResponse, AppError> {
        validate_sign_up(req)?;
        let email = normalize_email(&req.email);

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(&email)
            .fetch_one(pool)
            .await?;
        if exists {
            return Err(email_taken());
        }

        let password_hash = bcrypt::hash(&req.password, 12).map_err(anyhow::Error::from)?;
        let confirmed_at = email_svc.is_none().then(Utc::now);

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, name, phone, email_confirmed_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&email)
        .bind(&password_hash)
        .bind(req.name.trim())
        .bind(req.phone.trim())
        .bind(confirmed_at)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            // lost a race with a concurrent sign-up for the same address
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return email_taken();
                }
            }
            AppError::from(e)
        })?;

        if let Some(email_svc) = email_svc {
            let token =
                Self::create_email_token(pool, user.id, EmailTokenPurpose::ConfirmEmail, 24).await?;
            let link = build_link(base_url, "confirm-email", &token);
            if let Err(e) = email_svc.send_confirmation(&user.email, &user.name, &link).await {
                warn!("Confirmation email to {} failed: {}", user.email, e);
            }
        } else {
            info!("SMTP not configured, {} confirmed without email", user.email);
        }

        info!("User signed up: {}", user.id);
        let email_confirmed = user.email_confirmed_at.is_some();
        Ok(SignUpResponse {
            user: user.into(),
            email_confirmed,
        })
    }

    pub async fn confirm_email(pool: &PgPool, token: &str) -> Result<(), AppError> {
        let user_id =
            Self::consume_email_token(pool, token, EmailTokenPurpose::ConfirmEmail).await?;
        sqlx::query(
            "UPDATE users SET email_confirmed_at = COALESCE(email_confirmed_at, NOW()), updated_at = NOW()
             WHERE id = $1",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        info!("Email confirmed for user {}", user_id);
        Ok(())
    }

    pub async fn login(
        pool: &PgPool,
        email: &str,
        password: &str,
        tokens: &TokenSettings,
    ) -> Result<LoginResponse, AppError> {
        let result = Self::try_login(pool, email, password, tokens).await;
        let status = if result.is_ok() { "success" } else { "failure" };
        LOGINS_COUNTER.with_label_values(&[status]).inc();
        result
    }

    async fn try_login(
        pool: &PgPool,
        email: &str,
        password: &str,
        tokens: &TokenSettings,
    ) -> Result<LoginResponse, AppError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::validation("Email and password are required"));
        }
        let invalid = || AppError::auth("invalid_credentials", "Invalid email or password");

        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?
        .ok_or_else(invalid)?;

        let valid = bcrypt::verify(password, &user.password_hash).map_err(|_| invalid())?;
        if !valid {
            return Err(invalid());
        }
        if user.email_confirmed_at.is_none() {
            return Err(AppError::auth(
                "email_not_confirmed",
                "Please verify your email before logging in.",
            ));
        }
        if !user.is_active {
            return Err(AppError::Authorization(
                "Your account is inactive or removed. Contact admin.".into(),
            ));
        }

        let response = Self::issue_tokens(pool, user, tokens).await?;
        info!("User logged in: {} ({})", response.user.id, response.user.role);
        Ok(response)
    }

    pub fn generate_access_token(
        user_id: Uuid,
        role: UserRole,
        secret: &str,
        ttl_seconds: u64,
    ) -> anyhow::Result<String> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            iat: now,
            exp: now + ttl_seconds as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok(token)
    }

    fn generate_refresh_token(
        user_id: &Uuid,
        secret: &str,
        ttl_days: u64,
    ) -> anyhow::Result<(String, Uuid)> {
        let now = Utc::now().timestamp() as usize;
        let jti = Uuid::new_v4();
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            jti: jti.to_string(),
            iat: now,
            exp: now + (ttl_days * 86400) as usize,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok((token, jti))
    }

    async fn issue_tokens(
        pool: &PgPool,
        user: User,
        tokens: &TokenSettings,
    ) -> anyhow::Result<LoginResponse> {
        let role = UserRole::from_admin_flag(user.is_admin);
        let access_token =
            Self::generate_access_token(user.id, role, &tokens.jwt_secret, tokens.access_ttl)?;
        let (refresh_token, refresh_id) =
            Self::generate_refresh_token(&user.id, &tokens.refresh_secret, tokens.refresh_ttl_days)?;

        let hash = bcrypt::hash(&refresh_token, 8)?;
        let expires_at = Utc::now() + chrono::Duration::days(tokens.refresh_ttl_days as i64);
        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(refresh_id)
        .bind(user.id)
        .bind(hash)
        .bind(expires_at)
        .execute(pool)
        .await?;

        Ok(LoginResponse {
            access_token,
            refresh_token,
            user: user.into(),
        })
    }

    /// Rotate refresh token: revoke old, issue new pair.
    pub async fn refresh(
        pool: &PgPool,
        refresh_token: &str,
        tokens: &TokenSettings,
    ) -> Result<LoginResponse, AppError> {
        let invalid = || AppError::auth("invalid_session", "Session expired. Please log in again.");

        let key = DecodingKey::from_secret(tokens.refresh_secret.as_bytes());
        let data = decode::<RefreshClaims>(refresh_token, &key, &Validation::new(Algorithm::HS256))
            .map_err(|_| invalid())?;
        let jti: Uuid = data.claims.jti.parse().map_err(|_| invalid())?;

        let stored = sqlx::query_as::<_, RefreshToken>(
            "SELECT id, user_id, token_hash, expires_at, revoked, created_at
             FROM refresh_tokens WHERE id = $1 AND revoked = FALSE",
        )
        .bind(jti)
        .fetch_optional(pool)
        .await?
        .ok_or_else(invalid)?;

        if stored.expires_at < Utc::now() {
            return Err(invalid());
        }
        if !bcrypt::verify(refresh_token, &stored.token_hash).unwrap_or(false) {
            return Err(invalid());
        }

        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = $1")
            .bind(jti)
            .execute(pool)
            .await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND is_active = TRUE"
        ))
        .bind(stored.user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| {
            AppError::Authorization("Your account is inactive or removed. Contact admin.".into())
        })?;

        Ok(Self::issue_tokens(pool, user, tokens).await?)
    }

    /// Revokes the refresh token if it decodes; signing out never fails on a bad token.
    pub async fn logout(pool: &PgPool, refresh_token: &str, refresh_secret: &str) -> anyhow::Result<()> {
        let key = DecodingKey::from_secret(refresh_secret.as_bytes());
        let data = decode::<RefreshClaims>(refresh_token, &key, &Validation::new(Algorithm::HS256));

        if let Ok(data) = data {
            let jti: Uuid = data.claims.jti.parse()?;
            sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = $1")
                .bind(jti)
                .execute(pool)
                .await?;
        }
        Ok(())
    }

    /// Current session user. A token whose profile has gone is an authorization failure.
    pub async fn me(pool: &PgPool, user_id: Uuid) -> Result<SessionUser, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND is_active = TRUE"
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .map(SessionUser::from)
        .ok_or_else(|| {
            AppError::Authorization("Your account is inactive or removed. Contact admin.".into())
        })
    }

    /// Mails a reset link if the account exists. Silent otherwise.
    pub async fn request_password_reset(
        pool: &PgPool,
        email_svc: Option<&EmailService>,
        email: &str,
        base_url: &str,
    ) -> anyhow::Result<()> {
        let Some(email_svc) = email_svc else {
            warn!("Password reset requested but SMTP is not configured");
            return Ok(());
        };

        let user: Option<(Uuid, String)> = sqlx::query_as(
            "SELECT id, name FROM users WHERE email = $1 AND is_active = TRUE",
        )
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?;

        if let Some((user_id, name)) = user {
            let token =
                Self::create_email_token(pool, user_id, EmailTokenPurpose::ResetPassword, 1).await?;
            let link = build_link(base_url, "reset-password", &token);
            email_svc
                .send_password_reset(&normalize_email(email), &name, &link)
                .await?;
            info!("Password reset link sent to user {}", user_id);
        }
        Ok(())
    }

    pub async fn reset_password(
        pool: &PgPool,
        token: &str,
        new_password: &str,
        confirm: Option<&str>,
    ) -> Result<(), AppError> {
        validate_new_password(new_password, confirm)?;
        let user_id =
            Self::consume_email_token(pool, token, EmailTokenPurpose::ResetPassword).await?;
        Self::store_password(pool, user_id, new_password).await?;
        info!("Password reset for user {}", user_id);
        Ok(())
    }

    pub async fn change_password(
        pool: &PgPool,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
        confirm: Option<&str>,
    ) -> Result<(), AppError> {
        validate_new_password(new_password, confirm)?;

        let password_hash: String =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1 AND is_active = TRUE")
                .bind(user_id)
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| AppError::Authorization("User not found".into()))?;

        let valid = bcrypt::verify(current_password, &password_hash).unwrap_or(false);
        if !valid {
            return Err(AppError::auth("invalid_credentials", "Current password is incorrect"));
        }

        Self::store_password(pool, user_id, new_password).await?;
        Ok(())
    }

    /// Hashes and stores a new password, then revokes every refresh token to force re-login.
    async fn store_password(pool: &PgPool, user_id: Uuid, password: &str) -> anyhow::Result<()> {
        let hash = bcrypt::hash(password, 12)?;
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(&hash)
            .bind(user_id)
            .execute(pool)
            .await?;
        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn create_email_token(
        pool: &PgPool,
        user_id: Uuid,
        purpose: EmailTokenPurpose,
        ttl_hours: i64,
    ) -> anyhow::Result<String> {
        // Only the newest link of each kind stays valid
        sqlx::query(
            "UPDATE email_tokens SET used = TRUE WHERE user_id = $1 AND purpose = $2 AND used = FALSE",
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .execute(pool)
        .await?;

        let (token, digest) = generate_email_token();
        sqlx::query(
            "INSERT INTO email_tokens (user_id, token_hash, purpose, expires_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(digest)
        .bind(purpose.as_str())
        .bind(Utc::now() + chrono::Duration::hours(ttl_hours))
        .execute(pool)
        .await?;
        Ok(token)
    }

    async fn consume_email_token(
        pool: &PgPool,
        token: &str,
        purpose: EmailTokenPurpose,
    ) -> Result<Uuid, AppError> {
        sqlx::query_scalar::<_, Uuid>(
            "UPDATE email_tokens SET used = TRUE
             WHERE token_hash = $1 AND purpose = $2 AND used = FALSE AND expires_at > NOW()
             RETURNING user_id",
        )
        .bind(hash_email_token(token))
        .bind(purpose.as_str())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| {
            AppError::auth(
                "invalid_token",
                "Invalid or expired link. Please request a new one.",
            )
        })
    }

    /// Creates or promotes the configured admin account at startup.
    pub async fn ensure_admin(pool: &PgPool, email: &str, password: &str) -> anyhow::Result<()> {
        let hash = bcrypt::hash(password, 12)?;
        sqlx::query(
            "INSERT INTO users (email, password_hash, name, phone, is_admin, email_confirmed_at)
             VALUES ($1, $2, 'Admin', '-', TRUE, NOW())
             ON CONFLICT (email) DO UPDATE SET
                 is_admin = TRUE,
                 is_active = TRUE,
                 password_hash = EXCLUDED.password_hash,
                 email_confirmed_at = COALESCE(users.email_confirmed_at, NOW()),
                 updated_at = NOW()",
        )
        .bind(normalize_email(email))
        .bind(hash)
        .execute(pool)
        .await?;
        info!("Admin account ensured for {}", normalize_email(email));
        Ok(())
    }

    /// Grants or revokes the admin role. Returns false if no such account exists.
    pub async fn set_admin(pool: &PgPool, email: &str, is_admin: bool) -> anyhow::Result<bool> {
        let result =
            sqlx::query("UPDATE users SET is_admin = $2, updated_at = NOW() WHERE email = $1")
                .bind(normalize_email(email))
                .bind(is_admin)
                .execute(pool)
                .await?;
        if result.rows_affected() > 0 {
            // outstanding sessions still carry the old role until they refresh
            sqlx::query(
                "UPDATE refresh_tokens SET revoked = TRUE
                 WHERE user_id = (SELECT id FROM users WHERE email = $1)",
            )
            .bind(normalize_email(email))
            .execute(pool)
            .await?;
        }
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::decode_access_token;

    fn sign_up(password: &str, confirm: Option<&str>) -> SignUpRequest {
        SignUpRequest {
            name: "Lakshmi".into(),
            phone: "9876543210".into(),
            email: "lakshmi@example.com".into(),
            password: password.into(),
            confirm_password: confirm.map(String::from),
        }
    }

    #[test]
    fn sign_up_requires_every_field() {
        let mut req = sign_up("secret1", None);
        req.phone = "   ".into();
        assert!(matches!(validate_sign_up(&req), Err(AppError::Validation(_))));
    }

    #[test]
    fn short_password_is_rejected() {
        let err = validate_sign_up(&sign_up("12345", None)).unwrap_err();
        assert!(err.to_string().contains("at least 6"));
        assert!(validate_sign_up(&sign_up("123456", None)).is_ok());
    }

    #[test]
    fn mismatched_confirmation_is_rejected() {
        let err = validate_new_password("secret1", Some("secret2")).unwrap_err();
        assert_eq!(err.to_string(), "Passwords do not match");
        assert!(validate_new_password("secret1", Some("secret1")).is_ok());
    }

    #[test]
    fn emails_are_normalised() {
        assert_eq!(normalize_email("  Ravi@Example.COM "), "ravi@example.com");
    }

    #[test]
    fn email_tokens_are_stored_as_digests() {
        let (token, digest) = generate_email_token();
        assert_eq!(token.len(), 48);
        assert_eq!(digest, hash_email_token(&token));
        assert_ne!(digest, token);
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn links_do_not_double_slash() {
        assert_eq!(
            build_link("https://canteen.example/", "reset-password", "abc"),
            "https://canteen.example/reset-password?token=abc"
        );
    }

    #[test]
    fn access_token_carries_role() {
        let id = Uuid::new_v4();
        let token = AuthService::generate_access_token(id, UserRole::Admin, "s3cret", 60).unwrap();
        let user = decode_access_token(&token, "s3cret").unwrap();
        assert_eq!(user.user_id, id);
        assert!(user.is_admin());
        assert!(decode_access_token(&token, "other").is_err());
    }
}
