use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::error::AppError;
use crate::models::auth::{AdminUser, AuthenticatedUser, Claims};

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::auth("unauthorized", "Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::auth("unauthorized", "Invalid Authorization header format"))?;

        let secret = parts
            .extensions
            .get::<JwtSecret>()
            .ok_or_else(|| anyhow::anyhow!("JWT secret not configured"))?;

        decode_access_token(token, &secret.0)
            .map_err(|_| AppError::auth("unauthorized", "Invalid or expired token"))
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Authorization("Admin access required".into()));
        }
        Ok(AdminUser(user))
    }
}

/// Extension type to carry the JWT secret through request extensions.
#[derive(Clone)]
pub struct JwtSecret(pub String);

pub fn decode_access_token(token: &str, secret: &str) -> Result<AuthenticatedUser, anyhow::Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let data = decode::<Claims>(token, &key, &validation)?;
    let claims = data.claims;

    Ok(AuthenticatedUser {
        user_id: claims.sub.parse()?,
        role: claims.role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::user::UserRole, services::auth::AuthService};
    use axum::http::{Request, StatusCode};
    use uuid::Uuid;

    const SECRET: &str = "test-secret";

    fn parts_with(token: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/today");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        parts.extensions.insert(JwtSecret(SECRET.into()));
        parts
    }

    fn token(role: UserRole) -> String {
        AuthService::generate_access_token(Uuid::new_v4(), role, SECRET, 300).unwrap()
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let mut parts = parts_with(None);
        let err = AuthenticatedUser::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn user_token_is_accepted_but_not_as_admin() {
        let t = token(UserRole::User);
        let mut parts = parts_with(Some(&t));
        let user = AuthenticatedUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(!user.is_admin());

        let mut parts = parts_with(Some(&t));
        let err = AdminUser::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_token_passes_admin_guard() {
        let t = token(UserRole::Admin);
        let mut parts = parts_with(Some(&t));
        let AdminUser(user) = AdminUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let mut parts = parts_with(Some("not.a.jwt"));
        let err = AuthenticatedUser::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "unauthorized");
    }
}
