use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Authenticated caller, taken from a verified bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
}

/// Claims issued by the authentication service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

/// HS256 verification key shared by every request.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken,
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("authentication token required")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired, please log in again")]
    Expired,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized", "message": self.to_string() })),
        )
            .into_response()
    }
}

// Bearer token extractor
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = state.jwt.verify(token)?;

        Ok(AuthUser { user_id: claims.id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, exp: usize) -> String {
        let claims = Claims {
            id: 12,
            email: "viewer@example.com".into(),
            role: "user".into(),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn app_state() -> Arc<crate::AppState> {
        let config = crate::config::Config::from_lookup(|name| match name {
            "DATABASE_URL" => Some("postgres://localhost/unused".to_string()),
            "JWT_SECRET" => Some("secret".to_string()),
            "ENABLE_ANALYTICS" | "ENABLE_SEATMAP_CACHE" => Some("false".to_string()),
            _ => None,
        })
        .unwrap();
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy(&config.database.url)
            .unwrap();
        crate::AppState::new(
            config,
            crate::database::Database { pool },
            crate::services::analytics::AnalyticsDispatcher::disabled(),
            crate::cache::SeatMapCache::disabled(),
        )
    }

    fn parts(authorization: Option<String>) -> Parts {
        let mut builder = axum::http::Request::builder();
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn in_one_hour() -> usize {
        (chrono::Utc::now().timestamp() + 3600) as usize
    }

    #[test]
    fn valid_token_yields_claims() {
        let verifier = JwtVerifier::new("secret");
        let claims = verifier.verify(&token("secret", in_one_hour())).unwrap();
        assert_eq!(claims.id, 12);
        assert_eq!(claims.role, "user");
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let verifier = JwtVerifier::new("secret");
        assert_eq!(
            verifier.verify(&token("other", in_one_hour())).unwrap_err(),
            AuthError::InvalidToken
        );
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let verifier = JwtVerifier::new("secret");
        let long_ago = (chrono::Utc::now().timestamp() - 3600) as usize;
        assert_eq!(
            verifier.verify(&token("secret", long_ago)).unwrap_err(),
            AuthError::Expired
        );
    }

    #[tokio::test]
    async fn bearer_header_yields_the_caller_id() {
        let state = app_state();
        let mut parts = parts(Some(format!("Bearer {}", token("secret", in_one_hour()))));

        let user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, 12);
    }

    #[tokio::test]
    async fn missing_or_non_bearer_header_is_rejected() {
        let state = app_state();

        let mut no_header = parts(None);
        assert_eq!(
            AuthUser::from_request_parts(&mut no_header, &state)
                .await
                .unwrap_err(),
            AuthError::MissingToken
        );

        let mut basic = parts(Some("Basic dXNlcjpwYXNz".to_string()));
        assert_eq!(
            AuthUser::from_request_parts(&mut basic, &state)
                .await
                .unwrap_err(),
            AuthError::MissingToken
        );
    }
}
