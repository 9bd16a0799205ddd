//! Authentication and authorization utilities
//!
//! Provides:
//! - Verification of bearer tokens issued by the auth provider (HS256)
//! - Caller context extraction for handlers
//! - Organization roles and role checks

use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Caller identity available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID from the token subject
    pub user_id: Uuid,

    /// Email claim, when the provider includes one
    pub email: Option<String>,

    /// Request ID for tracing
    pub request_id: String,
}

/// Organization membership role, ordered viewer < editor < admin
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Editor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Editor => "editor",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "viewer" => Some(Role::Viewer),
            "editor" => Some(Role::Editor),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Require at least `required`
    pub fn require(&self, required: Role) -> Result<()> {
        if *self >= required {
            Ok(())
        } else {
            Err(AppError::InsufficientRole {
                required: required.as_str().to_string(),
                actual: self.as_str().to_string(),
            })
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// JWT token verifier
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    audience: Option<String>,
}

impl JwtManager {
    /// Create a manager for the provider's shared secret
    pub fn new(secret: &str, audience: Option<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            audience,
        }
    }

    /// Issue a token; used by tests and local tooling
    pub fn generate_token(&self, user_id: Uuid, email: Option<String>, ttl_secs: i64) -> Result<String> {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: user_id.to_string(),
            exp: (now + Duration::seconds(ttl_secs)).timestamp(),
            iat: now.timestamp(),
            aud: self.audience.clone(),
            email,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            AppError::Internal {
                message: format!("Failed to generate token: {}", e),
            }
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::InvalidToken,
            })
    }

    /// Validate a token and build the caller context
    pub fn authenticate(&self, token: &str, request_id: String) -> Result<AuthContext> {
        let claims = self.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;
        Ok(AuthContext {
            user_id,
            email: claims.email,
            request_id,
        })
    }
}

/// Extract the token from an `Authorization: Bearer` header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<JwtManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Authorization header must be a bearer token".to_string(),
        })?;

        let jwt = Arc::<JwtManager>::from_ref(state);
        let context = jwt.authenticate(token, request_id)?;

        tracing::Span::current().record("user_id", tracing::field::display(context.user_id));
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[derive(Clone)]
    struct TestState {
        jwt: Arc<JwtManager>,
    }

    impl FromRef<TestState> for Arc<JwtManager> {
        fn from_ref(state: &TestState) -> Self {
            state.jwt.clone()
        }
    }

    fn parts(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/v2/plans").header("x-request-id", "req-1");
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::Admin > Role::Editor);
        assert!(Role::Editor > Role::Viewer);
        assert!(Role::Editor.require(Role::Viewer).is_ok());
        assert!(matches!(
            Role::Viewer.require(Role::Editor),
            Err(AppError::InsufficientRole { .. })
        ));
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("owner"), None);
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip_with_audience() {
        let manager = JwtManager::new("test_secret", Some("authenticated".into()));
        let user_id = Uuid::new_v4();

        let token = manager
            .generate_token(user_id, Some("a@b.co".into()), 3600)
            .unwrap();
        let context = manager.authenticate(&token, "r".into()).unwrap();
        assert_eq!(context.user_id, user_id);
        assert_eq!(context.email.as_deref(), Some("a@b.co"));

        let other = JwtManager::new("other_secret", Some("authenticated".into()));
        assert!(matches!(other.validate_token(&token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_expired_token() {
        let manager = JwtManager::new("s", None);
        let token = manager.generate_token(Uuid::new_v4(), None, -3600).unwrap();
        assert!(matches!(manager.validate_token(&token), Err(AppError::ExpiredToken)));
    }

    #[tokio::test]
    async fn test_extractor() {
        let jwt = Arc::new(JwtManager::new("secret", None));
        let user_id = Uuid::new_v4();
        let token = jwt.generate_token(user_id, None, 60).unwrap();
        let state = TestState { jwt };

        let mut ok = parts(Some(&format!("Bearer {}", token)));
        let context = AuthContext::from_request_parts(&mut ok, &state).await.unwrap();
        assert_eq!(context.user_id, user_id);
        assert_eq!(context.request_id, "req-1");

        let mut missing = parts(None);
        assert!(matches!(
            AuthContext::from_request_parts(&mut missing, &state).await,
            Err(AppError::Unauthorized { .. })
        ));
    }
}
