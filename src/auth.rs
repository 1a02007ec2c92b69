use std::{sync::Arc, time::Duration};

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts, Request},
    http::{HeaderMap, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, ConfigError},
    envelope::ApiResponse,
    error::AppError,
    models::User,
    repository::{Repository, RepositoryState},
};

/// Claims
///
/// The payload signed into every credential. `id` is the identity the token was
/// issued for; `exp` is checked on every authenticated request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub id: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// TokenIssuer
///
/// Owns the HMAC key pair derived from `JWT_SECRET`. It is built once at startup and
/// shared through `AppState`, so the signing key is never read from the process
/// environment at request time.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

/// TokenState
///
/// The shared handle the gates pull out of the application state.
pub type TokenState = Arc<TokenIssuer>;

impl TokenIssuer {
    pub fn new(secret: &str, lifetime: Duration) -> Result<Self, ConfigError> {
        if secret.trim().is_empty() {
            return Err(ConfigError::MissingVar("JWT_SECRET"));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // An expired credential is rejected at its expiry instant, not a minute later.
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Self::new(&config.jwt_secret, config.token_lifetime)
    }

    /// Signs a credential for `id`, valid from now until now + lifetime.
    pub fn issue(&self, id: Uuid) -> Result<String, jsonwebtoken::errors::Error> {
        let iat = Utc::now().timestamp();
        let lifetime = i64::try_from(self.lifetime.as_secs()).unwrap_or(i64::MAX);
        self.sign(&Claims {
            id,
            iat,
            exp: iat.saturating_add(lifetime),
        })
    }

    /// Signs arbitrary claims with the process key. `issue` is the normal entry point;
    /// this exists for callers that need to control the timestamps.
    pub fn sign(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
    }

    /// Checks signature and expiry and returns the embedded claims.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }
}

/// AuthRejection
///
/// Why a request was turned away by one of the gates. Every variant is answered with
/// 401 and an error envelope; none of them is fatal to the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// No `Authorization` header, or one that does not use the Bearer scheme.
    MissingToken,
    /// Bad signature, malformed or expired token, or an identity that no longer exists.
    TokenFailed,
    /// Authenticated, but not an administrator.
    NotAdmin,
}

impl AuthRejection {
    pub fn message(self) -> &'static str {
        match self {
            AuthRejection::MissingToken => "Not authorized, no token",
            AuthRejection::TokenFailed => "Not authorized, token failed",
            AuthRejection::NotAdmin => "Not authorized as an admin",
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        ApiResponse::failure(StatusCode::UNAUTHORIZED, self.message()).into_response()
    }
}

/// AuthUser
///
/// The identity resolved by the Authentication Gate. Handlers on authenticated and
/// admin routes take it as an argument to learn who is calling.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser(pub User);

/// AdminUser
///
/// An `AuthUser` that also passed the Authorization Gate.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminUser(pub User);

/// The outcome of the Authentication Gate.
pub type AuthResult = Result<AuthUser, AuthRejection>;

/// Pulls the credential out of the `Authorization` header.
///
/// Anything that is not a Bearer header counts as "no token". A Bearer header with
/// nothing after the scheme is a failed token, not a missing one.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthRejection> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthRejection::MissingToken)?;

    let rest = value
        .strip_prefix("Bearer")
        .ok_or(AuthRejection::MissingToken)?;

    match rest.split_whitespace().next() {
        Some(token) if rest.starts_with(char::is_whitespace) => Ok(token),
        _ => Err(AuthRejection::TokenFailed),
    }
}

/// authenticate
///
/// The Authentication Gate proper: header, signature, expiry, then one identity
/// lookup. Returned as a value so callers other than the extractor can use it.
pub async fn authenticate(
    headers: &HeaderMap,
    tokens: &TokenIssuer,
    repo: &dyn Repository,
) -> AuthResult {
    let token = bearer_token(headers)?;

    let claims = tokens.verify(token).map_err(|e| {
        tracing::warn!("credential rejected: {:?}", e.kind());
        AuthRejection::TokenFailed
    })?;

    match repo.find_user(claims.id).await {
        Ok(Some(user)) => Ok(AuthUser(user)),
        Ok(None) => {
            tracing::warn!("credential for unknown identity {}", claims.id);
            Err(AuthRejection::TokenFailed)
        }
        Err(e) => {
            tracing::error!("identity lookup failed: {:?}", e);
            Err(AuthRejection::TokenFailed)
        }
    }
}

/// authorize
///
/// The Authorization Gate: a pure check of the role flag.
pub fn authorize(user: &User) -> Result<(), AuthRejection> {
    if user.is_admin {
        Ok(())
    } else {
        Err(AuthRejection::NotAdmin)
    }
}

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument. When `auth_middleware` (or
/// `admin_middleware`) already resolved the identity for this request it is reused
/// from the request extensions, so a request triggers at most one identity lookup.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenState: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let tokens = TokenState::from_ref(state);
        authenticate(&parts.headers, &tokens, repo.as_ref()).await
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenState: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if let Err(rejection) = authorize(&user) {
            tracing::warn!("non-admin {} refused on {}", user.id, parts.uri.path());
            return Err(rejection);
        }
        Ok(AdminUser(user))
    }
}

/// auth_middleware
///
/// Guards the authenticated router. If the `AuthUser` extractor rejects, the
/// handler never runs; otherwise the identity is attached to the request.
pub async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// admin_middleware
///
/// Guards the admin router: authentication first, then the role check.
pub async fn admin_middleware(
    AdminUser(user): AdminUser,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(AuthUser(user));
    next.run(request).await
}

// --- Password hashing ---

/// Hashes a password into an Argon2id PHC string on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    })
    .await
    .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
    .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Checks a password against a stored PHC string on the blocking pool.
pub async fn verify_password(password: String, password_hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&password_hash)?;
        Ok::<bool, argon2::password_hash::Error>(
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
        )
    })
    .await
    .map_err(|e| AppError::Internal(format!("verification task failed: {e}")))?
    .map_err(|e| AppError::Internal(format!("stored password hash is unreadable: {e}")))
}
