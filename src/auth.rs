use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum_extra::extract::CookieJar;
use chrono::{Duration, Utc};
use derive_new::new;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, TokenData, Validation};
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use snafu::{Location, OptionExt as _, ResultExt as _, Snafu};

use crate::api::ApiError;

/// The signed-in user, as vouched for by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Principal {
    pub email: String,
    pub name: Option<String>,
}

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, new)]
pub struct SessionClaims {
    /// Stable identifier of the principal, their email.
    pub sub: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<SessionClaims> for Principal {
    fn from(claims: SessionClaims) -> Self {
        Principal::new(claims.sub, claims.name)
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AuthError {
    #[snafu(display("request carries no session"))]
    MissingSession {
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("session token is invalid or expired"))]
    Decode {
        source: jsonwebtoken::errors::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("failed to encode session token"))]
    Encode {
        source: jsonwebtoken::errors::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(rename = "session_secret")]
    pub secret: String,
    #[serde(rename = "session_cookie", default = "default_cookie")]
    pub cookie: String,
}

fn default_cookie() -> String {
    "session".to_string()
}

/// Verifies HS256 session tokens issued by the identity provider.
#[derive(Debug, Clone)]
pub struct Authenticator {
    secret: SecretString,
    algorithm: Algorithm,
    validation: Validation,
    cookie: String,
}

impl Authenticator {
    pub fn new(secret: SecretString, cookie: impl Into<String>) -> Self {
        let algorithm = Algorithm::HS256;

        Authenticator {
            secret,
            algorithm,
            validation: Validation::new(algorithm),
            cookie: cookie.into(),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(SecretString::new(config.secret.clone()), config.cookie.clone())
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.secret.expose_secret().as_bytes())
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.secret.expose_secret().as_bytes())
    }

    pub fn decode(&self, token: &str) -> Result<TokenData<SessionClaims>, AuthError> {
        jsonwebtoken::decode(token, &self.decoding_key(), &self.validation).context(DecodeSnafu)
    }

    pub fn encode(&self, claims: &SessionClaims) -> Result<String, AuthError> {
        let header = jsonwebtoken::Header::new(self.algorithm);
        jsonwebtoken::encode(&header, claims, &self.encoding_key()).context(EncodeSnafu)
    }

    /// Mints a session token for `principal` that stays valid for `ttl`.
    pub fn issue(&self, principal: &Principal, ttl: Duration) -> Result<String, AuthError> {
        let claims = SessionClaims::new(
            principal.email.clone(),
            (Utc::now() + ttl).timestamp(),
            principal.name.clone(),
        );
        self.encode(&claims)
    }

    /// Finds the session token, preferring the `Authorization: Bearer` header over the session cookie.
    pub fn extract_token(&self, headers: &HeaderMap) -> Option<String> {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string);

        bearer.or_else(|| {
            CookieJar::from_headers(headers)
                .get(&self.cookie)
                .map(|cookie| cookie.value().to_string())
        })
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = self.extract_token(headers).context(MissingSessionSnafu)?;
        let TokenData { claims, .. } = self.decode(&token)?;
        Ok(claims.into())
    }
}

/// Extractor for handlers that need a signed-in principal. Rejects the request with 401 otherwise.
#[derive(Debug, Clone)]
pub struct Session(pub Principal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
    Authenticator: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let authenticator = Authenticator::from_ref(state);

        match authenticator.authenticate(&parts.headers) {
            Ok(principal) => Ok(Session(principal)),
            Err(source) => {
                tracing::debug!(error = %source, "rejected unauthenticated request");
                Err(ApiError::Unauthenticated { source })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn authenticator() -> Authenticator {
        Authenticator::new(SecretString::new("test-secret".into()), "session")
    }

    fn ada() -> Principal {
        Principal::new("ada@example.com".into(), Some("Ada".into()))
    }

    fn headers(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_yields_the_principal() {
        let auth = authenticator();
        let token = auth.issue(&ada(), Duration::hours(1)).unwrap();

        let principal = auth
            .authenticate(&headers(header::AUTHORIZATION, &format!("Bearer {token}")))
            .unwrap();

        assert_eq!(principal, ada());
    }

    #[test]
    fn session_cookie_is_accepted() {
        let auth = authenticator();
        let token = auth.issue(&ada(), Duration::hours(1)).unwrap();

        let principal = auth
            .authenticate(&headers(header::COOKIE, &format!("theme=dark; session={token}")))
            .unwrap();

        assert_eq!(principal.email, "ada@example.com");
    }

    #[test]
    fn missing_session_is_rejected() {
        let result = authenticator().authenticate(&HeaderMap::new());
        assert!(matches!(result, Err(AuthError::MissingSession { .. })), "{result:?}");
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = authenticator();
        let token = auth.issue(&ada(), Duration::hours(-2)).unwrap();

        let result = auth.authenticate(&headers(header::AUTHORIZATION, &format!("Bearer {token}")));
        assert!(matches!(result, Err(AuthError::Decode { .. })), "{result:?}");
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let foreign = Authenticator::new(SecretString::new("other-secret".into()), "session");
        let token = foreign.issue(&ada(), Duration::hours(1)).unwrap();

        let result = authenticator().authenticate(&headers(header::AUTHORIZATION, &format!("Bearer {token}")));
        assert!(matches!(result, Err(AuthError::Decode { .. })), "{result:?}");
    }
}
