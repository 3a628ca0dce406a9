//! JWT session tokens and the cookie that carries them.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{
    api::models::users::{CurrentUser, Role},
    config::Config,
    errors::Error,
    types::UserId,
};

/// JWT session claims
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl SessionClaims {
    pub fn new(user: &CurrentUser, config: &Config) -> Self {
        let now = Utc::now();
        let exp = now + config.auth.security.jwt_expiry;

        Self {
            sub: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            role: user.role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

impl From<SessionClaims> for CurrentUser {
    fn from(claims: SessionClaims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            username: claims.username,
            role: claims.role,
            display_name: None, // not carried in the token
        }
    }
}

fn secret_key(config: &Config) -> Result<&[u8], Error> {
    config
        .secret_key
        .as_deref()
        .map(str::as_bytes)
        .ok_or_else(|| Error::Internal {
            operation: "JWT sessions: secret_key is required".to_string(),
        })
}

/// Create a JWT token for a user session
pub fn create_session_token(user: &CurrentUser, config: &Config) -> Result<String, Error> {
    let claims = SessionClaims::new(user, config);
    let key = EncodingKey::from_secret(secret_key(config)?);
    encode(&Header::default(), &claims, &key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })
}

/// Verify and decode a JWT session token
pub fn verify_session_token(token: &str, config: &Config) -> Result<CurrentUser, Error> {
    let key = DecodingKey::from_secret(secret_key(config)?);

    let token_data = decode::<SessionClaims>(token, &key, &Validation::default()).map_err(|e| match e.kind() {
        // Bad or stale tokens are the client's problem
        ErrorKind::InvalidToken
        | ErrorKind::InvalidSignature
        | ErrorKind::ExpiredSignature
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::ImmatureSignature
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::InvalidAlgorithm => Error::Unauthenticated { message: None },
        _ => Error::Internal {
            operation: format!("JWT verification: {e}"),
        },
    })?;

    Ok(CurrentUser::from(token_data.claims))
}

/// `Set-Cookie` value carrying a fresh session token
pub fn session_cookie(token: &str, config: &Config) -> String {
    let session = &config.auth.native.session;
    let secure = if session.cookie_secure { "; Secure" } else { "" };

    format!(
        "{}={}; Path=/; HttpOnly; SameSite={}; Max-Age={}{}",
        session.cookie_name,
        token,
        session.cookie_same_site,
        config.auth.security.jwt_expiry.as_secs(),
        secure
    )
}

/// `Set-Cookie` value that expires the session cookie
pub fn clear_session_cookie(config: &Config) -> String {
    let session = &config.auth.native.session;
    format!(
        "{}=; Path=/; HttpOnly; SameSite={}; Max-Age=0",
        session.cookie_name, session.cookie_same_site
    )
}

/// `Set-Cookie` value remembering the affiliate code a visitor arrived through
pub fn referral_cookie(code: &str, config: &Config) -> String {
    let monetization = &config.monetization;
    let secure = if config.auth.native.session.cookie_secure { "; Secure" } else { "" };
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=lax; Max-Age={}{}",
        monetization.referral_cookie_name,
        code,
        monetization.referral_cookie_ttl.as_secs(),
        secure
    )
}

/// Find a cookie by name in a `Cookie` header value.
pub fn find_cookie<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header
        .split(';')
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(cookie_name, _)| *cookie_name == name)
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_config;
    use uuid::Uuid;

    fn test_user() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "writer@example.com".to_string(),
            username: "writer".to_string(),
            role: Role::Creator,
            display_name: Some("A Writer".to_string()),
        }
    }

    #[test]
    fn test_create_and_verify_session_token() {
        let config = create_test_config();
        let user = test_user();

        let token = create_session_token(&user, &config).unwrap();
        let verified = verify_session_token(&token, &config).unwrap();

        assert_eq!(verified.id, user.id);
        assert_eq!(verified.email, user.email);
        assert_eq!(verified.username, user.username);
        assert_eq!(verified.role, Role::Creator);
    }

    #[test]
    fn test_verify_token_wrong_secret() {
        let mut config = create_test_config();
        let token = create_session_token(&test_user(), &config).unwrap();

        config.secret_key = Some("different-secret".to_string());
        let result = verify_session_token(&token, &config);
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[test]
    fn test_verify_expired_token() {
        let config = create_test_config();
        let user = test_user();
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user.id,
            email: user.email,
            username: user.username,
            role: user.role,
            exp: (now - chrono::Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
        };
        let key = EncodingKey::from_secret(config.secret_key.as_ref().unwrap().as_bytes());
        let token = encode(&Header::default(), &claims, &key).unwrap();

        let result = verify_session_token(&token, &config);
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[test]
    fn test_verify_malformed_token() {
        let config = create_test_config();
        for token in ["not.a.token", "invalid", "", "too.many.parts.in.this.token"] {
            let result = verify_session_token(token, &config);
            assert!(
                matches!(result, Err(Error::Unauthenticated { .. })),
                "Expected Unauthenticated error for token: {token}"
            );
        }
    }

    #[test]
    fn test_session_cookie_attributes() {
        let mut config = create_test_config();
        config.auth.native.session.cookie_secure = true;

        let cookie = session_cookie("abc", &config);
        assert!(cookie.starts_with("letterbox_session=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.ends_with("; Secure"));

        assert!(clear_session_cookie(&config).contains("Max-Age=0"));
    }

    #[test]
    fn test_find_cookie() {
        let header = "theme=dark; letterbox_session=tok.en.value; referral_code=SPRING";
        assert_eq!(find_cookie(header, "letterbox_session"), Some("tok.en.value"));
        assert_eq!(find_cookie(header, "referral_code"), Some("SPRING"));
        assert_eq!(find_cookie(header, "missing"), None);
    }

    #[test]
    fn test_referral_cookie_lasts_a_day() {
        let config = create_test_config();
        let cookie = referral_cookie("SPRING24", &config);
        assert!(cookie.starts_with("referral_code=SPRING24;"));
        assert!(cookie.contains("Max-Age=86400"));
    }
}
