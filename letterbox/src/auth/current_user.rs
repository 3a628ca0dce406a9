use crate::{
    AppState,
    api::models::users::{CurrentUser, Role},
    auth::session,
    config::Config,
    db::{
        errors::DbError,
        handlers::{Repository, Users},
        models::users::UserCreateDBRequest,
    },
    errors::{Error, Result},
};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use sqlx::PgPool;
use tracing::{debug, instrument, trace};

/// Extract user from JWT session cookie if present and valid
/// Returns:
/// - None: No session cookie present
/// - Some(Ok(user)): Valid JWT found and verified
/// - Some(Err(error)): Cookie present but the token is invalid or expired
#[instrument(skip(parts, config))]
fn try_jwt_session_auth(parts: &Parts, config: &Config) -> Option<Result<CurrentUser>> {
    let cookie_header = parts.headers.get(axum::http::header::COOKIE)?;

    let cookie_str = match cookie_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid cookie header: {e}"),
            }));
        }
    };

    let token = session::find_cookie(cookie_str, &config.auth.native.session.cookie_name)?;
    Some(session::verify_session_token(token, config))
}

/// Extract user from proxy header if present and valid
/// Returns:
/// - None: No proxy header present, or unknown user with auto-creation disabled
/// - Some(Ok(user)): Header present and user found or created
/// - Some(Err(error)): Header present but user lookup/creation failed
#[instrument(skip(parts, config, db))]
async fn try_proxy_header_auth(parts: &Parts, config: &Config, db: &PgPool) -> Option<Result<CurrentUser>> {
    let user_email = parts
        .headers
        .get(&config.auth.proxy_header.header_name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|email| !email.is_empty())?;

    let mut conn = match db.acquire().await {
        Ok(conn) => conn,
        Err(e) => return Some(Err(DbError::from(e).into())),
    };
    let mut user_repo = Users::new(&mut conn);

    match user_repo.get_user_by_email(user_email).await {
        Ok(Some(user)) => Some(Ok(CurrentUser::from(user))),
        Ok(None) if config.auth.proxy_header.auto_create_users => {
            let create_request = UserCreateDBRequest {
                username: user_email.to_string(),
                email: user_email.to_string(),
                display_name: None,
                role: Role::Creator,
                auth_source: "proxy-header".to_string(),
                password_hash: None,
            };

            Some(
                user_repo
                    .create(&create_request)
                    .await
                    .map(CurrentUser::from)
                    .map_err(Error::Database),
            )
        }
        Ok(None) => None,
        Err(e) => Some(Err(Error::Database(e))),
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // Each method returns Option<Result<CurrentUser>>; the first success wins, so a stale
        // session cookie does not block a valid proxy header.
        let mut auth_errors = Vec::new();

        if state.config.auth.native.enabled {
            match try_jwt_session_auth(parts, &state.config) {
                Some(Ok(user)) => {
                    debug!("Found JWT session authenticated user: {}", user.id);
                    return Ok(user);
                }
                Some(Err(e)) => {
                    trace!("JWT session authentication failed: {:?}", e);
                    auth_errors.push(("JWT session", e));
                }
                None => trace!("No JWT session authentication attempted"),
            }
        }

        if state.config.auth.proxy_header.enabled {
            match try_proxy_header_auth(parts, &state.config, &state.db).await {
                Some(Ok(user)) => {
                    debug!("Found proxy header authenticated user: {}", user.id);
                    return Ok(user);
                }
                Some(Err(e)) => {
                    trace!("Proxy header authentication failed: {:?}", e);
                    auth_errors.push(("Proxy header", e));
                }
                None => trace!("No proxy header authentication attempted"),
            }
        }

        // Infrastructure failures surface as such rather than as a 401
        if let Some(pos) = auth_errors.iter().position(|(_, e)| matches!(e, Error::Database(_) | Error::Internal { .. })) {
            let (_, error) = auth_errors.swap_remove(pos);
            return Err(error);
        }

        trace!("All authentication attempts failed ({}): {:?}", auth_errors.len(), auth_errors);
        Err(Error::Unauthenticated { message: None })
    }
}

/// `Option<CurrentUser>` for routes open to anonymous callers: missing or rejected credentials
/// become `None`, infrastructure failures still fail the request.
impl OptionalFromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Option<Self>> {
        match <CurrentUser as FromRequestParts<AppState>>::from_request_parts(parts, state).await {
            Ok(user) => Ok(Some(user)),
            Err(Error::Unauthenticated { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::users::{CurrentUser, Role},
        auth::session,
        db::handlers::Users,
        test_utils::{create_test_config, create_test_state, create_test_user},
    };
    use axum::{extract::FromRequestParts as _, http::request::Parts};
    use sqlx::PgPool;

    fn parts_with_header(header_name: &str, header_value: &str) -> Parts {
        let request = axum::http::Request::builder()
            .uri("http://localhost/test")
            .header(header_name, header_value)
            .body(())
            .unwrap();
        request.into_parts().0
    }

    fn proxy_config() -> crate::config::Config {
        let mut config = create_test_config();
        config.auth.proxy_header.enabled = true;
        config
    }

    #[tokio::test]
    async fn test_missing_credentials_are_unauthorized() {
        let state = create_test_state(proxy_config());
        let mut parts = axum::http::Request::builder()
            .uri("http://localhost/test")
            .body(())
            .unwrap()
            .into_parts()
            .0;

        let error = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(error.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_session_cookie_needs_no_database() {
        let config = create_test_config();
        let user = CurrentUser {
            id: uuid::Uuid::new_v4(),
            username: "brand".to_string(),
            email: "brand@example.com".to_string(),
            role: Role::Brand,
            display_name: None,
        };
        let token = session::create_session_token(&user, &config).unwrap();
        let cookie = format!("theme=dark; {}={}", config.auth.native.session.cookie_name, token);
        let state = create_test_state(config);

        let mut parts = parts_with_header("cookie", &cookie);
        let extracted = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(extracted.id, user.id);
        assert_eq!(extracted.role, Role::Brand);
    }

    #[tokio::test]
    async fn test_invalid_cookie_is_unauthorized() {
        let config = create_test_config();
        let cookie = format!("{}=garbage", config.auth.native.session.cookie_name);
        let state = create_test_state(config);

        let mut parts = parts_with_header("cookie", &cookie);
        let error = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(error.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_optional_extraction_treats_bad_credentials_as_anonymous() {
        use axum::extract::OptionalFromRequestParts;

        let config = create_test_config();
        let cookie = format!("{}=garbage", config.auth.native.session.cookie_name);
        let state = create_test_state(config);

        let mut parts = parts_with_header("cookie", &cookie);
        let extracted = <CurrentUser as OptionalFromRequestParts<crate::AppState>>::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(extracted.is_none());
    }

    #[sqlx::test]
    async fn test_existing_user_via_proxy_header(pool: PgPool) {
        let state = crate::AppState::builder().db(pool.clone()).config(proxy_config()).build();
        let test_user = create_test_user(&pool, Role::Brand).await;

        let mut parts = parts_with_header("x-letterbox-user", &test_user.email);
        let current_user = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(current_user.id, test_user.id);
        assert_eq!(current_user.role, Role::Brand);
    }

    #[sqlx::test]
    async fn test_auto_create_unknown_user_as_creator(pool: PgPool) {
        let state = crate::AppState::builder().db(pool.clone()).config(proxy_config()).build();
        let new_email = "newwriter@example.com";

        let mut parts = parts_with_header("x-letterbox-user", new_email);
        let current_user = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(current_user.email, new_email);
        assert_eq!(current_user.role, Role::Creator);

        let mut conn = pool.acquire().await.unwrap();
        let db_user = Users::new(&mut conn).get_user_by_email(new_email).await.unwrap().unwrap();
        assert_eq!(db_user.auth_source, "proxy-header");
    }
}
