use axum::{
    extract::{FromRef, FromRequestParts},
    headers::{authorization::Bearer, Authorization},
    http::request::Parts,
    RequestPartsExt, TypedHeader,
};
use tap::TapFallible;

use crate::error::{Error, UnauthorizedType};

use super::token::{decode_access_token, JwtState};

// the verified identity of the caller, extracted from the bearer credential
#[derive(Debug, Clone)]
pub struct Principal {
    pub email: String,
}

impl Principal {
    pub fn from_token(jwt_state: &JwtState, token: &str) -> Result<Self, Error> {
        let token = decode_access_token(jwt_state, token)?;

        if token.claims.is_expired() {
            return Err(Error::Unauthorized(UnauthorizedType::InvalidAccessToken));
        }

        Ok(Self {
            email: token.claims.sub,
        })
    }

    pub fn require_owner(&self, email: &str) -> Result<(), Error> {
        if self.email != email {
            return Err(Error::Forbidden)
                .tap_err(|_| tracing::debug!("principal email does not match requested owner"));
        }

        Ok(())
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Principal
where
    JwtState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(token)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| Error::Unauthorized(UnauthorizedType::MissingCredential))
            .tap_err(|_| tracing::debug!("bearer header not found"))?;

        let jwt = JwtState::from_ref(state);

        Self::from_token(&jwt, token.token())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::extract::FromRequestParts;
    use time::Duration;

    use crate::{
        api::v1::token::{
            current_timestamp, generate_access_token, generate_access_token_with_exp, JwtState,
        },
        error::{Error, UnauthorizedType},
    };

    use super::Principal;

    fn jwt() -> JwtState {
        JwtState::new(b"test-secret")
    }

    #[tokio::test]
    async fn test_principal_from_bearer_header() {
        let jwt = jwt();
        let token = generate_access_token(&jwt, "customer@example.com").unwrap();

        let (mut parts, _) = axum::http::request::Request::get("http://localhost")
            .header("Authorization", format!("Bearer {}", token))
            .body(())
            .unwrap()
            .into_parts();

        let principal = Principal::from_request_parts(&mut parts, &jwt)
            .await
            .unwrap();

        assert_eq!(principal.email, "customer@example.com");
    }

    #[tokio::test]
    async fn test_missing_header() {
        let jwt = jwt();

        let (mut parts, _) = axum::http::request::Request::get("http://localhost")
            .body(())
            .unwrap()
            .into_parts();

        let error = Principal::from_request_parts(&mut parts, &jwt)
            .await
            .unwrap_err();

        assert_matches!(
            error,
            Error::Unauthorized(UnauthorizedType::MissingCredential)
        );
    }

    #[tokio::test]
    async fn test_expired_token() {
        let jwt = jwt();
        let token = generate_access_token_with_exp(
            &jwt,
            "customer@example.com",
            (current_timestamp() + Duration::seconds(-1)).unix_timestamp(),
        )
        .unwrap();

        let error = Principal::from_token(&jwt, &token).unwrap_err();

        assert_matches!(
            error,
            Error::Unauthorized(UnauthorizedType::InvalidAccessToken)
        );
    }

    #[test]
    fn test_require_owner() {
        let principal = Principal {
            email: "a@x.com".to_string(),
        };

        principal.require_owner("a@x.com").unwrap();

        let error = principal.require_owner("b@x.com").unwrap_err();
        assert_matches!(error, Error::Forbidden);
    }
}
