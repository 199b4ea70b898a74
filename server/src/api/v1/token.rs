use jsonwebtoken::TokenData;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::error::Error;

// verification only needs the shared secret; encoding is kept for tests
// and local tooling
#[derive(Clone)]
pub struct JwtState {
    validation: jsonwebtoken::Validation,
    header: jsonwebtoken::Header,

    encoding_key: jsonwebtoken::EncodingKey,
    decoding_key: jsonwebtoken::DecodingKey,
}

impl JwtState {
    pub fn new(secret: &[u8]) -> Self {
        let encoding_key = jsonwebtoken::EncodingKey::from_secret(secret);
        let decoding_key = jsonwebtoken::DecodingKey::from_secret(secret);

        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256);
        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            header,
            validation,

            encoding_key,
            decoding_key,
        }
    }

    pub fn new_from_env() -> Self {
        let secret_key = std::env::var("JWT_SECRET_KEY")
            .expect("Cannot retreive JWT_SECRET_KEY from environment variable.");

        Self::new(secret_key.as_bytes())
    }
}

pub fn current_timestamp() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub exp: i64,
}

impl AccessTokenClaims {
    pub fn is_expired(&self) -> bool {
        self.exp < current_timestamp().unix_timestamp()
    }
}

pub fn generate_access_token(jwt_state: &JwtState, email: &str) -> Result<String, Error> {
    let expired_at = current_timestamp() + Duration::minutes(10);

    generate_access_token_with_exp(jwt_state, email, expired_at.unix_timestamp())
}

pub fn generate_access_token_with_exp(
    jwt_state: &JwtState,
    email: &str,
    exp: i64,
) -> Result<String, Error> {
    jsonwebtoken::encode(
        &jwt_state.header,
        &AccessTokenClaims {
            sub: email.to_string(),
            exp,
        },
        &jwt_state.encoding_key,
    )
    .map_err(Into::into)
}

pub fn decode_access_token(
    jwt_state: &JwtState,
    token: &str,
) -> Result<TokenData<AccessTokenClaims>, Error> {
    jsonwebtoken::decode(token, &jwt_state.decoding_key, &jwt_state.validation)
        .map_err(|_| Error::Unauthorized(crate::error::UnauthorizedType::InvalidAccessToken))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt() -> JwtState {
        JwtState::new(b"test-secret")
    }

    #[test]
    pub fn test_access_token() {
        let jwt = jwt();

        let token = generate_access_token(&jwt, "rider@example.com").unwrap();

        let token = decode_access_token(&jwt, &token).unwrap();
        assert_eq!(token.claims.sub, "rider@example.com");
        assert!(!token.claims.is_expired());
    }

    #[test]
    pub fn test_expired_access_token() {
        let jwt = jwt();

        let token = generate_access_token_with_exp(
            &jwt,
            "rider@example.com",
            (current_timestamp() + Duration::seconds(-1)).unix_timestamp(),
        )
        .unwrap();

        let token = decode_access_token(&jwt, &token).unwrap();

        assert!(token.claims.is_expired());
    }

    #[test]
    pub fn test_garbage_token() {
        let jwt = jwt();

        let error = decode_access_token(&jwt, "not-a-token").unwrap_err();
        assert!(matches!(
            error,
            crate::error::Error::Unauthorized(crate::error::UnauthorizedType::InvalidAccessToken)
        ));
    }
}
