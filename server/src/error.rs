use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::lifecycle::TransitionError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid id")]
    InvalidId,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{0}")]
    Unauthorized(UnauthorizedType),

    #[error("You have no permission to access this resource")]
    Forbidden,

    #[error("{0}")]
    InvalidTransition(#[from] TransitionError),

    #[error("database operation failed")]
    DatabaseError(#[from] mongodb::error::Error),

    #[error("token signing failed")]
    JWTError(#[from] jsonwebtoken::errors::Error),

    #[error("payment provider request failed")]
    ChargeError(#[from] reqwest::Error),

    #[error("timestamp formatting failed")]
    TimeFormatError(#[from] time::error::Format),

    #[error("serialization failed")]
    BSONSerError(#[from] bson::ser::Error),

    #[error("deserialization failed")]
    BSONDeError(#[from] bson::de::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum UnauthorizedType {
    #[error("Missing bearer credential")]
    MissingCredential,

    #[error("Invalid access token")]
    InvalidAccessToken,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<serde_json::Value>,
    r#type: String,
    message: String,
}

impl From<Error> for ErrorJson {
    fn from(err: Error) -> Self {
        let message = err.to_string();

        let r#type = err.to_string_variant();

        let errors = match err {
            Error::ValidationError(err) => serde_json::to_value(err).ok(),
            Error::NotFound(..)
            | Error::InvalidId
            | Error::MissingField(..)
            | Error::Unauthorized(..)
            | Error::Forbidden
            | Error::InvalidTransition(..)
            | Error::DatabaseError(..)
            | Error::JWTError(..)
            | Error::ChargeError(..)
            | Error::TimeFormatError(..)
            | Error::BSONSerError(..)
            | Error::BSONDeError(..) => None,
        };

        Self {
            errors,
            message,
            r#type,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("error: {:?}", self);
        let status = match self {
            Self::Unauthorized(..) => StatusCode::UNAUTHORIZED,
            Self::ValidationError(..) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidId | Self::MissingField(..) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(..) => StatusCode::NOT_FOUND,
            Self::InvalidTransition(..) => StatusCode::CONFLICT,
            Self::DatabaseError(..)
            | Self::JWTError(..)
            | Self::ChargeError(..)
            | Self::TimeFormatError(..)
            | Self::BSONSerError(..)
            | Self::BSONDeError(..) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let error = ErrorJson::from(self);

        (status, Json(error)).into_response()
    }
}

impl Error {
    pub fn to_string_variant(&self) -> String {
        macro_rules! match_var {
            ($id:ident !) => {
                Self::$id
            };
            ($id:ident (..)) => {
                Self::$id(..)
            };
            ($id:ident {..}) => {
                Self::$id { .. }
            };
        }

        macro_rules! variant {
            ($($name:ident $tt:tt),+) => {
                match self {
                    $(
                        match_var!($name $tt) => {
                            stringify!($name)
                       }
                    )+
                }
            };
        }

        variant! {
            ValidationError(..),
            NotFound(..),
            InvalidId!,
            MissingField(..),
            Unauthorized(..),
            Forbidden!,
            InvalidTransition(..),
            DatabaseError(..),
            JWTError(..),
            ChargeError(..),
            TimeFormatError(..),
            BSONSerError(..),
            BSONDeError(..)
        }
        .to_string()
    }
}

impl From<axum::extract::rejection::PathRejection> for Error {
    fn from(_value: axum::extract::rejection::PathRejection) -> Self {
        Self::InvalidId
    }
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;

    use super::*;

    #[test]
    fn test_variant_names() {
        assert_eq!(Error::Forbidden.to_string_variant(), "Forbidden");
        assert_eq!(
            Error::NotFound("parcel").to_string_variant(),
            "NotFound"
        );
        assert_eq!(
            Error::Unauthorized(UnauthorizedType::MissingCredential).to_string_variant(),
            "Unauthorized"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::NotFound("parcel").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::InvalidId.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::InvalidTransition(TransitionError::AlreadyPaid)
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_upstream_errors_stay_generic() {
        // u64::MAX does not fit a BSON 64-bit integer
        let ser = bson::to_bson(&u64::MAX).unwrap_err();
        let error = Error::BSONSerError(ser);

        assert_eq!(error.to_string(), "serialization failed");
    }
}
