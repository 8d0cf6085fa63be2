//! Custom Axum extractors

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;

use super::error::ApiError;
use crate::models::{ParentDni, StudentDni, ValidationError};

/// Extract and validate a student DNI from path
pub struct ValidStudentDni(pub StudentDni);

impl<S> FromRequestParts<S> for ValidStudentDni
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(dni): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Validation(ValidationError::Empty { field: "dni" }))?;

        Ok(Self(StudentDni::new(&dni)?))
    }
}

/// Extract and validate a parent DNI from path
pub struct ValidParentDni(pub ParentDni);

impl<S> FromRequestParts<S> for ValidParentDni
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(dni): Path<String> = Path::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Validation(ValidationError::Empty { field: "dni" }))?;

        let value = dni.parse::<i64>().map_err(|_| {
            ApiError::Validation(ValidationError::InvalidFormat {
                field: "DNI_padre",
                reason: "must be an integer",
            })
        })?;

        Ok(Self(ParentDni::new(value)?))
    }
}
