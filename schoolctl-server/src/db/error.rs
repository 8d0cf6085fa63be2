//! Database error type

/// Errors surfaced by the stores and the registration manager
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Primary identity already taken
    #[error("{resource} '{id}' already exists")]
    DuplicateKey { resource: &'static str, id: String },

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    /// Constraint failure reported by a non-SQL store
    #[error("constraint violation: {0}")]
    Constraint(String),
}

impl DbError {
    /// Map a unique violation on a primary identity insert to `DuplicateKey`.
    pub(crate) fn on_identity_insert(
        err: sqlx::Error,
        resource: &'static str,
        id: impl ToString,
    ) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Self::DuplicateKey {
                    resource,
                    id: id.to_string(),
                };
            }
        }
        Self::Sqlx(err)
    }

    pub(crate) fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_stay_generic() {
        let err = DbError::on_identity_insert(sqlx::Error::RowNotFound, "student", "1");
        assert!(matches!(err, DbError::Sqlx(_)));
    }

    #[test]
    fn messages() {
        assert_eq!(
            DbError::not_found("student", "12345678").to_string(),
            "not found: student '12345678'"
        );
        let dup = DbError::DuplicateKey {
            resource: "parent",
            id: "7".into(),
        };
        assert_eq!(dup.to_string(), "parent '7' already exists");
    }
}
