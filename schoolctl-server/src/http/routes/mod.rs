//! Route handlers organized by resource

pub mod health;
pub mod students;
pub mod parents;
pub mod catalog;

/// Treat blank optional strings as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

