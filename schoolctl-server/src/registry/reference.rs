//! Get-or-create for shared reference rows

use crate::db::{DbError, RegistryTx};
use crate::models::{RefKind, RefName};

/// Outcome of [`get_or_create`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub id: i32,
    /// True if this transaction inserted the row
    pub created: bool,
}

/// Resolve a place or occupation by exact name, inserting it on a miss.
///
/// Runs inside the caller's transaction. The insert is conflict-tolerant:
/// if a concurrent transaction commits the same name between the lookup and
/// the insert, the insert yields nothing and the committed row is selected.
pub async fn get_or_create(
    tx: &mut dyn RegistryTx,
    kind: RefKind,
    name: &RefName,
) -> Result<Resolved, DbError> {
    if let Some(id) = tx.find_reference(kind, name).await? {
        return Ok(Resolved { id, created: false });
    }

    if let Some(id) = tx.insert_reference(kind, name).await? {
        tracing::debug!(kind = %kind, id, name = name.as_str(), "reference created");
        return Ok(Resolved { id, created: true });
    }

    let id = tx.find_reference(kind, name).await?.ok_or_else(|| {
        DbError::Constraint(format!(
            "{} '{}' conflicted on insert but is not visible",
            kind,
            name.as_str()
        ))
    })?;
    tracing::debug!(kind = %kind, id, "reference created concurrently, reusing");
    Ok(Resolved { id, created: false })
}
