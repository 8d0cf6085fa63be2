//! Registration transaction manager
//!
//! Creates, updates and deletes students and parents together with their
//! dependent rows. Every operation runs in one store transaction: it is
//! committed when all steps succeed and rolled back as a unit otherwise.

mod parents;
mod reference;
mod students;

use crate::db::{DbError, RegistryStore, RegistryTx};
use crate::models::{
    ParentDetail, ParentDni, ParentRegistration, RefEntry, RefKind, RefName, StudentDetail,
    StudentDni, StudentRegistration,
};

pub use reference::{get_or_create, Resolved};

/// Registration manager over an injected store
pub struct Registrar<'a> {
    store: &'a dyn RegistryStore,
}

impl<'a> Registrar<'a> {
    pub fn new(store: &'a dyn RegistryStore) -> Self {
        Self { store }
    }

    /// Register a student with address, birthplace and parent link.
    pub async fn create_student(&self, reg: &StudentRegistration) -> Result<(), DbError> {
        let mut tx = self.store.begin().await?;
        let result = students::create(tx.as_mut(), reg).await;
        finish(tx, result).await?;

        tracing::info!(dni = %reg.student.dni, "student registered");
        Ok(())
    }

    /// Update a student in place; optional parts are touched only when present.
    pub async fn update_student(&self, reg: &StudentRegistration) -> Result<(), DbError> {
        let mut tx = self.store.begin().await?;
        let result = students::update(tx.as_mut(), reg).await;
        finish(tx, result).await?;

        tracing::info!(dni = %reg.student.dni, "student updated");
        Ok(())
    }

    /// Delete a student, its links, and its address once nothing else uses it.
    pub async fn delete_student(&self, dni: &StudentDni) -> Result<(), DbError> {
        let mut tx = self.store.begin().await?;
        let result = students::delete(tx.as_mut(), dni).await;
        finish(tx, result).await?;

        tracing::info!(dni = %dni, "student deleted");
        Ok(())
    }

    pub async fn create_parent(&self, reg: &ParentRegistration) -> Result<(), DbError> {
        let mut tx = self.store.begin().await?;
        let result = parents::create(tx.as_mut(), reg).await;
        finish(tx, result).await?;

        tracing::info!(dni = %reg.parent.dni, "parent registered");
        Ok(())
    }

    pub async fn update_parent(&self, reg: &ParentRegistration) -> Result<(), DbError> {
        let mut tx = self.store.begin().await?;
        let result = parents::update(tx.as_mut(), reg).await;
        finish(tx, result).await?;

        tracing::info!(dni = %reg.parent.dni, "parent updated");
        Ok(())
    }

    pub async fn delete_parent(&self, dni: ParentDni) -> Result<(), DbError> {
        let mut tx = self.store.begin().await?;
        let result = parents::delete(tx.as_mut(), dni).await;
        finish(tx, result).await?;

        tracing::info!(dni = %dni, "parent deleted");
        Ok(())
    }

    /// Get-or-create a place or occupation in its own transaction.
    pub async fn ensure_reference(
        &self,
        kind: RefKind,
        name: &RefName,
    ) -> Result<(RefEntry, bool), DbError> {
        let mut tx = self.store.begin().await?;
        let result = get_or_create(tx.as_mut(), kind, name).await;
        let resolved = finish(tx, result).await?;

        let entry = RefEntry {
            id: resolved.id,
            name: name.as_str().to_owned(),
        };
        Ok((entry, resolved.created))
    }

    pub async fn student(&self, dni: &StudentDni) -> Result<StudentDetail, DbError> {
        self.store
            .get_student(dni)
            .await?
            .ok_or_else(|| DbError::not_found("student", dni))
    }

    pub async fn students(&self) -> Result<Vec<StudentDetail>, DbError> {
        self.store.list_students().await
    }

    pub async fn parent(&self, dni: ParentDni) -> Result<ParentDetail, DbError> {
        self.store
            .get_parent(dni)
            .await?
            .ok_or_else(|| DbError::not_found("parent", dni))
    }

    pub async fn parents(&self) -> Result<Vec<ParentDetail>, DbError> {
        self.store.list_parents().await
    }

    pub async fn references(&self, kind: RefKind) -> Result<Vec<RefEntry>, DbError> {
        self.store.list_references(kind).await
    }
}

/// Commit on success, roll back on failure.
///
/// A failed rollback is logged; the step's error is what the caller sees.
async fn finish<T>(tx: Box<dyn RegistryTx>, result: Result<T, DbError>) -> Result<T, DbError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            tracing::debug!(error = %err, "rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests;
