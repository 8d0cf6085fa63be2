//! Storage seam for the registration manager
//!
//! `RegistryStore` hands out transactions and serves the denormalized
//! reads. `RegistryTx` exposes the row-level steps the manager composes;
//! nothing is visible to other readers until `commit`. Dropping a
//! transaction without committing discards it.
//!
//! Implementations:
//! - [`PgStore`](super::postgres::PgStore) over a sqlx `PgPool`
//! - [`MemoryStore`](super::memory::MemoryStore) for tests

use async_trait::async_trait;

use crate::models::{
    AddressFields, ParentDetail, ParentDni, ParentRecord, RefEntry, RefKind, RefName,
    StudentDetail, StudentDni, StudentRecord,
};

use super::DbError;

/// A `direccion_estudiante` row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressLink {
    pub address_id: i32,
    /// Parent carried along on the link (nullable)
    pub parent: Option<ParentDni>,
}

/// Handle to the backing database
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Start a transaction on one pooled connection.
    async fn begin(&self) -> Result<Box<dyn RegistryTx>, DbError>;

    async fn list_students(&self) -> Result<Vec<StudentDetail>, DbError>;

    async fn get_student(&self, dni: &StudentDni) -> Result<Option<StudentDetail>, DbError>;

    async fn list_parents(&self) -> Result<Vec<ParentDetail>, DbError>;

    async fn get_parent(&self, dni: ParentDni) -> Result<Option<ParentDetail>, DbError>;

    async fn list_references(&self, kind: RefKind) -> Result<Vec<RefEntry>, DbError>;

    /// Cheap liveness probe.
    async fn ping(&self) -> bool;
}

/// One open transaction
#[async_trait]
pub trait RegistryTx: Send {
    // students

    /// Fails with `DuplicateKey` if the student already exists.
    async fn insert_student(&mut self, student: &StudentRecord) -> Result<(), DbError>;

    /// Returns false if no row matched.
    async fn update_student(&mut self, student: &StudentRecord) -> Result<bool, DbError>;

    async fn delete_student(&mut self, dni: &StudentDni) -> Result<bool, DbError>;

    // addresses

    async fn insert_address(&mut self, fields: &AddressFields) -> Result<i32, DbError>;

    /// Overwrite the columns that are `Some`; `None` keeps the stored value.
    async fn update_address(&mut self, id: i32, fields: &AddressFields) -> Result<bool, DbError>;

    async fn delete_address(&mut self, id: i32) -> Result<bool, DbError>;

    async fn address_exists(&mut self, id: i32) -> Result<bool, DbError>;

    async fn find_address_link(&mut self, dni: &StudentDni)
        -> Result<Option<AddressLink>, DbError>;

    async fn insert_address_link(
        &mut self,
        dni: &StudentDni,
        link: &AddressLink,
    ) -> Result<(), DbError>;

    /// Point the student's existing link at another address.
    async fn repoint_address_link(
        &mut self,
        dni: &StudentDni,
        address_id: i32,
    ) -> Result<(), DbError>;

    /// Set the parent carried on the student's address link.
    async fn set_address_link_parent(
        &mut self,
        dni: &StudentDni,
        parent: ParentDni,
    ) -> Result<u64, DbError>;

    async fn delete_address_link(&mut self, dni: &StudentDni) -> Result<u64, DbError>;

    /// Number of links that reference the address.
    async fn count_address_links(&mut self, address_id: i32) -> Result<i64, DbError>;

    // reference rows

    /// Exact-match lookup by name.
    async fn find_reference(&mut self, kind: RefKind, name: &RefName)
        -> Result<Option<i32>, DbError>;

    /// Insert unless the name is taken; `None` when another transaction
    /// already holds the name.
    async fn insert_reference(
        &mut self,
        kind: RefKind,
        name: &RefName,
    ) -> Result<Option<i32>, DbError>;

    // birthplace links

    async fn find_place_link(&mut self, dni: &StudentDni) -> Result<Option<i32>, DbError>;

    async fn insert_place_link(&mut self, dni: &StudentDni, place_id: i32) -> Result<(), DbError>;

    async fn update_place_link(&mut self, dni: &StudentDni, place_id: i32) -> Result<(), DbError>;

    async fn delete_place_link(&mut self, dni: &StudentDni) -> Result<u64, DbError>;

    // parent links

    async fn insert_parent_link(
        &mut self,
        dni: &StudentDni,
        parent: ParentDni,
    ) -> Result<(), DbError>;

    async fn delete_parent_links(&mut self, dni: &StudentDni) -> Result<u64, DbError>;

    /// Remove every student link to the parent.
    async fn unlink_parent_from_students(&mut self, parent: ParentDni) -> Result<u64, DbError>;

    /// Null out the parent carried on address links.
    async fn clear_address_link_parent(&mut self, parent: ParentDni) -> Result<u64, DbError>;

    // parents

    /// Fails with `DuplicateKey` if the parent already exists.
    async fn insert_parent(&mut self, parent: &ParentRecord) -> Result<(), DbError>;

    async fn update_parent(&mut self, parent: &ParentRecord) -> Result<bool, DbError>;

    async fn delete_parent(&mut self, dni: ParentDni) -> Result<bool, DbError>;

    async fn insert_occupation_link(
        &mut self,
        parent: ParentDni,
        occupation_id: i32,
    ) -> Result<(), DbError>;

    async fn delete_occupation_links(&mut self, parent: ParentDni) -> Result<u64, DbError>;

    // lifecycle

    async fn commit(self: Box<Self>) -> Result<(), DbError>;

    async fn rollback(self: Box<Self>) -> Result<(), DbError>;
}
