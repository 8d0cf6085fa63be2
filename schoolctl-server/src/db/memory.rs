//! In-memory store for tests and local experiments
//!
//! Mirrors the Postgres schema closely enough to exercise the registration
//! manager: primary keys, foreign keys, column widths and the UNIQUE
//! constraint on reference names are all checked.
//!
//! Transactions are serialized: `begin` takes an owned lock on the tables
//! and works on a copy. `commit` swaps the copy in; rollback or drop
//! discards it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::{
    AddressFields, ParentDetail, ParentDni, ParentRecord, RefEntry, RefKind, RefName,
    StudentDetail, StudentDni, StudentRecord,
};

use super::store::{AddressLink, RegistryStore, RegistryTx};
use super::DbError;

#[derive(Debug, Clone, Default)]
struct RefTable {
    rows: BTreeMap<i32, String>,
    next_id: i32,
}

impl RefTable {
    fn find(&self, name: &str) -> Option<i32> {
        self.rows
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    students: BTreeMap<StudentDni, StudentRecord>,
    parents: BTreeMap<ParentDni, ParentRecord>,
    addresses: BTreeMap<i32, AddressFields>,
    next_address_id: i32,
    places: RefTable,
    occupations: RefTable,
    address_links: BTreeMap<StudentDni, AddressLink>,
    place_links: BTreeMap<StudentDni, i32>,
    parent_links: BTreeMap<StudentDni, ParentDni>,
    occupation_links: BTreeSet<(ParentDni, i32)>,
}

impl Tables {
    fn refs(&self, kind: RefKind) -> &RefTable {
        match kind {
            RefKind::Place => &self.places,
            RefKind::Occupation => &self.occupations,
        }
    }

    fn refs_mut(&mut self, kind: RefKind) -> &mut RefTable {
        match kind {
            RefKind::Place => &mut self.places,
            RefKind::Occupation => &mut self.occupations,
        }
    }

    fn student_detail(&self, record: &StudentRecord) -> StudentDetail {
        let mut detail = StudentDetail::from_record(record);

        if let Some(parent) = self.parent_links.get(&record.dni) {
            detail.parent_dni = Some(parent.get());
            detail.parent_name = self.parents.get(parent).map(ParentRecord::full_name);
        }
        if let Some(link) = self.address_links.get(&record.dni) {
            detail.address_id = Some(link.address_id);
            detail.address = self
                .addresses
                .get(&link.address_id)
                .cloned()
                .unwrap_or_default();
        }
        if let Some(place_id) = self.place_links.get(&record.dni) {
            detail.birthplace = self.places.rows.get(place_id).cloned();
        }

        detail
    }

    fn parent_detail(&self, record: &ParentRecord) -> ParentDetail {
        let mut occupations: Vec<String> = self
            .occupation_links
            .iter()
            .filter(|(parent, _)| *parent == record.dni)
            .filter_map(|(_, id)| self.occupations.rows.get(id).cloned())
            .collect();
        occupations.sort();

        ParentDetail {
            dni: record.dni.get(),
            nombre: record.nombre.clone(),
            apellido_paterno: record.apellido_paterno.clone(),
            apellido_materno: record.apellido_materno.clone(),
            telefono: record.telefono,
            occupations,
        }
    }

    fn require_student(&self, dni: &StudentDni, table: &str) -> Result<(), DbError> {
        if self.students.contains_key(dni) {
            Ok(())
        } else {
            Err(fk_violation(table, "estudiantes", dni))
        }
    }

    fn require_parent(&self, dni: ParentDni, table: &str) -> Result<(), DbError> {
        if self.parents.contains_key(&dni) {
            Ok(())
        } else {
            Err(fk_violation(table, "padre", dni))
        }
    }
}

fn fk_violation(table: &str, target: &str, key: impl std::fmt::Display) -> DbError {
    DbError::Constraint(format!(
        "insert or update on table \"{}\" violates foreign key constraint: key ({}) is not present in table \"{}\"",
        table, key, target
    ))
}

fn still_referenced(table: &str, by: &str) -> DbError {
    DbError::Constraint(format!(
        "update or delete on table \"{}\" violates foreign key constraint on table \"{}\"",
        table, by
    ))
}

fn duplicate_link(table: &str, key: impl std::fmt::Display) -> DbError {
    DbError::Constraint(format!(
        "duplicate key value violates unique constraint \"{}_pkey\": key ({}) already exists",
        table, key
    ))
}

fn check_widths(fields: &AddressFields) -> Result<(), DbError> {
    for (column, value, width) in fields.columns() {
        if value.is_some_and(|v| v.chars().count() > width) {
            return Err(DbError::Constraint(format!(
                "value too long for type character varying({}) in column \"{}\"",
                width, column
            )));
        }
    }
    Ok(())
}

/// Row counts per table, for assertions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub students: usize,
    pub parents: usize,
    pub addresses: usize,
    pub places: usize,
    pub occupations: usize,
    pub address_links: usize,
    pub place_links: usize,
    pub parent_links: usize,
    pub occupation_links: usize,
}

/// Store that keeps every table in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed row counts.
    pub async fn counts(&self) -> TableCounts {
        let t = self.tables.lock().await;
        TableCounts {
            students: t.students.len(),
            parents: t.parents.len(),
            addresses: t.addresses.len(),
            places: t.places.rows.len(),
            occupations: t.occupations.rows.len(),
            address_links: t.address_links.len(),
            place_links: t.place_links.len(),
            parent_links: t.parent_links.len(),
            occupation_links: t.occupation_links.len(),
        }
    }

    /// Committed address row, if any.
    pub async fn address(&self, id: i32) -> Option<AddressFields> {
        self.tables.lock().await.addresses.get(&id).cloned()
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn RegistryTx>, DbError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn list_students(&self) -> Result<Vec<StudentDetail>, DbError> {
        let t = self.tables.lock().await;
        Ok(t.students.values().map(|s| t.student_detail(s)).collect())
    }

    async fn get_student(&self, dni: &StudentDni) -> Result<Option<StudentDetail>, DbError> {
        let t = self.tables.lock().await;
        Ok(t.students.get(dni).map(|s| t.student_detail(s)))
    }

    async fn list_parents(&self) -> Result<Vec<ParentDetail>, DbError> {
        let t = self.tables.lock().await;
        Ok(t.parents.values().map(|p| t.parent_detail(p)).collect())
    }

    async fn get_parent(&self, dni: ParentDni) -> Result<Option<ParentDetail>, DbError> {
        let t = self.tables.lock().await;
        Ok(t.parents.get(&dni).map(|p| t.parent_detail(p)))
    }

    async fn list_references(&self, kind: RefKind) -> Result<Vec<RefEntry>, DbError> {
        let t = self.tables.lock().await;
        Ok(t.refs(kind)
            .rows
            .iter()
            .map(|(id, name)| RefEntry {
                id: *id,
                name: name.clone(),
            })
            .collect())
    }

    async fn ping(&self) -> bool {
        true
    }
}

/// Transaction over a private copy of the tables
pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl RegistryTx for MemoryTx {
    async fn insert_student(&mut self, student: &StudentRecord) -> Result<(), DbError> {
        if self.working.students.contains_key(&student.dni) {
            return Err(DbError::DuplicateKey {
                resource: "student",
                id: student.dni.to_string(),
            });
        }
        self.working
            .students
            .insert(student.dni.clone(), student.clone());
        Ok(())
    }

    async fn update_student(&mut self, student: &StudentRecord) -> Result<bool, DbError> {
        match self.working.students.get_mut(&student.dni) {
            Some(row) => {
                *row = student.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_student(&mut self, dni: &StudentDni) -> Result<bool, DbError> {
        let t = &self.working;
        if t.address_links.contains_key(dni) {
            return Err(still_referenced("estudiantes", "direccion_estudiante"));
        }
        if t.place_links.contains_key(dni) {
            return Err(still_referenced("estudiantes", "lugar_nacimiento_estudiante"));
        }
        if t.parent_links.contains_key(dni) {
            return Err(still_referenced("estudiantes", "estudiante_padre"));
        }
        Ok(self.working.students.remove(dni).is_some())
    }

    async fn insert_address(&mut self, fields: &AddressFields) -> Result<i32, DbError> {
        check_widths(fields)?;
        self.working.next_address_id += 1;
        let id = self.working.next_address_id;
        self.working.addresses.insert(id, fields.clone());
        Ok(id)
    }

    async fn update_address(&mut self, id: i32, fields: &AddressFields) -> Result<bool, DbError> {
        check_widths(fields)?;
        match self.working.addresses.get_mut(&id) {
            Some(row) => {
                fields.overlay(row);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_address(&mut self, id: i32) -> Result<bool, DbError> {
        if self
            .working
            .address_links
            .values()
            .any(|link| link.address_id == id)
        {
            return Err(still_referenced("direccion", "direccion_estudiante"));
        }
        Ok(self.working.addresses.remove(&id).is_some())
    }

    async fn address_exists(&mut self, id: i32) -> Result<bool, DbError> {
        Ok(self.working.addresses.contains_key(&id))
    }

    async fn find_address_link(
        &mut self,
        dni: &StudentDni,
    ) -> Result<Option<AddressLink>, DbError> {
        Ok(self.working.address_links.get(dni).copied())
    }

    async fn insert_address_link(
        &mut self,
        dni: &StudentDni,
        link: &AddressLink,
    ) -> Result<(), DbError> {
        let t = &self.working;
        t.require_student(dni, "direccion_estudiante")?;
        if !t.addresses.contains_key(&link.address_id) {
            return Err(fk_violation(
                "direccion_estudiante",
                "direccion",
                link.address_id,
            ));
        }
        if let Some(parent) = link.parent {
            t.require_parent(parent, "direccion_estudiante")?;
        }
        if t.address_links.contains_key(dni) {
            return Err(duplicate_link("direccion_estudiante", dni));
        }
        self.working.address_links.insert(dni.clone(), *link);
        Ok(())
    }

    async fn repoint_address_link(
        &mut self,
        dni: &StudentDni,
        address_id: i32,
    ) -> Result<(), DbError> {
        if !self.working.addresses.contains_key(&address_id) {
            return Err(fk_violation("direccion_estudiante", "direccion", address_id));
        }
        if let Some(link) = self.working.address_links.get_mut(dni) {
            link.address_id = address_id;
        }
        Ok(())
    }

    async fn set_address_link_parent(
        &mut self,
        dni: &StudentDni,
        parent: ParentDni,
    ) -> Result<u64, DbError> {
        self.working.require_parent(parent, "direccion_estudiante")?;
        match self.working.address_links.get_mut(dni) {
            Some(link) => {
                link.parent = Some(parent);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_address_link(&mut self, dni: &StudentDni) -> Result<u64, DbError> {
        Ok(u64::from(self.working.address_links.remove(dni).is_some()))
    }

    async fn count_address_links(&mut self, address_id: i32) -> Result<i64, DbError> {
        let count = self
            .working
            .address_links
            .values()
            .filter(|link| link.address_id == address_id)
            .count();
        Ok(count as i64)
    }

    async fn find_reference(
        &mut self,
        kind: RefKind,
        name: &RefName,
    ) -> Result<Option<i32>, DbError> {
        Ok(self.working.refs(kind).find(name.as_str()))
    }

    async fn insert_reference(
        &mut self,
        kind: RefKind,
        name: &RefName,
    ) -> Result<Option<i32>, DbError> {
        let table = self.working.refs_mut(kind);
        if table.find(name.as_str()).is_some() {
            return Ok(None);
        }
        table.next_id += 1;
        let id = table.next_id;
        table.rows.insert(id, name.as_str().to_owned());
        Ok(Some(id))
    }

    async fn find_place_link(&mut self, dni: &StudentDni) -> Result<Option<i32>, DbError> {
        Ok(self.working.place_links.get(dni).copied())
    }

    async fn insert_place_link(&mut self, dni: &StudentDni, place_id: i32) -> Result<(), DbError> {
        let t = &self.working;
        t.require_student(dni, "lugar_nacimiento_estudiante")?;
        if !t.places.rows.contains_key(&place_id) {
            return Err(fk_violation("lugar_nacimiento_estudiante", "lugar", place_id));
        }
        if t.place_links.contains_key(dni) {
            return Err(duplicate_link("lugar_nacimiento_estudiante", dni));
        }
        self.working.place_links.insert(dni.clone(), place_id);
        Ok(())
    }

    async fn update_place_link(&mut self, dni: &StudentDni, place_id: i32) -> Result<(), DbError> {
        if !self.working.places.rows.contains_key(&place_id) {
            return Err(fk_violation("lugar_nacimiento_estudiante", "lugar", place_id));
        }
        if let Some(link) = self.working.place_links.get_mut(dni) {
            *link = place_id;
        }
        Ok(())
    }

    async fn delete_place_link(&mut self, dni: &StudentDni) -> Result<u64, DbError> {
        Ok(u64::from(self.working.place_links.remove(dni).is_some()))
    }

    async fn insert_parent_link(
        &mut self,
        dni: &StudentDni,
        parent: ParentDni,
    ) -> Result<(), DbError> {
        let t = &self.working;
        t.require_student(dni, "estudiante_padre")?;
        t.require_parent(parent, "estudiante_padre")?;
        if t.parent_links.contains_key(dni) {
            return Err(duplicate_link("estudiante_padre", dni));
        }
        self.working.parent_links.insert(dni.clone(), parent);
        Ok(())
    }

    async fn delete_parent_links(&mut self, dni: &StudentDni) -> Result<u64, DbError> {
        Ok(u64::from(self.working.parent_links.remove(dni).is_some()))
    }

    async fn unlink_parent_from_students(&mut self, parent: ParentDni) -> Result<u64, DbError> {
        let before = self.working.parent_links.len();
        self.working.parent_links.retain(|_, p| *p != parent);
        Ok((before - self.working.parent_links.len()) as u64)
    }

    async fn clear_address_link_parent(&mut self, parent: ParentDni) -> Result<u64, DbError> {
        let mut cleared = 0;
        for link in self.working.address_links.values_mut() {
            if link.parent == Some(parent) {
                link.parent = None;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn insert_parent(&mut self, parent: &ParentRecord) -> Result<(), DbError> {
        if self.working.parents.contains_key(&parent.dni) {
            return Err(DbError::DuplicateKey {
                resource: "parent",
                id: parent.dni.to_string(),
            });
        }
        self.working.parents.insert(parent.dni, parent.clone());
        Ok(())
    }

    async fn update_parent(&mut self, parent: &ParentRecord) -> Result<bool, DbError> {
        match self.working.parents.get_mut(&parent.dni) {
            Some(row) => {
                *row = parent.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_parent(&mut self, dni: ParentDni) -> Result<bool, DbError> {
        let t = &self.working;
        if t.parent_links.values().any(|p| *p == dni) {
            return Err(still_referenced("padre", "estudiante_padre"));
        }
        if t.address_links.values().any(|l| l.parent == Some(dni)) {
            return Err(still_referenced("padre", "direccion_estudiante"));
        }
        if t.occupation_links.iter().any(|(p, _)| *p == dni) {
            return Err(still_referenced("padre", "detalle_ocupacion"));
        }
        Ok(self.working.parents.remove(&dni).is_some())
    }

    async fn insert_occupation_link(
        &mut self,
        parent: ParentDni,
        occupation_id: i32,
    ) -> Result<(), DbError> {
        let t = &self.working;
        t.require_parent(parent, "detalle_ocupacion")?;
        if !t.occupations.rows.contains_key(&occupation_id) {
            return Err(fk_violation("detalle_ocupacion", "ocupacion", occupation_id));
        }
        if !self.working.occupation_links.insert((parent, occupation_id)) {
            return Err(duplicate_link(
                "detalle_ocupacion",
                format!("{}, {}", parent, occupation_id),
            ));
        }
        Ok(())
    }

    async fn delete_occupation_links(&mut self, parent: ParentDni) -> Result<u64, DbError> {
        let before = self.working.occupation_links.len();
        self.working.occupation_links.retain(|(p, _)| *p != parent);
        Ok((before - self.working.occupation_links.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DbError> {
        Ok(())
    }
}
