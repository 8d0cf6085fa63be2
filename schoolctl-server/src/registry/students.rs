//! Student create/update/delete steps
//!
//! Each function runs inside a transaction owned by the caller and returns
//! on the first failing step.

use crate::db::{AddressLink, DbError, RegistryTx};
use crate::models::{AddressFields, AddressInput, RefKind, StudentDni, StudentRegistration};

use super::get_or_create;

pub(super) async fn create(
    tx: &mut dyn RegistryTx,
    reg: &StudentRegistration,
) -> Result<(), DbError> {
    let dni = &reg.student.dni;

    tx.insert_student(&reg.student).await?;

    match &reg.address {
        Some(AddressInput::New(fields)) if !fields.is_empty() => {
            let address_id = tx.insert_address(&fields.normalized()).await?;
            link_address(tx, dni, address_id, reg).await?;
        }
        Some(AddressInput::Existing(address_id)) => {
            require_address(tx, *address_id).await?;
            link_address(tx, dni, *address_id, reg).await?;
        }
        _ => {}
    }

    if let Some(place) = &reg.birthplace {
        let place = get_or_create(tx, RefKind::Place, place).await?;
        tx.insert_place_link(dni, place.id).await?;
    }

    if let Some(parent) = reg.parent {
        tx.insert_parent_link(dni, parent).await?;
    }

    Ok(())
}

pub(super) async fn update(
    tx: &mut dyn RegistryTx,
    reg: &StudentRegistration,
) -> Result<(), DbError> {
    let dni = &reg.student.dni;

    if !tx.update_student(&reg.student).await? {
        return Err(DbError::not_found("student", dni));
    }

    match &reg.address {
        Some(AddressInput::New(fields)) if !fields.is_empty() => {
            update_address_fields(tx, reg, fields).await?;
        }
        Some(AddressInput::Existing(address_id)) => {
            require_address(tx, *address_id).await?;
            match tx.find_address_link(dni).await? {
                Some(link) if link.address_id == *address_id => {}
                Some(link) => {
                    tx.repoint_address_link(dni, *address_id).await?;
                    release_address(tx, link.address_id).await?;
                }
                None => link_address(tx, dni, *address_id, reg).await?,
            }
        }
        _ => {}
    }

    if let Some(place) = &reg.birthplace {
        let place = get_or_create(tx, RefKind::Place, place).await?;
        match tx.find_place_link(dni).await? {
            Some(_) => tx.update_place_link(dni, place.id).await?,
            None => tx.insert_place_link(dni, place.id).await?,
        }
    }

    // Replace, never merge: at most one current parent link
    if let Some(parent) = reg.parent {
        tx.delete_parent_links(dni).await?;
        tx.insert_parent_link(dni, parent).await?;
        tx.set_address_link_parent(dni, parent).await?;
    }

    Ok(())
}

pub(super) async fn delete(tx: &mut dyn RegistryTx, dni: &StudentDni) -> Result<(), DbError> {
    let address = tx.find_address_link(dni).await?;

    // Link rows before the owning entity
    tx.delete_place_link(dni).await?;
    tx.delete_address_link(dni).await?;
    tx.delete_parent_links(dni).await?;

    if !tx.delete_student(dni).await? {
        return Err(DbError::not_found("student", dni));
    }

    if let Some(link) = address {
        release_address(tx, link.address_id).await?;
    }

    Ok(())
}

/// Update the linked address in place, or insert address and link.
///
/// Only the columns sent in the request are written; the others keep
/// their stored values, since siblings may share the row.
async fn update_address_fields(
    tx: &mut dyn RegistryTx,
    reg: &StudentRegistration,
    fields: &AddressFields,
) -> Result<(), DbError> {
    let dni = &reg.student.dni;
    let fields = fields.normalized();

    match tx.find_address_link(dni).await? {
        Some(link) => {
            tx.update_address(link.address_id, &fields).await?;
        }
        None => {
            let address_id = tx.insert_address(&fields).await?;
            link_address(tx, dni, address_id, reg).await?;
        }
    }
    Ok(())
}

async fn link_address(
    tx: &mut dyn RegistryTx,
    dni: &StudentDni,
    address_id: i32,
    reg: &StudentRegistration,
) -> Result<(), DbError> {
    let link = AddressLink {
        address_id,
        parent: reg.parent,
    };
    tx.insert_address_link(dni, &link).await
}

async fn require_address(tx: &mut dyn RegistryTx, address_id: i32) -> Result<(), DbError> {
    if tx.address_exists(address_id).await? {
        Ok(())
    } else {
        Err(DbError::not_found("address", address_id))
    }
}

/// Delete the address once no student link references it.
async fn release_address(tx: &mut dyn RegistryTx, address_id: i32) -> Result<(), DbError> {
    let remaining = tx.count_address_links(address_id).await?;
    if remaining == 0 {
        tx.delete_address(address_id).await?;
        tracing::debug!(address_id, "address released");
    }
    Ok(())
}
