//! Parent create/update/delete steps

use crate::db::{DbError, RegistryTx};
use crate::models::{ParentDni, ParentRegistration, RefKind};

use super::get_or_create;

pub(super) async fn create(
    tx: &mut dyn RegistryTx,
    reg: &ParentRegistration,
) -> Result<(), DbError> {
    tx.insert_parent(&reg.parent).await?;

    if let Some(occupation) = &reg.occupation {
        let occupation = get_or_create(tx, RefKind::Occupation, occupation).await?;
        tx.insert_occupation_link(reg.parent.dni, occupation.id)
            .await?;
    }

    Ok(())
}

pub(super) async fn update(
    tx: &mut dyn RegistryTx,
    reg: &ParentRegistration,
) -> Result<(), DbError> {
    let dni = reg.parent.dni;

    if !tx.update_parent(&reg.parent).await? {
        return Err(DbError::not_found("parent", dni));
    }

    if let Some(occupation) = &reg.occupation {
        let occupation = get_or_create(tx, RefKind::Occupation, occupation).await?;
        tx.delete_occupation_links(dni).await?;
        tx.insert_occupation_link(dni, occupation.id).await?;
    }

    Ok(())
}

pub(super) async fn delete(tx: &mut dyn RegistryTx, dni: ParentDni) -> Result<(), DbError> {
    tx.delete_occupation_links(dni).await?;
    let unlinked = tx.unlink_parent_from_students(dni).await?;
    tx.clear_address_link_parent(dni).await?;

    if !tx.delete_parent(dni).await? {
        return Err(DbError::not_found("parent", dni));
    }

    tracing::debug!(dni = %dni, unlinked, "parent unlinked from students");
    Ok(())
}
