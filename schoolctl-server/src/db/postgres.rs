//! Postgres store
//!
//! Every `RegistryTx` wraps one sqlx transaction, so each registration runs
//! on a single pooled connection. An uncommitted sqlx transaction rolls
//! back when dropped, which releases the connection on every path.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::models::{
    AddressFields, ParentDetail, ParentDni, ParentRecord, RefEntry, RefKind, RefName,
    StudentDetail, StudentDni, StudentRecord,
};

use super::store::{AddressLink, RegistryStore, RegistryTx};
use super::DbError;

/// Denormalized student query: one row per student (the link tables are
/// keyed by student).
const STUDENT_DETAIL_SELECT: &str = r#"
    SELECT
        e.dni_estudiante,
        e.nombre_estudiante,
        e.apellido_paterno_estudiante,
        e.apellido_materno_estudiante,
        e.sexo,
        e.fecha_nacimiento,
        ep.dni_padre,
        p.nombre_padre || ' ' || p.apellido_paterno_padre || ' ' || p.apellido_materno_padre
            AS nombre_padre,
        d.id_direccion,
        d.manzana,
        d.lote,
        d.distrito,
        d.provincia,
        d.calle,
        d.referencia,
        l.lugar AS lugar_nacimiento
    FROM estudiantes e
    LEFT JOIN estudiante_padre ep ON ep.dni_estudiante = e.dni_estudiante
    LEFT JOIN padre p ON p.dni_padre = ep.dni_padre
    LEFT JOIN direccion_estudiante de ON de.dni_estudiante = e.dni_estudiante
    LEFT JOIN direccion d ON d.id_direccion = de.id_direccion
    LEFT JOIN lugar_nacimiento_estudiante le ON le.dni_estudiante = e.dni_estudiante
    LEFT JOIN lugar l ON l.id_lugar = le.id_lugar
"#;

/// Parents with their occupation names aggregated (no N+1).
const PARENT_DETAIL_SELECT: &str = r#"
    SELECT
        p.dni_padre,
        p.nombre_padre,
        p.apellido_paterno_padre,
        p.apellido_materno_padre,
        p.telefono_padre,
        COALESCE(
            array_agg(o.ocupacion::text ORDER BY o.ocupacion) FILTER (WHERE o.ocupacion IS NOT NULL),
            '{}'::text[]
        ) AS ocupaciones
    FROM padre p
    LEFT JOIN detalle_ocupacion dto ON dto.dni_padre = p.dni_padre
    LEFT JOIN ocupacion o ON o.id_ocupacion = dto.id_ocupacion
"#;

/// Store backed by a Postgres pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn student_detail(row: &PgRow) -> StudentDetail {
    StudentDetail {
        dni: row.get("dni_estudiante"),
        nombre: row.get("nombre_estudiante"),
        apellido_paterno: row.get("apellido_paterno_estudiante"),
        apellido_materno: row.get("apellido_materno_estudiante"),
        sexo: row.get("sexo"),
        fecha_nacimiento: row.get("fecha_nacimiento"),
        parent_dni: row.get("dni_padre"),
        parent_name: row.get("nombre_padre"),
        address_id: row.get("id_direccion"),
        address: AddressFields {
            manzana: row.get("manzana"),
            lote: row.get("lote"),
            distrito: row.get("distrito"),
            provincia: row.get("provincia"),
            calle: row.get("calle"),
            referencia: row.get("referencia"),
        },
        birthplace: row.get("lugar_nacimiento"),
    }
}

fn parent_detail(row: &PgRow) -> ParentDetail {
    ParentDetail {
        dni: row.get("dni_padre"),
        nombre: row.get("nombre_padre"),
        apellido_paterno: row.get("apellido_paterno_padre"),
        apellido_materno: row.get("apellido_materno_padre"),
        telefono: row.get("telefono_padre"),
        occupations: row.get("ocupaciones"),
    }
}

#[async_trait]
impl RegistryStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn RegistryTx>, DbError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn list_students(&self) -> Result<Vec<StudentDetail>, DbError> {
        let sql = format!("{} ORDER BY e.dni_estudiante", STUDENT_DETAIL_SELECT);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(student_detail).collect())
    }

    async fn get_student(&self, dni: &StudentDni) -> Result<Option<StudentDetail>, DbError> {
        let sql = format!("{} WHERE e.dni_estudiante = $1", STUDENT_DETAIL_SELECT);
        let row = sqlx::query(&sql)
            .bind(dni.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(student_detail))
    }

    async fn list_parents(&self) -> Result<Vec<ParentDetail>, DbError> {
        let sql = format!(
            "{} GROUP BY p.dni_padre ORDER BY p.dni_padre",
            PARENT_DETAIL_SELECT
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(parent_detail).collect())
    }

    async fn get_parent(&self, dni: ParentDni) -> Result<Option<ParentDetail>, DbError> {
        let sql = format!(
            "{} WHERE p.dni_padre = $1 GROUP BY p.dni_padre",
            PARENT_DETAIL_SELECT
        );
        let row = sqlx::query(&sql)
            .bind(dni.get())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(parent_detail))
    }

    async fn list_references(&self, kind: RefKind) -> Result<Vec<RefEntry>, DbError> {
        let sql = format!(
            "SELECT {id} AS id, {name} AS name FROM {table} ORDER BY {id}",
            id = kind.id_column(),
            name = kind.name_column(),
            table = kind.table(),
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(|r| RefEntry {
                id: r.get("id"),
                name: r.get("name"),
            })
            .collect())
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

/// One open Postgres transaction
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl RegistryTx for PgTx {
    async fn insert_student(&mut self, student: &StudentRecord) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO estudiantes (
                dni_estudiante, nombre_estudiante, apellido_paterno_estudiante,
                apellido_materno_estudiante, sexo, fecha_nacimiento
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(student.dni.as_str())
        .bind(&student.nombre)
        .bind(&student.apellido_paterno)
        .bind(&student.apellido_materno)
        .bind(&student.sexo)
        .bind(student.fecha_nacimiento)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| DbError::on_identity_insert(e, "student", &student.dni))?;

        Ok(())
    }

    async fn update_student(&mut self, student: &StudentRecord) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE estudiantes SET
                nombre_estudiante = $2,
                apellido_paterno_estudiante = $3,
                apellido_materno_estudiante = $4,
                sexo = $5,
                fecha_nacimiento = $6
            WHERE dni_estudiante = $1
            "#,
        )
        .bind(student.dni.as_str())
        .bind(&student.nombre)
        .bind(&student.apellido_paterno)
        .bind(&student.apellido_materno)
        .bind(&student.sexo)
        .bind(student.fecha_nacimiento)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_student(&mut self, dni: &StudentDni) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM estudiantes WHERE dni_estudiante = $1")
            .bind(dni.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_address(&mut self, fields: &AddressFields) -> Result<i32, DbError> {
        let row = sqlx::query(
            r#"
            INSERT INTO direccion (manzana, lote, distrito, provincia, calle, referencia)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id_direccion
            "#,
        )
        .bind(&fields.manzana)
        .bind(&fields.lote)
        .bind(&fields.distrito)
        .bind(&fields.provincia)
        .bind(&fields.calle)
        .bind(&fields.referencia)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.get("id_direccion"))
    }

    async fn update_address(&mut self, id: i32, fields: &AddressFields) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE direccion SET
                manzana = COALESCE($2, manzana),
                lote = COALESCE($3, lote),
                distrito = COALESCE($4, distrito),
                provincia = COALESCE($5, provincia),
                calle = COALESCE($6, calle),
                referencia = COALESCE($7, referencia)
            WHERE id_direccion = $1
            "#,
        )
        .bind(id)
        .bind(&fields.manzana)
        .bind(&fields.lote)
        .bind(&fields.distrito)
        .bind(&fields.provincia)
        .bind(&fields.calle)
        .bind(&fields.referencia)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_address(&mut self, id: i32) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM direccion WHERE id_direccion = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn address_exists(&mut self, id: i32) -> Result<bool, DbError> {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM direccion WHERE id_direccion = $1)")
                .bind(id)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(exists.0)
    }

    async fn find_address_link(
        &mut self,
        dni: &StudentDni,
    ) -> Result<Option<AddressLink>, DbError> {
        let row: Option<(i32, Option<i32>)> = sqlx::query_as(
            "SELECT id_direccion, dni_padre FROM direccion_estudiante WHERE dni_estudiante = $1",
        )
        .bind(dni.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        // dni_padre rows were written from validated ParentDni values
        Ok(row.map(|(address_id, parent)| AddressLink {
            address_id,
            parent: parent.and_then(|p| ParentDni::new(i64::from(p)).ok()),
        }))
    }

    async fn insert_address_link(
        &mut self,
        dni: &StudentDni,
        link: &AddressLink,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO direccion_estudiante (dni_estudiante, id_direccion, dni_padre)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(dni.as_str())
        .bind(link.address_id)
        .bind(link.parent.map(ParentDni::get))
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn repoint_address_link(
        &mut self,
        dni: &StudentDni,
        address_id: i32,
    ) -> Result<(), DbError> {
        sqlx::query("UPDATE direccion_estudiante SET id_direccion = $2 WHERE dni_estudiante = $1")
            .bind(dni.as_str())
            .bind(address_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn set_address_link_parent(
        &mut self,
        dni: &StudentDni,
        parent: ParentDni,
    ) -> Result<u64, DbError> {
        let result =
            sqlx::query("UPDATE direccion_estudiante SET dni_padre = $2 WHERE dni_estudiante = $1")
                .bind(dni.as_str())
                .bind(parent.get())
                .execute(&mut *self.tx)
                .await?;
        Ok(result.rows_affected())
    }

    async fn delete_address_link(&mut self, dni: &StudentDni) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM direccion_estudiante WHERE dni_estudiante = $1")
            .bind(dni.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_address_links(&mut self, address_id: i32) -> Result<i64, DbError> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM direccion_estudiante WHERE id_direccion = $1")
                .bind(address_id)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(count.0)
    }

    async fn find_reference(
        &mut self,
        kind: RefKind,
        name: &RefName,
    ) -> Result<Option<i32>, DbError> {
        let sql = format!(
            "SELECT {id} FROM {table} WHERE {name} = $1",
            id = kind.id_column(),
            table = kind.table(),
            name = kind.name_column(),
        );
        let row: Option<(i32,)> = sqlx::query_as(&sql)
            .bind(name.as_str())
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(|r| r.0))
    }

    async fn insert_reference(
        &mut self,
        kind: RefKind,
        name: &RefName,
    ) -> Result<Option<i32>, DbError> {
        // Waits on a concurrent uncommitted insert of the same name, then
        // yields no row if that transaction committed.
        let sql = format!(
            "INSERT INTO {table} ({name}) VALUES ($1) ON CONFLICT ({name}) DO NOTHING RETURNING {id}",
            table = kind.table(),
            name = kind.name_column(),
            id = kind.id_column(),
        );
        let row: Option<(i32,)> = sqlx::query_as(&sql)
            .bind(name.as_str())
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(|r| r.0))
    }

    async fn find_place_link(&mut self, dni: &StudentDni) -> Result<Option<i32>, DbError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT id_lugar FROM lugar_nacimiento_estudiante WHERE dni_estudiante = $1",
        )
        .bind(dni.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(|r| r.0))
    }

    async fn insert_place_link(&mut self, dni: &StudentDni, place_id: i32) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO lugar_nacimiento_estudiante (dni_estudiante, id_lugar) VALUES ($1, $2)",
        )
        .bind(dni.as_str())
        .bind(place_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_place_link(&mut self, dni: &StudentDni, place_id: i32) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE lugar_nacimiento_estudiante SET id_lugar = $2 WHERE dni_estudiante = $1",
        )
        .bind(dni.as_str())
        .bind(place_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_place_link(&mut self, dni: &StudentDni) -> Result<u64, DbError> {
        let result =
            sqlx::query("DELETE FROM lugar_nacimiento_estudiante WHERE dni_estudiante = $1")
                .bind(dni.as_str())
                .execute(&mut *self.tx)
                .await?;
        Ok(result.rows_affected())
    }

    async fn insert_parent_link(
        &mut self,
        dni: &StudentDni,
        parent: ParentDni,
    ) -> Result<(), DbError> {
        sqlx::query("INSERT INTO estudiante_padre (dni_estudiante, dni_padre) VALUES ($1, $2)")
            .bind(dni.as_str())
            .bind(parent.get())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_parent_links(&mut self, dni: &StudentDni) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM estudiante_padre WHERE dni_estudiante = $1")
            .bind(dni.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn unlink_parent_from_students(&mut self, parent: ParentDni) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM estudiante_padre WHERE dni_padre = $1")
            .bind(parent.get())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn clear_address_link_parent(&mut self, parent: ParentDni) -> Result<u64, DbError> {
        let result =
            sqlx::query("UPDATE direccion_estudiante SET dni_padre = NULL WHERE dni_padre = $1")
                .bind(parent.get())
                .execute(&mut *self.tx)
                .await?;
        Ok(result.rows_affected())
    }

    async fn insert_parent(&mut self, parent: &ParentRecord) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO padre (
                dni_padre, nombre_padre, apellido_paterno_padre,
                apellido_materno_padre, telefono_padre
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(parent.dni.get())
        .bind(&parent.nombre)
        .bind(&parent.apellido_paterno)
        .bind(&parent.apellido_materno)
        .bind(parent.telefono)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| DbError::on_identity_insert(e, "parent", parent.dni))?;

        Ok(())
    }

    async fn update_parent(&mut self, parent: &ParentRecord) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE padre SET
                nombre_padre = $2,
                apellido_paterno_padre = $3,
                apellido_materno_padre = $4,
                telefono_padre = $5
            WHERE dni_padre = $1
            "#,
        )
        .bind(parent.dni.get())
        .bind(&parent.nombre)
        .bind(&parent.apellido_paterno)
        .bind(&parent.apellido_materno)
        .bind(parent.telefono)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_parent(&mut self, dni: ParentDni) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM padre WHERE dni_padre = $1")
            .bind(dni.get())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_occupation_link(
        &mut self,
        parent: ParentDni,
        occupation_id: i32,
    ) -> Result<(), DbError> {
        sqlx::query("INSERT INTO detalle_ocupacion (dni_padre, id_ocupacion) VALUES ($1, $2)")
            .bind(parent.get())
            .bind(occupation_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_occupation_links(&mut self, parent: ParentDni) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM detalle_ocupacion WHERE dni_padre = $1")
            .bind(parent.get())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DbError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
