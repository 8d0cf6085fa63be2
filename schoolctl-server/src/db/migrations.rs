//! Schema creation for the registration tables
//!
//! Idempotent: every statement uses IF NOT EXISTS.

use sqlx::PgPool;

use super::DbError;

/// Tables in creation order (reference tables before the links that use them)
const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS lugar (
        id_lugar SERIAL PRIMARY KEY,
        lugar VARCHAR(100) NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ocupacion (
        id_ocupacion SERIAL PRIMARY KEY,
        ocupacion VARCHAR(100) NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS direccion (
        id_direccion SERIAL PRIMARY KEY,
        manzana VARCHAR(20),
        lote VARCHAR(20),
        distrito VARCHAR(100),
        provincia VARCHAR(100),
        calle VARCHAR(200),
        referencia VARCHAR(200)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS estudiantes (
        dni_estudiante VARCHAR(20) PRIMARY KEY,
        nombre_estudiante VARCHAR(100) NOT NULL,
        apellido_paterno_estudiante VARCHAR(100) NOT NULL,
        apellido_materno_estudiante VARCHAR(100) NOT NULL,
        sexo VARCHAR(10) NOT NULL,
        fecha_nacimiento DATE NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS padre (
        dni_padre INTEGER PRIMARY KEY,
        nombre_padre VARCHAR(100) NOT NULL,
        apellido_paterno_padre VARCHAR(100) NOT NULL,
        apellido_materno_padre VARCHAR(100) NOT NULL,
        telefono_padre BIGINT
    )
    "#,
    // One address link per student; the parent is carried along
    r#"
    CREATE TABLE IF NOT EXISTS direccion_estudiante (
        dni_estudiante VARCHAR(20) PRIMARY KEY REFERENCES estudiantes(dni_estudiante),
        id_direccion INTEGER NOT NULL REFERENCES direccion(id_direccion),
        dni_padre INTEGER REFERENCES padre(dni_padre)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS lugar_nacimiento_estudiante (
        dni_estudiante VARCHAR(20) PRIMARY KEY REFERENCES estudiantes(dni_estudiante),
        id_lugar INTEGER NOT NULL REFERENCES lugar(id_lugar)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS estudiante_padre (
        dni_estudiante VARCHAR(20) PRIMARY KEY REFERENCES estudiantes(dni_estudiante),
        dni_padre INTEGER NOT NULL REFERENCES padre(dni_padre)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS detalle_ocupacion (
        dni_padre INTEGER REFERENCES padre(dni_padre),
        id_ocupacion INTEGER REFERENCES ocupacion(id_ocupacion),
        PRIMARY KEY (dni_padre, id_ocupacion)
    )
    "#,
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_direccion_estudiante_direccion ON direccion_estudiante(id_direccion)",
    "CREATE INDEX IF NOT EXISTS idx_direccion_estudiante_padre ON direccion_estudiante(dni_padre)",
    "CREATE INDEX IF NOT EXISTS idx_estudiante_padre_padre ON estudiante_padre(dni_padre)",
    "CREATE INDEX IF NOT EXISTS idx_lugar_nacimiento_lugar ON lugar_nacimiento_estudiante(id_lugar)",
];

/// Create all registration tables and indexes.
pub async fn run(pool: &PgPool) -> Result<(), DbError> {
    tracing::info!("Running schema migrations...");

    let mut tx = pool.begin().await?;
    for ddl in TABLES.iter().chain(INDEXES) {
        sqlx::query(ddl).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    tracing::info!(tables = TABLES.len(), "Schema migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_tables_follow_their_targets() {
        let position = |name: &str| {
            TABLES
                .iter()
                .position(|ddl| ddl.contains(&format!("EXISTS {} (", name)))
                .unwrap()
        };

        assert!(position("estudiantes") < position("direccion_estudiante"));
        assert!(position("padre") < position("estudiante_padre"));
        assert!(position("lugar") < position("lugar_nacimiento_estudiante"));
        assert!(position("ocupacion") < position("detalle_ocupacion"));
    }

    #[test]
    fn reference_names_are_unique() {
        assert!(TABLES[0].contains("lugar VARCHAR(100) NOT NULL UNIQUE"));
        assert!(TABLES[1].contains("ocupacion VARCHAR(100) NOT NULL UNIQUE"));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn migrations_are_idempotent() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&url).await.expect("pool creation failed");

        run(&pool).await.expect("first run failed");
        run(&pool).await.expect("second run failed");
    }
}
