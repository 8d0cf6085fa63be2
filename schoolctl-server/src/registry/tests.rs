use chrono::NaiveDate;

use super::*;
use crate::db::{MemoryStore, PgStore, RegistryStore, TableCounts};
use crate::models::{
    AddressFields, AddressInput, ParentRecord, RefName, StudentRecord,
};

fn dni(s: &str) -> StudentDni {
    StudentDni::new(s).unwrap()
}

fn student(id: &str) -> StudentRecord {
    StudentRecord::new(
        dni(id),
        "Ana",
        "Rojas",
        "Quispe",
        "F",
        NaiveDate::from_ymd_opt(2012, 3, 14).unwrap(),
    )
    .unwrap()
}

fn place(name: &str) -> RefName {
    RefName::new("Lugar_nacimiento", name).unwrap()
}

fn occupation(name: &str) -> RefName {
    RefName::new("Ocupacion", name).unwrap()
}

fn address(calle: &str) -> AddressInput {
    AddressInput::New(AddressFields {
        distrito: Some("Surco".into()),
        calle: Some(calle.into()),
        ..Default::default()
    })
}

fn parent(id: i64) -> ParentRegistration {
    ParentRegistration {
        parent: ParentRecord::new(ParentDni::new(id).unwrap(), "Luis", "Rojas", "Diaz", None)
            .unwrap(),
        occupation: None,
    }
}

async fn with_parents(ids: &[i64]) -> MemoryStore {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);
    for id in ids {
        registrar.create_parent(&parent(*id)).await.unwrap();
    }
    store
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn create_with_birthplace_and_no_parent() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);

    let reg = StudentRegistration::new(student("12345678")).with_birthplace(place("Lima"));
    registrar.create_student(&reg).await.unwrap();

    let counts = store.counts().await;
    assert_eq!(counts.students, 1);
    assert_eq!(counts.parent_links, 0);
    assert_eq!(counts.places, 1);
    assert_eq!(counts.place_links, 1);

    let detail = registrar.student(&dni("12345678")).await.unwrap();
    assert_eq!(detail.birthplace.as_deref(), Some("Lima"));
    assert!(detail.parent_dni.is_none());
}

#[tokio::test]
async fn same_birthplace_is_reused() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);

    for id in ["12345678", "87654321"] {
        let reg = StudentRegistration::new(student(id)).with_birthplace(place("Lima"));
        registrar.create_student(&reg).await.unwrap();
    }

    let counts = store.counts().await;
    assert_eq!(counts.places, 1);
    assert_eq!(counts.place_links, 2);

    let places = registrar.references(RefKind::Place).await.unwrap();
    assert_eq!(places.len(), 1);
    assert_eq!(places[0].name, "Lima");
}

#[tokio::test]
async fn birthplace_match_is_exact() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);

    let first = StudentRegistration::new(student("11111111")).with_birthplace(place("Lima"));
    let second = StudentRegistration::new(student("22222222")).with_birthplace(place("lima"));
    registrar.create_student(&first).await.unwrap();
    registrar.create_student(&second).await.unwrap();

    assert_eq!(store.counts().await.places, 2);
}

#[tokio::test]
async fn create_with_everything() {
    let store = with_parents(&[40123456]).await;
    let registrar = Registrar::new(&store);

    let reg = StudentRegistration::new(student("12345678"))
        .with_address(address("Av. Primavera 120"))
        .with_birthplace(place("Arequipa"))
        .with_parent(ParentDni::new(40123456).unwrap());
    registrar.create_student(&reg).await.unwrap();

    let detail = registrar.student(&dni("12345678")).await.unwrap();
    assert_eq!(detail.parent_dni, Some(40123456));
    assert_eq!(detail.parent_name.as_deref(), Some("Luis Rojas Diaz"));
    assert_eq!(detail.address.calle.as_deref(), Some("Av. Primavera 120"));
    assert_eq!(detail.birthplace.as_deref(), Some("Arequipa"));

    let counts = store.counts().await;
    assert_eq!(counts.addresses, 1);
    assert_eq!(counts.address_links, 1);
    assert_eq!(counts.parent_links, 1);
}

#[tokio::test]
async fn empty_address_fields_are_ignored() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);

    let reg = StudentRegistration::new(student("12345678"))
        .with_address(AddressInput::New(AddressFields::default()));
    registrar.create_student(&reg).await.unwrap();

    assert_eq!(store.counts().await.addresses, 0);
    assert_eq!(store.counts().await.address_links, 0);
}

#[tokio::test]
async fn duplicate_student_is_rejected() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);

    let reg = StudentRegistration::new(student("12345678"));
    registrar.create_student(&reg).await.unwrap();
    let err = registrar.create_student(&reg).await.unwrap_err();

    assert!(matches!(err, DbError::DuplicateKey { resource: "student", .. }));
    assert_eq!(store.counts().await.students, 1);
}

#[tokio::test]
async fn failed_address_rolls_back_everything() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);

    let bad_address = AddressInput::New(AddressFields {
        manzana: Some("M".repeat(40)),
        ..Default::default()
    });
    let reg = StudentRegistration::new(student("12345678"))
        .with_address(bad_address)
        .with_birthplace(place("Lima"));

    let err = registrar.create_student(&reg).await.unwrap_err();
    assert!(matches!(err, DbError::Constraint(_)));

    assert_eq!(store.counts().await, TableCounts::default());
}

#[tokio::test]
async fn unknown_parent_rolls_back_place() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);

    let reg = StudentRegistration::new(student("12345678"))
        .with_birthplace(place("Cusco"))
        .with_parent(ParentDni::new(999).unwrap());

    assert!(registrar.create_student(&reg).await.is_err());

    let counts = store.counts().await;
    assert_eq!(counts.students, 0);
    assert_eq!(counts.places, 0);
    assert_eq!(counts.place_links, 0);
}

#[tokio::test]
async fn create_can_share_an_existing_address() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);

    let first = StudentRegistration::new(student("11111111")).with_address(address("Jr. Union 5"));
    registrar.create_student(&first).await.unwrap();
    let shared = registrar
        .student(&dni("11111111"))
        .await
        .unwrap()
        .address_id
        .unwrap();

    let sibling =
        StudentRegistration::new(student("22222222")).with_address(AddressInput::Existing(shared));
    registrar.create_student(&sibling).await.unwrap();

    let detail = registrar.student(&dni("22222222")).await.unwrap();
    assert_eq!(detail.address_id, Some(shared));
    assert_eq!(store.counts().await.addresses, 1);
}

#[tokio::test]
async fn create_with_missing_address_id_is_not_found() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);

    let reg = StudentRegistration::new(student("12345678")).with_address(AddressInput::Existing(77));
    let err = registrar.create_student(&reg).await.unwrap_err();

    assert!(matches!(err, DbError::NotFound { resource: "address", .. }));
    assert_eq!(store.counts().await.students, 0);
}

// ============================================================================
// Update
// ============================================================================

#[tokio::test]
async fn update_replaces_parent_link() {
    let store = with_parents(&[1001, 1002]).await;
    let registrar = Registrar::new(&store);

    let reg = StudentRegistration::new(student("12345678")).with_parent(ParentDni::new(1001).unwrap());
    registrar.create_student(&reg).await.unwrap();

    let update =
        StudentRegistration::new(student("12345678")).with_parent(ParentDni::new(1002).unwrap());
    registrar.update_student(&update).await.unwrap();

    assert_eq!(store.counts().await.parent_links, 1);
    let detail = registrar.student(&dni("12345678")).await.unwrap();
    assert_eq!(detail.parent_dni, Some(1002));
}

#[tokio::test]
async fn update_moves_address_link_to_new_parent() {
    let store = with_parents(&[1001, 1002]).await;
    let registrar = Registrar::new(&store);

    let reg = StudentRegistration::new(student("12345678"))
        .with_address(address("Jr. Union 5"))
        .with_parent(ParentDni::new(1001).unwrap());
    registrar.create_student(&reg).await.unwrap();

    let update =
        StudentRegistration::new(student("12345678")).with_parent(ParentDni::new(1002).unwrap());
    registrar.update_student(&update).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let link = tx.find_address_link(&dni("12345678")).await.unwrap().unwrap();
    tx.rollback().await.unwrap();
    assert_eq!(link.parent, Some(ParentDni::new(1002).unwrap()));
}

#[tokio::test]
async fn partial_address_update_keeps_other_columns() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);

    let reg = StudentRegistration::new(student("12345678")).with_address(address("Old street"));
    registrar.create_student(&reg).await.unwrap();

    let only_calle = AddressInput::New(AddressFields {
        calle: Some("New street".into()),
        ..Default::default()
    });
    let update = StudentRegistration::new(student("12345678")).with_address(only_calle);
    registrar.update_student(&update).await.unwrap();

    let detail = registrar.student(&dni("12345678")).await.unwrap();
    assert_eq!(detail.address.calle.as_deref(), Some("New street"));
    assert_eq!(detail.address.distrito.as_deref(), Some("Surco"));
}

#[tokio::test]
async fn update_changes_scalar_fields() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);
    registrar
        .create_student(&StudentRegistration::new(student("12345678")))
        .await
        .unwrap();

    let mut renamed = student("12345678");
    renamed.nombre = "Ana Lucia".into();
    registrar
        .update_student(&StudentRegistration::new(renamed))
        .await
        .unwrap();

    let detail = registrar.student(&dni("12345678")).await.unwrap();
    assert_eq!(detail.nombre, "Ana Lucia");
}

#[tokio::test]
async fn update_edits_linked_address_in_place() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);

    let reg = StudentRegistration::new(student("12345678")).with_address(address("Old street"));
    registrar.create_student(&reg).await.unwrap();
    let before = registrar.student(&dni("12345678")).await.unwrap();

    let update = StudentRegistration::new(student("12345678")).with_address(address("New street"));
    registrar.update_student(&update).await.unwrap();

    let after = registrar.student(&dni("12345678")).await.unwrap();
    assert_eq!(after.address_id, before.address_id);
    assert_eq!(after.address.calle.as_deref(), Some("New street"));
    assert_eq!(store.counts().await.addresses, 1);
}

#[tokio::test]
async fn update_inserts_missing_address_and_place() {
    let store = with_parents(&[1001]).await;
    let registrar = Registrar::new(&store);
    registrar
        .create_student(&StudentRegistration::new(student("12345678")))
        .await
        .unwrap();

    let update = StudentRegistration::new(student("12345678"))
        .with_address(address("Calle 1"))
        .with_birthplace(place("Piura"))
        .with_parent(ParentDni::new(1001).unwrap());
    registrar.update_student(&update).await.unwrap();

    let counts = store.counts().await;
    assert_eq!(counts.address_links, 1);
    assert_eq!(counts.place_links, 1);
    assert_eq!(counts.parent_links, 1);
}

#[tokio::test]
async fn update_repoints_birthplace() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);

    let reg = StudentRegistration::new(student("12345678")).with_birthplace(place("Lima"));
    registrar.create_student(&reg).await.unwrap();

    let update = StudentRegistration::new(student("12345678")).with_birthplace(place("Tacna"));
    registrar.update_student(&update).await.unwrap();

    let detail = registrar.student(&dni("12345678")).await.unwrap();
    assert_eq!(detail.birthplace.as_deref(), Some("Tacna"));
    let counts = store.counts().await;
    assert_eq!(counts.place_links, 1);
    // Reference rows are never removed by student operations
    assert_eq!(counts.places, 2);
}

#[tokio::test]
async fn update_missing_student_is_not_found() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);

    let update = StudentRegistration::new(student("12345678")).with_birthplace(place("Lima"));
    let err = registrar.update_student(&update).await.unwrap_err();

    assert!(matches!(err, DbError::NotFound { resource: "student", .. }));
    assert_eq!(store.counts().await.places, 0);
}

#[tokio::test]
async fn failed_update_keeps_previous_state() {
    let store = with_parents(&[1001]).await;
    let registrar = Registrar::new(&store);

    let reg = StudentRegistration::new(student("12345678")).with_parent(ParentDni::new(1001).unwrap());
    registrar.create_student(&reg).await.unwrap();

    // Unknown parent fails after the old link was deleted inside the tx
    let update = StudentRegistration::new(student("12345678"))
        .with_birthplace(place("Lima"))
        .with_parent(ParentDni::new(2002).unwrap());
    assert!(registrar.update_student(&update).await.is_err());

    let detail = registrar.student(&dni("12345678")).await.unwrap();
    assert_eq!(detail.parent_dni, Some(1001));
    assert!(detail.birthplace.is_none());
    assert_eq!(store.counts().await.places, 0);
}

#[tokio::test]
async fn update_moves_to_shared_address_and_releases_old_one() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);

    let a = StudentRegistration::new(student("11111111")).with_address(address("Home A"));
    let b = StudentRegistration::new(student("22222222")).with_address(address("Home B"));
    registrar.create_student(&a).await.unwrap();
    registrar.create_student(&b).await.unwrap();
    let home_a = registrar.student(&dni("11111111")).await.unwrap().address_id.unwrap();

    let moved = StudentRegistration::new(student("22222222"))
        .with_address(AddressInput::Existing(home_a));
    registrar.update_student(&moved).await.unwrap();

    assert_eq!(store.counts().await.addresses, 1);
    let detail = registrar.student(&dni("22222222")).await.unwrap();
    assert_eq!(detail.address.calle.as_deref(), Some("Home A"));
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn delete_removes_student_and_links() {
    let store = with_parents(&[1001]).await;
    let registrar = Registrar::new(&store);

    let reg = StudentRegistration::new(student("12345678"))
        .with_address(address("Calle 1"))
        .with_birthplace(place("Lima"))
        .with_parent(ParentDni::new(1001).unwrap());
    registrar.create_student(&reg).await.unwrap();

    registrar.delete_student(&dni("12345678")).await.unwrap();

    let counts = store.counts().await;
    assert_eq!(counts.students, 0);
    assert_eq!(counts.address_links, 0);
    assert_eq!(counts.place_links, 0);
    assert_eq!(counts.parent_links, 0);
    assert_eq!(counts.addresses, 0);
    // Shared reference rows survive
    assert_eq!(counts.places, 1);
    assert_eq!(counts.parents, 1);
}

#[tokio::test]
async fn shared_address_survives_until_last_student_leaves() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);

    let first = StudentRegistration::new(student("11111111")).with_address(address("Jr. Union 5"));
    registrar.create_student(&first).await.unwrap();
    let shared = registrar
        .student(&dni("11111111"))
        .await
        .unwrap()
        .address_id
        .unwrap();
    let sibling =
        StudentRegistration::new(student("22222222")).with_address(AddressInput::Existing(shared));
    registrar.create_student(&sibling).await.unwrap();

    registrar.delete_student(&dni("11111111")).await.unwrap();
    assert!(store.address(shared).await.is_some());

    registrar.delete_student(&dni("22222222")).await.unwrap();
    assert!(store.address(shared).await.is_none());
}

#[tokio::test]
async fn delete_missing_student_is_not_found() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);

    let err = registrar.delete_student(&dni("12345678")).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound { .. }));
}

// ============================================================================
// Parents and occupations
// ============================================================================

#[tokio::test]
async fn parents_share_occupation_rows() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);

    for id in [1001, 1002] {
        let mut reg = parent(id);
        reg.occupation = Some(occupation("Docente"));
        registrar.create_parent(&reg).await.unwrap();
    }

    let counts = store.counts().await;
    assert_eq!(counts.occupations, 1);
    assert_eq!(counts.occupation_links, 2);

    let detail = registrar.parent(ParentDni::new(1002).unwrap()).await.unwrap();
    assert_eq!(detail.occupations, vec!["Docente".to_string()]);
}

#[tokio::test]
async fn duplicate_parent_is_rejected() {
    let store = with_parents(&[1001]).await;
    let registrar = Registrar::new(&store);

    let err = registrar.create_parent(&parent(1001)).await.unwrap_err();
    assert!(matches!(err, DbError::DuplicateKey { resource: "parent", .. }));
}

#[tokio::test]
async fn parent_update_replaces_occupation() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);

    let mut reg = parent(1001);
    reg.occupation = Some(occupation("Docente"));
    registrar.create_parent(&reg).await.unwrap();

    reg.occupation = Some(occupation("Ingeniero"));
    registrar.update_parent(&reg).await.unwrap();

    let detail = registrar.parent(ParentDni::new(1001).unwrap()).await.unwrap();
    assert_eq!(detail.occupations, vec!["Ingeniero".to_string()]);
    assert_eq!(store.counts().await.occupation_links, 1);
}

#[tokio::test]
async fn parent_delete_unlinks_students() {
    let store = with_parents(&[1001]).await;
    let registrar = Registrar::new(&store);

    let reg = StudentRegistration::new(student("12345678"))
        .with_address(address("Calle 1"))
        .with_parent(ParentDni::new(1001).unwrap());
    registrar.create_student(&reg).await.unwrap();

    registrar
        .delete_parent(ParentDni::new(1001).unwrap())
        .await
        .unwrap();

    let detail = registrar.student(&dni("12345678")).await.unwrap();
    assert!(detail.parent_dni.is_none());
    assert!(detail.address_id.is_some());
    assert_eq!(store.counts().await.parents, 0);
}

#[tokio::test]
async fn ensure_reference_is_idempotent() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);

    let (first, created) = registrar
        .ensure_reference(RefKind::Occupation, &occupation("Chofer"))
        .await
        .unwrap();
    assert!(created);

    let (second, created) = registrar
        .ensure_reference(RefKind::Occupation, &occupation("Chofer"))
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(first, second);
}

#[tokio::test]
async fn missing_reads_are_not_found() {
    let store = MemoryStore::new();
    let registrar = Registrar::new(&store);

    assert!(matches!(
        registrar.student(&dni("12345678")).await.unwrap_err(),
        DbError::NotFound { resource: "student", .. }
    ));
    assert!(matches!(
        registrar.parent(ParentDni::new(5).unwrap()).await.unwrap_err(),
        DbError::NotFound { resource: "parent", .. }
    ));
}

// ============================================================================
// Postgres (run with DATABASE_URL set: cargo test -p schoolctl-server -- --ignored)
// ============================================================================

async fn pg_store() -> PgStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let pool = crate::db::create_pool(&url).await.expect("pool creation failed");
    crate::db::migrations::run(&pool).await.expect("migrations failed");
    PgStore::new(pool)
}

/// Unique-per-run student IDs so reruns don't collide
fn run_dni(suffix: u32) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    format!("T{:09}{:02}", nanos, suffix)
}

#[tokio::test]
#[ignore = "requires database"]
async fn pg_failed_address_rolls_back() {
    let store = pg_store().await;
    let registrar = Registrar::new(&store);
    let id = run_dni(1);

    let reg = StudentRegistration::new(student(&id))
        .with_birthplace(place(&format!("Lugar {}", id)))
        .with_address(AddressInput::New(AddressFields {
            manzana: Some("M".repeat(40)),
            ..Default::default()
        }));

    let err = registrar.create_student(&reg).await.unwrap_err();
    assert!(matches!(err, DbError::Sqlx(_)));
    assert!(registrar.student(&dni(&id)).await.is_err());

    let places = registrar.references(RefKind::Place).await.unwrap();
    assert!(!places.iter().any(|p| p.name == format!("Lugar {}", id)));
}

#[tokio::test]
#[ignore = "requires database"]
async fn pg_birthplace_reused_and_duplicate_rejected() {
    let store = pg_store().await;
    let registrar = Registrar::new(&store);
    let lugar = format!("Lugar {}", run_dni(0));

    let a = run_dni(2);
    let b = run_dni(3);
    for id in [&a, &b] {
        let reg = StudentRegistration::new(student(id)).with_birthplace(place(&lugar));
        registrar.create_student(&reg).await.unwrap();
    }

    let places = registrar.references(RefKind::Place).await.unwrap();
    assert_eq!(places.iter().filter(|p| p.name == lugar).count(), 1);

    let err = registrar
        .create_student(&StudentRegistration::new(student(&a)))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::DuplicateKey { .. }));

    registrar.delete_student(&dni(&a)).await.unwrap();
    registrar.delete_student(&dni(&b)).await.unwrap();
}

#[tokio::test]
#[ignore = "requires database"]
async fn pg_concurrent_get_or_create_yields_one_row() {
    let store = pg_store().await;
    let name = occupation(&format!("Oficio {}", run_dni(4)));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let name = name.clone();
            tokio::spawn(async move {
                Registrar::new(&store)
                    .ensure_reference(RefKind::Occupation, &name)
                    .await
                    .expect("get-or-create failed")
                    .0
                    .id
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.expect("task panicked"));
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
}
