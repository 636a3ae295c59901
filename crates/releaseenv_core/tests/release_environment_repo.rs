use releaseenv_core::db::open_db_in_memory;
use releaseenv_core::{
    NewReleaseEnvironment, ReleaseEnvironmentKey, ReleaseEnvironmentRepository, RepoError,
    SqliteReleaseEnvironmentRepository,
};

const T0: i64 = 1_700_000_000_000;

fn new_row(organization_id: u32, project_id: u32, at: i64) -> NewReleaseEnvironment {
    NewReleaseEnvironment::observed(ReleaseEnvironmentKey::new(organization_id, project_id, 30, 40), at)
}

#[test]
fn insert_and_get_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteReleaseEnvironmentRepository::new(&conn);

    let created = repo.insert(&new_row(1, 2, T0)).unwrap();
    let loaded = repo.get(created.id).unwrap();

    assert_eq!(loaded, created);
    assert_eq!(loaded.first_seen, T0);
    assert_eq!(loaded.last_seen, T0);
}

#[test]
fn get_missing_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteReleaseEnvironmentRepository::new(&conn);

    let err = repo.get(404).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(404)));
}

#[test]
fn duplicate_natural_key_reports_unique_violation() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteReleaseEnvironmentRepository::new(&conn);

    repo.insert(&new_row(1, 2, T0)).unwrap();
    let err = repo.insert(&new_row(1, 2, T0 + 1)).unwrap_err();

    assert!(matches!(err, RepoError::UniqueViolation(_)), "got {err}");
}

#[test]
fn find_by_key_ignores_project_and_orders_by_id() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteReleaseEnvironmentRepository::new(&conn);

    let first = repo.insert(&new_row(1, 20, T0)).unwrap();
    let second = repo.insert(&new_row(1, 10, T0)).unwrap();
    repo.insert(&new_row(2, 30, T0)).unwrap();

    let rows = repo.find_by_key(30, 1, 40).unwrap();
    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);

    assert!(repo.find_by_key(31, 1, 40).unwrap().is_empty());
}

#[test]
fn find_exact_returns_lowest_id_or_none() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteReleaseEnvironmentRepository::new(&conn);

    assert_eq!(repo.find_exact(30, 1, 40).unwrap(), None);

    let first = repo.insert(&new_row(1, 20, T0)).unwrap();
    repo.insert(&new_row(1, 10, T0)).unwrap();

    assert_eq!(repo.find_exact(30, 1, 40).unwrap(), Some(first));
}

#[test]
fn touch_last_seen_only_moves_stale_rows() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteReleaseEnvironmentRepository::new(&conn);
    let row = repo.insert(&new_row(1, 2, T0)).unwrap();

    let affected = repo.touch_last_seen(row.id, T0, T0 + 60_000).unwrap();
    assert_eq!(affected, 0, "stored value equal to threshold is not older");
    assert_eq!(repo.get(row.id).unwrap().last_seen, T0);

    let affected = repo.touch_last_seen(row.id, T0 + 1, T0 + 61_000).unwrap();
    assert_eq!(affected, 1);
    let updated = repo.get(row.id).unwrap();
    assert_eq!(updated.last_seen, T0 + 61_000);
    assert_eq!(updated.first_seen, T0);

    let affected = repo.touch_last_seen(row.id, T0 + 1, T0 + 120_000).unwrap();
    assert_eq!(affected, 0, "racer already refreshed");

    assert_eq!(repo.touch_last_seen(9_999, i64::MAX, T0).unwrap(), 0);
}

#[test]
fn insert_rejects_last_seen_before_first_seen() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteReleaseEnvironmentRepository::new(&conn);

    let mut payload = new_row(1, 2, T0);
    payload.last_seen = T0 - 1;
    let err = repo.insert(&payload).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}
