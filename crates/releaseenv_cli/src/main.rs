//! CLI probe for the release environment resolver.
//!
//! Usage:
//! `releaseenv_cli <db_path> <organization_id> <project_id> <release_id> <environment_id> [observed_at_ms]`
//!
//! Opens (or creates) the SQLite store, resolves one association with
//! process-local cache and lock adapters, and prints it as JSON.
//!
//! Set `RELEASEENV_LOG_DIR` to an absolute directory to write rolling log files.

use releaseenv_core::db::open_db;
use releaseenv_core::{
    core_version, default_log_level, init_logging, Clock, InMemoryCache, InMemoryLockService, ReleaseEnvironmentKey,
    ReleaseEnvironmentService, SqliteReleaseEnvironmentRepository, SystemClock,
};
use std::process::ExitCode;
use std::sync::Arc;

const LOG_DIR_ENV: &str = "RELEASEENV_LOG_DIR";
const USAGE: &str = "usage: releaseenv_cli <db_path> <organization_id> <project_id> <release_id> <environment_id> [observed_at_ms]";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let log_dir = std::env::var(LOG_DIR_ENV).ok();
    match run(&args, log_dir.as_deref()) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("releaseenv_cli {}: {message}", core_version());
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String], log_dir: Option<&str>) -> Result<String, String> {
    if args.len() != 5 && args.len() != 6 {
        return Err(USAGE.to_string());
    }

    if let Some(log_dir) = log_dir {
        init_logging(default_log_level(), log_dir)
            .map_err(|err| format!("{LOG_DIR_ENV}: {err}"))?;
    }

    let key = ReleaseEnvironmentKey::new(
        parse_id("organization_id", &args[1])?,
        parse_id("project_id", &args[2])?,
        parse_id("release_id", &args[3])?,
        parse_id("environment_id", &args[4])?,
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let observed_at = match args.get(5) {
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|err| format!("invalid observed_at_ms `{raw}`: {err}"))?,
        None => clock.now_epoch_ms(),
    };

    let conn = open_db(&args[0]).map_err(|err| format!("failed to open `{}`: {err}", args[0]))?;
    let service = ReleaseEnvironmentService::new(
        SqliteReleaseEnvironmentRepository::new(&conn),
        Arc::new(InMemoryCache::new(clock.clone())),
        Arc::new(InMemoryLockService::new(clock.clone())),
        clock,
    );

    let outcome = service
        .resolve_with_outcome(&key, observed_at)
        .map_err(|err| format!("resolve failed: {err}"))?;
    log::info!(
        "event=cli_resolve module=cli status=ok id={} created={}",
        outcome.release_environment.id,
        outcome.created
    );

    serde_json::to_string_pretty(&outcome.release_environment)
        .map_err(|err| format!("failed to encode result: {err}"))
}

fn parse_id(name: &str, raw: &str) -> Result<u32, String> {
    raw.parse::<u32>()
        .map_err(|err| format!("invalid {name} `{raw}`: {err}"))
}

#[cfg(test)]
mod tests {
    use super::{parse_id, run};
    use releaseenv_core::logging_status;

    fn resolve_args(db_path: &std::path::Path) -> Vec<String> {
        [
            db_path.to_str().expect("temp path should be UTF-8"),
            "1",
            "2",
            "3",
            "4",
            "1700000000000",
        ]
        .iter()
        .map(|value| value.to_string())
        .collect()
    }

    #[test]
    fn rejects_wrong_argument_count() {
        let err = run(&["only-db".to_string()], None).expect_err("missing ids must fail");
        assert!(err.starts_with("usage:"));
    }

    #[test]
    fn parse_id_names_the_bad_field() {
        let err = parse_id("release_id", "-4").expect_err("negative ids must fail");
        assert!(err.contains("release_id"));
    }

    #[test]
    fn resolves_into_file_database() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let args = resolve_args(&dir.path().join("store.sqlite3"));

        let first = run(&args, None).expect("first resolve should succeed");
        let second = run(&args, None).expect("second resolve should succeed");
        assert_eq!(first, second);
        assert!(first.contains("\"project_id\": 2"));
    }

    #[test]
    fn relative_log_dir_is_rejected_before_opening_store() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let db_path = dir.path().join("store.sqlite3");

        let err = run(&resolve_args(&db_path), Some("logs")).expect_err("relative dir must fail");
        assert!(err.contains("RELEASEENV_LOG_DIR"));
        assert!(err.contains("absolute"));
        assert!(!db_path.exists());
    }

    #[test]
    fn log_dir_starts_file_logging() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let log_dir = dir.path().join("logs");
        let log_dir_str = log_dir.to_str().expect("temp path should be UTF-8");

        run(&resolve_args(&dir.path().join("store.sqlite3")), Some(log_dir_str))
            .expect("resolve with logging should succeed");

        let (_, active_dir) = logging_status().expect("logging should be active");
        assert_eq!(active_dir, log_dir);
        assert!(log_dir.is_dir());
    }
}
