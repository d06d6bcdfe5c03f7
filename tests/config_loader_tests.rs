use rosters::config::{CommitMode, ConfigError, ConfigLoader, CountingMode};
use std::{
    env, fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, OnceLock},
};
use tempfile::TempDir;

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn clear_env() {
    unsafe {
        env::remove_var("ROSTERS_PROFILE");
        env::remove_var("ROSTERS_API_BIND_ADDR");
        env::remove_var("ROSTERS_LOG_LEVEL");
        env::remove_var("ROSTERS_JWT_SECRET");
        env::remove_var("ROSTERS_INGEST_FLUSH_SIZE");
        env::remove_var("ROSTERS_INGEST_COMMIT_MODE");
        env::remove_var("ROSTERS_RECONCILE_COUNTING");
        env::remove_var("ROSTERS_ARTIFACT_EXTENSION");
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    let path = dir.path().join(name);
    fs::write(path, contents).unwrap();
}

#[test]
fn loads_defaults_when_no_env_present() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:8080");
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.jwt_secret, None);
    assert_eq!(cfg.ingest.flush_size, 5000);
    assert_eq!(cfg.ingest.commit_mode, CommitMode::PerChunk);
    assert_eq!(cfg.reconcile.counting, CountingMode::PerCall);
    assert_eq!(cfg.reconcile.artifact_extension, "png");
    cfg.bind_addr().expect("default bind addr parses");
    clear_env();
}

#[test]
fn layered_env_files_apply_in_order() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "ROSTERS_API_BIND_ADDR=127.0.0.1:3000\n");
    write_env_file(
        &temp_dir,
        ".env.test",
        "ROSTERS_API_BIND_ADDR=192.168.0.10:5000\nROSTERS_INGEST_FLUSH_SIZE=250\n",
    );
    write_env_file(
        &temp_dir,
        ".env.test.local",
        "ROSTERS_API_BIND_ADDR=10.0.0.5:6000\n",
    );

    // Select profile via .env.local before profile-specific files load.
    write_env_file(
        &temp_dir,
        ".env.local",
        "ROSTERS_PROFILE=test\nROSTERS_API_BIND_ADDR=127.0.0.1:4000\n",
    );

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads with layered env files");

    assert_eq!(cfg.profile, "test");
    assert_eq!(cfg.api_bind_addr, "10.0.0.5:6000");
    assert_eq!(cfg.ingest.flush_size, 250);
    clear_env();
}

#[test]
fn os_environment_has_highest_precedence() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "ROSTERS_API_BIND_ADDR=127.0.0.1:3000\nROSTERS_INGEST_COMMIT_MODE=per_chunk\n",
    );

    unsafe {
        env::set_var("ROSTERS_API_BIND_ADDR", "0.0.0.0:9090");
        env::set_var("ROSTERS_INGEST_COMMIT_MODE", "atomic");
        env::set_var("ROSTERS_RECONCILE_COUNTING", "cumulative");
        env::set_var("ROSTERS_ARTIFACT_EXTENSION", ".PNG");
    }

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads with env override");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:9090");
    assert_eq!(cfg.ingest.commit_mode, CommitMode::Atomic);
    assert_eq!(cfg.reconcile.counting, CountingMode::Cumulative);
    assert_eq!(cfg.reconcile.artifact_extension, "png");

    clear_env();
}

#[test]
fn invalid_bind_addr_returns_error() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    unsafe {
        env::set_var("ROSTERS_API_BIND_ADDR", "not-an-addr");
    }
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let err = loader.load().expect_err("invalid bind addr should fail");
    assert!(format!("{}", err).contains("invalid api bind address"));

    clear_env();
}

#[test]
fn invalid_ingest_settings_are_rejected() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));

    unsafe {
        env::set_var("ROSTERS_INGEST_FLUSH_SIZE", "0");
    }
    let err = loader.load().expect_err("zero flush size should fail");
    assert!(matches!(err, ConfigError::InvalidFlushSize { value: 0 }));

    unsafe {
        env::set_var("ROSTERS_INGEST_FLUSH_SIZE", "lots");
    }
    let err = loader.load().expect_err("non-numeric flush size should fail");
    assert!(matches!(err, ConfigError::InvalidNumber { key: "INGEST_FLUSH_SIZE", .. }));

    unsafe {
        env::remove_var("ROSTERS_INGEST_FLUSH_SIZE");
        env::set_var("ROSTERS_INGEST_COMMIT_MODE", "sometimes");
    }
    let err = loader.load().expect_err("unknown commit mode should fail");
    assert!(format!("{}", err).contains("ROSTERS_INGEST_COMMIT_MODE"));

    clear_env();
}

#[test]
fn jwt_secret_required_outside_local_profiles() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));

    unsafe {
        env::set_var("ROSTERS_PROFILE", "prod");
    }
    let err = loader.load().expect_err("prod without secret should fail");
    assert!(matches!(err, ConfigError::MissingJwtSecret));

    unsafe {
        env::set_var("ROSTERS_JWT_SECRET", "a-long-enough-signing-secret");
    }
    let cfg = loader.load().expect("prod with secret loads");
    assert_eq!(cfg.jwt_secret.as_deref(), Some("a-long-enough-signing-secret"));
    assert!(
        !cfg.redacted_json()
            .unwrap()
            .contains("a-long-enough-signing-secret")
    );

    clear_env();
}
