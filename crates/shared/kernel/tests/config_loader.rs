use fgate_kernel::config::{ConfigError, load_config, load_config_with_env};
use fgate_kernel::domain::config::ApiConfig;
use serial_test::serial;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn env(pairs: &[(&str, &str)]) -> Option<config::Map<String, String>> {
    Some(pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect())
}

fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("server.toml");
    std::fs::write(
        &path,
        r#"
[server]
port = 9000

[security]
api_key = "from-file"

[storage]
root = "/srv/files"
"#,
    )
    .unwrap();
    dir.join("server")
}

#[test]
fn file_values_are_loaded() {
    let temp = TempDir::new().unwrap();
    let path = write_config(temp.path());

    let cfg: ApiConfig = load_config_with_env(Some(&path), env(&[])).unwrap();
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.security.api_key, "from-file");
    assert_eq!(cfg.storage.root, PathBuf::from("/srv/files"));
    assert_eq!(cfg.storage.chunk_size, 1024 * 1024);
}

#[test]
fn environment_overrides_file() {
    let temp = TempDir::new().unwrap();
    let path = write_config(temp.path());

    let cfg: ApiConfig = load_config_with_env(
        Some(&path),
        env(&[
            ("FGATE__SECURITY__API_KEY", "from-env"),
            ("FGATE__SERVER__PORT", "9443"),
            ("FGATE__SECURITY__CORS__ALLOWED_ORIGINS", "https://a.example,https://b.example"),
            ("UNRELATED__SERVER__PORT", "1"),
        ]),
    )
    .unwrap();

    assert_eq!(cfg.security.api_key, "from-env");
    assert_eq!(cfg.server.port, 9443);
    assert_eq!(
        cfg.security.cors.allowed_origins,
        ["https://a.example", "https://b.example"]
    );
}

#[test]
fn explicit_missing_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    let result: Result<ApiConfig, ConfigError> =
        load_config_with_env(Some(temp.path().join("absent")), env(&[]));
    assert!(matches!(result, Err(ConfigError::Config { .. })));
}

#[test]
#[serial]
fn default_file_is_optional() {
    let temp = TempDir::new().unwrap();
    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(temp.path()).unwrap();

    let cfg: Result<ApiConfig, ConfigError> = load_config_with_env(None::<&str>, env(&[]));

    std::env::set_current_dir(previous).unwrap();
    let cfg = cfg.unwrap();
    assert_eq!(cfg.server.port, 4583);
    assert!(cfg.security.api_key.is_empty());
}

#[test]
#[serial]
fn default_file_is_picked_up_from_working_directory() {
    let temp = TempDir::new().unwrap();
    write_config(temp.path());
    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(temp.path()).unwrap();

    let cfg: Result<ApiConfig, ConfigError> = load_config(None::<&str>);

    std::env::set_current_dir(previous).unwrap();
    assert_eq!(cfg.unwrap().server.port, 9000);
}
