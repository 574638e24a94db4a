use std::env;
use std::fs::write;
use std::path::PathBuf;

use serial_test::serial;
use tempfile::NamedTempFile;

use issuu_drive_sync::error::FatalError;
use issuu_drive_sync::load_config::{load_config, DRIVE_TOKEN_VAR, EMAIL_PASSWORD_VAR};

const VALID_CONFIG: &str = r#"
handles:
  - pubhouse
  - otherpub
cutoff_date: 2025-01-31
drive_folder_id: "folder-123"
notify:
  sender: bot@example.com
  recipients:
    - owner@example.com
"#;

fn set_credentials() {
    env::set_var(DRIVE_TOKEN_VAR, "test-drive-token");
    env::set_var(EMAIL_PASSWORD_VAR, "test-app-password");
}

#[test]
#[serial]
fn loads_static_config_and_injects_credentials_from_env() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), VALID_CONFIG).unwrap();
    set_credentials();

    let job = load_config(config_file.path()).expect("config should load");

    assert_eq!(job.sync.handles, vec!["pubhouse", "otherpub"]);
    assert_eq!(job.sync.cutoff_date.to_string(), "2025-01-31");
    assert_eq!(job.sync.drive_folder_id, "folder-123");
    assert_eq!(job.sync.notify.sender, "bot@example.com");
    assert_eq!(job.sync.notify.recipients, vec!["owner@example.com"]);
    assert_eq!(job.drive_token, "test-drive-token");
    assert_eq!(job.smtp_password, "test-app-password");

    // Defaults for the optional fields.
    assert_eq!(
        job.sync.state_path,
        PathBuf::from("data/processed_publications.json")
    );
    assert_eq!(job.sync.list_depth, 10);
    assert_eq!(job.sync.notify.smtp_host, "smtp.gmail.com");
}

#[test]
#[serial]
fn missing_credential_env_is_a_credential_error() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), VALID_CONFIG).unwrap();
    env::remove_var(DRIVE_TOKEN_VAR);
    env::remove_var(EMAIL_PASSWORD_VAR);

    let err = load_config(config_file.path()).unwrap_err();
    assert!(matches!(err, FatalError::Credential(_)));
    assert!(err.to_string().contains(DRIVE_TOKEN_VAR));
}

#[test]
#[serial]
fn invalid_yaml_is_a_config_error() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), b"not-yaml: [:::").unwrap();
    set_credentials();

    let err = load_config(config_file.path()).unwrap_err();
    assert!(matches!(err, FatalError::Config(_)));
}

#[test]
#[serial]
fn empty_handle_list_is_rejected() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(
        config_file.path(),
        r#"
handles: []
cutoff_date: 2025-01-31
drive_folder_id: "folder-123"
notify:
  sender: bot@example.com
  recipients:
    - owner@example.com
"#,
    )
    .unwrap();
    set_credentials();

    let err = load_config(config_file.path()).unwrap_err();
    assert!(err.to_string().contains("handles"));
}

#[test]
#[serial]
fn missing_config_file_is_a_config_error() {
    set_credentials();
    let err = load_config("/definitely/not/here.yaml").unwrap_err();
    assert!(matches!(err, FatalError::Config(_)));
}
