// Configuration loading from disk, as the binary does it

use inkmark::config::{Config, LogFormat};
use inkmark::watermark::FilenamePolicy;
use std::io::Write;
use tempfile::NamedTempFile;

/// Test: a full configuration file round-trips into typed settings
#[test]
fn test_full_config_file_loads() {
    let mut temp_file = NamedTempFile::new().unwrap();
    let config_yaml = r##"
compositor:
  canvas_width: 1920
  canvas_height: 1080
  frame_rate: 120
  fill_color: "#EEE"
  stroke_color: "#202020"
  stroke_width: 3
loader:
  timeout_seconds: 10
export:
  default_filename: "boring-paper-watermarked.png"
  filename_policy: preserve
submission:
  base_url: "http://scanner.internal:8081"
  protected_path: "/api/sdk/upload"
  unprotected_path: "/api/sdk/upload-vulnerable"
  max_upload_bytes: 5242880
  timeout_seconds: 15
logging:
  format: pretty
  level: "inkmark=debug"
"##;
    temp_file.write_all(config_yaml.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.compositor.frame_rate, 120);
    assert_eq!(config.compositor.stroke_width, 3.0);
    assert_eq!(config.loader.timeout_seconds, 10);
    assert_eq!(config.export.filename_policy, FilenamePolicy::Preserve);
    assert_eq!(config.logging.format, LogFormat::Pretty);

    let options = config
        .submission
        .to_pipeline_options(config.export.filename_policy);
    assert_eq!(options.max_upload_bytes, 5 * 1024 * 1024);
    assert_eq!(
        options.endpoints.protected,
        "http://scanner.internal:8081/api/sdk/upload"
    );

    let encoder = config.export.to_encoder();
    assert_eq!(encoder.filename_for(None), "boring-paper-watermarked.png");
    assert_eq!(
        encoder.filename_for(Some("evil/../../secret.txt")),
        "evil/../../secret.png"
    );
}

/// Test: invalid values parse but fail validation with a pointed message
#[test]
fn test_invalid_config_rejected_by_validate() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(b"submission:\n  unprotected_path: \"upload-vulnerable\"\n")
        .unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.contains("unprotected_path"), "{}", err);
}

/// Test: malformed YAML is a load error, not a panic
#[test]
fn test_malformed_yaml_is_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"compositor: [1, 2\n").unwrap();
    temp_file.flush().unwrap();

    assert!(Config::from_file(temp_file.path()).is_err());
}
