use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use wastewatch::config::{ClientConfig, Theme};
use wastewatch::Facing;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "WASTEWATCH_CONFIG",
        "WASTEWATCH_BASE_URL",
        "WASTEWATCH_ATTEMPT_TIMEOUT_SECS",
        "WASTEWATCH_UPLOAD_BUDGET_SECS",
        "WASTEWATCH_MAX_ATTEMPTS",
        "WASTEWATCH_RETRY_DELAY_MS",
        "WASTEWATCH_THEME",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ClientConfig::load().expect("load config");

    assert_eq!(cfg.base_url.as_str(), "http://localhost:5000/");
    assert_eq!(cfg.upload.attempt_timeout, Duration::from_secs(30));
    assert_eq!(cfg.upload.total_budget, Duration::from_secs(60));
    assert_eq!(cfg.upload.max_attempts, 3);
    assert_eq!(cfg.upload.retry_delay, Duration::from_millis(1000));
    assert_eq!(cfg.compression.max_dimension, 1024);
    assert!((cfg.compression.quality - 0.7).abs() < f32::EPSILON);
    assert_eq!(cfg.health_timeout, Duration::from_secs(5));
    assert_eq!(cfg.alerts_timeout, Duration::from_secs(10));
    assert_eq!(cfg.facing, Facing::Environment);
    assert_eq!(cfg.theme(), Theme::Light);
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "base_url": "https://waste.example.test/api",
            "upload": {
                "attempt_timeout_secs": 15,
                "total_budget_secs": 45,
                "max_attempts": 5,
                "retry_delay_ms": 2000
            },
            "compression": {
                "max_dimension": 800,
                "quality": 0.8
            },
            "camera": { "facing": "user" },
            "health_timeout_secs": 3,
            "theme": "dark"
        }"#,
    );

    std::env::set_var("WASTEWATCH_CONFIG", file.path());
    std::env::set_var("WASTEWATCH_MAX_ATTEMPTS", "2");
    std::env::set_var("WASTEWATCH_THEME", "light");

    let cfg = ClientConfig::load().expect("load config");

    assert_eq!(cfg.base_url.as_str(), "https://waste.example.test/api/");
    assert_eq!(cfg.upload.attempt_timeout, Duration::from_secs(15));
    assert_eq!(cfg.upload.total_budget, Duration::from_secs(45));
    assert_eq!(cfg.upload.max_attempts, 2);
    assert_eq!(cfg.upload.retry_delay, Duration::from_millis(2000));
    assert_eq!(cfg.compression.max_dimension, 800);
    assert_eq!(cfg.facing, Facing::User);
    assert_eq!(cfg.health_timeout, Duration::from_secs(3));
    assert_eq!(cfg.alerts_timeout, Duration::from_secs(10));
    assert_eq!(cfg.theme(), Theme::Light);

    clear_env();
}

#[test]
fn env_base_url_overrides_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(r#"{ "base_url": "http://file.example.test" }"#);
    std::env::set_var("WASTEWATCH_CONFIG", file.path());
    std::env::set_var("WASTEWATCH_BASE_URL", "http://10.0.0.5:5000");

    let cfg = ClientConfig::load().expect("load config");
    assert_eq!(cfg.base_url.as_str(), "http://10.0.0.5:5000/");

    clear_env();
}

#[test]
fn rejects_zero_attempts() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("WASTEWATCH_MAX_ATTEMPTS", "0");
    assert!(ClientConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_quality_out_of_range() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(r#"{ "compression": { "quality": 1.5 } }"#);
    std::env::set_var("WASTEWATCH_CONFIG", file.path());
    assert!(ClientConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_malformed_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("WASTEWATCH_RETRY_DELAY_MS", "soon");
    assert!(ClientConfig::load().is_err());
    clear_env();

    std::env::set_var("WASTEWATCH_THEME", "sepia");
    assert!(ClientConfig::load().is_err());
    clear_env();

    std::env::set_var("WASTEWATCH_BASE_URL", "ftp://example.test");
    assert!(ClientConfig::load().is_err());
    clear_env();
}

#[test]
fn missing_config_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("WASTEWATCH_CONFIG", "/nonexistent/wastewatch.json");
    assert!(ClientConfig::load().is_err());

    clear_env();
}
