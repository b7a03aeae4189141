//! Tests for settings loading and validation.
use super::*;
use figment::Jail;

#[test]
fn test_settings_validation() {
    let settings = Settings::default();
    assert!(settings.validate().is_ok());

    let mut invalid = settings.clone();
    invalid.log_level = "loud".to_string();
    assert!(invalid.validate().is_err());

    let mut invalid = settings.clone();
    invalid.auth.token_ttl_secs = 0;
    assert!(invalid.validate().is_err());

    let mut invalid = settings.clone();
    invalid.password_requirements.min_length = 4;
    assert!(invalid.validate().is_err());

    let mut invalid = settings.clone();
    invalid.password_requirements.min_character_classes = 5;
    assert!(invalid.validate().is_err());

    let mut invalid = settings.clone();
    invalid.rate_limit.form_max_requests = 0;
    assert!(invalid.validate().is_err());

    let mut invalid = settings.clone();
    invalid.auth.jwt_secret = Some("short".to_string());
    assert!(invalid.validate().is_err());

    let mut invalid = settings.clone();
    invalid.backup.daily_at_hour = Some(24);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_default_limits() {
    let settings = Settings::default();
    assert_eq!(settings.auth.token_ttl(), Duration::from_secs(86_400));
    assert_eq!(settings.auth.remember_me_ttl(), Duration::from_secs(604_800));
    assert_eq!(settings.rate_limit.max_requests, 1000);
    assert_eq!(settings.rate_limit.form_max_requests, 5);
    assert_eq!(settings.backup.max_backups, 30);
}

#[test]
fn test_load_settings_layers_file_and_env() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            bind_addr = "0.0.0.0:8080"
            log_level = "debug"

            [storage]
            data_dir = "test_data"

            [auth]
            token_ttl_secs = 3600
            "#,
        )?;
        jail.set_env("DINGFENG_LOG_LEVEL", "warn");
        jail.set_env("DINGFENG_RATE_LIMIT__FORM_MAX_REQUESTS", "9");

        let settings = Settings::load().map_err(|e| e.to_string())?;
        assert_eq!(settings.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(settings.storage.data_dir, PathBuf::from("test_data"));
        // Environment variables take precedence over the file
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.auth.token_ttl_secs, 3600);
        assert_eq!(settings.rate_limit.form_max_requests, 9);
        // Untouched sections keep their defaults
        assert_eq!(settings.auth.remember_me_ttl_secs, 7 * 24 * 60 * 60);
        Ok(())
    });
}

#[test]
fn test_load_rejects_invalid_file() {
    Jail::expect_with(|jail| {
        jail.create_file("bad.toml", "log_level = \"chatty\"")?;
        assert!(Settings::load_from("bad.toml").is_err());
        Ok(())
    });
}

#[test]
fn test_with_data_root() {
    let settings = Settings::default().with_data_root("/tmp/site");
    assert_eq!(settings.storage.data_dir, PathBuf::from("/tmp/site"));
    assert_eq!(settings.storage.backup_dir, PathBuf::from("/tmp/site/backups"));
}
