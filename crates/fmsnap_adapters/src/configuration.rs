use std::path::PathBuf;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use fmsnap_core::config::Settings;

pub fn get_configuration_with_paths(
    current_dir_path: Option<PathBuf>,
    system_config_dir_path: Option<PathBuf>,
) -> Result<Settings, config::ConfigError> {
    let config_directory = current_dir_path.unwrap_or_else(|| {
        std::env::current_dir()
            .map(|p| p.join("config"))
            .unwrap_or_else(|_| PathBuf::from("config"))
    });

    let system_config_dir = if let Some(path) = system_config_dir_path {
        path
    } else {
        ProjectDirs::from("com", "fmsnap", "fmsnap")
            .map(|d| d.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("config"))
    };

    let settings = Config::builder()
        .set_default("service.setup_url", "https://setup.icloud.com/setup/ws/1")?
        .set_default("service.timeout_secs", 30)?
        .set_default("snapshot.output_dir", None::<String>)?
        .set_default("log_level", "info")?
        .add_source(File::from(system_config_dir.join("config.toml")).required(false))
        .add_source(File::from(config_directory.join("config.toml")).required(false))
        .add_source(Environment::with_prefix("FMSNAP").separator("__"))
        .build()?;

    settings.try_deserialize::<Settings>()
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    get_configuration_with_paths(None, None)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;
    use tempfile::tempdir;

    use super::*;

    fn clear_env() {
        for (key, _) in std::env::vars() {
            if key.starts_with("FMSNAP__") {
                std::env::remove_var(&key);
            }
        }
    }

    #[serial]
    #[test]
    fn test_get_configuration_defaults() {
        clear_env();

        let settings = get_configuration_with_paths(
            Some(PathBuf::from("/nonexistent")),
            Some(PathBuf::from("/nonexistent")),
        )
        .unwrap();

        assert_eq!(
            settings.service.setup_url,
            "https://setup.icloud.com/setup/ws/1"
        );
        assert_eq!(settings.service.timeout_secs, 30);
        assert!(settings.snapshot.output_dir.is_none());
        assert_eq!(settings.log_level, "info");
    }

    #[serial]
    #[test]
    fn test_get_configuration_file_override() {
        clear_env();

        let dir = tempdir().unwrap();
        let config_file_path = dir.path().join("config.toml");

        let config_content = r#"
        service.setup_url = "https://setup.example.invalid/ws/1"
        snapshot.output_dir = "/tmp/snapshots"
        log_level = "debug"
        "#;

        let mut file = std::fs::File::create(&config_file_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let settings = get_configuration_with_paths(
            Some(dir.path().to_path_buf()),
            Some(PathBuf::from("/nonexistent")),
        )
        .unwrap();

        assert_eq!(
            settings.service.setup_url,
            "https://setup.example.invalid/ws/1"
        );
        assert_eq!(
            settings.snapshot.output_dir,
            Some(PathBuf::from("/tmp/snapshots"))
        );
        assert_eq!(settings.log_level, "debug");
    }

    #[serial]
    #[test]
    fn test_get_configuration_env_override() {
        clear_env();

        std::env::set_var("FMSNAP__SERVICE__TIMEOUT_SECS", "5");
        std::env::set_var("FMSNAP__LOG_LEVEL", "trace");

        let settings = get_configuration_with_paths(
            Some(PathBuf::from("/nonexistent")),
            Some(PathBuf::from("/nonexistent")),
        )
        .unwrap();

        assert_eq!(settings.service.timeout_secs, 5);
        assert_eq!(settings.log_level, "trace");

        std::env::remove_var("FMSNAP__SERVICE__TIMEOUT_SECS");
        std::env::remove_var("FMSNAP__LOG_LEVEL");
    }
}
