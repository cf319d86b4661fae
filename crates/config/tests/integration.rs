//! Integration tests for config

#[cfg(test)]
mod tests {
    use abroot_config::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to ensure env var tests don't run concurrently
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        std::env::remove_var("ABROOT_KARGS_PATH");
        std::env::remove_var("ABROOT_VERBOSE");
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[general]
verbose = true

[image]
registry = "registry.example.com"
name = "os/desktop"
tag = "dev"

[packages]
pre_command = "lpkg --unlock"
post_command = "lpkg --lock"

[partitions]
label_a = "root-a"
label_b = "root-b"

[boot]
thin_provisioning = true
thin_init_volume = "init"
        "#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.image.reference(), "registry.example.com/os/desktop:dev");
        assert_eq!(config.packages.pre_command, "lpkg --unlock");
        assert_eq!(config.packages.add_command, "apt-get install -y");
        assert_eq!(config.partitions.label_a, "root-a");
        assert_eq!(config.partitions.label_boot, "vos-boot");
        assert!(config.boot.thin_provisioning);
        assert_eq!(config.boot.thin_init_volume, "init");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let err = Config::load_from_file(std::path::Path::new("/nonexistent/abroot.toml"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            abroot_errors::Error::Config(abroot_errors::ConfigError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_identical_slot_labels_rejected() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[partitions]\nlabel_a = \"x\"\nlabel_b = \"x\"").unwrap();
        assert!(Config::load_from_file(temp_file.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_thin_provisioning_requires_volume() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[boot]\nthin_provisioning = true").unwrap();
        assert!(Config::load_from_file(temp_file.path()).await.is_err());
    }

    #[test]
    fn test_default_paths() {
        let config = Config::default();
        assert_eq!(config.lock_path(), PathBuf::from("/tmp/ABSystem.Upgrade.lock"));
        assert_eq!(config.kargs_path(), PathBuf::from("/etc/abroot/kargs"));
        assert_eq!(config.overlay_dir(), PathBuf::from(fixed_paths::OVERLAY_DIR));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var("ABROOT_KARGS_PATH", "/tmp/kargs-test");
        std::env::set_var("ABROOT_VERBOSE", "yes");

        let mut config = Config::default();
        config.merge_env().unwrap();

        assert_eq!(config.kargs_path(), PathBuf::from("/tmp/kargs-test"));
        assert!(config.general.verbose);

        clear_env();
    }

    #[test]
    fn test_invalid_env_value() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var("ABROOT_VERBOSE", "loud");

        let mut config = Config::default();
        let result = config.merge_env();
        assert!(result.is_err());

        clear_env();
    }
}
