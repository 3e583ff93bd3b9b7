#[cfg(test)]
mod tests {
    use crate::config::*;
    use crate::error::Result;
    use std::time::Duration;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.services.monitored, MonitoredServices::List(vec![]));
        assert!(config.services.auto_restart);
        assert_eq!(config.services.max_restart_attempts, 3);
        assert_eq!(config.services.restart_delay, 30);
        assert_eq!(config.control_plane.call_timeout_secs, 10);
        assert!(config.notifications.enabled);
        assert_eq!(config.notifications.recipient, "root");
        assert_eq!(config.notifications.webhook_url, None);
    }

    #[test]
    fn test_missing_keys_use_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "services:\n  monitored: [sshd, cron]\n  max_restart_attempts: 5\n",
        )?;

        let config = Config::load(Some(path))?;
        assert_eq!(config.services.max_restart_attempts, 5);
        assert_eq!(config.services.restart_delay, 30);
        assert!(config.services.auto_restart);
        assert_eq!(config.control_plane, ControlPlaneConfig::default());
        assert_eq!(config.notifications, NotificationConfig::default());

        Ok(())
    }

    #[test]
    fn test_empty_file_is_all_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "")?;

        assert_eq!(Config::load(Some(path))?, Config::default());
        Ok(())
    }

    #[test]
    fn test_config_load_missing() -> Result<()> {
        let config = Config::load(Some("/nonexistent/config.yaml".into()))?;
        assert_eq!(config, Config::default());
        assert!(config.service_list().is_empty());
        Ok(())
    }

    #[test]
    fn test_inline_service_string_is_split_and_normalized() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "services:\n  monitored: \"sshd cron,nginx.service sshd\"\n")?;

        let config = Config::load(Some(path))?;
        let names: Vec<String> = config.service_list().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["sshd.service", "cron.service", "nginx.service"]);
        Ok(())
    }

    #[test]
    fn test_malformed_entries_are_dropped() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "services:\n  monitored: [\"sshd\", \"../etc/shadow\", \"\"]\n")?;

        let config = Config::load(Some(path))?;
        assert_eq!(config.service_list().len(), 1);
        Ok(())
    }

    #[test]
    fn test_dotted_overrides() -> Result<()> {
        let overrides = vec![
            "services.max_restart_attempts=7".to_string(),
            "services.auto_restart=false".to_string(),
            "services.monitored=sshd cron".to_string(),
            "notifications.webhook_url=https://hooks.example.com/x".to_string(),
        ];

        let config = Config::load_with_overrides(Some("/nonexistent/config.yaml".into()), &overrides)?;
        assert_eq!(config.services.max_restart_attempts, 7);
        assert!(!config.services.auto_restart);
        assert_eq!(config.service_list().len(), 2);
        assert_eq!(
            config.notifications.webhook_url.as_deref(),
            Some("https://hooks.example.com/x")
        );
        Ok(())
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let no_value = vec!["services.max_restart_attempts".to_string()];
        assert!(Config::load_with_overrides(Some("/nonexistent/config.yaml".into()), &no_value).is_err());

        let empty_segment = vec!["services..auto_restart=true".to_string()];
        assert!(Config::load_with_overrides(Some("/nonexistent/config.yaml".into()), &empty_segment).is_err());
    }

    #[test]
    fn test_lookup_by_dotted_path() {
        let config = Config::default();
        assert_eq!(
            config.lookup("services.restart_delay"),
            Some(serde_yaml::Value::from(30u64))
        );
        assert_eq!(config.lookup("services.nope"), None);
    }

    #[test]
    fn test_recovery_settings_from_config() {
        let mut config = Config::default();
        config.services.restart_delay = 10;
        config.services.max_parallel = 0;

        let settings = config.recovery_settings();
        assert!(settings.enabled);
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.backoff.delay_after(2), Duration::from_secs(40));
        assert_eq!(settings.settle, Duration::from_secs(5));
        assert_eq!(settings.max_parallel, 1);
    }

    #[test]
    fn test_zero_restart_attempts_still_tries_once() -> Result<()> {
        let overrides = vec!["services.max_restart_attempts=0".to_string()];
        let config = Config::load_with_overrides(Some("/nonexistent/config.yaml".into()), &overrides)?;

        assert_eq!(config.services.max_restart_attempts, 0);
        assert_eq!(config.recovery_settings().max_attempts, 1);
        Ok(())
    }

    #[test]
    fn test_config_default_path() {
        let path = Config::default_path();
        assert!(path.is_ok());

        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("svcguard"));
        assert!(path.to_string_lossy().contains("config.yaml"));
    }

    #[test]
    fn test_config_save_load() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config_path = dir.path().join("nested").join("config.yaml");

        let mut original_config = Config::default();
        original_config.services.monitored = MonitoredServices::List(vec!["sshd".to_string()]);
        original_config.notifications.recipient = "ops@example.com".to_string();

        original_config.save(config_path.clone())?;
        let loaded_config = Config::load(Some(config_path))?;

        assert_eq!(loaded_config, original_config);
        Ok(())
    }
}
