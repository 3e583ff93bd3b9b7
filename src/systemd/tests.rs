#[cfg(test)]
mod tests {
    use crate::error::{AdapterError, Result};
    use crate::systemd::{bounded, BackoffPolicy, ConnectionManager, HealthStatus, ServiceList, ServiceName, UnitState};
    use std::time::Duration;

    #[tokio::test]
    async fn test_connection_manager_retry() -> Result<()> {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let manager = ConnectionManager::new(2, Duration::from_millis(100), Duration::from_secs(1));

        let call_count = Arc::new(AtomicU32::new(0));
        let call_count_clone = call_count.clone();

        let result = manager
            .with_retry("test_operation", move || {
                let count = call_count_clone.clone();
                async move {
                    let current = count.fetch_add(1, Ordering::SeqCst) + 1;
                    if current < 2 {
                        Err(anyhow::anyhow!("Simulated failure"))
                    } else {
                        Ok("success")
                    }
                }
            })
            .await;

        assert_eq!(result?, "success");
        assert_eq!(call_count.load(Ordering::SeqCst), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_connection_manager_stops_on_access_denied() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let manager = ConnectionManager::new(5, Duration::from_millis(10), Duration::from_secs(1));
        let call_count = Arc::new(AtomicU32::new(0));
        let counter = call_count.clone();

        let result: Result<()> = manager
            .with_retry("denied", move || {
                let count = counter.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::anyhow!("Access denied"))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_is_quadratic_in_attempt() {
        let policy = BackoffPolicy::new(Duration::from_secs(10));

        assert_eq!(policy.delay_after(1), Duration::from_secs(10));
        assert_eq!(policy.delay_after(2), Duration::from_secs(40));
        assert_eq!(policy.delay_after(3), Duration::from_secs(90));
    }

    #[test]
    fn test_backoff_default_base() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.base_delay(), Duration::from_secs(30));
        assert_eq!(policy.delay_after(2), Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_call_times_out() {
        let result: std::result::Result<(), AdapterError> =
            bounded("query_status", Duration::from_secs(2), std::future::pending()).await;

        assert_eq!(
            result,
            Err(AdapterError::Timeout {
                operation: "query_status".to_string(),
                timeout: Duration::from_secs(2),
            })
        );
    }

    #[tokio::test]
    async fn test_bounded_call_passes_result_through() {
        let result = bounded("restart", Duration::from_secs(2), async { Ok::<_, AdapterError>(true) }).await;
        assert_eq!(result, Ok(true));
    }

    #[test]
    fn test_service_name_validation() {
        assert!(ServiceName::parse("").is_err());
        assert!(ServiceName::parse("   ").is_err());
        assert!(ServiceName::parse("../etc/passwd.service").is_err());
        assert!(ServiceName::parse("invalid\0service").is_err());
        assert!(ServiceName::parse("two words").is_err());
        assert!(ServiceName::parse(&"a".repeat(300)).is_err());

        assert_eq!(ServiceName::parse("nginx.service").unwrap().as_str(), "nginx.service");
        assert_eq!(ServiceName::parse(" sshd ").unwrap().as_str(), "sshd.service");
        assert_eq!(ServiceName::parse("network.target").unwrap().as_str(), "network.target");
        assert_eq!(ServiceName::parse("getty@tty1").unwrap().as_str(), "getty@tty1.service");
    }

    #[test]
    fn test_service_list_collapses_duplicates_in_order() {
        let (list, rejected) = ServiceList::parse_str("cron sshd, cron.service\tnginx  sshd");
        assert!(rejected.is_empty());

        let names: Vec<&str> = list.iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["cron.service", "sshd.service", "nginx.service"]);
    }

    #[test]
    fn test_service_list_reports_rejected_entries() {
        let (list, rejected) = ServiceList::parse(["sshd", "../bad", ""]);
        assert_eq!(list.len(), 1);
        assert_eq!(rejected.len(), 2);
    }

    #[test]
    fn test_health_status_from_states() {
        assert_eq!(HealthStatus::from_states("loaded", "active"), HealthStatus::Running);
        assert_eq!(HealthStatus::from_states("loaded", "reloading"), HealthStatus::Running);
        assert_eq!(HealthStatus::from_states("loaded", "failed"), HealthStatus::Failed);
        assert_eq!(HealthStatus::from_states("loaded", "inactive"), HealthStatus::Failed);
        assert_eq!(HealthStatus::from_states("loaded", "activating"), HealthStatus::Failed);
        assert_eq!(HealthStatus::from_states("not-found", "inactive"), HealthStatus::NotFound);
    }

    #[test]
    fn test_unit_state_summary() {
        let state = UnitState {
            load_state: "loaded".to_string(),
            active_state: "failed".to_string(),
            sub_state: "failed".to_string(),
            result: "exit-code".to_string(),
            n_restarts: 4,
        };
        assert_eq!(state.summary(), "failed/failed result=exit-code restarts=4");
        assert_eq!(state.health(), HealthStatus::Failed);

        let unknown = UnitState::default();
        assert!(unknown.summary().contains("result=unknown"));
    }
}
