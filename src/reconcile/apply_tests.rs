//! Tests for `apply_plan`.

use super::*;
use crate::dns::fetch_current_state;
use crate::router::{Interface, InterfaceObservations};
use crate::shutdown::{self, Shutdown};
use crate::test_support::{MockZone, ZoneWrite, ips};
use std::net::Ipv4Addr;
use std::time::Duration;

fn observations(entries: &[(&str, Option<[u8; 4]>)]) -> InterfaceObservations {
    InterfaceObservations {
        interfaces: entries
            .iter()
            .map(|(name, ip)| Interface {
                logical_name: (*name).to_string(),
                provider_name: (*name).to_string(),
                resolved_ip: ip.map(Ipv4Addr::from),
            })
            .collect(),
        router_ok: true,
    }
}

async fn plan_against(
    zone: &MockZone,
    records: &[Record],
    retired: &[String],
    obs: &InterfaceObservations,
) -> Plan {
    let managed: Vec<String> = records
        .iter()
        .map(|r| r.hostname.clone())
        .chain(retired.iter().cloned())
        .collect();
    let current = fetch_current_state(zone, &managed).await.unwrap();
    plan(records, retired, &build_desired_state(records, obs), &current)
}

mod applying {
    use super::*;

    #[tokio::test]
    async fn issues_one_write_per_change() {
        let zone = MockZone::with_records(&[("www", &[[9, 9, 9, 9]]), ("old", &[[7, 7, 7, 7]])]);
        let records = [
            Record::new("server", ["wan1"]),
            Record::new("www", ["wan1"]),
        ];
        let retired = vec!["old".to_string()];
        let obs = observations(&[("wan1", Some([1, 1, 1, 1]))]);
        let plan = plan_against(&zone, &records, &retired, &obs).await;

        let report = apply_plan(&zone, &plan, false, &Shutdown::never()).await;

        assert_eq!(
            zone.writes(),
            vec![
                ZoneWrite::Create("server".to_string(), ips(&[[1, 1, 1, 1]])),
                ZoneWrite::Replace("www/A".to_string(), ips(&[[1, 1, 1, 1]])),
                ZoneWrite::Delete("old/A".to_string()),
            ]
        );
        assert_eq!(report.applied().count(), 3);
        assert!(report.all_succeeded());
    }

    #[tokio::test]
    async fn noop_issues_no_write() {
        let zone = MockZone::with_records(&[("server", &[[1, 1, 1, 1]])]);
        let records = [Record::new("server", ["wan1"])];
        let obs = observations(&[("wan1", Some([1, 1, 1, 1]))]);
        let plan = plan_against(&zone, &records, &[], &obs).await;

        let report = apply_plan(&zone, &plan, false, &Shutdown::never()).await;

        assert!(zone.writes().is_empty());
        assert!(matches!(
            report.outcome_of("server"),
            Some(HostnameOutcome::Unchanged)
        ));
    }

    #[tokio::test]
    async fn second_run_is_idempotent() {
        let zone = MockZone::with_records(&[("www", &[[9, 9, 9, 9]])]);
        let records = [Record::new("server", ["wan1", "wan2"]), Record::new("www", ["wan2"])];
        let obs = observations(&[("wan1", Some([1, 1, 1, 1])), ("wan2", Some([2, 2, 2, 2]))]);

        let first = plan_against(&zone, &records, &[], &obs).await;
        apply_plan(&zone, &first, false, &Shutdown::never()).await;
        let writes_after_first = zone.writes().len();

        let second = plan_against(&zone, &records, &[], &obs).await;
        apply_plan(&zone, &second, false, &Shutdown::never()).await;

        assert_eq!(writes_after_first, 2);
        assert_eq!(second.change_count(), 0);
        assert_eq!(zone.writes().len(), writes_after_first);
    }

    #[tokio::test]
    async fn failure_does_not_block_other_hostnames() {
        let zone = MockZone::default().failing_for("bad");
        let records = [
            Record::new("first", ["wan1"]),
            Record::new("bad", ["wan1"]),
            Record::new("last", ["wan1"]),
        ];
        let obs = observations(&[("wan1", Some([1, 1, 1, 1]))]);
        let plan = plan_against(&zone, &records, &[], &obs).await;

        let report = apply_plan(&zone, &plan, false, &Shutdown::never()).await;

        assert_eq!(zone.writes().len(), 3);
        assert!(matches!(report.outcome_of("bad"), Some(HostnameOutcome::Failed(_))));
        assert!(matches!(report.outcome_of("last"), Some(HostnameOutcome::Applied)));
        assert_eq!(report.failures().count(), 1);
        assert!(!report.all_succeeded());
        assert_eq!(zone.ips_of("last"), ips(&[[1, 1, 1, 1]]));
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let zone = MockZone::with_records(&[("server", &[[1, 1, 1, 1], [2, 2, 2, 2]])]);
        let records = [Record::new("server", ["wan1", "wan2"])];
        let obs = observations(&[("wan1", Some([1, 1, 1, 1])), ("wan2", None)]);
        let plan = plan_against(&zone, &records, &[], &obs).await;

        let report = apply_plan(&zone, &plan, true, &Shutdown::never()).await;

        assert!(zone.writes().is_empty());
        assert_eq!(
            plan.get("server").unwrap().op,
            ReconciliationOp::Update { ips: ips(&[[1, 1, 1, 1]]) }
        );
        assert!(matches!(report.outcome_of("server"), Some(HostnameOutcome::DryRun)));
        assert!(report.all_succeeded());
    }
}

mod cancellation {
    use super::*;

    #[tokio::test]
    async fn triggered_shutdown_skips_pending_writes() {
        let zone = MockZone::default();
        let records = [Record::new("a", ["wan1"]), Record::new("b", ["wan1"])];
        let obs = observations(&[("wan1", Some([1, 1, 1, 1]))]);
        let plan = plan_against(&zone, &records, &[], &obs).await;
        let (trigger, shutdown) = shutdown::channel();
        trigger.trigger();

        let report = apply_plan(&zone, &plan, false, &shutdown).await;

        assert!(zone.writes().is_empty());
        assert!(report.results.iter().all(|r| matches!(r.outcome, HostnameOutcome::Skipped)));
        assert!(report.all_succeeded());
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_write_completes_after_stop_request() {
        let zone = std::sync::Arc::new(
            MockZone::default().with_write_delay(Duration::from_secs(5)),
        );
        let records = [Record::new("a", ["wan1"]), Record::new("b", ["wan1"])];
        let obs = observations(&[("wan1", Some([1, 1, 1, 1]))]);
        let plan = plan_against(&zone, &records, &[], &obs).await;
        let (trigger, shutdown) = shutdown::channel();

        let task = {
            let zone = std::sync::Arc::clone(&zone);
            tokio::spawn(async move { apply_plan(zone.as_ref(), &plan, false, &shutdown).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.trigger();
        let report = task.await.unwrap();

        assert!(matches!(report.outcome_of("a"), Some(HostnameOutcome::Applied)));
        assert!(matches!(report.outcome_of("b"), Some(HostnameOutcome::Skipped)));
        assert_eq!(zone.ips_of("a"), ips(&[[1, 1, 1, 1]]));
    }
}
