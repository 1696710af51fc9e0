//! Tests for `CurrentState` and `fetch_current_state`.

use super::*;
use std::net::Ipv4Addr;
use std::sync::Mutex;

fn ips(addrs: &[[u8; 4]]) -> IpSet {
    addrs.iter().copied().map(Ipv4Addr::from).collect()
}

/// Zone that lists a fixed set of records.
struct ListingZone {
    listing: Result<Vec<RecordSet>, ()>,
    calls: Mutex<usize>,
}

impl DnsZone for ListingZone {
    async fn list_a_records(&self) -> Result<Vec<RecordSet>, DnsError> {
        *self.calls.lock().unwrap() += 1;
        self.listing
            .clone()
            .map_err(|()| DnsError::ZoneNotFound("example.com".to_string()))
    }

    async fn create_record_set(&self, _: &str, _: &IpSet) -> Result<(), DnsError> {
        unreachable!("fetching never writes")
    }

    async fn replace_record_set(&self, _: &str, _: &IpSet) -> Result<(), DnsError> {
        unreachable!("fetching never writes")
    }

    async fn delete_record_set(&self, _: &str) -> Result<(), DnsError> {
        unreachable!("fetching never writes")
    }
}

fn record(hostname: &str, addrs: &[[u8; 4]]) -> RecordSet {
    RecordSet {
        id: format!("{hostname}/A"),
        hostname: hostname.to_string(),
        ips: ips(addrs),
    }
}

fn managed(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

mod current_state {
    use super::*;

    #[test]
    fn unknown_hostname_has_empty_set() {
        let state = CurrentState::new();

        assert!(state.get("server").is_none());
        assert!(state.ips_of("server").is_empty());
        assert!(state.is_empty());
    }

    #[test]
    fn insert_merges_sets_for_the_same_hostname() {
        let mut state = CurrentState::new();
        state.insert(
            "server",
            CurrentRecordSet {
                id: "server/A".to_string(),
                ips: ips(&[[1, 1, 1, 1]]),
            },
        );
        state.insert(
            "server",
            CurrentRecordSet {
                id: "other".to_string(),
                ips: ips(&[[2, 2, 2, 2]]),
            },
        );

        let held = state.get("server").unwrap();
        assert_eq!(held.id, "server/A");
        assert_eq!(held.ips, ips(&[[1, 1, 1, 1], [2, 2, 2, 2]]));
        assert_eq!(state.len(), 1);
    }
}

mod fetch {
    use super::*;

    #[tokio::test]
    async fn keeps_only_managed_hostnames() {
        let zone = ListingZone {
            listing: Ok(vec![
                record("server", &[[1, 1, 1, 1], [2, 2, 2, 2]]),
                record("mail", &[[9, 9, 9, 9]]),
                record("www", &[[1, 1, 1, 1]]),
            ]),
            calls: Mutex::new(0),
        };

        let state = fetch_current_state(&zone, &managed(&["server", "www", "vpn"]))
            .await
            .unwrap();

        assert_eq!(state.len(), 2);
        assert_eq!(state.ips_of("server"), ips(&[[1, 1, 1, 1], [2, 2, 2, 2]]));
        assert_eq!(state.get("www").unwrap().id, "www/A");
        assert!(state.get("mail").is_none());
        assert!(state.ips_of("vpn").is_empty());
        assert_eq!(*zone.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn listing_failure_propagates() {
        let zone = ListingZone {
            listing: Err(()),
            calls: Mutex::new(0),
        };

        let result = fetch_current_state(&zone, &managed(&["server"])).await;

        assert!(matches!(result, Err(DnsError::ZoneNotFound(_))));
    }
}
