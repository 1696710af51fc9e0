//! Shared fakes for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::transport::{HttpClient, HttpError, HttpRequest, HttpResponse};

/// One scripted reply of a [`ScriptedClient`].
pub enum Reply {
    Response(HttpResponse),
    Timeout,
    Refused,
    /// Never answers.
    Hang,
}

/// HTTP client that replays a fixed script and records every request.
///
/// Once the script is exhausted it answers `404` to everything.
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<Reply>>,
    seen: Mutex<Vec<HttpRequest>>,
}

impl ScriptedClient {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl HttpClient for ScriptedClient {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, HttpError> {
        self.seen.lock().unwrap().push(req);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Reply::Response(resp)) => Ok(resp),
            Some(Reply::Timeout) => Err(HttpError::Timeout),
            Some(Reply::Refused) => Err(HttpError::Connection(Box::new(
                std::io::Error::other("connection refused"),
            ))),
            Some(Reply::Hang) => std::future::pending().await,
            None => Ok(status(404)),
        }
    }
}

/// Builds a response with the given status and empty body.
pub fn status(code: u16) -> HttpResponse {
    HttpResponse::new(
        http::StatusCode::from_u16(code).unwrap(),
        http::HeaderMap::new(),
        Vec::new(),
    )
}

/// Builds a `200 OK` response carrying `value` as JSON.
pub fn json(value: &serde_json::Value) -> HttpResponse {
    json_with_status(200, value)
}

/// Builds a response with the given status carrying `value` as JSON.
pub fn json_with_status(code: u16, value: &serde_json::Value) -> HttpResponse {
    HttpResponse::new(
        http::StatusCode::from_u16(code).unwrap(),
        http::HeaderMap::new(),
        serde_json::to_vec(value).unwrap(),
    )
}

/// Reply helper: `Reply::Response(json(..))`.
pub fn ok_json(value: serde_json::Value) -> Reply {
    Reply::Response(json(&value))
}

/// Reply helper: `Reply::Response(status(..))`.
pub fn reply_status(code: u16) -> Reply {
    Reply::Response(status(code))
}

/// Decodes the JSON body of a recorded request.
pub fn body_json(req: &HttpRequest) -> serde_json::Value {
    serde_json::from_slice(req.body.as_deref().unwrap_or_default()).unwrap()
}

/// A write observed by [`MockZone`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneWrite {
    Create(String, crate::dns::IpSet),
    Replace(String, crate::dns::IpSet),
    Delete(String),
}

/// In-memory DNS zone. Writes mutate its records, so consecutive ticks see
/// their own effects.
#[derive(Default)]
pub struct MockZone {
    records: Mutex<std::collections::BTreeMap<String, crate::dns::IpSet>>,
    failing_hosts: Vec<String>,
    listing_fails: std::sync::atomic::AtomicBool,
    writes: Mutex<Vec<ZoneWrite>>,
    write_delay: Option<std::time::Duration>,
}

impl MockZone {
    pub fn with_records(records: &[(&str, &[[u8; 4]])]) -> Self {
        let zone = Self::default();
        {
            let mut held = zone.records.lock().unwrap();
            for (host, addrs) in records {
                held.insert((*host).to_string(), ips(addrs));
            }
        }
        zone
    }

    /// Makes every write for `hostname` fail with a 422.
    pub fn failing_for(mut self, hostname: &str) -> Self {
        self.failing_hosts.push(hostname.to_string());
        self
    }

    /// Makes each write take `delay` of tokio time.
    pub const fn with_write_delay(mut self, delay: std::time::Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    pub fn set_listing_fails(&self, fails: bool) {
        self.listing_fails
            .store(fails, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<ZoneWrite> {
        self.writes.lock().unwrap().clone()
    }

    pub fn ips_of(&self, hostname: &str) -> crate::dns::IpSet {
        self.records
            .lock()
            .unwrap()
            .get(hostname)
            .cloned()
            .unwrap_or_default()
    }

    async fn write(&self, hostname: &str, write: ZoneWrite) -> Result<(), crate::dns::DnsError> {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        self.writes.lock().unwrap().push(write);
        if self.failing_hosts.iter().any(|h| h == hostname) {
            return Err(crate::dns::DnsError::Call(
                crate::transport::CallError::Rejected(
                    crate::transport::AttemptError::NonSuccessStatus {
                        status: http::StatusCode::UNPROCESSABLE_ENTITY,
                        body: None,
                    },
                ),
            ));
        }
        Ok(())
    }
}

fn host_of(record_id: &str) -> &str {
    record_id.rsplit_once('/').map_or(record_id, |(name, _)| name)
}

impl crate::dns::DnsZone for MockZone {
    async fn list_a_records(&self) -> Result<Vec<crate::dns::RecordSet>, crate::dns::DnsError> {
        if self.listing_fails.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(crate::dns::DnsError::Call(
                crate::transport::CallError::MaxRetriesExceeded {
                    attempts: 3,
                    last_error: crate::transport::AttemptError::Http(HttpError::Timeout),
                },
            ));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .map(|(host, ips)| crate::dns::RecordSet {
                id: format!("{host}/A"),
                hostname: host.clone(),
                ips: ips.clone(),
            })
            .collect())
    }

    async fn create_record_set(
        &self,
        hostname: &str,
        ips: &crate::dns::IpSet,
    ) -> Result<(), crate::dns::DnsError> {
        self.write(hostname, ZoneWrite::Create(hostname.to_string(), ips.clone()))
            .await?;
        self.records
            .lock()
            .unwrap()
            .insert(hostname.to_string(), ips.clone());
        Ok(())
    }

    async fn replace_record_set(
        &self,
        record_id: &str,
        ips: &crate::dns::IpSet,
    ) -> Result<(), crate::dns::DnsError> {
        let host = host_of(record_id);
        self.write(host, ZoneWrite::Replace(record_id.to_string(), ips.clone()))
            .await?;
        self.records
            .lock()
            .unwrap()
            .insert(host.to_string(), ips.clone());
        Ok(())
    }

    async fn delete_record_set(&self, record_id: &str) -> Result<(), crate::dns::DnsError> {
        let host = host_of(record_id);
        self.write(host, ZoneWrite::Delete(record_id.to_string()))
            .await?;
        self.records.lock().unwrap().remove(host);
        Ok(())
    }
}

/// Builds an address set from octets.
pub fn ips(addrs: &[[u8; 4]]) -> crate::dns::IpSet {
    addrs.iter().copied().map(std::net::Ipv4Addr::from).collect()
}

/// Number of `WARN` events carrying `event = "<name>"` seen by a
/// [`CountingLayer`].
#[derive(Clone, Default)]
pub struct EventCounter(std::sync::Arc<std::sync::atomic::AtomicUsize>);

impl EventCounter {
    pub fn get(&self) -> usize {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Tracing layer that counts warnings tagged with a given `event` field.
pub struct CountingLayer {
    event: &'static str,
    counter: EventCounter,
}

impl CountingLayer {
    pub fn new(event: &'static str) -> (Self, EventCounter) {
        let counter = EventCounter::default();
        (
            Self {
                event,
                counter: counter.clone(),
            },
            counter,
        )
    }
}

struct EventField<'a> {
    wanted: &'a str,
    found: bool,
}

impl tracing::field::Visit for EventField<'_> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "event" && value == self.wanted {
            self.found = true;
        }
    }

    fn record_debug(&mut self, _field: &tracing::field::Field, _value: &dyn std::fmt::Debug) {}
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CountingLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if *event.metadata().level() != tracing::Level::WARN {
            return;
        }
        let mut visitor = EventField {
            wanted: self.event,
            found: false,
        };
        event.record(&mut visitor);
        if visitor.found {
            self.counter
                .0
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }
}

/// Installs a thread-local subscriber counting `event` warnings.
///
/// Use from a current-thread runtime so every event lands on this thread.
pub fn count_warnings(event: &'static str) -> (tracing::subscriber::DefaultGuard, EventCounter) {
    use tracing_subscriber::layer::SubscriberExt;

    let (layer, counter) = CountingLayer::new(event);
    let subscriber = tracing_subscriber::registry().with(layer);
    (tracing::subscriber::set_default(subscriber), counter)
}
