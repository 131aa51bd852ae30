//! poller.rs
//!
//! Background discovery of index names for REPL autocompletion.
//!
//! One discovery cycle:
//!   1. `GET /_cat/indices` through the shared `RemoteCaller`
//!   2. drain the body
//!   3. decode it as JSON rows or as the plain-text cat table, picked by
//!      the response Content-Type
//!   4. publish the names on a bounded channel
//!
//! Cycles never overlap: call, decode, publish, wait, repeat. Any failure
//! inside a cycle is logged and publishes an empty list; the next tick is the
//! retry. Shutdown goes through a `CancellationToken` that is raced against
//! every suspension point of the loop, so `stop()` is observed mid-call,
//! mid-publish or mid-wait. When the loop returns the poller (and with it the
//! only `Sender`) is dropped, which closes the channel for the consumer.

use std::sync::Arc;
use std::time::Duration;

use http::header::CONTENT_TYPE;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::http_client::RemoteCaller;
use crate::client::models::IndexRecord;

const DEFAULT_POLLING_ENDPOINT: &str = "/_cat/indices";

pub type IndexList = Vec<String>;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed index list json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Body encodings `/_cat/indices` can answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexListFormat {
    /// `application/json`: an array of row objects carrying `"index"`.
    Structured,
    /// Anything else: whitespace separated columns, name in the 3rd one.
    Tabular,
}

impl IndexListFormat {
    /// Parameters such as `; charset=UTF-8` are ignored.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let media_type = content_type
            .and_then(|v| v.split(';').next())
            .map(str::trim)
            .unwrap_or_default();

        if media_type.eq_ignore_ascii_case("application/json") {
            Self::Structured
        } else {
            Self::Tabular
        }
    }

    pub fn decode(self, body: &[u8]) -> Result<IndexList, DecodeError> {
        match self {
            Self::Structured => decode_structured(body),
            Self::Tabular => Ok(decode_tabular(body)),
        }
    }
}

fn decode_structured(body: &[u8]) -> Result<IndexList, DecodeError> {
    let rows: Vec<IndexRecord> = serde_json::from_slice(body)?;
    Ok(rows.into_iter().map(|r| r.index).collect())
}

/// Lines with fewer than three columns (blank ones included) are skipped.
fn decode_tabular(body: &[u8]) -> IndexList {
    String::from_utf8_lossy(body)
        .lines()
        .filter_map(|line| line.split_whitespace().nth(2))
        .map(str::to_owned)
        .collect()
}

/// Requests shutdown of a running (or not yet started) poller.
#[derive(Debug, Clone)]
pub struct PollerHandle {
    shutdown: CancellationToken,
}

impl PollerHandle {
    /// Returns immediately; the loop exits at its next suspension point.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

pub struct IndexPoller {
    client: Arc<dyn RemoteCaller>,
    endpoint: String,
    channel: mpsc::Sender<IndexList>,
    poll_rate: Duration,
    shutdown: CancellationToken,
}

impl IndexPoller {
    /// `poll_secs <= 0` means no wait between cycles: the loop only yields
    /// to the scheduler before the next call.
    ///
    /// The poller must own the only `Sender` of `channel`, otherwise the
    /// consumer never observes the channel closing after `stop()`.
    pub fn new(
        client: Arc<dyn RemoteCaller>,
        channel: mpsc::Sender<IndexList>,
        poll_secs: i64,
    ) -> Self {
        let poll_rate = Duration::from_secs(u64::try_from(poll_secs).unwrap_or(0));
        Self {
            client,
            endpoint: DEFAULT_POLLING_ENDPOINT.to_string(),
            channel,
            poll_rate,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn handle(&self) -> PollerHandle {
        PollerHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    /// Runs discovery cycles until stopped. The first cycle starts without
    /// waiting; a failed cycle waits the full interval like any other.
    pub async fn start(self) {
        info!(endpoint = %self.endpoint, interval = ?self.poll_rate, "index poller started");

        loop {
            let indices = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                indices = self.run() => indices,
            };

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                sent = self.channel.send(indices) => {
                    if sent.is_err() {
                        debug!("index list receiver dropped");
                        break;
                    }
                }
            }

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.poll_rate) => {}
            }
        }

        info!("index poller stopped");
    }

    async fn run(&self) -> IndexList {
        let res = match self.client.call("GET", &self.endpoint, "").await {
            Ok(res) => res,
            Err(e) => {
                warn!(endpoint = %self.endpoint, "index discovery failed: {e:#}");
                return IndexList::new();
            }
        };

        let status = res.status();
        let format = IndexListFormat::from_content_type(
            res.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        );

        // Always drained, whatever happens next.
        let body = match res.bytes().await {
            Ok(body) => body,
            Err(e) => {
                warn!(endpoint = %self.endpoint, "reading index list failed: {e:#}");
                return IndexList::new();
            }
        };

        if !status.is_success() {
            warn!(endpoint = %self.endpoint, %status, "index discovery returned an error status");
            return IndexList::new();
        }

        match format.decode(&body) {
            Ok(indices) => {
                debug!(count = indices.len(), ?format, "discovered indices");
                indices
            }
            Err(e) => {
                warn!(endpoint = %self.endpoint, "decoding index list failed: {e:#}");
                IndexList::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{MockCaller, MockResponse};
    use rstest::rstest;

    const CAT_TABLE: &str = "yellow open   elastic      dBoWJXLBSRuumXa-a-QN1w   5   1          0            0       650b           650b
yellow open   found        oBcPStMpTD2BZtQ9j2ff3w   5   1          0            0       650b           650b
yellow open   wat          s0uzswacS2-jPJJgKb8r7w   5   1          0            0       650b           650b";

    const CAT_JSON: &str = r#"[
  {"health": "yellow", "status": "open", "index": "elastic", "pri": "1", "rep": "1", "docs.count": "150000"},
  {"health": "yellow", "status": "open", "index": "found", "pri": "1", "rep": "1", "docs.count": "150000"},
  {"health": "yellow", "status": "open", "index": "wat", "pri": "1", "rep": "1", "docs.count": "150000"}
]"#;

    fn names(v: &[&str]) -> IndexList {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn poller_with(
        caller: MockCaller,
        poll_secs: i64,
    ) -> (IndexPoller, mpsc::Receiver<IndexList>, Arc<MockCaller>) {
        let caller = Arc::new(caller);
        let (tx, rx) = mpsc::channel(1);
        let poller = IndexPoller::new(caller.clone(), tx, poll_secs);
        (poller, rx, caller)
    }

    #[rstest]
    #[case(Some("application/json"), IndexListFormat::Structured)]
    #[case(Some("application/json; charset=UTF-8"), IndexListFormat::Structured)]
    #[case(Some("Application/JSON;charset=utf-8"), IndexListFormat::Structured)]
    #[case(Some("text/plain; charset=UTF-8"), IndexListFormat::Tabular)]
    #[case(Some("application/yaml"), IndexListFormat::Tabular)]
    #[case(None, IndexListFormat::Tabular)]
    fn picks_format_from_content_type(#[case] ct: Option<&str>, #[case] want: IndexListFormat) {
        assert_eq!(IndexListFormat::from_content_type(ct), want);
    }

    #[test]
    fn tabular_takes_third_column_in_order() {
        let body = "yellow open   elastic   dBoWJXLBSRuumXa-a-QN1w   5   1   0   0   650b   650b\n\
                    yellow open   found     oBcPStMpTD2BZtQ9j2ff3w   5   1   0   0   650b   650b\n";
        let got = IndexListFormat::Tabular.decode(body.as_bytes()).unwrap();
        assert_eq!(got, names(&["elastic", "found"]));
    }

    #[test]
    fn tabular_skips_blank_and_short_lines() {
        let body = "\n   \ngreen open logs x 1 0\n\t\nred close\ngreen open metrics y 1 0\n\n";
        let got = IndexListFormat::Tabular.decode(body.as_bytes()).unwrap();
        assert_eq!(got, names(&["logs", "metrics"]));
    }

    #[test]
    fn structured_keeps_array_order() {
        let got = IndexListFormat::Structured.decode(CAT_JSON.as_bytes()).unwrap();
        assert_eq!(got, names(&["elastic", "found", "wat"]));
    }

    #[test]
    fn structured_rejects_malformed_json() {
        assert!(IndexListFormat::Structured.decode(b"[{\"index\": ").is_err());
        assert!(IndexListFormat::Structured.decode(b"{\"index\": \"x\"}").is_err());
    }

    #[tokio::test]
    async fn run_decodes_plain_text() {
        let caller = MockCaller::new([Some(MockResponse::ok(None, CAT_TABLE))]);
        let (poller, _rx, _) = poller_with(caller, 10);
        assert_eq!(poller.run().await, names(&["elastic", "found", "wat"]));
    }

    #[tokio::test]
    async fn run_decodes_json() {
        let res = MockResponse::ok(Some("application/json; charset=UTF-8"), CAT_JSON);
        let (poller, _rx, _) = poller_with(MockCaller::new([Some(res)]), 10);
        assert_eq!(poller.run().await, names(&["elastic", "found", "wat"]));
    }

    #[tokio::test]
    async fn run_yields_empty_on_failures() {
        let (poller, _rx, _) = poller_with(MockCaller::failing(), 10);
        assert!(poller.run().await.is_empty());

        let bad_json = MockResponse::ok(Some("application/json"), "not json");
        let (poller, _rx, _) = poller_with(MockCaller::new([Some(bad_json)]), 10);
        assert!(poller.run().await.is_empty());

        let unauthorized = MockResponse {
            status: 401,
            content_type: Some("text/plain"),
            body: "missing authentication credentials for REST request",
        };
        let (poller, _rx, _) = poller_with(MockCaller::new([Some(unauthorized)]), 10);
        assert!(poller.run().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_immediately_then_every_interval() {
        let (poller, mut rx, caller) =
            poller_with(MockCaller::new([Some(MockResponse::ok(None, CAT_TABLE))]), 10);
        let handle = poller.handle();
        let started = tokio::time::Instant::now();
        let task = tokio::spawn(poller.start());

        assert_eq!(rx.recv().await.unwrap().len(), 3);
        assert_eq!(started.elapsed(), Duration::ZERO);

        assert_eq!(rx.recv().await.unwrap().len(), 3);
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert_eq!(caller.calls(), 2);

        handle.stop();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_does_not_stop_the_loop() {
        let recovered = MockResponse::ok(None, CAT_TABLE);
        let (poller, mut rx, caller) = poller_with(MockCaller::new([None, Some(recovered)]), 8);
        let handle = poller.handle();
        let started = tokio::time::Instant::now();
        let task = tokio::spawn(poller.start());

        assert!(rx.recv().await.unwrap().is_empty());
        assert_eq!(rx.recv().await.unwrap(), names(&["elastic", "found", "wat"]));
        assert_eq!(caller.calls(), 2);

        // Retried after the full interval, no shortened back-off.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(8), "retried after {elapsed:?}");
        assert!(elapsed < Duration::from_secs(16), "retried after {elapsed:?}");

        handle.stop();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_closes_the_channel() {
        let (poller, mut rx, caller) =
            poller_with(MockCaller::new([Some(MockResponse::ok(None, CAT_TABLE))]), 3600);
        let handle = poller.handle();
        let task = tokio::spawn(poller.start());

        assert!(rx.recv().await.is_some());
        handle.stop();
        task.await.unwrap();

        assert!(rx.recv().await.is_none());
        assert_eq!(caller.calls(), 1);
    }

    #[tokio::test]
    async fn stop_before_start_returns_without_calling() {
        let (poller, mut rx, caller) = poller_with(MockCaller::failing(), 10);
        poller.handle().stop();
        poller.start().await;

        assert!(rx.recv().await.is_none());
        assert_eq!(caller.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_a_slow_call() {
        let slow = MockCaller::new([Some(MockResponse::ok(None, CAT_TABLE))])
            .with_delay(Duration::from_secs(60));
        let (poller, mut rx, _) = poller_with(slow, 10);
        let handle = poller.handle();
        let task = tokio::spawn(poller.start());

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.stop();
        task.await.unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cycles_never_overlap() {
        let slow = MockCaller::new([Some(MockResponse::ok(None, CAT_TABLE))])
            .with_delay(Duration::from_secs(3));
        let (poller, mut rx, caller) = poller_with(slow, 0);
        let handle = poller.handle();
        let task = tokio::spawn(poller.start());

        for _ in 0..5 {
            assert_eq!(rx.recv().await.unwrap().len(), 3);
        }
        handle.stop();
        task.await.unwrap();

        assert!(caller.calls() >= 5);
        assert_eq!(caller.max_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_consumer_applies_backpressure() {
        let (poller, mut rx, caller) =
            poller_with(MockCaller::new([Some(MockResponse::ok(None, CAT_TABLE))]), 1);
        let handle = poller.handle();
        let task = tokio::spawn(poller.start());

        // One value buffered, one blocked in send; nothing further is polled.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(caller.calls(), 2);

        assert!(rx.recv().await.is_some());
        handle.stop();
        task.await.unwrap();
    }
}
