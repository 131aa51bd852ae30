//! Scripted `RemoteCaller` for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::client::http_client::{ClientError, RemoteCaller};

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub body: &'static str,
}

impl MockResponse {
    pub fn ok(content_type: Option<&'static str>, body: &'static str) -> Self {
        Self {
            status: 200,
            content_type,
            body,
        }
    }
}

/// Replays queued responses in order, repeating the last one once the queue
/// runs dry. `None` entries simulate a transport failure: reqwest has no
/// public constructor for a connect error, so a request rejected before it
/// leaves the client stands in, surfacing as `ClientError::Http` like a
/// refused connection or a timeout would.
#[derive(Default)]
pub struct MockCaller {
    responses: Mutex<VecDeque<Option<MockResponse>>>,
    last: Mutex<Option<Option<MockResponse>>>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockCaller {
    pub fn new(responses: impl IntoIterator<Item = Option<MockResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self::new([None])
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> Option<MockResponse> {
        let mut queue = self.responses.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        match queue.pop_front() {
            Some(next) => {
                *last = Some(next.clone());
                next
            }
            None => (*last).clone().flatten(),
        }
    }
}

#[async_trait]
impl RemoteCaller for MockCaller {
    async fn call(
        &self,
        _method: &str,
        _path: &str,
        _body: &str,
    ) -> Result<reqwest::Response, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let scripted = self.next_response();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let Some(res) = scripted else {
            return Err(transport_error());
        };

        let mut builder = http::Response::builder().status(res.status);
        if let Some(ct) = res.content_type {
            builder = builder.header(http::header::CONTENT_TYPE, ct);
        }
        let response = builder.body(res.body).unwrap();
        Ok(reqwest::Response::from(response))
    }
}

fn transport_error() -> ClientError {
    let err = reqwest::Client::new()
        .get("http://unreachable.invalid:9200")
        .header("x-broken", "line\nbreak")
        .build()
        .unwrap_err();
    ClientError::Http(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failures_surface_as_http_errors() {
        let err = MockCaller::failing().call("GET", "/", "").await.unwrap_err();
        assert!(matches!(err, ClientError::Http(_)), "{err:?}");
    }
}
