//! The poll engine.
//!
//! Drives one [`ProcessHandle`] from submission to a terminal
//! [`ServiceResponse`] by querying the result endpoint at a fixed interval.
//!
//! ## Termination
//!
//! The loop ends only when the backend reports a status other than
//! `pending`. There is no attempt limit and no overall deadline: a backend
//! that answers `pending` forever is polled forever. Each individual poll is
//! bounded by the short poll timeout, and a timed-out poll surfaces as
//! [`BReactError::Client`] rather than ending the loop quietly. Callers that
//! need a deadline wrap the future in `tokio::time::timeout`.
//!
//! ## Cancellation
//!
//! Dropping the future returned by [`PollEngine::poll_result`] drops the
//! in-flight request or sleep with it; no further poll is issued.

use std::sync::Arc;
use std::time::Duration;

use protocol::{
    ApiPaths, BReactError, ProcessHandle, ServiceResponse, TimeoutClass, Transport,
    TransportRequest, ACCESS_TOKEN_PARAM,
};
use tracing::{debug, instrument};

/// The two states of a polling sequence.
enum PollState {
    Polling { attempt: u32 },
    Done(ServiceResponse),
}

/// Polls result endpoints until a terminal status is observed.
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct PollEngine {
    transport: Arc<dyn Transport>,
    paths: ApiPaths,
    interval: Duration,
}

impl PollEngine {
    /// Creates an engine that sleeps `interval` between polls by default.
    pub fn new(transport: Arc<dyn Transport>, paths: ApiPaths, interval: Duration) -> Self {
        Self {
            transport,
            paths,
            interval,
        }
    }

    /// The interval used when a call does not supply one.
    pub fn default_interval(&self) -> Duration {
        self.interval
    }

    /// Polls `handle` until its status is no longer `pending`.
    ///
    /// `interval` overrides the default sleep between polls; `None` or a zero
    /// duration means the default.
    ///
    /// Returns the first terminal response as-is, whether it is `completed`,
    /// `error`, or an unrecognised status. Interpreting `error` is the
    /// caller's job.
    ///
    /// # Errors
    ///
    /// Returns [`BReactError::Client`] if any poll fails at the transport
    /// level and [`BReactError::InvalidResponse`] if a poll body is not a
    /// service response.
    #[instrument(skip_all, fields(process_id = %handle.process_id))]
    pub async fn poll_result(
        &self,
        handle: &ProcessHandle,
        interval: Option<Duration>,
    ) -> Result<ServiceResponse, BReactError> {
        let interval = interval
            .filter(|i| !i.is_zero())
            .unwrap_or(self.interval);
        let mut state = PollState::Polling { attempt: 1 };

        loop {
            state = match state {
                PollState::Polling { attempt } => {
                    let response = self.poll_once(handle).await?;
                    if response.is_terminal() {
                        debug!(attempt, status = %response.status, "poll reached terminal status");
                        PollState::Done(response)
                    } else {
                        debug!(attempt, ?interval, "result pending");
                        tokio::time::sleep(interval).await;
                        PollState::Polling {
                            attempt: attempt + 1,
                        }
                    }
                }
                PollState::Done(response) => return Ok(response),
            };
        }
    }

    async fn poll_once(&self, handle: &ProcessHandle) -> Result<ServiceResponse, BReactError> {
        let request = TransportRequest::get(self.paths.result(&handle.process_id))
            .with_query(ACCESS_TOKEN_PARAM, handle.access_token.as_str())
            .with_timeout(TimeoutClass::Poll);

        let body = self.transport.request(request).await?;
        serde_json::from_value(body).map_err(|e| BReactError::invalid_response("poll", e))
    }
}

#[cfg(test)]
mod tests {
    use protocol::{HttpMethod, ResponseStatus};
    use serde_json::json;

    use super::*;
    use crate::testing::ScriptedTransport;

    const RESULT_P1: &str = "/api/v1/services/result/p1";

    fn handle(process_id: &str, token: &str) -> ProcessHandle {
        serde_json::from_value(json!({ "process_id": process_id, "access_token": token })).unwrap()
    }

    fn engine(transport: &Arc<ScriptedTransport>) -> PollEngine {
        PollEngine::new(transport.clone(), ApiPaths::default(), Duration::from_millis(2))
    }

    #[tokio::test]
    async fn returns_first_terminal_response() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .reply(RESULT_P1, json!({ "status": "pending" }))
            .reply(RESULT_P1, json!({ "status": "pending" }))
            .reply(RESULT_P1, json!({ "status": "completed" }));

        let response = engine(&transport)
            .poll_result(&handle("p1", "t1"), None)
            .await
            .unwrap();

        assert_eq!(response.status, ResponseStatus::Completed);
        assert_eq!(transport.calls_to(RESULT_P1), 3);
    }

    #[tokio::test]
    async fn error_status_is_terminal_and_returned() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .reply(RESULT_P1, json!({ "status": "error", "error": "model unavailable" }))
            .reply(RESULT_P1, json!({ "status": "pending" }));

        let response = engine(&transport)
            .poll_result(&handle("p1", "t1"), None)
            .await
            .unwrap();

        assert_eq!(response.status, ResponseStatus::Error);
        assert_eq!(response.error.as_deref(), Some("model unavailable"));
        assert_eq!(transport.calls_to(RESULT_P1), 1);
    }

    #[tokio::test]
    async fn polls_with_own_token_and_short_timeout() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(RESULT_P1, json!({ "status": "completed" }));

        engine(&transport)
            .poll_result(&handle("p1", "t1"), None)
            .await
            .unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, HttpMethod::Get);
        assert_eq!(calls[0].timeout, TimeoutClass::Poll);
        assert_eq!(
            calls[0].query,
            vec![(ACCESS_TOKEN_PARAM.to_string(), "t1".to_string())]
        );
    }

    #[tokio::test]
    async fn transport_failure_ends_polling_with_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .reply(RESULT_P1, json!({ "status": "pending" }))
            .fail(RESULT_P1, "Request timed out: operation timed out");

        let err = engine(&transport)
            .poll_result(&handle("p1", "t1"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, BReactError::Client { .. }));
        assert_eq!(transport.calls_to(RESULT_P1), 2);
    }

    #[tokio::test]
    async fn undecodable_body_is_invalid_response() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(RESULT_P1, json!({ "result": null }));

        let err = engine(&transport)
            .poll_result(&handle("p1", "t1"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, BReactError::InvalidResponse { context: "poll", .. }));
    }

    #[tokio::test]
    async fn zero_interval_falls_back_to_default() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .reply(RESULT_P1, json!({ "status": "pending" }))
            .reply(RESULT_P1, json!({ "status": "pending" }))
            .reply(RESULT_P1, json!({ "status": "completed" }));
        let engine = PollEngine::new(
            transport.clone(),
            ApiPaths::default(),
            Duration::from_millis(20),
        );

        let started = std::time::Instant::now();
        engine
            .poll_result(&handle("p1", "t1"), Some(Duration::ZERO))
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(40));
        assert_eq!(transport.calls_to(RESULT_P1), 3);
    }

    #[tokio::test]
    async fn dropping_the_future_stops_polling() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(RESULT_P1, json!({ "status": "pending" }));
        let engine = engine(&transport);

        let outcome = tokio::time::timeout(
            Duration::from_millis(30),
            engine.poll_result(&handle("p1", "t1"), Some(Duration::from_millis(5))),
        )
        .await;
        assert!(outcome.is_err());

        let polls_at_cancel = transport.calls_to(RESULT_P1);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(transport.calls_to(RESULT_P1), polls_at_cancel);
    }
}
