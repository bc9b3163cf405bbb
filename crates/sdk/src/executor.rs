//! The execution orchestrator.
//!
//! Turns a fire-and-forget submission into one awaited result: submit through
//! the transport, decode the [`ProcessHandle`], and hand it to the
//! [`PollEngine`]. The batch variants run many such sequences concurrently on
//! the calling task; nothing is spawned.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, try_join_all};
use protocol::{
    ApiPath, BReactError, ExecutionId, HttpMethod, ProcessHandle, ServiceResponse, TimeoutClass,
    Transport, TransportRequest,
};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::poll::PollEngine;

/// One submission: an HTTP call whose response is a [`ProcessHandle`].
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub method: HttpMethod,
    pub path: ApiPath,
    pub body: Option<Value>,
}

impl SubmitRequest {
    /// A `POST` of `body` to `path`.
    pub fn post(path: impl Into<ApiPath>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            body: Some(body),
        }
    }
}

/// Combines submission and polling into single awaited results.
#[derive(Clone)]
pub struct Executor {
    transport: Arc<dyn Transport>,
    poller: PollEngine,
}

impl Executor {
    pub fn new(transport: Arc<dyn Transport>, poller: PollEngine) -> Self {
        Self { transport, poller }
    }

    pub fn poller(&self) -> &PollEngine {
        &self.poller
    }

    /// Sends `request` with the long request timeout and decodes the receipt.
    ///
    /// # Errors
    ///
    /// Returns [`BReactError::Client`] if the call fails and
    /// [`BReactError::InvalidResponse`] if the body is not a process handle.
    pub async fn submit(&self, request: &SubmitRequest) -> Result<ProcessHandle, BReactError> {
        let call = TransportRequest {
            method: request.method,
            path: request.path.clone(),
            query: Vec::new(),
            body: request.body.clone(),
            timeout: TimeoutClass::Request,
        };
        let body = self.transport.request(call).await?;
        let handle: ProcessHandle =
            serde_json::from_value(body).map_err(|e| BReactError::invalid_response("submission", e))?;
        debug!(path = %request.path, process_id = %handle.process_id, "request submitted");
        Ok(handle)
    }

    /// Submits `request` and polls its process to a terminal status.
    ///
    /// The terminal response is returned as-is; a response with status
    /// `error` is *not* turned into an `Err` here.
    ///
    /// # Errors
    ///
    /// Propagates submission and poll failures unchanged.
    #[instrument(
        skip_all,
        fields(execution_id = %ExecutionId::new_random(), method = %request.method, path = %request.path)
    )]
    pub async fn execute_with_polling(
        &self,
        request: SubmitRequest,
        interval: Option<Duration>,
    ) -> Result<ServiceResponse, BReactError> {
        let handle = self.submit(&request).await?;
        self.poller.poll_result(&handle, interval).await
    }

    /// Runs many submit-then-poll sequences concurrently, all-or-nothing.
    ///
    /// Every request is submitted before any polling starts. Results are
    /// returned in input order once every sequence is terminal.
    ///
    /// # Errors
    ///
    /// The first failure, from either phase, is returned immediately. The
    /// other in-flight submissions or polls are dropped at that point; any
    /// jobs already accepted by the backend are left to run unobserved.
    #[instrument(skip_all, fields(execution_id = %ExecutionId::new_random(), count = requests.len()))]
    pub async fn execute_batch(
        &self,
        requests: Vec<SubmitRequest>,
        interval: Option<Duration>,
    ) -> Result<Vec<ServiceResponse>, BReactError> {
        let handles = try_join_all(requests.iter().map(|request| self.submit(request))).await?;
        info!(count = handles.len(), "batch submitted, polling");

        try_join_all(
            handles
                .iter()
                .map(|handle| self.poller.poll_result(handle, interval)),
        )
        .await
    }

    /// Like [`Executor::execute_batch`], but failures are captured per item.
    ///
    /// A failed submission yields an `Err` in its slot and is not polled; the
    /// remaining items still run to completion.
    #[instrument(skip_all, fields(execution_id = %ExecutionId::new_random(), count = requests.len()))]
    pub async fn execute_batch_settled(
        &self,
        requests: Vec<SubmitRequest>,
        interval: Option<Duration>,
    ) -> Vec<Result<ServiceResponse, BReactError>> {
        let submissions = join_all(requests.iter().map(|request| self.submit(request))).await;

        join_all(submissions.into_iter().map(|submission| async move {
            match submission {
                Ok(handle) => self.poller.poll_result(&handle, interval).await,
                Err(err) => Err(err),
            }
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use protocol::{ApiPaths, ResponseStatus, ACCESS_TOKEN_PARAM};
    use serde_json::json;

    use super::*;
    use crate::testing::ScriptedTransport;

    const SUBMIT_A: &str = "/api/v1/services/summarizer/summarize";
    const SUBMIT_B: &str = "/api/v1/services/text_analyzer/analyze";
    const SUBMIT_C: &str = "/api/v1/services/classifier/process";

    fn executor(transport: &Arc<ScriptedTransport>) -> Executor {
        let poller = PollEngine::new(transport.clone(), ApiPaths::default(), Duration::from_millis(2));
        Executor::new(transport.clone(), poller)
    }

    fn result_path(process_id: &str) -> String {
        format!("/api/v1/services/result/{process_id}")
    }

    #[tokio::test]
    async fn submit_then_poll_returns_second_response() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(SUBMIT_A, json!({ "process_id": "p1", "access_token": "t1" }));
        transport
            .reply(&result_path("p1"), json!({ "status": "pending" }))
            .reply(
                &result_path("p1"),
                json!({
                    "status": "completed",
                    "result": { "status": "success", "result": { "content": "hi" } }
                }),
            );

        let response = executor(&transport)
            .execute_with_polling(SubmitRequest::post(SUBMIT_A, json!({ "text": "x" })), None)
            .await
            .unwrap();

        assert_eq!(response.status, ResponseStatus::Completed);
        assert_eq!(response.content().unwrap()["content"], "hi");
        assert_eq!(transport.calls_to(&result_path("p1")), 2);

        let calls = transport.calls();
        assert_eq!(calls[0].path, SUBMIT_A);
        assert_eq!(calls[0].timeout, TimeoutClass::Request);
        assert_eq!(calls[0].body, Some(json!({ "text": "x" })));
    }

    #[tokio::test]
    async fn integer_process_id_is_polled_as_string() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(SUBMIT_A, json!({ "process_id": 42, "access_token": "tok" }));
        transport.reply(&result_path("42"), json!({ "status": "completed" }));

        executor(&transport)
            .execute_with_polling(SubmitRequest::post(SUBMIT_A, json!({})), None)
            .await
            .unwrap();

        assert_eq!(transport.calls_to(&result_path("42")), 1);
    }

    #[tokio::test]
    async fn malformed_receipt_is_invalid_response() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(SUBMIT_A, json!({ "status": "accepted" }));

        let err = executor(&transport)
            .execute_with_polling(SubmitRequest::post(SUBMIT_A, json!({})), None)
            .await
            .unwrap_err();

        assert!(matches!(err, BReactError::InvalidResponse { context: "submission", .. }));
    }

    #[tokio::test]
    async fn batch_returns_results_in_input_order() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(SUBMIT_A, json!({ "process_id": "a", "access_token": "ta" }));
        transport.reply(SUBMIT_B, json!({ "process_id": "b", "access_token": "tb" }));
        // `a` stays pending longer than `b`, so `b` finishes first.
        transport
            .reply(&result_path("a"), json!({ "status": "pending" }))
            .reply(&result_path("a"), json!({ "status": "pending" }))
            .reply(&result_path("a"), json!({ "status": "completed", "message": "a" }));
        transport.reply(&result_path("b"), json!({ "status": "error", "message": "b" }));

        let responses = executor(&transport)
            .execute_batch(
                vec![
                    SubmitRequest::post(SUBMIT_A, json!({})),
                    SubmitRequest::post(SUBMIT_B, json!({})),
                ],
                None,
            )
            .await
            .unwrap();

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].message.as_deref(), Some("a"));
        assert_eq!(responses[1].message.as_deref(), Some("b"));

        // Each concurrent sequence polls with its own token only.
        for (process_id, token) in [("a", "ta"), ("b", "tb")] {
            let polls: Vec<_> = transport
                .calls()
                .into_iter()
                .filter(|c| c.path == result_path(process_id).as_str())
                .collect();
            assert!(!polls.is_empty());
            for poll in polls {
                assert_eq!(
                    poll.query,
                    vec![(ACCESS_TOKEN_PARAM.to_string(), token.to_string())]
                );
            }
        }
        assert_eq!(transport.calls_to(&result_path("a")), 3);
    }

    #[tokio::test]
    async fn batch_submits_everything_before_polling() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(SUBMIT_A, json!({ "process_id": "a", "access_token": "ta" }));
        transport.reply(SUBMIT_B, json!({ "process_id": "b", "access_token": "tb" }));
        transport.delay(SUBMIT_B, Duration::from_millis(20));
        transport.reply(&result_path("a"), json!({ "status": "completed" }));
        transport.reply(&result_path("b"), json!({ "status": "completed" }));

        executor(&transport)
            .execute_batch(
                vec![
                    SubmitRequest::post(SUBMIT_A, json!({})),
                    SubmitRequest::post(SUBMIT_B, json!({})),
                ],
                None,
            )
            .await
            .unwrap();

        // Calls are logged on completion: the slow submission of `b` must
        // finish before `a` is polled.
        let paths: Vec<String> = transport.calls().into_iter().map(|c| c.path.to_string()).collect();
        let first_poll = paths.iter().position(|p| p.contains("/result/")).unwrap();
        assert!(paths[..first_poll].iter().any(|p| p == SUBMIT_A));
        assert!(paths[..first_poll].iter().any(|p| p == SUBMIT_B));
    }

    #[tokio::test]
    async fn batch_fails_whole_when_one_submission_fails() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(SUBMIT_A, json!({ "process_id": "a", "access_token": "ta" }));
        transport.fail(SUBMIT_B, "HTTP request failed: connection refused");
        transport.reply(SUBMIT_C, json!({ "process_id": "c", "access_token": "tc" }));
        transport.reply(&result_path("a"), json!({ "status": "completed" }));
        transport.reply(&result_path("c"), json!({ "status": "completed" }));

        let err = executor(&transport)
            .execute_batch(
                vec![
                    SubmitRequest::post(SUBMIT_A, json!({})),
                    SubmitRequest::post(SUBMIT_B, json!({})),
                    SubmitRequest::post(SUBMIT_C, json!({})),
                ],
                None,
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("connection refused"));
        assert_eq!(transport.calls_to(&result_path("a")), 0);
        assert_eq!(transport.calls_to(&result_path("c")), 0);
    }

    #[tokio::test]
    async fn batch_fails_whole_when_one_poll_fails() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(SUBMIT_A, json!({ "process_id": "a", "access_token": "ta" }));
        transport.reply(SUBMIT_B, json!({ "process_id": "b", "access_token": "tb" }));
        transport.reply(&result_path("a"), json!({ "status": "pending" }));
        transport.fail(&result_path("b"), "Request timed out: deadline has elapsed");

        let err = executor(&transport)
            .execute_batch(
                vec![
                    SubmitRequest::post(SUBMIT_A, json!({})),
                    SubmitRequest::post(SUBMIT_B, json!({})),
                ],
                None,
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn settled_batch_keeps_successes_alongside_failures() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(SUBMIT_A, json!({ "process_id": "a", "access_token": "ta" }));
        transport.fail(SUBMIT_B, "HTTP request failed: 503 Service Unavailable");
        transport.reply(&result_path("a"), json!({ "status": "completed" }));

        let results = executor(&transport)
            .execute_batch_settled(
                vec![
                    SubmitRequest::post(SUBMIT_A, json!({})),
                    SubmitRequest::post(SUBMIT_B, json!({})),
                ],
                None,
            )
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().status, ResponseStatus::Completed);
        assert!(matches!(results[1], Err(BReactError::Client { .. })));
    }
}
