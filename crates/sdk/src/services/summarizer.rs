use protocol::{BReactError, ServiceResponse};
use serde_json::json;

use crate::service::{ServiceCore, ServiceInstance, ServiceWrapper};

/// Wrapper for the text summarisation service.
#[derive(Debug)]
pub struct SummarizationService {
    core: ServiceCore,
}

impl SummarizationService {
    /// Summary length used when the caller does not choose one, in words.
    pub const DEFAULT_MAX_LENGTH: u32 = 100;

    /// Summarises `text` to at most `max_length` words.
    ///
    /// # Errors
    ///
    /// See [`BReactClient::execute_service`](crate::BReactClient::execute_service).
    pub async fn summarize(
        &self,
        text: &str,
        max_length: Option<u32>,
    ) -> Result<ServiceResponse, BReactError> {
        let params = json!({
            "text": text,
            "max_length": max_length.unwrap_or(Self::DEFAULT_MAX_LENGTH),
        });
        self.execute("summarize", params).await
    }
}

impl ServiceInstance for SummarizationService {
    fn core(&self) -> &ServiceCore {
        &self.core
    }
}

impl ServiceWrapper for SummarizationService {
    const SERVICE_ID: &'static str = "summarizer";

    fn new(core: ServiceCore) -> Self {
        Self { core }
    }
}
