//! The client facade.
//!
//! [`BReactClient`] owns the configuration, the transport, the executor, the
//! service registry (bound back to the client), and the cache of initialised
//! service instances. It is cheap to clone; clones share all of that state.
//!
//! Service wrappers hold a [`ClientRef`], a weak handle back to the client,
//! so cached wrappers never keep the client alive on their own.
//!
//! ## Lifecycle
//!
//! Call [`BReactClient::close`] once when done to release pooled
//! connections. Dropping the last clone without closing also releases them
//! when the transport is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use http_transport::{HttpTransportConfig, ReqwestTransport};
use parking_lot::Mutex;
use protocol::{
    ApiPaths, BReactError, EndpointName, ResponseStatus, ServiceDefinition, ServiceId,
    ServiceResponse, Transport, TransportRequest,
};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::catalog::ServiceCatalog;
use crate::config::ClientConfig;
use crate::executor::{Executor, SubmitRequest};
use crate::poll::PollEngine;
use crate::registry::ServiceRegistry;
use crate::service::{downcast_service, GenericService, ServiceInstance, ServiceWrapper};

/// One cache slot per service ID. The cell serialises initialisation so
/// concurrent lookups of the same ID run `initialize` once.
type Slot = Arc<OnceCell<Arc<dyn ServiceInstance>>>;

/// Why a slot could not be filled.
enum Unresolved {
    /// No wrapper and no definition: the lookup yields `None`.
    Unknown,
    Failed(BReactError),
}

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    paths: ApiPaths,
    executor: Executor,
    registry: ServiceRegistry,
    catalog: ServiceCatalog,
    instances: Mutex<HashMap<ServiceId, Slot>>,
}

/// A weak handle from a service wrapper back to its client.
#[derive(Clone)]
pub struct ClientRef(Weak<ClientInner>);

impl ClientRef {
    /// Returns the client, if it is still alive.
    pub fn upgrade(&self) -> Option<BReactClient> {
        self.0.upgrade().map(|inner| BReactClient { inner })
    }

    /// Runs `endpoint` of `service_id` through the owning client.
    ///
    /// # Errors
    ///
    /// Returns [`BReactError::Configuration`] if the client has been dropped,
    /// otherwise as [`BReactClient::execute_service`].
    pub async fn execute_service(
        &self,
        service_id: &ServiceId,
        endpoint: &str,
        params: Value,
    ) -> Result<ServiceResponse, BReactError> {
        let client = self
            .upgrade()
            .ok_or_else(|| BReactError::configuration("client has been dropped"))?;
        client.execute(service_id, endpoint, params).await
    }

    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self(Weak::new())
    }
}

impl std::fmt::Debug for ClientRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRef")
            .field("alive", &(self.0.strong_count() > 0))
            .finish()
    }
}

/// Assembles a [`BReactClient`].
pub struct ClientBuilder {
    config: ClientConfig,
    catalog: ServiceCatalog,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    /// Adds a pre-built wrapper to the catalog consulted by `get_service`.
    pub fn with_wrapper<W: ServiceWrapper>(mut self) -> Self {
        self.catalog.register::<W>();
        self
    }

    /// Replaces the whole wrapper catalog.
    pub fn with_catalog(mut self, catalog: ServiceCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Uses `transport` instead of building a [`ReqwestTransport`].
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`BReactError::Configuration`] if the HTTP transport cannot be
    /// constructed from the configuration.
    pub fn build(self) -> Result<BReactClient, BReactError> {
        let config = self.config;
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(HttpTransportConfig {
                base_url: config.base_url().clone(),
                api_key: Some(config.api_key().to_string()),
                request_timeout: config.request_timeout(),
                poll_timeout: config.poll_timeout(),
            })?),
        };

        let paths = ApiPaths::new(config.api_version());
        let poller = PollEngine::new(transport.clone(), paths.clone(), config.poll_interval());
        let executor = Executor::new(transport.clone(), poller);
        let catalog = self.catalog;

        let inner = Arc::new_cyclic(|weak| {
            let registry = ServiceRegistry::new();
            registry.bind_client(ClientRef(weak.clone()));
            ClientInner {
                config,
                transport,
                paths,
                executor,
                registry,
                catalog,
                instances: Mutex::new(HashMap::new()),
            }
        });

        info!(
            base_url = %inner.config.base_url(),
            api_version = %inner.config.api_version(),
            "BReact client ready"
        );
        Ok(BReactClient { inner })
    }
}

/// Entry point for calling BReact services.
#[derive(Clone)]
pub struct BReactClient {
    inner: Arc<ClientInner>,
}

impl BReactClient {
    /// Builds a client with the built-in wrapper catalog and the HTTP transport.
    ///
    /// # Errors
    ///
    /// See [`ClientBuilder::build`].
    pub fn new(config: ClientConfig) -> Result<Self, BReactError> {
        Self::builder(config).build()
    }

    /// Builds a client from the environment (see [`ClientConfig::from_env`]).
    ///
    /// # Errors
    ///
    /// Returns [`BReactError::Configuration`] if no API key is available.
    pub fn from_env() -> Result<Self, BReactError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder {
            config,
            catalog: ServiceCatalog::builtin(),
            transport: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.inner.registry
    }

    pub fn executor(&self) -> &Executor {
        &self.inner.executor
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.inner.catalog
    }

    pub fn paths(&self) -> &ApiPaths {
        &self.inner.paths
    }

    /// Fetches the services listing and registers every definition in it.
    ///
    /// Returns every definition now known, including ones registered earlier.
    ///
    /// # Errors
    ///
    /// Returns [`BReactError::Client`] if the listing call fails and
    /// [`BReactError::InvalidResponse`] if the listing is not an object of
    /// definitions.
    #[instrument(skip_all)]
    pub async fn fetch_services(&self) -> Result<HashMap<ServiceId, ServiceDefinition>, BReactError> {
        let listing = self
            .inner
            .transport
            .request(TransportRequest::get(self.inner.paths.services()))
            .await?;

        let Value::Object(entries) = listing else {
            return Err(BReactError::invalid_response(
                "services listing",
                "expected an object keyed by service ID",
            ));
        };

        for raw in entries.into_values() {
            self.inner.registry.register_definition(raw)?;
        }

        let services = self.inner.registry.list_definitions();
        info!(count = services.len(), "services fetched");
        Ok(services)
    }

    /// Returns the initialised instance for `service_id`, creating it on first use.
    ///
    /// A dedicated wrapper from the catalog is preferred; otherwise a
    /// [`GenericService`] is built from the fetched definition. Returns
    /// `Ok(None)` when there is neither. Concurrent calls for the same ID
    /// share one instance and one `initialize` run.
    ///
    /// # Errors
    ///
    /// Returns the error of a failed `initialize`; the next call retries.
    #[instrument(skip(self))]
    pub async fn get_service(
        &self,
        service_id: &str,
    ) -> Result<Option<Arc<dyn ServiceInstance>>, BReactError> {
        let Some(service_id) = ServiceId::new(service_id) else {
            return Ok(None);
        };

        let slot = self.slot(&service_id);
        match slot.get_or_try_init(|| self.instantiate(&service_id)).await {
            Ok(instance) => Ok(Some(instance.clone())),
            Err(Unresolved::Unknown) => {
                debug!("no wrapper or definition for service");
                self.release_slot(&service_id, &slot);
                Ok(None)
            }
            Err(Unresolved::Failed(err)) => Err(err),
        }
    }

    /// Like [`BReactClient::get_service`], typed as wrapper `W`.
    ///
    /// Returns `Ok(None)` if the cached instance for `W::SERVICE_ID` is not a `W`.
    ///
    /// # Errors
    ///
    /// As [`BReactClient::get_service`].
    pub async fn get_service_as<W: ServiceWrapper>(&self) -> Result<Option<Arc<W>>, BReactError> {
        Ok(self
            .get_service(W::SERVICE_ID)
            .await?
            .and_then(downcast_service::<W>))
    }

    /// Registers, initialises, and caches a `W`, replacing any cached instance.
    ///
    /// # Errors
    ///
    /// Returns the error of `initialize`, or [`BReactError::Configuration`] if
    /// `W::SERVICE_ID` is empty.
    #[instrument(skip(self), fields(service_id = W::SERVICE_ID))]
    pub async fn register_service<W: ServiceWrapper>(&self) -> Result<Arc<W>, BReactError> {
        let wrapper = self.inner.registry.register_wrapper::<W>()?;
        let instance: Arc<dyn ServiceInstance> = wrapper.clone();
        if let Err(err) = wrapper.initialize().await {
            self.inner.registry.evict_instance(wrapper.service_id(), &instance);
            return Err(err);
        }

        self.inner.instances.lock().insert(
            wrapper.service_id().clone(),
            Arc::new(OnceCell::new_with(Some(instance))),
        );
        info!("service registered");
        Ok(wrapper)
    }

    /// Runs `endpoint` of `service_id` with `params` and waits for the result.
    ///
    /// # Errors
    ///
    /// - [`BReactError::ServiceNotFound`] if no definition is known for
    ///   `service_id` (call [`BReactClient::fetch_services`] first).
    /// - [`BReactError::ServiceExecution`] if the job ends with status `error`.
    /// - [`BReactError::Configuration`] if `service_id` or `endpoint` is empty.
    /// - Transport and decoding errors from the submission or any poll.
    pub async fn execute_service(
        &self,
        service_id: &str,
        endpoint: &str,
        params: Value,
    ) -> Result<ServiceResponse, BReactError> {
        let service_id = ServiceId::new(service_id)
            .ok_or_else(|| BReactError::configuration("service ID must not be empty"))?;
        self.execute(&service_id, endpoint, params).await
    }

    /// Submits `request` and polls it to a terminal status. See [`Executor::execute_with_polling`].
    ///
    /// # Errors
    ///
    /// Propagates submission and poll failures.
    pub async fn execute_with_polling(
        &self,
        request: SubmitRequest,
        interval: Option<Duration>,
    ) -> Result<ServiceResponse, BReactError> {
        self.inner.executor.execute_with_polling(request, interval).await
    }

    /// Runs `requests` concurrently, all-or-nothing. See [`Executor::execute_batch`].
    ///
    /// # Errors
    ///
    /// Returns the first failure of any submission or poll.
    pub async fn execute_batch(
        &self,
        requests: Vec<SubmitRequest>,
        interval: Option<Duration>,
    ) -> Result<Vec<ServiceResponse>, BReactError> {
        self.inner.executor.execute_batch(requests, interval).await
    }

    /// Runs `requests` concurrently with per-item results. See [`Executor::execute_batch_settled`].
    pub async fn execute_batch_settled(
        &self,
        requests: Vec<SubmitRequest>,
        interval: Option<Duration>,
    ) -> Vec<Result<ServiceResponse, BReactError>> {
        self.inner.executor.execute_batch_settled(requests, interval).await
    }

    /// Releases the transport's pooled connections. Idempotent.
    pub async fn close(&self) {
        self.inner.transport.close().await;
        info!("BReact client closed");
    }

    #[instrument(skip(self, params), fields(service_id = %service_id, endpoint = %endpoint))]
    async fn execute(
        &self,
        service_id: &ServiceId,
        endpoint: &str,
        params: Value,
    ) -> Result<ServiceResponse, BReactError> {
        if self.inner.registry.get_definition(service_id).is_none() {
            return Err(BReactError::ServiceNotFound {
                service_id: service_id.clone(),
            });
        }
        let endpoint = EndpointName::new(endpoint)
            .ok_or_else(|| BReactError::configuration("endpoint name must not be empty"))?;

        let request = SubmitRequest::post(self.inner.paths.submit(service_id, &endpoint), params);
        let response = self.inner.executor.execute_with_polling(request, None).await?;

        if response.status == ResponseStatus::Error {
            let message = response
                .error
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string());
            warn!(error = %message, "service execution failed");
            return Err(BReactError::ServiceExecution { message });
        }
        Ok(response)
    }

    fn slot(&self, service_id: &ServiceId) -> Slot {
        self.inner
            .instances
            .lock()
            .entry(service_id.clone())
            .or_default()
            .clone()
    }

    /// Drops `slot` from the cache if it is still cached, still empty, and
    /// held by no other lookup (the map and `slot` are the only owners).
    fn release_slot(&self, service_id: &ServiceId, slot: &Slot) {
        let mut instances = self.inner.instances.lock();
        if instances.get(service_id).is_some_and(|cached| {
            Arc::ptr_eq(cached, slot) && !cached.initialized() && Arc::strong_count(cached) == 2
        }) {
            instances.remove(service_id);
        }
    }

    async fn instantiate(
        &self,
        service_id: &ServiceId,
    ) -> Result<Arc<dyn ServiceInstance>, Unresolved> {
        let registry = &self.inner.registry;
        let instance = match self.inner.catalog.get(service_id) {
            Some(factory) => registry.register_instance(service_id.clone(), factory),
            None => {
                if registry.get_definition(service_id).is_none() {
                    return Err(Unresolved::Unknown);
                }
                registry.register_instance(service_id.clone(), |core| {
                    Arc::new(GenericService::new(core))
                })
            }
        }
        .map_err(Unresolved::Failed)?;

        if let Err(err) = instance.initialize().await {
            warn!(service_id = %service_id, error = %err, "service initialisation failed");
            registry.evict_instance(service_id, &instance);
            return Err(Unresolved::Failed(err));
        }

        info!(service_id = %service_id, "service ready");
        Ok(instance)
    }
}

impl std::fmt::Debug for BReactClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BReactClient")
            .field("config", &self.inner.config)
            .field("registry", &self.inner.registry)
            .field("catalog", &self.inner.catalog)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::services::SummarizationService;
    use crate::testing::ScriptedTransport;

    fn client(transport: &Arc<ScriptedTransport>) -> BReactClient {
        let config = ClientConfig::builder()
            .api_key("test-key")
            .poll_interval(Duration::from_millis(2))
            .resolve_with(|_| None)
            .unwrap();
        BReactClient::builder(config)
            .with_transport(transport.clone())
            .build()
            .unwrap()
    }

    fn cached_slots(client: &BReactClient) -> usize {
        client.inner.instances.lock().len()
    }

    #[tokio::test]
    async fn unknown_lookups_leave_no_cache_entry() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client(&transport);

        for _ in 0..3 {
            assert!(client.get_service("unknown_id").await.unwrap().is_none());
        }

        assert_eq!(cached_slots(&client), 0);
    }

    #[tokio::test]
    async fn unknown_lookup_resolves_after_definitions_arrive() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(
            "/api/v1/services",
            json!({ "late": { "id": "late", "name": "Late" } }),
        );
        let client = client(&transport);

        assert!(client.get_service("late").await.unwrap().is_none());
        client.fetch_services().await.unwrap();

        let instance = client.get_service("late").await.unwrap().unwrap();
        assert_eq!(instance.definition().unwrap().name, "Late");
        assert_eq!(cached_slots(&client), 1);
    }

    #[tokio::test]
    async fn registration_keeps_both_caches_in_step() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client(&transport);
        let service_id = ServiceId::new(SummarizationService::SERVICE_ID).unwrap();

        let looked_up = client.get_service("summarizer").await.unwrap().unwrap();
        let registered: Arc<dyn ServiceInstance> =
            client.register_service::<SummarizationService>().await.unwrap();
        assert!(!Arc::ptr_eq(&looked_up, &registered));

        let from_facade = client.get_service("summarizer").await.unwrap().unwrap();
        let from_registry = client.registry().get_instance(&service_id).unwrap();
        assert!(Arc::ptr_eq(&from_facade, &registered));
        assert!(Arc::ptr_eq(&from_registry, &registered));
    }
}
