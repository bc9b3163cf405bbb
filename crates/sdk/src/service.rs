//! Service wrappers.
//!
//! A service wrapper is a [`ServiceInstance`] bound to one service ID and to
//! the client that created it. Every wrapper embeds a [`ServiceCore`], which
//! carries that binding and the service definition once one is known.
//!
//! Statically-known wrappers also implement [`ServiceWrapper`], which ties
//! the type to its service ID so it can be listed in a
//! [`ServiceCatalog`](crate::ServiceCatalog). Services without a dedicated
//! wrapper are served by [`GenericService`].

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use protocol::{BReactError, ServiceDefinition, ServiceId, ServiceResponse};
use serde_json::Value;

use crate::client::ClientRef;

/// Upcast to `Any` so a `dyn ServiceInstance` can be downcast to its wrapper type.
pub trait AsAny: Any + Send + Sync {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// State shared by every wrapper: its service ID, its client, and the
/// attached definition.
///
/// Only the [`ServiceRegistry`](crate::ServiceRegistry) creates cores, so a
/// wrapper is always bound to the client whose registry built it.
#[derive(Debug)]
pub struct ServiceCore {
    id: ServiceId,
    client: ClientRef,
    definition: RwLock<Option<ServiceDefinition>>,
}

impl ServiceCore {
    pub(crate) fn new(id: ServiceId, client: ClientRef) -> Self {
        Self {
            id,
            client,
            definition: RwLock::new(None),
        }
    }

    pub fn id(&self) -> &ServiceId {
        &self.id
    }

    pub fn client(&self) -> &ClientRef {
        &self.client
    }

    pub fn definition(&self) -> Option<ServiceDefinition> {
        self.definition.read().clone()
    }

    pub fn attach_definition(&self, definition: ServiceDefinition) {
        *self.definition.write() = Some(definition);
    }

    /// Runs `endpoint` of this service with `params` and waits for the result.
    ///
    /// # Errors
    ///
    /// See [`BReactClient::execute_service`](crate::BReactClient::execute_service).
    pub async fn execute(&self, endpoint: &str, params: Value) -> Result<ServiceResponse, BReactError> {
        self.client.execute_service(&self.id, endpoint, params).await
    }
}

/// A live, client-bound service wrapper.
///
/// `initialize` runs exactly once, before the instance is first handed out
/// by [`BReactClient::get_service`](crate::BReactClient::get_service) or
/// [`BReactClient::register_service`](crate::BReactClient::register_service).
#[async_trait]
pub trait ServiceInstance: AsAny + std::fmt::Debug {
    /// The embedded shared state.
    fn core(&self) -> &ServiceCore;

    fn service_id(&self) -> &ServiceId {
        self.core().id()
    }

    fn definition(&self) -> Option<ServiceDefinition> {
        self.core().definition()
    }

    fn attach_definition(&self, definition: ServiceDefinition) {
        self.core().attach_definition(definition);
    }

    /// One-time setup before first use. The default does nothing.
    async fn initialize(&self) -> Result<(), BReactError> {
        Ok(())
    }

    /// Runs `endpoint` of this service with `params`.
    async fn execute(&self, endpoint: &str, params: Value) -> Result<ServiceResponse, BReactError> {
        self.core().execute(endpoint, params).await
    }
}

/// A wrapper type dedicated to one service ID.
pub trait ServiceWrapper: ServiceInstance + Sized {
    /// The service this wrapper serves.
    const SERVICE_ID: &'static str;

    fn new(core: ServiceCore) -> Self;
}

/// Downcasts a shared instance to its concrete wrapper type.
pub fn downcast_service<W: ServiceInstance>(instance: Arc<dyn ServiceInstance>) -> Option<Arc<W>> {
    instance.into_any().downcast::<W>().ok()
}

/// The wrapper used for services with no dedicated wrapper type.
///
/// Offers only the generic [`ServiceInstance::execute`].
#[derive(Debug)]
pub struct GenericService {
    core: ServiceCore,
}

impl GenericService {
    pub fn new(core: ServiceCore) -> Self {
        Self { core }
    }
}

impl ServiceInstance for GenericService {
    fn core(&self) -> &ServiceCore {
        &self.core
    }
}
