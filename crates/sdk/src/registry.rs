//! The service registry.
//!
//! Holds two independent maps keyed by service ID: fetched
//! [`ServiceDefinition`]s and live [`ServiceInstance`]s. Both are
//! last-write-wins. Reads may run concurrently; each write takes a short
//! exclusive lock and never spans an `await`.
//!
//! The registry creates every [`ServiceCore`], so it must be bound to a
//! client before instances can be registered. Instances are registered only through the client
//! ([`BReactClient::get_service`](crate::BReactClient::get_service) and
//! [`BReactClient::register_service`](crate::BReactClient::register_service)),
//! which keeps its own cache in step with this one.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use protocol::{BReactError, ServiceDefinition, ServiceId};
use serde_json::Value;
use tracing::debug;

use crate::client::ClientRef;
use crate::service::{ServiceCore, ServiceInstance, ServiceWrapper};

#[derive(Default)]
pub struct ServiceRegistry {
    definitions: RwLock<HashMap<ServiceId, ServiceDefinition>>,
    instances: RwLock<HashMap<ServiceId, Arc<dyn ServiceInstance>>>,
    client: RwLock<Option<ClientRef>>,
}

impl ServiceRegistry {
    /// Creates an empty registry with no client bound.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the client that new instances will be attached to.
    pub(crate) fn bind_client(&self, client: ClientRef) {
        *self.client.write() = Some(client);
    }

    /// Decodes and stores a raw definition from the services listing.
    ///
    /// # Errors
    ///
    /// Returns [`BReactError::InvalidResponse`] if `raw` is not a service
    /// definition (missing `id` or `name`, or an empty `id`).
    pub fn register_definition(&self, raw: Value) -> Result<ServiceDefinition, BReactError> {
        let definition: ServiceDefinition = serde_json::from_value(raw)
            .map_err(|e| BReactError::invalid_response("service definition", e))?;
        debug!(service_id = %definition.id, name = %definition.name, "service definition registered");
        self.definitions
            .write()
            .insert(definition.id.clone(), definition.clone());
        Ok(definition)
    }

    /// Builds an instance for `service_id` with `factory` and caches it.
    ///
    /// The instance is bound to the registry's client and, if a definition
    /// for `service_id` is already known, the definition is attached. Any
    /// previously cached instance for the same ID is replaced. The instance is
    /// *not* initialised here.
    ///
    /// # Errors
    ///
    /// Returns [`BReactError::Configuration`] if no client is bound.
    pub(crate) fn register_instance<F>(
        &self,
        service_id: ServiceId,
        factory: F,
    ) -> Result<Arc<dyn ServiceInstance>, BReactError>
    where
        F: FnOnce(ServiceCore) -> Arc<dyn ServiceInstance>,
    {
        let instance = factory(self.new_core(service_id)?);
        self.adopt(instance.clone());
        Ok(instance)
    }

    /// Builds, caches, and returns a `W` wrapper.
    ///
    /// # Errors
    ///
    /// Returns [`BReactError::Configuration`] if no client is bound or
    /// `W::SERVICE_ID` is empty.
    pub(crate) fn register_wrapper<W: ServiceWrapper>(&self) -> Result<Arc<W>, BReactError> {
        let service_id = ServiceId::new(W::SERVICE_ID).ok_or_else(|| {
            BReactError::configuration(format!(
                "wrapper {} declares an empty service ID",
                std::any::type_name::<W>()
            ))
        })?;
        let wrapper = Arc::new(W::new(self.new_core(service_id)?));
        self.adopt(wrapper.clone());
        Ok(wrapper)
    }

    pub fn get_definition(&self, service_id: &ServiceId) -> Option<ServiceDefinition> {
        self.definitions.read().get(service_id).cloned()
    }

    pub fn get_instance(&self, service_id: &ServiceId) -> Option<Arc<dyn ServiceInstance>> {
        self.instances.read().get(service_id).cloned()
    }

    /// A snapshot of every known definition; changes to it do not affect the registry.
    pub fn list_definitions(&self) -> HashMap<ServiceId, ServiceDefinition> {
        self.definitions.read().clone()
    }

    /// Drops the cached instance for `service_id`, if it is `instance`.
    pub(crate) fn evict_instance(&self, service_id: &ServiceId, instance: &Arc<dyn ServiceInstance>) {
        let mut instances = self.instances.write();
        if instances
            .get(service_id)
            .is_some_and(|cached| Arc::ptr_eq(cached, instance))
        {
            instances.remove(service_id);
        }
    }

    fn new_core(&self, service_id: ServiceId) -> Result<ServiceCore, BReactError> {
        let client = self.client.read().clone().ok_or_else(|| {
            BReactError::configuration("client reference not set; bind a client before registering services")
        })?;
        Ok(ServiceCore::new(service_id, client))
    }

    fn adopt(&self, instance: Arc<dyn ServiceInstance>) {
        let service_id = instance.service_id().clone();
        if let Some(definition) = self.get_definition(&service_id) {
            instance.attach_definition(definition);
        }
        if self
            .instances
            .write()
            .insert(service_id.clone(), instance)
            .is_some()
        {
            debug!(service_id = %service_id, "replaced cached service instance");
        }
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("definitions", &self.definitions.read().len())
            .field("instances", &self.instances.read().len())
            .field("client_bound", &self.client.read().is_some())
            .finish()
    }
}
