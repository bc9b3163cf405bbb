//! The catalog of pre-built wrappers.
//!
//! Maps a service ID to the constructor of its dedicated wrapper. The client
//! consults it before falling back to [`GenericService`](crate::GenericService).
//! New wrappers are added with [`ServiceCatalog::register`]; nothing is
//! discovered at runtime.

use std::collections::HashMap;
use std::sync::Arc;

use protocol::ServiceId;
use tracing::warn;

use crate::service::{ServiceCore, ServiceInstance, ServiceWrapper};
use crate::services::SummarizationService;

/// Builds a wrapper around a registry-issued core.
pub type WrapperFactory = fn(ServiceCore) -> Arc<dyn ServiceInstance>;

fn construct<W: ServiceWrapper>(core: ServiceCore) -> Arc<dyn ServiceInstance> {
    Arc::new(W::new(core))
}

/// Service ID → wrapper constructor.
#[derive(Clone, Default)]
pub struct ServiceCatalog {
    factories: HashMap<ServiceId, WrapperFactory>,
}

impl ServiceCatalog {
    /// A catalog with no wrappers; every service is served generically.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A catalog with the wrappers shipped in [`crate::services`].
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        catalog.register::<SummarizationService>();
        catalog
    }

    /// Adds `W` under [`ServiceWrapper::SERVICE_ID`], replacing any previous entry.
    pub fn register<W: ServiceWrapper>(&mut self) -> &mut Self {
        match ServiceId::new(W::SERVICE_ID) {
            Some(id) => {
                self.factories.insert(id, construct::<W>);
            }
            None => warn!(wrapper = std::any::type_name::<W>(), "wrapper declares an empty service ID; skipped"),
        }
        self
    }

    pub fn get(&self, id: &ServiceId) -> Option<WrapperFactory> {
        self.factories.get(id).copied()
    }

    pub fn contains(&self, id: &ServiceId) -> bool {
        self.factories.contains_key(id)
    }

    /// The registered service IDs, sorted.
    pub fn ids(&self) -> Vec<ServiceId> {
        let mut ids: Vec<_> = self.factories.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for ServiceCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCatalog").field("ids", &self.ids()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_knows_the_summarizer() {
        let catalog = ServiceCatalog::builtin();
        assert!(catalog.contains(&ServiceId::new("summarizer").unwrap()));
        assert!(!catalog.contains(&ServiceId::new("text_analyzer").unwrap()));
    }

    #[test]
    fn empty_catalog_has_no_wrappers() {
        assert!(ServiceCatalog::empty().ids().is_empty());
    }
}
