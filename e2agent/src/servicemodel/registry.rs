//! Service model registry
//!
//! Populated once while the node is assembled and read-only afterwards.

use super::ServiceModel;
use common::types::RanFunctionId;
use interfaces::{E2Error, RanFunctionItem};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Service models keyed by RAN function id
#[derive(Default)]
pub struct ServiceModelRegistry {
    models: BTreeMap<RanFunctionId, Arc<dyn ServiceModel>>,
}

impl ServiceModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, model: Arc<dyn ServiceModel>) -> Result<(), E2Error> {
        let function = model.ran_function();
        if self.models.contains_key(&function.id) {
            return Err(E2Error::Invalid(format!(
                "RAN function {} is already registered",
                function.id
            )));
        }

        info!(
            "Registered service model {} {} (oid {}) as RAN function {}",
            function.model_name, function.version, function.oid, function.id
        );
        self.models.insert(function.id, model);
        Ok(())
    }

    pub fn get(&self, id: RanFunctionId) -> Option<Arc<dyn ServiceModel>> {
        self.models.get(&id).cloned()
    }

    /// RAN functions to announce at E2 setup, ordered by id
    pub fn ran_functions(&self) -> Vec<RanFunctionItem> {
        self.models
            .values()
            .map(|model| model.ran_function().to_item())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
