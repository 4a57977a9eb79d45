use std::sync::Arc;

use crate::config::{NodeConfig, NodeKind};
use crate::container::registry::{ConfigError, Configurer};
use crate::key::Key;

/// Collects the nodes registered by modules under one scope.
pub struct ConfigurerImpl {
    children: Vec<Arc<NodeConfig>>,
    errors: Vec<ConfigError>,
}

impl ConfigurerImpl {
    pub fn new() -> Self {
        Self {
            children: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Wraps the registered nodes in a scope identified by `key`.
    ///
    /// # Errors
    ///
    /// Returns every error reported so far, aggregated when there is more
    /// than one.
    pub fn finish(self, key: Box<dyn Key>) -> Result<NodeConfig, ConfigError> {
        if !self.errors.is_empty() {
            return Err(ConfigError::aggregate(self.errors));
        }
        let mut scope = NodeConfig::new(key, NodeKind::Scope);
        for child in self.children {
            scope.push_child(child);
        }
        Ok(scope)
    }
}

impl Configurer for ConfigurerImpl {
    fn register(&mut self, node: NodeConfig) {
        self.children.push(Arc::new(node));
    }

    fn register_shared(&mut self, node: Arc<NodeConfig>) {
        self.children.push(node);
    }

    fn report_error(&mut self, err: ConfigError) {
        self.errors.push(err);
    }
}
