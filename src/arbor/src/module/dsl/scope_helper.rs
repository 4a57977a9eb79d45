use std::mem;
use std::sync::Arc;

use crate::config::{FilterConfig, MultiplicityConfig, NodeConfig, NodeKind, ScopeBinding};
use crate::container::registry::{ConfigError, Configurer};
use crate::key::Key;
use crate::module::Module;

/// A scope under construction.
///
/// A scope definition is itself a [`Configurer`], so modules and nested
/// scopes can be set on it directly.
pub struct ScopeDefinition {
    config: NodeConfig,
    errors: Vec<ConfigError>,
}

impl ScopeDefinition {
    pub(super) fn new(key: Box<dyn Key>) -> Self {
        Self {
            config: NodeConfig::new(key, NodeKind::Scope),
            errors: Vec::new(),
        }
    }

    /// Sets `module` up inside this scope.
    pub fn with<M: Module>(mut self, module: M) -> Self {
        module.setup(&mut self);
        self
    }

    pub fn child(mut self, node: impl Into<NodeConfig>) -> Self {
        let node: NodeConfig = node.into();
        self.config.push_child(node);
        self
    }

    pub fn exporting(self, filter: FilterConfig) -> Self {
        self.map(|config| config.exporting(filter))
    }

    pub fn importing(self, filter: FilterConfig) -> Self {
        self.map(|config| config.importing(filter))
    }

    pub fn exporting_to_parent(self, filter: FilterConfig) -> Self {
        self.map(|config| config.exporting_to_parent(filter))
    }

    pub fn bound_by(self, binding: ScopeBinding) -> Self {
        self.map(|config| config.bound_by(binding))
    }

    /// Gives every top-level resolve its own instance of the scope.
    pub fn per_resolve(self) -> Self {
        self.map(|config| config.with_multiplicity(MultiplicityConfig::PerResolve))
    }

    /// Creates a new instance of the scope for every lookup through it.
    pub fn transient(self) -> Self {
        self.map(|config| config.with_multiplicity(MultiplicityConfig::Transient))
    }

    fn map(mut self, f: impl FnOnce(NodeConfig) -> NodeConfig) -> Self {
        let key = self.config.key().dyn_clone();
        let config = mem::replace(&mut self.config, NodeConfig::new(key, NodeKind::Scope));
        self.config = f(config);
        self
    }

    /// # Errors
    ///
    /// Returns the errors reported by the modules set up in this scope.
    pub fn into_config(self) -> Result<NodeConfig, ConfigError> {
        if self.errors.is_empty() {
            Ok(self.config)
        } else {
            Err(ConfigError::aggregate(self.errors))
        }
    }

    /// Registers the scope on `configurer`, forwarding any error reported
    /// inside it.
    pub fn set_on(self, configurer: &mut dyn Configurer) {
        match self.into_config() {
            Ok(config) => configurer.register(config),
            Err(err) => configurer.report_error(err),
        }
    }
}

impl Configurer for ScopeDefinition {
    fn register(&mut self, node: NodeConfig) {
        self.config.push_child(node);
    }

    fn register_shared(&mut self, node: Arc<NodeConfig>) {
        self.config.push_child(node);
    }

    fn report_error(&mut self, err: ConfigError) {
        self.errors.push(err);
    }
}
