//! The build phase: from a configuration tree to a provider node tree.

mod builders;
mod configurer;
mod pipeline;
mod visibility;

use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use snafu::prelude::*;

use crate::config::NodeConfig;
use crate::key::Key;
use crate::module::Module;
use crate::tree::{NodeId, NodeTree, ProviderNode};

pub use builders::{
    DefaultActivatorBuilder, DefaultDisposeHandlerBuilder, DefaultMultiplicityBuilder,
    DefaultNodeBuilder, DefaultScopeBinderBuilder, DefaultVisibilityBuilder,
};
pub use configurer::ConfigurerImpl;
pub use pipeline::{Interceptor, Next, Pipeline};

/// Something which can be assembled from a [`Module`].
pub trait Registry: Sized + Send + Sync + 'static {
    fn init<M: Module>(module: M) -> Result<Self, ConfigError>;
}

/// The sink modules register their nodes on.
pub trait Configurer: Send + 'static {
    fn register(&mut self, node: NodeConfig);

    /// Attaches a node that is shared with other parts of the
    /// configuration. Attaching the same node twice fails the build.
    fn register_shared(&mut self, node: Arc<NodeConfig>);

    fn report_error(&mut self, err: ConfigError);

    fn report_module_error(&mut self, module: &'static str, err: Box<dyn Error + Send + Sync>) {
        self.report_error(ConfigError::ModuleInner {
            module,
            source: err,
        });
    }
}

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ConfigError {
    #[snafu(display("the configuration node {key} is attached to the tree more than once"))]
    #[non_exhaustive]
    ConfigurationReused { key: Box<dyn Key> },
    #[snafu(display("the key {key} is already registered in the same scope"))]
    #[non_exhaustive]
    KeyDuplicated { key: Box<dyn Key> },
    #[snafu(display("the scope {scope} can see {key} through two different children"))]
    #[non_exhaustive]
    ImportCollision {
        key: Box<dyn Key>,
        scope: Box<dyn Key>,
    },
    #[snafu(display("the component {component} does not declare any constructor"))]
    #[non_exhaustive]
    NoConstructor { component: &'static str },
    #[snafu(display("the component {component} declares more than one constructor ({count})"))]
    #[non_exhaustive]
    MultipleConstructors {
        component: &'static str,
        count: usize,
    },
    #[snafu(display(
        "{component} takes multiple parameters of the same type, identified by {key}"
    ))]
    #[non_exhaustive]
    DuplicateParameter {
        component: &'static str,
        key: Box<dyn Key>,
    },
    #[snafu(display("the binding {key} does not say how its objects are constructed"))]
    #[non_exhaustive]
    MissingStrategy { key: Box<dyn Key> },
    #[snafu(display("no interceptor supports the {kind} configuration of {detail}"))]
    #[non_exhaustive]
    Unsupported { kind: &'static str, detail: String },
    #[snafu(display("module {module} fails to setup the configuration"))]
    #[non_exhaustive]
    ModuleInner {
        module: &'static str,
        source: Box<dyn Error + Send + Sync>,
    },
    #[snafu(display("aggregated configuration errors:\n{}", AggregatedDisplayer::new(errors)))]
    Aggregated { errors: Vec<ConfigError> },
}

impl ConfigError {
    pub(crate) fn aggregate(mut errors: Vec<ConfigError>) -> Self {
        if errors.len() == 1 {
            if let Some(err) = errors.pop() {
                return err;
            }
        }
        Self::Aggregated { errors }
    }
}

struct AggregatedDisplayer<'a> {
    errors: &'a [ConfigError],
}

impl<'a> AggregatedDisplayer<'a> {
    fn new(errors: &'a [ConfigError]) -> Self {
        Self { errors }
    }
}

impl Display for AggregatedDisplayer<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (i, error) in self.errors.iter().enumerate() {
            writeln!(f, "{:4}: {}", i + 1, error)?;
        }
        Ok(())
    }
}

/// Builds the node tree described by `config` and computes what every node
/// can see.
pub(crate) fn build_tree(
    config: &Arc<NodeConfig>,
    pipeline: &Pipeline,
) -> Result<NodeTree, ConfigError> {
    let mut tree = NodeTree::new();
    let mut visited = HashSet::new();
    visited.insert(Arc::as_ptr(config));

    let root = tree.insert_root(ProviderNode::new(pipeline.build_node(config)?));
    register_children(&mut tree, pipeline, &mut visited, root, config)?;
    tracing::debug!(root = %config.key(), nodes = tree.len(), "registered provider nodes");

    visibility::import_from_children(&mut tree)?;
    visibility::export_to_children(&mut tree);
    tracing::debug!(root = %config.key(), "computed visibility");
    Ok(tree)
}

fn register_children(
    tree: &mut NodeTree,
    pipeline: &Pipeline,
    visited: &mut HashSet<*const NodeConfig>,
    parent: NodeId,
    config: &NodeConfig,
) -> Result<(), ConfigError> {
    for child in config.children() {
        if !visited.insert(Arc::as_ptr(child)) {
            return Err(ConfigError::ConfigurationReused {
                key: child.key().dyn_clone(),
            });
        }
        let node = ProviderNode::new(pipeline.build_node(child)?);
        let id = tree.register_child(parent, node)?;
        tracing::trace!(key = %child.key(), %id, %parent, "registered node");
        register_children(tree, pipeline, visited, id, child)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::config::{ActivationConfig, FilterConfig};
    use crate::key;

    use super::*;

    struct Root;

    struct Inner;

    fn instance<T: crate::container::Managed>(value: T) -> NodeConfig {
        NodeConfig::binding(key::of::<T>())
            .with_activation(ActivationConfig::Instance(Arc::new(value)))
    }

    #[test]
    fn build_tree_succeeds() {
        let inner = NodeConfig::scope(key::of::<Inner>())
            .with_child(instance(1u8))
            .exporting_to_parent(FilterConfig::AllowAll);
        let config = NodeConfig::scope(key::of::<Root>())
            .with_child(inner)
            .with_child(instance(2i32));
        let config = Arc::new(config);

        let tree = build_tree(&config, &Pipeline::default()).unwrap();
        assert_eq!(tree.len(), 4);

        let root = tree.root();
        let from_root = tree.lookup(root, &key::of::<u8>()).unwrap();
        assert_eq!(from_root.path().len(), 2);

        let inner = tree.get(root).child(&key::of::<Inner>()).unwrap();
        let from_inner = tree.lookup(inner, &key::of::<i32>()).unwrap();
        assert_eq!(from_inner.root(), root);
    }

    #[test]
    fn build_tree_fails_when_configuration_is_reused() {
        let shared = Arc::new(instance(1u8));
        let mut config = NodeConfig::scope(key::of::<Root>());
        config.push_child(Arc::clone(&shared));
        config.push_child(NodeConfig::scope(key::of::<Inner>()).with_child(Arc::clone(&shared)));

        let err = build_tree(&Arc::new(config), &Pipeline::default()).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigurationReused { .. }));
    }

    #[test]
    fn build_tree_fails_when_key_is_duplicated() {
        let config = NodeConfig::scope(key::of::<Root>())
            .with_child(instance(1u8))
            .with_child(instance(2u8));
        let config = Arc::new(config);

        let err = build_tree(&config, &Pipeline::default()).unwrap_err();
        assert!(matches!(err, ConfigError::KeyDuplicated { .. }));
    }

    #[test]
    fn config_error_aggregate_succeeds() {
        let errors = vec![
            ConfigError::NoConstructor { component: "A" },
            ConfigError::NoConstructor { component: "B" },
        ];
        let err = ConfigError::aggregate(errors);
        let message = err.to_string();
        assert!(message.contains("   1: "));
        assert!(message.contains("   2: "));

        let single = ConfigError::aggregate(vec![ConfigError::NoConstructor { component: "A" }]);
        assert!(matches!(single, ConfigError::NoConstructor { .. }));
    }
}
