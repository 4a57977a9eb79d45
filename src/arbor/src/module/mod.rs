pub mod dsl;

use std::any;
use std::error::Error;

use crate::container::registry::Configurer;

pub use dsl::{bind, bind_key, scope, scope_key};

/// A reusable piece of configuration.
pub trait Module: Send + 'static {
    /// Configures `configurer`, reporting a failure instead of returning it.
    fn setup(&self, configurer: &mut dyn Configurer) {
        if let Err(err) = self.configure(configurer) {
            configurer.report_module_error(any::type_name::<Self>(), err);
        }
    }

    fn configure(
        &self,
        configurer: &mut dyn Configurer,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Several modules set up one after another.
#[derive(Default)]
pub struct Configuration {
    modules: Vec<Box<dyn Module>>,
}

impl Configuration {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with<M: Module>(mut self, module: M) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    pub fn compose(mut self, mut other: Configuration) -> Self {
        self.modules.append(&mut other.modules);
        self
    }
}

impl Module for Configuration {
    fn configure(
        &self,
        configurer: &mut dyn Configurer,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.modules
            .iter()
            .for_each(|module| module.setup(configurer));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::container::registry::{ConfigError, ConfigurerImpl};
    use crate::key;

    use super::*;

    struct Root;

    struct Numbers;

    impl Module for Numbers {
        fn configure(
            &self,
            configurer: &mut dyn Configurer,
        ) -> Result<(), Box<dyn Error + Send + Sync>> {
            bind::<i32>().to_instance(1).set_on(configurer);
            bind::<u8>().to_instance(2).set_on(configurer);
            Ok(())
        }
    }

    struct Broken;

    impl Module for Broken {
        fn configure(
            &self,
            _configurer: &mut dyn Configurer,
        ) -> Result<(), Box<dyn Error + Send + Sync>> {
            Err("database url is missing".into())
        }
    }

    #[test]
    fn configuration_setup_succeeds() {
        let configuration = Configuration::new()
            .with(Numbers)
            .compose(Configuration::new().with(Configuration::new()));
        let mut configurer = ConfigurerImpl::new();
        configuration.setup(&mut configurer);

        let scope = configurer.finish(Box::new(key::of::<Root>())).unwrap();
        assert_eq!(scope.children().len(), 2);
    }

    #[test]
    fn configuration_setup_fails_when_module_fails() {
        let mut configurer = ConfigurerImpl::new();
        Configuration::new().with(Numbers).with(Broken).setup(&mut configurer);

        let err = configurer.finish(Box::new(key::of::<Root>())).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ModuleInner { module, .. } if module.ends_with("Broken")
        ));
    }
}
