#![allow(dead_code)]

use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arbor::prelude::*;
use parking_lot::Mutex;

/// A module configured by a closure.
pub struct FnModule<F>(pub F);

impl<F> Module for FnModule<F>
where
    F: Fn(&mut dyn Configurer) + Send + Sync + 'static,
{
    fn configure(
        &self,
        configurer: &mut dyn Configurer,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        (self.0)(configurer);
        Ok(())
    }
}

pub fn host<F>(configure: F) -> Host
where
    F: Fn(&mut dyn Configurer) + Send + Sync + 'static,
{
    Host::init(FnModule(configure)).unwrap()
}

#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Records the order in which objects are torn down.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<&'static str>>>);

impl Journal {
    pub fn record(&self, entry: &'static str) {
        self.0.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<&'static str> {
        self.0.lock().clone()
    }
}
