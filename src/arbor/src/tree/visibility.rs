use std::collections::HashSet;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::key::{Key, Pattern};

/// Decides which identifiers may cross a scope boundary.
#[cfg_attr(test, mockall::automock)]
pub trait Visibility: Send + Sync + 'static {
    fn allows(&self, key: &dyn Key) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Visibility for AllowAll {
    fn allows(&self, _key: &dyn Key) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl Visibility for DenyAll {
    fn allows(&self, _key: &dyn Key) -> bool {
        false
    }
}

/// Allows exactly the listed identifiers.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: HashSet<Box<dyn Key>>,
}

impl KeySet {
    pub fn new(keys: impl IntoIterator<Item = Box<dyn Key>>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }
}

impl Visibility for KeySet {
    fn allows(&self, key: &dyn Key) -> bool {
        self.keys.contains(key)
    }
}

/// Allows the identifiers matched by a [`Pattern`].
pub struct PatternVisibility<P: Pattern + ?Sized> {
    pattern: Arc<P>,
}

impl<P: Pattern + ?Sized> PatternVisibility<P> {
    pub fn new(pattern: Arc<P>) -> Self {
        Self { pattern }
    }
}

impl<P: Pattern + ?Sized> Visibility for PatternVisibility<P> {
    fn allows(&self, key: &dyn Key) -> bool {
        self.pattern.matches(key)
    }
}

impl<P: Pattern + ?Sized> Debug for PatternVisibility<P> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PatternVisibility").finish_non_exhaustive()
    }
}
