//! Equality and hashing for values behind a trait object.

use std::any::{Any, TypeId};
use std::hash::{Hash, Hasher};

use crate::util::any::AsAny;

/// A value whose identity survives type erasure.
///
/// Values of different concrete types are never identical, even when their
/// fields compare equal.
pub trait ErasedValue: AsAny {
    fn is_identical(&self, other: &dyn Any) -> bool;

    fn write_identity(&self, state: &mut dyn Hasher);
}

impl<V> ErasedValue for V
where
    V: Eq + Hash + Any,
{
    fn is_identical(&self, other: &dyn Any) -> bool {
        match other.downcast_ref::<V>() {
            Some(other) => other == self,
            None => false,
        }
    }

    fn write_identity(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<V>().hash(&mut state);
        self.hash(&mut state);
    }
}
