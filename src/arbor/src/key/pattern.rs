use std::any::TypeId;
use std::marker::PhantomData;

use crate::container::Managed;
use crate::key::{Key, TypedQualifier};

/// A predicate over keys, used by visibility filters to describe which
/// identifiers a scope may import or export.
pub trait Pattern: Send + Sync + 'static {
    fn matches(&self, key: &dyn Key) -> bool;

    fn or<P: Pattern>(self, other: P) -> Or<Self, P>
    where
        Self: Sized,
    {
        Or(self, other)
    }

    fn and<P: Pattern>(self, other: P) -> And<Self, P>
    where
        Self: Sized,
    {
        And(self, other)
    }

    fn not(self) -> Not<Self>
    where
        Self: Sized,
    {
        Not(self)
    }
}

impl<F> Pattern for F
where
    F: Fn(&dyn Key) -> bool + Send + Sync + 'static,
{
    fn matches(&self, key: &dyn Key) -> bool {
        self(key)
    }
}

/// Matches every key whose target type is `T`, whatever its qualifier.
///
/// ```rust
/// # use arbor::key::{self, Pattern, TargetPattern};
/// let pattern = TargetPattern::<i32>::new();
/// assert!(pattern.matches(&key::of::<i32>()));
/// assert!(pattern.matches(&key::named::<i32>("named")));
/// assert!(!pattern.matches(&key::of::<i64>()));
/// ```
pub struct TargetPattern<T: Managed>(PhantomData<fn() -> T>);

impl<T: Managed> TargetPattern<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: Managed> Default for TargetPattern<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Managed> Pattern for TargetPattern<T> {
    fn matches(&self, key: &dyn Key) -> bool {
        key.target_type() == TypeId::of::<T>()
    }
}

/// Matches keys qualified by a `Q`, optionally only one particular value.
pub struct QualifierPattern<Q: TypedQualifier> {
    value: Option<Q>,
}

impl<Q: TypedQualifier> QualifierPattern<Q> {
    /// Any qualifier of type `Q`.
    pub fn any() -> Self {
        Self { value: None }
    }

    pub fn value(value: Q) -> Self {
        Self { value: Some(value) }
    }
}

impl<Q: TypedQualifier> Pattern for QualifierPattern<Q> {
    fn matches(&self, key: &dyn Key) -> bool {
        match key.dyn_qualifier().as_any().downcast_ref::<Q>() {
            Some(qualifier) => self.value.map_or(true, |value| value == *qualifier),
            None => false,
        }
    }
}

pub struct Or<A, B>(A, B);

impl<A: Pattern, B: Pattern> Pattern for Or<A, B> {
    fn matches(&self, key: &dyn Key) -> bool {
        self.0.matches(key) || self.1.matches(key)
    }
}

pub struct And<A, B>(A, B);

impl<A: Pattern, B: Pattern> Pattern for And<A, B> {
    fn matches(&self, key: &dyn Key) -> bool {
        self.0.matches(key) && self.1.matches(key)
    }
}

pub struct Not<A>(A);

impl<A: Pattern> Pattern for Not<A> {
    fn matches(&self, key: &dyn Key) -> bool {
        !self.0.matches(key)
    }
}
