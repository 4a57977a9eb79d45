//! Typed identifiers for managed objects.
//!
//! A key names an object by its target type and an optional qualifier. Two
//! keys are equal exactly when both the target type and the qualifier value
//! are equal, so `key::of::<T>()`, `key::named::<T>("a")` and
//! `key::named::<T>("b")` all identify different objects.

mod identifier;
mod pattern;

use std::any::TypeId;
use std::fmt::{Debug, Display};
use std::hash::{Hash, Hasher};

use crate::container::Managed;
use crate::util::erased::ErasedValue;

pub(crate) use crate::key::identifier::Identifier;
pub use crate::key::pattern::{And, Not, Or, Pattern, QualifierPattern, TargetPattern};

pub trait Key
where
    Self: Debug + Display + Send + Sync + 'static,
{
    fn target_type(&self) -> TypeId;

    fn target_name(&self) -> &'static str;

    fn qualifier_type(&self) -> TypeId;

    fn dyn_qualifier(&self) -> &dyn Qualifier;

    fn dyn_clone(&self) -> Box<dyn Key>;
}

impl PartialEq for dyn Key {
    fn eq(&self, other: &Self) -> bool {
        self.target_type() == other.target_type() && self.dyn_qualifier() == other.dyn_qualifier()
    }
}

impl Eq for dyn Key {}

impl Hash for dyn Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.target_type().hash(state);
        self.dyn_qualifier().write_identity(state);
    }
}

impl Clone for Box<dyn Key> {
    fn clone(&self) -> Self {
        (**self).dyn_clone()
    }
}

impl<T: TypedKey> Key for T {
    fn target_type(&self) -> TypeId {
        TypeId::of::<T::Target>()
    }

    fn target_name(&self) -> &'static str {
        std::any::type_name::<T::Target>()
    }

    fn qualifier_type(&self) -> TypeId {
        TypeId::of::<T::Qualifier>()
    }

    fn dyn_qualifier(&self) -> &dyn Qualifier {
        self.qualifier_ref()
    }

    fn dyn_clone(&self) -> Box<dyn Key> {
        Box::new(*self)
    }
}

pub trait TypedKey: Key + Copy + Eq + Hash {
    type Target: Managed;

    type Qualifier: TypedQualifier;

    fn qualifier(&self) -> Self::Qualifier;

    fn qualifier_ref(&self) -> &Self::Qualifier;
}

pub trait Qualifier: Debug + ErasedValue + Send + Sync + 'static {
    fn dyn_clone(&self) -> Box<dyn Qualifier>;
}

impl PartialEq for dyn Qualifier {
    fn eq(&self, other: &Self) -> bool {
        self.is_identical(other.as_any())
    }
}

impl Eq for dyn Qualifier {}

impl<T: TypedQualifier> Qualifier for T {
    fn dyn_clone(&self) -> Box<dyn Qualifier> {
        Box::new(*self)
    }
}

pub trait TypedQualifier: Copy + Debug + Eq + Hash + Send + Sync + 'static {}

impl<T> TypedQualifier for T where T: Copy + Debug + Eq + Hash + Send + Sync + 'static {}

pub fn of<T>() -> impl TypedKey<Target = T, Qualifier = ()>
where
    T: Managed,
{
    Identifier::new(())
}

pub fn named<T>(name: &'static str) -> impl TypedKey<Target = T, Qualifier = &'static str>
where
    T: Managed,
{
    Identifier::new(name)
}

pub fn qualified<T, Q>(qualifier: Q) -> impl TypedKey<Target = T, Qualifier = Q>
where
    T: Managed,
    Q: TypedQualifier,
{
    Identifier::new(qualifier)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn keys_with_different_qualifiers_differ() {
        let plain: Box<dyn Key> = Box::new(of::<i32>());
        let named_a: Box<dyn Key> = Box::new(named::<i32>("a"));
        let named_b: Box<dyn Key> = Box::new(named::<i32>("b"));
        let other: Box<dyn Key> = Box::new(of::<i64>());

        assert_ne!(&plain, &named_a);
        assert_ne!(&named_a, &named_b);
        assert_ne!(&plain, &other);
        assert_eq!(&named_a, &(Box::new(named::<i32>("a")) as Box<dyn Key>));
        assert_eq!(&named_a, &named_a.clone());
    }

    #[test]
    fn boxed_keys_can_be_looked_up_by_reference() {
        let mut map: HashMap<Box<dyn Key>, u8> = HashMap::new();
        map.insert(Box::new(named::<String>("x")), 1);
        map.insert(Box::new(of::<String>()), 2);

        assert_eq!(map.get(&named::<String>("x") as &dyn Key), Some(&1));
        assert_eq!(map.get(&of::<String>() as &dyn Key), Some(&2));
        assert_eq!(map.get(&named::<String>("y") as &dyn Key), None);
    }

    #[test]
    fn dyn_qualifier_exposes_qualifier_value() {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        struct Primary;

        let key = qualified::<u8, _>(Primary);
        assert_eq!(key.qualifier_type(), TypeId::of::<Primary>());
        assert_eq!(key.dyn_qualifier(), &Primary as &dyn Qualifier);
        let cloned = key.dyn_qualifier().dyn_clone();
        assert_eq!(&*cloned, &Primary as &dyn Qualifier);
    }
}
