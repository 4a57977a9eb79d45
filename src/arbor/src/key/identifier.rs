use std::any::{type_name, TypeId};
use std::borrow::Borrow;
use std::fmt::{self, Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::container::Managed;
use crate::key::{Key, TypedKey, TypedQualifier};

/// The only [`TypedKey`]: a target type paired with a qualifier value.
pub struct Identifier<T: Managed, Q: TypedQualifier> {
    qualifier: Q,
    target: PhantomData<fn() -> T>,
}

impl<T: Managed, Q: TypedQualifier> Identifier<T, Q> {
    pub const fn new(qualifier: Q) -> Self {
        Self {
            qualifier,
            target: PhantomData,
        }
    }

    fn is_plain() -> bool {
        TypeId::of::<Q>() == TypeId::of::<()>()
    }
}

impl<T: Managed, Q: TypedQualifier> Clone for Identifier<T, Q> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Managed, Q: TypedQualifier> Copy for Identifier<T, Q> {}

impl<T: Managed, Q: TypedQualifier> PartialEq for Identifier<T, Q> {
    fn eq(&self, other: &Self) -> bool {
        self.qualifier == other.qualifier
    }
}

impl<T: Managed, Q: TypedQualifier> Eq for Identifier<T, Q> {}

// Must agree with `Hash for dyn Key` for the `Borrow<dyn Key>` lookups.
impl<T: Managed, Q: TypedQualifier> Hash for Identifier<T, Q> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        <dyn Key as Hash>::hash(self, state);
    }
}

impl<T: Managed, Q: TypedQualifier> Display for Identifier<T, Q> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(type_name::<T>())?;
        if !Self::is_plain() {
            write!(f, "@{:?}", self.qualifier)?;
        }
        Ok(())
    }
}

impl<T: Managed, Q: TypedQualifier> Debug for Identifier<T, Q> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl<T: Managed, Q: TypedQualifier> Borrow<dyn Key> for Identifier<T, Q> {
    fn borrow(&self) -> &dyn Key {
        self
    }
}

impl<T: Managed, Q: TypedQualifier> TypedKey for Identifier<T, Q> {
    type Target = T;
    type Qualifier = Q;

    fn qualifier(&self) -> Q {
        self.qualifier
    }

    fn qualifier_ref(&self) -> &Q {
        &self.qualifier
    }
}
