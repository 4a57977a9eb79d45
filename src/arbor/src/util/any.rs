use std::any::{self, Any};
use std::ops::Deref;

pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;

    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn type_name(&self) -> &'static str {
        any::type_name::<T>()
    }
}

/// Downcasts through a smart pointer to an erased object.
///
/// The receiver is dereferenced before the downcast, so an `Arc<dyn Managed>`
/// is tested against the managed object rather than against the `Arc` itself.
pub trait DowncastRef {
    fn downcast_ref<T: Any>(&self) -> Option<&T>;
}

impl<S> DowncastRef for S
where
    S: Deref<Target: AsAny>,
{
    #[inline]
    fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (**self).as_any().downcast_ref::<T>()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    trait Trait: AsAny + Send + Sync {}

    impl Trait for i32 {}

    #[test]
    fn downcast_succeeds_when_receiver_is_a_ref() {
        let val = 0i32;
        let x: &dyn Trait = &val;

        assert_eq!(x.downcast_ref::<i32>(), Some(&0));
        assert_eq!(x.downcast_ref::<i64>(), None);
    }

    #[test]
    fn downcast_succeeds_when_receiver_is_an_arc() {
        let x: Arc<dyn Trait> = Arc::new(1i32);

        assert_eq!(x.downcast_ref::<i32>(), Some(&1));
        assert!(x.downcast_ref::<Arc<dyn Trait>>().is_none());
    }

    #[test]
    fn type_name_reports_erased_type() {
        let x: Box<dyn Trait> = Box::new(0i32);
        assert_eq!((*x).type_name(), "i32");
    }
}
