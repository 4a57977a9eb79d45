use std::future::Future;

use futures::future::{BoxFuture, FutureExt};

use crate::container::injector::ResolveError;
use crate::container::Managed;
use crate::key::{self, Key};
use crate::provider::closure::Factory;
use crate::provider::{Arguments, BoxError};

impl<F, Fut, T, E> Factory<()> for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Managed,
    E: Into<BoxError>,
{
    type Constructed = T;

    type Error = E;

    fn dependencies() -> Vec<Box<dyn Key>> {
        Vec::new()
    }

    fn start(
        &self,
        _arguments: &Arguments,
    ) -> Result<BoxFuture<'static, Result<Self::Constructed, Self::Error>>, ResolveError> {
        Ok(self().boxed())
    }
}

macro_rules! for_all_tuples {
    ($implementation:ident) => {
        $implementation!(D1);
        $implementation!(D1, D2);
        $implementation!(D1, D2, D3);
        $implementation!(D1, D2, D3, D4);
        $implementation!(D1, D2, D3, D4, D5);
        $implementation!(D1, D2, D3, D4, D5, D6);
        $implementation!(D1, D2, D3, D4, D5, D6, D7);
        $implementation!(D1, D2, D3, D4, D5, D6, D7, D8);
        $implementation!(D1, D2, D3, D4, D5, D6, D7, D8, D9);
        $implementation!(D1, D2, D3, D4, D5, D6, D7, D8, D9, D10);
        $implementation!(D1, D2, D3, D4, D5, D6, D7, D8, D9, D10, D11);
        $implementation!(D1, D2, D3, D4, D5, D6, D7, D8, D9, D10, D11, D12);
    };
}

macro_rules! impl_factory {
    ($($dep:ident),*) => {
        #[allow(non_snake_case)]
        impl<F, Fut, T, E, $($dep,)*> Factory<($($dep,)*)> for F
        where
            F: Fn($($dep,)*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<T, E>> + Send + 'static,
            T: Managed,
            E: Into<BoxError>,
            $($dep: Managed + Clone,)*
        {
            type Constructed = T;

            type Error = E;

            fn dependencies() -> Vec<Box<dyn Key>> {
                vec![$(Box::new(key::of::<$dep>()),)*]
            }

            fn start(
                &self,
                arguments: &Arguments,
            ) -> Result<BoxFuture<'static, Result<Self::Constructed, Self::Error>>, ResolveError> {
                let mut cursor = arguments.cursor();
                $(
                    let $dep = cursor.take_next::<$dep>()?;
                )*
                Ok(self($($dep,)*).boxed())
            }
        }
    };
}

for_all_tuples!(impl_factory);

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::Arc;

    use futures::executor::block_on;

    use super::*;

    fn assert_factory<F: Factory<D>, D: Send + Sync + 'static>(factory: F) -> F {
        factory
    }

    fn dependencies_of<F: Factory<D>, D: Send + Sync + 'static>(_factory: &F) -> Vec<Box<dyn Key>> {
        F::dependencies()
    }

    #[test]
    fn factory_call_succeeds() {
        let factory = assert_factory(|a: i32, b: u8| async move {
            Ok::<_, Infallible>(a + i32::from(b))
        });
        assert_eq!(dependencies_of(&factory).len(), 2);

        let arguments = Arguments::new(vec![Arc::new(40i32), Arc::new(2u8)]);
        let future = factory.start(&arguments).unwrap();
        assert_eq!(block_on(future).unwrap(), 42);
    }

    #[test]
    fn factory_call_fails_when_argument_type_differs() {
        let factory = assert_factory(|a: i32| async move { Ok::<_, Infallible>(a) });
        let arguments = Arguments::new(vec![Arc::new("not a number")]);
        assert!(matches!(
            factory.start(&arguments),
            Err(ResolveError::ArgumentMismatch { index: 0, .. })
        ));
    }
}
