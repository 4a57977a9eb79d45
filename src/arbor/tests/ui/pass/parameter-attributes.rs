use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use arbor::prelude::*;
use arbor::provider::component::Component;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Tier {
    Gold,
}

const REGION: &str = "eu-west";

#[derive(Debug)]
struct Unavailable;

impl Display for Unavailable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("unavailable")
    }
}

impl std::error::Error for Unavailable {}

struct Pricing;

#[component]
impl Pricing {
    #[inject]
    fn new(
        #[named("currency")] _currency: &'static str,
        #[named(REGION)] _region: Arc<String>,
        #[qualified(Tier::Gold)] _discount: u8,
        #[qualified(7u32)] (_low, _high): (u16, u16),
        _plain: u8,
    ) -> Self {
        Self
    }
}

struct Quote;

#[component]
impl Quote {
    #[inject]
    fn new(#[named("pricing")] _pricing: Arc<dyn Send + Sync>) -> Result<Quote, Unavailable> {
        Err(Unavailable)
    }

    fn helper(&self) {}
}

struct Cached;

#[component]
impl Cached {
    #[inject]
    fn fetch() -> std::result::Result<Self, Unavailable> {
        Ok(Self)
    }
}

fn constructor_count<C: Component>() -> usize {
    C::constructors().len()
}

fn main() {
    assert_eq!(constructor_count::<Pricing>(), 1);
    assert_eq!(constructor_count::<Quote>(), 1);
    assert_eq!(constructor_count::<Cached>(), 1);
    assert_eq!(Pricing::constructors()[0].parameters().len(), 5);
    Quote.helper();
}
