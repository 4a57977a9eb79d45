use std::sync::Arc;

use arbor::prelude::*;
use arbor::provider::component::Component;

trait Greeter: Send + Sync + 'static {
    fn greet(&self) -> String;
}

struct Polite {
    name: &'static str,
}

#[component(Arc<dyn Greeter>, Arc::new)]
impl Polite {
    #[inject]
    fn new(#[named("name")] name: &'static str) -> Self {
        Self { name }
    }
}

impl Greeter for Polite {
    fn greet(&self) -> String {
        format!("Good morning, {}.", self.name)
    }
}

struct Twice;

#[component]
impl Twice {
    #[inject]
    fn new() -> Self {
        Self
    }

    #[inject]
    fn with_resolver(_resolver: Resolver) -> Self {
        Self
    }
}

fn main() {
    assert_eq!(<Polite as Component>::constructors().len(), 1);
    assert_eq!(<Twice as Component>::constructors().len(), 2);
    let greeter = Polite { name: "Ada" }.post_process();
    assert_eq!(greeter.greet(), "Good morning, Ada.");
}
