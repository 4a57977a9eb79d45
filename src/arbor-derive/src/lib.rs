//! Procedural macros for `arbor`.

mod attrs;
mod impls;

use proc_macro::TokenStream;

/// Derives `arbor::provider::component::Component` from an `impl` block.
///
/// Every associated function marked `#[inject]` becomes a constructor. Its
/// parameters are resolved in order by their types. A parameter can be
/// narrowed with `#[named("name")]` to the key `key::named::<T>("name")`, or
/// with `#[qualified(EXPR)]` to `key::qualified::<T, _>(EXPR)`; at most one of
/// the two may be given. A constructor returns `Self` or `Result<Self, E>`.
///
/// `#[component(Output, post_processor)]` additionally runs
/// `post_processor(Self) -> Output` on every constructed value and binds the
/// component under `Output`.
///
/// ```ignore
/// #[component]
/// impl Mailer {
///     #[inject]
///     fn new(#[named("smtp")] transport: Arc<dyn Transport>) -> Self {
///         Self { transport }
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn component(attr: TokenStream, item: TokenStream) -> TokenStream {
    let expanded = attrs::parse_attributes(attr)
        .and_then(|data| impls::expand_implementation(item, data));
    match expanded {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
