use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote, ToTokens};
use syn::spanned::Spanned;
use syn::visit_mut::{self, VisitMut};
use syn::{
    AngleBracketedGenericArguments, Attribute, Error as SynError, FnArg, GenericArgument,
    ImplItem, ImplItemFn, ItemImpl, Meta, PathArguments, Result as SynResult, ReturnType,
    Signature, Type, TypePath,
};

use crate::attrs::AttributeData;

#[derive(Debug)]
struct ConstructorData {
    identifier: syn::Ident,
    arguments: Vec<ArgumentData>,
    return_type: ReturnTypeData,
}

#[derive(Debug)]
struct ArgumentData {
    span: Span,
    ty: Type,
    qualifier: QualifierData,
}

#[derive(Debug)]
enum QualifierData {
    None,
    Named(TokenStream2),
    Qualified(TokenStream2),
}

#[derive(Debug)]
enum ReturnTypeData {
    Infallible,
    Result,
}

const RETURN_TYPE_ERROR: &str = "a constructor's return type should be `Self` or `Result<Self, E>`";

struct AttributeRemovalVisitor;

impl AttributeRemovalVisitor {
    fn is_custom_attribute(attr: &Attribute) -> bool {
        match &attr.meta {
            Meta::Path(path) => path.is_ident("inject"),
            Meta::List(list) => list.path.is_ident("named") || list.path.is_ident("qualified"),
            Meta::NameValue(_) => false,
        }
    }
}

impl VisitMut for AttributeRemovalVisitor {
    fn visit_attributes_mut(&mut self, attrs: &mut Vec<Attribute>) {
        attrs.retain(|attr| !Self::is_custom_attribute(attr));
        attrs
            .iter_mut()
            .for_each(|attr| visit_mut::visit_attribute_mut(self, attr));
    }
}

pub fn expand_implementation(
    impls: TokenStream,
    attr_data: AttributeData,
) -> SynResult<TokenStream2> {
    let mut impls = match syn::parse::<ItemImpl>(impls) {
        Ok(impls) => impls,
        Err(err) => {
            return Err(SynError::new(
                err.span(),
                "`#[component]` should be annotated on the `impl` block",
            ))
        }
    };

    let self_type = get_self_type(&impls)?;
    let constructors = get_constructor_signatures(&impls.items)?
        .into_iter()
        .map(|signature| parse_constructor(&self_type, signature))
        .collect::<SynResult<Vec<_>>>()?;

    let expanded = expand_component_implementation(&impls, &self_type, constructors, attr_data);

    let mut visitor = AttributeRemovalVisitor;
    visitor.visit_item_impl_mut(&mut impls);

    Ok(quote! {
        #impls
        #expanded
    })
}

fn get_self_type(impls: &ItemImpl) -> SynResult<TypePath> {
    if let Type::Path(ty) = impls.self_ty.as_ref() {
        Ok(ty.clone())
    } else {
        Err(SynError::new(impls.self_ty.span(), "invalid self type"))
    }
}

/// Every associated function annotated with `#[inject]`. How many there are
/// is checked when the configuration is built.
fn get_constructor_signatures(items: &[ImplItem]) -> SynResult<Vec<Signature>> {
    let signatures: Vec<Signature> = items
        .iter()
        .filter_map(filter_and_map_item_fn)
        .filter(is_annotated_with_inject)
        .map(|ctor| ctor.sig.clone())
        .collect();

    for signature in &signatures {
        if let Some(FnArg::Receiver(rec)) = signature.inputs.first() {
            return Err(SynError::new(
                rec.span(),
                "method is not allowed to be annotated with `#[inject]`",
            ));
        }
        if let Some(asyncness) = &signature.asyncness {
            return Err(SynError::new(
                asyncness.span(),
                "a constructor annotated with `#[inject]` should not be `async`",
            ));
        }
    }
    Ok(signatures)
}

fn filter_and_map_item_fn(item: &ImplItem) -> Option<&ImplItemFn> {
    if let ImplItem::Fn(impl_fn) = item {
        Some(impl_fn)
    } else {
        None
    }
}

fn is_annotated_with_inject(item_fn: &&ImplItemFn) -> bool {
    item_fn.attrs.iter().any(|attr| {
        let content = attr.meta.to_token_stream().to_string();
        &content == "inject"
    })
}

fn parse_constructor(self_type: &TypePath, signature: Signature) -> SynResult<ConstructorData> {
    let return_type = parse_constructor_return_type(&signature.output, self_type)?;
    let arguments = signature
        .inputs
        .into_iter()
        .filter_map(|arg| match arg {
            FnArg::Typed(arg) => Some(arg),
            FnArg::Receiver(_) => None,
        })
        .map(|arg| {
            let span = arg.span();
            parse_argument_attributes(arg.attrs).map(|qualifier| ArgumentData {
                span,
                ty: *arg.ty,
                qualifier,
            })
        })
        .collect::<SynResult<Vec<_>>>()?;

    Ok(ConstructorData {
        identifier: signature.ident,
        arguments,
        return_type,
    })
}

fn parse_argument_attributes(attrs: Vec<Attribute>) -> SynResult<QualifierData> {
    let mut res = None;

    for attr in attrs {
        let span = attr.span();
        let data = match attr.meta {
            Meta::List(list) if list.path.is_ident("named") => QualifierData::Named(list.tokens),
            Meta::List(list) if list.path.is_ident("qualified") => {
                QualifierData::Qualified(list.tokens)
            }
            Meta::Path(path) if path.is_ident("named") => {
                return Err(SynError::new(
                    path.span(),
                    "expects `#[named(...)]` to receive a `&'static str`",
                ));
            }
            Meta::Path(path) if path.is_ident("qualified") => {
                return Err(SynError::new(
                    path.span(),
                    "expects `#[qualified(...)]` to receive a `TypedQualifier` value",
                ));
            }
            Meta::NameValue(nv) if nv.path.is_ident("named") || nv.path.is_ident("qualified") => {
                return Err(SynError::new(
                    nv.span(),
                    "expects `#[named(...)]` or `#[qualified(...)]` in the list form",
                ));
            }
            _ => continue,
        };

        if res.is_some() {
            return Err(SynError::new(
                span,
                "only one attribute of `#[named(...)]` or `#[qualified(...)]` is allowed",
            ));
        }
        res = Some(data);
    }

    Ok(res.unwrap_or(QualifierData::None))
}

fn parse_constructor_return_type(
    output: &ReturnType,
    self_type: &TypePath,
) -> SynResult<ReturnTypeData> {
    let ReturnType::Type(_, return_type) = output else {
        return Err(SynError::new(output.span(), RETURN_TYPE_ERROR));
    };
    let Type::Path(return_type) = return_type.as_ref() else {
        return Err(SynError::new(return_type.span(), RETURN_TYPE_ERROR));
    };

    if return_type == self_type || return_type.path.is_ident("Self") {
        return Ok(ReturnTypeData::Infallible);
    }

    let segments = &return_type.path.segments;
    let idents: Vec<String> = segments.iter().map(|s| s.ident.to_string()).collect();
    let is_result = matches!(
        idents.iter().map(String::as_str).collect::<Vec<_>>().as_slice(),
        ["Result"] | ["std", "result", "Result"] | ["core", "result", "Result"]
    );
    match segments.last() {
        Some(last) if is_result => parse_result_return_type(&last.arguments, self_type),
        _ => Err(SynError::new(return_type.span(), RETURN_TYPE_ERROR)),
    }
}

fn parse_result_return_type(
    type_args: &PathArguments,
    self_type: &TypePath,
) -> SynResult<ReturnTypeData> {
    let PathArguments::AngleBracketed(AngleBracketedGenericArguments {
        args: type_args, ..
    }) = type_args
    else {
        return Err(SynError::new(type_args.span(), RETURN_TYPE_ERROR));
    };

    let mut args = type_args.iter();
    match (args.next(), args.next(), args.next()) {
        (Some(GenericArgument::Type(Type::Path(first))), Some(GenericArgument::Type(_)), None)
            if first == self_type || first.path.is_ident("Self") =>
        {
            Ok(ReturnTypeData::Result)
        }
        _ => Err(SynError::new(type_args.span(), RETURN_TYPE_ERROR)),
    }
}

fn expand_constructor(ctor: &ConstructorData) -> TokenStream2 {
    let identifier = &ctor.identifier;
    let name = identifier.to_string();

    let keys = ctor.arguments.iter().map(|arg| {
        let ty = &arg.ty;
        let key = match &arg.qualifier {
            QualifierData::None => quote! { ::arbor::key::of::<#ty>() },
            QualifierData::Named(name) => quote! { ::arbor::key::named::<#ty>(#name) },
            QualifierData::Qualified(qualifier) => {
                quote! { ::arbor::key::qualified::<#ty, _>(#qualifier) }
            }
        };
        quote! { ::std::boxed::Box::new(#key) }
    });

    let deps: Vec<_> = ctor
        .arguments
        .iter()
        .enumerate()
        .map(|(i, arg)| format_ident!("dep{}", i, span = arg.span))
        .collect();
    let types = ctor.arguments.iter().map(|arg| &arg.ty);

    let call = match ctor.return_type {
        ReturnTypeData::Infallible => quote! {
            ::std::result::Result::Ok(::std::result::Result::Ok(Self::#identifier(#(#deps),*)))
        },
        ReturnTypeData::Result => quote! {
            ::std::result::Result::Ok(
                Self::#identifier(#(#deps),*).map_err(::std::convert::Into::into)
            )
        },
    };

    quote! {
        ::arbor::provider::component::Constructor::new(
            #name,
            ::std::vec![#(#keys),*],
            |arguments| {
                #[allow(unused_mut, unused_variables)]
                let mut cursor = arguments.cursor();
                #(let #deps = cursor.take_next::<#types>()?;)*
                #call
            },
        )
    }
}

fn expand_component_implementation(
    impls: &ItemImpl,
    self_type: &TypePath,
    constructors: Vec<ConstructorData>,
    attr_data: AttributeData,
) -> TokenStream2 {
    let (impl_generics, _, where_clause) = impls.generics.split_for_impl();

    let (constructed, post_process_body) = match &attr_data {
        AttributeData::Full {
            output_type,
            post_processor,
        } => (quote! { #output_type }, quote! { #post_processor(self) }),
        AttributeData::Default => (quote! { #self_type }, quote! { self }),
    };

    let constructors = constructors.iter().map(expand_constructor);

    quote! {
        impl #impl_generics ::arbor::provider::component::Component for #self_type #where_clause {
            type Constructed = #constructed;

            fn constructors() -> ::std::vec::Vec<::arbor::provider::component::Constructor<Self>> {
                ::std::vec![#(#constructors),*]
            }

            fn post_process(self) -> Self::Constructed {
                #post_process_body
            }
        }
    }
}
