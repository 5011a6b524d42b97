//! # Wakil Macros
//!
//! `#[derive(Injectable)]`: declares a struct's constructor parameters from
//! its fields, so the container can build it without a hand-written
//! factory.
//!
//! | Field type      | Parameter                        |
//! |-----------------|----------------------------------|
//! | `Arc<T>`        | one service `T`                  |
//! | `Vec<Arc<T>>`   | every registration of `T`        |
//! | `Provider`      | the resolving provider           |
//! | `#[inject(default)]` | not a parameter: `Default::default()` |
//!
//! ```rust,ignore
//! #[derive(Injectable)]
//! struct UserService {
//!     repo: Arc<dyn UserRepository>,
//!     #[inject(name = "audit")]
//!     sinks: Vec<Arc<dyn AuditSink>>,
//!     #[inject(default)]
//!     hits: AtomicU64,
//! }
//! ```
//!
//! Container attributes:
//! - `#[injectable(disposable)]`: instances are released through their
//!   own `Disposable` impl when their scope closes
//! - `#[injectable(crate = "path")]`: path of the facade crate (default `::wakil`)

use darling::ast::{Data, Fields, Style};
use darling::{FromDeriveInput, FromField};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::spanned::Spanned;
use syn::{DeriveInput, GenericArgument, LitStr, PathArguments, Type, parse_macro_input, parse_quote};

#[derive(FromDeriveInput)]
#[darling(attributes(injectable), supports(struct_named, struct_tuple, struct_unit))]
struct InjectableInput {
    ident: syn::Ident,
    generics: syn::Generics,
    data: Data<(), InjectField>,
    #[darling(default)]
    disposable: bool,
    #[darling(default, rename = "crate")]
    krate: Option<syn::Path>,
}

#[derive(FromField)]
#[darling(attributes(inject))]
struct InjectField {
    ident: Option<syn::Ident>,
    ty: Type,
    #[darling(default)]
    default: bool,
    #[darling(default)]
    name: Option<String>,
}

/// What a field receives.
enum Kind {
    One(Type),
    Many(Type),
    Provider,
    Default,
}

/// Derives `Injectable` for a struct whose fields are its dependencies.
#[proc_macro_derive(Injectable, attributes(injectable, inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let parsed = match InjectableInput::from_derive_input(&input) {
        Ok(parsed) => parsed,
        Err(err) => return err.write_errors().into(),
    };

    expand(parsed).unwrap_or_else(syn::Error::into_compile_error).into()
}

fn expand(input: InjectableInput) -> syn::Result<TokenStream2> {
    let krate: syn::Path = input.krate.unwrap_or_else(|| parse_quote!(::wakil));
    let ident = &input.ident;

    let fields: Fields<InjectField> = match input.data {
        Data::Struct(fields) => fields,
        Data::Enum(_) => return Err(syn::Error::new(ident.span(), "Injectable can only be derived for structs")),
    };
    let style = fields.style;

    let mut parameters = Vec::new();
    let mut values = Vec::new();
    let mut errors: Option<syn::Error> = None;

    for (index, field) in fields.fields.into_iter().enumerate() {
        let kind = match classify(&field) {
            Ok(kind) => kind,
            Err(err) => {
                match errors.as_mut() {
                    Some(all) => all.combine(err),
                    None => errors = Some(err),
                }
                continue;
            }
        };

        let name = field
            .name
            .clone()
            .or_else(|| field.ident.as_ref().map(ToString::to_string))
            .unwrap_or_else(|| index.to_string());
        let name = LitStr::new(&name, field.ty.span());

        let value = match &kind {
            Kind::One(service) => {
                parameters.push(quote! { #krate::descriptor::Parameter::of::<#service>(#name) });
                quote! { args.get::<#service>(#name)? }
            }
            Kind::Many(service) => {
                parameters.push(quote! { #krate::descriptor::Parameter::list_of::<#service>(#name) });
                quote! { args.get_all::<#service>(#name)? }
            }
            Kind::Provider => {
                parameters.push(quote! { #krate::descriptor::Parameter::provider(#name) });
                quote! { args.provider(#name)? }
            }
            Kind::Default => quote! { ::std::default::Default::default() },
        };

        values.push(match &field.ident {
            Some(field_ident) => quote! { #field_ident: #value },
            None => value,
        });
    }

    if let Some(err) = errors {
        return Err(err);
    }

    let construct = match style {
        Style::Struct => quote! { Self { #(#values),* } },
        Style::Tuple => quote! { Self(#(#values),*) },
        Style::Unit => quote! { Self },
    };

    let disposer = input.disposable.then(|| {
        quote! {
            fn disposer(
                this: &::std::sync::Arc<Self>,
            ) -> ::std::option::Option<::std::sync::Arc<dyn #krate::dispose::Disposable>> {
                ::std::option::Option::Some(this.clone() as ::std::sync::Arc<dyn #krate::dispose::Disposable>)
            }
        }
    });

    let mut generics = input.generics;
    let bounded: Vec<syn::Ident> = generics.type_params().map(|param| param.ident.clone()).collect();
    let where_clause = generics.make_where_clause();
    for param in bounded {
        where_clause
            .predicates
            .push(parse_quote!(#param: ::std::marker::Send + ::std::marker::Sync + 'static));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics #krate::descriptor::Injectable for #ident #ty_generics #where_clause {
            fn parameters() -> ::std::vec::Vec<#krate::descriptor::Parameter> {
                ::std::vec![#(#parameters),*]
            }

            #[allow(unused_variables)]
            fn construct(args: &#krate::descriptor::Arguments) -> #krate::error::Result<Self> {
                ::std::result::Result::Ok(#construct)
            }

            #disposer
        }
    })
}

fn classify(field: &InjectField) -> syn::Result<Kind> {
    if field.default {
        return Ok(Kind::Default);
    }

    let ty = &field.ty;
    if let Some(service) = wrapped(ty, "Arc") {
        return Ok(Kind::One(service.clone()));
    }
    if let Some(service) = wrapped(ty, "Vec").and_then(|item| wrapped(item, "Arc")) {
        return Ok(Kind::Many(service.clone()));
    }
    if is_provider(ty) {
        return Ok(Kind::Provider);
    }

    Err(syn::Error::new(
        ty.span(),
        "unsupported field type: expected Arc<T>, Vec<Arc<T>> or Provider\n  Hint: mark the field #[inject(default)] to fill it with Default::default()",
    ))
}

/// Returns `T` if `ty` is `Wrapper<T>` (by last path segment).
fn wrapped<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }

    let PathArguments::AngleBracketed(arguments) = &segment.arguments else {
        return None;
    };
    match arguments.args.first()? {
        GenericArgument::Type(inner) if arguments.args.len() == 1 => Some(inner),
        _ => None,
    }
}

fn is_provider(ty: &Type) -> bool {
    let Type::Path(path) = ty else {
        return false;
    };
    path.path
        .segments
        .last()
        .is_some_and(|segment| segment.ident == "Provider" && segment.arguments.is_empty())
}
