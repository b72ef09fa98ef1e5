//! `#[derive(Error)]` expansion.
//!
//! ```ignore
//! use stackvm_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum VMError {
//!     #[error("load error: {0}")]
//!     LoadError(LoadFailure),
//!
//!     #[error("stack underflow on {stack} stack")]
//!     StackUnderflow { stack: StackKind },
//!
//!     #[error("halted")]
//!     Halted,
//! }
//! ```
//!
//! Unit variants print the message verbatim. Tuple fields are referenced
//! positionally (`{0}`), named fields by name (`{stack}`). Structs take the
//! attribute on the type itself.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{ToTokens, format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, parse_macro_input};

pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand(&input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Enum(data) => {
            let arms = data
                .variants
                .iter()
                .map(|variant| {
                    let message = message_of(&variant.attrs, &variant.ident)?;
                    Ok(variant_arm(&variant.ident, &variant.fields, &message))
                })
                .collect::<syn::Result<Vec<_>>>()?;

            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        Data::Struct(data) => {
            let message = message_of(&input.attrs, &input.ident)?;
            struct_body(&data.fields, &message)
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "#[derive(Error)] cannot be used on unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                #body
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}
    })
}

/// One `match` arm writing the message for a single enum variant.
fn variant_arm(variant: &syn::Ident, fields: &Fields, message: &LitStr) -> TokenStream2 {
    match fields {
        Fields::Unit => quote! {
            Self::#variant => write!(f, #message),
        },
        Fields::Unnamed(unnamed) => {
            let bindings = positional_bindings(unnamed.unnamed.len());
            let format = positional_to_named(message, bindings.len());
            let used: Vec<_> = bindings
                .iter()
                .filter(|binding| mentions(&format, binding))
                .collect();
            quote! {
                #[allow(unused_variables)]
                Self::#variant(#(#bindings),*) => write!(f, #format, #(#used = #used),*),
            }
        }
        Fields::Named(named) => {
            let used: Vec<_> = named
                .named
                .iter()
                .filter_map(|field| field.ident.as_ref())
                .filter(|ident| mentions(message, ident))
                .collect();
            quote! {
                Self::#variant { #(#used,)* .. } => write!(f, #message, #(#used = #used),*),
            }
        }
    }
}

fn struct_body(fields: &Fields, message: &LitStr) -> TokenStream2 {
    match fields {
        Fields::Unit => quote! { write!(f, #message) },
        Fields::Unnamed(unnamed) => {
            let bindings = positional_bindings(unnamed.unnamed.len());
            let indices = (0..bindings.len()).map(syn::Index::from);
            let format = positional_to_named(message, bindings.len());
            let (used, indices): (Vec<_>, Vec<_>) = bindings
                .iter()
                .zip(indices)
                .filter(|(binding, _)| mentions(&format, binding))
                .unzip();
            quote! { write!(f, #format, #(#used = self.#indices),*) }
        }
        Fields::Named(named) => {
            let used: Vec<_> = named
                .named
                .iter()
                .filter_map(|field| field.ident.as_ref())
                .filter(|ident| mentions(message, ident))
                .collect();
            quote! { write!(f, #message, #(#used = self.#used),*) }
        }
    }
}

fn positional_bindings(count: usize) -> Vec<syn::Ident> {
    (0..count).map(|i| format_ident!("f{}", i)).collect()
}

/// Whether `message` interpolates `name` (as `{name}` or `{name:...}`).
fn mentions(message: &LitStr, name: &syn::Ident) -> bool {
    let text = message.value();
    text.contains(&format!("{{{name}}}")) || text.contains(&format!("{{{name}:"))
}

/// Finds the `#[error("...")]` attribute for `target`.
fn message_of<T: ToTokens>(attrs: &[Attribute], target: &T) -> syn::Result<LitStr> {
    let attr = attrs
        .iter()
        .find(|attr| attr.path().is_ident("error"))
        .ok_or_else(|| {
            syn::Error::new_spanned(
                target,
                "missing #[error(\"...\")] attribute; every error needs a display message",
            )
        })?;

    attr.parse_args::<LitStr>().map_err(|_| {
        syn::Error::new_spanned(
            &attr.meta,
            "expected a string literal, e.g. #[error(\"unknown opcode {code}\")]",
        )
    })
}

/// Rewrites `{0}`, `{1:?}` ... into `{f0}`, `{f1:?}` so tuple fields can be passed by name.
fn positional_to_named(message: &LitStr, field_count: usize) -> LitStr {
    let mut text = message.value();
    for i in (0..field_count).rev() {
        text = text
            .replace(&format!("{{{i}}}"), &format!("{{f{i}}}"))
            .replace(&format!("{{{i}:"), &format!("{{f{i}:"));
    }
    LitStr::new(&text, message.span())
}
