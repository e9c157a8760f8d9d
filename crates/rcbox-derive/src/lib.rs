//! Derive macro for the `Deinit` trait.

use proc_macro2::TokenStream;
use quote::{format_ident, quote, quote_spanned};
use syn::{
    parse_macro_input, parse_quote, spanned::Spanned, Data, DataEnum, DeriveInput, Field, Fields,
    GenericParam, Generics, Ident, Index, Path,
};

/// Implements `Deinit` by calling `deinit` on every field in declaration
/// order.
///
/// Fields marked `#[deinit(skip)]` are left alone. Use
/// `#[rcbox(crate = path)]` on the type when `rcbox` is re-exported under
/// another name.
#[proc_macro_derive(Deinit, attributes(rcbox, deinit))]
pub fn derive_deinit(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let mut rcbox: Path = parse_quote!(::rcbox);

    for attr in &input.attrs {
        if !attr.path().is_ident("rcbox") {
            continue;
        }

        let result = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("crate") {
                rcbox = meta.value()?.parse()?;
                Ok(())
            } else {
                Err(meta.error("unsupported attribute"))
            }
        });

        if let Err(err) = result {
            return err.into_compile_error().into();
        }
    }

    let name = &input.ident;
    let generics = add_trait_bounds(&rcbox, input.generics);
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let deinit_body = match generate_deinit_body(&rcbox, name, &input.data) {
        Ok(body) => body,
        Err(err) => return err.into_compile_error().into(),
    };

    let generated = quote! {
        impl #impl_generics #rcbox::Deinit for #name #ty_generics #where_clause {
            #[inline]
            fn deinit(&mut self) {
                #deinit_body
            }
        }
    };

    generated.into()
}

fn add_trait_bounds(rcbox: &Path, mut generics: Generics) -> Generics {
    for param in &mut generics.params {
        if let GenericParam::Type(ref mut type_param) = *param {
            let has_deinit = type_param.bounds.iter().any(|b| {
                if let syn::TypeParamBound::Trait(t) = b {
                    t.path.segments.last().is_some_and(|s| s.ident == "Deinit")
                } else {
                    false
                }
            });

            if !has_deinit {
                type_param.bounds.push(parse_quote!(#rcbox::Deinit));
            }
        }
    }
    generics
}

fn is_skipped(field: &Field) -> syn::Result<bool> {
    let mut skip = false;
    for attr in &field.attrs {
        if !attr.path().is_ident("deinit") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("unsupported attribute, expected `skip`"))
            }
        })?;
    }
    Ok(skip)
}

fn generate_deinit_body(rcbox: &Path, name: &Ident, data: &Data) -> syn::Result<TokenStream> {
    match data {
        Data::Struct(data) => generate_struct_deinit(rcbox, &data.fields),
        Data::Enum(data) => generate_enum_deinit(rcbox, name, data),
        Data::Union(u) => Ok(quote_spanned! {
            u.union_token.span => compile_error!("`Deinit` must be manually implemented for unions");
        }),
    }
}

fn generate_struct_deinit(rcbox: &Path, fields: &Fields) -> syn::Result<TokenStream> {
    let mut calls = Vec::new();
    match fields {
        Fields::Named(f) => {
            for field in &f.named {
                if is_skipped(field)? {
                    continue;
                }
                let name = &field.ident;
                calls.push(quote_spanned! {field.span() =>
                    #rcbox::Deinit::deinit(&mut self.#name);
                });
            }
        }
        Fields::Unnamed(f) => {
            for (i, field) in f.unnamed.iter().enumerate() {
                if is_skipped(field)? {
                    continue;
                }
                let index = Index::from(i);
                calls.push(quote_spanned! {field.span() =>
                    #rcbox::Deinit::deinit(&mut self.#index);
                });
            }
        }
        Fields::Unit => {}
    }
    Ok(quote! { #(#calls)* })
}

fn generate_enum_deinit(rcbox: &Path, name: &Ident, data: &DataEnum) -> syn::Result<TokenStream> {
    if data.variants.is_empty() {
        return Ok(quote! { match *self {} });
    }

    let mut match_arms = Vec::new();
    for variant in &data.variants {
        let var_name = &variant.ident;
        let arm = match &variant.fields {
            Fields::Named(f) => {
                let mut bindings = Vec::new();
                let mut calls = Vec::new();
                for (i, field) in f.named.iter().enumerate() {
                    if is_skipped(field)? {
                        continue;
                    }
                    let ident = &field.ident;
                    let binding = format_ident!("field{}", i);
                    calls.push(quote! { #rcbox::Deinit::deinit(#binding); });
                    bindings.push(quote! { #ident: #binding });
                }

                quote! {
                    #name::#var_name { #(#bindings,)* .. } => {
                        #(#calls)*
                    }
                }
            }
            Fields::Unnamed(f) => {
                let mut bindings = Vec::new();
                let mut calls = Vec::new();
                for (i, field) in f.unnamed.iter().enumerate() {
                    if is_skipped(field)? {
                        bindings.push(quote! { _ });
                        continue;
                    }
                    let binding = format_ident!("field{}", i);
                    calls.push(quote! { #rcbox::Deinit::deinit(#binding); });
                    bindings.push(quote! { #binding });
                }

                quote! {
                    #name::#var_name(#(#bindings),*) => {
                        #(#calls)*
                    }
                }
            }
            Fields::Unit => {
                quote! {
                    #name::#var_name => {}
                }
            }
        };
        match_arms.push(arm);
    }

    Ok(quote! {
        match self {
            #(#match_arms)*
        }
    })
}
