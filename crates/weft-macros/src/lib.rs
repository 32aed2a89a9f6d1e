use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote, quote_spanned};
use syn::spanned::Spanned;
use syn::{parse_macro_input, FnArg, ItemFn, LitStr, ReturnType, Type};

/// Does the declared return type look like `Result<..>`?
fn returns_result(output: &ReturnType) -> bool {
    match output {
        ReturnType::Type(_, ty) => match ty.as_ref() {
            Type::Path(type_path) => type_path
                .path
                .segments
                .last()
                .is_some_and(|segment| segment.ident == "Result"),
            _ => false,
        },
        ReturnType::Default => false,
    }
}

/// Turns a render function into a `static` [`weft_core::Component`] of the same name.
///
/// The function takes either no arguments or a single `&Props`, and returns
/// anything convertible into `Output`, optionally wrapped in a `Result` whose
/// error converts into `RenderError`. Hook errors propagate with `?`.
///
/// `#[component(name = "Label")]` overrides the display name.
#[proc_macro_attribute]
pub fn component(attr: TokenStream, item: TokenStream) -> TokenStream {
    let func = parse_macro_input!(item as ItemFn);
    let mut display_name: Option<LitStr> = None;
    if !attr.is_empty() {
        let parser = syn::meta::parser(|meta| {
            if meta.path.is_ident("name") {
                display_name = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported component attribute; expected `name = \"...\"`"))
            }
        });
        parse_macro_input!(attr with parser);
    }
    match expand_component(func, display_name) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_component(func: ItemFn, display_name: Option<LitStr>) -> syn::Result<TokenStream2> {
    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = func;

    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            sig.generics.span(),
            "components cannot be generic",
        ));
    }
    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new(
            asyncness.span(),
            "components render synchronously; use `use_async_effect` for async work",
        ));
    }
    if sig.inputs.len() > 1 {
        return Err(syn::Error::new(
            sig.inputs.span(),
            "components take at most one `&Props` argument",
        ));
    }
    if let Some(FnArg::Receiver(receiver)) = sig.inputs.first() {
        return Err(syn::Error::new(
            receiver.span(),
            "components cannot take `self`",
        ));
    }

    let ident = &sig.ident;
    let name = display_name.unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));
    let render_ident = format_ident!("__weft_render_{}", ident);
    let inputs = &sig.inputs;
    let output = &sig.output;
    let call = if sig.inputs.is_empty() {
        quote! { #render_ident() }
    } else {
        quote! { #render_ident(props) }
    };
    let convert = if returns_result(output) {
        quote_spanned! { output.span()=>
            ::weft_core::__private::into_render_result(#call)
        }
    } else {
        quote_spanned! { output.span()=>
            ::core::result::Result::Ok(::core::convert::Into::<::weft_core::Output>::into(#call))
        }
    };

    Ok(quote! {
        #(#attrs)*
        #[allow(non_upper_case_globals)]
        #vis static #ident: ::weft_core::Component = ::weft_core::Component::new(#name, {
            #[allow(non_snake_case, unused_variables)]
            fn #render_ident(#inputs) #output #block

            #[allow(unused_variables)]
            fn __weft_entry(
                props: &::weft_core::Props,
            ) -> ::core::result::Result<::weft_core::Output, ::weft_core::RenderError> {
                #convert
            }

            __weft_entry
        });
    })
}
