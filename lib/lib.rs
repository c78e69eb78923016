use proc_macro::TokenStream;
use quote::quote;

/// Attribute macro that wraps a function with the sole purpose of benchmarking the duration of its execution,
/// and printing the gathered metrics through Rust's logging API.
/// <br/><br/>
/// This macro will introduce minimal overhead in **debug** builds; wrapping the selected functions in closures
/// that track their execution time, and printing the tracked result in a `trace!()` call upon their return. This
/// is *disabled* in **release** builds, which makes the macro a zero-cost abstraction in productive environments.
/// <br/><br/>
/// Mining runs spend most of their wall-clock time waiting on GitHub, `git` and CK, so the traced functions are
/// usually the request executor and the filesystem scanners.
///
/// See more: https://blog.rust-lang.org/2018/12/21/Procedural-Macros-in-Rust-2018.html.
///
/// ---
///
/// # Requirements
///
/// - Rust's logging facade crate - https://crates.io/crates/log
///
/// # Usage
/// ## `fn()` example:
/// ```rust
/// use repominer_lib::*;
///
/// #[repominer_trace_time]
/// fn count_java_files(paths: &[&str]) -> usize {
///     paths.iter().filter(|path| path.ends_with(".java")).count()
/// }
/// ```
/// This will output:
/// ```text
///  TRACE repominer > Time elapsed for `fn count_java_files()` was: 2.407µs
/// ```
///
/// ## `async fn()` example
///
/// ```rust
/// use repominer_lib::*;
///
/// #[repominer_trace_time]
/// async fn fetch_search_page(cursor: Option<String>) -> Result<Vec<String>, String> {
///     Ok(cursor.into_iter().collect())
/// }
/// ```
/// This will output:
/// ```text
///  TRACE repominer > Time elapsed for `fn fetch_search_page()` was: 1.268012488s
/// ```
#[proc_macro_attribute]
pub fn repominer_trace_time(_attr: TokenStream, item: TokenStream) -> TokenStream {
    // parse the passed item as a function
    let func = syn::parse_macro_input!(item as syn::ItemFn);

    // break the function down into its parts
    let syn::ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = func;

    // determine async-ness of function
    let is_async_fn = sig.asyncness.is_some();

    // extract function name for prettier output
    let name = format!("{}", sig.ident);

    // determine type of build (debug/release)
    let release_build = !cfg!(debug_assertions);

    // async blocks cannot infer the output of a `?` on their own; pin it to the function's declared output
    let output_type = match &sig.output {
        syn::ReturnType::Default => quote! { () },
        syn::ReturnType::Type(_, ty) => quote! { #ty },
    };

    // wrap body only if function is async, otherwise just put it in the middle of the time-tracking
    let block = if release_build {
        quote! { #block } // disable time tracker on release builds
    } else if is_async_fn {
        quote! {
            let start = ::std::time::Instant::now();
            let result: #output_type = async move { #block }.await;
            ::log::trace!("Time elapsed for `fn {}()` was: {:?}", #name, start.elapsed());
            result
        }
    } else {
        quote! {
            let start = ::std::time::Instant::now();
            let result: #output_type = { #block };
            ::log::trace!("Time elapsed for `fn {}()` was: {:?}", #name, start.elapsed());
            result
        }
    };

    // `#[track_caller]` is a no-op (and a lint) on async functions
    let track_caller = if is_async_fn {
        quote! {}
    } else {
        quote! { #[track_caller] }
    };

    // generate the output, rewriting function with our tracked wrapper
    let output = quote! {
        #track_caller
        #(#attrs)*
        #vis #sig {
            #block
        }
    };

    // convert the output from a `proc_macro2::TokenStream` to a `proc_macro::TokenStream`
    TokenStream::from(output)
}
