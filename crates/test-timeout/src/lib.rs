use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{parse_macro_input, Attribute, Block, Ident, ItemFn, LitInt, Token};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// `#[timeout]`, `#[timeout(10)]`, `#[tokio_timeout_test(paused)]`,
/// `#[tokio_timeout_test(10, paused)]`.
struct TimeoutArgs {
    secs: u64,
    paused: bool,
}

impl Parse for TimeoutArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = TimeoutArgs {
            secs: DEFAULT_TIMEOUT_SECS,
            paused: false,
        };
        while !input.is_empty() {
            if input.peek(LitInt) {
                let lit: LitInt = input.parse()?;
                let secs: u64 = lit.base10_parse()?;
                if secs == 0 {
                    return Err(syn::Error::new_spanned(
                        lit,
                        "timeout must be greater than zero",
                    ));
                }
                args.secs = secs;
            } else {
                let flag: Ident = input.parse()?;
                if flag != "paused" {
                    return Err(syn::Error::new_spanned(
                        flag,
                        "expected a timeout in seconds or `paused`",
                    ));
                }
                args.paused = true;
            }
            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }
        Ok(args)
    }
}

/// Runs `body` on its own thread and fails the test if it has not finished
/// within the wall-clock budget.
fn wall_clock_guard(secs: u64, body: TokenStream2) -> TokenStream2 {
    quote! {
        let timeout_duration = std::time::Duration::from_secs(#secs);
        let (sender, receiver) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| #body));
            let _ = sender.send(result);
        });
        match receiver.recv_timeout(timeout_duration) {
            Ok(Ok(_)) => {}
            Ok(Err(payload)) => std::panic::resume_unwind(payload),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => panic!("test timed out"),
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                panic!("test thread failed before reporting result")
            }
        }
    }
}

fn runtime_body(args: &TimeoutArgs, block: &Block) -> TokenStream2 {
    let secs = args.secs;
    if args.paused {
        // Virtual time auto-advances while idle, so only the wall clock bounds
        // a paused test.
        quote! {{
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .start_paused(true)
                .build()
                .expect("failed to build Tokio runtime");
            runtime.block_on(async move #block);
        }}
    } else {
        quote! {{
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build Tokio runtime");
            runtime.block_on(async {
                tokio::time::timeout(std::time::Duration::from_secs(#secs), async move #block)
                    .await
                    .expect("test timed out");
            });
        }}
    }
}

#[proc_macro_attribute]
pub fn tokio_timeout_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as TimeoutArgs);

    let ItemFn {
        attrs,
        vis,
        mut sig,
        block,
    } = parse_macro_input!(item as ItemFn);

    if sig.asyncness.is_none() {
        return syn::Error::new_spanned(
            &sig.ident,
            "tokio_timeout_test can only be applied to async functions",
        )
        .to_compile_error()
        .into();
    }

    sig.asyncness = None;

    let filtered_attrs: Vec<Attribute> = attrs
        .into_iter()
        .filter(|attr| !is_tokio_test_attribute(attr))
        .collect();

    let guarded = wall_clock_guard(args.secs, runtime_body(&args, &block));

    TokenStream::from(quote! {
        #[test]
        #(#filtered_attrs)*
        #vis #sig {
            #guarded
        }
    })
}

fn is_tokio_test_attribute(attr: &Attribute) -> bool {
    let mut segments = attr.path().segments.iter();
    matches!(
        (segments.next(), segments.next(), segments.next()),
        (Some(first), Some(second), None)
            if first.ident == "tokio" && second.ident == "test"
    )
}

#[proc_macro_attribute]
pub fn timeout(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as TimeoutArgs);
    if args.paused {
        return syn::Error::new(
            proc_macro2::Span::call_site(),
            "`paused` only applies to tokio_timeout_test",
        )
        .to_compile_error()
        .into();
    }

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = parse_macro_input!(item as ItemFn);

    if sig.asyncness.is_some() {
        return syn::Error::new_spanned(
            &sig.ident,
            "timeout attribute expects a synchronous test function",
        )
        .to_compile_error()
        .into();
    }

    let filtered_attrs: Vec<Attribute> = attrs
        .into_iter()
        .filter(|attr| !is_test_attribute(attr))
        .collect();

    let guarded = wall_clock_guard(args.secs, quote! { #block });

    TokenStream::from(quote! {
        #[test]
        #(#filtered_attrs)*
        #vis #sig {
            #guarded
        }
    })
}

fn is_test_attribute(attr: &Attribute) -> bool {
    let mut segments = attr.path().segments.iter();
    matches!((segments.next(), segments.next()), (Some(first), None) if first.ident == "test")
}
