use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod expand;

/// Derive macro for the `Resource` trait.
///
/// Generates the static blueprint plus the ordered `visit_fields` and
/// `populate_fields` accessors. Field mapping is declared with a directive
/// string per field:
///
/// ```ignore
/// use copolymer_core::Resource;
///
/// #[derive(Resource, Default)]
/// struct Post {
///     #[resource("primary,posts")]
///     id: u64,
///     #[resource("attr,title")]
///     title: String,
///     #[resource("relation,comments")]
///     comments: Vec<Comment>,
/// }
/// ```
///
/// The directive string is recorded verbatim; its validity is checked at
/// run time, on first use of the type. Fields without a `#[resource]`
/// attribute, or annotated `#[resource("-")]`, are left out of the mapping.
///
/// Struct-level capability flags opt in to custom link and meta blocks:
///
/// ```ignore
/// #[derive(Resource, Default)]
/// #[resource(links, relationship_meta)]
/// struct Blog { /* ... */ }
/// ```
///
/// Each flag requires the matching trait (`Linkable`, `RelationshipLinkable`,
/// `Metable`, `RelationshipMetable`) to be implemented by hand.
#[proc_macro_derive(Resource, attributes(resource))]
pub fn derive_resource(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand::expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
