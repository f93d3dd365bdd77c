use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Type};

pub fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Resource cannot be derived for generic types",
        ));
    }
    let data = match &input.data {
        syn::Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Resource can only be derived for structs",
            ));
        }
    };
    let fields = match &data.fields {
        syn::Fields::Named(named) => &named.named,
        _ => {
            return Err(syn::Error::new_spanned(
                &data.fields,
                "Resource requires named fields",
            ));
        }
    };

    let capabilities = parse_capabilities(&input.attrs)?;

    let mut raw_fields = Vec::new();
    let mut visits = Vec::new();
    let mut populates = Vec::new();

    for field in fields {
        let Some(meta) = directive_string(field)? else {
            continue;
        };
        // An explicit "-" excludes the field outright.
        if meta == "-" {
            continue;
        }

        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "Resource requires named fields"))?;
        let lowered = lower_field(&meta, ident, &field.ty);

        let ident_str = ident.to_string();
        let shape = lowered.shape;
        let nested = lowered.nested;
        raw_fields.push(quote! {
            ::copolymer_core::RawField {
                ident: #ident_str,
                meta: #meta,
                shape: #shape,
                nested: #nested,
            }
        });
        visits.extend(lowered.visit);
        populates.extend(lowered.populate);
    }

    let name = &input.ident;
    let name_str = name.to_string();
    let capability_impls = capabilities.impls();

    Ok(quote! {
        impl ::copolymer_core::Schematic for #name {
            const BLUEPRINT: &'static ::copolymer_core::Blueprint =
                &::copolymer_core::Blueprint {
                    type_name: #name_str,
                    fields: &[#(#raw_fields),*],
                };
        }

        impl ::copolymer_core::Resource for #name {
            fn blueprint(&self) -> &'static ::copolymer_core::Blueprint {
                <Self as ::copolymer_core::Schematic>::BLUEPRINT
            }

            fn type_key(&self) -> ::std::any::TypeId {
                ::std::any::TypeId::of::<Self>()
            }

            fn visit_fields<'a>(
                &'a self,
                sink: &mut ::copolymer_core::FieldSink<'a>,
            ) -> ::copolymer_core::Result<()> {
                #(#visits)*
                ::std::result::Result::Ok(())
            }

            fn populate_fields(
                &mut self,
                source: &mut ::copolymer_core::FieldSource<'_, '_>,
            ) -> ::copolymer_core::Result<()> {
                #(#populates)*
                ::std::result::Result::Ok(())
            }

            #capability_impls
        }
    })
}

/// A field's contribution to the generated impl: its blueprint shape, the
/// nested-blueprint hook, and the two accessor statements.
///
/// Fields whose declared type does not fit their directive get a `Value`
/// shape and no accessors; the run-time directive resolver reports the
/// mismatch on first use, before any accessor would run.
struct Lowered {
    shape: TokenStream,
    nested: TokenStream,
    visit: Option<TokenStream>,
    populate: Option<TokenStream>,
}

fn lower_field(meta: &str, ident: &syn::Ident, ty: &Type) -> Lowered {
    let role = meta.split(',').next().unwrap_or_default().trim();
    match role {
        "primary" => match scalar_id_shape(ty) {
            Some(shape) => Lowered {
                shape,
                nested: quote! { ::std::option::Option::None },
                visit: Some(quote! { sink.id(&self.#ident)?; }),
                populate: Some(quote! { source.id(&mut self.#ident)?; }),
            },
            None => Lowered::opaque(),
        },
        "client-id" => match scalar_id_shape(ty) {
            Some(shape) => Lowered {
                shape,
                nested: quote! { ::std::option::Option::None },
                visit: Some(quote! { sink.client_id(&self.#ident)?; }),
                populate: Some(quote! { source.client_id(&mut self.#ident)?; }),
            },
            None => Lowered::opaque(),
        },
        "attr" => match time_shape(ty) {
            Some(optional) => {
                let (visit, populate) = if optional {
                    (
                        quote! { sink.time_opt(&self.#ident)?; },
                        quote! { source.time_opt(&mut self.#ident)?; },
                    )
                } else {
                    (
                        quote! { sink.time(&self.#ident)?; },
                        quote! { source.time(&mut self.#ident)?; },
                    )
                };
                Lowered {
                    shape: quote! { ::copolymer_core::FieldShape::Time { optional: #optional } },
                    nested: quote! { ::std::option::Option::None },
                    visit: Some(visit),
                    populate: Some(populate),
                }
            }
            None => Lowered {
                shape: quote! { ::copolymer_core::FieldShape::Value },
                nested: quote! { ::std::option::Option::None },
                visit: Some(quote! { sink.attr(&self.#ident)?; }),
                populate: Some(quote! { source.attr(&mut self.#ident)?; }),
            },
        },
        "relation" => match relation_arity(ty) {
            Some(Arity::One) => Lowered {
                shape: quote! { ::copolymer_core::FieldShape::One },
                nested: quote! { ::std::option::Option::None },
                visit: Some(quote! {
                    sink.relation_one(
                        self.#ident
                            .as_ref()
                            .map(|target| target as &dyn ::copolymer_core::Resource),
                    )?;
                }),
                populate: Some(quote! { source.relation_one(&mut self.#ident)?; }),
            },
            Some(Arity::Many) => Lowered {
                shape: quote! { ::copolymer_core::FieldShape::Many },
                nested: quote! { ::std::option::Option::None },
                visit: Some(quote! {
                    {
                        let targets: ::std::vec::Vec<&dyn ::copolymer_core::Resource> = self
                            .#ident
                            .iter()
                            .map(|target| target as &dyn ::copolymer_core::Resource)
                            .collect();
                        sink.relation_many(&targets)?;
                    }
                }),
                populate: Some(quote! { source.relation_many(&mut self.#ident)?; }),
            },
            None => Lowered::opaque(),
        },
        "flatten" => Lowered {
            shape: quote! { ::copolymer_core::FieldShape::Nested },
            nested: quote! {
                ::std::option::Option::Some(::copolymer_core::blueprint_of::<#ty>)
            },
            visit: Some(quote! {
                ::copolymer_core::Resource::visit_fields(&self.#ident, sink)?;
            }),
            populate: Some(quote! {
                ::copolymer_core::Resource::populate_fields(&mut self.#ident, source)?;
            }),
        },
        // Unknown roles are recorded as-is; the resolver rejects them.
        _ => Lowered::opaque(),
    }
}

impl Lowered {
    fn opaque() -> Self {
        Lowered {
            shape: quote! { ::copolymer_core::FieldShape::Value },
            nested: quote! { ::std::option::Option::None },
            visit: None,
            populate: None,
        }
    }
}

enum Arity {
    One,
    Many,
}

/// Returns the directive string of a field's `#[resource("...")]` attribute.
fn directive_string(field: &syn::Field) -> syn::Result<Option<String>> {
    let mut found = None;
    for attr in &field.attrs {
        if !attr.path().is_ident("resource") {
            continue;
        }
        if found.is_some() {
            return Err(syn::Error::new_spanned(
                attr,
                "duplicate `resource` attribute",
            ));
        }
        let literal: syn::LitStr = attr.parse_args()?;
        found = Some(literal.value());
    }
    Ok(found)
}

fn scalar_id_shape(ty: &Type) -> Option<TokenStream> {
    let segment = last_segment(ty)?;
    match segment.ident.to_string().as_str() {
        "String" => Some(quote! {
            ::copolymer_core::FieldShape::Id(::copolymer_core::IdShape::Text)
        }),
        "i8" | "i16" | "i32" | "i64" => Some(quote! {
            ::copolymer_core::FieldShape::Id(::copolymer_core::IdShape::Signed)
        }),
        "u8" | "u16" | "u32" | "u64" => Some(quote! {
            ::copolymer_core::FieldShape::Id(::copolymer_core::IdShape::Unsigned)
        }),
        "Option" => scalar_id_shape(&single_generic_arg(&segment.arguments)?),
        _ => None,
    }
}

fn time_shape(ty: &Type) -> Option<bool> {
    let segment = last_segment(ty)?;
    match segment.ident.to_string().as_str() {
        "DateTime" => Some(false),
        "Option" => {
            let inner = single_generic_arg(&segment.arguments)?;
            let inner_segment = last_segment(&inner)?;
            (inner_segment.ident == "DateTime").then_some(true)
        }
        _ => None,
    }
}

fn relation_arity(ty: &Type) -> Option<Arity> {
    let segment = last_segment(ty)?;
    match segment.ident.to_string().as_str() {
        "Option" => Some(Arity::One),
        "Vec" => Some(Arity::Many),
        _ => None,
    }
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(type_path) => type_path.path.segments.last(),
        _ => None,
    }
}

fn single_generic_arg(args: &syn::PathArguments) -> Option<Type> {
    match args {
        syn::PathArguments::AngleBracketed(angle) if angle.args.len() == 1 => {
            match &angle.args[0] {
                syn::GenericArgument::Type(ty) => Some(ty.clone()),
                _ => None,
            }
        }
        _ => None,
    }
}

#[derive(Default)]
struct Capabilities {
    links: bool,
    relationship_links: bool,
    meta: bool,
    relationship_meta: bool,
}

fn parse_capabilities(attrs: &[syn::Attribute]) -> syn::Result<Capabilities> {
    let mut result = Capabilities::default();
    for attr in attrs {
        if !attr.path().is_ident("resource") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("links") {
                result.links = true;
            } else if meta.path.is_ident("relationship_links") {
                result.relationship_links = true;
            } else if meta.path.is_ident("meta") {
                result.meta = true;
            } else if meta.path.is_ident("relationship_meta") {
                result.relationship_meta = true;
            } else {
                return Err(meta.error(
                    "expected `links`, `relationship_links`, `meta`, or `relationship_meta`",
                ));
            }
            Ok(())
        })?;
    }
    Ok(result)
}

impl Capabilities {
    fn impls(&self) -> TokenStream {
        let mut tokens = TokenStream::new();
        if self.links {
            tokens.extend(quote! {
                fn as_linkable(&self) -> ::std::option::Option<&dyn ::copolymer_core::Linkable> {
                    ::std::option::Option::Some(self)
                }
            });
        }
        if self.relationship_links {
            tokens.extend(quote! {
                fn as_relationship_linkable(
                    &self,
                ) -> ::std::option::Option<&dyn ::copolymer_core::RelationshipLinkable> {
                    ::std::option::Option::Some(self)
                }
            });
        }
        if self.meta {
            tokens.extend(quote! {
                fn as_metable(&self) -> ::std::option::Option<&dyn ::copolymer_core::Metable> {
                    ::std::option::Option::Some(self)
                }
            });
        }
        if self.relationship_meta {
            tokens.extend(quote! {
                fn as_relationship_metable(
                    &self,
                ) -> ::std::option::Option<&dyn ::copolymer_core::RelationshipMetable> {
                    ::std::option::Option::Some(self)
                }
            });
        }
        tokens
    }
}
