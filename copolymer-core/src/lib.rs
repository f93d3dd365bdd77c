//! Declarative transcoding between typed records and resource documents.
//!
//! A record type declares, per field, how it maps onto the wire format:
//! which field is the resource identifier, which fields are attributes or
//! relations, and the options governing each. `#[derive(Resource)]` records
//! those declarations as a static blueprint; the encoder and decoder
//! interpret them at runtime, so every directive error is reported through
//! the ordinary [`Result`] path instead of a compile failure.
//!
//! ```
//! # #[cfg(feature = "derive")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use copolymer_core::Resource;
//!
//! #[derive(Resource, Default)]
//! struct Article {
//!     #[resource("primary,articles")]
//!     id: u64,
//!     #[resource("attr,title")]
//!     title: String,
//! }
//!
//! let article = Article { id: 7, title: "Hello".to_string() };
//! let bytes = copolymer_core::to_vec(&article)?;
//! assert_eq!(
//!     String::from_utf8(bytes)?,
//!     r#"{"data":{"type":"articles","id":"7","attributes":{"title":"Hello"}}}"#
//! );
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "derive"))]
//! # fn main() {}
//! ```
//!
//! Documents carry a single resource or a collection, each resource's
//! relationships as identity references, and the referenced resource bodies
//! deduplicated in the `included` side-table. Decoding reverses the path:
//! [`from_slice`] resolves relationship identities against `included` and
//! falls back to id-only stubs for identities without a sideloaded body.

mod blueprint;
mod decode;
mod directive;
mod document;
mod encode;
mod error;
mod layout;
mod node;
mod resource;

pub use blueprint::{blueprint_of, Blueprint, FieldShape, IdShape, RawField};
pub use decode::{
    from_document, from_document_many, from_reader, from_reader_many, from_slice,
    from_slice_many, FieldSource,
};
pub use directive::{FieldDirective, Role, TimeFormat};
pub use document::{Document, PrimaryData};
pub use encode::{
    to_document, to_document_many, to_document_many_dyn, to_document_many_dyn_without_included,
    to_document_many_without_included, to_document_without_included, to_vec, to_writer, FieldSink,
};
pub use error::{ConfigError, Error, Result};
pub use node::{
    Link, Links, Meta, Relationship, RelationshipData, ResourceIdentity, ResourceNode,
};
pub use resource::{
    IdRef, Linkable, Metable, RelationshipLinkable, RelationshipMetable, Resource, Schematic,
    WireId,
};

#[cfg(feature = "derive")]
pub use copolymer_derive::Resource;

/// Media type of the wire format.
pub const MEDIA_TYPE: &str = "application/vnd.api+json";
