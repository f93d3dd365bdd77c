use std::any::TypeId;

use crate::blueprint::Blueprint;
use crate::decode::FieldSource;
use crate::encode::FieldSink;
use crate::error::{Error, Result};
use crate::node::{Links, Meta};

/// A record type that can be transcoded to and from resource documents.
///
/// Implemented by `#[derive(Resource)]`, which emits the static blueprint
/// and feeds each mapped field to the encoder (and pulls it from the
/// decoder) in blueprint order. Hand-written implementations must visit
/// fields in exactly the order the blueprint declares them.
pub trait Resource {
    /// Returns the static field table for this type.
    fn blueprint(&self) -> &'static Blueprint;

    /// Cache key for the resolved layout of this type.
    fn type_key(&self) -> TypeId;

    /// Feeds each mapped field's value to the encoder, in blueprint order.
    fn visit_fields<'a>(&'a self, sink: &mut FieldSink<'a>) -> Result<()>;

    /// Pulls each mapped field's value from the decoder, in blueprint order.
    fn populate_fields(&mut self, source: &mut FieldSource<'_, '_>) -> Result<()>;

    /// Capability query for custom resource links.
    fn as_linkable(&self) -> Option<&dyn Linkable> {
        None
    }

    /// Capability query for per-relationship links.
    fn as_relationship_linkable(&self) -> Option<&dyn RelationshipLinkable> {
        None
    }

    /// Capability query for custom resource meta.
    fn as_metable(&self) -> Option<&dyn Metable> {
        None
    }

    /// Capability query for per-relationship meta.
    fn as_relationship_metable(&self) -> Option<&dyn RelationshipMetable> {
        None
    }
}

impl<T: Resource + ?Sized> Resource for Box<T> {
    fn blueprint(&self) -> &'static Blueprint {
        (**self).blueprint()
    }

    fn type_key(&self) -> TypeId {
        (**self).type_key()
    }

    fn visit_fields<'a>(&'a self, sink: &mut FieldSink<'a>) -> Result<()> {
        (**self).visit_fields(sink)
    }

    fn populate_fields(&mut self, source: &mut FieldSource<'_, '_>) -> Result<()> {
        (**self).populate_fields(source)
    }

    fn as_linkable(&self) -> Option<&dyn Linkable> {
        (**self).as_linkable()
    }

    fn as_relationship_linkable(&self) -> Option<&dyn RelationshipLinkable> {
        (**self).as_relationship_linkable()
    }

    fn as_metable(&self) -> Option<&dyn Metable> {
        (**self).as_metable()
    }

    fn as_relationship_metable(&self) -> Option<&dyn RelationshipMetable> {
        (**self).as_relationship_metable()
    }
}

/// Compile-time companion of [`Resource`] carrying the blueprint constant.
pub trait Schematic {
    const BLUEPRINT: &'static Blueprint;
}

/// Provides the resource's own `links` member.
pub trait Linkable {
    fn links(&self) -> Links;
}

/// Provides `links` for a relationship, by wire name.
pub trait RelationshipLinkable {
    /// Returns `None` when the relation has no links.
    fn relationship_links(&self, relation: &str) -> Option<Links>;
}

/// Provides the resource's own `meta` member.
pub trait Metable {
    fn meta(&self) -> Meta;
}

/// Provides `meta` for a relationship, by wire name.
pub trait RelationshipMetable {
    /// Returns `None` when the relation has no meta.
    fn relationship_meta(&self, relation: &str) -> Option<Meta>;
}

/// Encode-side view of a primary-key or client-id value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdRef<'a> {
    Str(&'a str),
    Int(i64),
    Uint(u64),
    /// An unset optional identifier.
    Absent,
}

mod sealed {
    pub trait Sealed {}
}

/// Conversion between a field's identifier kind and the wire's string `id`.
///
/// Implemented exactly for `String`, the signed and unsigned integer widths,
/// and `Option` of each; the trait is sealed.
pub trait WireId: sealed::Sealed + Sized {
    /// Borrowed view of the value for encoding.
    fn id_ref(&self) -> IdRef<'_>;

    /// Parses the wire identifier string into this kind.
    fn from_wire(raw: &str) -> Result<Self>;
}

impl sealed::Sealed for String {}

impl WireId for String {
    fn id_ref(&self) -> IdRef<'_> {
        IdRef::Str(self)
    }

    fn from_wire(raw: &str) -> Result<Self> {
        Ok(raw.to_owned())
    }
}

macro_rules! impl_wire_id_int {
    ($variant:ident, $($t:ty),+) => {
        $(
            impl sealed::Sealed for $t {}

            impl WireId for $t {
                fn id_ref(&self) -> IdRef<'_> {
                    IdRef::$variant((*self).into())
                }

                fn from_wire(raw: &str) -> Result<Self> {
                    raw.parse().map_err(|_| {
                        Error::BadIdentifier(format!(
                            "cannot parse `{raw}` as {}",
                            stringify!($t)
                        ))
                    })
                }
            }
        )+
    };
}

impl_wire_id_int!(Int, i8, i16, i32, i64);
impl_wire_id_int!(Uint, u8, u16, u32, u64);

impl<T: WireId> sealed::Sealed for Option<T> {}

impl<T: WireId> WireId for Option<T> {
    fn id_ref(&self) -> IdRef<'_> {
        match self {
            Some(value) => value.id_ref(),
            None => IdRef::Absent,
        }
    }

    fn from_wire(raw: &str) -> Result<Self> {
        T::from_wire(raw).map(Some)
    }
}
