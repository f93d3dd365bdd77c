use crate::resource::Schematic;

/// Static field table a record type exposes for directive resolution.
///
/// Emitted by `#[derive(Resource)]`. The derive records each mapped field's
/// raw directive string verbatim; interpreting the string is a run-time
/// concern of the directive resolver.
#[derive(Debug)]
pub struct Blueprint {
    /// Rust type name, for diagnostics.
    pub type_name: &'static str,
    /// Mapped fields in declaration order. Unannotated and explicitly
    /// ignored fields are not listed.
    pub fields: &'static [RawField],
}

/// One mapped field of a blueprint.
#[derive(Debug, Clone, Copy)]
pub struct RawField {
    /// Rust field name, for diagnostics.
    pub ident: &'static str,
    /// Raw comma-separated directive string.
    pub meta: &'static str,
    /// Declared shape summary, inferred by the derive.
    pub shape: FieldShape,
    /// Blueprint of the embedded record, set only for flatten fields.
    pub nested: Option<fn() -> &'static Blueprint>,
}

/// Summary of what a field's accessor will yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// An identifier-capable scalar.
    Id(IdShape),
    /// A timestamp, or an optional timestamp.
    Time { optional: bool },
    /// Any serializable attribute payload.
    Value,
    /// A to-one relation container.
    One,
    /// A to-many relation container.
    Many,
    /// A flattened embedded record.
    Nested,
}

/// The underlying kind of an identifier-capable scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdShape {
    Text,
    Signed,
    Unsigned,
}

/// Returns the blueprint of a record type.
///
/// Usable as a `fn` pointer, which is how the derive wires up the lazy
/// nested-blueprint hook of flatten fields.
pub fn blueprint_of<T: Schematic>() -> &'static Blueprint {
    T::BLUEPRINT
}
