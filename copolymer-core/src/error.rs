use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = self::Error> = std::result::Result<T, E>;

/// Error type for encode and decode operations.
///
/// Every failure is reported synchronously to the caller of the top-level
/// entry point; partial documents are never emitted.
#[derive(Debug, Error)]
pub enum Error {
    /// A type's directive table is malformed. Raised at first use of the type.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A primary key of unsupported kind, an unset identifier on encode, or a
    /// wire identifier that does not parse into the destination kind.
    #[error("bad resource identifier: {0}")]
    BadIdentifier(String),

    /// Document shape does not fit the requested destination, or a
    /// relationship's cardinality disagrees with its directive.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// An attribute value's JSON kind cannot convert to the field's kind.
    #[error("cannot coerce value at `{key}` into field {field}: {reason}")]
    ValueCoercion {
        field: String,
        key: String,
        reason: String,
    },

    /// A links provider returned a member that is neither a URL string nor a
    /// link object.
    #[error("link member `{member}` must be a URL string or a link object")]
    Capability { member: String },

    /// Byte-stream parse or serialize failure from the external codec.
    #[error(transparent)]
    Codec(#[from] serde_json::Error),
}

/// Configuration errors in a type's declared field directives.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{type_name}.{field}: unknown directive role `{role}`")]
    UnknownRole {
        type_name: &'static str,
        field: &'static str,
        role: String,
    },

    #[error("{type_name}.{field}: unknown directive option `{option}`")]
    UnknownOption {
        type_name: &'static str,
        field: &'static str,
        option: String,
    },

    #[error("{type_name}.{field}: `{role}` directive is missing its name token")]
    MissingName {
        type_name: &'static str,
        field: &'static str,
        role: &'static str,
    },

    #[error("{type_name}.{field}: `{directive}` directive does not fit the field's shape")]
    ShapeDisagreement {
        type_name: &'static str,
        field: &'static str,
        directive: &'static str,
    },

    #[error("{type_name}.{field}: flatten field carries no nested blueprint")]
    MissingNested {
        type_name: &'static str,
        field: &'static str,
    },

    #[error("{type_name}: flatten cycle detected")]
    RecursiveFlatten { type_name: &'static str },

    #[error("{type_name}: no primary key directive")]
    MissingPrimaryKey { type_name: &'static str },

    #[error("{type_name}: more than one primary key directive")]
    DuplicatePrimaryKey { type_name: &'static str },

    #[error("{type_name}: fields visited out of declaration order")]
    FieldOrder { type_name: &'static str },
}
