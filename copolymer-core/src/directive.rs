use crate::blueprint::{FieldShape, IdShape, RawField};
use crate::error::{ConfigError, Error, Result};

/// Layout used for `iso8601` timestamp attributes, both directions.
/// Seconds precision, UTC, sub-second component dropped.
pub(crate) const ISO8601_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// What a field contributes to the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The field whose value becomes the resource's wire-level `id`.
    PrimaryKey,
    Attribute,
    Relation,
    /// Client-supplied identifier companion to the primary key.
    ClientId,
    /// Explicitly excluded from the mapping.
    Ignored,
    /// Embedded record whose own fields are spliced into this type's list.
    Flatten,
}

/// Wire encoding for timestamp attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeFormat {
    /// Integer Unix epoch seconds.
    #[default]
    Epoch,
    /// `YYYY-MM-DDThh:mm:ssZ` in UTC.
    Iso8601,
}

/// The resolved, structured form of a field's directive string.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDirective {
    pub role: Role,
    /// Resolved wire name. For `PrimaryKey` this slot holds the resource
    /// type name instead.
    pub wire_name: String,
    pub omit_empty: bool,
    pub time_format: TimeFormat,
    /// Derived from the field's container shape, not from a token.
    pub to_many: bool,
}

/// Resolves a raw directive string against the field's declared shape.
///
/// Returns `Ok(None)` for an empty string: the field is excluded from the
/// mapping, which is not an error.
pub fn resolve(type_name: &'static str, field: &RawField) -> Result<Option<FieldDirective>> {
    if field.meta.is_empty() {
        return Ok(None);
    }

    let mut tokens = field.meta.split(',').map(str::trim);
    let role_token = tokens.next().unwrap_or_default();

    let directive = match role_token {
        "primary" => {
            if !matches!(field.shape, FieldShape::Id(_)) {
                return Err(Error::BadIdentifier(format!(
                    "{type_name}.{} cannot serve as a resource identifier",
                    field.ident
                )));
            }
            let resource_type = name_token(tokens.next(), type_name, field.ident, "primary")?;
            reject_options(tokens, type_name, field.ident)?;
            FieldDirective {
                role: Role::PrimaryKey,
                wire_name: resource_type,
                omit_empty: false,
                time_format: TimeFormat::Epoch,
                to_many: false,
            }
        }
        "attr" => {
            if matches!(
                field.shape,
                FieldShape::One | FieldShape::Many | FieldShape::Nested
            ) {
                return Err(ConfigError::ShapeDisagreement {
                    type_name,
                    field: field.ident,
                    directive: "attr",
                }
                .into());
            }
            let wire_name = name_token(tokens.next(), type_name, field.ident, "attr")?;
            let mut omit_empty = false;
            let mut time_format = TimeFormat::Epoch;
            for option in tokens {
                match option {
                    "omitempty" => omit_empty = true,
                    "iso8601" => {
                        if !matches!(field.shape, FieldShape::Time { .. }) {
                            return Err(ConfigError::ShapeDisagreement {
                                type_name,
                                field: field.ident,
                                directive: "iso8601",
                            }
                            .into());
                        }
                        time_format = TimeFormat::Iso8601;
                    }
                    other => {
                        return Err(ConfigError::UnknownOption {
                            type_name,
                            field: field.ident,
                            option: other.to_string(),
                        }
                        .into());
                    }
                }
            }
            FieldDirective {
                role: Role::Attribute,
                wire_name,
                omit_empty,
                time_format,
                to_many: false,
            }
        }
        "relation" => {
            let to_many = match field.shape {
                FieldShape::One => false,
                FieldShape::Many => true,
                _ => {
                    return Err(ConfigError::ShapeDisagreement {
                        type_name,
                        field: field.ident,
                        directive: "relation",
                    }
                    .into());
                }
            };
            let wire_name = name_token(tokens.next(), type_name, field.ident, "relation")?;
            let mut omit_empty = false;
            for option in tokens {
                match option {
                    "omitempty" => omit_empty = true,
                    other => {
                        return Err(ConfigError::UnknownOption {
                            type_name,
                            field: field.ident,
                            option: other.to_string(),
                        }
                        .into());
                    }
                }
            }
            FieldDirective {
                role: Role::Relation,
                wire_name,
                omit_empty,
                time_format: TimeFormat::Epoch,
                to_many,
            }
        }
        "client-id" => {
            if field.shape != FieldShape::Id(IdShape::Text) {
                return Err(ConfigError::ShapeDisagreement {
                    type_name,
                    field: field.ident,
                    directive: "client-id",
                }
                .into());
            }
            reject_options(tokens, type_name, field.ident)?;
            FieldDirective {
                role: Role::ClientId,
                wire_name: String::new(),
                omit_empty: false,
                time_format: TimeFormat::Epoch,
                to_many: false,
            }
        }
        "-" => {
            reject_options(tokens, type_name, field.ident)?;
            FieldDirective {
                role: Role::Ignored,
                wire_name: String::new(),
                omit_empty: false,
                time_format: TimeFormat::Epoch,
                to_many: false,
            }
        }
        "flatten" => {
            if field.shape != FieldShape::Nested {
                return Err(ConfigError::ShapeDisagreement {
                    type_name,
                    field: field.ident,
                    directive: "flatten",
                }
                .into());
            }
            reject_options(tokens, type_name, field.ident)?;
            FieldDirective {
                role: Role::Flatten,
                wire_name: String::new(),
                omit_empty: false,
                time_format: TimeFormat::Epoch,
                to_many: false,
            }
        }
        other => {
            return Err(ConfigError::UnknownRole {
                type_name,
                field: field.ident,
                role: other.to_string(),
            }
            .into());
        }
    };

    Ok(Some(directive))
}

fn name_token(
    token: Option<&str>,
    type_name: &'static str,
    field: &'static str,
    role: &'static str,
) -> Result<String> {
    match token {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(ConfigError::MissingName {
            type_name,
            field,
            role,
        }
        .into()),
    }
}

fn reject_options<'a>(
    mut tokens: impl Iterator<Item = &'a str>,
    type_name: &'static str,
    field: &'static str,
) -> Result<()> {
    match tokens.next() {
        None => Ok(()),
        Some(option) => Err(ConfigError::UnknownOption {
            type_name,
            field,
            option: option.to_string(),
        }
        .into()),
    }
}
