use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use log::debug;

use crate::blueprint::Blueprint;
use crate::directive::{self, FieldDirective, Role};
use crate::error::{ConfigError, Result};
use crate::resource::Resource;

/// The resolved, flattened directive list of a record type.
///
/// A pure function of the type's static blueprint, so results are memoized
/// per type for the life of the process.
#[derive(Debug)]
pub(crate) struct Layout {
    pub(crate) type_name: &'static str,
    /// Resource type name, taken from the primary-key directive.
    pub(crate) resource_type: String,
    /// Entries in declaration/splice order. This is the accessor handshake
    /// order for field visitation.
    pub(crate) entries: Vec<Entry>,
}

#[derive(Debug)]
pub(crate) struct Entry {
    pub(crate) directive: FieldDirective,
    /// Owning type, for diagnostics (differs from the layout's own type for
    /// flattened fields).
    pub(crate) type_name: &'static str,
    pub(crate) ident: &'static str,
}

impl Layout {
    /// Resolves a blueprint into its flattened layout.
    pub(crate) fn resolve(blueprint: &'static Blueprint) -> Result<Layout> {
        let mut entries = Vec::new();
        let mut resource_type = None;
        let mut stack = Vec::new();
        walk(blueprint, blueprint, &mut entries, &mut resource_type, &mut stack)?;

        let resource_type = resource_type.ok_or(ConfigError::MissingPrimaryKey {
            type_name: blueprint.type_name,
        })?;

        Ok(Layout {
            type_name: blueprint.type_name,
            resource_type,
            entries,
        })
    }
}

fn walk(
    root: &'static Blueprint,
    blueprint: &'static Blueprint,
    entries: &mut Vec<Entry>,
    resource_type: &mut Option<String>,
    stack: &mut Vec<&'static Blueprint>,
) -> Result<()> {
    if stack.iter().any(|seen| std::ptr::eq(*seen, blueprint)) {
        return Err(ConfigError::RecursiveFlatten {
            type_name: blueprint.type_name,
        }
        .into());
    }
    stack.push(blueprint);

    for field in blueprint.fields {
        let Some(directive) = directive::resolve(blueprint.type_name, field)? else {
            continue;
        };
        match directive.role {
            Role::Ignored => {}
            Role::Flatten => {
                let nested = field.nested.ok_or(ConfigError::MissingNested {
                    type_name: blueprint.type_name,
                    field: field.ident,
                })?;
                walk(root, nested(), entries, resource_type, stack)?;
            }
            Role::PrimaryKey => {
                if resource_type.is_some() {
                    return Err(ConfigError::DuplicatePrimaryKey {
                        type_name: root.type_name,
                    }
                    .into());
                }
                *resource_type = Some(directive.wire_name.clone());
                entries.push(Entry {
                    directive,
                    type_name: blueprint.type_name,
                    ident: field.ident,
                });
            }
            _ => entries.push(Entry {
                directive,
                type_name: blueprint.type_name,
                ident: field.ident,
            }),
        }
    }

    stack.pop();
    Ok(())
}

static LAYOUTS: OnceLock<RwLock<HashMap<TypeId, Arc<Layout>>>> = OnceLock::new();

/// Returns the memoized layout for a record's concrete type.
///
/// Lookups take the read lock; a miss resolves outside any lock and inserts
/// under the write lock, first writer wins. Resolution failures are never
/// cached, so an erroneous type errors on every use.
pub(crate) fn layout_for(record: &dyn Resource) -> Result<Arc<Layout>> {
    let cache = LAYOUTS.get_or_init(Default::default);
    let key = record.type_key();

    if let Some(layout) = cache
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        return Ok(Arc::clone(layout));
    }

    let blueprint = record.blueprint();
    let layout = Arc::new(Layout::resolve(blueprint)?);
    debug!(
        "resolved layout for {}: resource type `{}`, {} entries",
        blueprint.type_name,
        layout.resource_type,
        layout.entries.len()
    );

    let mut cache = cache.write().unwrap_or_else(PoisonError::into_inner);
    Ok(Arc::clone(cache.entry(key).or_insert(layout)))
}
