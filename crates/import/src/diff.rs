use serde::{Deserialize, Serialize};

use crate::error::ImportError;
use crate::value::FieldValue;

/// Declared type of a diff property, recorded into each delta so hosts can
/// render old/new appropriately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Text,
    Integer,
    Decimal,
    Date,
    Bool,
    Reference,
}

/// One recorded difference between the persisted and the incoming value of a
/// named property. Only materialized when the two values are unequal under
/// `FieldValue`'s equality; old/new have already passed `for_display()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyDelta {
    pub property: String,
    pub kind: PropertyKind,
    pub old: FieldValue,
    pub new: FieldValue,
}

/// Compare one property of two records. `None` means "no difference".
pub fn compare_property(
    property: &str,
    kind: PropertyKind,
    new: &FieldValue,
    old: &FieldValue,
) -> Option<PropertyDelta> {
    if new == old {
        return None;
    }
    Some(PropertyDelta {
        property: property.to_string(),
        kind,
        old: old.for_display(),
        new: new.for_display(),
    })
}

type Accessor<T> = Box<dyn Fn(&T) -> FieldValue>;

struct PropertySpec<T> {
    name: String,
    kind: PropertyKind,
    accessor: Accessor<T>,
}

/// Ordered mapping of property name -> accessor, supplied by the integrator
/// at configuration time. Registration order is the delta order.
///
/// Duplicate names are a caller error; no dedup is performed.
pub struct PropertyRegistry<T> {
    specs: Vec<PropertySpec<T>>,
}

impl<T> PropertyRegistry<T> {
    pub fn new() -> Self {
        PropertyRegistry { specs: Vec::new() }
    }

    pub fn register(
        mut self,
        name: impl Into<String>,
        kind: PropertyKind,
        accessor: impl Fn(&T) -> FieldValue + 'static,
    ) -> Self {
        let name = name.into();
        debug_assert!(
            !self.specs.iter().any(|s| s.name == name),
            "duplicate diff property '{name}'"
        );
        self.specs.push(PropertySpec {
            name,
            kind,
            accessor: Box::new(accessor),
        });
        self
    }

    fn find(&self, name: &str) -> Option<&PropertySpec<T>> {
        self.specs.iter().find(|s| s.name == name)
    }

    fn names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }
}

impl<T> Default for PropertyRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A delta-producing function over `(new, old)` record pairs. The primary
/// property comparison is the first source; integrators append further
/// sources for differences the base property list cannot express (e.g. a
/// delta computed from a date-scoped sub-record).
pub type DeltaSource<T> = Box<dyn Fn(&T, &T) -> Vec<PropertyDelta>>;

/// Property Delta Engine: compares two records property by property and
/// collects the non-empty deltas of every source, in source order.
///
/// All property-name resolution happens in the constructors; a requested
/// name missing from the registry fails there with
/// [`ImportError::UnknownProperty`] (a configuration error, not a data
/// error), which makes `deltas` itself infallible.
pub struct DiffEngine<T> {
    sources: Vec<DeltaSource<T>>,
}

impl<T: 'static> DiffEngine<T> {
    /// Engine comparing the named subset of the registry's properties.
    pub fn for_properties(
        registry: PropertyRegistry<T>,
        names: &[&str],
    ) -> Result<Self, ImportError> {
        for name in names {
            if registry.find(name).is_none() {
                return Err(ImportError::UnknownProperty {
                    property: (*name).to_string(),
                });
            }
        }
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let primary: DeltaSource<T> = Box::new(move |new, old| {
            names
                .iter()
                .filter_map(|name| {
                    // Resolution checked above; find cannot fail here.
                    let spec = registry.find(name)?;
                    compare_property(
                        &spec.name,
                        spec.kind,
                        &(spec.accessor)(new),
                        &(spec.accessor)(old),
                    )
                })
                .collect()
        });
        Ok(DiffEngine {
            sources: vec![primary],
        })
    }

    /// Engine comparing every registered property.
    pub fn for_registry(registry: PropertyRegistry<T>) -> Self {
        let names = registry.names();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        // Every name comes from the registry itself; resolution cannot fail.
        match Self::for_properties(registry, &name_refs) {
            Ok(engine) => engine,
            Err(_) => unreachable!("registry names resolve against themselves"),
        }
    }

    /// Append an extra delta source, run after all earlier sources.
    pub fn push_source(&mut self, source: impl Fn(&T, &T) -> Vec<PropertyDelta> + 'static) {
        self.sources.push(Box::new(source));
    }
}

impl<T> DiffEngine<T> {
    /// All deltas between the incoming and the persisted record.
    pub fn deltas(&self, new: &T, old: &T) -> Vec<PropertyDelta> {
        let mut out = Vec::new();
        for source in &self.sources {
            out.extend(source(new, old));
        }
        out
    }
}
