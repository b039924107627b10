//! Stable component registration: wire ids, field schemas, and the schema fingerprint
//! embedded in full-state messages (§3, §6.3).

mod error;
mod value;

pub use error::RegistryError;
pub use value::{FieldValue, ScalarType};

const MAX_COMPONENTS: usize = 255;
const MAX_FIELDS: usize = 16;

/// Opaque key for a registered component. Only a `ComponentRegistry` can mint one,
/// which keeps callers from fabricating wire ids that bypass registry validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentKind(u8);

impl ComponentKind {
    pub const fn wire_id(self) -> u8 {
        self.0
    }
}

/// One field in a component's schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: &'static str,
    pub scalar_type: ScalarType,
}

impl FieldSchema {
    pub const fn new(name: &'static str, scalar_type: ScalarType) -> Self {
        Self { name, scalar_type }
    }
}

/// Full definition of a registered component: name, ownership class, and field schema.
#[derive(Debug, Clone)]
pub struct ComponentSpec {
    pub name: &'static str,
    pub client_owned: bool,
    pub fields: Vec<FieldSchema>,
}

/// Immutable, append-only mapping from component type to wire id, field schema and
/// ownership class. Construction is the only place `ConfigurationError`s (§7) arise.
#[derive(Debug, Clone)]
pub struct ComponentRegistry {
    specs: Vec<ComponentSpec>,
    hash: u32,
}

impl ComponentRegistry {
    pub fn builder() -> ComponentRegistryBuilder {
        ComponentRegistryBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Deterministic FNV-1a fingerprint over `name:field:type,...ownership;` per
    /// component, in wire-id order (§6.3).
    pub fn hash(&self) -> u32 {
        self.hash
    }

    pub fn kind_by_wire_id(&self, wire_id: u8) -> Option<ComponentKind> {
        if (wire_id as usize) < self.specs.len() {
            Some(ComponentKind(wire_id))
        } else {
            None
        }
    }

    pub fn spec(&self, kind: ComponentKind) -> &ComponentSpec {
        &self.specs[kind.0 as usize]
    }

    pub fn is_client_owned(&self, kind: ComponentKind) -> bool {
        self.spec(kind).client_owned
    }

    pub fn field_count(&self, kind: ComponentKind) -> usize {
        self.spec(kind).fields.len()
    }

    pub fn field_schema(&self, kind: ComponentKind, field_index: usize) -> FieldSchema {
        self.spec(kind).fields[field_index]
    }

    pub fn kinds(&self) -> impl Iterator<Item = ComponentKind> + '_ {
        (0..self.specs.len()).map(|i| ComponentKind(i as u8))
    }
}

/// Builder used to assemble a `ComponentRegistry` in registration order; the
/// registration order *is* the wire id.
#[derive(Debug, Default)]
pub struct ComponentRegistryBuilder {
    specs: Vec<ComponentSpec>,
}

impl ComponentRegistryBuilder {
    pub fn new() -> Self {
        Self { specs: Vec::new() }
    }

    pub fn register(
        mut self,
        name: &'static str,
        client_owned: bool,
        fields: Vec<FieldSchema>,
    ) -> Result<Self, RegistryError> {
        if self.specs.len() >= MAX_COMPONENTS {
            return Err(RegistryError::TooManyComponents {
                limit: MAX_COMPONENTS,
            });
        }
        if fields.len() > MAX_FIELDS {
            return Err(RegistryError::TooManyFields {
                component: name,
                count: fields.len(),
                limit: MAX_FIELDS,
            });
        }
        self.specs.push(ComponentSpec {
            name,
            client_owned,
            fields,
        });
        Ok(self)
    }

    pub fn build(self) -> Result<ComponentRegistry, RegistryError> {
        let hash = fnv1a_hash(&self.specs);
        Ok(ComponentRegistry {
            specs: self.specs,
            hash,
        })
    }
}

fn fnv1a_hash(specs: &[ComponentSpec]) -> u32 {
    const FNV_OFFSET: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;

    let mut hash = FNV_OFFSET;
    let mut feed = |bytes: &[u8]| {
        for &b in bytes {
            hash ^= b as u32;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    };

    for spec in specs {
        feed(spec.name.as_bytes());
        for field in &spec.fields {
            feed(b":");
            feed(field.name.as_bytes());
            feed(b":");
            feed(field.scalar_type.wire_name().as_bytes());
            feed(b",");
        }
        feed(if spec.client_owned { b"C;" } else { b"S;" });
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let a = ComponentRegistry::builder()
            .register(
                "Position",
                false,
                vec![
                    FieldSchema::new("x", ScalarType::F32),
                    FieldSchema::new("y", ScalarType::F32),
                ],
            )
            .unwrap()
            .build()
            .unwrap();
        let b = ComponentRegistry::builder()
            .register(
                "Position",
                false,
                vec![
                    FieldSchema::new("x", ScalarType::F32),
                    FieldSchema::new("y", ScalarType::F32),
                ],
            )
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn hash_distinguishes_ownership() {
        let a = ComponentRegistry::builder()
            .register("Input", true, vec![FieldSchema::new("dx", ScalarType::F32)])
            .unwrap()
            .build()
            .unwrap();
        let b = ComponentRegistry::builder()
            .register("Input", false, vec![FieldSchema::new("dx", ScalarType::F32)])
            .unwrap()
            .build()
            .unwrap();
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn rejects_too_many_fields() {
        let fields: Vec<_> = (0..17)
            .map(|i| FieldSchema::new(Box::leak(format!("f{i}").into_boxed_str()), ScalarType::U8))
            .collect();
        let err = ComponentRegistry::builder()
            .register("Overfull", false, fields)
            .unwrap_err();
        assert!(matches!(err, RegistryError::TooManyFields { .. }));
    }
}
