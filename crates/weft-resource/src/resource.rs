use std::collections::BTreeMap;

use weft_cbor::Digest;

use crate::error::ResourceError;
use crate::value::{FieldValue, Ref, TypeId};

/// A named, registered type with an ordered list of field values.
///
/// Field order is part of the contract: `field_names` and `field_values`
/// must align, and serialization depends on the declared order.
pub trait Resource: Sized {
    /// Stable fully qualified type name, e.g. `weft/request@1`.
    fn type_name() -> &'static str;

    /// Ordered field names.
    fn field_names() -> &'static [&'static str];

    /// Field values aligned with [`Resource::field_names`].
    fn field_values(&self) -> Vec<FieldValue>;

    /// Constructs the resource from a name → value mapping.
    fn from_fields(fields: FieldMap) -> Result<Self, ResourceError>;

    fn type_id() -> TypeId {
        TypeId::named(Self::type_name())
    }

    /// Erases the resource into its runtime form.
    fn to_value(&self) -> Result<ResourceValue, ResourceError> {
        let names = Self::field_names();
        let values = self.field_values();
        if names.len() != values.len() {
            return Err(ResourceError::FieldListMismatch {
                type_name: Self::type_name().to_owned(),
                names: names.len(),
                values: values.len(),
            });
        }
        ResourceValue::new(
            Self::type_id(),
            names
                .iter()
                .map(|n| (*n).to_owned())
                .zip(values)
                .collect(),
        )
    }
}

/// Name → value mapping handed to [`Resource::from_fields`].
#[derive(Debug, Default)]
pub struct FieldMap {
    entries: BTreeMap<String, FieldValue>,
}

impl FieldMap {
    pub fn new(entries: impl IntoIterator<Item = (String, FieldValue)>) -> Self {
        FieldMap {
            entries: entries.into_iter().collect(),
        }
    }

    /// Removes and returns the named field, failing if it is absent.
    pub fn take(&mut self, name: &str) -> Result<FieldValue, ResourceError> {
        self.entries
            .remove(name)
            .ok_or_else(|| ResourceError::FieldMissing(name.to_owned()))
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Erased runtime form of a resource: type identity plus ordered fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceValue {
    type_id: TypeId,
    fields: Vec<(String, FieldValue)>,
}

impl ResourceValue {
    pub fn new(
        type_id: TypeId,
        fields: Vec<(String, FieldValue)>,
    ) -> Result<Self, ResourceError> {
        let mut seen = BTreeMap::new();
        for (name, _) in &fields {
            if seen.insert(name.clone(), ()).is_some() {
                return Err(ResourceError::DuplicateField(name.clone()));
            }
        }
        Ok(ResourceValue { type_id, fields })
    }

    pub fn type_id(&self) -> &TypeId {
        &self.type_id
    }

    /// Ordered `(name, value)` pairs.
    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn field_map(&self) -> FieldMap {
        FieldMap::new(self.fields.iter().cloned())
    }

    /// Reconstructs the typed resource, checking the type identity.
    pub fn typed<T: Resource>(&self) -> Result<T, ResourceError> {
        if self.type_id != T::type_id() {
            return Err(ResourceError::TypeMismatch {
                expected: T::type_name().to_owned(),
                found: self.type_id.name().to_owned(),
            });
        }
        T::from_fields(self.field_map())
    }
}

impl Resource for Ref {
    fn type_name() -> &'static str {
        "weft/ref@1"
    }

    fn field_names() -> &'static [&'static str] {
        &["type_id", "digest"]
    }

    fn field_values(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Type(self.type_id().clone()),
            FieldValue::Str(self.digest().to_hex()),
        ]
    }

    fn from_fields(mut fields: FieldMap) -> Result<Self, ResourceError> {
        let type_id = fields.take("type_id")?.as_type()?.clone();
        let digest = Digest::from_hex(fields.take("digest")?.as_str()?)?;
        Ok(Ref::new(type_id, digest))
    }
}
