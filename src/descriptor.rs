//! The type descriptor table and the dynamic representation of structured
//! values.
//!
//! The table is an input: a generated or hand-built list of composite type
//! descriptions keyed by their (numeric, ns-0) NodeId. Structured values are
//! held as a value tree aligned member-for-member with their description —
//! the codecs walk the description and the tree in lockstep.

use serde::Serialize;

use crate::types::{BuiltinTypeId, NodeId, Variant};
use crate::{EncodingResult, Error};

/// Index of a description inside its [`DataTypeTable`].
pub type TypeIndex = usize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MemberType {
    Builtin(BuiltinTypeId),
    /// Another structured type, by table index.
    Structured(TypeIndex),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataTypeMember {
    /// Field name; also the JSON key. An empty name suppresses the key and
    /// splices the member value directly (as the generated tables do for
    /// union switch fields).
    pub name: String,
    pub member_type: MemberType,
    pub is_array: bool,
}

impl DataTypeMember {
    pub fn scalar(name: &str, ty: BuiltinTypeId) -> DataTypeMember {
        DataTypeMember { name: name.to_owned(), member_type: MemberType::Builtin(ty), is_array: false }
    }

    pub fn array(name: &str, ty: BuiltinTypeId) -> DataTypeMember {
        DataTypeMember { name: name.to_owned(), member_type: MemberType::Builtin(ty), is_array: true }
    }

    pub fn nested(name: &str, index: TypeIndex) -> DataTypeMember {
        DataTypeMember { name: name.to_owned(), member_type: MemberType::Structured(index), is_array: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataTypeDescription {
    /// Must be a numeric NodeId; it doubles as the ExtensionObject TypeId.
    pub type_id: NodeId,
    pub name: String,
    pub members: Vec<DataTypeMember>,
}

/// Ordered set of descriptions. `MemberType::Structured` indices refer into
/// this table, so entries must be pushed before they are referenced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataTypeTable {
    types: Vec<DataTypeDescription>,
}

impl DataTypeTable {
    pub fn new() -> DataTypeTable {
        DataTypeTable::default()
    }

    pub fn push(&mut self, desc: DataTypeDescription) -> TypeIndex {
        self.types.push(desc);
        self.types.len() - 1
    }

    pub fn get(&self, index: TypeIndex) -> Option<&DataTypeDescription> {
        self.types.get(index)
    }

    pub fn find(&self, type_id: &NodeId) -> Option<(TypeIndex, &DataTypeDescription)> {
        self.types
            .iter()
            .enumerate()
            .find(|(_, desc)| &desc.type_id == type_id)
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// One member value. Variant scalar arms double as the per-builtin storage;
/// the codecs check the arm against the declared member type and reject
/// mismatches as encoding errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldValue {
    Scalar(Variant),
    /// Builtin array member; `None` is the null array, `Some(vec![])` the
    /// empty one.
    Array(Option<Vec<Variant>>),
    Struct(Box<StructValue>),
    StructArray(Option<Vec<StructValue>>),
}

/// A decoded structured value: the descriptor reference plus one
/// [`FieldValue`] per member, in member order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructValue {
    pub type_index: TypeIndex,
    pub type_id: NodeId,
    pub fields: Vec<FieldValue>,
}

impl StructValue {
    pub fn new(table: &DataTypeTable, type_index: TypeIndex, fields: Vec<FieldValue>) -> EncodingResult<StructValue> {
        let desc = table.get(type_index).ok_or(Error::Encoding)?;
        if desc.members.len() != fields.len() {
            return Err(Error::Encoding);
        }
        Ok(StructValue { type_index, type_id: desc.type_id.clone(), fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_type_id() {
        let mut table = DataTypeTable::new();
        let idx = table.push(DataTypeDescription {
            type_id: NodeId::numeric(0, 14593),
            name: "ConfigurationVersionDataType".into(),
            members: vec![
                DataTypeMember::scalar("MajorVersion", BuiltinTypeId::UInt32),
                DataTypeMember::scalar("MinorVersion", BuiltinTypeId::UInt32),
            ],
        });
        let (found, desc) = table.find(&NodeId::numeric(0, 14593)).unwrap();
        assert_eq!(found, idx);
        assert_eq!(desc.members.len(), 2);
        assert!(table.find(&NodeId::numeric(0, 1)).is_none());
    }

    #[test]
    fn field_count_must_match() {
        let mut table = DataTypeTable::new();
        let idx = table.push(DataTypeDescription {
            type_id: NodeId::numeric(0, 3),
            name: "Pair".into(),
            members: vec![
                DataTypeMember::scalar("A", BuiltinTypeId::Int32),
                DataTypeMember::scalar("B", BuiltinTypeId::Int32),
            ],
        });
        let bad = StructValue::new(&table, idx, vec![FieldValue::Scalar(Variant::Int32(1))]);
        assert_eq!(bad.unwrap_err(), Error::Encoding);
    }
}
