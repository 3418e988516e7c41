use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;

use crate::descriptor::StructValue;
use crate::status::StatusCode;
use crate::types::{
    ByteString, DataValue, DateTime, DiagnosticInfo, ExpandedNodeId, ExtensionObject, Guid,
    LocalizedText, NodeId, QualifiedName, UaString, XmlElement,
};
use crate::{EncodingResult, Error};

/// The 25 built-in types. The numeric value is the tag in the Variant
/// encoding byte and, at the same time, the ns-0 NodeId of the type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u8)]
pub enum BuiltinTypeId {
    Boolean = 1,
    SByte = 2,
    Byte = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Int64 = 8,
    UInt64 = 9,
    Float = 10,
    Double = 11,
    String = 12,
    DateTime = 13,
    Guid = 14,
    ByteString = 15,
    XmlElement = 16,
    NodeId = 17,
    ExpandedNodeId = 18,
    StatusCode = 19,
    QualifiedName = 20,
    LocalizedText = 21,
    ExtensionObject = 22,
    DataValue = 23,
    Variant = 24,
    DiagnosticInfo = 25,
}

/// Element type of a Variant array. Non-builtin elements travel as
/// ExtensionObjects on the wire and come back as `Structured` once their
/// TypeId resolves against the descriptor table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ElementType {
    Builtin(BuiltinTypeId),
    Structured(NodeId),
}

/// A self-describing value: one arm per builtin scalar, a decoded
/// non-builtin arm, and the array form. There is deliberately no scalar
/// `Variant` arm — a Variant containing a Variant exists only inside an
/// array, which is the invariant the encoding demands.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub enum Variant {
    #[default]
    Empty,
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(UaString),
    DateTime(DateTime),
    Guid(Guid),
    ByteString(ByteString),
    XmlElement(XmlElement),
    NodeId(Box<NodeId>),
    ExpandedNodeId(Box<ExpandedNodeId>),
    StatusCode(StatusCode),
    QualifiedName(Box<QualifiedName>),
    LocalizedText(Box<LocalizedText>),
    ExtensionObject(Box<ExtensionObject>),
    DataValue(Box<DataValue>),
    DiagnosticInfo(Box<DiagnosticInfo>),
    /// A decoded non-builtin value (unwrapped ExtensionObject).
    Struct(Box<StructValue>),
    Array(Box<VariantArray>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantArray {
    pub element_type: ElementType,
    pub values: Vec<Variant>,
    /// Row-major dimensions; when present their product must equal
    /// `values.len()`.
    pub dimensions: Option<Vec<u32>>,
}

impl VariantArray {
    pub fn new(element_type: ElementType, values: Vec<Variant>) -> VariantArray {
        VariantArray { element_type, values, dimensions: None }
    }

    pub fn with_dimensions(
        element_type: ElementType,
        values: Vec<Variant>,
        dimensions: Vec<u32>,
    ) -> VariantArray {
        VariantArray { element_type, values, dimensions: Some(dimensions) }
    }

    pub fn validate(&self) -> EncodingResult<()> {
        if let Some(dims) = &self.dimensions {
            let product: u64 = dims.iter().map(|&d| d as u64).product();
            if product != self.values.len() as u64 {
                return Err(Error::Encoding);
            }
        }
        Ok(())
    }
}

impl Variant {
    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    /// The builtin tag of a scalar value. `None` for Empty, decoded structs
    /// and arrays.
    pub fn scalar_type_id(&self) -> Option<BuiltinTypeId> {
        use BuiltinTypeId as T;
        Some(match self {
            Variant::Boolean(_) => T::Boolean,
            Variant::SByte(_) => T::SByte,
            Variant::Byte(_) => T::Byte,
            Variant::Int16(_) => T::Int16,
            Variant::UInt16(_) => T::UInt16,
            Variant::Int32(_) => T::Int32,
            Variant::UInt32(_) => T::UInt32,
            Variant::Int64(_) => T::Int64,
            Variant::UInt64(_) => T::UInt64,
            Variant::Float(_) => T::Float,
            Variant::Double(_) => T::Double,
            Variant::String(_) => T::String,
            Variant::DateTime(_) => T::DateTime,
            Variant::Guid(_) => T::Guid,
            Variant::ByteString(_) => T::ByteString,
            Variant::XmlElement(_) => T::XmlElement,
            Variant::NodeId(_) => T::NodeId,
            Variant::ExpandedNodeId(_) => T::ExpandedNodeId,
            Variant::StatusCode(_) => T::StatusCode,
            Variant::QualifiedName(_) => T::QualifiedName,
            Variant::LocalizedText(_) => T::LocalizedText,
            Variant::ExtensionObject(_) => T::ExtensionObject,
            Variant::DataValue(_) => T::DataValue,
            Variant::DiagnosticInfo(_) => T::DiagnosticInfo,
            Variant::Empty | Variant::Struct(_) | Variant::Array(_) => return None,
        })
    }

    pub fn array(element_type: ElementType, values: Vec<Variant>) -> Variant {
        Variant::Array(Box::new(VariantArray::new(element_type, values)))
    }

    pub fn matrix(
        element_type: ElementType,
        values: Vec<Variant>,
        dimensions: Vec<u32>,
    ) -> Variant {
        Variant::Array(Box::new(VariantArray::with_dimensions(
            element_type,
            values,
            dimensions,
        )))
    }
}

macro_rules! variant_from {
    ($($from:ty => $arm:ident),* $(,)?) => {
        $(
            impl From<$from> for Variant {
                fn from(value: $from) -> Self {
                    Variant::$arm(value)
                }
            }
        )*
    };
}

variant_from!(
    bool => Boolean,
    i8 => SByte,
    u8 => Byte,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
    UaString => String,
    DateTime => DateTime,
    Guid => Guid,
    StatusCode => StatusCode,
);

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(UaString::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_values() {
        assert_eq!(u8::from(BuiltinTypeId::Boolean), 1);
        assert_eq!(u8::from(BuiltinTypeId::UInt64), 9);
        assert_eq!(u8::from(BuiltinTypeId::DiagnosticInfo), 25);
        assert_eq!(BuiltinTypeId::try_from(24).unwrap(), BuiltinTypeId::Variant);
        assert!(BuiltinTypeId::try_from(0).is_err());
        assert!(BuiltinTypeId::try_from(26).is_err());
    }

    #[test]
    fn dimension_product() {
        let arr = VariantArray::with_dimensions(
            ElementType::Builtin(BuiltinTypeId::Int32),
            (0..6).map(Variant::Int32).collect(),
            vec![2, 3],
        );
        arr.validate().unwrap();

        let bad = VariantArray::with_dimensions(
            ElementType::Builtin(BuiltinTypeId::Int32),
            (0..6).map(Variant::Int32).collect(),
            vec![2, 4],
        );
        assert_eq!(bad.validate(), Err(Error::Encoding));
    }
}
