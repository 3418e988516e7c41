use serde::Serialize;

use crate::descriptor::StructValue;
use crate::types::{ByteString, NodeId, XmlElement};

/// Carrier for a non-builtin value inside type-erased contexts (Variant,
/// DataValue). The body is either still encoded, or already decoded against
/// a known type descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtensionObject {
    pub type_id: NodeId,
    pub body: ExtensionObjectBody,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub enum ExtensionObjectBody {
    #[default]
    None,
    /// Opaque pre-encoded binary body.
    ByteString(ByteString),
    /// Opaque XML body, passed through uninterpreted.
    Xml(XmlElement),
    /// Decoded body; encoding requires the type to resolve in the descriptor
    /// table and its type id to be numeric.
    Decoded(StructValue),
}

impl ExtensionObject {
    pub fn encoded(type_id: NodeId, body: ByteString) -> ExtensionObject {
        ExtensionObject { type_id, body: ExtensionObjectBody::ByteString(body) }
    }

    pub fn decoded(value: StructValue) -> ExtensionObject {
        ExtensionObject { type_id: value.type_id.clone(), body: ExtensionObjectBody::Decoded(value) }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.body, ExtensionObjectBody::None)
    }
}
