use serde::Serialize;

use crate::types::{ByteString, Guid, UaString};

/// The four identifier kinds. The payload lives in the arm, so an identifier
/// value can never be read through the wrong discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Identifier {
    Numeric(u32),
    String(UaString),
    Guid(Guid),
    ByteString(ByteString),
}

impl Default for Identifier {
    fn default() -> Self {
        Identifier::Numeric(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: Identifier,
}

impl NodeId {
    pub fn numeric(namespace: u16, id: u32) -> NodeId {
        NodeId { namespace, identifier: Identifier::Numeric(id) }
    }

    pub fn string(namespace: u16, id: &str) -> NodeId {
        NodeId { namespace, identifier: Identifier::String(UaString::from(id)) }
    }

    /// The numeric id, if this is a ns-0 numeric NodeId. Type ids in the
    /// descriptor table and Variant wrapping use this form exclusively.
    pub fn as_numeric(&self) -> Option<u32> {
        match self.identifier {
            Identifier::Numeric(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        self.namespace == 0 && self.identifier == Identifier::Numeric(0)
    }
}

/// NodeId plus an optional namespace URI and server index. A receiver that
/// sees a URI ignores the numeric namespace index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ExpandedNodeId {
    pub node_id: NodeId,
    pub namespace_uri: UaString,
    pub server_index: u32,
}

impl ExpandedNodeId {
    pub fn local(node_id: NodeId) -> ExpandedNodeId {
        ExpandedNodeId { node_id, namespace_uri: UaString::null(), server_index: 0 }
    }
}
