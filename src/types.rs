//! The owned value model for the 25 built-in types.
//!
//! Nullability on the wire maps onto `Option`: a `UaString(None)` is the
//! encoded null, `UaString(Some(""))` the empty-but-present string, and the
//! same for [`ByteString`]. Aggregates own their children exclusively; every
//! value is a tree and `Drop` releases partially decoded state.

pub mod datetime;
pub mod extension_object;
pub mod guid;
pub mod nodeid;
pub mod variant;

use serde::Serialize;

pub use datetime::DateTime;
pub use extension_object::{ExtensionObject, ExtensionObjectBody};
pub use guid::Guid;
pub use nodeid::{ExpandedNodeId, Identifier, NodeId};
pub use variant::{BuiltinTypeId, ElementType, Variant, VariantArray};

use crate::status::StatusCode;

/// Nullable UTF-8 string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct UaString(pub Option<String>);

impl UaString {
    pub fn null() -> UaString {
        UaString(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl From<&str> for UaString {
    fn from(value: &str) -> Self {
        UaString(Some(value.to_owned()))
    }
}

impl From<String> for UaString {
    fn from(value: String) -> Self {
        UaString(Some(value))
    }
}

/// Nullable byte sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ByteString(pub Option<Vec<u8>>);

impl ByteString {
    pub fn null() -> ByteString {
        ByteString(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.0.as_deref()
    }
}

impl From<&[u8]> for ByteString {
    fn from(value: &[u8]) -> Self {
        ByteString(Some(value.to_vec()))
    }
}

/// XML content is carried opaque, with the string wire form.
pub type XmlElement = UaString;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct QualifiedName {
    pub namespace_index: u16,
    pub name: UaString,
}

impl QualifiedName {
    pub fn new(namespace_index: u16, name: &str) -> QualifiedName {
        QualifiedName { namespace_index, name: UaString::from(name) }
    }
}

/// Locale and text, either nullable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct LocalizedText {
    pub locale: UaString,
    pub text: UaString,
}

impl LocalizedText {
    pub fn new(locale: &str, text: &str) -> LocalizedText {
        LocalizedText { locale: UaString::from(locale), text: UaString::from(text) }
    }
}

/// A Variant plus quality and timing, every field independently optional.
/// With all fields absent the whole value is the wire null.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataValue {
    pub value: Option<Variant>,
    pub status: Option<StatusCode>,
    pub source_timestamp: Option<DateTime>,
    pub server_timestamp: Option<DateTime>,
    pub source_picoseconds: Option<u16>,
    pub server_picoseconds: Option<u16>,
}

impl DataValue {
    pub fn of(value: Variant) -> DataValue {
        DataValue { value: Some(value), ..Default::default() }
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
            && self.status.is_none()
            && self.source_timestamp.is_none()
            && self.server_timestamp.is_none()
            && self.source_picoseconds.is_none()
            && self.server_picoseconds.is_none()
    }
}

/// Recursive diagnostic record. The four u32 fields index the string table
/// sent alongside in a service response; they are signed on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiagnosticInfo {
    pub symbolic_id: Option<i32>,
    pub namespace_uri: Option<i32>,
    pub localized_text: Option<i32>,
    pub locale: Option<i32>,
    pub additional_info: Option<UaString>,
    pub inner_status_code: Option<StatusCode>,
    pub inner_diagnostic_info: Option<Box<DiagnosticInfo>>,
}

impl DiagnosticInfo {
    pub fn is_null(&self) -> bool {
        self.symbolic_id.is_none()
            && self.namespace_uri.is_none()
            && self.localized_text.is_none()
            && self.locale.is_none()
            && self.additional_info.is_none()
            && self.inner_status_code.is_none()
            && self.inner_diagnostic_info.is_none()
    }

    /// Nesting depth of the inner chain, the root counting as one.
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut cur = self;
        while let Some(inner) = &cur.inner_diagnostic_info {
            depth += 1;
            cur = inner;
        }
        depth
    }
}
