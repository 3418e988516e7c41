//! JSON encoders for the built-in types, reversible and non-reversible.

use crate::descriptor::{FieldValue, MemberType, StructValue};
use crate::json::writer::JsonWriter;
use crate::json::{JsonCtx, JsonEncodable};
use crate::status::StatusCode;
use crate::types::{
    BuiltinTypeId, ByteString, DataValue, DateTime, DiagnosticInfo, ElementType, ExpandedNodeId,
    ExtensionObject, ExtensionObjectBody, Guid, Identifier, LocalizedText, NodeId, QualifiedName,
    UaString, Variant, VariantArray,
};
use crate::{EncodingResult, Error};

macro_rules! json_uint {
    ($($ty:ty),*) => {
        $(
            impl JsonEncodable for $ty {
                fn encode_json(&self, w: &mut JsonWriter, _ctx: &JsonCtx) -> EncodingResult<()> {
                    w.uint(*self as u64)
                }
            }
        )*
    };
}

macro_rules! json_int {
    ($($ty:ty),*) => {
        $(
            impl JsonEncodable for $ty {
                fn encode_json(&self, w: &mut JsonWriter, _ctx: &JsonCtx) -> EncodingResult<()> {
                    w.int(*self as i64)
                }
            }
        )*
    };
}

json_uint!(u8, u16, u32, u64);
json_int!(i8, i16, i32, i64);

impl JsonEncodable for bool {
    fn encode_json(&self, w: &mut JsonWriter, _ctx: &JsonCtx) -> EncodingResult<()> {
        w.bool(*self)
    }
}

impl JsonEncodable for f32 {
    fn encode_json(&self, w: &mut JsonWriter, _ctx: &JsonCtx) -> EncodingResult<()> {
        w.float32(*self)
    }
}

impl JsonEncodable for f64 {
    fn encode_json(&self, w: &mut JsonWriter, _ctx: &JsonCtx) -> EncodingResult<()> {
        w.float64(*self)
    }
}

impl JsonEncodable for UaString {
    fn encode_json(&self, w: &mut JsonWriter, _ctx: &JsonCtx) -> EncodingResult<()> {
        match self.as_str() {
            None => w.null(),
            Some(text) => w.string(text),
        }
    }
}

impl JsonEncodable for ByteString {
    fn encode_json(&self, w: &mut JsonWriter, _ctx: &JsonCtx) -> EncodingResult<()> {
        match self.as_bytes() {
            None => w.null(),
            Some(data) => w.base64(data),
        }
    }
}

impl JsonEncodable for Guid {
    fn encode_json(&self, w: &mut JsonWriter, _ctx: &JsonCtx) -> EncodingResult<()> {
        w.string(&self.to_canonical())
    }
}

impl JsonEncodable for DateTime {
    fn encode_json(&self, w: &mut JsonWriter, _ctx: &JsonCtx) -> EncodingResult<()> {
        w.string(&self.to_iso8601()?)
    }
}

impl JsonEncodable for StatusCode {
    fn encode_json(&self, w: &mut JsonWriter, ctx: &JsonCtx) -> EncodingResult<()> {
        if ctx.reversible {
            return w.uint(self.0 as u64);
        }
        // non-reversible: Good is treated like null, everything else gets
        // its symbolic name alongside the code
        if self.0 == 0 {
            return w.null();
        }
        w.obj_begin()?;
        w.key("Code", false)?;
        w.uint(self.0 as u64)?;
        w.key("Symbol", true)?;
        self.encode_symbol(w)?;
        w.obj_end()
    }
}

impl StatusCode {
    #[cfg(feature = "status-names")]
    fn encode_symbol(&self, w: &mut JsonWriter) -> EncodingResult<()> {
        w.string(self.name())
    }

    #[cfg(not(feature = "status-names"))]
    fn encode_symbol(&self, _w: &mut JsonWriter) -> EncodingResult<()> {
        Err(Error::NotSupported)
    }
}

/// NodeId body fields: Id plus IdType for the non-numeric kinds.
fn encode_node_id_body(
    node_id: &NodeId,
    w: &mut JsonWriter,
    ctx: &JsonCtx,
) -> EncodingResult<()> {
    match &node_id.identifier {
        Identifier::Numeric(id) => {
            w.key("Id", false)?;
            w.uint(*id as u64)
        }
        Identifier::String(s) => {
            w.key("IdType", false)?;
            w.uint(1)?;
            w.key("Id", true)?;
            s.encode_json(w, ctx)
        }
        Identifier::Guid(g) => {
            w.key("IdType", false)?;
            w.uint(2)?;
            w.key("Id", true)?;
            g.encode_json(w, ctx)
        }
        Identifier::ByteString(b) => {
            w.key("IdType", false)?;
            w.uint(3)?;
            w.key("Id", true)?;
            b.encode_json(w, ctx)
        }
    }
}

/// Writes the Namespace key per the non-reversible substitution rules: index
/// 1 stays numeric, other indices resolve through the URI table and an
/// out-of-range index is `NotFound`.
fn encode_namespace_non_reversible(
    index: u16,
    w: &mut JsonWriter,
    ctx: &JsonCtx,
) -> EncodingResult<()> {
    w.key("Namespace", true)?;
    if index == 1 {
        return w.uint(index as u64);
    }
    match ctx.namespaces.get(index as usize) {
        Some(uri) => w.string(uri),
        None => Err(Error::NotFound),
    }
}

impl JsonEncodable for NodeId {
    fn encode_json(&self, w: &mut JsonWriter, ctx: &JsonCtx) -> EncodingResult<()> {
        w.obj_begin()?;
        encode_node_id_body(self, w, ctx)?;
        if ctx.reversible {
            if self.namespace > 0 {
                w.key("Namespace", true)?;
                w.uint(self.namespace as u64)?;
            }
        } else {
            encode_namespace_non_reversible(self.namespace, w, ctx)?;
        }
        w.obj_end()
    }
}

impl JsonEncodable for ExpandedNodeId {
    fn encode_json(&self, w: &mut JsonWriter, ctx: &JsonCtx) -> EncodingResult<()> {
        w.obj_begin()?;
        encode_node_id_body(&self.node_id, w, ctx)?;
        let has_uri = matches!(self.namespace_uri.as_str(), Some(uri) if !uri.is_empty());
        if ctx.reversible {
            if has_uri {
                w.key("Namespace", true)?;
                self.namespace_uri.encode_json(w, ctx)?;
            } else if self.node_id.namespace > 0 {
                w.key("Namespace", true)?;
                w.uint(self.node_id.namespace as u64)?;
            }
            if self.server_index > 0 {
                w.key("ServerUri", true)?;
                w.uint(self.server_index as u64)?;
            }
        } else {
            if has_uri {
                w.key("Namespace", true)?;
                self.namespace_uri.encode_json(w, ctx)?;
            } else {
                encode_namespace_non_reversible(self.node_id.namespace, w, ctx)?;
            }
            match ctx.server_uris.get(self.server_index as usize) {
                Some(uri) => {
                    w.key("ServerUri", true)?;
                    w.string(uri)?;
                }
                None => return Err(Error::NotFound),
            }
        }
        w.obj_end()
    }
}

impl JsonEncodable for QualifiedName {
    fn encode_json(&self, w: &mut JsonWriter, ctx: &JsonCtx) -> EncodingResult<()> {
        w.obj_begin()?;
        w.key("Name", false)?;
        self.name.encode_json(w, ctx)?;
        if ctx.reversible {
            if self.namespace_index != 0 {
                w.key("Uri", true)?;
                w.uint(self.namespace_index as u64)?;
            }
        } else {
            // index 1 and unknown URIs fall back to the number
            w.key("Uri", true)?;
            match ctx.namespaces.get(self.namespace_index as usize) {
                Some(uri) if self.namespace_index != 1 => w.string(uri)?,
                _ => w.uint(self.namespace_index as u64)?,
            }
        }
        w.obj_end()
    }
}

impl JsonEncodable for LocalizedText {
    fn encode_json(&self, w: &mut JsonWriter, ctx: &JsonCtx) -> EncodingResult<()> {
        if !ctx.reversible {
            // collapses to the text component
            return self.text.encode_json(w, ctx);
        }
        w.obj_begin()?;
        w.key("Locale", false)?;
        self.locale.encode_json(w, ctx)?;
        w.key("Text", true)?;
        self.text.encode_json(w, ctx)?;
        w.obj_end()
    }
}

impl JsonEncodable for ExtensionObject {
    fn encode_json(&self, w: &mut JsonWriter, ctx: &JsonCtx) -> EncodingResult<()> {
        match &self.body {
            ExtensionObjectBody::None => w.null(),
            ExtensionObjectBody::ByteString(data) => {
                w.obj_begin()?;
                let mut comma = false;
                if ctx.reversible {
                    w.key("TypeId", false)?;
                    self.type_id.encode_json(w, ctx)?;
                    w.key("Encoding", true)?;
                    w.uint(1)?;
                    comma = true;
                }
                w.key("Body", comma)?;
                data.encode_json(w, ctx)?;
                w.obj_end()
            }
            ExtensionObjectBody::Xml(xml) => {
                w.obj_begin()?;
                let mut comma = false;
                if ctx.reversible {
                    w.key("TypeId", false)?;
                    self.type_id.encode_json(w, ctx)?;
                    w.key("Encoding", true)?;
                    w.uint(2)?;
                    comma = true;
                }
                w.key("Body", comma)?;
                xml.encode_json(w, ctx)?;
                w.obj_end()
            }
            ExtensionObjectBody::Decoded(sv) => {
                if ctx.types.get(sv.type_index).is_none() || self.type_id.as_numeric().is_none() {
                    return Err(Error::Encoding);
                }
                w.obj_begin()?;
                if ctx.reversible {
                    w.key("TypeId", false)?;
                    self.type_id.encode_json(w, ctx)?;
                    // a structure body has Encoding 0, which is omitted
                    w.key("Body", true)?;
                } else {
                    w.key("Body", false)?;
                }
                sv.encode_json(w, ctx)?;
                w.obj_end()
            }
        }
    }
}

fn encode_wrapped_struct(
    sv: &StructValue,
    w: &mut JsonWriter,
    ctx: &JsonCtx,
) -> EncodingResult<()> {
    let eo = ExtensionObject {
        type_id: sv.type_id.clone(),
        body: ExtensionObjectBody::Decoded(sv.clone()),
    };
    eo.encode_json(w, ctx)
}

/// Encodes one scalar of the declared builtin type, checking the arm.
pub(crate) fn encode_scalar_variant(
    ty: BuiltinTypeId,
    value: &Variant,
    w: &mut JsonWriter,
    ctx: &JsonCtx,
) -> EncodingResult<()> {
    use BuiltinTypeId as T;
    match (ty, value) {
        (T::Boolean, Variant::Boolean(v)) => v.encode_json(w, ctx),
        (T::SByte, Variant::SByte(v)) => v.encode_json(w, ctx),
        (T::Byte, Variant::Byte(v)) => v.encode_json(w, ctx),
        (T::Int16, Variant::Int16(v)) => v.encode_json(w, ctx),
        (T::UInt16, Variant::UInt16(v)) => v.encode_json(w, ctx),
        (T::Int32, Variant::Int32(v)) => v.encode_json(w, ctx),
        (T::UInt32, Variant::UInt32(v)) => v.encode_json(w, ctx),
        (T::Int64, Variant::Int64(v)) => v.encode_json(w, ctx),
        (T::UInt64, Variant::UInt64(v)) => v.encode_json(w, ctx),
        (T::Float, Variant::Float(v)) => v.encode_json(w, ctx),
        (T::Double, Variant::Double(v)) => v.encode_json(w, ctx),
        (T::String, Variant::String(v)) | (T::XmlElement, Variant::XmlElement(v)) => {
            v.encode_json(w, ctx)
        }
        (T::DateTime, Variant::DateTime(v)) => v.encode_json(w, ctx),
        (T::Guid, Variant::Guid(v)) => v.encode_json(w, ctx),
        (T::ByteString, Variant::ByteString(v)) => v.encode_json(w, ctx),
        (T::NodeId, Variant::NodeId(v)) => v.encode_json(w, ctx),
        (T::ExpandedNodeId, Variant::ExpandedNodeId(v)) => v.encode_json(w, ctx),
        (T::StatusCode, Variant::StatusCode(v)) => v.encode_json(w, ctx),
        (T::QualifiedName, Variant::QualifiedName(v)) => v.encode_json(w, ctx),
        (T::LocalizedText, Variant::LocalizedText(v)) => v.encode_json(w, ctx),
        (T::ExtensionObject, Variant::ExtensionObject(v)) => v.encode_json(w, ctx),
        (T::ExtensionObject, Variant::Struct(sv)) => encode_wrapped_struct(sv, w, ctx),
        (T::DataValue, Variant::DataValue(v)) => v.encode_json(w, ctx),
        (T::DiagnosticInfo, Variant::DiagnosticInfo(v)) => v.encode_json(w, ctx),
        (T::Variant, v) => v.encode_json(w, ctx),
        _ => Err(Error::Encoding),
    }
}

fn encode_element(
    element_type: &ElementType,
    value: &Variant,
    w: &mut JsonWriter,
    ctx: &JsonCtx,
) -> EncodingResult<()> {
    match element_type {
        ElementType::Builtin(ty) => encode_scalar_variant(*ty, value, w, ctx),
        ElementType::Structured(_) => match value {
            Variant::Struct(sv) => encode_wrapped_struct(sv, w, ctx),
            _ => Err(Error::Encoding),
        },
    }
}

fn encode_flat_array(arr: &VariantArray, w: &mut JsonWriter, ctx: &JsonCtx) -> EncodingResult<()> {
    w.arr_begin()?;
    for (i, value) in arr.values.iter().enumerate() {
        w.comma(i > 0)?;
        encode_element(&arr.element_type, value, w, ctx)?;
    }
    w.arr_end()
}

/// Row-major matrix: one bracket pair per dimension, scalar elements at the
/// innermost level.
fn encode_matrix(
    arr: &VariantArray,
    dims: &[u32],
    dim_index: usize,
    value_index: &mut usize,
    w: &mut JsonWriter,
    ctx: &JsonCtx,
) -> EncodingResult<()> {
    w.descend()?;
    w.arr_begin()?;
    let count = dims[dim_index] as usize;
    for i in 0..count {
        w.comma(i > 0)?;
        if dim_index + 1 == dims.len() {
            let value = arr.values.get(*value_index).ok_or(Error::Encoding)?;
            encode_element(&arr.element_type, value, w, ctx)?;
            *value_index += 1;
        } else {
            encode_matrix(arr, dims, dim_index + 1, value_index, w, ctx)?;
        }
    }
    w.arr_end()?;
    w.ascend();
    Ok(())
}

impl JsonEncodable for Variant {
    fn encode_json(&self, w: &mut JsonWriter, ctx: &JsonCtx) -> EncodingResult<()> {
        if matches!(self, Variant::Empty) {
            return w.null();
        }
        if ctx.reversible {
            return self.encode_reversible(w, ctx);
        }
        self.encode_non_reversible(w, ctx)
    }
}

impl Variant {
    fn type_tag(&self) -> EncodingResult<u8> {
        Ok(match self {
            Variant::Struct(_) => BuiltinTypeId::ExtensionObject.into(),
            Variant::Array(arr) => match &arr.element_type {
                ElementType::Builtin(ty) => (*ty).into(),
                ElementType::Structured(_) => BuiltinTypeId::ExtensionObject.into(),
            },
            scalar => scalar.scalar_type_id().ok_or(Error::Encoding)?.into(),
        })
    }

    fn encode_reversible(&self, w: &mut JsonWriter, ctx: &JsonCtx) -> EncodingResult<()> {
        w.obj_begin()?;
        w.key("Type", false)?;
        w.uint(self.type_tag()? as u64)?;
        w.key("Body", true)?;
        match self {
            Variant::Struct(sv) => encode_wrapped_struct(sv, w, ctx)?,
            Variant::Array(arr) => {
                arr.validate()?;
                encode_flat_array(arr, w, ctx)?;
                if let Some(dims) = &arr.dimensions {
                    w.key("Dimension", true)?;
                    w.arr_begin()?;
                    for (i, dim) in dims.iter().enumerate() {
                        w.comma(i > 0)?;
                        w.uint(*dim as u64)?;
                    }
                    w.arr_end()?;
                }
            }
            scalar => {
                let ty = scalar.scalar_type_id().ok_or(Error::Encoding)?;
                encode_scalar_variant(ty, scalar, w, ctx)?;
            }
        }
        w.obj_end()
    }

    fn encode_non_reversible(&self, w: &mut JsonWriter, ctx: &JsonCtx) -> EncodingResult<()> {
        match self {
            Variant::Array(arr) if arr.dimensions.as_ref().is_some_and(|d| d.len() > 1) => {
                arr.validate()?;
                if matches!(arr.element_type, ElementType::Structured(_)) {
                    return Err(Error::NotImplemented);
                }
                // a matrix drops the Body wrapper entirely
                let dims = arr.dimensions.as_ref().unwrap();
                let mut value_index = 0;
                encode_matrix(arr, dims, 0, &mut value_index, w, ctx)
            }
            Variant::Array(arr) => {
                arr.validate()?;
                w.obj_begin()?;
                w.key("Body", false)?;
                encode_flat_array(arr, w, ctx)?;
                w.obj_end()
            }
            Variant::Struct(sv) => {
                w.obj_begin()?;
                w.key("Body", false)?;
                encode_wrapped_struct(sv, w, ctx)?;
                w.obj_end()
            }
            scalar => {
                let ty = scalar.scalar_type_id().ok_or(Error::Encoding)?;
                w.obj_begin()?;
                w.key("Body", false)?;
                encode_scalar_variant(ty, scalar, w, ctx)?;
                w.obj_end()
            }
        }
    }
}

impl JsonEncodable for DataValue {
    fn encode_json(&self, w: &mut JsonWriter, ctx: &JsonCtx) -> EncodingResult<()> {
        if self.is_null() {
            return w.null();
        }
        w.obj_begin()?;
        let mut comma = false;
        if let Some(value) = &self.value {
            w.key("Value", comma)?;
            value.encode_json(w, ctx)?;
            comma = true;
        }
        if let Some(status) = &self.status {
            w.key("Status", comma)?;
            status.encode_json(w, ctx)?;
            comma = true;
        }
        if let Some(ts) = &self.source_timestamp {
            w.key("SourceTimestamp", comma)?;
            ts.encode_json(w, ctx)?;
            comma = true;
        }
        if let Some(ps) = &self.source_picoseconds {
            w.key("SourcePicoseconds", comma)?;
            w.uint(*ps as u64)?;
            comma = true;
        }
        if let Some(ts) = &self.server_timestamp {
            w.key("ServerTimestamp", comma)?;
            ts.encode_json(w, ctx)?;
            comma = true;
        }
        if let Some(ps) = &self.server_picoseconds {
            w.key("ServerPicoseconds", comma)?;
            w.uint(*ps as u64)?;
        }
        w.obj_end()
    }
}

impl JsonEncodable for DiagnosticInfo {
    fn encode_json(&self, w: &mut JsonWriter, ctx: &JsonCtx) -> EncodingResult<()> {
        if self.is_null() {
            return w.null();
        }
        w.obj_begin()?;
        let mut comma = false;
        if let Some(v) = self.symbolic_id {
            w.key("SymbolicId", comma)?;
            w.int(v as i64)?;
            comma = true;
        }
        if let Some(v) = self.namespace_uri {
            w.key("NamespaceUri", comma)?;
            w.int(v as i64)?;
            comma = true;
        }
        if let Some(v) = self.localized_text {
            w.key("LocalizedText", comma)?;
            w.int(v as i64)?;
            comma = true;
        }
        if let Some(v) = self.locale {
            w.key("Locale", comma)?;
            w.int(v as i64)?;
            comma = true;
        }
        if let Some(info) = &self.additional_info {
            w.key("AdditionalInfo", comma)?;
            info.encode_json(w, ctx)?;
            comma = true;
        }
        if let Some(code) = &self.inner_status_code {
            w.key("InnerStatusCode", comma)?;
            code.encode_json(w, ctx)?;
            comma = true;
        }
        if let Some(inner) = &self.inner_diagnostic_info {
            w.key("InnerDiagnosticInfo", comma)?;
            w.descend()?;
            let out = inner.encode_json(w, ctx);
            w.ascend();
            out?;
        }
        w.obj_end()
    }
}

impl JsonEncodable for StructValue {
    fn encode_json(&self, w: &mut JsonWriter, ctx: &JsonCtx) -> EncodingResult<()> {
        let desc = ctx.types.get(self.type_index).ok_or(Error::Encoding)?;
        if desc.members.len() != self.fields.len() {
            return Err(Error::Encoding);
        }

        // single unnamed member: splice the value without an object wrapper
        if desc.members.len() == 1 && desc.members[0].name.is_empty() {
            let member = &desc.members[0];
            return encode_member(&self.fields[0], &member.member_type, member.is_array, w, ctx);
        }

        w.descend()?;
        let out = (|| {
            w.obj_begin()?;
            let mut comma = false;
            for (member, field) in desc.members.iter().zip(&self.fields) {
                if member.name.is_empty() {
                    return Err(Error::Encoding);
                }
                w.key(&member.name, comma)?;
                comma = true;
                encode_member(field, &member.member_type, member.is_array, w, ctx)?;
            }
            w.obj_end()
        })();
        w.ascend();
        out
    }
}

fn encode_member(
    field: &FieldValue,
    member_type: &MemberType,
    is_array: bool,
    w: &mut JsonWriter,
    ctx: &JsonCtx,
) -> EncodingResult<()> {
    match (member_type, is_array, field) {
        (MemberType::Builtin(ty), false, FieldValue::Scalar(v)) => {
            encode_scalar_variant(*ty, v, w, ctx)
        }
        (MemberType::Builtin(ty), true, FieldValue::Array(values)) => match values {
            None => w.null(),
            Some(vs) => {
                w.arr_begin()?;
                for (i, v) in vs.iter().enumerate() {
                    w.comma(i > 0)?;
                    encode_scalar_variant(*ty, v, w, ctx)?;
                }
                w.arr_end()
            }
        },
        (MemberType::Structured(_), false, FieldValue::Struct(sv)) => sv.encode_json(w, ctx),
        (MemberType::Structured(_), true, FieldValue::StructArray(values)) => match values {
            None => w.null(),
            Some(vs) => {
                w.arr_begin()?;
                for (i, sv) in vs.iter().enumerate() {
                    w.comma(i > 0)?;
                    sv.encode_json(w, ctx)?;
                }
                w.arr_end()
            }
        },
        _ => Err(Error::Encoding),
    }
}
