//! Binary codec for the composite built-in types: QualifiedName,
//! LocalizedText, Variant (tag byte, arrays, dimensions, ExtensionObject
//! wrapping), ExtensionObject, DataValue and DiagnosticInfo.

use crate::binary::structured::{decode_struct, encode_struct, struct_byte_len};
use crate::binary::{BinaryDecodable, BinaryEncodable, DecodeCtx, EncodeCtx};
use crate::cursor::{ReadCursor, WriteCursor};
use crate::descriptor::StructValue;
use crate::status::StatusCode;
use crate::types::{
    BuiltinTypeId, ByteString, DataValue, DateTime, DiagnosticInfo, ElementType, ExpandedNodeId,
    ExtensionObject, ExtensionObjectBody, Guid, LocalizedText, NodeId, QualifiedName, UaString,
    Variant, VariantArray,
};
use crate::{EncodingResult, Error};

const VARIANT_ARRAY_FLAG: u8 = 0x80;
const VARIANT_DIMENSIONS_FLAG: u8 = 0x40;
const VARIANT_TYPE_MASK: u8 = 0x3F;

const EO_BODY_NONE: u8 = 0;
const EO_BODY_BYTESTRING: u8 = 1;
const EO_BODY_XML: u8 = 2;

const DV_HAS_VALUE: u8 = 0x01;
const DV_HAS_STATUS: u8 = 0x02;
const DV_HAS_SOURCE_TIMESTAMP: u8 = 0x04;
const DV_HAS_SERVER_TIMESTAMP: u8 = 0x08;
const DV_HAS_SOURCE_PICOSECONDS: u8 = 0x10;
const DV_HAS_SERVER_PICOSECONDS: u8 = 0x20;

const DI_HAS_SYMBOLIC_ID: u8 = 0x01;
const DI_HAS_NAMESPACE_URI: u8 = 0x02;
const DI_HAS_LOCALIZED_TEXT: u8 = 0x04;
const DI_HAS_LOCALE: u8 = 0x08;
const DI_HAS_ADDITIONAL_INFO: u8 = 0x10;
const DI_HAS_INNER_STATUS_CODE: u8 = 0x20;
const DI_HAS_INNER_DIAGNOSTIC_INFO: u8 = 0x40;

impl BinaryEncodable for QualifiedName {
    fn byte_len(&self, ctx: &EncodeCtx) -> usize {
        2 + self.name.byte_len(ctx)
    }

    fn encode_binary(&self, cur: &mut WriteCursor, ctx: &EncodeCtx) -> EncodingResult<()> {
        cur.write_u16(self.namespace_index)?;
        self.name.encode_binary(cur, ctx)
    }
}

impl BinaryDecodable for QualifiedName {
    fn decode_binary(cur: &mut ReadCursor, ctx: &DecodeCtx) -> EncodingResult<Self> {
        let namespace_index = cur.read_u16()?;
        let name = UaString::decode_binary(cur, ctx)?;
        Ok(QualifiedName { namespace_index, name })
    }
}

impl BinaryEncodable for LocalizedText {
    fn byte_len(&self, ctx: &EncodeCtx) -> usize {
        let mut len = 1;
        if !self.locale.is_null() {
            len += self.locale.byte_len(ctx);
        }
        if !self.text.is_null() {
            len += self.text.byte_len(ctx);
        }
        len
    }

    fn encode_binary(&self, cur: &mut WriteCursor, ctx: &EncodeCtx) -> EncodingResult<()> {
        let mut mask = 0u8;
        if !self.locale.is_null() {
            mask |= 0x01;
        }
        if !self.text.is_null() {
            mask |= 0x02;
        }
        cur.write_u8(mask)?;
        if !self.locale.is_null() {
            self.locale.encode_binary(cur, ctx)?;
        }
        if !self.text.is_null() {
            self.text.encode_binary(cur, ctx)?;
        }
        Ok(())
    }
}

impl BinaryDecodable for LocalizedText {
    fn decode_binary(cur: &mut ReadCursor, ctx: &DecodeCtx) -> EncodingResult<Self> {
        let mask = cur.read_u8()?;
        if mask & !0x03 != 0 {
            return Err(Error::Decoding);
        }
        let locale = if mask & 0x01 != 0 {
            UaString::decode_binary(cur, ctx)?
        } else {
            UaString(None)
        };
        let text = if mask & 0x02 != 0 {
            UaString::decode_binary(cur, ctx)?
        } else {
            UaString(None)
        };
        Ok(LocalizedText { locale, text })
    }
}

/// Size of one scalar payload of the given builtin type (no tag byte).
pub(crate) fn scalar_byte_len(ty: BuiltinTypeId, value: &Variant, ctx: &EncodeCtx) -> usize {
    use BuiltinTypeId as T;
    match (ty, value) {
        (T::Boolean, Variant::Boolean(_)) => 1,
        (T::SByte, Variant::SByte(_)) | (T::Byte, Variant::Byte(_)) => 1,
        (T::Int16, Variant::Int16(_)) | (T::UInt16, Variant::UInt16(_)) => 2,
        (T::Int32, Variant::Int32(_)) | (T::UInt32, Variant::UInt32(_)) => 4,
        (T::Int64, Variant::Int64(_)) | (T::UInt64, Variant::UInt64(_)) => 8,
        (T::Float, Variant::Float(_)) => 4,
        (T::Double, Variant::Double(_)) => 8,
        (T::String, Variant::String(v)) | (T::XmlElement, Variant::XmlElement(v)) => {
            v.byte_len(ctx)
        }
        (T::DateTime, Variant::DateTime(_)) => 8,
        (T::Guid, Variant::Guid(_)) => 16,
        (T::ByteString, Variant::ByteString(v)) => v.byte_len(ctx),
        (T::NodeId, Variant::NodeId(v)) => v.byte_len(ctx),
        (T::ExpandedNodeId, Variant::ExpandedNodeId(v)) => v.byte_len(ctx),
        (T::StatusCode, Variant::StatusCode(_)) => 4,
        (T::QualifiedName, Variant::QualifiedName(v)) => v.byte_len(ctx),
        (T::LocalizedText, Variant::LocalizedText(v)) => v.byte_len(ctx),
        (T::ExtensionObject, Variant::ExtensionObject(v)) => v.byte_len(ctx),
        (T::ExtensionObject, Variant::Struct(sv)) => wrapped_struct_len(sv, ctx),
        (T::DataValue, Variant::DataValue(v)) => v.byte_len(ctx),
        (T::DiagnosticInfo, Variant::DiagnosticInfo(v)) => v.byte_len(ctx),
        // a member or element of type Variant carries a complete variant
        (T::Variant, v) => v.byte_len(ctx),
        _ => 0,
    }
}

/// Encodes one scalar payload, checking the value arm against the expected
/// builtin type.
pub(crate) fn encode_scalar(
    ty: BuiltinTypeId,
    value: &Variant,
    cur: &mut WriteCursor,
    ctx: &EncodeCtx,
) -> EncodingResult<()> {
    use BuiltinTypeId as T;
    match (ty, value) {
        (T::Boolean, Variant::Boolean(v)) => v.encode_binary(cur, ctx),
        (T::SByte, Variant::SByte(v)) => v.encode_binary(cur, ctx),
        (T::Byte, Variant::Byte(v)) => v.encode_binary(cur, ctx),
        (T::Int16, Variant::Int16(v)) => v.encode_binary(cur, ctx),
        (T::UInt16, Variant::UInt16(v)) => v.encode_binary(cur, ctx),
        (T::Int32, Variant::Int32(v)) => v.encode_binary(cur, ctx),
        (T::UInt32, Variant::UInt32(v)) => v.encode_binary(cur, ctx),
        (T::Int64, Variant::Int64(v)) => v.encode_binary(cur, ctx),
        (T::UInt64, Variant::UInt64(v)) => v.encode_binary(cur, ctx),
        (T::Float, Variant::Float(v)) => v.encode_binary(cur, ctx),
        (T::Double, Variant::Double(v)) => v.encode_binary(cur, ctx),
        (T::String, Variant::String(v)) | (T::XmlElement, Variant::XmlElement(v)) => {
            v.encode_binary(cur, ctx)
        }
        (T::DateTime, Variant::DateTime(v)) => v.encode_binary(cur, ctx),
        (T::Guid, Variant::Guid(v)) => v.encode_binary(cur, ctx),
        (T::ByteString, Variant::ByteString(v)) => v.encode_binary(cur, ctx),
        (T::NodeId, Variant::NodeId(v)) => v.encode_binary(cur, ctx),
        (T::ExpandedNodeId, Variant::ExpandedNodeId(v)) => v.encode_binary(cur, ctx),
        (T::StatusCode, Variant::StatusCode(v)) => v.encode_binary(cur, ctx),
        (T::QualifiedName, Variant::QualifiedName(v)) => v.encode_binary(cur, ctx),
        (T::LocalizedText, Variant::LocalizedText(v)) => v.encode_binary(cur, ctx),
        (T::ExtensionObject, Variant::ExtensionObject(v)) => v.encode_binary(cur, ctx),
        (T::ExtensionObject, Variant::Struct(sv)) => encode_wrapped_struct(sv, cur, ctx),
        (T::DataValue, Variant::DataValue(v)) => v.encode_binary(cur, ctx),
        (T::DiagnosticInfo, Variant::DiagnosticInfo(v)) => v.encode_binary(cur, ctx),
        (T::Variant, v) => v.encode_binary(cur, ctx),
        _ => Err(Error::Encoding),
    }
}

/// Decodes one scalar payload of the given builtin type into its Variant
/// arm. ExtensionObjects are kept wrapped; the Variant decoder unwraps.
pub(crate) fn decode_scalar(
    ty: BuiltinTypeId,
    cur: &mut ReadCursor,
    ctx: &DecodeCtx,
) -> EncodingResult<Variant> {
    use BuiltinTypeId as T;
    Ok(match ty {
        T::Boolean => Variant::Boolean(bool::decode_binary(cur, ctx)?),
        T::SByte => Variant::SByte(cur.read_i8()?),
        T::Byte => Variant::Byte(cur.read_u8()?),
        T::Int16 => Variant::Int16(cur.read_i16()?),
        T::UInt16 => Variant::UInt16(cur.read_u16()?),
        T::Int32 => Variant::Int32(cur.read_i32()?),
        T::UInt32 => Variant::UInt32(cur.read_u32()?),
        T::Int64 => Variant::Int64(cur.read_i64()?),
        T::UInt64 => Variant::UInt64(cur.read_u64()?),
        T::Float => Variant::Float(cur.read_f32()?),
        T::Double => Variant::Double(cur.read_f64()?),
        T::String => Variant::String(UaString::decode_binary(cur, ctx)?),
        T::DateTime => Variant::DateTime(DateTime::decode_binary(cur, ctx)?),
        T::Guid => Variant::Guid(Guid::decode_binary(cur, ctx)?),
        T::ByteString => Variant::ByteString(ByteString::decode_binary(cur, ctx)?),
        T::XmlElement => Variant::XmlElement(UaString::decode_binary(cur, ctx)?),
        T::NodeId => Variant::NodeId(Box::new(NodeId::decode_binary(cur, ctx)?)),
        T::ExpandedNodeId => {
            Variant::ExpandedNodeId(Box::new(ExpandedNodeId::decode_binary(cur, ctx)?))
        }
        T::StatusCode => Variant::StatusCode(StatusCode::decode_binary(cur, ctx)?),
        T::QualifiedName => {
            Variant::QualifiedName(Box::new(QualifiedName::decode_binary(cur, ctx)?))
        }
        T::LocalizedText => {
            Variant::LocalizedText(Box::new(LocalizedText::decode_binary(cur, ctx)?))
        }
        T::ExtensionObject => {
            Variant::ExtensionObject(Box::new(ExtensionObject::decode_binary(cur, ctx)?))
        }
        T::DataValue => Variant::DataValue(Box::new(DataValue::decode_binary(cur, ctx)?)),
        T::DiagnosticInfo => {
            Variant::DiagnosticInfo(Box::new(DiagnosticInfo::decode_binary(cur, ctx)?))
        }
        T::Variant => Variant::decode_binary(cur, ctx)?,
    })
}

fn wrapped_struct_len(value: &StructValue, ctx: &EncodeCtx) -> usize {
    value.type_id.byte_len(ctx) + 1 + 4 + struct_byte_len(value, ctx)
}

/// Wraps a decoded non-builtin value as an ExtensionObject: TypeId,
/// ByteString discriminant, pre-computed body length, body.
fn encode_wrapped_struct(
    value: &StructValue,
    cur: &mut WriteCursor,
    ctx: &EncodeCtx,
) -> EncodingResult<()> {
    if ctx.types.get(value.type_index).is_none() || value.type_id.as_numeric().is_none() {
        return Err(Error::Encoding);
    }
    value.type_id.encode_binary(cur, ctx)?;
    cur.write_u8(EO_BODY_BYTESTRING)?;
    let body_len = struct_byte_len(value, ctx);
    let body_len = i32::try_from(body_len).map_err(|_| Error::Encoding)?;
    cur.write_i32(body_len)?;
    let before = cur.pos();
    encode_struct(value, cur, ctx)?;
    debug_assert_eq!(cur.pos() - before, body_len as usize);
    Ok(())
}

impl BinaryEncodable for ExtensionObject {
    fn byte_len(&self, ctx: &EncodeCtx) -> usize {
        match &self.body {
            ExtensionObjectBody::None => self.type_id.byte_len(ctx) + 1,
            ExtensionObjectBody::ByteString(b) => self.type_id.byte_len(ctx) + 1 + b.byte_len(ctx),
            ExtensionObjectBody::Xml(x) => self.type_id.byte_len(ctx) + 1 + x.byte_len(ctx),
            ExtensionObjectBody::Decoded(sv) => wrapped_struct_len(sv, ctx),
        }
    }

    fn encode_binary(&self, cur: &mut WriteCursor, ctx: &EncodeCtx) -> EncodingResult<()> {
        match &self.body {
            ExtensionObjectBody::None => {
                self.type_id.encode_binary(cur, ctx)?;
                cur.write_u8(EO_BODY_NONE)
            }
            ExtensionObjectBody::ByteString(b) => {
                self.type_id.encode_binary(cur, ctx)?;
                cur.write_u8(EO_BODY_BYTESTRING)?;
                b.encode_binary(cur, ctx)
            }
            ExtensionObjectBody::Xml(x) => {
                self.type_id.encode_binary(cur, ctx)?;
                cur.write_u8(EO_BODY_XML)?;
                x.encode_binary(cur, ctx)
            }
            ExtensionObjectBody::Decoded(sv) => encode_wrapped_struct(sv, cur, ctx),
        }
    }
}

impl BinaryDecodable for ExtensionObject {
    fn decode_binary(cur: &mut ReadCursor, ctx: &DecodeCtx) -> EncodingResult<Self> {
        let type_id = NodeId::decode_binary(cur, ctx)?;
        let body = match cur.read_u8()? {
            EO_BODY_NONE => ExtensionObjectBody::None,
            EO_BODY_BYTESTRING => {
                ExtensionObjectBody::ByteString(ByteString::decode_binary(cur, ctx)?)
            }
            EO_BODY_XML => ExtensionObjectBody::Xml(UaString::decode_binary(cur, ctx)?),
            other => {
                log::debug!("unknown ExtensionObject encoding {other}");
                return Err(Error::Decoding);
            }
        };
        Ok(ExtensionObject { type_id, body })
    }
}

/// Variant-context unwrap: an encoded ExtensionObject whose TypeId resolves
/// against the descriptor table becomes a typed value; anything else stays
/// wrapped.
fn try_unwrap(eo: ExtensionObject, ctx: &DecodeCtx) -> EncodingResult<Variant> {
    let known = ctx.types.find(&eo.type_id).map(|(idx, _)| idx);
    match (known, &eo.body) {
        (Some(type_index), ExtensionObjectBody::ByteString(ByteString(Some(bytes)))) => {
            let mut body = ReadCursor::new(bytes);
            let sv = decode_struct(&mut body, ctx, type_index)?;
            if !body.is_empty() {
                return Err(Error::Decoding);
            }
            Ok(Variant::Struct(Box::new(sv)))
        }
        _ => Ok(Variant::ExtensionObject(Box::new(eo))),
    }
}

fn element_byte_len(element_type: &ElementType, value: &Variant, ctx: &EncodeCtx) -> usize {
    match element_type {
        ElementType::Builtin(ty) => scalar_byte_len(*ty, value, ctx),
        ElementType::Structured(_) => match value {
            Variant::Struct(sv) => wrapped_struct_len(sv, ctx),
            _ => 0,
        },
    }
}

fn encode_element(
    element_type: &ElementType,
    value: &Variant,
    cur: &mut WriteCursor,
    ctx: &EncodeCtx,
) -> EncodingResult<()> {
    match element_type {
        ElementType::Builtin(ty) => encode_scalar(*ty, value, cur, ctx),
        ElementType::Structured(_) => match value {
            Variant::Struct(sv) => encode_wrapped_struct(sv, cur, ctx),
            _ => Err(Error::Encoding),
        },
    }
}

fn array_byte_len(arr: &VariantArray, ctx: &EncodeCtx) -> usize {
    let mut len = 4;
    for value in &arr.values {
        len += element_byte_len(&arr.element_type, value, ctx);
    }
    if let Some(dims) = &arr.dimensions {
        len += 4 + 4 * dims.len();
    }
    len
}

impl BinaryEncodable for Variant {
    fn byte_len(&self, ctx: &EncodeCtx) -> usize {
        match self {
            Variant::Empty => 1,
            Variant::Struct(sv) => 1 + wrapped_struct_len(sv, ctx),
            Variant::Array(arr) => 1 + array_byte_len(arr, ctx),
            scalar => {
                let ty = scalar.scalar_type_id().expect("scalar arm");
                1 + scalar_byte_len(ty, scalar, ctx)
            }
        }
    }

    fn encode_binary(&self, cur: &mut WriteCursor, ctx: &EncodeCtx) -> EncodingResult<()> {
        match self {
            Variant::Empty => cur.write_u8(0),
            Variant::Struct(sv) => {
                cur.write_u8(BuiltinTypeId::ExtensionObject.into())?;
                cur.descend()?;
                let out = encode_wrapped_struct(sv, cur, ctx);
                cur.ascend();
                out
            }
            Variant::Array(arr) => {
                arr.validate()?;
                let type_bits: u8 = match &arr.element_type {
                    ElementType::Builtin(ty) => (*ty).into(),
                    ElementType::Structured(_) => BuiltinTypeId::ExtensionObject.into(),
                };
                let mut tag = type_bits | VARIANT_ARRAY_FLAG;
                if arr.dimensions.is_some() {
                    tag |= VARIANT_DIMENSIONS_FLAG;
                }
                cur.write_u8(tag)?;
                let len = i32::try_from(arr.values.len()).map_err(|_| Error::Encoding)?;
                cur.write_i32(len)?;
                cur.descend()?;
                for value in &arr.values {
                    if let Err(e) = encode_element(&arr.element_type, value, cur, ctx) {
                        cur.ascend();
                        return Err(e);
                    }
                }
                cur.ascend();
                if let Some(dims) = &arr.dimensions {
                    let count = i32::try_from(dims.len()).map_err(|_| Error::Encoding)?;
                    cur.write_i32(count)?;
                    for &dim in dims {
                        cur.write_i32(dim as i32)?;
                    }
                }
                Ok(())
            }
            scalar => {
                let ty = scalar.scalar_type_id().ok_or(Error::Encoding)?;
                cur.write_u8(ty.into())?;
                cur.descend()?;
                let out = encode_scalar(ty, scalar, cur, ctx);
                cur.ascend();
                out
            }
        }
    }
}

impl BinaryDecodable for Variant {
    fn decode_binary(cur: &mut ReadCursor, ctx: &DecodeCtx) -> EncodingResult<Self> {
        let tag = cur.read_u8()?;
        if tag == 0 {
            return Ok(Variant::Empty);
        }
        let ty = BuiltinTypeId::try_from(tag & VARIANT_TYPE_MASK).map_err(|_| Error::Decoding)?;
        let is_array = tag & VARIANT_ARRAY_FLAG != 0;
        let has_dimensions = tag & VARIANT_DIMENSIONS_FLAG != 0;
        if has_dimensions && !is_array {
            return Err(Error::Decoding);
        }

        if !is_array {
            // a Variant scalar cannot contain a Variant
            if ty == BuiltinTypeId::Variant {
                return Err(Error::Decoding);
            }
            cur.descend()?;
            let value = decode_scalar(ty, cur, ctx);
            cur.ascend();
            return match value? {
                Variant::ExtensionObject(eo) => try_unwrap(*eo, ctx),
                value => Ok(value),
            };
        }

        let len = cur.read_i32()?;
        if len < -1 {
            return Err(Error::Decoding);
        }
        let len = len.max(0) as usize;
        // each element takes at least one byte, so the prefix bounds the
        // allocation
        if len > cur.remaining() {
            return Err(Error::Decoding);
        }
        let mut values = Vec::with_capacity(len);
        cur.descend()?;
        for _ in 0..len {
            let value = match decode_scalar(ty, cur, ctx) {
                Ok(v) => v,
                Err(e) => {
                    cur.ascend();
                    return Err(e);
                }
            };
            values.push(value);
        }
        cur.ascend();

        // unwrap a homogeneous array of known ExtensionObjects
        let mut element_type = ElementType::Builtin(ty);
        if ty == BuiltinTypeId::ExtensionObject && !values.is_empty() {
            let mut unwrapped = Vec::with_capacity(values.len());
            let mut struct_type: Option<NodeId> = None;
            let mut uniform = true;
            for value in &values {
                let Variant::ExtensionObject(eo) = value else {
                    uniform = false;
                    break;
                };
                match try_unwrap((**eo).clone(), ctx)? {
                    Variant::Struct(sv) => {
                        match &struct_type {
                            None => struct_type = Some(sv.type_id.clone()),
                            Some(id) if *id == sv.type_id => {}
                            Some(_) => {
                                uniform = false;
                                break;
                            }
                        }
                        unwrapped.push(Variant::Struct(sv));
                    }
                    _ => {
                        uniform = false;
                        break;
                    }
                }
            }
            if uniform {
                if let Some(id) = struct_type {
                    element_type = ElementType::Structured(id);
                    values = unwrapped;
                }
            }
        }

        let dimensions = if has_dimensions {
            let count = cur.read_i32()?;
            if count < 0 || count as usize > cur.remaining() / 4 {
                return Err(Error::Decoding);
            }
            let mut dims = Vec::with_capacity(count as usize);
            for _ in 0..count {
                dims.push(cur.read_i32()? as u32);
            }
            let product: u64 = dims.iter().map(|&d| d as u64).product();
            if product != len as u64 {
                return Err(Error::Decoding);
            }
            Some(dims)
        } else {
            None
        };

        Ok(Variant::Array(Box::new(VariantArray { element_type, values, dimensions })))
    }
}

impl BinaryEncodable for DataValue {
    fn byte_len(&self, ctx: &EncodeCtx) -> usize {
        let mut len = 1;
        if let Some(v) = &self.value {
            len += v.byte_len(ctx);
        }
        if self.status.is_some() {
            len += 4;
        }
        if self.source_timestamp.is_some() {
            len += 8;
        }
        if self.source_picoseconds.is_some() {
            len += 2;
        }
        if self.server_timestamp.is_some() {
            len += 8;
        }
        if self.server_picoseconds.is_some() {
            len += 2;
        }
        len
    }

    fn encode_binary(&self, cur: &mut WriteCursor, ctx: &EncodeCtx) -> EncodingResult<()> {
        let mut mask = 0u8;
        if self.value.is_some() {
            mask |= DV_HAS_VALUE;
        }
        if self.status.is_some() {
            mask |= DV_HAS_STATUS;
        }
        if self.source_timestamp.is_some() {
            mask |= DV_HAS_SOURCE_TIMESTAMP;
        }
        if self.server_timestamp.is_some() {
            mask |= DV_HAS_SERVER_TIMESTAMP;
        }
        if self.source_picoseconds.is_some() {
            mask |= DV_HAS_SOURCE_PICOSECONDS;
        }
        if self.server_picoseconds.is_some() {
            mask |= DV_HAS_SERVER_PICOSECONDS;
        }
        cur.write_u8(mask)?;
        if let Some(v) = &self.value {
            cur.descend()?;
            let out = v.encode_binary(cur, ctx);
            cur.ascend();
            out?;
        }
        if let Some(s) = &self.status {
            s.encode_binary(cur, ctx)?;
        }
        if let Some(t) = &self.source_timestamp {
            t.encode_binary(cur, ctx)?;
        }
        if let Some(p) = &self.source_picoseconds {
            cur.write_u16(*p)?;
        }
        if let Some(t) = &self.server_timestamp {
            t.encode_binary(cur, ctx)?;
        }
        if let Some(p) = &self.server_picoseconds {
            cur.write_u16(*p)?;
        }
        Ok(())
    }
}

impl BinaryDecodable for DataValue {
    fn decode_binary(cur: &mut ReadCursor, ctx: &DecodeCtx) -> EncodingResult<Self> {
        let mask = cur.read_u8()?;
        if mask & 0xC0 != 0 {
            return Err(Error::Decoding);
        }
        let mut out = DataValue::default();
        if mask & DV_HAS_VALUE != 0 {
            cur.descend()?;
            let value = Variant::decode_binary(cur, ctx);
            cur.ascend();
            out.value = Some(value?);
        }
        if mask & DV_HAS_STATUS != 0 {
            out.status = Some(StatusCode::decode_binary(cur, ctx)?);
        }
        if mask & DV_HAS_SOURCE_TIMESTAMP != 0 {
            out.source_timestamp = Some(DateTime::decode_binary(cur, ctx)?);
        }
        if mask & DV_HAS_SOURCE_PICOSECONDS != 0 {
            out.source_picoseconds = Some(cur.read_u16()?);
        }
        if mask & DV_HAS_SERVER_TIMESTAMP != 0 {
            out.server_timestamp = Some(DateTime::decode_binary(cur, ctx)?);
        }
        if mask & DV_HAS_SERVER_PICOSECONDS != 0 {
            out.server_picoseconds = Some(cur.read_u16()?);
        }
        Ok(out)
    }
}

impl BinaryEncodable for DiagnosticInfo {
    fn byte_len(&self, ctx: &EncodeCtx) -> usize {
        let mut len = 1;
        len += [self.symbolic_id, self.namespace_uri, self.localized_text, self.locale]
            .iter()
            .flatten()
            .count()
            * 4;
        if let Some(info) = &self.additional_info {
            len += info.byte_len(ctx);
        }
        if self.inner_status_code.is_some() {
            len += 4;
        }
        if let Some(inner) = &self.inner_diagnostic_info {
            len += inner.byte_len(ctx);
        }
        len
    }

    fn encode_binary(&self, cur: &mut WriteCursor, ctx: &EncodeCtx) -> EncodingResult<()> {
        let mut mask = 0u8;
        if self.symbolic_id.is_some() {
            mask |= DI_HAS_SYMBOLIC_ID;
        }
        if self.namespace_uri.is_some() {
            mask |= DI_HAS_NAMESPACE_URI;
        }
        if self.localized_text.is_some() {
            mask |= DI_HAS_LOCALIZED_TEXT;
        }
        if self.locale.is_some() {
            mask |= DI_HAS_LOCALE;
        }
        if self.additional_info.is_some() {
            mask |= DI_HAS_ADDITIONAL_INFO;
        }
        if self.inner_status_code.is_some() {
            mask |= DI_HAS_INNER_STATUS_CODE;
        }
        if self.inner_diagnostic_info.is_some() {
            mask |= DI_HAS_INNER_DIAGNOSTIC_INFO;
        }
        cur.write_u8(mask)?;
        if let Some(v) = self.symbolic_id {
            cur.write_i32(v)?;
        }
        if let Some(v) = self.namespace_uri {
            cur.write_i32(v)?;
        }
        if let Some(v) = self.localized_text {
            cur.write_i32(v)?;
        }
        if let Some(v) = self.locale {
            cur.write_i32(v)?;
        }
        if let Some(info) = &self.additional_info {
            info.encode_binary(cur, ctx)?;
        }
        if let Some(code) = &self.inner_status_code {
            code.encode_binary(cur, ctx)?;
        }
        if let Some(inner) = &self.inner_diagnostic_info {
            cur.descend()?;
            let out = inner.encode_binary(cur, ctx);
            cur.ascend();
            out?;
        }
        Ok(())
    }
}

impl BinaryDecodable for DiagnosticInfo {
    fn decode_binary(cur: &mut ReadCursor, ctx: &DecodeCtx) -> EncodingResult<Self> {
        let mask = cur.read_u8()?;
        if mask & 0x80 != 0 {
            return Err(Error::Decoding);
        }
        let mut out = DiagnosticInfo::default();
        if mask & DI_HAS_SYMBOLIC_ID != 0 {
            out.symbolic_id = Some(cur.read_i32()?);
        }
        if mask & DI_HAS_NAMESPACE_URI != 0 {
            out.namespace_uri = Some(cur.read_i32()?);
        }
        if mask & DI_HAS_LOCALIZED_TEXT != 0 {
            out.localized_text = Some(cur.read_i32()?);
        }
        if mask & DI_HAS_LOCALE != 0 {
            out.locale = Some(cur.read_i32()?);
        }
        if mask & DI_HAS_ADDITIONAL_INFO != 0 {
            out.additional_info = Some(UaString::decode_binary(cur, ctx)?);
        }
        if mask & DI_HAS_INNER_STATUS_CODE != 0 {
            out.inner_status_code = Some(StatusCode::decode_binary(cur, ctx)?);
        }
        if mask & DI_HAS_INNER_DIAGNOSTIC_INFO != 0 {
            cur.descend()?;
            let inner = DiagnosticInfo::decode_binary(cur, ctx);
            cur.ascend();
            out.inner_diagnostic_info = Some(Box::new(inner?));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::{calc_size, decode, encode};
    use crate::descriptor::DataTypeTable;
    use crate::MAX_RECURSION_DEPTH;

    fn roundtrip<T>(value: &T) -> Vec<u8>
    where
        T: BinaryEncodable + BinaryDecodable + PartialEq + std::fmt::Debug,
    {
        let table = DataTypeTable::new();
        let ectx = EncodeCtx::new(&table);
        let dctx = DecodeCtx::new(&table);
        let mut buf = vec![0u8; 512];
        let written = encode(value, &ectx, &mut buf).unwrap();
        assert_eq!(calc_size(value, &ectx), written);
        let (back, end) = decode::<T>(&buf, 0, &dctx).unwrap();
        assert_eq!(&back, value);
        assert_eq!(end, written);
        buf.truncate(written);
        buf
    }

    #[test]
    fn variant_scalar_tag() {
        let bytes = roundtrip(&Variant::Byte(8));
        assert_eq!(bytes, [0x03, 0x08]);
        let bytes = roundtrip(&Variant::Int32(-1));
        assert_eq!(bytes, [0x06, 0xFF, 0xFF, 0xFF, 0xFF]);
        roundtrip(&Variant::Empty);
    }

    #[test]
    fn variant_array_with_dimensions() {
        let value = Variant::matrix(
            ElementType::Builtin(BuiltinTypeId::Byte),
            vec![Variant::Byte(1), Variant::Byte(2), Variant::Byte(3), Variant::Byte(4)],
            vec![2, 2],
        );
        let bytes = roundtrip(&value);
        assert_eq!(
            bytes,
            [
                0x03 | 0x80 | 0x40, // Byte, array, dimensions
                0x04, 0x00, 0x00, 0x00, // length
                1, 2, 3, 4, // elements
                0x02, 0x00, 0x00, 0x00, // dimension count
                0x02, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00,
            ]
        );
    }

    #[test]
    fn variant_of_variant_only_as_array() {
        let value = Variant::array(
            ElementType::Builtin(BuiltinTypeId::Variant),
            vec![Variant::Byte(1), Variant::Int64(-2)],
        );
        roundtrip(&value);

        // scalar variant-in-variant is rejected on decode
        let table = DataTypeTable::new();
        let dctx = DecodeCtx::new(&table);
        let buf = [24u8, 0x03, 0x08];
        assert_eq!(decode::<Variant>(&buf, 0, &dctx).unwrap_err(), Error::Decoding);
    }

    #[test]
    fn variant_dimension_mismatch_rejected() {
        let table = DataTypeTable::new();
        let dctx = DecodeCtx::new(&table);
        // 2 elements but dimensions claim 4
        let buf = [
            0x03 | 0x80 | 0x40,
            0x02, 0x00, 0x00, 0x00,
            1, 2,
            0x02, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00,
        ];
        assert_eq!(decode::<Variant>(&buf, 0, &dctx).unwrap_err(), Error::Decoding);
    }

    #[test]
    fn variant_array_length_bounded_by_input() {
        let table = DataTypeTable::new();
        let dctx = DecodeCtx::new(&table);
        let buf = [0x03 | 0x80, 0xFF, 0xFF, 0xFF, 0x7F, 1, 2];
        assert_eq!(decode::<Variant>(&buf, 0, &dctx).unwrap_err(), Error::Decoding);
    }

    #[test]
    fn extension_object_forms() {
        roundtrip(&ExtensionObject { type_id: NodeId::numeric(0, 77), body: ExtensionObjectBody::None });
        let eo = ExtensionObject::encoded(NodeId::numeric(1, 500), ByteString(Some(vec![1, 2, 3])));
        let bytes = roundtrip(&eo);
        assert_eq!(
            bytes,
            [
                0x01, 0x01, 0xF4, 0x01, // four-byte NodeId ns=1 id=500
                0x01, // bytestring body
                0x03, 0x00, 0x00, 0x00, 1, 2, 3,
            ]
        );
    }

    #[test]
    fn data_value_mask() {
        let value = DataValue {
            value: Some(Variant::UInt32(27)),
            status: Some(StatusCode::GOOD),
            source_timestamp: Some(DateTime(1000)),
            server_timestamp: None,
            source_picoseconds: None,
            server_picoseconds: Some(4),
        };
        let bytes = roundtrip(&value);
        assert_eq!(bytes[0], 0x01 | 0x02 | 0x04 | 0x20);
        roundtrip(&DataValue::default());
    }

    #[test]
    fn diagnostic_info_recursion_limit() {
        let mut value = DiagnosticInfo { symbolic_id: Some(1), ..Default::default() };
        for _ in 0..MAX_RECURSION_DEPTH - 1 {
            value = DiagnosticInfo {
                inner_diagnostic_info: Some(Box::new(value)),
                ..Default::default()
            };
        }
        // depth == limit: fits
        roundtrip(&value);

        // one level past the limit fails cleanly
        let too_deep = DiagnosticInfo {
            inner_diagnostic_info: Some(Box::new(value)),
            ..Default::default()
        };
        let table = DataTypeTable::new();
        let ectx = EncodeCtx::new(&table);
        let mut buf = vec![0u8; 512];
        assert_eq!(encode(&too_deep, &ectx, &mut buf), Err(Error::Encoding));
    }

    #[test]
    fn localized_text_null_fields() {
        roundtrip(&LocalizedText::new("en", "text"));
        roundtrip(&LocalizedText { locale: UaString(None), text: UaString::from("t") });
        let bytes = roundtrip(&LocalizedText::default());
        assert_eq!(bytes, [0x00]);
    }

    #[test]
    fn qualified_name() {
        let bytes = roundtrip(&QualifiedName::new(2, "x"));
        assert_eq!(bytes, [0x02, 0x00, 0x01, 0x00, 0x00, 0x00, b'x']);
    }
}
