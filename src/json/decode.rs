//! Token-walking JSON decoders.
//!
//! Every decoder consumes exactly the tokens of its value. Objects are
//! driven by [`TokenStream::walk_object`]: per-key dispatch with duplicate
//! detection, unknown keys stepped over by token counting, absent optional
//! fields left unset. [`TokenStream::find_key`] is the non-advancing
//! look-ahead used to discover type tags before committing to a body layout.

use base64::Engine;
use num_traits::NumCast;

use crate::descriptor::{FieldValue, MemberType, StructValue, TypeIndex};
use crate::json::tokenizer::{Token, TokenKind};
use crate::json::{JsonCtx, JsonDecodable};
use crate::status::StatusCode;
use crate::types::{
    BuiltinTypeId, ByteString, DataValue, DateTime, DiagnosticInfo, ElementType, ExpandedNodeId,
    ExtensionObject, ExtensionObjectBody, Guid, Identifier, LocalizedText, NodeId, QualifiedName,
    UaString, Variant, VariantArray,
};
use crate::{EncodingResult, Error, MAX_RECURSION_DEPTH};

pub struct TokenStream<'a> {
    input: &'a [u8],
    tokens: Vec<Token>,
    pub index: usize,
    depth: u8,
}

impl<'a> TokenStream<'a> {
    pub fn new(input: &'a [u8], tokens: Vec<Token>) -> Self {
        Self { input, tokens, index: 0, depth: 0 }
    }

    pub fn current(&self) -> EncodingResult<&Token> {
        self.tokens.get(self.index).ok_or(Error::Decoding)
    }

    pub fn kind(&self) -> EncodingResult<TokenKind> {
        Ok(self.current()?.kind)
    }

    fn token_text(&self, token: &Token) -> EncodingResult<&'a str> {
        let bytes = self.input.get(token.start..token.end).ok_or(Error::Decoding)?;
        std::str::from_utf8(bytes).map_err(|_| Error::Decoding)
    }

    /// Raw text of the current string or primitive token.
    pub fn text(&self) -> EncodingResult<&'a str> {
        self.token_text(self.current()?)
    }

    /// Raw text of the token at `index`, for look-ahead results.
    pub fn text_at(&self, index: usize) -> EncodingResult<&'a str> {
        self.token_text(self.tokens.get(index).ok_or(Error::Decoding)?)
    }

    pub fn is_null(&self) -> bool {
        matches!(self.current(), Ok(t) if t.kind == TokenKind::Primitive
            && self.token_text(t) == Ok("null"))
    }

    pub fn advance(&mut self) {
        self.index += 1;
    }

    /// Steps over the current value, however deeply nested, by recursive
    /// token counting.
    pub fn skip_value(&mut self) -> EncodingResult<()> {
        self.index = self.skip_from(self.index)?;
        Ok(())
    }

    fn skip_from(&self, mut index: usize) -> EncodingResult<usize> {
        let mut remaining = 1usize;
        while remaining > 0 {
            let token = self.tokens.get(index).ok_or(Error::Decoding)?;
            index += 1;
            remaining -= 1;
            match token.kind {
                TokenKind::Object => remaining += 2 * token.size,
                TokenKind::Array => remaining += token.size,
                TokenKind::String | TokenKind::Primitive => {}
            }
        }
        Ok(index)
    }

    /// Searches the immediate keys of the current object without advancing;
    /// returns the token index of the matching value.
    pub fn find_key(&self, name: &str) -> EncodingResult<Option<usize>> {
        let object = self.current()?;
        if object.kind != TokenKind::Object {
            return Err(Error::Decoding);
        }
        let mut idx = self.index + 1;
        for _ in 0..object.size {
            let key = self.tokens.get(idx).ok_or(Error::Decoding)?;
            if key.kind != TokenKind::String {
                return Err(Error::Decoding);
            }
            if self.token_text(key)? == name {
                return Ok(Some(idx + 1));
            }
            idx = self.skip_from(idx + 1)?;
        }
        Ok(None)
    }

    /// Drives the field resolver over the current object. The callback
    /// returns `true` after consuming the value of a recognized key (it must
    /// leave the stream past that value); on `false` the value is skipped.
    pub fn walk_object(
        &mut self,
        mut field: impl FnMut(&mut TokenStream<'a>, &'a str) -> EncodingResult<bool>,
    ) -> EncodingResult<()> {
        let object = self.current()?;
        if object.kind != TokenKind::Object {
            return Err(Error::Decoding);
        }
        let pairs = object.size;
        self.advance();
        for _ in 0..pairs {
            let key_token = *self.current()?;
            if key_token.kind != TokenKind::String {
                return Err(Error::Decoding);
            }
            let key = self.token_text(&key_token)?;
            self.advance();
            if !field(self, key)? {
                self.skip_value()?;
            }
        }
        Ok(())
    }

    pub fn descend(&mut self) -> EncodingResult<()> {
        if self.depth >= MAX_RECURSION_DEPTH - 1 {
            return Err(Error::Decoding);
        }
        self.depth += 1;
        Ok(())
    }

    pub fn ascend(&mut self) {
        self.depth -= 1;
    }
}

/// Duplicate-key bookkeeping of the field resolver.
pub(crate) struct FieldSeen<const N: usize> {
    seen: [bool; N],
}

impl<const N: usize> FieldSeen<N> {
    pub fn new() -> Self {
        Self { seen: [false; N] }
    }

    pub fn mark(&mut self, index: usize) -> EncodingResult<()> {
        if self.seen[index] {
            log::debug!("duplicate key in object");
            return Err(Error::Decoding);
        }
        self.seen[index] = true;
        Ok(())
    }
}

fn parse_u64(text: &str) -> EncodingResult<u64> {
    // `+`, blanks and anything non-decimal is rejected
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::Decoding);
    }
    text.parse().map_err(|_| Error::Decoding)
}

fn parse_i64(text: &str) -> EncodingResult<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = parse_u64(digits)?;
    if negative {
        if magnitude > i64::MIN.unsigned_abs() {
            return Err(Error::Decoding);
        }
        Ok((magnitude as i64).wrapping_neg())
    } else {
        i64::try_from(magnitude).map_err(|_| Error::Decoding)
    }
}

macro_rules! json_uint {
    ($($ty:ty),*) => {
        $(
            impl JsonDecodable for $ty {
                fn decode_json(stream: &mut TokenStream, _ctx: &JsonCtx) -> EncodingResult<Self> {
                    if stream.kind()? != TokenKind::Primitive {
                        return Err(Error::Decoding);
                    }
                    let v = parse_u64(stream.text()?)?;
                    stream.advance();
                    NumCast::from(v).ok_or(Error::Decoding)
                }
            }
        )*
    };
}

macro_rules! json_int {
    ($($ty:ty),*) => {
        $(
            impl JsonDecodable for $ty {
                fn decode_json(stream: &mut TokenStream, _ctx: &JsonCtx) -> EncodingResult<Self> {
                    if stream.kind()? != TokenKind::Primitive {
                        return Err(Error::Decoding);
                    }
                    let v = parse_i64(stream.text()?)?;
                    stream.advance();
                    NumCast::from(v).ok_or(Error::Decoding)
                }
            }
        )*
    };
}

json_uint!(u8, u16, u32, u64);
json_int!(i8, i16, i32, i64);

impl JsonDecodable for bool {
    fn decode_json(stream: &mut TokenStream, _ctx: &JsonCtx) -> EncodingResult<Self> {
        if stream.kind()? != TokenKind::Primitive {
            return Err(Error::Decoding);
        }
        let out = match stream.text()? {
            "true" => true,
            "false" => false,
            _ => return Err(Error::Decoding),
        };
        stream.advance();
        Ok(out)
    }
}

fn decode_float(stream: &mut TokenStream) -> EncodingResult<f64> {
    let token = stream.current()?;
    let text = stream.text()?;
    let out = match token.kind {
        // the quoted forms: "NaN", "Infinity", "-Infinity", any case
        TokenKind::String | TokenKind::Primitive => {
            text.parse::<f64>().map_err(|_| Error::Decoding)?
        }
        _ => return Err(Error::Decoding),
    };
    stream.advance();
    Ok(out)
}

impl JsonDecodable for f64 {
    fn decode_json(stream: &mut TokenStream, _ctx: &JsonCtx) -> EncodingResult<Self> {
        decode_float(stream)
    }
}

impl JsonDecodable for f32 {
    fn decode_json(stream: &mut TokenStream, _ctx: &JsonCtx) -> EncodingResult<Self> {
        Ok(decode_float(stream)? as f32)
    }
}

/// Resolves escapes into freshly allocated UTF-8, enforcing surrogate
/// pairing for `\u` escapes.
fn unescape(text: &str) -> EncodingResult<String> {
    let bytes = text.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let esc = *bytes.get(i + 1).ok_or(Error::Decoding)?;
        i += 2;
        let c: char = match esc {
            b'"' => '"',
            b'\\' => '\\',
            b'/' => '/',
            b'b' => '\x08',
            b'f' => '\x0C',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'u' => {
                let lead = parse_hex4(bytes, i)?;
                i += 4;
                match lead {
                    0xD800..=0xDBFF => {
                        // a lead surrogate must be followed by its trail
                        if bytes.get(i) != Some(&b'\\') || bytes.get(i + 1) != Some(&b'u') {
                            return Err(Error::Decoding);
                        }
                        let trail = parse_hex4(bytes, i + 2)?;
                        if !(0xDC00..=0xDFFF).contains(&trail) {
                            return Err(Error::Decoding);
                        }
                        i += 6;
                        let v = 0x10000
                            + (((lead as u32 - 0xD800) << 10) | (trail as u32 - 0xDC00));
                        char::from_u32(v).ok_or(Error::Decoding)?
                    }
                    0xDC00..=0xDFFF => return Err(Error::Decoding),
                    v => char::from_u32(v as u32).ok_or(Error::Decoding)?,
                }
            }
            _ => return Err(Error::Decoding),
        };
        let mut utf8 = [0u8; 4];
        out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }
    String::from_utf8(out).map_err(|_| Error::Decoding)
}

fn parse_hex4(bytes: &[u8], at: usize) -> EncodingResult<u16> {
    let chunk = bytes.get(at..at + 4).ok_or(Error::Decoding)?;
    let text = std::str::from_utf8(chunk).map_err(|_| Error::Decoding)?;
    u16::from_str_radix(text, 16).map_err(|_| Error::Decoding)
}

impl JsonDecodable for UaString {
    fn decode_json(stream: &mut TokenStream, _ctx: &JsonCtx) -> EncodingResult<Self> {
        if stream.is_null() {
            stream.advance();
            return Ok(UaString(None));
        }
        if stream.kind()? != TokenKind::String {
            return Err(Error::Decoding);
        }
        let text = unescape(stream.text()?)?;
        stream.advance();
        Ok(UaString(Some(text)))
    }
}

impl JsonDecodable for ByteString {
    fn decode_json(stream: &mut TokenStream, _ctx: &JsonCtx) -> EncodingResult<Self> {
        if stream.is_null() {
            stream.advance();
            return Ok(ByteString(None));
        }
        if stream.kind()? != TokenKind::String {
            return Err(Error::Decoding);
        }
        let data = base64::engine::general_purpose::STANDARD
            .decode(stream.text()?)
            .map_err(|_| Error::Decoding)?;
        stream.advance();
        Ok(ByteString(Some(data)))
    }
}

impl JsonDecodable for Guid {
    fn decode_json(stream: &mut TokenStream, _ctx: &JsonCtx) -> EncodingResult<Self> {
        if stream.kind()? != TokenKind::String {
            return Err(Error::Decoding);
        }
        let guid = Guid::parse(stream.text()?)?;
        stream.advance();
        Ok(guid)
    }
}

impl JsonDecodable for DateTime {
    fn decode_json(stream: &mut TokenStream, _ctx: &JsonCtx) -> EncodingResult<Self> {
        if stream.kind()? != TokenKind::String {
            return Err(Error::Decoding);
        }
        let dt = DateTime::parse_iso8601(stream.text()?)?;
        stream.advance();
        Ok(dt)
    }
}

impl JsonDecodable for StatusCode {
    fn decode_json(stream: &mut TokenStream, ctx: &JsonCtx) -> EncodingResult<Self> {
        Ok(StatusCode(u32::decode_json(stream, ctx)?))
    }
}

impl JsonDecodable for QualifiedName {
    fn decode_json(stream: &mut TokenStream, ctx: &JsonCtx) -> EncodingResult<Self> {
        let mut out = QualifiedName::default();
        let mut seen = FieldSeen::<2>::new();
        stream.walk_object(|s, key| match key {
            "Name" => {
                seen.mark(0)?;
                out.name = UaString::decode_json(s, ctx)?;
                Ok(true)
            }
            "Uri" => {
                seen.mark(1)?;
                out.namespace_index = u16::decode_json(s, ctx)?;
                Ok(true)
            }
            _ => Ok(false),
        })?;
        Ok(out)
    }
}

impl JsonDecodable for LocalizedText {
    fn decode_json(stream: &mut TokenStream, ctx: &JsonCtx) -> EncodingResult<Self> {
        if stream.is_null() {
            stream.advance();
            return Ok(LocalizedText::default());
        }
        let mut out = LocalizedText::default();
        let mut seen = FieldSeen::<2>::new();
        stream.walk_object(|s, key| match key {
            "Locale" => {
                seen.mark(0)?;
                out.locale = UaString::decode_json(s, ctx)?;
                Ok(true)
            }
            "Text" => {
                seen.mark(1)?;
                out.text = UaString::decode_json(s, ctx)?;
                Ok(true)
            }
            _ => Ok(false),
        })?;
        Ok(out)
    }
}

/// The IdType discriminant looked ahead before the Id field is decoded.
#[derive(Clone, Copy, PartialEq)]
enum IdKind {
    Numeric,
    String,
    Guid,
    ByteString,
}

fn look_ahead_id_kind(stream: &TokenStream) -> EncodingResult<IdKind> {
    let Some(value_idx) = stream.find_key("IdType")? else {
        return Ok(IdKind::Numeric);
    };
    let token = *stream.tokens.get(value_idx).ok_or(Error::Decoding)?;
    if token.kind != TokenKind::Primitive {
        return Err(Error::Decoding);
    }
    match stream.token_text(&token)? {
        "1" => Ok(IdKind::String),
        "2" => Ok(IdKind::Guid),
        "3" => Ok(IdKind::ByteString),
        _ => Err(Error::Decoding),
    }
}

/// Shared NodeId / ExpandedNodeId object decoder. For the expanded form a
/// string `Namespace` becomes the URI and `ServerUri` is accepted.
fn decode_node_id_object(
    stream: &mut TokenStream,
    ctx: &JsonCtx,
    expanded: bool,
) -> EncodingResult<ExpandedNodeId> {
    let kind = look_ahead_id_kind(stream)?;
    let mut out = ExpandedNodeId::default();
    let mut id_found = false;
    let mut seen = FieldSeen::<4>::new();
    stream.walk_object(|s, key| match key {
        "Id" => {
            seen.mark(0)?;
            id_found = true;
            out.node_id.identifier = match kind {
                IdKind::Numeric => Identifier::Numeric(u32::decode_json(s, ctx)?),
                IdKind::String => Identifier::String(UaString::decode_json(s, ctx)?),
                IdKind::Guid => Identifier::Guid(Guid::decode_json(s, ctx)?),
                IdKind::ByteString => Identifier::ByteString(ByteString::decode_json(s, ctx)?),
            };
            Ok(true)
        }
        "IdType" => {
            seen.mark(1)?;
            Ok(false) // validated by the look-ahead, step over
        }
        "Namespace" => {
            seen.mark(2)?;
            if expanded && s.kind()? == TokenKind::String {
                out.namespace_uri = UaString::decode_json(s, ctx)?;
            } else {
                out.node_id.namespace = u16::decode_json(s, ctx)?;
            }
            Ok(true)
        }
        "ServerUri" if expanded => {
            seen.mark(3)?;
            out.server_index = u32::decode_json(s, ctx)?;
            Ok(true)
        }
        _ => Ok(false),
    })?;
    if !id_found {
        return Err(Error::Decoding);
    }
    Ok(out)
}

impl JsonDecodable for NodeId {
    fn decode_json(stream: &mut TokenStream, ctx: &JsonCtx) -> EncodingResult<Self> {
        Ok(decode_node_id_object(stream, ctx, false)?.node_id)
    }
}

impl JsonDecodable for ExpandedNodeId {
    fn decode_json(stream: &mut TokenStream, ctx: &JsonCtx) -> EncodingResult<Self> {
        decode_node_id_object(stream, ctx, true)
    }
}

impl JsonDecodable for ExtensionObject {
    fn decode_json(stream: &mut TokenStream, ctx: &JsonCtx) -> EncodingResult<Self> {
        if stream.is_null() {
            stream.advance();
            return Ok(ExtensionObject::default());
        }
        let encoding = match stream.find_key("Encoding")? {
            None => 0,
            Some(idx) => {
                let token = *stream.tokens.get(idx).ok_or(Error::Decoding)?;
                parse_u64(stream.token_text(&token)?)?
            }
        };
        match encoding {
            0 => decode_struct_extension_object(stream, ctx),
            1 | 2 => {
                let mut out = ExtensionObject::default();
                let mut seen = FieldSeen::<3>::new();
                stream.walk_object(|s, key| match key {
                    "TypeId" => {
                        seen.mark(0)?;
                        out.type_id = NodeId::decode_json(s, ctx)?;
                        Ok(true)
                    }
                    "Encoding" => {
                        seen.mark(1)?;
                        Ok(false)
                    }
                    "Body" => {
                        seen.mark(2)?;
                        out.body = if encoding == 1 {
                            ExtensionObjectBody::ByteString(ByteString::decode_json(s, ctx)?)
                        } else {
                            ExtensionObjectBody::Xml(UaString::decode_json(s, ctx)?)
                        };
                        Ok(true)
                    }
                    _ => Ok(false),
                })?;
                Ok(out)
            }
            _ => Err(Error::Decoding),
        }
    }
}

/// Structure-encoded ExtensionObject: the TypeId must resolve against the
/// descriptor table before the Body layout is known.
fn decode_struct_extension_object(
    stream: &mut TokenStream,
    ctx: &JsonCtx,
) -> EncodingResult<ExtensionObject> {
    let Some(type_idx) = stream.find_key("TypeId")? else {
        return Err(Error::Decoding);
    };
    // decode the TypeId out of line, restore, then walk the object in order
    let saved = stream.index;
    stream.index = type_idx;
    let type_id = NodeId::decode_json(stream, ctx);
    stream.index = saved;
    let type_id = type_id?;
    let Some((type_index, _)) = ctx.types.find(&type_id) else {
        log::debug!("no descriptor for extension object type");
        return Err(Error::NotImplemented);
    };

    let mut seen = FieldSeen::<2>::new();
    let mut body = None;
    stream.walk_object(|s, key| match key {
        "TypeId" => {
            seen.mark(0)?;
            Ok(false)
        }
        "Body" => {
            seen.mark(1)?;
            body = Some(decode_struct_value(s, ctx, type_index)?);
            Ok(true)
        }
        _ => Ok(false),
    })?;
    let body = body.ok_or(Error::Decoding)?;
    Ok(ExtensionObject { type_id, body: ExtensionObjectBody::Decoded(body) })
}

/// Descriptor-driven object decoder for structured values.
pub(crate) fn decode_struct_value(
    stream: &mut TokenStream,
    ctx: &JsonCtx,
    type_index: TypeIndex,
) -> EncodingResult<StructValue> {
    stream.descend()?;
    let out = decode_struct_value_inner(stream, ctx, type_index);
    stream.ascend();
    out
}

fn decode_struct_value_inner(
    stream: &mut TokenStream,
    ctx: &JsonCtx,
    type_index: TypeIndex,
) -> EncodingResult<StructValue> {
    let desc = ctx.types.get(type_index).ok_or(Error::Decoding)?.clone();

    // single unnamed member: the value is spliced without an object wrapper
    if desc.members.len() == 1 && desc.members[0].name.is_empty() {
        let member = &desc.members[0];
        let field = decode_member(stream, ctx, &member.member_type, member.is_array)?;
        return Ok(StructValue { type_index, type_id: desc.type_id.clone(), fields: vec![field] });
    }

    let mut fields: Vec<Option<FieldValue>> = vec![None; desc.members.len()];
    stream.walk_object(|s, key| {
        for (i, member) in desc.members.iter().enumerate() {
            if member.name != key {
                continue;
            }
            if fields[i].is_some() {
                return Err(Error::Decoding);
            }
            fields[i] = Some(decode_member(s, ctx, &member.member_type, member.is_array)?);
            return Ok(true);
        }
        Ok(false)
    })?;

    // absent members default: null arrays, zeroed scalars are not modeled, so
    // a missing scalar member is a decoding error
    let mut out = Vec::with_capacity(desc.members.len());
    for (i, member) in desc.members.iter().enumerate() {
        match fields[i].take() {
            Some(field) => out.push(field),
            None if member.is_array => out.push(match member.member_type {
                MemberType::Builtin(_) => FieldValue::Array(None),
                MemberType::Structured(_) => FieldValue::StructArray(None),
            }),
            None => return Err(Error::Decoding),
        }
    }
    Ok(StructValue { type_index, type_id: desc.type_id.clone(), fields: out })
}

fn decode_member(
    stream: &mut TokenStream,
    ctx: &JsonCtx,
    member_type: &MemberType,
    is_array: bool,
) -> EncodingResult<FieldValue> {
    if is_array {
        if stream.is_null() {
            stream.advance();
            return Ok(match member_type {
                MemberType::Builtin(_) => FieldValue::Array(None),
                MemberType::Structured(_) => FieldValue::StructArray(None),
            });
        }
        let len = expect_array(stream)?;
        return match member_type {
            MemberType::Builtin(ty) => {
                let mut values = Vec::with_capacity(len);
                for _ in 0..len {
                    values.push(decode_scalar_variant(stream, ctx, *ty)?);
                }
                Ok(FieldValue::Array(Some(values)))
            }
            MemberType::Structured(idx) => {
                let mut values = Vec::with_capacity(len);
                for _ in 0..len {
                    values.push(decode_struct_value(stream, ctx, *idx)?);
                }
                Ok(FieldValue::StructArray(Some(values)))
            }
        };
    }
    match member_type {
        MemberType::Builtin(ty) => {
            Ok(FieldValue::Scalar(decode_scalar_variant(stream, ctx, *ty)?))
        }
        MemberType::Structured(idx) => {
            Ok(FieldValue::Struct(Box::new(decode_struct_value(stream, ctx, *idx)?)))
        }
    }
}

fn expect_array(stream: &mut TokenStream) -> EncodingResult<usize> {
    let token = stream.current()?;
    if token.kind != TokenKind::Array {
        return Err(Error::Decoding);
    }
    let len = token.size;
    stream.advance();
    Ok(len)
}

/// Decodes one scalar of the given builtin type into its Variant arm.
pub(crate) fn decode_scalar_variant(
    stream: &mut TokenStream,
    ctx: &JsonCtx,
    ty: BuiltinTypeId,
) -> EncodingResult<Variant> {
    use BuiltinTypeId as T;
    Ok(match ty {
        T::Boolean => Variant::Boolean(bool::decode_json(stream, ctx)?),
        T::SByte => Variant::SByte(i8::decode_json(stream, ctx)?),
        T::Byte => Variant::Byte(u8::decode_json(stream, ctx)?),
        T::Int16 => Variant::Int16(i16::decode_json(stream, ctx)?),
        T::UInt16 => Variant::UInt16(u16::decode_json(stream, ctx)?),
        T::Int32 => Variant::Int32(i32::decode_json(stream, ctx)?),
        T::UInt32 => Variant::UInt32(u32::decode_json(stream, ctx)?),
        T::Int64 => Variant::Int64(i64::decode_json(stream, ctx)?),
        T::UInt64 => Variant::UInt64(u64::decode_json(stream, ctx)?),
        T::Float => Variant::Float(f32::decode_json(stream, ctx)?),
        T::Double => Variant::Double(f64::decode_json(stream, ctx)?),
        T::String => Variant::String(UaString::decode_json(stream, ctx)?),
        T::DateTime => Variant::DateTime(DateTime::decode_json(stream, ctx)?),
        T::Guid => Variant::Guid(Guid::decode_json(stream, ctx)?),
        T::ByteString => Variant::ByteString(ByteString::decode_json(stream, ctx)?),
        T::XmlElement => Variant::XmlElement(UaString::decode_json(stream, ctx)?),
        T::NodeId => Variant::NodeId(Box::new(NodeId::decode_json(stream, ctx)?)),
        T::ExpandedNodeId => {
            Variant::ExpandedNodeId(Box::new(ExpandedNodeId::decode_json(stream, ctx)?))
        }
        T::StatusCode => Variant::StatusCode(StatusCode::decode_json(stream, ctx)?),
        T::QualifiedName => {
            Variant::QualifiedName(Box::new(QualifiedName::decode_json(stream, ctx)?))
        }
        T::LocalizedText => {
            Variant::LocalizedText(Box::new(LocalizedText::decode_json(stream, ctx)?))
        }
        T::ExtensionObject => {
            let eo = ExtensionObject::decode_json(stream, ctx)?;
            match eo.body {
                ExtensionObjectBody::Decoded(sv) => Variant::Struct(Box::new(sv)),
                body => Variant::ExtensionObject(Box::new(ExtensionObject {
                    type_id: eo.type_id,
                    body,
                })),
            }
        }
        T::DataValue => Variant::DataValue(Box::new(DataValue::decode_json(stream, ctx)?)),
        T::Variant => {
            stream.descend()?;
            let out = Variant::decode_json(stream, ctx);
            stream.ascend();
            out?
        }
        T::DiagnosticInfo => {
            Variant::DiagnosticInfo(Box::new(DiagnosticInfo::decode_json(stream, ctx)?))
        }
    })
}

impl JsonDecodable for Variant {
    fn decode_json(stream: &mut TokenStream, ctx: &JsonCtx) -> EncodingResult<Self> {
        if stream.is_null() {
            stream.advance();
            return Ok(Variant::Empty);
        }
        if stream.kind()? != TokenKind::Object {
            return Err(Error::Decoding);
        }
        // an object without a Type tag is the empty variant
        let Some(type_idx) = stream.find_key("Type")? else {
            stream.skip_value()?;
            return Ok(Variant::Empty);
        };
        let type_token = *stream.tokens.get(type_idx).ok_or(Error::Decoding)?;
        if type_token.kind != TokenKind::Primitive {
            return Err(Error::Decoding);
        }
        let raw = parse_u64(stream.token_text(&type_token)?)?;
        let ty = u8::try_from(raw)
            .ok()
            .and_then(|v| BuiltinTypeId::try_from(v).ok())
            .ok_or(Error::Decoding)?;

        // look at the body shape before walking the fields
        let body_idx = stream.find_key("Body")?.ok_or(Error::Decoding)?;
        let body_token = *stream.tokens.get(body_idx).ok_or(Error::Decoding)?;
        let is_array = body_token.kind == TokenKind::Array;
        if ty == BuiltinTypeId::Variant && !is_array {
            // a variant can contain a variant only inside an array
            return Err(Error::Decoding);
        }

        let mut seen = FieldSeen::<3>::new();
        let mut value: Option<Variant> = None;
        let mut dimensions: Option<Vec<u32>> = None;
        stream.walk_object(|s, key| match key {
            "Type" => {
                seen.mark(0)?;
                Ok(false)
            }
            "Body" => {
                seen.mark(1)?;
                if s.is_null() {
                    s.advance();
                    // nullable types keep their tag, everything else is empty
                    value = Some(match ty {
                        BuiltinTypeId::String => Variant::String(UaString(None)),
                        BuiltinTypeId::XmlElement => Variant::XmlElement(UaString(None)),
                        BuiltinTypeId::ByteString => Variant::ByteString(ByteString(None)),
                        _ => Variant::Empty,
                    });
                    return Ok(true);
                }
                if is_array {
                    let len = expect_array(s)?;
                    let mut values = Vec::with_capacity(len);
                    for _ in 0..len {
                        values.push(decode_scalar_variant(s, ctx, ty)?);
                    }
                    value = Some(Variant::Array(Box::new(VariantArray::new(
                        ElementType::Builtin(ty),
                        values,
                    ))));
                } else {
                    value = Some(decode_scalar_variant(s, ctx, ty)?);
                }
                Ok(true)
            }
            "Dimension" => {
                seen.mark(2)?;
                let len = expect_array(s)?;
                let mut dims = Vec::with_capacity(len);
                for _ in 0..len {
                    dims.push(u32::decode_json(s, ctx)?);
                }
                dimensions = Some(dims);
                Ok(true)
            }
            _ => Ok(false),
        })?;

        let value = value.ok_or(Error::Decoding)?;
        let value = match value {
            Variant::Array(mut arr) => {
                // unwrap a homogeneous struct array
                if arr.element_type == ElementType::Builtin(BuiltinTypeId::ExtensionObject) {
                    let all_structs = arr.values.iter().all(|v| matches!(v, Variant::Struct(_)));
                    if all_structs && !arr.values.is_empty() {
                        let first = match &arr.values[0] {
                            Variant::Struct(sv) => sv.type_id.clone(),
                            _ => unreachable!(),
                        };
                        let uniform = arr.values.iter().all(
                            |v| matches!(v, Variant::Struct(sv) if sv.type_id == first),
                        );
                        if uniform {
                            arr.element_type = ElementType::Structured(first);
                        }
                    }
                }
                if let Some(dims) = dimensions {
                    let product: u64 = dims.iter().map(|&d| d as u64).product();
                    if product != arr.values.len() as u64 {
                        return Err(Error::Decoding);
                    }
                    arr.dimensions = Some(dims);
                }
                Variant::Array(arr)
            }
            scalar => {
                if dimensions.is_some() {
                    return Err(Error::Decoding);
                }
                scalar
            }
        };
        Ok(value)
    }
}

impl JsonDecodable for DataValue {
    fn decode_json(stream: &mut TokenStream, ctx: &JsonCtx) -> EncodingResult<Self> {
        if stream.is_null() {
            stream.advance();
            return Ok(DataValue::default());
        }
        let mut out = DataValue::default();
        let mut seen = FieldSeen::<6>::new();
        stream.walk_object(|s, key| match key {
            "Value" => {
                seen.mark(0)?;
                out.value = Some(Variant::decode_json(s, ctx)?);
                Ok(true)
            }
            "Status" => {
                seen.mark(1)?;
                out.status = Some(StatusCode::decode_json(s, ctx)?);
                Ok(true)
            }
            "SourceTimestamp" => {
                seen.mark(2)?;
                out.source_timestamp = Some(DateTime::decode_json(s, ctx)?);
                Ok(true)
            }
            "SourcePicoseconds" => {
                seen.mark(3)?;
                out.source_picoseconds = Some(u16::decode_json(s, ctx)?);
                Ok(true)
            }
            "ServerTimestamp" => {
                seen.mark(4)?;
                out.server_timestamp = Some(DateTime::decode_json(s, ctx)?);
                Ok(true)
            }
            "ServerPicoseconds" => {
                seen.mark(5)?;
                out.server_picoseconds = Some(u16::decode_json(s, ctx)?);
                Ok(true)
            }
            _ => Ok(false),
        })?;
        Ok(out)
    }
}

impl JsonDecodable for DiagnosticInfo {
    fn decode_json(stream: &mut TokenStream, ctx: &JsonCtx) -> EncodingResult<Self> {
        if stream.is_null() {
            stream.advance();
            return Ok(DiagnosticInfo::default());
        }
        let mut out = DiagnosticInfo::default();
        let mut seen = FieldSeen::<7>::new();
        stream.walk_object(|s, key| match key {
            "SymbolicId" => {
                seen.mark(0)?;
                out.symbolic_id = Some(i32::decode_json(s, ctx)?);
                Ok(true)
            }
            "NamespaceUri" => {
                seen.mark(1)?;
                out.namespace_uri = Some(i32::decode_json(s, ctx)?);
                Ok(true)
            }
            "LocalizedText" => {
                seen.mark(2)?;
                out.localized_text = Some(i32::decode_json(s, ctx)?);
                Ok(true)
            }
            "Locale" => {
                seen.mark(3)?;
                out.locale = Some(i32::decode_json(s, ctx)?);
                Ok(true)
            }
            "AdditionalInfo" => {
                seen.mark(4)?;
                out.additional_info = Some(UaString::decode_json(s, ctx)?);
                Ok(true)
            }
            "InnerStatusCode" => {
                seen.mark(5)?;
                out.inner_status_code = Some(StatusCode::decode_json(s, ctx)?);
                Ok(true)
            }
            "InnerDiagnosticInfo" => {
                seen.mark(6)?;
                s.descend()?;
                let inner = DiagnosticInfo::decode_json(s, ctx);
                s.ascend();
                out.inner_diagnostic_info = Some(Box::new(inner?));
                Ok(true)
            }
            _ => Ok(false),
        })?;
        Ok(out)
    }
}
