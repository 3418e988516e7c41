//! Descriptor-driven binary codec for structured types.
//!
//! The walker visits the member list of a [`DataTypeDescription`] in order
//! and dispatches each member through the builtin scalar codec, recursing for
//! nested structured members. Array members carry a signed i32 length prefix
//! with `-1` for the null array.

use crate::binary::builtin::{decode_scalar, encode_scalar, scalar_byte_len};
use crate::binary::{DecodeCtx, EncodeCtx};
use crate::cursor::{ReadCursor, WriteCursor};
use crate::descriptor::{FieldValue, MemberType, StructValue, TypeIndex};
use crate::{EncodingResult, Error};

pub(crate) fn struct_byte_len(value: &StructValue, ctx: &EncodeCtx) -> usize {
    let Some(desc) = ctx.types.get(value.type_index) else {
        return 0;
    };
    let mut len = 0;
    for (member, field) in desc.members.iter().zip(&value.fields) {
        len += match (&member.member_type, member.is_array, field) {
            (MemberType::Builtin(ty), false, FieldValue::Scalar(v)) => {
                scalar_byte_len(*ty, v, ctx)
            }
            (MemberType::Builtin(ty), true, FieldValue::Array(values)) => {
                4 + values.as_ref().map_or(0, |vs| {
                    vs.iter().map(|v| scalar_byte_len(*ty, v, ctx)).sum()
                })
            }
            (MemberType::Structured(_), false, FieldValue::Struct(sv)) => {
                struct_byte_len(sv, ctx)
            }
            (MemberType::Structured(_), true, FieldValue::StructArray(values)) => {
                4 + values.as_ref().map_or(0, |vs| {
                    vs.iter().map(|sv| struct_byte_len(sv, ctx)).sum()
                })
            }
            _ => 0,
        };
    }
    len
}

pub(crate) fn encode_struct(
    value: &StructValue,
    cur: &mut WriteCursor,
    ctx: &EncodeCtx,
) -> EncodingResult<()> {
    let desc = ctx.types.get(value.type_index).ok_or(Error::Encoding)?;
    if desc.members.len() != value.fields.len() {
        return Err(Error::Encoding);
    }
    for (member, field) in desc.members.iter().zip(&value.fields) {
        match (&member.member_type, member.is_array, field) {
            (MemberType::Builtin(ty), false, FieldValue::Scalar(v)) => {
                encode_scalar(*ty, v, cur, ctx)?;
            }
            (MemberType::Builtin(ty), true, FieldValue::Array(values)) => {
                match values {
                    None => cur.write_i32(-1)?,
                    Some(vs) => {
                        let len = i32::try_from(vs.len()).map_err(|_| Error::Encoding)?;
                        cur.write_i32(len)?;
                        for v in vs {
                            encode_scalar(*ty, v, cur, ctx)?;
                        }
                    }
                }
            }
            (MemberType::Structured(_), false, FieldValue::Struct(sv)) => {
                cur.descend()?;
                let out = encode_struct(sv, cur, ctx);
                cur.ascend();
                out?;
            }
            (MemberType::Structured(_), true, FieldValue::StructArray(values)) => {
                match values {
                    None => cur.write_i32(-1)?,
                    Some(vs) => {
                        let len = i32::try_from(vs.len()).map_err(|_| Error::Encoding)?;
                        cur.write_i32(len)?;
                        cur.descend()?;
                        for sv in vs {
                            if let Err(e) = encode_struct(sv, cur, ctx) {
                                cur.ascend();
                                return Err(e);
                            }
                        }
                        cur.ascend();
                    }
                }
            }
            _ => return Err(Error::Encoding),
        }
    }
    Ok(())
}

pub(crate) fn decode_struct(
    cur: &mut ReadCursor,
    ctx: &DecodeCtx,
    type_index: TypeIndex,
) -> EncodingResult<StructValue> {
    let desc = ctx.types.get(type_index).ok_or(Error::Decoding)?;
    let mut fields = Vec::with_capacity(desc.members.len());
    for member in &desc.members {
        let field = match (&member.member_type, member.is_array) {
            (MemberType::Builtin(ty), false) => FieldValue::Scalar(decode_scalar(*ty, cur, ctx)?),
            (MemberType::Builtin(ty), true) => {
                let len = cur.read_i32()?;
                match len {
                    -1 => FieldValue::Array(None),
                    n if n < 0 => return Err(Error::Decoding),
                    n => {
                        let n = n as usize;
                        if n > cur.remaining() {
                            return Err(Error::Decoding);
                        }
                        let mut values = Vec::with_capacity(n);
                        for _ in 0..n {
                            values.push(decode_scalar(*ty, cur, ctx)?);
                        }
                        FieldValue::Array(Some(values))
                    }
                }
            }
            (MemberType::Structured(idx), false) => {
                cur.descend()?;
                let sv = decode_struct(cur, ctx, *idx);
                cur.ascend();
                FieldValue::Struct(Box::new(sv?))
            }
            (MemberType::Structured(idx), true) => {
                let len = cur.read_i32()?;
                match len {
                    -1 => FieldValue::StructArray(None),
                    n if n < 0 => return Err(Error::Decoding),
                    n => {
                        let n = n as usize;
                        if n > cur.remaining() {
                            return Err(Error::Decoding);
                        }
                        let mut values = Vec::with_capacity(n);
                        cur.descend()?;
                        for _ in 0..n {
                            match decode_struct(cur, ctx, *idx) {
                                Ok(sv) => values.push(sv),
                                Err(e) => {
                                    cur.ascend();
                                    return Err(e);
                                }
                            }
                        }
                        cur.ascend();
                        FieldValue::StructArray(Some(values))
                    }
                }
            }
        };
        fields.push(field);
    }
    Ok(StructValue { type_index, type_id: desc.type_id.clone(), fields })
}
