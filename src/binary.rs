//! OPC UA binary codec.
//!
//! Values implement [`BinaryEncodable`] (a size pass plus the write pass —
//! `byte_len` must return exactly the number of bytes `encode_binary` emits)
//! and [`BinaryDecodable`]. The contexts carry the descriptor table used to
//! wrap and unwrap non-builtin Variant contents.

pub mod builtin;
pub mod nodeid;
pub mod structured;

use crate::cursor::{ReadCursor, WriteCursor};
use crate::descriptor::{DataTypeTable, StructValue, TypeIndex};
use crate::status::StatusCode;
use crate::types::{ByteString, DateTime, Guid, UaString};
use crate::{EncodingResult, Error};

#[derive(Clone, Copy)]
pub struct EncodeCtx<'a> {
    pub types: &'a DataTypeTable,
}

impl<'a> EncodeCtx<'a> {
    pub fn new(types: &'a DataTypeTable) -> Self {
        Self { types }
    }
}

#[derive(Clone, Copy)]
pub struct DecodeCtx<'a> {
    pub types: &'a DataTypeTable,
}

impl<'a> DecodeCtx<'a> {
    pub fn new(types: &'a DataTypeTable) -> Self {
        Self { types }
    }
}

pub trait BinaryEncodable {
    /// Exact encoded size in bytes. This is the size calculator: encoding a
    /// well-formed value into a buffer of exactly this length succeeds, one
    /// byte less fails with `LimitsExceeded`.
    fn byte_len(&self, ctx: &EncodeCtx) -> usize;

    fn encode_binary(&self, cur: &mut WriteCursor, ctx: &EncodeCtx) -> EncodingResult<()>;
}

pub trait BinaryDecodable: Sized {
    fn decode_binary(cur: &mut ReadCursor, ctx: &DecodeCtx) -> EncodingResult<Self>;
}

/// Encode into `buf`, returning the number of bytes written. The buffer is
/// left untouched past the returned length; on error nothing of the output
/// is committed (callers compare positions).
pub fn encode<T: BinaryEncodable + ?Sized>(
    value: &T,
    ctx: &EncodeCtx,
    buf: &mut [u8],
) -> EncodingResult<usize> {
    let mut cur = WriteCursor::new(buf);
    value.encode_binary(&mut cur, ctx)?;
    Ok(cur.pos())
}

pub fn calc_size<T: BinaryEncodable + ?Sized>(value: &T, ctx: &EncodeCtx) -> usize {
    value.byte_len(ctx)
}

/// Decode one value starting at `offset`, returning it with the end offset.
pub fn decode<T: BinaryDecodable>(
    buf: &[u8],
    offset: usize,
    ctx: &DecodeCtx,
) -> EncodingResult<(T, usize)> {
    let mut cur = ReadCursor::new_at(buf, offset);
    let value = T::decode_binary(&mut cur, ctx)?;
    Ok((value, cur.pos()))
}

/// Decode a structured value against the descriptor at `type_index`.
pub fn decode_struct(
    buf: &[u8],
    offset: usize,
    type_index: TypeIndex,
    ctx: &DecodeCtx,
) -> EncodingResult<(StructValue, usize)> {
    let mut cur = ReadCursor::new_at(buf, offset);
    let value = structured::decode_struct(&mut cur, ctx, type_index)?;
    Ok((value, cur.pos()))
}

macro_rules! fixed_width {
    ($($ty:ty => $len:expr, $write:ident, $read:ident;)*) => {
        $(
            impl BinaryEncodable for $ty {
                fn byte_len(&self, _ctx: &EncodeCtx) -> usize {
                    $len
                }

                fn encode_binary(&self, cur: &mut WriteCursor, _ctx: &EncodeCtx) -> EncodingResult<()> {
                    cur.$write(*self)
                }
            }

            impl BinaryDecodable for $ty {
                fn decode_binary(cur: &mut ReadCursor, _ctx: &DecodeCtx) -> EncodingResult<Self> {
                    cur.$read()
                }
            }
        )*
    };
}

fixed_width!(
    u8 => 1, write_u8, read_u8;
    i8 => 1, write_i8, read_i8;
    u16 => 2, write_u16, read_u16;
    i16 => 2, write_i16, read_i16;
    u32 => 4, write_u32, read_u32;
    i32 => 4, write_i32, read_i32;
    u64 => 8, write_u64, read_u64;
    i64 => 8, write_i64, read_i64;
    f32 => 4, write_f32, read_f32;
    f64 => 8, write_f64, read_f64;
);

impl BinaryEncodable for bool {
    fn byte_len(&self, _ctx: &EncodeCtx) -> usize {
        1
    }

    fn encode_binary(&self, cur: &mut WriteCursor, _ctx: &EncodeCtx) -> EncodingResult<()> {
        cur.write_u8(*self as u8)
    }
}

impl BinaryDecodable for bool {
    fn decode_binary(cur: &mut ReadCursor, _ctx: &DecodeCtx) -> EncodingResult<Self> {
        Ok(cur.read_u8()? != 0)
    }
}

impl BinaryEncodable for DateTime {
    fn byte_len(&self, _ctx: &EncodeCtx) -> usize {
        8
    }

    fn encode_binary(&self, cur: &mut WriteCursor, _ctx: &EncodeCtx) -> EncodingResult<()> {
        cur.write_i64(self.0)
    }
}

impl BinaryDecodable for DateTime {
    fn decode_binary(cur: &mut ReadCursor, _ctx: &DecodeCtx) -> EncodingResult<Self> {
        Ok(DateTime(cur.read_i64()?))
    }
}

impl BinaryEncodable for StatusCode {
    fn byte_len(&self, _ctx: &EncodeCtx) -> usize {
        4
    }

    fn encode_binary(&self, cur: &mut WriteCursor, _ctx: &EncodeCtx) -> EncodingResult<()> {
        cur.write_u32(self.0)
    }
}

impl BinaryDecodable for StatusCode {
    fn decode_binary(cur: &mut ReadCursor, _ctx: &DecodeCtx) -> EncodingResult<Self> {
        Ok(StatusCode(cur.read_u32()?))
    }
}

pub(crate) fn seq_byte_len(data: Option<&[u8]>) -> usize {
    4 + data.map_or(0, <[u8]>::len)
}

/// Signed-i32 length prefix, `-1` for null.
pub(crate) fn encode_seq(data: Option<&[u8]>, cur: &mut WriteCursor) -> EncodingResult<()> {
    match data {
        None => cur.write_i32(-1),
        Some(bytes) => {
            let len = i32::try_from(bytes.len()).map_err(|_| Error::Encoding)?;
            cur.write_i32(len)?;
            cur.write_bytes(bytes)
        }
    }
}

pub(crate) fn decode_seq<'a>(cur: &mut ReadCursor<'a>) -> EncodingResult<Option<&'a [u8]>> {
    let len = cur.read_i32()?;
    match len {
        -1 => Ok(None),
        n if n < 0 => Err(Error::Decoding),
        n => Ok(Some(cur.read_bytes(n as usize)?)),
    }
}

impl BinaryEncodable for UaString {
    fn byte_len(&self, _ctx: &EncodeCtx) -> usize {
        seq_byte_len(self.0.as_deref().map(str::as_bytes))
    }

    fn encode_binary(&self, cur: &mut WriteCursor, _ctx: &EncodeCtx) -> EncodingResult<()> {
        encode_seq(self.0.as_deref().map(str::as_bytes), cur)
    }
}

impl BinaryDecodable for UaString {
    fn decode_binary(cur: &mut ReadCursor, _ctx: &DecodeCtx) -> EncodingResult<Self> {
        match decode_seq(cur)? {
            None => Ok(UaString(None)),
            Some(bytes) => {
                let text = std::str::from_utf8(bytes).map_err(|_| {
                    log::debug!("rejecting string with invalid utf-8");
                    Error::Decoding
                })?;
                Ok(UaString(Some(text.to_owned())))
            }
        }
    }
}

impl BinaryEncodable for ByteString {
    fn byte_len(&self, _ctx: &EncodeCtx) -> usize {
        seq_byte_len(self.0.as_deref())
    }

    fn encode_binary(&self, cur: &mut WriteCursor, _ctx: &EncodeCtx) -> EncodingResult<()> {
        encode_seq(self.0.as_deref(), cur)
    }
}

impl BinaryDecodable for ByteString {
    fn decode_binary(cur: &mut ReadCursor, _ctx: &DecodeCtx) -> EncodingResult<Self> {
        Ok(ByteString(decode_seq(cur)?.map(<[u8]>::to_vec)))
    }
}

impl BinaryEncodable for Guid {
    fn byte_len(&self, _ctx: &EncodeCtx) -> usize {
        16
    }

    fn encode_binary(&self, cur: &mut WriteCursor, _ctx: &EncodeCtx) -> EncodingResult<()> {
        cur.write_u32(self.data1)?;
        cur.write_u16(self.data2)?;
        cur.write_u16(self.data3)?;
        cur.write_bytes(&self.data4)
    }
}

impl BinaryDecodable for Guid {
    fn decode_binary(cur: &mut ReadCursor, _ctx: &DecodeCtx) -> EncodingResult<Self> {
        let data1 = cur.read_u32()?;
        let data2 = cur.read_u16()?;
        let data3 = cur.read_u16()?;
        let data4: [u8; 8] = cur.read_bytes(8)?.try_into().unwrap();
        Ok(Guid { data1, data2, data3, data4 })
    }
}

impl BinaryEncodable for StructValue {
    fn byte_len(&self, ctx: &EncodeCtx) -> usize {
        structured::struct_byte_len(self, ctx)
    }

    fn encode_binary(&self, cur: &mut WriteCursor, ctx: &EncodeCtx) -> EncodingResult<()> {
        structured::encode_struct(self, cur, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DataTypeTable;

    fn roundtrip<T>(value: T, expect: &[u8])
    where
        T: BinaryEncodable + BinaryDecodable + PartialEq + std::fmt::Debug,
    {
        let table = DataTypeTable::new();
        let ectx = EncodeCtx::new(&table);
        let dctx = DecodeCtx::new(&table);
        let mut buf = vec![0u8; expect.len()];
        let written = encode(&value, &ectx, &mut buf).unwrap();
        assert_eq!(&buf[..written], expect);
        assert_eq!(calc_size(&value, &ectx), written);
        let (back, end) = decode::<T>(&buf, 0, &dctx).unwrap();
        assert_eq!(back, value);
        assert_eq!(end, written);
        // a buffer one byte short must fail without output
        if written > 0 {
            let mut short = vec![0u8; written - 1];
            assert_eq!(encode(&value, &ectx, &mut short), Err(Error::LimitsExceeded));
        }
    }

    #[test]
    fn integers_little_endian() {
        roundtrip(8u8, &[0x08]);
        roundtrip(-1i32, &[0xFF, 0xFF, 0xFF, 0xFF]);
        roundtrip(i32::MIN, &[0x00, 0x00, 0x00, 0x80]);
        roundtrip(0x0102_0304u32, &[0x04, 0x03, 0x02, 0x01]);
        roundtrip(i64::MAX, &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F]);
        roundtrip(u64::MAX, &[0xFF; 8]);
    }

    #[test]
    fn floats_bit_exact() {
        roundtrip(1.0f32, &[0x00, 0x00, 0x80, 0x3F]);
        roundtrip(-2.0f64, &[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0]);
        // NaN round-trips through the raw bits
        let table = DataTypeTable::new();
        let ectx = EncodeCtx::new(&table);
        let dctx = DecodeCtx::new(&table);
        let mut buf = [0u8; 8];
        encode(&f64::NAN, &ectx, &mut buf).unwrap();
        let (back, _) = decode::<f64>(&buf, 0, &dctx).unwrap();
        assert!(back.is_nan());
    }

    #[test]
    fn string_null_and_empty_distinct() {
        roundtrip(UaString(None), &[0xFF, 0xFF, 0xFF, 0xFF]);
        roundtrip(UaString(Some(String::new())), &[0x00, 0x00, 0x00, 0x00]);
        roundtrip(
            UaString::from("ab"),
            &[0x02, 0x00, 0x00, 0x00, b'a', b'b'],
        );
        roundtrip(ByteString(None), &[0xFF, 0xFF, 0xFF, 0xFF]);
        roundtrip(ByteString(Some(vec![])), &[0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn string_invalid_utf8_rejected() {
        let table = DataTypeTable::new();
        let dctx = DecodeCtx::new(&table);
        let buf = [0x01, 0x00, 0x00, 0x00, 0xFF];
        assert_eq!(decode::<UaString>(&buf, 0, &dctx).unwrap_err(), Error::Decoding);
    }

    #[test]
    fn string_length_past_input() {
        let table = DataTypeTable::new();
        let dctx = DecodeCtx::new(&table);
        let buf = [0x10, 0x00, 0x00, 0x00, b'x'];
        assert_eq!(decode::<UaString>(&buf, 0, &dctx).unwrap_err(), Error::Decoding);
        // negative lengths other than -1 are malformed
        let buf = [0xFE, 0xFF, 0xFF, 0xFF];
        assert_eq!(decode::<ByteString>(&buf, 0, &dctx).unwrap_err(), Error::Decoding);
    }

    #[test]
    fn guid_layout() {
        roundtrip(
            Guid {
                data1: 0x01020304,
                data2: 0x0506,
                data3: 0x0708,
                data4: [9, 10, 11, 12, 13, 14, 15, 16],
            },
            &[
                0x04, 0x03, 0x02, 0x01, // data1 LE
                0x06, 0x05, // data2 LE
                0x08, 0x07, // data3 LE
                9, 10, 11, 12, 13, 14, 15, 16, // data4 raw
            ],
        );
    }

    #[test]
    fn datetime_ticks() {
        roundtrip(DateTime(-1), &[0xFF; 8]);
        roundtrip(DateTime(0x0102030405060708), &[8, 7, 6, 5, 4, 3, 2, 1]);
    }
}
