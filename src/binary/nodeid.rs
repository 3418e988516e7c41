//! Compact tagged NodeId / ExpandedNodeId forms.
//!
//! The encoder always picks the tightest form that holds the value; the
//! two-byte and four-byte forms exist only for numeric identifiers.

use crate::binary::{BinaryDecodable, BinaryEncodable, DecodeCtx, EncodeCtx};
use crate::cursor::{ReadCursor, WriteCursor};
use crate::types::{ByteString, ExpandedNodeId, Guid, Identifier, NodeId, UaString};
use crate::{EncodingResult, Error};

const TAG_TWO_BYTE: u8 = 0x00;
const TAG_FOUR_BYTE: u8 = 0x01;
const TAG_NUMERIC: u8 = 0x02;
const TAG_STRING: u8 = 0x03;
const TAG_GUID: u8 = 0x04;
const TAG_BYTESTRING: u8 = 0x05;

pub(crate) const NAMESPACE_URI_FLAG: u8 = 0x80;
pub(crate) const SERVER_INDEX_FLAG: u8 = 0x40;

fn body_len(node_id: &NodeId, ctx: &EncodeCtx) -> usize {
    match &node_id.identifier {
        Identifier::Numeric(id) => {
            if node_id.namespace == 0 && *id <= u8::MAX as u32 {
                2
            } else if node_id.namespace <= u8::MAX as u16 && *id <= u16::MAX as u32 {
                4
            } else {
                7
            }
        }
        Identifier::String(s) => 3 + s.byte_len(ctx),
        Identifier::Guid(_) => 3 + 16,
        Identifier::ByteString(b) => 3 + b.byte_len(ctx),
    }
}

/// Writes the NodeId with `flags` OR'd into the tag byte; the flag bits are
/// the ExpandedNodeId namespace-URI / server-index markers.
pub(crate) fn encode_node_id_with_flags(
    node_id: &NodeId,
    flags: u8,
    cur: &mut WriteCursor,
    ctx: &EncodeCtx,
) -> EncodingResult<()> {
    match &node_id.identifier {
        Identifier::Numeric(id) => {
            if node_id.namespace == 0 && *id <= u8::MAX as u32 {
                cur.write_u8(TAG_TWO_BYTE | flags)?;
                cur.write_u8(*id as u8)
            } else if node_id.namespace <= u8::MAX as u16 && *id <= u16::MAX as u32 {
                cur.write_u8(TAG_FOUR_BYTE | flags)?;
                cur.write_u8(node_id.namespace as u8)?;
                cur.write_u16(*id as u16)
            } else {
                cur.write_u8(TAG_NUMERIC | flags)?;
                cur.write_u16(node_id.namespace)?;
                cur.write_u32(*id)
            }
        }
        Identifier::String(s) => {
            cur.write_u8(TAG_STRING | flags)?;
            cur.write_u16(node_id.namespace)?;
            s.encode_binary(cur, ctx)
        }
        Identifier::Guid(g) => {
            cur.write_u8(TAG_GUID | flags)?;
            cur.write_u16(node_id.namespace)?;
            g.encode_binary(cur, ctx)
        }
        Identifier::ByteString(b) => {
            cur.write_u8(TAG_BYTESTRING | flags)?;
            cur.write_u16(node_id.namespace)?;
            b.encode_binary(cur, ctx)
        }
    }
}

/// Decodes the body after the caller stripped the flag bits from the tag.
pub(crate) fn decode_node_id_body(
    tag: u8,
    cur: &mut ReadCursor,
    ctx: &DecodeCtx,
) -> EncodingResult<NodeId> {
    match tag {
        TAG_TWO_BYTE => {
            let id = cur.read_u8()?;
            Ok(NodeId::numeric(0, id as u32))
        }
        TAG_FOUR_BYTE => {
            let namespace = cur.read_u8()? as u16;
            let id = cur.read_u16()?;
            Ok(NodeId::numeric(namespace, id as u32))
        }
        TAG_NUMERIC => {
            let namespace = cur.read_u16()?;
            let id = cur.read_u32()?;
            Ok(NodeId::numeric(namespace, id))
        }
        TAG_STRING => {
            let namespace = cur.read_u16()?;
            let s = UaString::decode_binary(cur, ctx)?;
            Ok(NodeId { namespace, identifier: Identifier::String(s) })
        }
        TAG_GUID => {
            let namespace = cur.read_u16()?;
            let g = Guid::decode_binary(cur, ctx)?;
            Ok(NodeId { namespace, identifier: Identifier::Guid(g) })
        }
        TAG_BYTESTRING => {
            let namespace = cur.read_u16()?;
            let b = ByteString::decode_binary(cur, ctx)?;
            Ok(NodeId { namespace, identifier: Identifier::ByteString(b) })
        }
        other => {
            log::debug!("unknown NodeId encoding tag 0x{other:02X}");
            Err(Error::Decoding)
        }
    }
}

impl BinaryEncodable for NodeId {
    fn byte_len(&self, ctx: &EncodeCtx) -> usize {
        body_len(self, ctx)
    }

    fn encode_binary(&self, cur: &mut WriteCursor, ctx: &EncodeCtx) -> EncodingResult<()> {
        encode_node_id_with_flags(self, 0, cur, ctx)
    }
}

impl BinaryDecodable for NodeId {
    fn decode_binary(cur: &mut ReadCursor, ctx: &DecodeCtx) -> EncodingResult<Self> {
        let tag = cur.read_u8()?;
        // the URI/server-index flags belong to ExpandedNodeId only
        if tag & (NAMESPACE_URI_FLAG | SERVER_INDEX_FLAG) != 0 {
            return Err(Error::Decoding);
        }
        decode_node_id_body(tag, cur, ctx)
    }
}

fn expanded_flags(value: &ExpandedNodeId) -> u8 {
    let mut flags = 0;
    if matches!(value.namespace_uri.as_str(), Some(uri) if !uri.is_empty()) {
        flags |= NAMESPACE_URI_FLAG;
    }
    if value.server_index > 0 {
        flags |= SERVER_INDEX_FLAG;
    }
    flags
}

impl BinaryEncodable for ExpandedNodeId {
    fn byte_len(&self, ctx: &EncodeCtx) -> usize {
        let flags = expanded_flags(self);
        let mut len = body_len(&self.node_id, ctx);
        if flags & NAMESPACE_URI_FLAG != 0 {
            len += self.namespace_uri.byte_len(ctx);
        }
        if flags & SERVER_INDEX_FLAG != 0 {
            len += 4;
        }
        len
    }

    fn encode_binary(&self, cur: &mut WriteCursor, ctx: &EncodeCtx) -> EncodingResult<()> {
        let flags = expanded_flags(self);
        encode_node_id_with_flags(&self.node_id, flags, cur, ctx)?;
        if flags & NAMESPACE_URI_FLAG != 0 {
            self.namespace_uri.encode_binary(cur, ctx)?;
        }
        if flags & SERVER_INDEX_FLAG != 0 {
            cur.write_u32(self.server_index)?;
        }
        Ok(())
    }
}

impl BinaryDecodable for ExpandedNodeId {
    fn decode_binary(cur: &mut ReadCursor, ctx: &DecodeCtx) -> EncodingResult<Self> {
        let tag = cur.read_u8()?;
        let node_id = decode_node_id_body(tag & !(NAMESPACE_URI_FLAG | SERVER_INDEX_FLAG), cur, ctx)?;
        let namespace_uri = if tag & NAMESPACE_URI_FLAG != 0 {
            UaString::decode_binary(cur, ctx)?
        } else {
            UaString(None)
        };
        let server_index = if tag & SERVER_INDEX_FLAG != 0 { cur.read_u32()? } else { 0 };
        Ok(ExpandedNodeId { node_id, namespace_uri, server_index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::{calc_size, decode, encode};
    use crate::descriptor::DataTypeTable;

    fn check(node_id: NodeId, expect: &[u8]) {
        let table = DataTypeTable::new();
        let ectx = EncodeCtx::new(&table);
        let dctx = DecodeCtx::new(&table);
        let mut buf = vec![0u8; expect.len()];
        let written = encode(&node_id, &ectx, &mut buf).unwrap();
        assert_eq!(&buf[..written], expect);
        assert_eq!(calc_size(&node_id, &ectx), written);
        let (back, _) = decode::<NodeId>(&buf, 0, &dctx).unwrap();
        assert_eq!(back, node_id);
    }

    #[test]
    fn tightest_form_selection() {
        // ns 0, id <= 255: two-byte
        check(NodeId::numeric(0, 0x2A), &[0x00, 0x2A]);
        // ns <= 255, id <= 65535: four-byte
        check(NodeId::numeric(3, 0x1234), &[0x01, 0x03, 0x34, 0x12]);
        // otherwise full numeric
        check(
            NodeId::numeric(0x0102, 0x00FF_0000),
            &[0x02, 0x02, 0x01, 0x00, 0x00, 0xFF, 0x00],
        );
        // id fits a byte but ns forces the four-byte form
        check(NodeId::numeric(1, 7), &[0x01, 0x01, 0x07, 0x00]);
    }

    #[test]
    fn string_form() {
        check(
            NodeId::string(2, "ab"),
            &[0x03, 0x02, 0x00, 0x02, 0x00, 0x00, 0x00, b'a', b'b'],
        );
    }

    #[test]
    fn bytestring_form() {
        check(
            NodeId {
                namespace: 0,
                identifier: Identifier::ByteString(ByteString(Some(vec![0xDE, 0xAD]))),
            },
            &[0x05, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0xDE, 0xAD],
        );
    }

    #[test]
    fn plain_node_id_rejects_expanded_flags() {
        let table = DataTypeTable::new();
        let dctx = DecodeCtx::new(&table);
        let buf = [0x80 | 0x00, 0x2A];
        assert_eq!(decode::<NodeId>(&buf, 0, &dctx).unwrap_err(), Error::Decoding);
    }

    #[test]
    fn expanded_uri_then_server_index() {
        let table = DataTypeTable::new();
        let ectx = EncodeCtx::new(&table);
        let dctx = DecodeCtx::new(&table);
        let value = ExpandedNodeId {
            node_id: NodeId::numeric(0, 5),
            namespace_uri: UaString::from("urn:x"),
            server_index: 3,
        };
        let mut buf = vec![0u8; 64];
        let written = encode(&value, &ectx, &mut buf).unwrap();
        assert_eq!(
            &buf[..written],
            &[
                0xC0, 0x05, // two-byte form with both flags
                0x05, 0x00, 0x00, 0x00, b'u', b'r', b'n', b':', b'x', // uri
                0x03, 0x00, 0x00, 0x00, // server index
            ]
        );
        assert_eq!(calc_size(&value, &ectx), written);
        let (back, _) = decode::<ExpandedNodeId>(&buf[..written], 0, &dctx).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn expanded_without_flags_is_plain_body() {
        let table = DataTypeTable::new();
        let ectx = EncodeCtx::new(&table);
        let value = ExpandedNodeId::local(NodeId::numeric(0, 5));
        let mut buf = vec![0u8; 8];
        let written = encode(&value, &ectx, &mut buf).unwrap();
        assert_eq!(&buf[..written], &[0x00, 0x05]);
    }
}
