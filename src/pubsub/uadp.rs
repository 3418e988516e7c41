//! UADP binary framing of NetworkMessages and DataSetMessages.
//!
//! The first flag byte carries the protocol version and the header-presence
//! bits; ExtendedFlags1/2 exist only when one of the fields they govern is
//! in use, so the encoder derives them from the message and the decoder
//! mirrors the predicates.

use crate::binary::{BinaryDecodable, BinaryEncodable, DecodeCtx, EncodeCtx};
use crate::cursor::{ReadCursor, WriteCursor};
use crate::pubsub::message::{
    DataSetMessage, DataSetMessageHeader, DataSetMessageType, DataSetPayload, DeltaField,
    FieldEncoding, GroupHeader, NetworkMessage, NetworkMessageType, PublisherId, SecurityHeader,
};
use crate::types::{ByteString, DataValue, DateTime, Guid, UaString, Variant};
use crate::{EncodingResult, Error};

const NM_VERSION_MASK: u8 = 0x0F;
const NM_PUBLISHER_ID_ENABLED: u8 = 0x10;
const NM_GROUP_HEADER_ENABLED: u8 = 0x20;
const NM_PAYLOAD_HEADER_ENABLED: u8 = 0x40;
const NM_EXTENDED_FLAGS1: u8 = 0x80;

const NM_PUBLISHER_ID_TYPE_MASK: u8 = 0x07;
const NM_DATASET_CLASS_ID_ENABLED: u8 = 0x08;
const NM_SECURITY_ENABLED: u8 = 0x10;
const NM_TIMESTAMP_ENABLED: u8 = 0x20;
const NM_PICOSECONDS_ENABLED: u8 = 0x40;
const NM_EXTENDED_FLAGS2: u8 = 0x80;

const NM_CHUNK_MESSAGE: u8 = 0x01;
const NM_PROMOTED_FIELDS_ENABLED: u8 = 0x02;
const NM_MESSAGE_TYPE_MASK: u8 = 0x1C;
const NM_MESSAGE_TYPE_SHIFT: u8 = 2;

const DS_MSG_VALID: u8 = 0x01;
const DS_FIELD_ENCODING_MASK: u8 = 0x06;
const DS_FIELD_ENCODING_SHIFT: u8 = 1;
const DS_SEQUENCE_NUMBER_ENABLED: u8 = 0x08;
const DS_STATUS_ENABLED: u8 = 0x10;
const DS_CONFIG_MAJOR_ENABLED: u8 = 0x20;
const DS_CONFIG_MINOR_ENABLED: u8 = 0x40;
const DS_FLAGS2_ENABLED: u8 = 0x80;

const DS2_MESSAGE_TYPE_MASK: u8 = 0x0F;
const DS2_TIMESTAMP_ENABLED: u8 = 0x10;
const DS2_PICOSECONDS_INCLUDED: u8 = 0x20;

/// Flag byte with independent boolean bits: `from_raw` rejects unknown bits,
/// one accessor per flag.
macro_rules! flag_byte {
    ($name:ident, $($flag:ident = $mask:expr),+ $(,)?) => {
        #[derive(Clone, Copy)]
        struct $name(u8);

        impl $name {
            fn from_raw(value: u8) -> EncodingResult<Self> {
                let invalid = value & !(0 $(| $mask)+);
                if invalid != 0 {
                    log::debug!(
                        "invalid bits 0x{invalid:02X} in {}", stringify!($name)
                    );
                    return Err(Error::Decoding);
                }
                Ok(Self(value))
            }

            $(
                fn $flag(&self) -> bool {
                    self.0 & $mask != 0
                }
            )+
        }
    };
}

flag_byte!(
    GroupHeaderFlags,
    writer_group_id = 0x01,
    group_version = 0x02,
    network_message_number = 0x04,
    sequence_number = 0x08,
);

flag_byte!(
    SecurityFlags,
    signed = 0x01,
    encrypted = 0x02,
    footer = 0x04,
    key_reset = 0x08,
);

impl NetworkMessage {
    fn extended_flags2_enabled(&self) -> bool {
        self.chunk_message
            || self.promoted_fields.is_some()
            || self.message_type != NetworkMessageType::DataSet
    }

    fn extended_flags1_enabled(&self) -> bool {
        matches!(&self.publisher_id, Some(id) if id.kind() != 0)
            || self.dataset_class_id.is_some()
            || self.security.is_some()
            || self.timestamp.is_some()
            || self.picoseconds.is_some()
            || self.extended_flags2_enabled()
    }

    pub fn encode_binary(&self, ctx: &EncodeCtx, buf: &mut [u8]) -> EncodingResult<usize> {
        let mut cur = WriteCursor::new(buf);
        self.encode_binary_inner(ctx, &mut cur)?;
        Ok(cur.pos())
    }

    fn encode_binary_inner(&self, ctx: &EncodeCtx, cur: &mut WriteCursor) -> EncodingResult<()> {
        if self.version & !NM_VERSION_MASK != 0 {
            return Err(Error::Encoding);
        }
        let mut v = self.version;
        if self.publisher_id.is_some() {
            v |= NM_PUBLISHER_ID_ENABLED;
        }
        if self.group_header.is_some() {
            v |= NM_GROUP_HEADER_ENABLED;
        }
        if self.payload_header.is_some() {
            v |= NM_PAYLOAD_HEADER_ENABLED;
        }
        if self.extended_flags1_enabled() {
            v |= NM_EXTENDED_FLAGS1;
        }
        cur.write_u8(v)?;

        if self.extended_flags1_enabled() {
            let mut v = self.publisher_id.as_ref().map_or(0, PublisherId::kind);
            if self.dataset_class_id.is_some() {
                v |= NM_DATASET_CLASS_ID_ENABLED;
            }
            if self.security.is_some() {
                v |= NM_SECURITY_ENABLED;
            }
            if self.timestamp.is_some() {
                v |= NM_TIMESTAMP_ENABLED;
            }
            if self.picoseconds.is_some() {
                v |= NM_PICOSECONDS_ENABLED;
            }
            if self.extended_flags2_enabled() {
                v |= NM_EXTENDED_FLAGS2;
            }
            cur.write_u8(v)?;

            if self.extended_flags2_enabled() {
                let mut v = u8::from(self.message_type) << NM_MESSAGE_TYPE_SHIFT;
                if self.chunk_message {
                    v |= NM_CHUNK_MESSAGE;
                }
                if self.promoted_fields.is_some() {
                    v |= NM_PROMOTED_FIELDS_ENABLED;
                }
                cur.write_u8(v)?;
            }
        }

        if let Some(id) = &self.publisher_id {
            match id {
                PublisherId::Byte(v) => cur.write_u8(*v)?,
                PublisherId::UInt16(v) => cur.write_u16(*v)?,
                PublisherId::UInt32(v) => cur.write_u32(*v)?,
                PublisherId::UInt64(v) => cur.write_u64(*v)?,
                PublisherId::String(v) => v.encode_binary(cur, ctx)?,
            }
        }

        if let Some(class_id) = &self.dataset_class_id {
            class_id.encode_binary(cur, ctx)?;
        }

        if let Some(gh) = &self.group_header {
            let mut v = 0u8;
            if gh.writer_group_id.is_some() {
                v |= 0x01;
            }
            if gh.group_version.is_some() {
                v |= 0x02;
            }
            if gh.network_message_number.is_some() {
                v |= 0x04;
            }
            if gh.sequence_number.is_some() {
                v |= 0x08;
            }
            cur.write_u8(v)?;
            if let Some(id) = gh.writer_group_id {
                cur.write_u16(id)?;
            }
            if let Some(version) = gh.group_version {
                cur.write_u32(version)?;
            }
            if let Some(number) = gh.network_message_number {
                cur.write_u16(number)?;
            }
            if let Some(seq) = gh.sequence_number {
                cur.write_u16(seq)?;
            }
        }

        if let Some(writer_ids) = &self.payload_header {
            if self.message_type != NetworkMessageType::DataSet {
                return Err(Error::NotImplemented);
            }
            if writer_ids.len() != self.messages.len() {
                return Err(Error::Encoding);
            }
            let count = u8::try_from(writer_ids.len()).map_err(|_| Error::Encoding)?;
            cur.write_u8(count)?;
            for id in writer_ids {
                cur.write_u16(*id)?;
            }
        } else if self.messages.len() != 1 {
            // without a payload header exactly one message travels
            return Err(Error::Encoding);
        }

        if let Some(ts) = &self.timestamp {
            ts.encode_binary(cur, ctx)?;
        }
        if let Some(ps) = self.picoseconds {
            cur.write_u16(ps)?;
        }

        if let Some(fields) = &self.promoted_fields {
            let mut size = 0usize;
            for field in fields {
                size += field.byte_len(ctx);
            }
            let size = u16::try_from(size).map_err(|_| Error::Encoding)?;
            cur.write_u16(size)?;
            for field in fields {
                field.encode_binary(cur, ctx)?;
            }
        }

        if let Some(sec) = &self.security {
            let mut v = 0u8;
            if sec.network_message_signed {
                v |= 0x01;
            }
            if sec.network_message_encrypted {
                v |= 0x02;
            }
            if sec.security_footer_size.is_some() {
                v |= 0x04;
            }
            if sec.force_key_reset {
                v |= 0x08;
            }
            cur.write_u8(v)?;
            cur.write_u32(sec.security_token_id)?;
            let nonce_len = u8::try_from(sec.message_nonce.len()).map_err(|_| Error::Encoding)?;
            cur.write_u8(nonce_len)?;
            cur.write_bytes(&sec.message_nonce)?;
            if let Some(footer_size) = sec.security_footer_size {
                cur.write_u16(footer_size)?;
            }
        }

        if self.message_type != NetworkMessageType::DataSet {
            return Err(Error::NotImplemented);
        }

        // with more than one message each payload size precedes the payload
        if self.payload_header.is_some() && self.messages.len() > 1 {
            for msg in &self.messages {
                let size = u16::try_from(msg.calc_size_binary(ctx)).map_err(|_| Error::Encoding)?;
                cur.write_u16(size)?;
            }
        }
        for msg in &self.messages {
            msg.encode_binary_inner(ctx, cur)?;
        }

        if let Some(sec) = &self.security {
            if let Some(footer_size) = sec.security_footer_size {
                let footer = self.security_footer.as_bytes().unwrap_or(&[]);
                if footer.len() != footer_size as usize {
                    return Err(Error::Encoding);
                }
                cur.write_bytes(footer)?;
            }
            if sec.network_message_signed {
                self.signature.encode_binary(cur, ctx)?;
            }
        }
        Ok(())
    }

    pub fn calc_size_binary(&self, ctx: &EncodeCtx) -> usize {
        let mut size = 1;
        if self.extended_flags1_enabled() {
            size += 1;
            if self.extended_flags2_enabled() {
                size += 1;
            }
        }
        if let Some(id) = &self.publisher_id {
            size += match id {
                PublisherId::Byte(_) => 1,
                PublisherId::UInt16(_) => 2,
                PublisherId::UInt32(_) => 4,
                PublisherId::UInt64(_) => 8,
                PublisherId::String(v) => v.byte_len(ctx),
            };
        }
        if self.dataset_class_id.is_some() {
            size += 16;
        }
        if let Some(gh) = &self.group_header {
            size += 1;
            size += gh.writer_group_id.map_or(0, |_| 2);
            size += gh.group_version.map_or(0, |_| 4);
            size += gh.network_message_number.map_or(0, |_| 2);
            size += gh.sequence_number.map_or(0, |_| 2);
        }
        if let Some(writer_ids) = &self.payload_header {
            size += 1 + 2 * writer_ids.len();
        }
        if self.timestamp.is_some() {
            size += 8;
        }
        if self.picoseconds.is_some() {
            size += 2;
        }
        if let Some(fields) = &self.promoted_fields {
            size += 2;
            for field in fields {
                size += field.byte_len(ctx);
            }
        }
        if let Some(sec) = &self.security {
            size += 1 + 4 + 1 + sec.message_nonce.len();
            if sec.security_footer_size.is_some() {
                size += 2;
            }
        }
        if self.payload_header.is_some() && self.messages.len() > 1 {
            size += 2 * self.messages.len();
        }
        for msg in &self.messages {
            size += msg.calc_size_binary(ctx);
        }
        if let Some(sec) = &self.security {
            if let Some(footer_size) = sec.security_footer_size {
                size += footer_size as usize;
            }
            if sec.network_message_signed {
                size += self.signature.byte_len(ctx);
            }
        }
        size
    }

    pub fn decode_binary(buf: &[u8], ctx: &DecodeCtx) -> EncodingResult<(NetworkMessage, usize)> {
        let mut cur = ReadCursor::new(buf);
        let msg = Self::decode_binary_inner(ctx, &mut cur)?;
        Ok((msg, cur.pos()))
    }

    fn decode_binary_inner(ctx: &DecodeCtx, cur: &mut ReadCursor) -> EncodingResult<NetworkMessage> {
        let mut out = NetworkMessage::default();
        let v = cur.read_u8()?;
        out.version = v & NM_VERSION_MASK;
        let publisher_id_enabled = v & NM_PUBLISHER_ID_ENABLED != 0;
        let group_header_enabled = v & NM_GROUP_HEADER_ENABLED != 0;
        let payload_header_enabled = v & NM_PAYLOAD_HEADER_ENABLED != 0;

        let mut publisher_id_kind = 0u8;
        let mut dataset_class_id_enabled = false;
        let mut security_enabled = false;
        let mut timestamp_enabled = false;
        let mut picoseconds_enabled = false;
        let mut promoted_fields_enabled = false;
        if v & NM_EXTENDED_FLAGS1 != 0 {
            let v = cur.read_u8()?;
            publisher_id_kind = v & NM_PUBLISHER_ID_TYPE_MASK;
            dataset_class_id_enabled = v & NM_DATASET_CLASS_ID_ENABLED != 0;
            security_enabled = v & NM_SECURITY_ENABLED != 0;
            timestamp_enabled = v & NM_TIMESTAMP_ENABLED != 0;
            picoseconds_enabled = v & NM_PICOSECONDS_ENABLED != 0;
            if v & NM_EXTENDED_FLAGS2 != 0 {
                let v = cur.read_u8()?;
                out.chunk_message = v & NM_CHUNK_MESSAGE != 0;
                promoted_fields_enabled = v & NM_PROMOTED_FIELDS_ENABLED != 0;
                let ty = (v & NM_MESSAGE_TYPE_MASK) >> NM_MESSAGE_TYPE_SHIFT;
                out.message_type =
                    NetworkMessageType::try_from(ty).map_err(|_| Error::Decoding)?;
            }
        }

        if publisher_id_enabled {
            out.publisher_id = Some(match publisher_id_kind {
                0 => PublisherId::Byte(cur.read_u8()?),
                1 => PublisherId::UInt16(cur.read_u16()?),
                2 => PublisherId::UInt32(cur.read_u32()?),
                3 => PublisherId::UInt64(cur.read_u64()?),
                4 => PublisherId::String(UaString::decode_binary(cur, ctx)?),
                other => {
                    log::debug!("unknown publisher id kind {other}");
                    return Err(Error::Decoding);
                }
            });
        }

        if dataset_class_id_enabled {
            out.dataset_class_id = Some(Guid::decode_binary(cur, ctx)?);
        }

        if group_header_enabled {
            let flags = GroupHeaderFlags::from_raw(cur.read_u8()?)?;
            let mut gh = GroupHeader::default();
            if flags.writer_group_id() {
                gh.writer_group_id = Some(cur.read_u16()?);
            }
            if flags.group_version() {
                gh.group_version = Some(cur.read_u32()?);
            }
            if flags.network_message_number() {
                gh.network_message_number = Some(cur.read_u16()?);
            }
            if flags.sequence_number() {
                gh.sequence_number = Some(cur.read_u16()?);
            }
            out.group_header = Some(gh);
        }

        if payload_header_enabled {
            if out.message_type != NetworkMessageType::DataSet {
                return Err(Error::NotImplemented);
            }
            let count = cur.read_u8()?;
            let mut writer_ids = Vec::with_capacity(count as usize);
            for _ in 0..count {
                writer_ids.push(cur.read_u16()?);
            }
            out.payload_header = Some(writer_ids);
        }

        if timestamp_enabled {
            out.timestamp = Some(DateTime::decode_binary(cur, ctx)?);
        }
        if picoseconds_enabled {
            out.picoseconds = Some(cur.read_u16()?);
        }

        if promoted_fields_enabled {
            // the prefix is the byte size of the fields, not their number
            let total = cur.read_u16()? as usize;
            if total > cur.remaining() {
                return Err(Error::Decoding);
            }
            let end = cur.pos() + total;
            let mut fields = Vec::new();
            while cur.pos() < end {
                fields.push(Variant::decode_binary(cur, ctx)?);
            }
            if cur.pos() != end {
                return Err(Error::Decoding);
            }
            out.promoted_fields = Some(fields);
        }

        if security_enabled {
            let flags = SecurityFlags::from_raw(cur.read_u8()?)?;
            let mut sec = SecurityHeader {
                network_message_signed: flags.signed(),
                network_message_encrypted: flags.encrypted(),
                force_key_reset: flags.key_reset(),
                ..Default::default()
            };
            sec.security_token_id = cur.read_u32()?;
            let nonce_len = cur.read_u8()? as usize;
            sec.message_nonce = cur.read_bytes(nonce_len)?.to_vec();
            if flags.footer() {
                sec.security_footer_size = Some(cur.read_u16()?);
            }
            out.security = Some(sec);
        }

        if out.message_type != NetworkMessageType::DataSet {
            return Err(Error::NotImplemented);
        }

        let count = out.message_count();
        if out.payload_header.is_some() && count > 1 {
            // per-message sizes; the framing re-computes them on encode
            for _ in 0..count {
                let _size = cur.read_u16()?;
            }
        }
        let mut messages = Vec::with_capacity(count.min(cur.remaining()));
        for _ in 0..count {
            messages.push(DataSetMessage::decode_binary_inner(ctx, cur)?);
        }
        out.messages = messages;

        if let Some(sec) = &out.security {
            if let Some(footer_size) = sec.security_footer_size {
                if footer_size > 0 {
                    out.security_footer =
                        ByteString(Some(cur.read_bytes(footer_size as usize)?.to_vec()));
                }
            }
            if sec.network_message_signed {
                out.signature = ByteString::decode_binary(cur, ctx)?;
            }
        }
        Ok(out)
    }
}

impl DataSetMessageHeader {
    fn flags2_enabled(&self, message_type: DataSetMessageType) -> bool {
        message_type != DataSetMessageType::KeyFrame
            || self.timestamp.is_some()
            || self.picoseconds.is_some()
    }
}

impl DataSetMessage {
    pub fn encode_binary(&self, ctx: &EncodeCtx, buf: &mut [u8]) -> EncodingResult<usize> {
        let mut cur = WriteCursor::new(buf);
        self.encode_binary_inner(ctx, &mut cur)?;
        Ok(cur.pos())
    }

    fn encode_binary_inner(&self, ctx: &EncodeCtx, cur: &mut WriteCursor) -> EncodingResult<()> {
        let header = &self.header;
        let message_type = self.message_type();
        let flags2 = header.flags2_enabled(message_type);

        let mut v = u8::from(header.field_encoding) << DS_FIELD_ENCODING_SHIFT;
        if header.valid {
            v |= DS_MSG_VALID;
        }
        if header.sequence_number.is_some() {
            v |= DS_SEQUENCE_NUMBER_ENABLED;
        }
        if header.status.is_some() {
            v |= DS_STATUS_ENABLED;
        }
        if header.config_version_major.is_some() {
            v |= DS_CONFIG_MAJOR_ENABLED;
        }
        if header.config_version_minor.is_some() {
            v |= DS_CONFIG_MINOR_ENABLED;
        }
        if flags2 {
            v |= DS_FLAGS2_ENABLED;
        }
        cur.write_u8(v)?;

        if flags2 {
            let mut v = u8::from(message_type);
            if header.timestamp.is_some() {
                v |= DS2_TIMESTAMP_ENABLED;
            }
            if header.picoseconds.is_some() {
                v |= DS2_PICOSECONDS_INCLUDED;
            }
            cur.write_u8(v)?;
        }

        if let Some(seq) = header.sequence_number {
            cur.write_u16(seq)?;
        }
        if let Some(ts) = &header.timestamp {
            ts.encode_binary(cur, ctx)?;
        }
        if let Some(ps) = header.picoseconds {
            cur.write_u16(ps)?;
        }
        if let Some(status) = header.status {
            cur.write_u16(status)?;
        }
        if let Some(major) = header.config_version_major {
            cur.write_u32(major)?;
        }
        if let Some(minor) = header.config_version_minor {
            cur.write_u32(minor)?;
        }

        match &self.payload {
            DataSetPayload::KeyFrame(fields) | DataSetPayload::Event(fields) => {
                if header.field_encoding == FieldEncoding::RawData {
                    return Err(Error::NotImplemented);
                }
                let count = u16::try_from(fields.len()).map_err(|_| Error::Encoding)?;
                cur.write_u16(count)?;
                for field in fields {
                    encode_field(field, header.field_encoding, cur, ctx)?;
                }
            }
            DataSetPayload::DeltaFrame(fields) => {
                if header.field_encoding == FieldEncoding::RawData {
                    return Err(Error::NotImplemented);
                }
                let count = u16::try_from(fields.len()).map_err(|_| Error::Encoding)?;
                cur.write_u16(count)?;
                for field in fields {
                    cur.write_u16(field.index)?;
                    encode_field(&field.value, header.field_encoding, cur, ctx)?;
                }
            }
            DataSetPayload::KeepAlive => {}
        }
        Ok(())
    }

    pub fn calc_size_binary(&self, ctx: &EncodeCtx) -> usize {
        let header = &self.header;
        let mut size = 1;
        if header.flags2_enabled(self.message_type()) {
            size += 1;
        }
        size += header.sequence_number.map_or(0, |_| 2);
        size += header.timestamp.map_or(0, |_| 8);
        size += header.picoseconds.map_or(0, |_| 2);
        size += header.status.map_or(0, |_| 2);
        size += header.config_version_major.map_or(0, |_| 4);
        size += header.config_version_minor.map_or(0, |_| 4);
        match &self.payload {
            DataSetPayload::KeyFrame(fields) | DataSetPayload::Event(fields) => {
                size += 2;
                for field in fields {
                    size += field_byte_len(field, header.field_encoding, ctx);
                }
            }
            DataSetPayload::DeltaFrame(fields) => {
                size += 2;
                for field in fields {
                    size += 2 + field_byte_len(&field.value, header.field_encoding, ctx);
                }
            }
            DataSetPayload::KeepAlive => {}
        }
        size
    }

    pub fn decode_binary(buf: &[u8], ctx: &DecodeCtx) -> EncodingResult<(DataSetMessage, usize)> {
        let mut cur = ReadCursor::new(buf);
        let msg = Self::decode_binary_inner(ctx, &mut cur)?;
        Ok((msg, cur.pos()))
    }

    fn decode_binary_inner(ctx: &DecodeCtx, cur: &mut ReadCursor) -> EncodingResult<DataSetMessage> {
        let mut header = DataSetMessageHeader::default();
        let v = cur.read_u8()?;
        header.valid = v & DS_MSG_VALID != 0;
        let encoding = (v & DS_FIELD_ENCODING_MASK) >> DS_FIELD_ENCODING_SHIFT;
        header.field_encoding = FieldEncoding::try_from(encoding).map_err(|_| Error::Decoding)?;
        let sequence_number_enabled = v & DS_SEQUENCE_NUMBER_ENABLED != 0;
        let status_enabled = v & DS_STATUS_ENABLED != 0;
        let major_enabled = v & DS_CONFIG_MAJOR_ENABLED != 0;
        let minor_enabled = v & DS_CONFIG_MINOR_ENABLED != 0;

        let mut message_type = DataSetMessageType::KeyFrame;
        let mut timestamp_enabled = false;
        let mut picoseconds_included = false;
        if v & DS_FLAGS2_ENABLED != 0 {
            let v = cur.read_u8()?;
            message_type = DataSetMessageType::try_from(v & DS2_MESSAGE_TYPE_MASK)
                .map_err(|_| Error::Decoding)?;
            timestamp_enabled = v & DS2_TIMESTAMP_ENABLED != 0;
            picoseconds_included = v & DS2_PICOSECONDS_INCLUDED != 0;
        }

        if sequence_number_enabled {
            header.sequence_number = Some(cur.read_u16()?);
        }
        if timestamp_enabled {
            header.timestamp = Some(DateTime::decode_binary(cur, ctx)?);
        }
        if picoseconds_included {
            header.picoseconds = Some(cur.read_u16()?);
        }
        if status_enabled {
            header.status = Some(cur.read_u16()?);
        }
        if major_enabled {
            header.config_version_major = Some(cur.read_u32()?);
        }
        if minor_enabled {
            header.config_version_minor = Some(cur.read_u32()?);
        }

        let payload = match message_type {
            DataSetMessageType::KeyFrame | DataSetMessageType::Event => {
                if header.field_encoding == FieldEncoding::RawData {
                    return Err(Error::NotImplemented);
                }
                let fields = decode_key_frame_fields(header.field_encoding, ctx, cur)?;
                if message_type == DataSetMessageType::KeyFrame {
                    DataSetPayload::KeyFrame(fields)
                } else {
                    DataSetPayload::Event(fields)
                }
            }
            DataSetMessageType::DeltaFrame => {
                if header.field_encoding == FieldEncoding::RawData {
                    return Err(Error::NotImplemented);
                }
                let count = cur.read_u16()? as usize;
                if count > cur.remaining() {
                    return Err(Error::Decoding);
                }
                let mut fields = Vec::with_capacity(count);
                for _ in 0..count {
                    let index = cur.read_u16()?;
                    let value = decode_field(header.field_encoding, ctx, cur)?;
                    fields.push(DeltaField { index, value });
                }
                DataSetPayload::DeltaFrame(fields)
            }
            DataSetMessageType::KeepAlive => DataSetPayload::KeepAlive,
        };

        Ok(DataSetMessage { header, payload, field_names: Vec::new() })
    }
}

fn encode_field(
    field: &DataValue,
    encoding: FieldEncoding,
    cur: &mut WriteCursor,
    ctx: &EncodeCtx,
) -> EncodingResult<()> {
    match encoding {
        FieldEncoding::Variant => field
            .value
            .as_ref()
            .unwrap_or(&Variant::Empty)
            .encode_binary(cur, ctx),
        FieldEncoding::DataValue => field.encode_binary(cur, ctx),
        FieldEncoding::RawData => Err(Error::NotImplemented),
    }
}

fn field_byte_len(field: &DataValue, encoding: FieldEncoding, ctx: &EncodeCtx) -> usize {
    match encoding {
        FieldEncoding::Variant => field.value.as_ref().unwrap_or(&Variant::Empty).byte_len(ctx),
        FieldEncoding::DataValue => field.byte_len(ctx),
        FieldEncoding::RawData => 0,
    }
}

fn decode_field(
    encoding: FieldEncoding,
    ctx: &DecodeCtx,
    cur: &mut ReadCursor,
) -> EncodingResult<DataValue> {
    match encoding {
        FieldEncoding::Variant => {
            let value = Variant::decode_binary(cur, ctx)?;
            Ok(DataValue::of(value))
        }
        FieldEncoding::DataValue => DataValue::decode_binary(cur, ctx),
        FieldEncoding::RawData => Err(Error::NotImplemented),
    }
}

fn decode_key_frame_fields(
    encoding: FieldEncoding,
    ctx: &DecodeCtx,
    cur: &mut ReadCursor,
) -> EncodingResult<Vec<DataValue>> {
    let count = cur.read_u16()? as usize;
    if count > cur.remaining() {
        return Err(Error::Decoding);
    }
    let mut fields = Vec::with_capacity(count);
    for _ in 0..count {
        fields.push(decode_field(encoding, ctx, cur)?);
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DataTypeTable;

    fn roundtrip(msg: &NetworkMessage) -> Vec<u8> {
        let table = DataTypeTable::new();
        let ectx = EncodeCtx::new(&table);
        let dctx = DecodeCtx::new(&table);
        let mut buf = vec![0u8; 1024];
        let written = msg.encode_binary(&ectx, &mut buf).unwrap();
        assert_eq!(msg.calc_size_binary(&ectx), written);
        let (back, end) = NetworkMessage::decode_binary(&buf[..written], &dctx).unwrap();
        assert_eq!(end, written);
        // the JSON-only MessageId is not on the UADP wire
        let mut expect = msg.clone();
        expect.message_id = Default::default();
        assert_eq!(back, expect);
        buf.truncate(written);
        buf
    }

    #[test]
    fn minimal_message_single_flag_byte() {
        let msg = NetworkMessage {
            version: 1,
            messages: vec![DataSetMessage::key_frame(0, FieldEncoding::Variant, vec![])],
            ..Default::default()
        };
        let bytes = roundtrip(&msg);
        assert_eq!(
            bytes,
            [
                0x01, // version 1, no optional headers
                0x01, // DataSetFlags1: valid, variant field encoding
                0x00, 0x00, // field count 0
            ]
        );
    }

    #[test]
    fn byte_publisher_id_stays_in_one_flag_byte() {
        let msg = NetworkMessage {
            version: 1,
            publisher_id: Some(PublisherId::Byte(7)),
            messages: vec![DataSetMessage::key_frame(0, FieldEncoding::Variant, vec![])],
            ..Default::default()
        };
        let bytes = roundtrip(&msg);
        assert_eq!(bytes[0], 0x01 | 0x10);
        assert_eq!(bytes[1], 7);
    }

    #[test]
    fn non_byte_publisher_id_needs_extended_flags1() {
        let msg = NetworkMessage {
            version: 1,
            publisher_id: Some(PublisherId::UInt32(0xDEAD)),
            messages: vec![DataSetMessage::key_frame(0, FieldEncoding::Variant, vec![])],
            ..Default::default()
        };
        let bytes = roundtrip(&msg);
        assert_eq!(bytes[0], 0x01 | 0x10 | 0x80);
        assert_eq!(bytes[1], 0x02); // publisher id type u32
        assert_eq!(&bytes[2..6], &[0xAD, 0xDE, 0x00, 0x00]);
    }

    #[test]
    fn group_and_payload_headers() {
        let msg = NetworkMessage {
            version: 1,
            group_header: Some(GroupHeader {
                writer_group_id: Some(42),
                sequence_number: Some(7),
                ..Default::default()
            }),
            payload_header: Some(vec![4, 7]),
            messages: vec![
                DataSetMessage::key_frame(4, FieldEncoding::Variant, vec![]),
                DataSetMessage::key_frame(7, FieldEncoding::Variant, vec![]),
            ],
            ..Default::default()
        };
        let bytes = roundtrip(&msg);
        assert_eq!(bytes[0], 0x01 | 0x20 | 0x40);
        // group flags: writer group id + sequence number
        assert_eq!(bytes[1], 0x01 | 0x08);
        // writer group id 42, sequence 7, then payload header count 2
        assert_eq!(&bytes[2..4], &[42, 0]);
        assert_eq!(&bytes[4..6], &[7, 0]);
        assert_eq!(bytes[6], 2);
    }

    #[test]
    fn timestamp_and_chunk_use_both_extended_flags() {
        let msg = NetworkMessage {
            version: 1,
            timestamp: Some(DateTime(0x10)),
            chunk_message: true,
            messages: vec![DataSetMessage::key_frame(0, FieldEncoding::Variant, vec![])],
            ..Default::default()
        };
        let bytes = roundtrip(&msg);
        assert_eq!(bytes[0], 0x01 | 0x80);
        assert_eq!(bytes[1], 0x20 | 0x80);
        assert_eq!(bytes[2], 0x01);
    }

    #[test]
    fn security_header_and_footer() {
        let msg = NetworkMessage {
            version: 1,
            security: Some(SecurityHeader {
                network_message_signed: false,
                network_message_encrypted: true,
                force_key_reset: false,
                security_token_id: 9,
                message_nonce: vec![1, 2, 3, 4],
                security_footer_size: Some(2),
            }),
            security_footer: ByteString(Some(vec![0xAA, 0xBB])),
            messages: vec![DataSetMessage::key_frame(0, FieldEncoding::Variant, vec![])],
            ..Default::default()
        };
        let bytes = roundtrip(&msg);
        assert_eq!(bytes[bytes.len() - 2..], [0xAA, 0xBB]);
    }

    #[test]
    fn delta_frame_payload() {
        let msg = NetworkMessage {
            version: 1,
            payload_header: Some(vec![7]),
            messages: vec![DataSetMessage::delta_frame(
                7,
                FieldEncoding::DataValue,
                vec![
                    DeltaField { index: 2, value: DataValue::of(Variant::Guid(Guid::NULL)) },
                    DeltaField {
                        index: 5,
                        value: DataValue::of(Variant::Int64(152478978534)),
                    },
                ],
            )],
            ..Default::default()
        };
        roundtrip(&msg);
    }

    #[test]
    fn keep_alive_has_no_payload() {
        let msg = NetworkMessage {
            version: 1,
            messages: vec![DataSetMessage {
                header: DataSetMessageHeader {
                    valid: true,
                    ..Default::default()
                },
                payload: DataSetPayload::KeepAlive,
                field_names: Vec::new(),
            }],
            ..Default::default()
        };
        let bytes = roundtrip(&msg);
        // header flags1 + flags2 (keep-alive forces flags2) and nothing else
        assert_eq!(bytes, [0x01, 0x01 | 0x80, 0x03]);
    }

    #[test]
    fn event_frame_shares_key_frame_layout() {
        let event = NetworkMessage {
            version: 1,
            messages: vec![DataSetMessage {
                header: DataSetMessageHeader {
                    valid: true,
                    field_encoding: FieldEncoding::Variant,
                    ..Default::default()
                },
                payload: DataSetPayload::Event(vec![DataValue::of(Variant::Byte(9))]),
                field_names: Vec::new(),
            }],
            ..Default::default()
        };
        let bytes = roundtrip(&event);
        // flags2 carries message type 2; payload is count + variant
        assert_eq!(bytes[1], 0x01 | 0x80);
        assert_eq!(bytes[2], 0x02);
        assert_eq!(&bytes[3..], &[0x01, 0x00, 0x03, 0x09]);
    }

    #[test]
    fn writer_id_count_mismatch_is_encoding_error() {
        let table = DataTypeTable::new();
        let ectx = EncodeCtx::new(&table);
        let msg = NetworkMessage {
            version: 1,
            payload_header: Some(vec![1, 2]),
            messages: vec![DataSetMessage::key_frame(1, FieldEncoding::Variant, vec![])],
            ..Default::default()
        };
        let mut buf = vec![0u8; 128];
        assert_eq!(msg.encode_binary(&ectx, &mut buf), Err(Error::Encoding));
    }

    #[test]
    fn promoted_fields_size_prefix() {
        let msg = NetworkMessage {
            version: 1,
            promoted_fields: Some(vec![Variant::Byte(3), Variant::UInt16(512)]),
            messages: vec![DataSetMessage::key_frame(0, FieldEncoding::Variant, vec![])],
            ..Default::default()
        };
        let bytes = roundtrip(&msg);
        // flags, extflags1, extflags2 (promoted), then u16 size = 2 + 3
        assert_eq!(bytes[0], 0x01 | 0x80);
        assert_eq!(bytes[1], 0x80);
        assert_eq!(bytes[2], 0x02);
        assert_eq!(&bytes[3..5], &[5, 0]);
    }
}
