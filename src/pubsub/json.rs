//! JSON framing of NetworkMessages and DataSetMessages.
//!
//! The envelope is `{"MessageId","MessageType","PublisherId"?,
//! "DataSetClassId"?,"Messages":[...]}`. Payload keys come from the
//! caller-supplied per-dataset field-name tables on encode and are preserved
//! on the decoded message.

use num_traits::NumCast;

use crate::json::decode::TokenStream;
use crate::json::tokenizer::TokenKind;
use crate::json::writer::JsonWriter;
use crate::json::{JsonCtx, JsonDecodable, JsonEncodable};
use crate::pubsub::message::{
    DataSetMessage, DataSetMessageHeader, DataSetPayload, FieldEncoding, NetworkMessage,
    NetworkMessageType, PublisherId,
};
use crate::types::{DataValue, DateTime, Guid, UaString, Variant};
use crate::{EncodingResult, Error};

impl NetworkMessage {
    /// Encodes the JSON form. `field_names[dataset][field]` names the
    /// payload keys; a dataset without an entry falls back to the names
    /// stored on the message (as filled by the decoder).
    pub fn encode_json(
        &self,
        field_names: &[Vec<String>],
        ctx: &JsonCtx,
        buf: &mut [u8],
    ) -> EncodingResult<usize> {
        let mut w = JsonWriter::new(buf);
        self.encode_json_inner(field_names, ctx, &mut w)?;
        Ok(w.pos())
    }

    pub fn calc_size_json(
        &self,
        field_names: &[Vec<String>],
        ctx: &JsonCtx,
    ) -> EncodingResult<usize> {
        let mut w = JsonWriter::counting();
        self.encode_json_inner(field_names, ctx, &mut w)?;
        Ok(w.pos())
    }

    fn encode_json_inner(
        &self,
        field_names: &[Vec<String>],
        ctx: &JsonCtx,
        w: &mut JsonWriter,
    ) -> EncodingResult<()> {
        if self.message_type != NetworkMessageType::DataSet {
            return Err(Error::NotImplemented);
        }
        w.obj_begin()?;
        w.key("MessageId", false)?;
        self.message_id.encode_json(w, ctx)?;
        w.key("MessageType", true)?;
        w.string("ua-data")?;

        if let Some(id) = &self.publisher_id {
            w.key("PublisherId", true)?;
            match id {
                PublisherId::Byte(v) => w.uint(*v as u64)?,
                PublisherId::UInt16(v) => w.uint(*v as u64)?,
                PublisherId::UInt32(v) => w.uint(*v as u64)?,
                PublisherId::UInt64(v) => w.uint(*v)?,
                PublisherId::String(v) => v.encode_json(w, ctx)?,
            }
        }

        if let Some(class_id) = &self.dataset_class_id {
            w.key("DataSetClassId", true)?;
            class_id.encode_json(w, ctx)?;
        }

        if !self.messages.is_empty() {
            w.key("Messages", true)?;
            w.arr_begin()?;
            for (i, msg) in self.messages.iter().enumerate() {
                w.comma(i > 0)?;
                let names = field_names.get(i).unwrap_or(&msg.field_names);
                msg.encode_json_inner(names, ctx, w)?;
            }
            w.arr_end()?;
        }
        w.obj_end()
    }

    pub fn decode_json(input: &[u8], ctx: &JsonCtx) -> EncodingResult<NetworkMessage> {
        crate::json::decode(input, ctx)
    }
}

impl DataSetMessage {
    /// Encodes one DataSetMessage object, with `names` supplying the payload
    /// keys in dataset field order.
    pub fn encode_json(
        &self,
        names: &[String],
        ctx: &JsonCtx,
        buf: &mut [u8],
    ) -> EncodingResult<usize> {
        let mut w = JsonWriter::new(buf);
        self.encode_json_inner(names, ctx, &mut w)?;
        Ok(w.pos())
    }

    fn encode_json_inner(
        &self,
        names: &[String],
        ctx: &JsonCtx,
        w: &mut JsonWriter,
    ) -> EncodingResult<()> {
        let header = &self.header;
        w.obj_begin()?;
        w.key("DataSetWriterId", false)?;
        w.string(&header.writer_id.to_string())?;

        if let Some(seq) = header.sequence_number {
            w.key("SequenceNumber", true)?;
            w.uint(seq as u64)?;
        }
        if header.config_version_major.is_some() || header.config_version_minor.is_some() {
            w.key("MetaDataVersion", true)?;
            w.obj_begin()?;
            w.key("MajorVersion", false)?;
            w.uint(header.config_version_major.unwrap_or(0) as u64)?;
            w.key("MinorVersion", true)?;
            w.uint(header.config_version_minor.unwrap_or(0) as u64)?;
            w.obj_end()?;
        }
        if let Some(ts) = &header.timestamp {
            w.key("Timestamp", true)?;
            ts.encode_json(w, ctx)?;
        }
        if let Some(status) = header.status {
            w.key("Status", true)?;
            w.uint(status as u64)?;
        }

        w.key("Payload", true)?;
        w.obj_begin()?;
        match &self.payload {
            DataSetPayload::KeyFrame(fields) | DataSetPayload::Event(fields) => {
                for (i, field) in fields.iter().enumerate() {
                    let name = names.get(i).ok_or(Error::Encoding)?;
                    w.key(name, i > 0)?;
                    encode_payload_field(field, header.field_encoding, ctx, w)?;
                }
            }
            DataSetPayload::DeltaFrame(fields) => {
                // the delta index picks the field name
                for (i, field) in fields.iter().enumerate() {
                    let name = names.get(field.index as usize).ok_or(Error::Encoding)?;
                    w.key(name, i > 0)?;
                    encode_payload_field(&field.value, header.field_encoding, ctx, w)?;
                }
            }
            DataSetPayload::KeepAlive => {}
        }
        w.obj_end()?;
        w.obj_end()
    }
}

fn encode_payload_field(
    field: &DataValue,
    encoding: FieldEncoding,
    ctx: &JsonCtx,
    w: &mut JsonWriter,
) -> EncodingResult<()> {
    match encoding {
        FieldEncoding::Variant => field
            .value
            .as_ref()
            .unwrap_or(&Variant::Empty)
            .encode_json(w, ctx),
        FieldEncoding::DataValue => field.encode_json(w, ctx),
        FieldEncoding::RawData => Err(Error::NotImplemented),
    }
}

impl JsonDecodable for NetworkMessage {
    fn decode_json(stream: &mut TokenStream, ctx: &JsonCtx) -> EncodingResult<Self> {
        // MessageType decides the layout before any field is consumed
        let Some(type_idx) = stream.find_key("MessageType")? else {
            return Err(Error::Decoding);
        };
        match stream.text_at(type_idx)? {
            "ua-data" => {}
            "ua-metadata" => return Err(Error::NotImplemented),
            _ => return Err(Error::Decoding),
        }

        let mut out = NetworkMessage::default();
        let mut seen = [false; 5];
        let mut mark = |seen: &mut [bool; 5], i: usize| -> EncodingResult<()> {
            if seen[i] {
                return Err(Error::Decoding);
            }
            seen[i] = true;
            Ok(())
        };
        stream.walk_object(|s, key| match key {
            "MessageId" => {
                mark(&mut seen, 0)?;
                out.message_id = Guid::decode_json(s, ctx)?;
                Ok(true)
            }
            "MessageType" => {
                mark(&mut seen, 1)?;
                Ok(false)
            }
            "PublisherId" => {
                mark(&mut seen, 2)?;
                out.publisher_id = Some(match s.kind()? {
                    TokenKind::String => PublisherId::String(UaString::decode_json(s, ctx)?),
                    TokenKind::Primitive => PublisherId::UInt64(u64::decode_json(s, ctx)?),
                    _ => return Err(Error::Decoding),
                });
                Ok(true)
            }
            "DataSetClassId" => {
                mark(&mut seen, 3)?;
                out.dataset_class_id = Some(Guid::decode_json(s, ctx)?);
                Ok(true)
            }
            "Messages" => {
                mark(&mut seen, 4)?;
                if s.kind()? != TokenKind::Array {
                    return Err(Error::Decoding);
                }
                let count = s.current()?.size;
                s.advance();
                let mut messages = Vec::with_capacity(count);
                for _ in 0..count {
                    messages.push(decode_dataset_message(s, ctx)?);
                }
                out.messages = messages;
                Ok(true)
            }
            _ => Ok(false),
        })?;

        if !out.messages.is_empty() {
            let writer_ids: Vec<u16> = out.messages.iter().map(|m| m.header.writer_id).collect();
            out.payload_header = Some(writer_ids);
        }
        Ok(out)
    }
}

fn decode_dataset_message(
    stream: &mut TokenStream,
    ctx: &JsonCtx,
) -> EncodingResult<DataSetMessage> {
    let mut header = DataSetMessageHeader { valid: true, ..Default::default() };
    let mut payload = DataSetPayload::KeyFrame(Vec::new());
    let mut field_names = Vec::new();
    let mut field_encoding = None;
    let mut seen = [false; 6];
    let mut mark = |seen: &mut [bool; 6], i: usize| -> EncodingResult<()> {
        if seen[i] {
            return Err(Error::Decoding);
        }
        seen[i] = true;
        Ok(())
    };

    stream.walk_object(|s, key| match key {
        "DataSetWriterId" => {
            mark(&mut seen, 0)?;
            // travels as a quoted number
            let raw = match s.kind()? {
                TokenKind::String => {
                    let text = s.text()?;
                    let v = text.parse::<u64>().map_err(|_| Error::Decoding)?;
                    s.advance();
                    v
                }
                TokenKind::Primitive => u64::decode_json(s, ctx)?,
                _ => return Err(Error::Decoding),
            };
            header.writer_id = NumCast::from(raw).ok_or(Error::Decoding)?;
            Ok(true)
        }
        "SequenceNumber" => {
            mark(&mut seen, 1)?;
            header.sequence_number = Some(u16::decode_json(s, ctx)?);
            Ok(true)
        }
        "MetaDataVersion" => {
            mark(&mut seen, 2)?;
            // decoding the version content stays disabled; step over
            Ok(false)
        }
        "Timestamp" => {
            mark(&mut seen, 3)?;
            header.timestamp = Some(DateTime::decode_json(s, ctx)?);
            Ok(true)
        }
        "Status" => {
            mark(&mut seen, 4)?;
            header.status = Some(u16::decode_json(s, ctx)?);
            Ok(true)
        }
        "Payload" => {
            mark(&mut seen, 5)?;
            let (fields, names, encoding) = decode_payload(s, ctx)?;
            payload = DataSetPayload::KeyFrame(fields);
            field_names = names;
            field_encoding = encoding;
            Ok(true)
        }
        _ => Ok(false),
    })?;

    // with bare Variant fields the header bit says Variant, with Value
    // objects it says DataValue
    header.field_encoding = field_encoding.unwrap_or(FieldEncoding::DataValue);
    Ok(DataSetMessage { header, payload, field_names })
}

type PayloadFields = (Vec<DataValue>, Vec<String>, Option<FieldEncoding>);

fn decode_payload(stream: &mut TokenStream, ctx: &JsonCtx) -> EncodingResult<PayloadFields> {
    if stream.is_null() {
        stream.advance();
        return Ok((Vec::new(), Vec::new(), None));
    }
    let mut fields = Vec::new();
    let mut names = Vec::new();
    let mut encoding: Option<FieldEncoding> = None;
    stream.walk_object(|s, key| {
        names.push(key.to_owned());
        // a bare variant value carries a Type tag, a DataValue does not
        let is_variant = s.kind()? == TokenKind::Object && s.find_key("Type")?.is_some();
        if is_variant {
            let value = Variant::decode_json(s, ctx)?;
            fields.push(DataValue::of(value));
            encoding.get_or_insert(FieldEncoding::Variant);
        } else {
            fields.push(DataValue::decode_json(s, ctx)?);
            encoding = Some(FieldEncoding::DataValue);
        }
        Ok(true)
    })?;
    Ok((fields, names, encoding))
}
