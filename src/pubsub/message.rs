//! The PubSub message model.
//!
//! Optional headers are `Option`s; the UADP flag bits are derived from them
//! at encode time and drive which fields exist at decode time. A
//! NetworkMessage owns its DataSetMessages exclusively.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;

use crate::types::{ByteString, DataValue, DateTime, Guid, UaString, Variant};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u8)]
pub enum NetworkMessageType {
    #[default]
    DataSet = 0,
    DiscoveryRequest = 1,
    DiscoveryResponse = 2,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u8)]
pub enum FieldEncoding {
    #[default]
    Variant = 0,
    RawData = 1,
    DataValue = 2,
}

/// 4-bit message type in DataSetFlags2.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u8)]
pub enum DataSetMessageType {
    #[default]
    KeyFrame = 0,
    DeltaFrame = 1,
    Event = 2,
    KeepAlive = 3,
}

/// Publisher id, variant-typed. The discriminant is the 3-bit type field of
/// ExtendedFlags1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PublisherId {
    Byte(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    String(UaString),
}

impl PublisherId {
    pub fn kind(&self) -> u8 {
        match self {
            PublisherId::Byte(_) => 0,
            PublisherId::UInt16(_) => 1,
            PublisherId::UInt32(_) => 2,
            PublisherId::UInt64(_) => 3,
            PublisherId::String(_) => 4,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupHeader {
    pub writer_group_id: Option<u16>,
    pub group_version: Option<u32>,
    pub network_message_number: Option<u16>,
    pub sequence_number: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SecurityHeader {
    pub network_message_signed: bool,
    pub network_message_encrypted: bool,
    pub force_key_reset: bool,
    pub security_token_id: u32,
    /// At most 255 bytes; the wire length prefix is a single byte.
    pub message_nonce: Vec<u8>,
    /// Present iff the footer is enabled.
    pub security_footer_size: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkMessage {
    /// UADP version, low 4 bits of the first flag byte.
    pub version: u8,
    pub message_type: NetworkMessageType,
    /// JSON MessageId. Not part of the UADP wire form.
    pub message_id: Guid,
    pub publisher_id: Option<PublisherId>,
    pub dataset_class_id: Option<Guid>,
    pub group_header: Option<GroupHeader>,
    /// DataSetWriterIds, one per message, when the payload header is on.
    pub payload_header: Option<Vec<u16>>,
    pub timestamp: Option<DateTime>,
    pub picoseconds: Option<u16>,
    pub promoted_fields: Option<Vec<Variant>>,
    pub security: Option<SecurityHeader>,
    pub chunk_message: bool,
    pub messages: Vec<DataSetMessage>,
    pub security_footer: ByteString,
    pub signature: ByteString,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataSetMessageHeader {
    pub valid: bool,
    pub field_encoding: FieldEncoding,
    pub writer_id: u16,
    pub sequence_number: Option<u16>,
    pub timestamp: Option<DateTime>,
    pub picoseconds: Option<u16>,
    /// Status, high 16 bits of the status code on the wire.
    pub status: Option<u16>,
    pub config_version_major: Option<u32>,
    pub config_version_minor: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaField {
    pub index: u16,
    pub value: DataValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub enum DataSetPayload {
    KeyFrame(Vec<DataValue>),
    DeltaFrame(Vec<DeltaField>),
    /// Same wire layout as a key frame.
    Event(Vec<DataValue>),
    #[default]
    KeepAlive,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataSetMessage {
    pub header: DataSetMessageHeader,
    pub payload: DataSetPayload,
    /// Payload field names; filled by the JSON decoder, unused on the UADP
    /// wire (the JSON encoder takes the caller's name table instead).
    pub field_names: Vec<String>,
}

impl DataSetMessage {
    pub fn message_type(&self) -> DataSetMessageType {
        match self.payload {
            DataSetPayload::KeyFrame(_) => DataSetMessageType::KeyFrame,
            DataSetPayload::DeltaFrame(_) => DataSetMessageType::DeltaFrame,
            DataSetPayload::Event(_) => DataSetMessageType::Event,
            DataSetPayload::KeepAlive => DataSetMessageType::KeepAlive,
        }
    }

    pub fn key_frame(writer_id: u16, encoding: FieldEncoding, fields: Vec<DataValue>) -> Self {
        DataSetMessage {
            header: DataSetMessageHeader {
                valid: true,
                field_encoding: encoding,
                writer_id,
                ..Default::default()
            },
            payload: DataSetPayload::KeyFrame(fields),
            field_names: Vec::new(),
        }
    }

    pub fn delta_frame(writer_id: u16, encoding: FieldEncoding, fields: Vec<DeltaField>) -> Self {
        DataSetMessage {
            header: DataSetMessageHeader {
                valid: true,
                field_encoding: encoding,
                writer_id,
                ..Default::default()
            },
            payload: DataSetPayload::DeltaFrame(fields),
            field_names: Vec::new(),
        }
    }
}

impl NetworkMessage {
    /// Number of DataSetMessages the payload header advertises; without a
    /// payload header exactly one message travels.
    pub fn message_count(&self) -> usize {
        match &self.payload_header {
            Some(ids) => ids.len(),
            None => 1,
        }
    }
}
