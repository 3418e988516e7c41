//! PubSub NetworkMessage / DataSetMessage composition on top of the binary
//! and JSON codecs.

pub mod json;
pub mod message;
pub mod uadp;

pub use message::{
    DataSetMessage, DataSetMessageHeader, DataSetMessageType, DataSetPayload, DeltaField,
    FieldEncoding, GroupHeader, NetworkMessage, NetworkMessageType, PublisherId, SecurityHeader,
};
