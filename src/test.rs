//! Cross-layer scenarios: JSON text forms, universal round-trip properties
//! and the PubSub framing driven through both codecs.

use rstest::rstest;

use crate::binary::{BinaryDecodable, BinaryEncodable, DecodeCtx, EncodeCtx};
use crate::descriptor::{
    DataTypeDescription, DataTypeMember, DataTypeTable, FieldValue, StructValue,
};
use crate::json::{JsonCtx, JsonDecodable, JsonEncodable};
use crate::pubsub::{
    DataSetMessage, DataSetPayload, DeltaField, FieldEncoding, NetworkMessage, PublisherId,
};
use crate::status::StatusCode;
use crate::types::{
    BuiltinTypeId, ByteString, DataValue, DateTime, DiagnosticInfo, ElementType, Guid,
    LocalizedText, NodeId, UaString, Variant,
};
use crate::{Error, MAX_RECURSION_DEPTH};

fn encode_json_string<T: JsonEncodable>(value: &T, ctx: &JsonCtx) -> String {
    let size = crate::json::calc_size(value, ctx).unwrap();
    let mut buf = vec![0u8; size];
    let written = crate::json::encode(value, &mut buf, ctx).unwrap();
    assert_eq!(written, size);
    // one byte short must not fit
    if size > 0 {
        let mut short = vec![0u8; size - 1];
        assert_eq!(crate::json::encode(value, &mut short, ctx), Err(Error::LimitsExceeded));
    }
    String::from_utf8(buf).unwrap()
}

fn json_roundtrip<T>(value: &T) -> String
where
    T: JsonEncodable + JsonDecodable + PartialEq + std::fmt::Debug,
{
    let table = DataTypeTable::new();
    let ctx = JsonCtx::reversible(&table);
    let text = encode_json_string(value, &ctx);
    let back: T = crate::json::decode(text.as_bytes(), &ctx).unwrap();
    assert_eq!(&back, value);
    text
}

fn binary_roundtrip<T>(value: &T)
where
    T: BinaryEncodable + BinaryDecodable + PartialEq + std::fmt::Debug,
{
    let table = DataTypeTable::new();
    let ectx = EncodeCtx::new(&table);
    let dctx = DecodeCtx::new(&table);
    let size = crate::binary::calc_size(value, &ectx);
    let mut buf = vec![0u8; size];
    let written = crate::binary::encode(value, &ectx, &mut buf).unwrap();
    assert_eq!(written, size);
    let (back, end) = crate::binary::decode::<T>(&buf, 0, &dctx).unwrap();
    assert_eq!(&back, value);
    assert_eq!(end, size);
}

#[test]
fn binary_decode_byte_scenario() {
    let table = DataTypeTable::new();
    let dctx = DecodeCtx::new(&table);
    let (value, end) = crate::binary::decode::<u8>(&[0x08], 0, &dctx).unwrap();
    assert_eq!(value, 8);
    assert_eq!(end, 1);
}

#[test]
fn json_node_id_string_form() {
    let value = NodeId::string(0, "foobar");
    let text = json_roundtrip(&value);
    assert_eq!(text, r#"{"IdType":1,"Id":"foobar"}"#);
}

#[test]
fn json_node_id_numeric_with_namespace() {
    assert_eq!(json_roundtrip(&NodeId::numeric(0, 42)), r#"{"Id":42}"#);
    assert_eq!(
        json_roundtrip(&NodeId::numeric(5, 42)),
        r#"{"Id":42,"Namespace":5}"#
    );
}

#[test]
fn json_variant_uint64_body() {
    let value = Variant::UInt64(345634563456);
    let text = json_roundtrip(&value);
    assert_eq!(text, r#"{"Type":9,"Body":345634563456}"#);
}

#[test]
fn json_status_code_forms() {
    let table = DataTypeTable::new();
    let rev = JsonCtx::reversible(&table);
    let nonrev = JsonCtx::non_reversible(&table, &[], &[]);

    let code = StatusCode::BAD_AGGREGATE_CONFIGURATION_REJECTED;
    assert_eq!(encode_json_string(&code, &rev), "2161770496");
    assert_eq!(
        encode_json_string(&code, &nonrev),
        r#"{"Code":2161770496,"Symbol":"BadAggregateConfigurationRejected"}"#
    );
    // Good is treated like null in the non-reversible form
    assert_eq!(encode_json_string(&StatusCode::GOOD, &nonrev), "null");
    assert_eq!(encode_json_string(&StatusCode::GOOD, &rev), "0");
}

#[test]
fn json_duplicate_key_rejected() {
    let table = DataTypeTable::new();
    let ctx = JsonCtx::reversible(&table);
    let err = crate::json::decode::<Variant>(br#"{"Type":1,"Body":false,"Type":1}"#, &ctx);
    assert_eq!(err.unwrap_err(), Error::Decoding);
}

#[test]
fn json_string_matrix_non_reversible() {
    // 8 strings shaped [2,2,2,1]: one bracket per dimension
    let values = (1..=8)
        .map(|i| Variant::String(UaString(Some(i.to_string()))))
        .collect();
    let value = Variant::matrix(
        ElementType::Builtin(BuiltinTypeId::String),
        values,
        vec![2, 2, 2, 1],
    );
    let table = DataTypeTable::new();
    let ctx = JsonCtx::non_reversible(&table, &[], &[]);
    assert_eq!(
        encode_json_string(&value, &ctx),
        r#"[[[["1"],["2"]],[["3"],["4"]]],[[["5"],["6"]],[["7"],["8"]]]]"#
    );
}

#[test]
fn json_matrix_reversible_keeps_dimensions() {
    let values = (1..=9).map(Variant::UInt16).collect();
    let value = Variant::matrix(
        ElementType::Builtin(BuiltinTypeId::UInt16),
        values,
        vec![3, 3],
    );
    let text = json_roundtrip(&value);
    assert_eq!(text, r#"{"Type":5,"Body":[1,2,3,4,5,6,7,8,9],"Dimension":[3,3]}"#);
}

#[test]
fn json_localized_text_forms() {
    let value = LocalizedText::new("en-US", "patching progress");
    assert_eq!(
        json_roundtrip(&value),
        r#"{"Locale":"en-US","Text":"patching progress"}"#
    );
    let table = DataTypeTable::new();
    let nonrev = JsonCtx::non_reversible(&table, &[], &[]);
    assert_eq!(encode_json_string(&value, &nonrev), r#""patching progress""#);
}

#[test]
fn json_non_reversible_namespace_rules() {
    let table = DataTypeTable::new();
    let namespaces =
        vec!["http://opcfoundation.org/UA/".to_owned(), "urn:local".to_owned(), "urn:x".to_owned()];
    let ctx = JsonCtx::non_reversible(&table, &namespaces, &[]);
    // index resolves through the table
    assert_eq!(
        encode_json_string(&NodeId::numeric(2, 1), &ctx),
        r#"{"Id":1,"Namespace":"urn:x"}"#
    );
    // index 1 always stays numeric
    assert_eq!(
        encode_json_string(&NodeId::numeric(1, 1), &ctx),
        r#"{"Id":1,"Namespace":1}"#
    );
    // out of range
    let mut w = vec![0u8; 64];
    assert_eq!(
        crate::json::encode(&NodeId::numeric(9, 1), &mut w, &ctx),
        Err(Error::NotFound)
    );
}

#[rstest]
#[case(Variant::Boolean(true))]
#[case(Variant::SByte(i8::MIN))]
#[case(Variant::SByte(i8::MAX))]
#[case(Variant::Byte(u8::MAX))]
#[case(Variant::Int16(i16::MIN))]
#[case(Variant::UInt16(u16::MAX))]
#[case(Variant::Int32(i32::MIN))]
#[case(Variant::UInt32(u32::MAX))]
#[case(Variant::Int64(i64::MIN))]
#[case(Variant::Int64(i64::MAX))]
#[case(Variant::UInt64(u64::MAX))]
#[case(Variant::UInt64(0))]
#[case(Variant::Float(f32::MIN_POSITIVE))]
#[case(Variant::Double(1.0 + f64::EPSILON))]
#[case(Variant::Double(-0.0))]
#[case(Variant::String(UaString(None)))]
#[case(Variant::String(UaString(Some(String::new()))))]
#[case(Variant::String(UaString(Some("grüße \u{1F600} ok".into()))))]
#[case(Variant::ByteString(ByteString(None)))]
#[case(Variant::ByteString(ByteString(Some(vec![0, 1, 254, 255]))))]
#[case(Variant::DateTime(DateTime(0)))]
#[case(Variant::StatusCode(StatusCode::BAD_TIMEOUT))]
#[case(Variant::NodeId(Box::new(NodeId::string(3, "motor"))))]
#[case(Variant::ExpandedNodeId(Box::new(crate::types::ExpandedNodeId {
    node_id: NodeId::numeric(0, 2045),
    namespace_uri: UaString::from("urn:factory:line0"),
    server_index: 2,
})))]
#[case(Variant::QualifiedName(Box::new(crate::types::QualifiedName::new(4, "Speed"))))]
#[case(Variant::LocalizedText(Box::new(LocalizedText::new("de", "läuft"))))]
fn variant_roundtrips_both_codecs(#[case] value: Variant) {
    binary_roundtrip(&value);
    json_roundtrip(&value);
}

#[rstest]
#[case(f64::INFINITY, "\"Infinity\"")]
#[case(f64::NEG_INFINITY, "\"-Infinity\"")]
fn json_special_floats(#[case] value: f64, #[case] expect: &str) {
    let table = DataTypeTable::new();
    let ctx = JsonCtx::reversible(&table);
    assert_eq!(encode_json_string(&value, &ctx), expect);
    let back: f64 = crate::json::decode(expect.as_bytes(), &ctx).unwrap();
    assert_eq!(back, value);
}

#[test]
fn json_nan_decodes_any_case() {
    let table = DataTypeTable::new();
    let ctx = JsonCtx::reversible(&table);
    assert_eq!(encode_json_string(&f64::NAN, &ctx), "\"NaN\"");
    for text in ["\"NaN\"", "\"nan\"", "\"NAN\""] {
        let back: f64 = crate::json::decode(text.as_bytes(), &ctx).unwrap();
        assert!(back.is_nan());
    }
    for text in ["\"Infinity\"", "\"infinity\"", "\"inf\""] {
        let back: f64 = crate::json::decode(text.as_bytes(), &ctx).unwrap();
        assert!(back.is_infinite());
    }
}

#[test]
fn json_surrogate_pair_decoding() {
    let table = DataTypeTable::new();
    let ctx = JsonCtx::reversible(&table);
    let back: UaString = crate::json::decode("\"\u{1F600}\"".as_bytes(), &ctx).unwrap();
    assert_eq!(back, UaString(Some("\u{1F600}".into())));
    // lone lead, lone trail, malformed pair
    assert!(crate::json::decode::<UaString>(br#""\ud83d""#, &ctx).is_err());
    assert!(crate::json::decode::<UaString>(br#""\ude00""#, &ctx).is_err());
    assert!(crate::json::decode::<UaString>(br#""\ud83dx""#, &ctx).is_err());
}

#[test]
fn json_integer_rejects_sign_and_junk() {
    let table = DataTypeTable::new();
    let ctx = JsonCtx::reversible(&table);
    assert!(crate::json::decode::<u32>(b"+17", &ctx).is_err());
    assert!(crate::json::decode::<u32>(b"17a", &ctx).is_err());
    assert!(crate::json::decode::<u32>(b"-1", &ctx).is_err());
    assert!(crate::json::decode::<i32>(b"-1", &ctx).is_ok());
    // range is enforced
    assert!(crate::json::decode::<u8>(b"256", &ctx).is_err());
    assert!(crate::json::decode::<i8>(b"-129", &ctx).is_err());
}

#[test]
fn diagnostic_info_depth_limit_json() {
    let mut value = DiagnosticInfo { symbolic_id: Some(1), ..Default::default() };
    for _ in 0..MAX_RECURSION_DEPTH - 1 {
        value =
            DiagnosticInfo { inner_diagnostic_info: Some(Box::new(value)), ..Default::default() };
    }
    let text = json_roundtrip(&value);

    // one level deeper: the decoder bails out instead of recursing
    let deeper = format!(r#"{{"InnerDiagnosticInfo":{text}}}"#);
    let table = DataTypeTable::new();
    let ctx = JsonCtx::reversible(&table);
    assert_eq!(
        crate::json::decode::<DiagnosticInfo>(deeper.as_bytes(), &ctx).unwrap_err(),
        Error::Decoding
    );
}

#[test]
fn json_variant_of_variants_array() {
    let value = Variant::array(
        ElementType::Builtin(BuiltinTypeId::Variant),
        vec![Variant::Byte(1), Variant::String(UaString::from("x"))],
    );
    let text = json_roundtrip(&value);
    assert_eq!(
        text,
        r#"{"Type":24,"Body":[{"Type":3,"Body":1},{"Type":12,"Body":"x"}]}"#
    );
}

#[test]
fn json_data_value_all_fields() {
    let value = DataValue {
        value: Some(Variant::UInt16(42)),
        status: Some(StatusCode::UNCERTAIN_INITIAL_VALUE),
        source_timestamp: Some(DateTime::parse_iso8601("2018-03-25T13:32:20.000Z").unwrap()),
        server_timestamp: Some(DateTime::parse_iso8601("2018-03-25T13:32:20.001Z").unwrap()),
        source_picoseconds: Some(0),
        server_picoseconds: Some(6000),
    };
    json_roundtrip(&value);
    binary_roundtrip(&value);
    // the all-absent value is the wire null
    let table = DataTypeTable::new();
    let ctx = JsonCtx::reversible(&table);
    assert_eq!(encode_json_string(&DataValue::default(), &ctx), "null");
}

#[test]
fn json_extension_object_with_descriptor() {
    let mut table = DataTypeTable::new();
    let idx = table.push(DataTypeDescription {
        type_id: NodeId::numeric(0, 14593),
        name: "ConfigurationVersionDataType".into(),
        members: vec![
            DataTypeMember::scalar("MajorVersion", BuiltinTypeId::UInt32),
            DataTypeMember::scalar("MinorVersion", BuiltinTypeId::UInt32),
        ],
    });
    let sv = StructValue::new(
        &table,
        idx,
        vec![
            FieldValue::Scalar(Variant::UInt32(1478393530)),
            FieldValue::Scalar(Variant::UInt32(0)),
        ],
    )
    .unwrap();
    let value = Variant::Struct(Box::new(sv));

    let ctx = JsonCtx::reversible(&table);
    let text = encode_json_string(&value, &ctx);
    assert_eq!(
        text,
        r#"{"Type":22,"Body":{"TypeId":{"Id":14593},"Body":{"MajorVersion":1478393530,"MinorVersion":0}}}"#
    );
    let back: Variant = crate::json::decode(text.as_bytes(), &ctx).unwrap();
    assert_eq!(back, value);

    // binary wrap/unwrap through the same descriptor
    let ectx = EncodeCtx::new(&table);
    let dctx = DecodeCtx::new(&table);
    let mut buf = vec![0u8; 64];
    let written = crate::binary::encode(&value, &ectx, &mut buf).unwrap();
    assert_eq!(crate::binary::calc_size(&value, &ectx), written);
    let (bin_back, _) = crate::binary::decode::<Variant>(&buf[..written], 0, &dctx).unwrap();
    assert_eq!(bin_back, value);
}

#[test]
fn pubsub_json_two_messages_roundtrip() {
    let guid = Guid::parse("B7E9851D-2E4D-E71F-7107-A02AF23F5375").unwrap();
    let msg = NetworkMessage {
        version: 1,
        message_id: Guid::parse("D4195B44-2E0A-8D5B-46F4-BF9B1CB1BB0B").unwrap(),
        payload_header: Some(vec![4, 7]),
        messages: vec![
            DataSetMessage::key_frame(
                4,
                FieldEncoding::Variant,
                vec![DataValue::of(Variant::UInt32(27))],
            ),
            DataSetMessage::delta_frame(
                7,
                FieldEncoding::DataValue,
                vec![
                    DeltaField { index: 2, value: DataValue::of(Variant::Guid(guid)) },
                    DeltaField { index: 5, value: DataValue::of(Variant::Int64(152478978534)) },
                ],
            ),
        ],
        ..Default::default()
    };

    let table = DataTypeTable::new();
    let ctx = JsonCtx::reversible(&table);
    let names = vec![
        vec!["a".to_owned()],
        (0..6).map(|i| format!("f{i}")).collect::<Vec<_>>(),
    ];
    let size = msg.calc_size_json(&names, &ctx).unwrap();
    let mut buf = vec![0u8; size];
    let written = msg.encode_json(&names, &ctx, &mut buf).unwrap();
    assert_eq!(written, size);
    let text = String::from_utf8(buf).unwrap();
    assert_eq!(
        text,
        concat!(
            r#"{"MessageId":"D4195B44-2E0A-8D5B-46F4-BF9B1CB1BB0B","MessageType":"ua-data","#,
            r#""Messages":[{"DataSetWriterId":"4","Payload":{"a":{"Type":7,"Body":27}}},"#,
            r#"{"DataSetWriterId":"7","Payload":{"f2":{"Value":{"Type":14,"#,
            r#""Body":"B7E9851D-2E4D-E71F-7107-A02AF23F5375"}},"f5":{"Value":{"Type":8,"Body":152478978534}}}}]}"#
        )
    );

    let back = NetworkMessage::decode_json(text.as_bytes(), &ctx).unwrap();
    assert_eq!(back.message_id, msg.message_id);
    assert_eq!(back.payload_header, Some(vec![4, 7]));
    assert_eq!(back.messages.len(), 2);
    assert_eq!(back.messages[0].header.writer_id, 4);
    assert_eq!(back.messages[0].header.field_encoding, FieldEncoding::Variant);
    assert_eq!(
        back.messages[0].payload,
        DataSetPayload::KeyFrame(vec![DataValue::of(Variant::UInt32(27))])
    );
    assert_eq!(back.messages[0].field_names, vec!["a"]);
    // the delta frame comes back normalized to key-frame fields
    assert_eq!(back.messages[1].header.writer_id, 7);
    assert_eq!(back.messages[1].header.field_encoding, FieldEncoding::DataValue);
    assert_eq!(back.messages[1].field_names, vec!["f2", "f5"]);
    assert_eq!(
        back.messages[1].payload,
        DataSetPayload::KeyFrame(vec![
            DataValue::of(Variant::Guid(guid)),
            DataValue::of(Variant::Int64(152478978534)),
        ])
    );
}

#[test]
fn pubsub_json_decode_reference_fixture() {
    // fixture from the protocol test suite
    let input = concat!(
        r#"{"MessageId":"5ED82C10-50BB-CD07-0120-22521081E8EE","MessageType":"ua-data","#,
        r#""Messages":[{"DataSetWriterId":"62541","MetaDataVersion":{"MajorVersion":1478393530,"MinorVersion":0},"#,
        r#""SequenceNumber":4711,"Payload":{"Test":{"Type":5,"Body":42},"#,
        r#""Server localtime":{"Type":13,"Body":"2018-06-05T05:58:36.000Z"}}}]}"#
    );
    let table = DataTypeTable::new();
    let ctx = JsonCtx::reversible(&table);
    let msg = NetworkMessage::decode_json(input.as_bytes(), &ctx).unwrap();
    assert_eq!(msg.messages.len(), 1);
    let dsm = &msg.messages[0];
    assert_eq!(dsm.header.writer_id, 62541);
    assert_eq!(dsm.header.sequence_number, Some(4711));
    // MetaDataVersion decoding stays disabled: stepped over, left unset
    assert_eq!(dsm.header.config_version_major, None);
    let DataSetPayload::KeyFrame(fields) = &dsm.payload else {
        panic!("expected key frame");
    };
    assert_eq!(fields[0].value, Some(Variant::UInt16(42)));
    assert_eq!(
        fields[1].value,
        Some(Variant::DateTime(
            DateTime::parse_iso8601("2018-06-05T05:58:36.000Z").unwrap()
        ))
    );
    assert_eq!(dsm.field_names, vec!["Test", "Server localtime"]);
}

#[test]
fn pubsub_json_null_payload_and_publisher() {
    let input = concat!(
        r#"{ "MessageId": "32235546-05d9-4fd7-97df-ea3ff3408574",  "MessageType": "ua-data","#,
        r#"  "PublisherId": "MQTT-Localhost",  "DataSetClassId": "00000005-cab9-4470-8f8a-2c1ead207e0e","#,
        r#"  "Messages": [ { "DataSetWriterId": "1", "SequenceNumber": 224,"#,
        r#" "MetaDataVersion": { "MajorVersion": 1, "MinorVersion": 1 },"Payload":null}]}"#
    );
    let table = DataTypeTable::new();
    let ctx = JsonCtx::reversible(&table);
    let msg = NetworkMessage::decode_json(input.as_bytes(), &ctx).unwrap();
    assert_eq!(msg.dataset_class_id.unwrap().data1, 5);
    assert_eq!(
        msg.publisher_id,
        Some(PublisherId::String(UaString::from("MQTT-Localhost")))
    );
    assert_eq!(msg.messages[0].header.sequence_number, Some(224));
    assert_eq!(msg.messages[0].payload, DataSetPayload::KeyFrame(vec![]));
}

#[test]
fn pubsub_json_metadata_not_implemented() {
    let table = DataTypeTable::new();
    let ctx = JsonCtx::reversible(&table);
    let input = br#"{"MessageId":"5ED82C10-50BB-CD07-0120-22521081E8EE","MessageType":"ua-metadata"}"#;
    assert_eq!(
        NetworkMessage::decode_json(input, &ctx).unwrap_err(),
        Error::NotImplemented
    );
}

#[test]
fn pubsub_binary_full_roundtrip_with_promoted_fields() {
    let msg = NetworkMessage {
        version: 1,
        publisher_id: Some(PublisherId::String(UaString::from("pub-1"))),
        dataset_class_id: Some(Guid::parse("00000005-CAB9-4470-8F8A-2C1EAD207E0E").unwrap()),
        timestamp: Some(DateTime::parse_iso8601("2018-06-05T05:58:36.000Z").unwrap()),
        picoseconds: Some(12),
        promoted_fields: Some(vec![Variant::UInt32(1), Variant::String(UaString::from("x"))]),
        payload_header: Some(vec![4, 7]),
        messages: vec![
            DataSetMessage::key_frame(
                4,
                FieldEncoding::DataValue,
                vec![DataValue {
                    value: Some(Variant::Double(0.5)),
                    status: Some(StatusCode::GOOD),
                    ..Default::default()
                }],
            ),
            DataSetMessage::key_frame(7, FieldEncoding::Variant, vec![DataValue::of(27u32.into())]),
        ],
        ..Default::default()
    };
    let table = DataTypeTable::new();
    let ectx = EncodeCtx::new(&table);
    let dctx = DecodeCtx::new(&table);
    let size = msg.calc_size_binary(&ectx);
    let mut buf = vec![0u8; size];
    let written = msg.encode_binary(&ectx, &mut buf).unwrap();
    assert_eq!(written, size);
    // one byte short fails without committing output
    let mut short = vec![0u8; size - 1];
    assert_eq!(msg.encode_binary(&ectx, &mut short), Err(Error::LimitsExceeded));

    let (back, end) = NetworkMessage::decode_binary(&buf, &dctx).unwrap();
    assert_eq!(end, size);
    let mut expect = msg.clone();
    expect.message_id = Guid::NULL;
    assert_eq!(back, expect);
}

#[test]
fn json_snapshot_network_message() {
    let msg = NetworkMessage {
        version: 1,
        message_id: Guid::parse("32235546-05D9-4FD7-97DF-EA3FF3408574").unwrap(),
        publisher_id: Some(PublisherId::UInt16(2234)),
        dataset_class_id: Some(Guid::parse("00000005-CAB9-4470-8F8A-2C1EAD207E0E").unwrap()),
        payload_header: Some(vec![62541]),
        messages: vec![DataSetMessage::key_frame(
            62541,
            FieldEncoding::Variant,
            vec![
                DataValue::of(Variant::Boolean(true)),
                DataValue::of(Variant::LocalizedText(Box::new(LocalizedText::new(
                    "en", "running",
                )))),
            ],
        )],
        ..Default::default()
    };
    let table = DataTypeTable::new();
    let ctx = JsonCtx::reversible(&table);
    let names = vec![vec!["Enabled".to_owned(), "State".to_owned()]];
    let size = msg.calc_size_json(&names, &ctx).unwrap();
    let mut buf = vec![0u8; size];
    msg.encode_json(&names, &ctx, &mut buf).unwrap();
    insta::assert_snapshot!(
        String::from_utf8(buf).unwrap(),
        @r#"{"MessageId":"32235546-05D9-4FD7-97DF-EA3FF3408574","MessageType":"ua-data","PublisherId":2234,"DataSetClassId":"00000005-CAB9-4470-8F8A-2C1EAD207E0E","Messages":[{"DataSetWriterId":"62541","Payload":{"Enabled":{"Type":1,"Body":true},"State":{"Type":21,"Body":{"Locale":"en","Text":"running"}}}}]}"#
    );
}

#[test]
fn json_root_primitive_accepted_object_required_otherwise() {
    let table = DataTypeTable::new();
    let ctx = JsonCtx::reversible(&table);
    // a lone primitive or string root decodes directly
    assert_eq!(crate::json::decode::<u32>(b"42", &ctx).unwrap(), 42);
    assert_eq!(
        crate::json::decode::<UaString>(br#""x""#, &ctx).unwrap(),
        UaString(Some("x".into()))
    );
    // an array root is rejected
    assert!(crate::json::decode::<u32>(b"[42]", &ctx).is_err());
}
