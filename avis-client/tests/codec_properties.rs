//! Property tests for the XDR codec

use avis_client::{Codec, CodecError, Message, XdrCodec};
use avis_types::{Attributes, Value};
use proptest::prelude::*;

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        ".{0,24}".prop_map(Value::String),
        any::<i32>().prop_map(Value::Int32),
        any::<i64>().prop_map(Value::Int64),
        // any bit pattern, NaN payloads included
        any::<u64>().prop_map(|bits| Value::Real64(f64::from_bits(bits))),
        proptest::collection::vec(prop_oneof![Just(0u8), any::<u8>()], 0..40)
            .prop_map(Value::Opaque),
    ]
}

fn attributes_strategy() -> impl Strategy<Value = Attributes> {
    proptest::collection::vec((".{1,12}", value_strategy()), 0..12).prop_map(|entries| {
        let mut attrs = Attributes::new();
        for (name, value) in entries {
            attrs.set(name, value).unwrap();
        }
        attrs
    })
}

fn assert_same(decoded: &Attributes, original: &Attributes) -> Result<(), TestCaseError> {
    prop_assert_eq!(decoded.len(), original.len());
    for ((name, value), (expected_name, expected)) in decoded.iter().zip(original.iter()) {
        prop_assert_eq!(name, expected_name);
        prop_assert!(value.bit_eq(expected), "{} differs", name);
    }
    Ok(())
}

proptest! {
    #[test]
    fn attributes_survive_encoding(attrs in attributes_strategy()) {
        let codec = XdrCodec::default();
        let encoded = codec.encode(&attrs);
        prop_assert_eq!(encoded.len() % 4, 0);

        let decoded = codec.decode(&encoded).unwrap();
        assert_same(&decoded, &attrs)?;
    }

    #[test]
    fn emit_frames_survive_encoding(attrs in attributes_strategy(), insecure in any::<bool>()) {
        let codec = XdrCodec::default();
        let frame = codec
            .encode_frame(&Message::NotifyEmit {
                attributes: attrs.clone(),
                deliver_insecure: insecure,
            })
            .unwrap();

        match codec.decode_frame(&frame).unwrap() {
            Message::NotifyEmit { attributes, deliver_insecure } => {
                prop_assert_eq!(deliver_insecure, insecure);
                assert_same(&attributes, &attrs)?;
            }
            other => prop_assert!(false, "decoded {}", other.name()),
        }
    }

    #[test]
    fn truncated_frames_are_rejected(attrs in attributes_strategy(), cut in 1usize..64) {
        let codec = XdrCodec::default();
        let frame = codec
            .encode_frame(&Message::NotifyDeliver {
                attributes: attrs,
                secure_matches: vec![],
                insecure_matches: vec![],
            })
            .unwrap();
        let cut = cut.min(frame.len());

        let result = codec.decode_frame(&frame[..frame.len() - cut]);
        prop_assert!(matches!(
            result,
            Err(CodecError::Truncated { .. }) | Err(CodecError::Unaligned(_))
        ), "expected Truncated or Unaligned, got {:?}", result);
    }

    #[test]
    fn arbitrary_bytes_never_panic(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let codec = XdrCodec::default();
        let _ = codec.decode(&data);
        let _ = codec.decode_frame(&data);
    }
}
