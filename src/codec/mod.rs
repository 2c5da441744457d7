//! OSC binary codec
//!
//! Stateless encoding and decoding of OSC messages and bundles to and from
//! byte buffers. All multi-byte values are big-endian and every block is
//! NUL padded to a 4-byte boundary.

pub mod argument;
pub mod decoder;
pub mod encoder;
pub mod timetag;

pub use argument::{arguments_to_string, Argument};
pub use decoder::{is_bundle, next_argument, parse_bundle, parse_message, Bundle, Message};
pub use encoder::{encode_message, message_len, write_message, BundleWriter};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::borrow::Cow;

    fn round_trip(argument: Argument<'_>) {
        let packet = encode_message("/t", std::slice::from_ref(&argument)).unwrap();
        assert_eq!(packet.len() % 4, 0);
        let msg = parse_message(&packet).unwrap();
        assert_eq!(msg.address(), "/t");
        let decoded: Vec<_> = msg.arguments().collect();
        assert_eq!(decoded, vec![argument]);
    }

    #[test]
    fn test_round_trip_edge_values() {
        round_trip(Argument::Int32(0));
        round_trip(Argument::Int32(i32::MIN));
        round_trip(Argument::Int32(i32::MAX));
        round_trip(Argument::Int64(-1));
        round_trip(Argument::Int64(i64::MAX));
        round_trip(Argument::Float32(f32::MAX));
        round_trip(Argument::Float32(-0.5));
        round_trip(Argument::Float64(f64::MIN));
        round_trip(Argument::String(Cow::Borrowed("")));
        round_trip(Argument::String(Cow::Borrowed("reverb")));
        round_trip(Argument::Blob(Cow::Borrowed(&[])));
        round_trip(Argument::Blob(Cow::Borrowed(&[0xc0, 0xdb, 0x00])));
        round_trip(Argument::Midi([0, 0x90, 60, 127]));
        round_trip(Argument::Timetag(timetag::IMMEDIATELY));
        round_trip(Argument::Bool(true));
        round_trip(Argument::Bool(false));
    }

    proptest! {
        #[test]
        fn prop_blocks_are_padded(
            address in "/[a-z]{0,12}(/[a-z0-9]{1,8}){0,3}",
            ints in prop::collection::vec(any::<i32>(), 0..6),
        ) {
            let args: Vec<_> = ints.into_iter().map(Argument::Int32).collect();
            let packet = encode_message(&address, &args).unwrap();

            let address_block = (address.len() + 4) & !3;
            prop_assert_eq!(packet[address.len()], 0);
            prop_assert_eq!(address_block % 4, 0);
            prop_assert_eq!(packet[address_block], b',');

            let format_end = address_block + args.len() + 1;
            prop_assert_eq!(packet[format_end], 0);
            prop_assert_eq!(packet.len() % 4, 0);

            let msg = parse_message(&packet).unwrap();
            prop_assert_eq!(msg.address(), address.as_str());
            prop_assert_eq!(msg.arguments().count(), args.len());
        }

        #[test]
        fn prop_parse_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..96)) {
            if let Ok(msg) = parse_message(&bytes) {
                prop_assert_eq!(msg.arguments().count(), msg.argument_count());
            }
            if let Ok(bundle) = parse_bundle(&bytes) {
                let total: usize = bundle.messages().map(|m| m.len() + 4).sum();
                prop_assert_eq!(total + 16, bundle.len());
            }
        }
    }
}
