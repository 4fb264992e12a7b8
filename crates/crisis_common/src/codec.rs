use codee::{Decoder, Encoder};
use serde::{de::DeserializeOwned, Serialize};

/// Text-frame codec for the crisis socket: one JSON document per frame.
///
/// Used with `leptos_use::use_websocket_with_options`; because the encoded
/// form is a `String` the socket sends text frames, which is what the
/// backend expects.
pub struct PacketJsonCodec;

impl<T: Serialize> Encoder<T> for PacketJsonCodec {
    type Error = serde_json::Error;
    type Encoded = String;

    fn encode(val: &T) -> Result<Self::Encoded, Self::Error> {
        serde_json::to_string(val)
    }
}

impl<T: DeserializeOwned> Decoder<T> for PacketJsonCodec {
    type Error = serde_json::Error;
    type Encoded = str;

    fn decode(val: &Self::Encoded) -> Result<T, Self::Error> {
        serde_json::from_str(val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Packet;

    #[test]
    fn test_packet_frame_shape() {
        let packet = Packet::new("join_incident", serde_json::json!({ "incident_id": 7 }));

        let enc = <PacketJsonCodec as Encoder<Packet>>::encode(&packet).unwrap();
        assert_eq!(enc, r#"{"event":"join_incident","data":{"incident_id":7}}"#);

        let dec: Packet = PacketJsonCodec::decode(enc.as_str()).unwrap();
        assert_eq!(dec, packet);
    }

    #[test]
    fn test_missing_data_defaults_to_null() {
        let dec: Packet = PacketJsonCodec::decode(r#"{"event":"left_incident"}"#).unwrap();
        assert_eq!(dec.event, "left_incident");
        assert!(dec.data.is_null());
    }

    #[test]
    fn test_garbage_frame_is_an_error() {
        let res: Result<Packet, _> = PacketJsonCodec::decode("not json");
        assert!(res.is_err());
    }
}
