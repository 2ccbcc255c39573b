use bytes::Bytes;

use crate::error::ProtocolError;
use crate::protocol::{ListReply, ListRequest};

/// Wire encoding of list-protocol messages.
///
/// The list session only marshals requests and unmarshals replies; a site
/// codec for the service's native encoding plugs in here.
pub trait ListCodec: Send + Sync {
    fn marshal(&self, request: &ListRequest) -> Result<Bytes, ProtocolError>;

    fn unmarshal(&self, payload: &[u8]) -> Result<ListReply, ProtocolError>;
}

/// JSON encoding of the message enums, tagged by `kind`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ListCodec for JsonCodec {
    fn marshal(&self, request: &ListRequest) -> Result<Bytes, ProtocolError> {
        Ok(Bytes::from(serde_json::to_vec(request)?))
    }

    fn unmarshal(&self, payload: &[u8]) -> Result<ListReply, ProtocolError> {
        if payload.is_empty() {
            return Err(ProtocolError::Empty);
        }
        Ok(serde_json::from_slice(payload)?)
    }
}

impl<C: ListCodec + ?Sized> ListCodec for Box<C> {
    fn marshal(&self, request: &ListRequest) -> Result<Bytes, ProtocolError> {
        (**self).marshal(request)
    }

    fn unmarshal(&self, payload: &[u8]) -> Result<ListReply, ProtocolError> {
        (**self).unmarshal(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmarshals_service_replies() {
        let reply = JsonCodec
            .unmarshal(br#"{"kind":"OpenList","list_id":42}"#)
            .unwrap();
        assert_eq!(reply, ListReply::OpenList { list_id: 42 });
    }

    #[test]
    fn empty_and_garbage_payloads_fail() {
        assert!(matches!(JsonCodec.unmarshal(b""), Err(ProtocolError::Empty)));
        assert!(matches!(
            JsonCodec.unmarshal(b"\x00\x01"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            JsonCodec.unmarshal(br#"{"kind":"NoSuchReply"}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn marshals_requests() {
        let bytes = JsonCodec
            .marshal(&ListRequest::StopList { list_id: 3 })
            .unwrap();
        assert_eq!(bytes.as_ref(), br#"{"kind":"StopList","list_id":3}"#);
    }

    #[test]
    fn boxed_codec_delegates() {
        let codec: Box<dyn ListCodec> = Box::new(JsonCodec);
        let bytes = codec.marshal(&ListRequest::ServiceDiscovery).unwrap();
        assert_eq!(bytes.as_ref(), br#"{"kind":"ServiceDiscovery"}"#);
    }
}
