//! Wire envelopes.
//!
//! Every message crossing a partition boundary is a bincode-encoded
//! [`Envelope`] wrapping a bincode-encoded payload. The outer layer carries
//! routing and pairing (partition, sequence, role); the inner payload is
//! whatever the caller and handler agree on.

use crate::Result;
use meshless_space::PartitionId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Role of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Request,
    Reply,
    /// The handler failed; the payload is a UTF-8 message.
    Failure,
}

/// Routing header plus opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub partition: PartitionId,
    pub sequence: u64,
    pub kind: MessageKind,
    pub body: Vec<u8>,
}

impl Envelope {
    /// Wrap a typed payload.
    pub fn new<T: Serialize>(
        partition: PartitionId,
        sequence: u64,
        kind: MessageKind,
        payload: &T,
    ) -> Result<Self> {
        Ok(Self {
            partition,
            sequence,
            kind,
            body: bincode::serialize(payload)?,
        })
    }

    /// Reply to this envelope with a typed payload.
    pub fn reply<T: Serialize>(&self, payload: &T) -> Result<Self> {
        Self::new(self.partition, self.sequence, MessageKind::Reply, payload)
    }

    /// Failure reply carrying a message.
    pub fn failure(&self, message: &str) -> Result<Self> {
        Self::new(self.partition, self.sequence, MessageKind::Failure, &message)
    }

    /// Decode the payload.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(bincode::deserialize(&self.body)?)
    }

    /// Serialize for transmission.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Probe {
        center: [f64; 3],
        radius: f64,
    }

    #[test]
    fn reply_keeps_routing_header() {
        let request = Envelope::new(PartitionId(3), 41, MessageKind::Request, &7u32).unwrap();
        let reply = request.reply(&"done").unwrap();
        assert_eq!(reply.partition, PartitionId(3));
        assert_eq!(reply.sequence, 41);
        assert_eq!(reply.kind, MessageKind::Reply);
        assert_eq!(reply.payload::<String>().unwrap(), "done");
    }

    #[test]
    fn nested_payload_survives_wire() {
        let probe = Probe {
            center: [1.0, -2.5, 1e-300],
            radius: 0.75,
        };
        let bytes = Envelope::new(PartitionId(0), 1, MessageKind::Request, &probe)
            .unwrap()
            .to_bytes()
            .unwrap();
        let back = Envelope::from_bytes(&bytes).unwrap();
        assert_eq!(back.payload::<Probe>().unwrap(), probe);
    }

    #[test]
    fn truncated_bytes_are_a_codec_error() {
        let bytes = Envelope::new(PartitionId(0), 1, MessageKind::Request, &[0u8; 16])
            .unwrap()
            .to_bytes()
            .unwrap();
        let err = Envelope::from_bytes(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, crate::Error::Codec(_)), "got {err:?}");
    }
}
