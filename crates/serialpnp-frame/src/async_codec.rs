//! `tokio_util::codec` adapter over [`FrameDecoder`].

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::codec::{encode_frame, FrameConfig, FrameDecoder};
use crate::error::FrameError;
use crate::packet::Packet;

/// Packet codec for `FramedRead`/`FramedWrite` over tokio streams.
#[derive(Debug)]
pub struct PnpCodec {
    decoder: FrameDecoder,
    max_packet_size: usize,
    framing_errors: u64,
}

impl PnpCodec {
    pub fn new() -> Self {
        Self::with_config(&FrameConfig::default())
    }

    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            decoder: FrameDecoder::new(config.max_packet_size),
            max_packet_size: config.max_packet_size,
            framing_errors: 0,
        }
    }

    /// Partial packets discarded so far.
    pub fn framing_errors(&self) -> u64 {
        self.framing_errors
    }
}

impl Default for PnpCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PnpCodec {
    type Item = Packet;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, FrameError> {
        while src.has_remaining() {
            match self.decoder.push(src.get_u8()) {
                Ok(Some(packet)) => return Ok(Some(packet)),
                Ok(None) => {}
                Err(err) if err.is_framing() => {
                    self.framing_errors += 1;
                    warn!(error = %err, "framing error; waiting for next start marker");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }
}

impl Encoder<Packet> for PnpCodec {
    type Error = FrameError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<(), FrameError> {
        if packet.length() > self.max_packet_size {
            return Err(FrameError::PacketTooLarge {
                size: packet.length(),
                max: self.max_packet_size,
            });
        }
        encode_frame(&packet, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use tokio_util::codec::FramedRead;

    use super::*;
    use crate::packet::PacketType;

    #[test]
    fn decode_consumes_one_packet_at_a_time() {
        let mut codec = PnpCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Packet::empty(PacketType::ResetRequest), &mut buf)
            .unwrap();
        codec
            .encode(Packet::new(PacketType::EventNotification, vec![0, 1, b'e']), &mut buf)
            .unwrap();

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.packet_type, PacketType::ResetRequest);
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second.body.as_ref(), &[0, 1, b'e']);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[tokio::test]
    async fn framed_read_skips_garbage() {
        let mut wire = BytesMut::from(&[0x5A, 0x01, 0x00, 0x02, 0x00][..]);
        PnpCodec::new()
            .encode(Packet::empty(PacketType::DescriptorRequest), &mut wire)
            .unwrap();
        let bytes = wire.to_vec();

        let mut framed = FramedRead::new(bytes.as_slice(), PnpCodec::new());
        let packet = framed.next().await.unwrap().unwrap();
        assert_eq!(packet.packet_type, PacketType::DescriptorRequest);
        assert_eq!(framed.decoder().framing_errors(), 1);
        assert!(framed.next().await.is_none());
    }
}
