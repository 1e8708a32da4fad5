use std::io::{ErrorKind, Write};

use bytes::{Bytes, BytesMut};
use serialpnp_transport::LinkStream;
use tracing::{debug, trace};

use crate::codec::{encode_frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::packet::{Packet, PacketType};
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes complete packets to any `Write` stream.
pub struct PacketWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> PacketWriter<T> {
    /// Create a new packet writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new packet writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Frame and write a complete packet (blocking).
    ///
    /// A write timeout on the underlying stream ends the call with
    /// [`FrameError::Io`] for which [`FrameError::is_timeout`] holds. The
    /// peer may then hold a truncated frame, which its decoder drops at the
    /// next start marker.
    pub fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        if packet.length() > self.config.max_packet_size {
            return Err(FrameError::PacketTooLarge {
                size: packet.length(),
                max: self.config.max_packet_size,
            });
        }

        self.buf.clear();
        encode_frame(packet, &mut self.buf)?;
        trace!(
            packet_type = %packet.packet_type,
            length = packet.length(),
            wire = self.buf.len(),
            "writing packet"
        );

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    if offset > 0 {
                        debug!(
                            offset,
                            wire = self.buf.len(),
                            error = %err,
                            "frame write cut short"
                        );
                    }
                    return Err(FrameError::Io(err));
                }
            }
        }

        self.flush()
    }

    /// Build and write a packet with a zero reserved byte.
    pub fn send(&mut self, packet_type: PacketType, body: impl Into<Bytes>) -> Result<()> {
        self.write_packet(&Packet::new(packet_type, body))
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current packet writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl PacketWriter<LinkStream> {
    /// Create a packet writer for a `LinkStream` and apply the write timeout from config.
    pub fn with_config_link(inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};

    use super::*;
    use crate::reader::PacketReader;

    #[test]
    fn write_then_read_back() {
        let mut writer = PacketWriter::new(Vec::new());
        writer.send(PacketType::ResetRequest, Bytes::new()).unwrap();
        writer
            .write_packet(&Packet::new(PacketType::CommandResponse, vec![0, 1, b'x']).with_reserved(2))
            .unwrap();

        let mut reader = PacketReader::new(Cursor::new(writer.into_inner()));
        assert_eq!(reader.read_packet().unwrap().packet_type, PacketType::ResetRequest);
        let response = reader.read_packet().unwrap();
        assert_eq!(response.reserved, 2);
        assert_eq!(response.body.as_ref(), &[0, 1, b'x']);
    }

    #[test]
    fn rejects_packet_over_configured_limit() {
        let config = FrameConfig {
            max_packet_size: 16,
            ..Default::default()
        };
        let mut writer = PacketWriter::with_config(Vec::new(), config);
        let result = writer.send(PacketType::DescriptorResponse, vec![0u8; 13]);
        assert!(matches!(
            result,
            Err(FrameError::PacketTooLarge { size: 17, max: 16 })
        ));
        assert!(writer.get_ref().is_empty());
    }

    #[test]
    fn retries_interrupted_and_short_writes() {
        struct Flaky {
            out: Vec<u8>,
            calls: usize,
        }

        impl Write for Flaky {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.calls += 1;
                if self.calls % 2 == 1 {
                    return Err(io::Error::from(io::ErrorKind::Interrupted));
                }
                let n = buf.len().min(2);
                self.out.extend_from_slice(&buf[..n]);
                Ok(n)
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut writer = PacketWriter::new(Flaky {
            out: Vec::new(),
            calls: 0,
        });
        writer
            .send(PacketType::EventNotification, vec![0, 1, b'e', 0x5A])
            .unwrap();

        let mut reader = PacketReader::new(Cursor::new(writer.into_inner().out));
        assert_eq!(reader.read_packet().unwrap().body.as_ref(), &[0, 1, b'e', 0x5A]);
    }

    #[test]
    fn would_block_surfaces_as_timeout() {
        struct Full {
            calls: usize,
        }

        impl Write for Full {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.calls += 1;
                if self.calls == 1 {
                    return Ok(buf.len().min(3));
                }
                Err(io::Error::from(io::ErrorKind::WouldBlock))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut writer = PacketWriter::new(Full { calls: 0 });
        let err = writer
            .send(PacketType::EventNotification, vec![0u8; 32])
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(writer.get_ref().calls, 2);
    }

    #[cfg(unix)]
    #[test]
    fn stalled_peer_hits_write_timeout() {
        let (a, _b) = LinkStream::pair().unwrap();
        let config = FrameConfig {
            write_timeout: Some(std::time::Duration::from_millis(100)),
            ..Default::default()
        };
        let mut writer = PacketWriter::with_config_link(a, config).unwrap();

        let started = std::time::Instant::now();
        let err = loop {
            if let Err(err) = writer.send(PacketType::EventNotification, vec![0u8; 4000]) {
                break err;
            }
            assert!(
                started.elapsed() < std::time::Duration::from_secs(5),
                "peer buffer never filled"
            );
        };
        assert!(err.is_timeout(), "unexpected error: {err}");
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn zero_length_write_is_connection_closed() {
        struct Closed;

        impl Write for Closed {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Ok(0)
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut writer = PacketWriter::new(Closed);
        assert!(matches!(
            writer.send(PacketType::ResetRequest, Bytes::new()),
            Err(FrameError::ConnectionClosed)
        ));
    }
}
