use std::io::{self, ErrorKind, Read};
use std::time::Instant;

use bytes::{Buf, BytesMut};
use serialpnp_transport::LinkStream;
use tracing::{debug, warn};

use crate::codec::{FrameConfig, FrameDecoder};
use crate::error::{FrameError, Result};
use crate::packet::{Packet, PacketType};

const READ_CHUNK_SIZE: usize = 1024;

/// Counters kept by a [`PacketReader`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Packets returned to the caller.
    pub packets: u64,
    /// Partial packets discarded because of framing errors.
    pub framing_errors: u64,
    /// Complete packets dropped by a type filter.
    pub filtered: u64,
}

/// Reads complete packets from any `Read` stream.
///
/// Handles partial reads and resynchronization internally. A read timeout on
/// the underlying stream surfaces as [`FrameError::Io`] without losing the
/// partially decoded packet, so callers can poll against a deadline.
pub struct PacketReader<T> {
    inner: T,
    buf: BytesMut,
    decoder: FrameDecoder,
    config: FrameConfig,
    stats: FrameStats,
}

impl<T: Read> PacketReader<T> {
    /// Create a new packet reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new packet reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            decoder: FrameDecoder::new(config.max_packet_size),
            config,
            stats: FrameStats::default(),
        }
    }

    /// Read the next complete packet of any type (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_packet(&mut self) -> Result<Packet> {
        self.next_packet(None, None)
    }

    /// Read the next complete packet of type `expected`, discarding others.
    pub fn read_packet_of(&mut self, expected: PacketType) -> Result<Packet> {
        self.next_packet(Some(expected), None)
    }

    /// Like [`read_packet_of`](Self::read_packet_of), but gives up once
    /// `deadline` has passed even while other packet types keep arriving.
    ///
    /// Expiry surfaces as an [`ErrorKind::TimedOut`] I/O error, so
    /// [`FrameError::is_timeout`] holds. Bytes already buffered stay queued.
    pub fn read_packet_of_until(
        &mut self,
        expected: PacketType,
        deadline: Instant,
    ) -> Result<Packet> {
        self.next_packet(Some(expected), Some(deadline))
    }

    fn next_packet(
        &mut self,
        filter: Option<PacketType>,
        deadline: Option<Instant>,
    ) -> Result<Packet> {
        let expired = || deadline.is_some_and(|at| Instant::now() >= at);
        loop {
            while self.buf.has_remaining() {
                let byte = self.buf.get_u8();
                match self.decoder.push(byte) {
                    Ok(None) => {}
                    Ok(Some(packet)) => {
                        if filter.is_some_and(|expected| expected != packet.packet_type) {
                            self.stats.filtered += 1;
                            debug!(
                                packet_type = %packet.packet_type,
                                "discarding packet that does not match filter"
                            );
                            if expired() {
                                return Err(FrameError::Io(io::Error::from(ErrorKind::TimedOut)));
                            }
                            continue;
                        }
                        self.stats.packets += 1;
                        return Ok(packet);
                    }
                    Err(err) if err.is_framing() => {
                        self.stats.framing_errors += 1;
                        warn!(error = %err, "framing error; waiting for next start marker");
                    }
                    Err(err) => return Err(err),
                }
            }

            if expired() {
                return Err(FrameError::Io(io::Error::from(ErrorKind::TimedOut)));
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Counters accumulated since creation.
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current packet reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl PacketReader<LinkStream> {
    /// Create a packet reader for a `LinkStream` and apply the read timeout from config.
    pub fn with_config_link(inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: serialpnp_transport::TransportError) -> FrameError {
    match err {
        serialpnp_transport::TransportError::Io(io)
        | serialpnp_transport::TransportError::Accept(io) => FrameError::Io(io),
        serialpnp_transport::TransportError::Bind { source, .. }
        | serialpnp_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::codec::encode_frame;

    fn wire(packets: &[Packet]) -> Vec<u8> {
        let mut out = BytesMut::new();
        for packet in packets {
            encode_frame(packet, &mut out).unwrap();
        }
        out.to_vec()
    }

    #[test]
    fn read_single_packet() {
        let bytes = wire(&[Packet::new(PacketType::EventNotification, vec![0, 1, b't'])]);
        let mut reader = PacketReader::new(Cursor::new(bytes));
        let packet = reader.read_packet().unwrap();

        assert_eq!(packet.packet_type, PacketType::EventNotification);
        assert_eq!(packet.body.as_ref(), &[0, 1, b't']);
        assert_eq!(reader.stats().packets, 1);
    }

    #[test]
    fn read_multiple_packets_in_order() {
        let bytes = wire(&[
            Packet::empty(PacketType::ResetRequest),
            Packet::empty(PacketType::DescriptorRequest),
            Packet::new(PacketType::CommandRequest, vec![0, 2, b'g', b'o']),
        ]);
        let mut reader = PacketReader::new(Cursor::new(bytes));

        assert_eq!(reader.read_packet().unwrap().packet_type, PacketType::ResetRequest);
        assert_eq!(
            reader.read_packet().unwrap().packet_type,
            PacketType::DescriptorRequest
        );
        assert_eq!(
            reader.read_packet().unwrap().packet_type,
            PacketType::CommandRequest
        );
        assert!(matches!(reader.read_packet(), Err(FrameError::ConnectionClosed)));
    }

    #[test]
    fn filter_discards_other_types() {
        let bytes = wire(&[
            Packet::new(PacketType::EventNotification, vec![0, 0]),
            Packet::empty(PacketType::ResetResponse),
        ]);
        let mut reader = PacketReader::new(Cursor::new(bytes));

        let packet = reader.read_packet_of(PacketType::ResetResponse).unwrap();
        assert_eq!(packet.packet_type, PacketType::ResetResponse);
        assert_eq!(reader.stats().filtered, 1);
    }

    #[test]
    fn corrupted_stream_yields_only_valid_packet() {
        let valid = Packet::new(PacketType::PropertyNotification, vec![0, 1, b'p', 0x5A]);
        let mut bytes = vec![0x5A, 0x30, 0x00, 0x08, 0x00, 0x01];
        bytes.extend(wire(std::slice::from_ref(&valid)));

        let mut reader = PacketReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_packet().unwrap(), valid);
        assert!(matches!(reader.read_packet(), Err(FrameError::ConnectionClosed)));
    }

    #[test]
    fn bad_length_is_counted_not_fatal() {
        let mut bytes = vec![0x5A, 0x02, 0x00, 0x01, 0x00];
        bytes.extend(wire(&[Packet::empty(PacketType::ResetResponse)]));

        let mut reader = PacketReader::new(Cursor::new(bytes));
        assert_eq!(
            reader.read_packet().unwrap().packet_type,
            PacketType::ResetResponse
        );
        assert_eq!(reader.stats().framing_errors, 1);
    }

    #[test]
    fn partial_reads_across_chunk_boundaries() {
        struct ByteAtATime {
            data: Vec<u8>,
            pos: usize,
            reads: Arc<Mutex<usize>>,
        }

        impl Read for ByteAtATime {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                *self.reads.lock().unwrap() += 1;
                if self.pos >= self.data.len() || buf.is_empty() {
                    return Ok(0);
                }
                buf[0] = self.data[self.pos];
                self.pos += 1;
                Ok(1)
            }
        }

        let packet = Packet::new(PacketType::CommandResponse, vec![0x5A, 0xEF, 0x00]);
        let data = wire(std::slice::from_ref(&packet));
        let expected_reads = data.len();
        let reads = Arc::new(Mutex::new(0));
        let mut reader = PacketReader::new(ByteAtATime {
            data,
            pos: 0,
            reads: Arc::clone(&reads),
        });

        assert_eq!(reader.read_packet().unwrap(), packet);
        assert_eq!(*reads.lock().unwrap(), expected_reads);
    }

    #[test]
    fn timeout_preserves_partial_packet() {
        struct Stalling {
            chunks: Vec<std::io::Result<Vec<u8>>>,
        }

        impl Read for Stalling {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.chunks.is_empty() {
                    return Ok(0);
                }
                let chunk = self.chunks.remove(0)?;
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
        }

        let bytes = wire(&[Packet::new(PacketType::EventNotification, vec![0, 1, b'e'])]);
        let (head, tail) = bytes.split_at(3);
        let mut reader = PacketReader::new(Stalling {
            chunks: vec![
                Ok(head.to_vec()),
                Err(std::io::Error::from(ErrorKind::WouldBlock)),
                Ok(tail.to_vec()),
            ],
        });

        let err = reader.read_packet().unwrap_err();
        assert!(err.is_timeout());
        let packet = reader.read_packet().unwrap();
        assert_eq!(packet.body.as_ref(), &[0, 1, b'e']);
    }

    #[test]
    fn deadline_ends_filtered_wait_on_busy_stream() {
        struct Endless {
            frame: Vec<u8>,
        }

        impl Read for Endless {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                std::thread::sleep(std::time::Duration::from_millis(1));
                let n = self.frame.len().min(buf.len());
                buf[..n].copy_from_slice(&self.frame[..n]);
                Ok(n)
            }
        }

        let frame = wire(&[Packet::new(PacketType::EventNotification, vec![0, 0])]);
        let mut reader = PacketReader::new(Endless { frame });
        let started = Instant::now();
        let deadline = started + std::time::Duration::from_millis(50);

        let err = reader
            .read_packet_of_until(PacketType::ResetResponse, deadline)
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
        assert!(reader.stats().filtered > 0);
        assert_eq!(reader.stats().packets, 0);
    }

    #[test]
    fn deadline_still_returns_matching_packet() {
        let bytes = wire(&[
            Packet::new(PacketType::EventNotification, vec![0, 0]),
            Packet::empty(PacketType::ResetResponse),
        ]);
        let mut reader = PacketReader::new(Cursor::new(bytes));
        let deadline = Instant::now() + std::time::Duration::from_secs(5);
        let packet = reader
            .read_packet_of_until(PacketType::ResetResponse, deadline)
            .unwrap();
        assert_eq!(packet.packet_type, PacketType::ResetResponse);
    }

    #[cfg(unix)]
    #[test]
    fn with_config_link_applies_read_timeout() {
        let (a, _b) = LinkStream::pair().unwrap();
        let config = FrameConfig {
            read_timeout: Some(std::time::Duration::from_millis(20)),
            ..Default::default()
        };
        let mut reader = PacketReader::with_config_link(a, config).unwrap();
        assert!(reader.read_packet().unwrap_err().is_timeout());
    }
}
