use std::io::{Read, Write};
use std::time::{Duration, Instant};

use serialpnp_descriptor::{decode_descriptor, DeviceDescriptor};
use serialpnp_frame::{FrameError, Packet, PacketReader, PacketType, PacketWriter};
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::{HostError, Result};

/// Reset the device: send RESET_REQUEST until a RESET_RESPONSE arrives.
///
/// The reader's stream must have a read timeout for the per-attempt deadline
/// to fire.
pub fn reset_device<R: Read, W: Write>(
    reader: &mut PacketReader<R>,
    writer: &mut PacketWriter<W>,
    config: &SessionConfig,
) -> Result<()> {
    request_with_retry(
        reader,
        writer,
        config,
        PacketType::ResetRequest,
        PacketType::ResetResponse,
        "reset",
    )
    .map(|_| ())
}

/// Request and decode the device descriptor.
pub fn fetch_descriptor<R: Read, W: Write>(
    reader: &mut PacketReader<R>,
    writer: &mut PacketWriter<W>,
    config: &SessionConfig,
) -> Result<DeviceDescriptor> {
    let packet = request_with_retry(
        reader,
        writer,
        config,
        PacketType::DescriptorRequest,
        PacketType::DescriptorResponse,
        "descriptor discovery",
    )?;
    Ok(decode_descriptor(&packet.body)?)
}

fn request_with_retry<R: Read, W: Write>(
    reader: &mut PacketReader<R>,
    writer: &mut PacketWriter<W>,
    config: &SessionConfig,
    request: PacketType,
    expected: PacketType,
    stage: &'static str,
) -> Result<Packet> {
    let attempts = config.reset_attempts.max(1);
    for attempt in 1..=attempts {
        debug!(stage, attempt, "sending {request}");
        writer.write_packet(&Packet::empty(request))?;

        match await_packet(reader, expected, config.response_timeout) {
            Ok(packet) => return Ok(packet),
            Err(HostError::Timeout(_)) => {
                warn!(stage, attempt, attempts, "no {expected} from device");
                if attempt < attempts {
                    std::thread::sleep(config.retry_interval);
                }
            }
            Err(err) => return Err(err),
        }
    }
    Err(HostError::ConnectFailed { stage, attempts })
}

/// Wait up to `timeout` for a packet of type `expected`; other types are dropped.
///
/// The deadline holds even when the device streams unrelated packets faster
/// than the link read timeout.
pub(crate) fn await_packet<R: Read>(
    reader: &mut PacketReader<R>,
    expected: PacketType,
    timeout: Duration,
) -> Result<Packet> {
    let deadline = Instant::now() + timeout;
    loop {
        if Instant::now() >= deadline {
            return Err(HostError::Timeout(timeout));
        }

        match reader.read_packet_of_until(expected, deadline) {
            Ok(packet) => return Ok(packet),
            Err(err) if err.is_timeout() => continue,
            Err(FrameError::ConnectionClosed) => {
                return Err(HostError::Disconnected(format!(
                    "link closed while waiting for {expected}"
                )));
            }
            Err(err) => return Err(HostError::Frame(err)),
        }
    }
}
