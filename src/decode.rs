// src/decode.rs
use crate::address::Address;
use crate::error::{Error, Result};
use crate::packets::Endpoints;
use etherparse::{LaxNetSlice, LaxSlicedPacket};
use std::path::Path;
use std::sync::Arc;

/// Lazy, single-pass sequence of decoded packets. `Ok(None)` marks a packet
/// without an IPv4 header.
pub type PacketStream = Box<dyn Iterator<Item = Result<Option<Endpoints>>> + Send>;

/// Turns a capture artifact on disk into a [`PacketStream`].
pub trait PacketDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<PacketStream>;
}

const ETHERTYPE_IPV4: [u8; 2] = [0x08, 0x00];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer {
    Ethernet,
    RawIp,
    /// Linux cooked capture (`-i any`), 16-byte header.
    LinuxSll,
    /// Linux cooked capture v2, 20-byte header.
    LinuxSll2,
    /// BSD loopback (NULL and LOOP): 4-byte address family, then the IP packet.
    Loopback,
    /// Anything else; every frame decodes to `None`.
    Other(u32),
}

/// Source and destination of an IPv4 frame; `None` for anything else.
///
/// Frames cut short by the snapshot length still count as long as the IPv4
/// header itself is complete.
pub fn endpoints(link: LinkLayer, data: &[u8]) -> Option<Endpoints> {
    let sliced = match link {
        LinkLayer::Ethernet => LaxSlicedPacket::from_ethernet(data).ok()?,
        LinkLayer::RawIp => LaxSlicedPacket::from_ip(data).ok()?,
        LinkLayer::LinuxSll => ipv4_after(data, 14, 16)?,
        LinkLayer::LinuxSll2 => ipv4_after(data, 0, 20)?,
        LinkLayer::Loopback => LaxSlicedPacket::from_ip(data.get(4..)?).ok()?,
        LinkLayer::Other(_) => return None,
    };

    match sliced.net {
        Some(LaxNetSlice::Ipv4(ipv4)) => {
            let header = ipv4.header();
            Some((
                Address::from(header.source_addr()),
                Address::from(header.destination_addr()),
            ))
        }
        _ => None,
    }
}

/// Slices the payload of a cooked-capture header whose protocol field at
/// `proto_at` says IPv4.
fn ipv4_after(data: &[u8], proto_at: usize, header_len: usize) -> Option<LaxSlicedPacket<'_>> {
    if data.get(proto_at..proto_at + 2)? != ETHERTYPE_IPV4.as_slice() {
        return None;
    }
    LaxSlicedPacket::from_ip(data.get(header_len..)?).ok()
}

/// Stand-in used when the crate is built without capture-file support.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableDecoder;

impl PacketDecoder for UnavailableDecoder {
    fn decode(&self, _path: &Path) -> Result<PacketStream> {
        Err(Error::ToolUnavailable(
            "packet decoding unavailable: built without the `pcap` feature".into(),
        ))
    }
}

#[cfg(feature = "pcap")]
pub use offline::PcapDecoder;

pub fn default_decoder() -> Arc<dyn PacketDecoder> {
    #[cfg(feature = "pcap")]
    {
        Arc::new(PcapDecoder)
    }
    #[cfg(not(feature = "pcap"))]
    {
        Arc::new(UnavailableDecoder)
    }
}

#[cfg(feature = "pcap")]
mod offline {
    use super::{endpoints, LinkLayer, PacketDecoder, PacketStream};
    use crate::error::{Error, Result};
    use crate::packets::Endpoints;
    use pcap::{Capture, Linktype, Offline};
    use std::path::Path;
    use tracing::{debug, warn};

    /// Reads pcap/pcapng files through libpcap's offline reader.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct PcapDecoder;

    impl PacketDecoder for PcapDecoder {
        fn decode(&self, path: &Path) -> Result<PacketStream> {
            let capture = Capture::from_file(path)
                .map_err(|e| Error::ParseFailed(format!("{}: {e}", path.display())))?;

            let link = match capture.get_datalink() {
                Linktype::ETHERNET => LinkLayer::Ethernet,
                // DLT_RAW differs per platform; 101 and 228 are the file-format values.
                Linktype(12) | Linktype(14) | Linktype(101) | Linktype(228) => LinkLayer::RawIp,
                Linktype(113) => LinkLayer::LinuxSll,
                Linktype(276) => LinkLayer::LinuxSll2,
                Linktype(0) | Linktype(108) => LinkLayer::Loopback,
                Linktype(other) => LinkLayer::Other(other as u32),
            };
            if let LinkLayer::Other(code) = link {
                warn!("{}: link type {code} carries no IPv4 endpoints", path.display());
            } else {
                debug!("Decoding {} as {:?}", path.display(), link);
            }

            Ok(Box::new(OfflinePackets {
                capture: Some(capture),
                link,
            }))
        }
    }

    struct OfflinePackets {
        capture: Option<Capture<Offline>>,
        link: LinkLayer,
    }

    impl Iterator for OfflinePackets {
        type Item = Result<Option<Endpoints>>;

        fn next(&mut self) -> Option<Self::Item> {
            let capture = self.capture.as_mut()?;
            let link = self.link;
            let outcome = match capture.next_packet() {
                Ok(packet) => Ok(endpoints(link, packet.data)),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(pair) => Some(Ok(pair)),
                Err(pcap::Error::NoMorePackets) => {
                    self.capture = None;
                    None
                }
                Err(e) => {
                    self.capture = None;
                    Some(Err(Error::ParseFailed(e.to_string())))
                }
            }
        }
    }
}
