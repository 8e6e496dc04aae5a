//! Byte-payload source, backed by `pcap-file` (pure-Rust pcap/pcapng
//! parsing, no libpcap linkage).
//!
//! [`CaptureSource`] is an `Iterator<Item = Vec<u8>>` over post-header-strip
//! payloads; the header-strip rule itself is exposed as free functions so it
//! can be unit-tested without a capture file fixture.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use pcap_file::pcap::PcapReader;
use pcap_file::pcapng::{Block, PcapNgReader};

use crate::error::{AhofaError, Result};

const ETH_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;
const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86dd;

const PROTO_ICMP: u8 = 1;
const PROTO_IP_IN_IP: u8 = 4;
const PROTO_TCP: u8 = 6;
const PROTO_UDP: u8 = 17;
const PROTO_IPV6_IN_IPV6: u8 = 41;
const PROTO_FRAGMENT: u8 = 44;
const PROTO_ESP: u8 = 50;
const PROTO_ICMPV6: u8 = 58;

/// Strips Ethernet/VLAN, IPv4/IPv6 and transport headers off a captured
/// frame, returning the payload. An empty vector means "skip this packet":
/// either a protocol this crate doesn't model, or a truncated frame.
pub fn strip_headers(frame: &[u8]) -> Vec<u8> {
    strip_ethernet(frame)
        .and_then(|(ethertype, rest)| strip_network(ethertype, rest))
        .unwrap_or_default()
}

fn strip_ethernet(frame: &[u8]) -> Option<(u16, &[u8])> {
    if frame.len() < ETH_HEADER_LEN {
        return None;
    }
    let mut offset = 12;
    let mut ethertype = u16::from_be_bytes([frame[offset], frame[offset + 1]]);
    offset += 2;
    if ethertype == ETHERTYPE_VLAN {
        if frame.len() < offset + VLAN_TAG_LEN {
            return None;
        }
        offset += 2;
        ethertype = u16::from_be_bytes([frame[offset], frame[offset + 1]]);
        offset += 2;
    }
    if frame.len() < offset {
        return None;
    }
    Some((ethertype, &frame[offset..]))
}

fn strip_network(ethertype: u16, data: &[u8]) -> Option<Vec<u8>> {
    match ethertype {
        ETHERTYPE_IPV4 => strip_ipv4(data),
        ETHERTYPE_IPV6 => strip_ipv6(data),
        _ => None,
    }
}

fn strip_ipv4(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() < 20 || data[0] >> 4 != 4 {
        return None;
    }
    let ihl = (data[0] & 0x0f) as usize * 4;
    if ihl < 20 || data.len() < ihl {
        return None;
    }
    strip_transport(data[9], &data[ihl..])
}

fn strip_ipv6(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() < 40 || data[0] >> 4 != 6 {
        return None;
    }
    let mut next_header = data[6];
    let mut offset = 40;
    loop {
        match next_header {
            PROTO_FRAGMENT => {
                if data.len() < offset + 8 {
                    return None;
                }
                next_header = data[offset];
                offset += 8;
            }
            PROTO_IPV6_IN_IPV6 => {
                return data.get(offset..).and_then(strip_ipv6);
            }
            _ => break,
        }
    }
    if data.len() < offset {
        return None;
    }
    strip_transport(next_header, &data[offset..])
}

fn strip_transport(protocol: u8, data: &[u8]) -> Option<Vec<u8>> {
    match protocol {
        PROTO_TCP => strip_tcp(data),
        PROTO_UDP => strip_udp(data),
        PROTO_ICMP => strip_icmp(data),
        PROTO_ICMPV6 => strip_fixed(data, 8),
        PROTO_ESP => strip_fixed(data, 8),
        PROTO_IP_IN_IP => strip_ipv4(data),
        PROTO_IPV6_IN_IPV6 => strip_ipv6(data),
        _ => None,
    }
}

fn strip_tcp(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() < 20 {
        return None;
    }
    let data_offset = (data[12] >> 4) as usize * 4;
    if data_offset < 20 || data.len() < data_offset {
        return None;
    }
    Some(data[data_offset..].to_vec())
}

fn strip_udp(data: &[u8]) -> Option<Vec<u8>> {
    strip_fixed(data, 8)
}

fn strip_fixed(data: &[u8], header_len: usize) -> Option<Vec<u8>> {
    if data.len() < header_len {
        return None;
    }
    Some(data[header_len..].to_vec())
}

/// Treats the ICMP payload as a fresh IP packet only when its first byte
/// looks like an IPv4 (`0x45`) or IPv6 (`0x60`) version/IHL nibble; in every
/// other case the ICMP payload itself (after the 8-byte ICMP header) is
/// yielded unchanged.
fn strip_icmp(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() < 8 {
        return None;
    }
    let inner = &data[8..];
    match inner.first() {
        Some(0x45) => strip_ipv4(inner),
        Some(0x60) => strip_ipv6(inner),
        _ => Some(inner.to_vec()),
    }
}

enum Reader {
    Pcap(PcapReader<BufReader<File>>),
    PcapNg(PcapNgReader<BufReader<File>>),
}

/// An open capture file, yielding stripped payloads in packet order.
pub struct CaptureSource {
    path: PathBuf,
    reader: Reader,
}

impl CaptureSource {
    pub fn open(path: impl AsRef<Path>) -> Result<CaptureSource> {
        let path = path.as_ref().to_path_buf();
        let magic = read_magic(&path)?;
        let file = File::open(&path).map_err(|e| open_err(&path, e))?;

        let reader = if is_pcap_magic(magic) {
            Reader::Pcap(PcapReader::new(BufReader::new(file)).map_err(|e| open_err(&path, e))?)
        } else {
            Reader::PcapNg(PcapNgReader::new(BufReader::new(file)).map_err(|e| open_err(&path, e))?)
        };

        Ok(CaptureSource { path, reader })
    }

    fn next_raw_frame(&mut self) -> Option<Vec<u8>> {
        match &mut self.reader {
            Reader::Pcap(r) => loop {
                match r.next() {
                    Some(Ok(packet)) => return Some(packet.data.into_owned()),
                    Some(Err(e)) => {
                        log::warn!("skipping malformed pcap record in {:?}: {e}", self.path);
                    }
                    None => return None,
                }
            },
            Reader::PcapNg(r) => loop {
                match r.next_block() {
                    Some(Ok(Block::EnhancedPacket(epb))) => return Some(epb.data.into_owned()),
                    Some(Ok(Block::SimplePacket(spb))) => return Some(spb.data.into_owned()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log::warn!("skipping malformed pcapng block in {:?}: {e}", self.path);
                    }
                    None => return None,
                }
            },
        }
    }
}

impl Iterator for CaptureSource {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        loop {
            let frame = self.next_raw_frame()?;
            let payload = strip_headers(&frame);
            if !payload.is_empty() {
                return Some(payload);
            }
        }
    }
}

fn read_magic(path: &Path) -> Result<[u8; 4]> {
    let mut file = File::open(path).map_err(|e| open_err(path, e))?;
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)
        .map_err(|e| open_err(path, e))?;
    Ok(magic)
}

fn is_pcap_magic(magic: [u8; 4]) -> bool {
    matches!(
        u32::from_le_bytes(magic),
        0xa1b2_c3d4 | 0xd4c3_b2a1 | 0xa1b2_3c4d | 0x4d3c_b2a1
    )
}

fn open_err(path: &Path, e: impl std::fmt::Display) -> AhofaError {
    AhofaError::BadCaptureFile {
        path: path.to_path_buf(),
        detail: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth_header(ethertype: u16) -> Vec<u8> {
        let mut v = vec![0u8; 12];
        v.extend_from_slice(&ethertype.to_be_bytes());
        v
    }

    fn ipv4_header(total_len: u16, protocol: u8) -> Vec<u8> {
        let mut h = vec![0u8; 20];
        h[0] = 0x45;
        h[2..4].copy_from_slice(&total_len.to_be_bytes());
        h[9] = protocol;
        h
    }

    #[test]
    fn plain_ethernet_ipv4_tcp() {
        let mut frame = eth_header(ETHERTYPE_IPV4);
        frame.extend(ipv4_header(40, PROTO_TCP));
        let mut tcp = vec![0u8; 20];
        tcp[12] = 5 << 4;
        frame.extend(tcp);
        frame.extend(b"payload");
        assert_eq!(strip_headers(&frame), b"payload".to_vec());
    }

    #[test]
    fn vlan_tagged_frame() {
        let mut frame = vec![0u8; 12];
        frame.extend_from_slice(&ETHERTYPE_VLAN.to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x0a]); // VLAN tag control info
        frame.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
        frame.extend(ipv4_header(28, PROTO_UDP));
        frame.extend(vec![0u8; 8]); // UDP header
        frame.extend(b"vlan-ok");
        assert_eq!(strip_headers(&frame), b"vlan-ok".to_vec());
    }

    #[test]
    fn ipv6_with_fragment_extension_header() {
        let mut frame = eth_header(ETHERTYPE_IPV6);
        let mut ip6 = vec![0u8; 40];
        ip6[0] = 0x60;
        ip6[6] = PROTO_FRAGMENT;
        frame.extend(ip6);
        let mut frag = vec![0u8; 8];
        frag[0] = PROTO_UDP;
        frame.extend(frag);
        frame.extend(vec![0u8; 8]); // UDP header
        frame.extend(b"frag-ok");
        assert_eq!(strip_headers(&frame), b"frag-ok".to_vec());
    }

    #[test]
    fn esp_header_is_skipped() {
        let mut frame = eth_header(ETHERTYPE_IPV4);
        frame.extend(ipv4_header(28, PROTO_ESP));
        frame.extend(vec![0u8; 8]);
        frame.extend(b"esp-ok");
        assert_eq!(strip_headers(&frame), b"esp-ok".to_vec());
    }

    #[test]
    fn icmp_wrapped_inner_ipv4_is_unwrapped() {
        let mut frame = eth_header(ETHERTYPE_IPV4);
        frame.extend(ipv4_header(60, PROTO_ICMP));
        let mut icmp = vec![0u8; 8];
        let mut inner = ipv4_header(28, PROTO_UDP);
        inner.extend(vec![0u8; 8]);
        inner.extend(b"inner-ok");
        icmp.extend(inner);
        frame.extend(icmp);
        assert_eq!(strip_headers(&frame), b"inner-ok".to_vec());
    }

    #[test]
    fn icmp_without_embedded_ip_yields_raw_icmp_body() {
        let mut frame = eth_header(ETHERTYPE_IPV4);
        frame.extend(ipv4_header(18, PROTO_ICMP));
        let mut icmp = vec![0u8; 8];
        icmp.extend(b"echo");
        frame.extend(icmp);
        assert_eq!(strip_headers(&frame), b"echo".to_vec());
    }

    #[test]
    fn truncated_packet_yields_empty_payload() {
        let mut frame = eth_header(ETHERTYPE_IPV4);
        frame.extend(vec![0u8; 10]); // shorter than a full IPv4 header
        assert!(strip_headers(&frame).is_empty());
    }

    #[test]
    fn unknown_ethertype_yields_empty_payload() {
        let frame = eth_header(0x88b5);
        assert!(strip_headers(&frame).is_empty());
    }
}
