//! ARP "who-has" frames and the scanner seam used by presence probes
//!
//! Frames are full Ethernet II + ARP (42 bytes) so they can be written to a
//! raw packet socket as-is.

use async_trait::async_trait;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use super::subnet::Subnet;
use crate::error::ProbeError;

pub const ETHERTYPE_ARP: u16 = 0x0806;
const ETHERTYPE_IPV4: u16 = 0x0800;
const HTYPE_ETHERNET: u16 = 1;
const OP_REQUEST: u16 = 1;
const OP_REPLY: u16 = 2;

pub const FRAME_LEN: usize = 42;

/// 48-bit hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xFF; 6]);
    pub const ZERO: MacAddr = MacAddr([0; 6]);

    /// Case-insensitive comparison against a configured identifier string
    pub fn matches(&self, identifier: &str) -> bool {
        match identifier.parse::<MacAddr>() {
            Ok(other) => other == *self,
            Err(_) => self.to_string().eq_ignore_ascii_case(identifier.trim()),
        }
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacParseError(pub String);

impl fmt::Display for MacParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid MAC address: {}", self.0)
    }
}

impl std::error::Error for MacParseError {}

impl FromStr for MacAddr {
    type Err = MacParseError;

    /// Accepts "AA:BB:CC:DD:EE:FF", "aa-bb-cc-dd-ee-ff" and bare hex
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s.chars().filter(|c| c.is_ascii_hexdigit()).collect();
        let separators = s.chars().filter(|c| *c == ':' || *c == '-').count();
        if hex.len() != 12 || hex.len() + separators != s.trim().len() {
            return Err(MacParseError(s.to_string()));
        }
        let mut out = [0u8; 6];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| MacParseError(s.to_string()))?;
        }
        Ok(MacAddr(out))
    }
}

/// A host that answered a who-has request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpReply {
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
}

/// Build a broadcast who-has request for `target_ip`
pub fn build_request(src_mac: MacAddr, src_ip: Ipv4Addr, target_ip: Ipv4Addr) -> [u8; FRAME_LEN] {
    let mut pkt = [0u8; FRAME_LEN];
    // Ethernet II header
    pkt[0..6].copy_from_slice(&MacAddr::BROADCAST.0);
    pkt[6..12].copy_from_slice(&src_mac.0);
    pkt[12..14].copy_from_slice(&ETHERTYPE_ARP.to_be_bytes());
    // ARP payload
    pkt[14..16].copy_from_slice(&HTYPE_ETHERNET.to_be_bytes());
    pkt[16..18].copy_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
    pkt[18] = 6;
    pkt[19] = 4;
    pkt[20..22].copy_from_slice(&OP_REQUEST.to_be_bytes());
    pkt[22..28].copy_from_slice(&src_mac.0);
    pkt[28..32].copy_from_slice(&src_ip.octets());
    pkt[32..38].copy_from_slice(&MacAddr::ZERO.0);
    pkt[38..42].copy_from_slice(&target_ip.octets());
    pkt
}

/// Parse an Ethernet frame, returning the sender if it is an IPv4 ARP reply
pub fn parse_reply(frame: &[u8]) -> Option<ArpReply> {
    if frame.len() < FRAME_LEN {
        return None;
    }
    let be16 = |at: usize| u16::from_be_bytes([frame[at], frame[at + 1]]);

    if be16(12) != ETHERTYPE_ARP
        || be16(14) != HTYPE_ETHERNET
        || be16(16) != ETHERTYPE_IPV4
        || frame[18] != 6
        || frame[19] != 4
        || be16(20) != OP_REPLY
    {
        return None;
    }

    let mut mac = [0u8; 6];
    mac.copy_from_slice(&frame[22..28]);
    let ip = Ipv4Addr::new(frame[28], frame[29], frame[30], frame[31]);
    Some(ArpReply {
        sender_mac: MacAddr(mac),
        sender_ip: ip,
    })
}

/// Active ARP sweep of one subnet
#[async_trait]
pub trait ArpScanner: Send + Sync {
    /// Ask every host of `subnet` who-has on `interface`, collecting replies
    /// until `timeout` has elapsed after the last request.
    async fn scan(
        &self,
        subnet: &Subnet,
        interface: &str,
        timeout: Duration,
    ) -> Result<Vec<ArpReply>, ProbeError>;
}

/// Scanner for platforms without raw packet sockets
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedScanner;

#[async_trait]
impl ArpScanner for UnsupportedScanner {
    async fn scan(
        &self,
        _subnet: &Subnet,
        _interface: &str,
        _timeout: Duration,
    ) -> Result<Vec<ArpReply>, ProbeError> {
        Err(ProbeError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_frame(sender: MacAddr, ip: Ipv4Addr) -> [u8; FRAME_LEN] {
        let mut frame = build_request(sender, ip, Ipv4Addr::new(192, 168, 1, 10));
        frame[20..22].copy_from_slice(&OP_REPLY.to_be_bytes());
        frame
    }

    #[test]
    fn test_mac_parsing() {
        let mac: MacAddr = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        assert_eq!(mac, MacAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]));
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:ff");

        let dashed: MacAddr = "aa-bb-cc-dd-ee-ff".parse().unwrap();
        assert_eq!(dashed, mac);

        assert!("aa:bb:cc:dd:ee".parse::<MacAddr>().is_err());
        assert!("aa:bb:cc:dd:ee:zz".parse::<MacAddr>().is_err());
        assert!("aa:bb:cc:dd:ee:ff:00".parse::<MacAddr>().is_err());
    }

    #[test]
    fn test_case_insensitive_match() {
        let mac = MacAddr([0xAA, 0xBB, 0xCC, 0x01, 0x02, 0x03]);
        assert!(mac.matches("AA:BB:CC:01:02:03"));
        assert!(mac.matches("aa:bb:cc:01:02:03"));
        assert!(!mac.matches("aa:bb:cc:01:02:04"));
    }

    #[test]
    fn test_request_layout() {
        let src = MacAddr([0x02, 0, 0, 0, 0, 0x01]);
        let pkt = build_request(src, Ipv4Addr::new(192, 168, 1, 2), Ipv4Addr::new(192, 168, 1, 77));

        assert_eq!(&pkt[0..6], &[0xFF; 6]);
        assert_eq!(&pkt[6..12], &src.0);
        assert_eq!(&pkt[12..14], &[0x08, 0x06]);
        assert_eq!(&pkt[20..22], &[0x00, 0x01]);
        assert_eq!(&pkt[28..32], &[192, 168, 1, 2]);
        assert_eq!(&pkt[38..42], &[192, 168, 1, 77]);
        // a request is never mistaken for a reply
        assert_eq!(parse_reply(&pkt), None);
    }

    #[test]
    fn test_parse_reply() {
        let sender = MacAddr([0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01]);
        let frame = reply_frame(sender, Ipv4Addr::new(192, 168, 1, 50));

        let reply = parse_reply(&frame).unwrap();
        assert_eq!(reply.sender_mac, sender);
        assert_eq!(reply.sender_ip, Ipv4Addr::new(192, 168, 1, 50));

        assert_eq!(parse_reply(&frame[..30]), None);

        let mut not_arp = frame;
        not_arp[12..14].copy_from_slice(&[0x08, 0x00]);
        assert_eq!(parse_reply(&not_arp), None);
    }
}
