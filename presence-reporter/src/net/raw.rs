//! ARP sweep over a raw `AF_PACKET` socket (Linux only, needs CAP_NET_RAW)

use async_trait::async_trait;
use nix::errno::Errno;
use nix::net::if_::if_nametoindex;
use nix::sys::socket::{self, AddressFamily, MsgFlags, SockFlag, SockProtocol, SockType};
use std::collections::HashSet;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::time::{Duration, Instant};
use tracing::debug;

use super::arp::{self, ArpReply, ArpScanner, MacAddr, ETHERTYPE_ARP};
use super::interfaces;
use super::subnet::Subnet;
use crate::error::ProbeError;

/// Requests sent between two drains of the receive queue
const SEND_BATCH: usize = 256;
const IDLE_WAIT: Duration = Duration::from_millis(10);

#[derive(Debug, Default, Clone, Copy)]
pub struct RawArpScanner;

#[async_trait]
impl ArpScanner for RawArpScanner {
    async fn scan(
        &self,
        subnet: &Subnet,
        interface: &str,
        timeout: Duration,
    ) -> Result<Vec<ArpReply>, ProbeError> {
        let subnet = *subnet;
        let owned = interface.to_string();
        tokio::task::spawn_blocking(move || sweep(&subnet, &owned, timeout))
            .await
            .map_err(|e| ProbeError::Socket {
                interface: interface.to_string(),
                source: io::Error::new(io::ErrorKind::Other, e),
            })?
    }
}

fn sweep(subnet: &Subnet, interface: &str, timeout: Duration) -> Result<Vec<ArpReply>, ProbeError> {
    let local = interfaces::lookup(interface)
        .map_err(|e| ProbeError::from_io(interface, e))?
        .ok_or_else(|| ProbeError::InterfaceUnavailable(interface.to_string()))?;
    let (Some(src_mac), Some(src_ip)) = (local.mac, local.ipv4) else {
        return Err(ProbeError::InterfaceUnavailable(interface.to_string()));
    };

    let fd = open_bound_socket(interface).map_err(|e| ProbeError::from_io(interface, e))?;

    debug!("arping {} on {} (timeout {:?})", subnet, interface, timeout);

    let mut replies = Vec::new();
    let mut seen = HashSet::new();
    let mut sent = 0usize;
    for target in subnet.hosts() {
        let frame = arp::build_request(src_mac, src_ip, target);
        match socket::send(fd.as_raw_fd(), &frame, MsgFlags::empty()) {
            Ok(_) | Err(Errno::EAGAIN) | Err(Errno::ENOBUFS) => {}
            Err(e) => return Err(ProbeError::from_io(interface, e.into())),
        }
        sent += 1;
        if sent % SEND_BATCH == 0 {
            drain(&fd, interface, &mut replies, &mut seen)?;
        }
    }

    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if drain(&fd, interface, &mut replies, &mut seen)? == 0 {
            std::thread::sleep(IDLE_WAIT);
        }
    }

    debug!("arping {}: {} requests, {} answers", subnet, sent, replies.len());
    Ok(replies)
}

/// Read every pending frame, keeping ARP replies not seen yet
fn drain(
    fd: &OwnedFd,
    interface: &str,
    replies: &mut Vec<ArpReply>,
    seen: &mut HashSet<MacAddr>,
) -> Result<usize, ProbeError> {
    let mut buf = [0u8; 1514];
    let mut read = 0;
    loop {
        match socket::recv(fd.as_raw_fd(), &mut buf, MsgFlags::empty()) {
            Ok(n) => {
                read += 1;
                if let Some(reply) = arp::parse_reply(&buf[..n]) {
                    if seen.insert(reply.sender_mac) {
                        replies.push(reply);
                    }
                }
            }
            Err(Errno::EAGAIN) => return Ok(read),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(ProbeError::from_io(interface, e.into())),
        }
    }
}

fn open_bound_socket(interface: &str) -> io::Result<OwnedFd> {
    let ifindex = if_nametoindex(interface)?;
    let fd = socket::socket(
        AddressFamily::Packet,
        SockType::Raw,
        SockFlag::SOCK_NONBLOCK | SockFlag::SOCK_CLOEXEC,
        SockProtocol::EthAll,
    )?;

    // SAFETY: sockaddr_ll is plain data; zeroed is a valid starting value.
    let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
    addr.sll_family = libc::AF_PACKET as u16;
    addr.sll_protocol = ETHERTYPE_ARP.to_be();
    addr.sll_ifindex = ifindex as i32;

    // SAFETY: `addr` outlives the call and the length matches its type.
    let rc = unsafe {
        libc::bind(
            fd.as_raw_fd(),
            &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(fd)
}
