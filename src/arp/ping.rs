//! Single ICMP echo used to warm the OS neighbor cache.
//!
//! Sending one echo request makes the kernel resolve and remember the
//! target's hardware address, so later passive lookups can find it. Whether
//! the echo is answered does not matter for that purpose.
//!
//! # Privileges
//!
//! Unprivileged mode uses a Linux "ping socket" (`SOCK_DGRAM` +
//! `IPPROTO_ICMP`), which most distributions allow for ordinary users.
//! Privileged mode uses a raw ICMP socket and needs root or `CAP_NET_RAW`.

use crate::error::{LookupError, LookupResult};
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{self, IcmpPacket, IcmpTypes, MutableIcmpPacket};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::{self, Read};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

/// ICMP header (8 bytes) plus a small payload.
const ECHO_SIZE: usize = 16;
const PAYLOAD: &[u8; 8] = b"arpseek\0";

/// An ICMP socket for cache warming, opened once and reused.
///
/// A raw socket can only be created while `CAP_NET_RAW` is effective, so the
/// client opens it during `init` inside the raised window.
#[derive(Debug)]
pub struct EchoSocket {
    socket: Socket,
    privileged: bool,
}

impl EchoSocket {
    /// Open a raw ICMP socket when `privileged`, a ping socket otherwise.
    pub fn open(privileged: bool) -> LookupResult<Self> {
        let kind = if privileged { Type::RAW } else { Type::DGRAM };
        let socket = Socket::new(Domain::IPV4, kind, Some(Protocol::ICMPV4)).map_err(|e| {
            LookupError::ProbeIo(format!("failure creating ICMP socket: {}", e))
        })?;
        Ok(Self { socket, privileged })
    }

    /// Whether this is a raw socket.
    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    /// Send one echo request to `target` and wait up to `timeout` for a reply.
    ///
    /// Returns whether a reply arrived. Only IPv4 is supported; other targets
    /// return `Ok(false)` without sending anything. This call blocks.
    pub fn echo(&self, target: IpAddr, timeout: Duration) -> LookupResult<bool> {
        let IpAddr::V4(target) = target else {
            return Ok(false);
        };

        self.socket
            .set_read_timeout(Some(timeout.max(Duration::from_millis(1))))
            .map_err(|e| LookupError::ProbeIo(format!("failure setting ICMP timeout: {}", e)))?;

        let identifier: u16 = rand::random();
        let packet = build_echo_request(identifier, 1);
        let addr = SockAddr::from(SocketAddr::new(IpAddr::V4(target), 0));
        self.socket.send_to(&packet, &addr).map_err(|e| {
            LookupError::ProbeIo(format!("failure adding IP {} to cache: {}", target, e))
        })?;

        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 1500];
        while Instant::now() < deadline {
            match (&self.socket).read(&mut buf) {
                Ok(n) => {
                    if is_echo_reply(&buf[..n], self.privileged) {
                        return Ok(true);
                    }
                }
                Err(e)
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    break;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(LookupError::ProbeIo(format!(
                        "failure reading echo reply from {}: {}",
                        target, e
                    )))
                }
            }
        }

        Ok(false)
    }
}

/// Build an ICMP echo request with a valid checksum.
fn build_echo_request(identifier: u16, sequence: u16) -> Vec<u8> {
    let mut buffer = vec![0u8; ECHO_SIZE];
    if let Some(mut echo) = MutableEchoRequestPacket::new(&mut buffer) {
        echo.set_icmp_type(IcmpTypes::EchoRequest);
        echo.set_identifier(identifier);
        echo.set_sequence_number(sequence);
        echo.set_payload(PAYLOAD);
    }
    let checksum = IcmpPacket::new(&buffer).map(|p| icmp::checksum(&p));
    if let (Some(checksum), Some(mut packet)) = (checksum, MutableIcmpPacket::new(&mut buffer)) {
        packet.set_checksum(checksum);
    }
    buffer
}

/// Raw sockets deliver the IPv4 header in front of the ICMP message; ping
/// sockets do not.
fn is_echo_reply(frame: &[u8], has_ip_header: bool) -> bool {
    let icmp = if has_ip_header {
        let Some(&first) = frame.first() else {
            return false;
        };
        let header_len = ((first & 0x0f) as usize) * 4;
        match frame.get(header_len..) {
            Some(rest) => rest,
            None => return false,
        }
    } else {
        frame
    };

    IcmpPacket::new(icmp).map_or(false, |p| p.get_icmp_type() == IcmpTypes::EchoReply)
}
