//! Raw-socket ARP client for Linux.
//!
//! Probes are unicast: each ARP request is addressed to the target hardware
//! address on the Ethernet layer and asks "who has `candidate`?". Only the
//! target answers, and only when the candidate is its address.
//!
//! # Privileges
//!
//! Opening the datalink channel needs root or `CAP_NET_RAW` in the effective
//! set. [`LinuxArpClient::init`] raises the capability from the permitted
//! set only while it opens the datalink channel and the cache warming socket,
//! on one thread, and restores it before returning. Open sockets keep
//! working afterwards.

use super::ping::EchoSocket;
use super::privilege;
use super::{table, ArpClient, Sinks};
use crate::error::{LookupError, LookupResult};
use crate::types::{Address, HardwareAddress};
use async_trait::async_trait;
use pnet::datalink::{self, Channel, DataLinkReceiver, DataLinkSender, NetworkInterface};
use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::packet::Packet;
use pnet::util::MacAddr;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

const ETHERNET_HEADER_SIZE: usize = 14;
const ARP_PACKET_SIZE: usize = 28;

/// Tunables for [`LinuxArpClient`].
#[derive(Debug, Clone)]
pub struct ArpOptions {
    /// How long one request waits for the target's reply.
    pub reply_deadline: Duration,
    /// How long cache warming waits for an echo reply.
    pub ping_timeout: Duration,
    /// Use a raw ICMP socket for cache warming. `None` means "only when
    /// running as root".
    pub privileged_ping: Option<bool>,
    /// Path of the kernel neighbor table.
    pub neighbor_table: PathBuf,
}

impl Default for ArpOptions {
    fn default() -> Self {
        Self {
            reply_deadline: Duration::from_millis(1),
            ping_timeout: Duration::from_millis(50),
            privileged_ping: None,
            neighbor_table: PathBuf::from(table::PROC_NET_ARP),
        }
    }
}

/// The interface identity used as the sender of every request.
#[derive(Debug, Clone)]
struct Link {
    name: String,
    hardware: MacAddr,
    source: Ipv4Addr,
}

struct ArpSocket {
    tx: Box<dyn DataLinkSender>,
    rx: Box<dyn DataLinkReceiver>,
}

/// ARP client over a pnet Ethernet channel.
pub struct LinuxArpClient {
    target: HardwareAddress,
    options: ArpOptions,
    link: Option<Link>,
    socket: Arc<Mutex<Option<ArpSocket>>>,
    echo: Mutex<Option<Arc<EchoSocket>>>,
}

impl LinuxArpClient {
    /// Create a client looking for `target`. Nothing is opened until `init`.
    pub fn new(target: HardwareAddress, options: ArpOptions) -> Self {
        Self {
            target,
            options,
            link: None,
            socket: Arc::new(Mutex::new(None)),
            echo: Mutex::new(None),
        }
    }

    fn link(&self) -> LookupResult<Link> {
        self.link
            .clone()
            .ok_or_else(|| LookupError::ProbeIo("client used before init".to_string()))
    }

    fn privileged_ping(&self) -> bool {
        self.options
            .privileged_ping
            .unwrap_or_else(privilege::is_root)
    }
}

#[async_trait]
impl ArpClient for LinuxArpClient {
    fn target(&self) -> HardwareAddress {
        self.target
    }

    async fn init(&mut self, interface: &str) -> LookupResult<()> {
        let iface = find_interface(interface)?;
        let hardware = iface.mac.ok_or_else(|| {
            LookupError::InterfaceAddress(format!(
                "interface {} has no hardware address",
                iface.name
            ))
        })?;
        let source = get_interface_ipv4(&iface)?;

        let config = datalink::Config {
            read_timeout: Some(self.options.reply_deadline),
            ..Default::default()
        };
        let privileged_ping = self.privileged_ping();

        // Nothing in here may yield: the raised capability belongs to this
        // thread only.
        let (socket, echo) = privilege::with_net_raw(|| {
            let socket = open_channel(&iface, config)?;
            let echo = match EchoSocket::open(privileged_ping) {
                Ok(echo) => Some(Arc::new(echo)),
                Err(e) => {
                    warn!(error = %e, "cache warming unavailable");
                    None
                }
            };
            Ok((socket, echo))
        })?;

        debug!(interface = %iface.name, mac = %hardware, source = %source, "ARP client bound");
        *lock(&self.socket)? = Some(socket);
        *lock(&self.echo)? = echo;
        self.link = Some(Link {
            name: iface.name,
            hardware,
            source,
        });

        Ok(())
    }

    async fn destroy(&self) -> LookupResult<()> {
        let socket = lock(&self.socket)?.take();
        if socket.is_some() {
            if let Some(link) = &self.link {
                debug!(interface = %link.name, "ARP client released");
            }
        }
        drop(socket);
        drop(lock(&self.echo)?.take());
        Ok(())
    }

    async fn request(&self, candidate: IpAddr) -> LookupResult<Option<Address>> {
        let IpAddr::V4(candidate) = candidate else {
            return Ok(None);
        };

        let link = self.link()?;
        let target = MacAddr::from(self.target);
        let deadline = self.options.reply_deadline;
        let socket = Arc::clone(&self.socket);

        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&socket)?;
            let socket = guard
                .as_mut()
                .ok_or_else(|| LookupError::ProbeIo("ARP socket is closed".to_string()))?;
            exchange(socket, &link, target, candidate, deadline)
        })
        .await
        .map_err(|e| LookupError::ProbeIo(format!("ARP request task failed: {}", e)))?
    }

    async fn try_cache(&self, sinks: &Sinks) {
        let contents = match tokio::fs::read_to_string(&self.options.neighbor_table).await {
            Ok(contents) => contents,
            Err(e) => {
                sinks.fail(LookupError::Io(e));
                return;
            }
        };

        match table::find(&contents, self.target) {
            Ok(Some(ip)) => {
                if !sinks.stopped() {
                    sinks.emit(Address::cached(ip));
                }
            }
            Ok(None) => trace!(mac = %self.target, "not in neighbor table"),
            Err(e) => {
                sinks.fail(e);
            }
        }
    }

    async fn cache(&self, address: &Address) -> LookupResult<()> {
        if address.from_cache {
            return Ok(());
        }

        let echo = lock(&self.echo)?.clone().ok_or_else(|| {
            LookupError::ProbeIo("cache warming socket is not open".to_string())
        })?;
        let ip = address.ip;
        let privileged = echo.is_privileged();
        let timeout = self.options.ping_timeout;
        let answered = tokio::task::spawn_blocking(move || echo.echo(ip, timeout))
            .await
            .map_err(|e| LookupError::ProbeIo(format!("cache warm task failed: {}", e)))??;

        debug!(ip = %ip, answered, privileged, "warmed neighbor cache");
        Ok(())
    }
}

/// Open the Ethernet channel on `iface`.
fn open_channel(iface: &NetworkInterface, config: datalink::Config) -> LookupResult<ArpSocket> {
    match datalink::channel(iface, config) {
        Ok(Channel::Ethernet(tx, rx)) => Ok(ArpSocket { tx, rx }),
        Ok(_) => Err(LookupError::ProbeIo(
            "unsupported datalink channel type".to_string(),
        )),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Err(LookupError::Capability(
            format!("insufficient privilege to bind to a raw socket: {}", e),
        )),
        Err(e) => Err(LookupError::ProbeIo(format!(
            "failure opening ARP socket on {}: {}",
            iface.name, e
        ))),
    }
}

/// Send one request for `candidate` and read replies until `deadline`.
fn exchange(
    socket: &mut ArpSocket,
    link: &Link,
    target: MacAddr,
    candidate: Ipv4Addr,
    deadline: Duration,
) -> LookupResult<Option<Address>> {
    let frame = build_request(link, target, candidate)?;
    socket
        .tx
        .send_to(&frame, None)
        .ok_or_else(|| LookupError::ProbeIo("failed to send ARP request".to_string()))?
        .map_err(|e| {
            LookupError::ProbeIo(format!("failed to send ARP request for {}: {}", candidate, e))
        })?;

    let start = Instant::now();
    while start.elapsed() < deadline {
        match socket.rx.next() {
            Ok(frame) => {
                if let Some(ip) = parse_reply(frame, target) {
                    return Ok(Some(Address::fresh(ip)));
                }
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                return Ok(None);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(LookupError::ProbeIo(format!(
                    "failed to read ARP reply: {}",
                    e
                )))
            }
        }
    }

    Ok(None)
}

/// Build an Ethernet frame carrying an ARP request addressed to `target`.
fn build_request(link: &Link, target: MacAddr, candidate: Ipv4Addr) -> LookupResult<Vec<u8>> {
    let mut buffer = vec![0u8; ETHERNET_HEADER_SIZE + ARP_PACKET_SIZE];

    {
        let mut eth_packet = MutableEthernetPacket::new(&mut buffer)
            .ok_or_else(|| LookupError::ProbeIo("failed to create ethernet frame".to_string()))?;
        eth_packet.set_destination(target);
        eth_packet.set_source(link.hardware);
        eth_packet.set_ethertype(EtherTypes::Arp);
    }

    {
        let mut arp_packet = MutableArpPacket::new(&mut buffer[ETHERNET_HEADER_SIZE..])
            .ok_or_else(|| LookupError::ProbeIo("failed to create ARP packet".to_string()))?;
        arp_packet.set_hardware_type(ArpHardwareTypes::Ethernet);
        arp_packet.set_protocol_type(EtherTypes::Ipv4);
        arp_packet.set_hw_addr_len(6);
        arp_packet.set_proto_addr_len(4);
        arp_packet.set_operation(ArpOperations::Request);
        arp_packet.set_sender_hw_addr(link.hardware);
        arp_packet.set_sender_proto_addr(link.source);
        arp_packet.set_target_hw_addr(target);
        arp_packet.set_target_proto_addr(candidate);
    }

    Ok(buffer)
}

/// The sender address of an ARP reply from `target`, if `frame` is one.
fn parse_reply(frame: &[u8], target: MacAddr) -> Option<Ipv4Addr> {
    let eth_packet = EthernetPacket::new(frame)?;
    if eth_packet.get_ethertype() != EtherTypes::Arp {
        return None;
    }

    let arp_packet = ArpPacket::new(eth_packet.payload())?;
    if arp_packet.get_operation() != ArpOperations::Reply
        || arp_packet.get_sender_hw_addr() != target
    {
        trace!(
            sender = %arp_packet.get_sender_hw_addr(),
            "ignoring unrelated ARP frame"
        );
        return None;
    }

    Some(arp_packet.get_sender_proto_addr())
}

fn find_interface(name: &str) -> LookupResult<NetworkInterface> {
    datalink::interfaces()
        .into_iter()
        .find(|iface| iface.name == name)
        .ok_or_else(|| LookupError::InterfaceNotFound(name.to_string()))
}

/// The first IPv4 address assigned to the interface.
fn get_interface_ipv4(interface: &NetworkInterface) -> LookupResult<Ipv4Addr> {
    interface
        .ips
        .iter()
        .find_map(|ip| match ip.ip() {
            IpAddr::V4(addr) => Some(addr),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| {
            LookupError::InterfaceAddress(format!(
                "interface {} has no assigned IPv4 address",
                interface.name
            ))
        })
}

fn lock<T>(mutex: &Mutex<T>) -> LookupResult<std::sync::MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| LookupError::ProbeIo("ARP client state poisoned".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> Link {
        Link {
            name: "eth0".to_string(),
            hardware: MacAddr::new(0x02, 0, 0, 0, 0, 0x01),
            source: Ipv4Addr::new(10, 18, 0, 2),
        }
    }

    fn target() -> MacAddr {
        MacAddr::new(0x3e, 0x50, 0x6e, 0x54, 0x28, 0x3d)
    }

    fn reply_from(sender: MacAddr, ip: Ipv4Addr, op: pnet::packet::arp::ArpOperation) -> Vec<u8> {
        let mut buffer = vec![0u8; ETHERNET_HEADER_SIZE + ARP_PACKET_SIZE];
        {
            let mut eth = MutableEthernetPacket::new(&mut buffer).unwrap();
            eth.set_destination(link().hardware);
            eth.set_source(sender);
            eth.set_ethertype(EtherTypes::Arp);
        }
        {
            let mut arp = MutableArpPacket::new(&mut buffer[ETHERNET_HEADER_SIZE..]).unwrap();
            arp.set_hardware_type(ArpHardwareTypes::Ethernet);
            arp.set_protocol_type(EtherTypes::Ipv4);
            arp.set_hw_addr_len(6);
            arp.set_proto_addr_len(4);
            arp.set_operation(op);
            arp.set_sender_hw_addr(sender);
            arp.set_sender_proto_addr(ip);
            arp.set_target_hw_addr(link().hardware);
            arp.set_target_proto_addr(link().source);
        }
        buffer
    }

    #[test]
    fn test_request_is_unicast_to_target() {
        let candidate = Ipv4Addr::new(10, 18, 6, 18);
        let frame = build_request(&link(), target(), candidate).unwrap();
        assert_eq!(frame.len(), 42);

        let eth = EthernetPacket::new(&frame).unwrap();
        assert_eq!(eth.get_destination(), target());
        assert_eq!(eth.get_source(), link().hardware);
        assert_eq!(eth.get_ethertype(), EtherTypes::Arp);

        let arp = ArpPacket::new(eth.payload()).unwrap();
        assert_eq!(arp.get_operation(), ArpOperations::Request);
        assert_eq!(arp.get_sender_hw_addr(), link().hardware);
        assert_eq!(arp.get_sender_proto_addr(), link().source);
        assert_eq!(arp.get_target_hw_addr(), target());
        assert_eq!(arp.get_target_proto_addr(), candidate);
    }

    #[test]
    fn test_parse_reply_from_target() {
        let ip = Ipv4Addr::new(10, 18, 6, 18);
        let frame = reply_from(target(), ip, ArpOperations::Reply);
        assert_eq!(parse_reply(&frame, target()), Some(ip));
    }

    #[test]
    fn test_parse_reply_ignores_others() {
        let ip = Ipv4Addr::new(10, 18, 6, 18);
        let stranger = MacAddr::new(0x0b, 0xde, 0xad, 0xbe, 0xef, 0x0b);

        assert_eq!(
            parse_reply(&reply_from(stranger, ip, ArpOperations::Reply), target()),
            None
        );
        assert_eq!(
            parse_reply(&reply_from(target(), ip, ArpOperations::Request), target()),
            None
        );
        assert_eq!(parse_reply(&[0u8; 10], target()), None);
    }

    #[test]
    fn test_default_options() {
        let options = ArpOptions::default();
        assert_eq!(options.reply_deadline, Duration::from_millis(1));
        assert_eq!(options.ping_timeout, Duration::from_millis(50));
        assert_eq!(options.neighbor_table, PathBuf::from("/proc/net/arp"));
    }

    #[tokio::test]
    async fn test_unknown_interface() {
        let mut client = LinuxArpClient::new(target().into(), ArpOptions::default());
        let err = match client.init("does-not-exist0").await {
            Err(e) => e,
            Ok(()) => panic!("init should fail"),
        };
        assert!(matches!(err, LookupError::InterfaceNotFound(_)));
        client.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn test_init_leaves_thread_capabilities_alone() {
        // The default test runtime is single threaded, so init runs here.
        let before = privilege::CapabilitySet::current().unwrap();
        let mut client = LinuxArpClient::new(target().into(), ArpOptions::default());
        let _ = client.init("lo").await;
        assert_eq!(privilege::CapabilitySet::current().unwrap(), before);
        client.destroy().await.unwrap();
        assert_eq!(privilege::CapabilitySet::current().unwrap(), before);
    }

    #[tokio::test]
    async fn test_cache_without_socket() {
        let client = LinuxArpClient::new(target().into(), ArpOptions::default());
        let err = client
            .cache(&Address::fresh(Ipv4Addr::new(10, 0, 0, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::ProbeIo(_)));
        client
            .cache(&Address::cached(Ipv4Addr::new(10, 0, 0, 1)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_request_before_init() {
        let client = LinuxArpClient::new(target().into(), ArpOptions::default());
        let err = client
            .request(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::ProbeIo(_)));
        assert_eq!(
            client.request("fd00::1".parse().unwrap()).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_try_cache_reads_configured_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arp");
        std::fs::write(
            &path,
            "IP address       HW type     Flags       HW address            Mask     Device\n\
             10.18.6.18       0x1         0x2         3e:50:6e:54:28:3d     *        eth0\n",
        )
        .unwrap();

        let options = ArpOptions {
            neighbor_table: path,
            ..Default::default()
        };
        let client = LinuxArpClient::new(target().into(), options);

        let (results, mut result_rx) = tokio::sync::mpsc::channel(1);
        let (errors, _error_rx) = tokio::sync::mpsc::channel(1);
        let (_stop_tx, stop_rx) = tokio::sync::watch::channel(false);
        client.try_cache(&Sinks::new(results, errors, stop_rx)).await;

        let found = result_rx.recv().await.unwrap();
        assert!(found.from_cache);
        assert_eq!(found.ip, IpAddr::V4(Ipv4Addr::new(10, 18, 6, 18)));

        // Cached addresses are never re-warmed.
        client.cache(&found).await.unwrap();
    }
}
