/*!
The HomeCtl SSDP client is a *control point*.
It must **not** bind to UDP port 1900.

* An SSDP *device* listens on 0.0.0.0:1900 for M-SEARCH discovery.
* The SSDP *client* only needs to send M-SEARCH and receive unicast HTTP/200 replies,
  so it binds an ephemeral port (0.0.0.0:0).

If the client bound 1900 next to a local device stack (even with SO_REUSEPORT) the kernel
would load-balance incoming datagrams between the sockets and replies would be lost randomly.
*/
//! Client SSDP pour la découverte des devices UPnP

use super::{SSDP_MULTICAST_ADDR, SSDP_PORT, SsdpHeaders, parse_datagram};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// One datagram received on the discovery socket
#[derive(Debug, Clone)]
pub struct Datagram {
    pub data: Vec<u8>,
    pub from: SocketAddr,
}

/// Multicast transport used by [`SsdpClient`].
///
/// `recv` returns `Ok(None)` once no datagram arrived within the transport's
/// own receive timeout; that ends the current discovery sequence.
pub trait SsdpTransport: Send + Sync {
    fn send(&self, datagram: &[u8], to: SocketAddr) -> io::Result<()>;

    fn recv(&self) -> io::Result<Option<Datagram>>;
}

/// UDP socket bound on an ephemeral port and joined to the SSDP group on
/// every non-loopback IPv4 interface.
pub struct UdpSsdpTransport {
    socket: UdpSocket,
}

impl UdpSsdpTransport {
    /// Crée la socket de découverte
    ///
    /// `read_timeout` bounds each wait for a reply.
    pub fn new(read_timeout: Duration) -> io::Result<Self> {
        let group = multicast_group();

        let socket2 = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket2.set_reuse_address(true)?;

        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
        socket2.bind(&bind_addr.into())?;

        let socket: UdpSocket = socket2.into();
        // A zero duration is rejected by set_read_timeout
        socket.set_read_timeout(Some(read_timeout.max(Duration::from_millis(1))))?;
        socket.set_multicast_loop_v4(true)?; // utile en dev local

        for iface in get_if_addrs::get_if_addrs()? {
            if let std::net::IpAddr::V4(ipv4) = iface.ip() {
                if !ipv4.is_loopback() {
                    match socket.join_multicast_v4(&group, &ipv4) {
                        Ok(()) => {
                            debug!("SSDP: joined {} on {}", group, ipv4);
                        }
                        Err(e) => {
                            warn!("SSDP: failed to join {} on {}: {}", group, ipv4, e);
                        }
                    }
                }
            }
        }

        info!(
            "✅ SSDP client ready on {} (read timeout {:?})",
            socket.local_addr()?,
            read_timeout
        );

        Ok(Self { socket })
    }
}

impl SsdpTransport for UdpSsdpTransport {
    fn send(&self, datagram: &[u8], to: SocketAddr) -> io::Result<()> {
        self.socket.send_to(datagram, to).map(|_| ())
    }

    fn recv(&self) -> io::Result<Option<Datagram>> {
        let mut buf = [0u8; 8192];
        match self.socket.recv_from(&mut buf) {
            Ok((n, from)) => Ok(Some(Datagram {
                data: buf[..n].to_vec(),
                from,
            })),
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn multicast_group() -> Ipv4Addr {
    SSDP_MULTICAST_ADDR
        .parse()
        .unwrap_or(Ipv4Addr::new(239, 255, 255, 250))
}

fn multicast_target() -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(multicast_group(), SSDP_PORT))
}

/// Client SSDP : envoie un M-SEARCH et expose les réponses
pub struct SsdpClient<T: SsdpTransport> {
    transport: T,
    window: Option<Duration>,
}

impl<T: SsdpTransport> SsdpClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            window: None,
        }
    }

    /// Caps the total time a discovery sequence keeps reading, whatever the
    /// traffic on the socket.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = Some(window);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Envoie un M-SEARCH pour un type donné
    pub fn send_msearch(&self, st: &str, mx: u32) -> io::Result<()> {
        let msg = msearch_payload(st, mx);

        match self.transport.send(msg.as_bytes(), multicast_target()) {
            Ok(()) => {
                info!("📤 M-SEARCH sent (ST={}, MX={})", st, mx.max(1));
                debug!(
                    "📨 M-SEARCH payload\n<details>\n\n```\n{}\n```\n</details>\n",
                    msg
                );
                Ok(())
            }
            Err(e) => {
                warn!("❌ Failed to send M-SEARCH: {}", e);
                Err(e)
            }
        }
    }

    /// Sends one M-SEARCH and returns the replies as a lazy, finite sequence.
    ///
    /// The sequence ends when the transport times out (or the discovery
    /// window closes); it is never re-queried. Datagrams that do not parse
    /// are dropped.
    pub fn discover(&self, st: &str, mx: u32) -> io::Result<SearchResponses<'_, T>> {
        self.send_msearch(st, mx)?;
        Ok(SearchResponses {
            transport: &self.transport,
            deadline: self.window.map(|w| Instant::now() + w),
            finished: false,
        })
    }
}

/// Build the M-SEARCH datagram (MX is at least 1).
pub(crate) fn msearch_payload(st: &str, mx: u32) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}:{}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\
         USER-AGENT: HomeCtl SSDP Client\r\n\
         \r\n",
        SSDP_MULTICAST_ADDR,
        SSDP_PORT,
        mx.max(1),
        st
    )
}

/// Parsed replies to one M-SEARCH; see [`SsdpClient::discover`].
pub struct SearchResponses<'a, T: SsdpTransport> {
    transport: &'a T,
    deadline: Option<Instant>,
    finished: bool,
}

impl<T: SsdpTransport> Iterator for SearchResponses<'_, T> {
    type Item = SsdpHeaders;

    fn next(&mut self) -> Option<SsdpHeaders> {
        while !self.finished {
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                debug!("SSDP discovery window closed");
                self.finished = true;
                break;
            }

            match self.transport.recv() {
                Ok(Some(datagram)) => match parse_datagram(&datagram.data) {
                    Ok(headers) => {
                        debug!("📥 SSDP record from {}", datagram.from);
                        return Some(headers.with_sender(datagram.from));
                    }
                    Err(e) => {
                        trace!("Dropping SSDP datagram from {}: {}", datagram.from, e);
                    }
                },
                Ok(None) => {
                    info!("🏁 SSDP discovery finished");
                    self.finished = true;
                }
                Err(e) => {
                    warn!("❌ SSDP client read error: {}", e);
                    self.finished = true;
                }
            }
        }
        None
    }
}
