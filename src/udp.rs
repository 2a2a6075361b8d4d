/// UDP multicast transport
///
/// Standard-socket implementation of `Transport`. The socket is
/// non-blocking; `WouldBlock` maps to `Empty` so the ingest loop can keep
/// spinning without ever entering a blocking receive.

use crate::ingest::{RecvOutcome, Transport};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind the local port and join `group` on all interfaces. A
    /// non-multicast group address skips the join and yields a plain
    /// datagram socket, which is convenient for loopback testing.
    pub fn join(group: Ipv4Addr, port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))?;
        if group.is_multicast() {
            socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
        }
        socket.set_nonblocking(true)?;
        Ok(UdpTransport { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Transport for UdpTransport {
    fn recv_nonblocking(&mut self, buf: &mut [u8]) -> RecvOutcome {
        match self.socket.recv(buf) {
            Ok(n) => RecvOutcome::Data(n),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => RecvOutcome::Empty,
            Err(err) => RecvOutcome::Fatal(err),
        }
    }
}
