//! Socket adapter for the remote mirror.
//!
//! Uses `std::net`, which maps onto lwIP on ESP-IDF and onto the host
//! stack in simulation, so one implementation serves both.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};

use log::{debug, info};

use crate::app::ports::{MirrorChannel, NetError, NetworkPort};
use crate::config::{MirrorEndpoint, MirrorProtocol};

/// Opens mirror links over the platform socket API.
#[derive(Debug, Default)]
pub struct StdNetwork;

impl StdNetwork {
    pub fn new() -> Self {
        Self
    }
}

impl NetworkPort for StdNetwork {
    fn connect(&mut self, endpoint: &MirrorEndpoint) -> Result<Box<dyn MirrorChannel>, NetError> {
        let addr = resolve(endpoint)?;
        match endpoint.protocol {
            MirrorProtocol::Udp => {
                let local = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
                let sock = UdpSocket::bind(local).map_err(|e| io_error(e, NetError::Connect))?;
                sock.connect(addr)
                    .map_err(|e| io_error(e, NetError::Connect))?;
                info!("StdNetwork: UDP association with {}", addr);
                Ok(Box::new(UdpLink { sock }))
            }
            MirrorProtocol::Tcp => {
                let stream =
                    TcpStream::connect(addr).map_err(|e| io_error(e, NetError::Connect))?;
                info!("StdNetwork: TCP connected to {}", addr);
                Ok(Box::new(TcpLink { stream }))
            }
        }
    }
}

fn resolve(endpoint: &MirrorEndpoint) -> Result<SocketAddr, NetError> {
    (endpoint.host.as_str(), endpoint.port())
        .to_socket_addrs()
        .map_err(|e| io_error(e, NetError::Resolve))?
        .next()
        .ok_or(NetError::Resolve)
}

fn io_error(e: io::Error, as_net: NetError) -> NetError {
    debug!("StdNetwork: {}", e);
    as_net
}

// ── Links ─────────────────────────────────────────────────────

/// Connected UDP socket; one datagram per `send`/`recv`.
pub struct UdpLink {
    sock: UdpSocket,
}

impl MirrorChannel for UdpLink {
    fn send(&mut self, data: &[u8]) -> Result<usize, NetError> {
        self.sock
            .send(data)
            .map_err(|e| io_error(e, NetError::Send))
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        self.sock
            .recv(buf)
            .map_err(|e| io_error(e, NetError::Recv))
    }

    fn try_clone(&self) -> Result<Box<dyn MirrorChannel>, NetError> {
        let sock = self
            .sock
            .try_clone()
            .map_err(|e| io_error(e, NetError::Connect))?;
        Ok(Box::new(UdpLink { sock }))
    }
}

/// TCP stream; chunks are whatever one `read` returns.
pub struct TcpLink {
    stream: TcpStream,
}

impl MirrorChannel for TcpLink {
    fn send(&mut self, data: &[u8]) -> Result<usize, NetError> {
        self.stream
            .write_all(data)
            .map_err(|e| io_error(e, NetError::Send))?;
        Ok(data.len())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        match self.stream.read(buf) {
            Ok(0) => Err(NetError::Closed),
            Ok(n) => Ok(n),
            Err(e) => Err(io_error(e, NetError::Recv)),
        }
    }

    fn try_clone(&self) -> Result<Box<dyn MirrorChannel>, NetError> {
        let stream = self
            .stream
            .try_clone()
            .map_err(|e| io_error(e, NetError::Connect))?;
        Ok(Box::new(TcpLink { stream }))
    }
}
