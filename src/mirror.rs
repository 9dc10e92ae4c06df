//! Remote mirror.
//!
//! An optional duplex link to a secondary server, opened by an explicit
//! operator trigger.  Outbound, command results are sent on it.  Inbound,
//! a dedicated receive thread turns every chunk into a `CustomCommand`
//! event, so the remote side can drive the command protocol.
//!
//! ```text
//!  consumer ── MirrorSend(buf) ──▶ link.send ───▶ server
//!  consumer ◀── CustomCommand ◀── rx thread ◀─── server
//! ```
//!
//! At most one link per process.  The first trigger consumes the latch
//! even when connecting fails; there is no teardown or reconnect.

use core::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;

use log::{error, info, warn};

use crate::app::ports::{MirrorChannel, NetError, NetworkPort};
use crate::command::{BufferPool, CmdBuffer};
use crate::config::MirrorEndpoint;
use crate::events::{Event, EventQueue};

const RX_STACK_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorError {
    /// The one-shot trigger was already used.
    AlreadyTriggered,
    /// The link could not be established.
    Net(NetError),
    /// The receive thread could not be spawned.
    SpawnFailed,
}

impl fmt::Display for MirrorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyTriggered => write!(f, "mirror already triggered"),
            Self::Net(e) => write!(f, "mirror link: {e}"),
            Self::SpawnFailed => write!(f, "could not spawn mirror receiver"),
        }
    }
}

impl From<NetError> for MirrorError {
    fn from(e: NetError) -> Self {
        Self::Net(e)
    }
}

pub struct Mirror {
    endpoint: MirrorEndpoint,
    armed: bool,
    link: Option<Box<dyn MirrorChannel>>,
    receiver: Option<JoinHandle<()>>,
}

impl Mirror {
    pub fn new(endpoint: MirrorEndpoint) -> Self {
        Self {
            endpoint,
            armed: true,
            link: None,
            receiver: None,
        }
    }

    /// `true` once the link is up.
    pub fn is_active(&self) -> bool {
        self.link.is_some()
    }

    /// `true` until the first trigger.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Open the link, greet the server and start the receive thread.
    pub fn trigger(
        &mut self,
        net: &mut dyn NetworkPort,
        queue: &Arc<EventQueue>,
        pool: &BufferPool,
    ) -> Result<(), MirrorError> {
        if !self.armed {
            return Err(MirrorError::AlreadyTriggered);
        }
        self.armed = false;

        let mut link = net.connect(&self.endpoint)?;
        info!(
            "Mirror: connected to {}:{} ({:?})",
            self.endpoint.host,
            self.endpoint.port(),
            self.endpoint.protocol
        );

        if let Err(e) = link.send(self.endpoint.greeting.as_bytes()) {
            warn!("Mirror: greeting not sent: {}", e);
        }

        let rx = link.try_clone()?;
        let queue = Arc::clone(queue);
        let pool = pool.clone();
        let buf_len = usize::from(self.endpoint.recv_buf_len);
        let handle = std::thread::Builder::new()
            .name("mirror-rx".into())
            .stack_size(RX_STACK_SIZE)
            .spawn(move || receive_loop(rx, &queue, &pool, buf_len))
            .map_err(|_| MirrorError::SpawnFailed)?;

        self.link = Some(link);
        self.receiver = Some(handle);
        Ok(())
    }

    /// Send one buffer on the link and release it.  Failures are logged.
    pub fn send(&mut self, buf: CmdBuffer) {
        let Some(link) = self.link.as_mut() else {
            warn!("Mirror: not connected, dropping {} bytes", buf.len());
            return;
        };
        match link.send(&buf) {
            Ok(n) => info!("Mirror: sent {} bytes", n),
            Err(e) => warn!("Mirror: send failed: {}", e),
        }
    }

    /// `true` if the receive thread has stopped.
    pub fn receiver_finished(&self) -> bool {
        self.receiver.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

/// Turn every inbound chunk into a `CustomCommand` until the link fails.
fn receive_loop(
    mut link: Box<dyn MirrorChannel>,
    queue: &EventQueue,
    pool: &BufferPool,
    buf_len: usize,
) {
    let mut buf = vec![0u8; buf_len];
    loop {
        let n = match link.recv(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                warn!("Mirror: receive loop ended: {}", e);
                break;
            }
        };
        info!("Mirror: received {} bytes", n);

        let frame = match pool.alloc_from(&buf[..n]) {
            Ok(f) => f,
            Err(e) => {
                warn!("Mirror: dropping inbound chunk: {}", e);
                continue;
            }
        };
        if let Err(e) = queue.push(Event::CustomCommand(frame)) {
            error!("Mirror: {}", e);
        }
    }
}
