//! Command dispatcher.
//!
//! Executes one raw frame against the backend named by its opcode:
//!
//! | Opcode        | Backend | Action                                          |
//! |---------------|---------|-------------------------------------------------|
//! | `KV_WRITE`    | store   | write declared payload under the command record |
//! | `KV_READ`     | store   | read `length` bytes of the command record       |
//! | `BUS_A_WRITE` | bus A   | forward the whole frame                         |
//! | `BUS_A_READ`  | bus A   | frame as request, settle, read `length` bytes   |
//! | `BUS_B_WRITE` | bus B   | write declared payload                          |
//! | `BUS_B_READ`  | bus B   | read `length` bytes                             |
//!
//! Writes produce no result.  Reads produce a [`CommandResult`]; when the
//! mirror is active a successful result is also duplicated for it.  A read
//! whose result buffer cannot be allocated is abandoned with no result.
//! The frame buffer is consumed by value and released when dispatch
//! returns.

use log::{debug, info, warn};

use super::buffer::{BufferPool, CmdBuffer};
use super::frame::{Frame, Opcode};
use crate::app::ports::{BusTransactor, KvStore};
use crate::error::Error;

/// Outcome of a read command.
#[derive(Debug)]
pub struct CommandResult {
    pub ok: bool,
    pub data: Option<CmdBuffer>,
}

impl CommandResult {
    pub fn failed() -> Self {
        Self {
            ok: false,
            data: None,
        }
    }

    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What the consumer must enqueue after a dispatch.
#[derive(Debug, Default)]
pub struct Dispatched {
    pub result: Option<CommandResult>,
    /// Copy of the result data for the remote mirror.
    pub mirror_copy: Option<CmdBuffer>,
}

/// Backends the dispatcher drives, injected at construction.
pub struct Backends {
    pub store: Box<dyn KvStore>,
    pub bus_a: Box<dyn BusTransactor>,
    pub bus_b: Box<dyn BusTransactor>,
}

pub struct Dispatcher {
    backends: Backends,
    pool: BufferPool,
    kv_record_id: u16,
}

impl Dispatcher {
    pub fn new(backends: Backends, pool: BufferPool, kv_record_id: u16) -> Self {
        Self {
            backends,
            pool,
            kv_record_id,
        }
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Execute one frame.  `mirror_active` requests a duplicate of any
    /// result data.
    pub fn dispatch(&mut self, frame_buf: CmdBuffer, mirror_active: bool) -> Dispatched {
        let frame = match Frame::parse(&frame_buf) {
            Ok(f) => f,
            Err(e) => {
                warn!("Dispatcher: dropping malformed frame: {}", e);
                return Dispatched::default();
            }
        };

        let Some(op) = frame.op() else {
            warn!("Dispatcher: unknown opcode 0x{:02x}", frame.opcode);
            return Dispatched::default();
        };

        if op.is_write() && !frame.length_matches() {
            warn!(
                "Dispatcher: {:?} length field {} but {} payload bytes",
                op,
                frame.length,
                frame.payload.len()
            );
        }

        if op.is_write() {
            match self.execute_write(op, &frame) {
                Ok(()) => info!("Dispatcher: {:?} ok", op),
                Err(e) => warn!("Dispatcher: {:?} failed: {}", op, e),
            }
            return Dispatched::default();
        }

        let Some(result) = self.execute_read(op, frame.length as usize, &frame) else {
            return Dispatched::default();
        };
        let mirror_copy = if mirror_active {
            result.data.as_ref().and_then(|d| match d.duplicate() {
                Ok(copy) => Some(copy),
                Err(e) => {
                    warn!("Dispatcher: no mirror copy: {}", e);
                    None
                }
            })
        } else {
            None
        };

        Dispatched {
            result: Some(result),
            mirror_copy,
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn execute_write(&mut self, op: Opcode, frame: &Frame<'_>) -> Result<(), Error> {
        match op {
            Opcode::KvWrite => self
                .backends
                .store
                .write(self.kv_record_id, frame.declared_payload())?,
            Opcode::BusAWrite => self.backends.bus_a.write(frame.raw)?,
            Opcode::BusBWrite => self.backends.bus_b.write(frame.declared_payload())?,
            Opcode::KvRead | Opcode::BusARead | Opcode::BusBRead => {}
        }
        Ok(())
    }

    /// `None` when the result buffer cannot be allocated.
    fn execute_read(
        &mut self,
        op: Opcode,
        len: usize,
        frame: &Frame<'_>,
    ) -> Option<CommandResult> {
        if len == 0 {
            debug!("Dispatcher: {:?} with zero length", op);
            return Some(CommandResult::failed());
        }

        let mut buf = match self.pool.alloc(len) {
            Ok(b) => b,
            Err(e) => {
                warn!("Dispatcher: {:?} abandoned: {}", op, e);
                return None;
            }
        };

        let read: Result<usize, Error> = match op {
            Opcode::KvRead => self
                .backends
                .store
                .read(self.kv_record_id, &mut buf)
                .map_err(Error::from),
            Opcode::BusARead => self
                .backends
                .bus_a
                .transact(frame.raw, &mut buf)
                .map(|()| len)
                .map_err(Error::from),
            Opcode::BusBRead => self
                .backends
                .bus_b
                .read(&mut buf)
                .map(|()| len)
                .map_err(Error::from),
            Opcode::KvWrite | Opcode::BusAWrite | Opcode::BusBWrite => Ok(0),
        };

        let result = match read {
            Ok(n) if n > 0 => {
                buf.truncate(n);
                info!("Dispatcher: {:?} read {} bytes", op, n);
                CommandResult {
                    ok: true,
                    data: Some(buf),
                }
            }
            Ok(_) => {
                warn!("Dispatcher: {:?} returned no data", op);
                CommandResult::failed()
            }
            Err(e) => {
                warn!("Dispatcher: {:?} failed: {}", op, e);
                CommandResult::failed()
            }
        };
        Some(result)
    }
}
