//! Remote command protocol.
//!
//! ```text
//!  CustomCommand(frame) ──▶ Dispatcher ──▶ store / bus A / bus B
//!                               │
//!                               ├──▶ CommandResultReady(result)
//!                               └──▶ MirrorSend(copy)      (mirror active)
//! ```

pub mod buffer;
pub mod dispatcher;
pub mod frame;

pub use buffer::{AllocError, BufferPool, CmdBuffer, PoolStats};
pub use dispatcher::{Backends, CommandResult, Dispatched, Dispatcher};
pub use frame::{Frame, FrameError, Opcode};
