//! Hierarchical state machine.
//!
//! ```text
//!            ConfigInit                 ShutdownRequest
//!   ┌──────┐ ─────────▶ ┌──────────────────────┐ ─────────▶ ┌──────────┐
//!   │ Init │            │ Running              │            │ Shutdown │
//!   └──────┘            │  ┌────────────────┐  │            └──────────┘
//!       │               │  │ ActiveMode     │  │                 ▲
//!       │               │  └──────▲─────────┘  │                 │
//!       │               │   config│ │config    │                 │
//!       │               │  ┌──────┴─▼───────┐  │                 │
//!       │               │  │ PassiveMode    │  │                 │
//!       │               │  └────────────────┘  │                 │
//!       │               └──────────────────────┘                 │
//!       └────────────────────────────────────────────────────────┘
//! ```
//!
//! Every event runs through up to three handlers in order: the handler
//! for the current state (for `Running`, the sub-state handler first,
//! then the running handler), then the all-states handler.  Handlers live
//! in [`states`] and operate on the shared [`FsmContext`].  Entry actions
//! start the timer set of the entered mode.

pub mod context;
pub mod states;

pub use context::FsmContext;

use log::{debug, warn};

use crate::events::Event;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Top-level states.  One-way: `Init → Running → Shutdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Init = 0,
    Running = 1,
    Shutdown = 2,
}

impl StateId {
    pub fn name(self) -> &'static str {
        match self {
            Self::Init => "STATE_INIT",
            Self::Running => "STATE_RUNNING",
            Self::Shutdown => "STATE_SHUTDOWN",
        }
    }
}

/// Sampling mode, only meaningful in `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SubState {
    ActiveMode = 0,
    PassiveMode = 1,
}

impl SubState {
    pub fn name(self) -> &'static str {
        match self {
            Self::ActiveMode => "SUB_STATE_ACTIVE_MODE",
            Self::PassiveMode => "SUB_STATE_PASSIVE_MODE",
        }
    }

    pub fn from_active(active_mode: bool) -> Self {
        if active_mode {
            Self::ActiveMode
        } else {
            Self::PassiveMode
        }
    }
}

/// A transition requested by a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// `Init → Running` in the given mode.
    Run(SubState),
    /// Switch sampling mode within `Running`.
    Mode(SubState),
    /// Terminal.
    Shutdown,
}

// ---------------------------------------------------------------------------
// State descriptor
// ---------------------------------------------------------------------------

/// Optional entry action.
pub type EnterFn = fn(&mut FsmContext);

/// Event handler; may request a transition.
pub type EventFn = fn(&mut FsmContext, &Event) -> Option<Transition>;

/// A state (or sub-state) is an entry action plus an event handler.
#[derive(Clone, Copy)]
pub struct StateDescriptor {
    pub name: &'static str,
    pub on_enter: Option<EnterFn>,
    pub on_event: Option<EventFn>,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// Table-driven state/sub-state machine with guarded, logged transitions.
pub struct Fsm {
    states: [StateDescriptor; 3],
    sub_states: [StateDescriptor; 2],
    state: StateId,
    sub_state: SubState,
    transitions: u32,
}

impl Fsm {
    pub fn new() -> Self {
        Self {
            states: states::build_state_table(),
            sub_states: states::build_sub_state_table(),
            state: StateId::Init,
            sub_state: SubState::ActiveMode,
            transitions: 0,
        }
    }

    pub fn state(&self) -> StateId {
        self.state
    }

    /// Current sub-state; `None` outside `Running`.
    pub fn sub_state(&self) -> Option<SubState> {
        (self.state == StateId::Running).then_some(self.sub_state)
    }

    /// Number of applied transitions since boot.
    pub fn transition_count(&self) -> u32 {
        self.transitions
    }

    /// Run one event through the handlers: current state (sub-state first
    /// when `Running`), then the all-states handler.
    pub fn handle(&mut self, ctx: &mut FsmContext, event: &Event) {
        if self.state == StateId::Running {
            let sub = self.sub_states[self.sub_state as usize];
            if let Some(t) = sub.on_event.and_then(|h| h(ctx, event)) {
                self.apply(ctx, t);
            }
        }

        let current = self.states[self.state as usize];
        if let Some(t) = current.on_event.and_then(|h| h(ctx, event)) {
            self.apply(ctx, t);
        }

        if let Some(t) = states::on_all_states(ctx, event) {
            self.apply(ctx, t);
        }
    }

    /// Apply a transition.  Returns `false` if it is not legal from the
    /// current state.
    pub fn apply(&mut self, ctx: &mut FsmContext, t: Transition) -> bool {
        match (self.state, t) {
            (StateId::Init, Transition::Run(sub)) => {
                self.enter_state(ctx, StateId::Running);
                self.enter_sub_state(ctx, sub);
                true
            }
            (StateId::Running, Transition::Mode(sub)) => {
                if sub != self.sub_state {
                    self.enter_sub_state(ctx, sub);
                }
                true
            }
            (StateId::Init | StateId::Running, Transition::Shutdown) => {
                self.enter_state(ctx, StateId::Shutdown);
                true
            }
            (StateId::Shutdown, Transition::Shutdown) => true,
            (state, t) => {
                warn!("FSM: {:?} not allowed in {}", t, state.name());
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn enter_state(&mut self, ctx: &mut FsmContext, next: StateId) {
        debug!("FSM transition: {} -> {}", self.state.name(), next.name());
        self.state = next;
        self.transitions += 1;
        if let Some(enter) = self.states[next as usize].on_enter {
            enter(ctx);
        }
    }

    fn enter_sub_state(&mut self, ctx: &mut FsmContext, next: SubState) {
        debug!(
            "FSM sub-state transition: {} -> {}",
            self.sub_state.name(),
            next.name()
        );
        self.sub_state = next;
        self.transitions += 1;
        if let Some(enter) = self.sub_states[next as usize].on_enter {
            enter(ctx);
        }
    }
}

impl Default for Fsm {
    fn default() -> Self {
        Self::new()
    }
}
