//! Concrete state handler functions and table builders.
//!
//! Each state is an optional entry action plus one event handler, all
//! plain `fn` pointers.  Handlers only touch the [`FsmContext`]; events
//! that carry buffers or need hardware are handled by the service.
//!
//! ```text
//!  INIT ──[ConfigInit]──▶ RUNNING ──[ShutdownRequest]──▶ SHUTDOWN
//!                          │
//!          ACTIVE ◀──[ConfigReady active]── PASSIVE
//!          ACTIVE ──[ConfigReady passive]─▶ PASSIVE
//!
//!  Any state ──[ShutdownRequest]──▶ SHUTDOWN
//! ```

use log::{debug, info, warn};

use super::context::FsmContext;
use super::{StateDescriptor, SubState, Transition};
use crate::events::Event;
use crate::fota::FotaProgress;
use crate::scheduler::TimerId;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builders
// ═══════════════════════════════════════════════════════════════════════════

/// Top-level states, indexed by `StateId`.
pub fn build_state_table() -> [StateDescriptor; 3] {
    [
        // Index 0: Init
        StateDescriptor {
            name: "Init",
            on_enter: None,
            on_event: Some(init_event),
        },
        // Index 1: Running
        StateDescriptor {
            name: "Running",
            on_enter: None,
            on_event: Some(running_event),
        },
        // Index 2: Shutdown
        StateDescriptor {
            name: "Shutdown",
            on_enter: Some(shutdown_enter),
            on_event: None,
        },
    ]
}

/// Sampling modes, indexed by `SubState`.
pub fn build_sub_state_table() -> [StateDescriptor; 2] {
    [
        // Index 0: ActiveMode
        StateDescriptor {
            name: "ActiveMode",
            on_enter: Some(active_enter),
            on_event: Some(active_event),
        },
        // Index 1: PassiveMode
        StateDescriptor {
            name: "PassiveMode",
            on_enter: Some(passive_enter),
            on_event: Some(passive_event),
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  INIT
// ═══════════════════════════════════════════════════════════════════════════

fn init_event(ctx: &mut FsmContext, event: &Event) -> Option<Transition> {
    let Event::ConfigInit(cfg) = event else {
        return None;
    };
    ctx.config = cfg.clone();
    info!(
        "INIT: configuration received, starting in {} mode",
        if cfg.active_mode { "active" } else { "passive" }
    );
    Some(Transition::Run(SubState::from_active(cfg.active_mode)))
}

// ═══════════════════════════════════════════════════════════════════════════
//  RUNNING
// ═══════════════════════════════════════════════════════════════════════════

fn running_event(ctx: &mut FsmContext, event: &Event) -> Option<Transition> {
    if matches!(event, Event::CloudConnected | Event::DataGetAll) {
        let req = ctx.build_request();
        debug!(
            "RUNNING: requesting {} data types, timeout {}s",
            req.types.len(),
            req.timeout_secs
        );
        ctx.emit(Event::DataGet(req));
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  ACTIVE MODE: fixed cadence
// ═══════════════════════════════════════════════════════════════════════════

fn active_enter(ctx: &mut FsmContext) {
    info!(
        "ACTIVE: sampling every {}s",
        ctx.config.active_wait_timeout
    );
    ctx.scheduler.start_active(&ctx.config, ctx.now_ms);
}

fn active_event(ctx: &mut FsmContext, event: &Event) -> Option<Transition> {
    match event {
        Event::ConfigReady(cfg) => {
            ctx.config = cfg.clone();
            if !cfg.active_mode {
                return Some(Transition::Mode(SubState::PassiveMode));
            }
            ctx.scheduler.start_active(&ctx.config, ctx.now_ms);
        }
        Event::TimerTick => {
            if ctx.scheduler.poll(ctx.now_ms).contains(&TimerId::ActiveSample) {
                ctx.request_sample();
            }
        }
        Event::MovementActivity | Event::MovementInactivity => {
            debug!("ACTIVE: {} ignored", event.name());
        }
        _ => {}
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  PASSIVE MODE: movement driven
// ═══════════════════════════════════════════════════════════════════════════

fn passive_enter(ctx: &mut FsmContext) {
    info!(
        "PASSIVE: movement timeout {}s, resolution {}s",
        ctx.config.movement_timeout, ctx.config.movement_resolution
    );
    ctx.scheduler.start_passive(&ctx.config, ctx.now_ms);
}

fn passive_event(ctx: &mut FsmContext, event: &Event) -> Option<Transition> {
    match event {
        Event::ConfigReady(cfg) => {
            ctx.config = cfg.clone();
            if cfg.active_mode {
                return Some(Transition::Mode(SubState::ActiveMode));
            }
            ctx.scheduler.start_passive(&ctx.config, ctx.now_ms);
        }
        Event::MovementActivity => movement(ctx, true),
        Event::MovementInactivity => movement(ctx, false),
        Event::TimerTick => {
            let fired = ctx.scheduler.poll(ctx.now_ms);
            if fired.contains(&TimerId::PassiveSample) && ctx.activity {
                ctx.request_sample();
            }
            if fired.contains(&TimerId::MovementTimeout) {
                ctx.request_sample();
            }
        }
        _ => {}
    }
    None
}

fn movement(ctx: &mut FsmContext, active: bool) {
    ctx.activity = active;

    if ctx.sample_request_ongoing {
        debug!("PASSIVE: sample request ongoing, movement discarded");
        return;
    }
    if active && !ctx.scheduler.debounce_elapsed(ctx.now_ms) {
        debug!(
            "PASSIVE: resolution window open for {} ms, activity discarded",
            ctx.scheduler
                .remaining_ms(TimerId::MovementResolution, ctx.now_ms)
        );
        return;
    }

    ctx.emit(Event::DataGetAll);
    ctx.scheduler.restart_passive(&ctx.config, ctx.now_ms);
}

// ═══════════════════════════════════════════════════════════════════════════
//  SHUTDOWN
// ═══════════════════════════════════════════════════════════════════════════

fn shutdown_enter(ctx: &mut FsmContext) {
    ctx.scheduler.stop_all();
    warn!("SHUTDOWN: sampling stopped");
}

// ═══════════════════════════════════════════════════════════════════════════
//  All states
// ═══════════════════════════════════════════════════════════════════════════

/// Runs after the per-state handlers for every event, in every state.
pub fn on_all_states(ctx: &mut FsmContext, event: &Event) -> Option<Transition> {
    match event {
        Event::ShutdownRequest => {
            ctx.emit(Event::ShutdownReady {
                module_id: ctx.module_id,
            });
            return Some(Transition::Shutdown);
        }
        Event::ModemStaticDataReady => ctx.modem_static_sampled = true,
        Event::DataGet(_) => ctx.sample_request_ongoing = true,
        Event::DataReady => ctx.sample_request_ongoing = false,
        Event::MovementImpact => ctx.emit(Event::DataGetAll),
        Event::FotaProgress(progress) => {
            ctx.fota_lock = false;
            match progress {
                FotaProgress::Finished => info!("FOTA: image ready, reset to apply"),
                FotaProgress::Error => warn!("FOTA: update failed, lock released"),
            }
        }
        _ => {}
    }
    None
}
