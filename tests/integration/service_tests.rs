//! End-to-end tests of the consumer: events in, sink events out.
//!
//! Time is driven by a manual clock; each `rig.at(secs, event)` pushes
//! one event and drains everything that follows from it.

use std::sync::atomic::Ordering;
use std::sync::mpsc::channel;

use crate::mock_hw::{
    FakeDownloader, Rig, Seen, active_config, failing_network, mock_network, passive_config,
};

use assettracker::app::service::{BUTTON_FOTA, BUTTON_MIRROR};
use assettracker::config::{DeviceConfig, NoDataConfig, SystemConfig};
use assettracker::error::Error;
use assettracker::events::{EVENT_QUEUE_CAP, Event};
use assettracker::fota::FotaError;
use assettracker::fsm::{StateId, SubState};
use assettracker::app::ports::NetError;
use assettracker::scheduler::DataType;

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn boot_enters_running_in_the_configured_mode() {
    let (mut rig, _net) = Rig::new();
    assert_eq!(rig.app.state(), StateId::Init);
    assert_eq!(rig.sink.events[0], Seen::Started(StateId::Init));

    rig.boot(passive_config(30, 600));

    assert_eq!(rig.app.state(), StateId::Running);
    assert_eq!(rig.app.sub_state(), Some(SubState::PassiveMode));
    assert_eq!(
        rig.sink.count(&Seen::StateChanged {
            from: StateId::Init,
            to: StateId::Running
        }),
        1
    );
    assert_eq!(rig.sink.count(&Seen::ModeChanged(SubState::PassiveMode)), 1);
}

#[test]
fn events_before_config_are_ignored() {
    let (mut rig, _net) = Rig::new();
    rig.at(0, Event::MovementActivity);
    rig.at(0, Event::DataGetAll);
    rig.at(500, Event::TimerTick);
    assert_eq!(rig.app.state(), StateId::Init);
    assert!(rig.sink.requests().is_empty());
}

// ── Passive sampling ──────────────────────────────────────────

#[test]
fn activity_is_debounced_by_movement_resolution() {
    let (mut rig, _net) = Rig::new();
    rig.boot(passive_config(30, 600));
    rig.sink.clear();

    rig.at(0, Event::MovementActivity);
    assert_eq!(rig.sink.requests().len(), 1);
    rig.at(1, Event::DataReady);

    rig.at(10, Event::MovementActivity);
    assert_eq!(rig.sink.requests().len(), 1, "inside the debounce window");

    rig.at(31, Event::MovementActivity);
    assert_eq!(rig.sink.requests().len(), 2);
}

#[test]
fn activity_while_sampling_does_not_stack_requests() {
    let (mut rig, _net) = Rig::new();
    rig.boot(passive_config(30, 600));
    rig.sink.clear();

    rig.at(0, Event::MovementActivity);
    rig.at(40, Event::MovementActivity);

    assert_eq!(rig.sink.requests().len(), 1);
    assert!(rig.app.is_sample_in_flight());
    assert!(rig.app.activity());
}

#[test]
fn passive_timer_samples_only_with_activity() {
    let (mut rig, _net) = Rig::new();
    rig.boot(passive_config(30, 600));
    rig.sink.clear();

    rig.at(30, Event::TimerTick);
    assert!(rig.sink.requests().is_empty());

    rig.at(45, Event::MovementActivity);
    assert_eq!(rig.sink.requests().len(), 1);
    rig.at(46, Event::DataReady);

    // The movement sample restarted the passive timers at t=45.
    rig.at(75, Event::TimerTick);
    assert_eq!(rig.sink.requests().len(), 2);
}

#[test]
fn movement_timeout_samples_without_activity() {
    let (mut rig, _net) = Rig::new();
    rig.boot(passive_config(30, 600));
    rig.sink.clear();

    rig.at(600, Event::TimerTick);
    assert_eq!(rig.sink.requests().len(), 1, "several timers, one request");
}

#[test]
fn inactivity_samples_and_clears_activity() {
    let (mut rig, _net) = Rig::new();
    rig.boot(passive_config(30, 600));
    rig.at(0, Event::MovementActivity);
    rig.at(1, Event::DataReady);
    rig.sink.clear();

    rig.at(5, Event::MovementInactivity);

    assert!(!rig.app.activity());
    assert_eq!(rig.sink.requests().len(), 1);
}

#[test]
fn impact_always_requests_data() {
    let (mut rig, _net) = Rig::new();
    rig.boot(active_config(60));
    rig.sink.clear();

    rig.at(3, Event::MovementImpact);
    assert_eq!(rig.sink.requests().len(), 1);
}

// ── Active sampling ───────────────────────────────────────────

#[test]
fn active_timer_samples_on_cadence_and_skips_while_in_flight() {
    let (mut rig, _net) = Rig::new();
    rig.boot(active_config(60));
    rig.sink.clear();

    rig.at(59, Event::TimerTick);
    assert!(rig.sink.requests().is_empty());

    rig.at(60, Event::TimerTick);
    assert_eq!(rig.sink.requests().len(), 1);

    rig.at(120, Event::TimerTick);
    assert_eq!(rig.sink.requests().len(), 1, "previous sample still running");

    rig.at(121, Event::DataReady);
    rig.at(180, Event::TimerTick);
    assert_eq!(rig.sink.requests().len(), 2);
}

#[test]
fn active_mode_ignores_movement() {
    let (mut rig, _net) = Rig::new();
    rig.boot(active_config(60));
    rig.sink.clear();

    rig.at(1, Event::MovementActivity);
    rig.at(2, Event::MovementInactivity);
    assert!(rig.sink.requests().is_empty());
}

// ── Data requests ─────────────────────────────────────────────

#[test]
fn request_contents_follow_config_and_modem_state() {
    let (mut rig, _net) = Rig::new();
    rig.boot(active_config(60));
    rig.sink.clear();

    rig.at(0, Event::DataGetAll);
    {
        let req = rig.sink.requests()[0];
        assert!(req.contains(DataType::ModemStatic));
        assert!(req.contains(DataType::Location));
        assert_eq!(req.timeout_secs, 55);
    }
    rig.at(1, Event::DataReady);

    rig.at(2, Event::ModemStaticDataReady);
    rig.at(3, Event::DataGetAll);
    let req = rig.sink.requests()[1];
    assert!(!req.contains(DataType::ModemStatic));
    assert!(req.contains(DataType::ModemDynamic));
    assert!(req.contains(DataType::Battery));
    assert!(req.contains(DataType::Environmental));
}

#[test]
fn suppressed_location_uses_default_timeout() {
    let (mut rig, _net) = Rig::new();
    rig.boot(DeviceConfig {
        no_data: NoDataConfig {
            neighbor_cell: false,
            gnss: true,
        },
        ..active_config(60)
    });
    rig.at(0, Event::DataGetAll);

    let req = rig.sink.requests()[0];
    assert!(!req.contains(DataType::Location));
    assert_eq!(req.timeout_secs, 2);
}

#[test]
fn cloud_connect_requests_data() {
    let (mut rig, _net) = Rig::new();
    rig.boot(active_config(60));
    rig.sink.clear();
    rig.at(0, Event::CloudConnected);
    assert_eq!(rig.sink.requests().len(), 1);
    assert!(rig.app.is_sample_in_flight());
    rig.at(1, Event::DataReady);
    assert!(!rig.app.is_sample_in_flight());
}

#[test]
fn battery_reading_is_published() {
    let (mut rig, _net) = Rig::new();
    rig.boot(active_config(60));

    rig.at(0, Event::DataGetAll);
    assert_eq!(rig.sink.count(&Seen::BatteryData { millivolts: 3700 }), 1);

    rig.battery.store(-1, Ordering::Relaxed);
    rig.at(1, Event::DataReady);
    rig.at(2, Event::DataGetAll);
    assert_eq!(rig.sink.count(&Seen::BatteryNotReady), 1);
}

// ── Mode switching ────────────────────────────────────────────

#[test]
fn config_update_switches_mode() {
    let (mut rig, _net) = Rig::new();
    rig.boot(active_config(60));
    rig.sink.clear();

    rig.at(5, Event::ConfigReady(passive_config(30, 600)));
    assert_eq!(rig.app.sub_state(), Some(SubState::PassiveMode));
    assert_eq!(rig.sink.count(&Seen::ModeChanged(SubState::PassiveMode)), 1);
    assert!(!rig.app.config().active_mode);

    // The active cadence no longer runs.
    rig.at(65, Event::TimerTick);
    assert!(rig.sink.requests().is_empty());

    rig.at(70, Event::ConfigReady(active_config(20)));
    assert_eq!(rig.app.sub_state(), Some(SubState::ActiveMode));
    rig.at(90, Event::TimerTick);
    assert_eq!(rig.sink.requests().len(), 1);
}

#[test]
fn same_mode_config_restarts_timers_without_mode_change() {
    let (mut rig, _net) = Rig::new();
    rig.boot(active_config(60));
    rig.sink.clear();

    rig.at(50, Event::ConfigReady(active_config(60)));
    assert_eq!(rig.sink.count(&Seen::ModeChanged(SubState::ActiveMode)), 0);

    rig.at(60, Event::TimerTick);
    assert!(rig.sink.requests().is_empty(), "cadence restarted at t=50");
    rig.at(110, Event::TimerTick);
    assert_eq!(rig.sink.requests().len(), 1);
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn kv_read_of_missing_record_fails() {
    let (mut rig, _net) = Rig::new();
    rig.boot(active_config(60));

    let cmd = rig.command(&[0x02, 4]);
    rig.at(1, cmd);

    assert_eq!(rig.sink.results(), vec![(false, Vec::new())]);
}

#[test]
fn kv_write_then_read_returns_the_record() {
    let (mut rig, _net) = Rig::new();
    rig.boot(active_config(60));

    let write = rig.command(&[0x01, 3, 0x11, 0x22, 0x33]);
    rig.at(1, write);
    assert!(rig.sink.results().is_empty(), "writes produce no result");

    let read = rig.command(&[0x02, 3]);
    rig.at(2, read);
    assert_eq!(rig.sink.results(), vec![(true, vec![0x11, 0x22, 0x33])]);
}

#[test]
fn bus_commands_reach_their_bus() {
    let (mut rig, _net) = Rig::new();
    rig.boot(active_config(60));

    let a_read = rig.command(&[0x04, 2]);
    rig.at(1, a_read);
    let b_write = rig.command(&[0x05, 2, 0x09, 0x08]);
    rig.at(2, b_write);
    let b_read = rig.command(&[0x06, 3]);
    rig.at(3, b_read);

    assert_eq!(*rig.bus_a.written.lock().unwrap(), vec![vec![0x04, 2]]);
    assert_eq!(*rig.bus_b.written.lock().unwrap(), vec![vec![0x09, 0x08]]);
    assert_eq!(
        rig.sink.results(),
        vec![(true, vec![0xA0, 0xA1]), (true, vec![0xA0, 0xA1, 0xA2])]
    );
}

#[test]
fn every_command_buffer_is_released() {
    let (mut rig, _net) = Rig::new();
    rig.boot(active_config(60));

    let frames: [&[u8]; 6] = [
        &[0x01, 2, 1, 2],
        &[0x02, 2],
        &[0x06, 8],
        &[0x7f, 0],
        &[0x02],
        &[0x02, 0],
    ];
    for frame in frames {
        let cmd = rig.command(frame);
        rig.at(1, cmd);
    }

    let stats = rig.app.pool().stats();
    assert_eq!(stats.live_buffers, 0);
    assert_eq!(stats.live_bytes, 0);
    assert_eq!(stats.total_allocated, stats.total_released);
}

#[test]
fn read_without_buffer_space_emits_nothing() {
    let (net, handles) = mock_network();
    let config = SystemConfig {
        heap_budget_bytes: 256,
        ..SystemConfig::default()
    };
    let mut rig = Rig::build(&config, Box::new(net), Box::new(FakeDownloader::ok()));
    rig.boot(active_config(60));
    rig.at(1, Event::ButtonPressed(BUTTON_MIRROR));
    rig.sink.clear();

    // Frame (2 bytes) plus a 255-byte result does not fit in 256.
    let cmd = rig.command(&[0x06, 0xff]);
    rig.at(2, cmd);

    assert!(rig.sink.results().is_empty());
    // Only the greeting went out.
    assert_eq!(handles.sent.lock().unwrap().len(), 1);
    let stats = rig.app.pool().stats();
    assert_eq!(stats.live_buffers, 0);
    assert_eq!(stats.total_allocated, stats.total_released);
}

#[test]
fn commands_outside_running_are_dropped() {
    let (mut rig, _net) = Rig::new();
    let cmd = rig.command(&[0x02, 2]);
    rig.at(0, cmd);

    assert!(rig.sink.results().is_empty());
    assert_eq!(rig.app.pool().stats().live_buffers, 0);
}

// ── Firmware update ───────────────────────────────────────────

#[test]
fn fota_locks_buttons_until_it_reports() {
    let (tx, rx) = channel();
    let (net, handles) = mock_network();
    let downloader = FakeDownloader {
        gate: Some(rx),
        ..FakeDownloader::ok()
    };
    let mut rig = Rig::build(
        &SystemConfig::default(),
        Box::new(net),
        Box::new(downloader),
    );
    rig.boot(active_config(60));

    rig.at(1, Event::ButtonPressed(BUTTON_FOTA));
    assert_eq!(rig.sink.count(&Seen::FotaStarted), 1);
    assert!(rig.app.is_fota_locked());

    rig.at(2, Event::ButtonPressed(BUTTON_MIRROR));
    rig.at(3, Event::ButtonPressed(BUTTON_FOTA));
    assert_eq!(handles.connects.load(Ordering::Relaxed), 0);
    assert_eq!(rig.sink.count(&Seen::FotaStarted), 1);

    tx.send(()).unwrap();
    rig.app.join_fota();
    rig.app.process_pending(&mut rig.sink);

    assert_eq!(rig.sink.count(&Seen::FotaFinished), 1);
    assert!(!rig.app.is_fota_locked());

    rig.at(4, Event::ButtonPressed(BUTTON_MIRROR));
    assert_eq!(rig.sink.count(&Seen::MirrorConnected), 1);
}

#[test]
fn failed_download_releases_the_lock() {
    let (net, _handles) = mock_network();
    let downloader = FakeDownloader {
        start_result: Err(FotaError::DownloadFailed),
        ..FakeDownloader::ok()
    };
    let mut rig = Rig::build(
        &SystemConfig::default(),
        Box::new(net),
        Box::new(downloader),
    );
    rig.boot(active_config(60));

    rig.at(1, Event::ButtonPressed(BUTTON_FOTA));
    rig.app.join_fota();
    rig.app.process_pending(&mut rig.sink);

    assert_eq!(rig.sink.count(&Seen::FotaFailed), 1);
    assert!(!rig.app.is_fota_locked());
}

#[test]
fn fota_can_be_retriggered_once_unlocked() {
    let (mut rig, _net) = Rig::new();
    rig.boot(active_config(60));

    for round in 1..=3 {
        rig.at(round, Event::ButtonPressed(BUTTON_FOTA));
        // The worker may report before or after `at` returns.
        for _ in 0..200 {
            if !rig.app.is_fota_locked() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
            rig.app.process_pending(&mut rig.sink);
        }
        assert!(!rig.app.is_fota_locked());
    }

    assert_eq!(rig.sink.count(&Seen::FotaStarted), 3);
    assert_eq!(rig.sink.count(&Seen::FotaFinished), 3);
    assert!(!rig.sink.events.iter().any(|e| matches!(e, Seen::Error(_))));
    rig.app.join_fota();
}

#[test]
fn init_failure_reports_error_and_unlocks() {
    let (net, _handles) = mock_network();
    let downloader = FakeDownloader {
        init_result: Err(FotaError::InitFailed),
        ..FakeDownloader::ok()
    };
    let starts = std::sync::Arc::clone(&downloader.starts);
    let mut rig = Rig::build(
        &SystemConfig::default(),
        Box::new(net),
        Box::new(downloader),
    );
    rig.boot(active_config(60));

    rig.at(1, Event::ButtonPressed(BUTTON_FOTA));

    assert_eq!(
        rig.sink.count(&Seen::Error(Error::Fota(FotaError::InitFailed))),
        1
    );
    assert_eq!(rig.sink.count(&Seen::FotaStarted), 0);
    assert!(!rig.app.is_fota_locked());
    assert_eq!(starts.load(Ordering::Relaxed), 0);
}

// ── Remote mirror ─────────────────────────────────────────────

#[test]
fn mirror_greets_and_duplicates_results() {
    let (mut rig, net) = Rig::new();
    rig.boot(active_config(60));
    rig.store.0.lock().unwrap().insert(0x01, vec![7, 8]);

    // Not mirrored before the link is up.
    let early = rig.command(&[0x02, 2]);
    rig.at(1, early);
    assert!(net.sent.lock().unwrap().is_empty());

    rig.at(2, Event::ButtonPressed(BUTTON_MIRROR));
    assert!(rig.app.is_mirror_active());
    assert_eq!(rig.sink.count(&Seen::MirrorConnected), 1);
    assert_eq!(
        net.sent.lock().unwrap()[0],
        SystemConfig::default().mirror.greeting.as_bytes()
    );

    let read = rig.command(&[0x02, 2]);
    rig.at(3, read);
    assert_eq!(net.sent.lock().unwrap().last().unwrap(), &vec![7, 8]);

    // Writes produce nothing to mirror.
    let write = rig.command(&[0x01, 1, 5]);
    rig.at(4, write);
    assert_eq!(net.sent.lock().unwrap().len(), 2);

    assert_eq!(rig.app.pool().stats().live_buffers, 0);
}

#[test]
fn inbound_mirror_chunks_become_commands() {
    let (mut rig, net) = Rig::new();
    rig.boot(active_config(60));
    rig.at(1, Event::ButtonPressed(BUTTON_MIRROR));

    net.inbound.send(vec![0x06, 2]).unwrap();
    assert!(rig.wait_for_event());
    rig.app.process_pending(&mut rig.sink);

    assert_eq!(rig.sink.results(), vec![(true, vec![0xA0, 0xA1])]);
    assert_eq!(net.sent.lock().unwrap().last().unwrap(), &vec![0xA0, 0xA1]);
}

#[test]
fn mirror_triggers_only_once() {
    let (mut rig, net) = Rig::new();
    rig.boot(active_config(60));

    rig.at(1, Event::ButtonPressed(BUTTON_MIRROR));
    rig.at(2, Event::ButtonPressed(BUTTON_MIRROR));

    assert_eq!(net.connects.load(Ordering::Relaxed), 1);
    assert_eq!(rig.sink.count(&Seen::MirrorConnected), 1);
}

#[test]
fn failed_mirror_connect_is_not_retried() {
    let (net, connects) = failing_network();
    let mut rig = Rig::build(
        &SystemConfig::default(),
        Box::new(net),
        Box::new(FakeDownloader::ok()),
    );
    rig.boot(active_config(60));

    rig.at(1, Event::ButtonPressed(BUTTON_MIRROR));
    rig.at(2, Event::ButtonPressed(BUTTON_MIRROR));

    assert_eq!(
        rig.sink.count(&Seen::Error(Error::Net(NetError::Connect))),
        1
    );
    assert_eq!(connects.load(Ordering::Relaxed), 1);
    assert!(!rig.app.is_mirror_active());
}

// ── Shutdown ──────────────────────────────────────────────────

#[test]
fn shutdown_acknowledges_and_is_terminal() {
    let (mut rig, _net) = Rig::new();
    rig.boot(passive_config(30, 600));

    rig.at(1, Event::ShutdownRequest);
    assert_eq!(rig.app.state(), StateId::Shutdown);
    assert_eq!(rig.app.sub_state(), None);
    assert_eq!(rig.sink.count(&Seen::ShutdownReady { module_id: 1 }), 1);
    rig.sink.clear();

    rig.at(2, Event::ConfigReady(active_config(10)));
    rig.at(3, Event::MovementActivity);
    rig.at(5000, Event::TimerTick);
    let cmd = rig.command(&[0x02, 2]);
    rig.at(5001, cmd);
    rig.at(5002, Event::ShutdownRequest);

    assert_eq!(rig.app.state(), StateId::Shutdown);
    assert!(rig.sink.requests().is_empty());
    assert!(rig.sink.results().is_empty());
    assert_eq!(rig.app.pool().stats().live_buffers, 0);
}

#[test]
fn shutdown_from_init() {
    let (mut rig, _net) = Rig::new();
    rig.at(0, Event::ShutdownRequest);
    assert_eq!(rig.app.state(), StateId::Shutdown);
    assert_eq!(rig.sink.count(&Seen::ShutdownReady { module_id: 1 }), 1);

    rig.at(1, Event::ConfigInit(active_config(60)));
    assert_eq!(rig.app.state(), StateId::Shutdown);
}

#[test]
fn run_returns_once_shut_down_and_drained() {
    let (mut rig, _net) = Rig::new();
    rig.push(Event::ConfigInit(active_config(60)));
    rig.push(Event::DataGetAll);
    rig.push(Event::ShutdownRequest);

    rig.app.run(&mut rig.sink);

    assert!(rig.queue.is_empty());
    assert_eq!(rig.app.state(), StateId::Shutdown);
    assert_eq!(rig.sink.requests().len(), 1);
    assert_eq!(rig.sink.count(&Seen::ShutdownReady { module_id: 1 }), 1);
}

// ── Queue pressure ────────────────────────────────────────────

#[test]
fn full_queue_is_reported_not_fatal() {
    let (mut rig, _net) = Rig::new();
    rig.boot(active_config(60));
    for _ in 0..EVENT_QUEUE_CAP {
        rig.push(Event::DataReady);
    }

    rig.app.handle(Event::DataGetAll, &mut rig.sink);
    assert_eq!(rig.sink.count(&Seen::Error(Error::QueueFull)), 1);

    assert_eq!(rig.app.process_pending(&mut rig.sink), EVENT_QUEUE_CAP);
    assert_eq!(rig.app.state(), StateId::Running);
}
