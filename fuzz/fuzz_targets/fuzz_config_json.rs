//! Fuzz target: `DeviceConfig::from_json`
//!
//! Arbitrary bytes as a cloud configuration document.  Decoding must never
//! panic, and anything it accepts must pass validation and produce a
//! well-formed data request.
//!
//! cargo fuzz run fuzz_config_json

#![no_main]

use assettracker::config::DeviceConfig;
use assettracker::scheduler::DataRequest;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(cfg) = DeviceConfig::from_json(data) else {
        return;
    };
    assert!(cfg.validate().is_ok());

    let req = DataRequest::fetch_all(&cfg, false);
    assert!(req.timeout_secs >= 2 && req.timeout_secs <= 110);
});
