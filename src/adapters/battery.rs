//! Battery voltage sensor.
//!
//! The supply rail is divided down onto an ADC pin.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1 through the oneshot driver with curve-fitting
//! calibration.  On host/test: reads from a static `AtomicI32` for
//! injection, where `-1` means the sensor is not ready.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicI32, Ordering};

use crate::app::ports::BatteryPort;
use crate::error::SensorError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Resistor divider between the battery and the ADC pin.
const DIVIDER_RATIO: i32 = 2;

#[cfg(not(target_os = "espidf"))]
static SIM_BATTERY_MV: AtomicI32 = AtomicI32::new(3700);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_battery_mv(mv: i32) {
    SIM_BATTERY_MV.store(mv, Ordering::Relaxed);
}

pub struct BatterySensor {
    #[cfg(target_os = "espidf")]
    unit: adc_oneshot_unit_handle_t,
    #[cfg(target_os = "espidf")]
    cali: adc_cali_handle_t,
    _channel: u32,
}

// SAFETY: the ADC handles are only used through `&mut self`, i.e. from one
// thread at a time.
#[cfg(target_os = "espidf")]
unsafe impl Send for BatterySensor {}

impl BatterySensor {
    #[cfg(target_os = "espidf")]
    pub fn new(channel: u32) -> Result<Self, SensorError> {
        let mut unit: adc_oneshot_unit_handle_t = core::ptr::null_mut();
        let init_cfg = adc_oneshot_unit_init_cfg_t {
            unit_id: adc_unit_t_ADC_UNIT_1,
            ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
            ..Default::default()
        };
        // SAFETY: `unit` outlives the call; the driver owns the unit after.
        if unsafe { adc_oneshot_new_unit(&init_cfg, &mut unit) } != ESP_OK {
            return Err(SensorError::NotReady);
        }

        let chan_cfg = adc_oneshot_chan_cfg_t {
            atten: adc_atten_t_ADC_ATTEN_DB_12,
            bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
        };
        if unsafe { adc_oneshot_config_channel(unit, channel, &chan_cfg) } != ESP_OK {
            return Err(SensorError::NotReady);
        }

        let mut cali: adc_cali_handle_t = core::ptr::null_mut();
        let cali_cfg = adc_cali_curve_fitting_config_t {
            unit_id: adc_unit_t_ADC_UNIT_1,
            chan: channel,
            atten: adc_atten_t_ADC_ATTEN_DB_12,
            bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
        };
        if unsafe { adc_cali_create_scheme_curve_fitting(&cali_cfg, &mut cali) } != ESP_OK {
            log::warn!("BatterySensor: no calibration scheme, readings unavailable");
            return Err(SensorError::NotReady);
        }

        log::info!("BatterySensor: ADC1 channel {} ready", channel);
        Ok(Self {
            unit,
            cali,
            _channel: channel,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(channel: u32) -> Result<Self, SensorError> {
        Ok(Self { _channel: channel })
    }

    #[cfg(target_os = "espidf")]
    fn read_pin_mv(&mut self) -> Result<i32, SensorError> {
        let mut raw: i32 = 0;
        // SAFETY: handles were created in `new` and are never shared.
        if unsafe { adc_oneshot_read(self.unit, self._channel, &mut raw) } != ESP_OK {
            return Err(SensorError::AdcReadFailed);
        }
        let mut mv: i32 = 0;
        if unsafe { adc_cali_raw_to_voltage(self.cali, raw, &mut mv) } != ESP_OK {
            return Err(SensorError::ConversionFailed);
        }
        Ok(mv)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_pin_mv(&mut self) -> Result<i32, SensorError> {
        match SIM_BATTERY_MV.load(Ordering::Relaxed) {
            -1 => Err(SensorError::NotReady),
            mv => Ok(mv / DIVIDER_RATIO),
        }
    }
}

impl BatteryPort for BatterySensor {
    fn read_millivolts(&mut self) -> Result<i32, SensorError> {
        self.read_pin_mv().map(|mv| mv * DIVIDER_RATIO)
    }
}
