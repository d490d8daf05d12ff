//! Platform-agnostic driver for the TH06 (Si7006) humidity and temperature sensor.
//!
//! ```ignore
//! use th06::{bus::I2cBus, Mode, TH06};
//!
//! let mut sensor = TH06::new(I2cBus::new(i2c));
//! sensor.begin();
//! sensor.reset(&mut delay)?;
//! let celsius = sensor.temperature(Mode::Hold)?;
//! let humidity = sensor.humidity(Mode::Hold)?;
//! ```
#![cfg_attr(not(test), no_std)]

pub mod bus;
pub mod th06;

pub use crate::bus::{Bus, I2cBus, LegacyI2cBus, Status};
pub use crate::th06::{crc8, humidity_from_raw, temperature_from_raw, Control, Error, Mode, Resolution, TH06};
