#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
//!# BME280 - Driver for the Bosch BME280 Humidity, Temperature and Pressure Sensor
//! This crate provides a driver for the BME280 sensor, allowing you to read
//! compensated temperature, humidity and pressure data over I2C.
//! It supports the power mode state machine, per-channel oversampling,
//! IIR filtering and standby configuration, and understands the BMP280
//! variants that answer with a different chip identity.
mod address;
mod calc;
mod calib;
mod core;
mod error;
mod register;

pub use address::SensorAddress;
pub use calc::{
    Measurement, TFine, compensate, compensate_humidity, compensate_pressure,
    compensate_temperature,
};
pub use calib::CalibrationData;
pub use error::Error;
pub use register::{
    Channel, Config, CtrlHum, CtrlMeas, IirFilter, InvalidSetting, Oversampling, PowerMode,
    RawReading, StandbyTime,
};

pub use crate::core::{Bme280, Bme280Builder, ChipModel, RegisterDump, SensorInfo};
