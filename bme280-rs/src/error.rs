#[derive(Debug)]
/// Represents errors that can occur while interacting with the BME280 sensor.
pub enum Error<E> {
    /// An error occurred while communicating with the I2C bus.
    I2c(E),
    /// The device did not answer with an identity byte at probe time.
    NoDevice,
    /// A compensation call was made before the calibration coefficients
    /// were loaded from the sensor.
    NotCalibrated,
    /// Attempted to write to a register that is not writable.
    ReadOnly,
    /// A power mode write was accepted on the bus but the confirmation
    /// read returned a different mode.
    ModeMismatch,
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::I2c(e)
    }
}
