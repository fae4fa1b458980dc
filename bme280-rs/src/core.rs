use embedded_hal::{
    delay::DelayNs,
    i2c::{I2c, SevenBitAddress},
};

use crate::{
    Error,
    address::SensorAddress,
    calc::{self, Measurement},
    calib::CalibrationData,
    register::{
        Bme280Register, Channel, ChipId, Config, CtrlHum, CtrlMeas, IirFilter, Oversampling,
        PowerMode, RawReading, REG_CALIB_00, REG_CHIP_ID, REG_RESET, RESET_MAGIC, StandbyTime,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Chip model derived from the identity register.
pub enum ChipModel {
    /// BME280, chip id 0x60.
    Bme280,
    /// BMP280 (no humidity channel), chip id 0x57 or 0x58.
    Bmp280,
    /// BMP280 engineering sample, chip id 0x56.
    Bmp280Sample,
    /// Some other chip answering on the bus.
    Unknown(u8),
}

impl ChipModel {
    pub(crate) const fn from_id(id: u8) -> Self {
        match id {
            0x60 => ChipModel::Bme280,
            0x57 | 0x58 => ChipModel::Bmp280,
            0x56 => ChipModel::Bmp280Sample,
            other => ChipModel::Unknown(other),
        }
    }

    /// Whether this model carries a humidity sensing element.
    pub fn has_humidity(&self) -> bool {
        matches!(self, ChipModel::Bme280)
    }
}

impl core::fmt::Display for ChipModel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ChipModel::Bme280 => f.write_str("BME280"),
            ChipModel::Bmp280 => f.write_str("BMP280"),
            ChipModel::Bmp280Sample => f.write_str("BMP280 (sample)"),
            ChipModel::Unknown(id) => write!(f, "unknown chip 0x{id:02X}"),
        }
    }
}

/// Represents the BME280 sensor on an I2C bus.
pub struct Bme280<T> {
    pub(crate) i2c: T,
    pub(crate) address: u8,
    model: ChipModel,
    calib: Option<CalibrationData>,
}

#[derive(Debug, Default)]
/// Builder for a BME280 sensor.
pub struct Bme280Builder {
    address: SensorAddress,
}

impl Bme280Builder {
    /// Set the slave address of the BME280 sensor.
    pub fn with_address(mut self, address: SensorAddress) -> Self {
        self.address = address;
        self
    }

    /// Probe the bus for the sensor and take ownership of the bus handle.
    ///
    /// Reads the identity register; a bus error, or an answer of 0x00 or
    /// 0xFF (the patterns a floating bus produces), is reported as
    /// [`Error::NoDevice`]. Any other identity is accepted so that
    /// BMP280 variants remain usable without their humidity channel.
    pub fn probe<T: I2c<SevenBitAddress>>(self, i2c: T) -> Result<Bme280<T>, Error<T::Error>> {
        let mut dev = Bme280 {
            i2c,
            address: self.address.into_bits(),
            model: ChipModel::Unknown(0),
            calib: None,
        };
        let mut id = ChipId::default();
        if id.read(&mut dev).is_err() || id.0 == 0x00 || id.0 == 0xFF {
            return Err(Error::NoDevice);
        }
        dev.model = ChipModel::from_id(id.0);
        Ok(dev)
    }
}

#[derive(Debug, Clone, Copy)]
/// Snapshot of the sensor's identity and active configuration.
pub struct SensorInfo {
    /// Chip model.
    pub model: ChipModel,
    /// Raw identity byte.
    pub chip_id: u8,
    /// Current power mode.
    pub power_mode: PowerMode,
    /// Standby interval for normal mode.
    pub standby_time: StandbyTime,
    /// IIR filter coefficient.
    pub filter: IirFilter,
    /// Whether the 3-wire SPI interface is enabled.
    pub spi3wire: bool,
    /// Temperature oversampling.
    pub osrs_t: Oversampling,
    /// Pressure oversampling.
    pub osrs_p: Oversampling,
    /// Humidity oversampling.
    pub osrs_h: Oversampling,
}

#[derive(Debug, Clone, Copy)]
/// Raw dump of the sensor's register windows for diagnostics.
pub struct RegisterDump {
    /// Calibration window 0x88..=0xA1.
    pub calib: [u8; 26],
    /// Identity register 0xD0.
    pub chip_id: u8,
    /// Control and data window 0xE0..=0xFE.
    pub control: [u8; 31],
}

impl<T: I2c<SevenBitAddress>> Bme280<T> {
    /// Get the slave address of the device.
    pub fn get_address(&self) -> u8 {
        self.address
    }

    /// Get the chip model identified at probe time.
    pub fn model(&self) -> ChipModel {
        self.model
    }

    pub(crate) fn read_bytes(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Error<T::Error>> {
        self.i2c.write_read(self.address, &[reg], buf)?;
        Ok(())
    }

    pub(crate) fn write_byte(&mut self, reg: u8, value: u8) -> Result<(), Error<T::Error>> {
        self.i2c.write(self.address, &[reg, value])?;
        Ok(())
    }

    /// Load the factory calibration coefficients from the sensor's NVM.
    ///
    /// Must be called once before [`read_measurement`](Self::read_measurement);
    /// the coefficients are cached for the life of the handle.
    pub fn load_calibration(&mut self) -> Result<(), Error<T::Error>> {
        self.calib = Some(CalibrationData::read(self)?);
        Ok(())
    }

    /// Get the cached calibration coefficients, if loaded.
    pub fn calibration(&self) -> Option<CalibrationData> {
        self.calib
    }

    /// Read one raw ADC burst without compensation.
    pub fn read_raw(&mut self) -> Result<RawReading, Error<T::Error>> {
        let mut raw = RawReading::default();
        raw.read(self)?;
        Ok(raw)
    }

    /// Read one raw burst and run it through the compensation formulas.
    pub fn read_measurement(&mut self) -> Result<Measurement, Error<T::Error>> {
        let cal = self.calib.ok_or(Error::NotCalibrated)?;
        let raw = self.read_raw()?;
        Ok(calc::compensate(&raw, &cal))
    }

    /// Get the oversampling rate of one measurement channel.
    pub fn oversampling(&mut self, channel: Channel) -> Result<Oversampling, Error<T::Error>> {
        match channel {
            Channel::Humidity => {
                let mut reg = CtrlHum::default();
                reg.read(self)?;
                Ok(reg.osrs_h())
            }
            Channel::Temperature => {
                let mut reg = CtrlMeas::default();
                reg.read(self)?;
                Ok(reg.osrs_t())
            }
            Channel::Pressure => {
                let mut reg = CtrlMeas::default();
                reg.read(self)?;
                Ok(reg.osrs_p())
            }
        }
    }

    /// Set the oversampling rate of one measurement channel.
    ///
    /// The co-located fields of `ctrl_meas` are preserved. A humidity
    /// change is latched by rewriting `ctrl_meas` afterwards, as the
    /// hardware ignores `ctrl_hum` until the next `ctrl_meas` write.
    pub fn set_oversampling(
        &mut self,
        channel: Channel,
        rate: Oversampling,
    ) -> Result<(), Error<T::Error>> {
        match channel {
            Channel::Humidity => {
                let mut reg = CtrlHum::default();
                reg.read(self)?;
                reg.set_osrs_h(rate);
                reg.write(self)?;
                let mut meas = CtrlMeas::default();
                meas.read(self)?;
                meas.write(self)
            }
            Channel::Temperature => {
                let mut reg = CtrlMeas::default();
                reg.read(self)?;
                reg.set_osrs_t(rate);
                reg.write(self)
            }
            Channel::Pressure => {
                let mut reg = CtrlMeas::default();
                reg.read(self)?;
                reg.set_osrs_p(rate);
                reg.write(self)
            }
        }
    }

    /// Get the IIR filter coefficient.
    pub fn filter(&mut self) -> Result<IirFilter, Error<T::Error>> {
        let mut reg = Config::default();
        reg.read(self)?;
        Ok(reg.filter())
    }

    /// Set the IIR filter coefficient, preserving the other `config` bits.
    pub fn set_filter(&mut self, filter: IirFilter) -> Result<(), Error<T::Error>> {
        let mut reg = Config::default();
        reg.read(self)?;
        reg.set_filter(filter);
        reg.write(self)
    }

    /// Get the standby interval used in normal mode.
    pub fn standby_time(&mut self) -> Result<StandbyTime, Error<T::Error>> {
        let mut reg = Config::default();
        reg.read(self)?;
        Ok(reg.t_sb())
    }

    /// Set the standby interval, preserving the other `config` bits.
    pub fn set_standby_time(&mut self, standby: StandbyTime) -> Result<(), Error<T::Error>> {
        let mut reg = Config::default();
        reg.read(self)?;
        reg.set_t_sb(standby);
        reg.write(self)
    }

    /// Get the state of the 3-wire SPI switch.
    pub fn spi3wire(&mut self) -> Result<bool, Error<T::Error>> {
        let mut reg = Config::default();
        reg.read(self)?;
        Ok(reg.spi3w_en())
    }

    /// Enable or disable the 3-wire SPI interface.
    pub fn set_spi3wire(&mut self, enable: bool) -> Result<(), Error<T::Error>> {
        let mut reg = Config::default();
        reg.read(self)?;
        reg.set_spi3w_en(enable);
        reg.write(self)
    }

    /// Get the current power mode.
    pub fn power_mode(&mut self) -> Result<PowerMode, Error<T::Error>> {
        let mut reg = CtrlMeas::default();
        reg.read(self)?;
        Ok(reg.mode())
    }

    /// Set the power mode, preserving the oversampling bits of `ctrl_meas`.
    ///
    /// If the sensor already reports the requested mode no write is
    /// issued. After a write the register is read back; a disagreement
    /// is reported as [`Error::ModeMismatch`]. Note that a forced-mode
    /// request can legitimately report [`PowerMode::Sleep`] on readback
    /// once the single conversion has finished.
    pub fn set_power_mode(&mut self, mode: PowerMode) -> Result<(), Error<T::Error>> {
        let mut reg = CtrlMeas::default();
        reg.read(self)?;
        if reg.mode() == mode {
            return Ok(());
        }
        reg.set_mode(mode);
        reg.write(self)?;
        reg.read(self)?;
        if reg.mode() != mode && !(mode == PowerMode::Forced && reg.mode() == PowerMode::Sleep) {
            return Err(Error::ModeMismatch);
        }
        Ok(())
    }

    /// Perform a soft reset of the sensor.
    ///
    /// All registers return to their power-on defaults; the cached
    /// calibration coefficients stay valid as they live in NVM. The
    /// sensor needs roughly 2 ms before it accepts traffic again.
    pub fn reset<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<T::Error>> {
        self.write_byte(REG_RESET, RESET_MAGIC)?;
        delay.delay_ms(2);
        Ok(())
    }

    /// Read the identity register and the full configuration in one call.
    pub fn info(&mut self) -> Result<SensorInfo, Error<T::Error>> {
        let mut id = ChipId::default();
        id.read(self)?;
        let mut meas = CtrlMeas::default();
        meas.read(self)?;
        let mut hum = CtrlHum::default();
        hum.read(self)?;
        let mut cfg = Config::default();
        cfg.read(self)?;
        Ok(SensorInfo {
            model: ChipModel::from_id(id.0),
            chip_id: id.0,
            power_mode: meas.mode(),
            standby_time: cfg.t_sb(),
            filter: cfg.filter(),
            spi3wire: cfg.spi3w_en(),
            osrs_t: meas.osrs_t(),
            osrs_p: meas.osrs_p(),
            osrs_h: hum.osrs_h(),
        })
    }

    /// Dump the calibration, identity and control register windows.
    pub fn dump_registers(&mut self) -> Result<RegisterDump, Error<T::Error>> {
        let mut calib = [0u8; 26];
        self.read_bytes(REG_CALIB_00, &mut calib)?;
        let mut chip_id = [0u8; 1];
        self.read_bytes(REG_CHIP_ID, &mut chip_id)?;
        let mut control = [0u8; 31];
        self.read_bytes(REG_RESET, &mut control)?;
        Ok(RegisterDump {
            calib,
            chip_id: chip_id[0],
            control,
        })
    }

    /// Release the underlying bus handle.
    pub fn release(self) -> T {
        self.i2c
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::i2c::{Mock, Transaction};

    use super::*;

    const ADDR: u8 = 0x76;

    fn probe_transaction() -> Transaction {
        Transaction::write_read(ADDR, vec![0xD0], vec![0x60])
    }

    fn probe(i2c: Mock) -> Bme280<Mock> {
        Bme280Builder::default().probe(i2c).unwrap()
    }

    #[test]
    fn probe_identifies_model() {
        let mut i2c = Mock::new(&[probe_transaction()]);
        let dev = probe(i2c.clone());
        assert_eq!(dev.model(), ChipModel::Bme280);
        assert!(dev.model().has_humidity());
        assert_eq!(dev.get_address(), 0x76);
        i2c.done();
    }

    #[test]
    fn probe_rejects_floating_bus() {
        let mut i2c = Mock::new(&[Transaction::write_read(ADDR, vec![0xD0], vec![0x00])]);
        let res = Bme280Builder::default().probe(i2c.clone());
        assert!(matches!(res, Err(Error::NoDevice)));
        i2c.done();
    }

    #[test]
    fn probe_accepts_bmp280_without_humidity() {
        let mut i2c = Mock::new(&[Transaction::write_read(ADDR, vec![0xD0], vec![0x58])]);
        let dev = probe(i2c.clone());
        assert_eq!(dev.model(), ChipModel::Bmp280);
        assert!(!dev.model().has_humidity());
        i2c.done();
    }

    #[test]
    fn probe_on_secondary_address() {
        let mut i2c = Mock::new(&[Transaction::write_read(0x77, vec![0xD0], vec![0x60])]);
        let dev = Bme280Builder::default()
            .with_address(SensorAddress::default().with_sdo(true))
            .probe(i2c.clone())
            .unwrap();
        assert_eq!(dev.get_address(), 0x77);
        i2c.done();
    }

    #[test]
    fn power_mode_write_is_skipped_when_already_set() {
        let mut i2c = Mock::new(&[
            probe_transaction(),
            Transaction::write_read(ADDR, vec![0xF4], vec![0x27]),
        ]);
        let mut dev = probe(i2c.clone());
        dev.set_power_mode(PowerMode::Normal).unwrap();
        i2c.done();
    }

    #[test]
    fn power_mode_transition_preserves_oversampling() {
        let mut i2c = Mock::new(&[
            probe_transaction(),
            Transaction::write_read(ADDR, vec![0xF4], vec![0x24]),
            Transaction::write(ADDR, vec![0xF4, 0x27]),
            Transaction::write_read(ADDR, vec![0xF4], vec![0x27]),
        ]);
        let mut dev = probe(i2c.clone());
        dev.set_power_mode(PowerMode::Normal).unwrap();
        i2c.done();
    }

    #[test]
    fn power_mode_readback_disagreement_is_reported() {
        let mut i2c = Mock::new(&[
            probe_transaction(),
            Transaction::write_read(ADDR, vec![0xF4], vec![0x24]),
            Transaction::write(ADDR, vec![0xF4, 0x27]),
            Transaction::write_read(ADDR, vec![0xF4], vec![0x24]),
        ]);
        let mut dev = probe(i2c.clone());
        let res = dev.set_power_mode(PowerMode::Normal);
        assert!(matches!(res, Err(Error::ModeMismatch)));
        i2c.done();
    }

    #[test]
    fn forced_mode_may_read_back_as_sleep() {
        let mut i2c = Mock::new(&[
            probe_transaction(),
            Transaction::write_read(ADDR, vec![0xF4], vec![0x24]),
            Transaction::write(ADDR, vec![0xF4, 0x25]),
            Transaction::write_read(ADDR, vec![0xF4], vec![0x24]),
        ]);
        let mut dev = probe(i2c.clone());
        dev.set_power_mode(PowerMode::Forced).unwrap();
        i2c.done();
    }

    #[test]
    fn oversampling_update_is_read_modify_write() {
        let mut i2c = Mock::new(&[
            probe_transaction(),
            Transaction::write_read(ADDR, vec![0xF4], vec![0x27]),
            Transaction::write(ADDR, vec![0xF4, 0x2F]),
        ]);
        let mut dev = probe(i2c.clone());
        dev.set_oversampling(Channel::Pressure, Oversampling::X4)
            .unwrap();
        i2c.done();
    }

    #[test]
    fn oversampling_round_trips_through_the_register() {
        let mut i2c = Mock::new(&[
            probe_transaction(),
            Transaction::write_read(ADDR, vec![0xF4], vec![0x27]),
            Transaction::write(ADDR, vec![0xF4, 0x2F]),
            Transaction::write_read(ADDR, vec![0xF4], vec![0x2F]),
        ]);
        let mut dev = probe(i2c.clone());
        dev.set_oversampling(Channel::Pressure, Oversampling::X4)
            .unwrap();
        assert_eq!(
            dev.oversampling(Channel::Pressure).unwrap(),
            Oversampling::X4
        );
        i2c.done();
    }

    #[test]
    fn humidity_oversampling_latches_via_ctrl_meas() {
        let mut i2c = Mock::new(&[
            probe_transaction(),
            Transaction::write_read(ADDR, vec![0xF2], vec![0x00]),
            Transaction::write(ADDR, vec![0xF2, 0x01]),
            Transaction::write_read(ADDR, vec![0xF4], vec![0x27]),
            Transaction::write(ADDR, vec![0xF4, 0x27]),
        ]);
        let mut dev = probe(i2c.clone());
        dev.set_oversampling(Channel::Humidity, Oversampling::X1)
            .unwrap();
        i2c.done();
    }

    #[test]
    fn filter_update_preserves_standby_bits() {
        let mut i2c = Mock::new(&[
            probe_transaction(),
            Transaction::write_read(ADDR, vec![0xF5], vec![0xA0]),
            Transaction::write(ADDR, vec![0xF5, 0xA8]),
        ]);
        let mut dev = probe(i2c.clone());
        dev.set_filter(IirFilter::X4).unwrap();
        i2c.done();
    }

    #[test]
    fn calibration_is_read_in_three_bursts() {
        let block0 = vec![
            0x70, 0x6B, 0x43, 0x67, 0x18, 0xFC, 0x7D, 0x8E, 0x43, 0xD6, 0xD0, 0x0B, 0x27, 0x0B,
            0x8C, 0x00, 0xF9, 0xFF, 0x8C, 0x3C, 0xF8, 0xC6, 0x70, 0x17,
        ];
        let block1 = vec![0x6B, 0x01, 0x00, 0x14, 0x29, 0x03, 0x17];
        let mut i2c = Mock::new(&[
            probe_transaction(),
            Transaction::write_read(ADDR, vec![0x88], block0),
            Transaction::write_read(ADDR, vec![0xA1], vec![0x4B]),
            Transaction::write_read(ADDR, vec![0xE1], block1),
        ]);
        let mut dev = probe(i2c.clone());
        dev.load_calibration().unwrap();
        let cal = dev.calibration().unwrap();
        assert_eq!(cal.dig_t1, 27504);
        assert_eq!(cal.dig_p9, 6000);
        assert_eq!(cal.dig_h1, 75);
        assert_eq!(cal.dig_h4, 329);
        assert_eq!(cal.dig_h5, 50);
        i2c.done();
    }

    #[test]
    fn raw_burst_unpacks_twenty_bit_values() {
        let mut i2c = Mock::new(&[
            probe_transaction(),
            Transaction::write_read(
                ADDR,
                vec![0xF7],
                vec![0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x80, 0x00],
            ),
        ]);
        let mut dev = probe(i2c.clone());
        let raw = dev.read_raw().unwrap();
        assert_eq!(raw.pressure, 415148);
        assert_eq!(raw.temperature, 519888);
        assert_eq!(raw.humidity, 32768);
        i2c.done();
    }

    #[test]
    fn measurement_requires_calibration() {
        let mut i2c = Mock::new(&[probe_transaction()]);
        let mut dev = probe(i2c.clone());
        let res = dev.read_measurement();
        assert!(matches!(res, Err(Error::NotCalibrated)));
        i2c.done();
    }

    #[test]
    fn measurement_matches_reference_values() {
        let block0 = vec![
            0x70, 0x6B, 0x43, 0x67, 0x18, 0xFC, 0x7D, 0x8E, 0x43, 0xD6, 0xD0, 0x0B, 0x27, 0x0B,
            0x8C, 0x00, 0xF9, 0xFF, 0x8C, 0x3C, 0xF8, 0xC6, 0x70, 0x17,
        ];
        let block1 = vec![0x6B, 0x01, 0x00, 0x14, 0x29, 0x03, 0x17];
        let mut i2c = Mock::new(&[
            probe_transaction(),
            Transaction::write_read(ADDR, vec![0x88], block0),
            Transaction::write_read(ADDR, vec![0xA1], vec![0x4B]),
            Transaction::write_read(ADDR, vec![0xE1], block1),
            Transaction::write_read(
                ADDR,
                vec![0xF7],
                vec![0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x80, 0x00],
            ),
        ]);
        let mut dev = probe(i2c.clone());
        dev.load_calibration().unwrap();
        let m = dev.read_measurement().unwrap();
        assert!((m.temp_c - 25.08247793081682).abs() < 1e-9);
        assert!((m.pressure - 100653.25814481472).abs() < 1e-6);
        assert!((m.humidity - 64.52492749480722).abs() < 1e-9);
        i2c.done();
    }

    #[test]
    fn reset_writes_the_magic_byte() {
        let mut i2c = Mock::new(&[
            probe_transaction(),
            Transaction::write(ADDR, vec![0xE0, 0xB6]),
        ]);
        let mut dev = probe(i2c.clone());
        dev.reset(&mut NoopDelay).unwrap();
        i2c.done();
    }

    #[test]
    fn info_reads_identity_and_configuration() {
        let mut i2c = Mock::new(&[
            probe_transaction(),
            Transaction::write_read(ADDR, vec![0xD0], vec![0x60]),
            Transaction::write_read(ADDR, vec![0xF4], vec![0x27]),
            Transaction::write_read(ADDR, vec![0xF2], vec![0x01]),
            Transaction::write_read(ADDR, vec![0xF5], vec![0xA0]),
        ]);
        let mut dev = probe(i2c.clone());
        let info = dev.info().unwrap();
        assert_eq!(info.model, ChipModel::Bme280);
        assert_eq!(info.power_mode, PowerMode::Normal);
        assert_eq!(info.osrs_t, Oversampling::X1);
        assert_eq!(info.osrs_h, Oversampling::X1);
        assert_eq!(info.standby_time, StandbyTime::Ms1000);
        assert_eq!(info.filter, IirFilter::Off);
        assert!(!info.spi3wire);
        i2c.done();
    }
}
