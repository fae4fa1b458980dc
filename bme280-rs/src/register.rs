use bitfield_struct::bitfield;
use core::fmt;
use core::str::FromStr;
use embedded_hal::i2c::{I2c, SevenBitAddress};

use crate::{Error, core::Bme280};

pub(crate) const REG_CALIB_00: u8 = 0x88; // first calibration window, 24 bytes
pub(crate) const REG_CALIB_25: u8 = 0xA1; // dig_H1
pub(crate) const REG_CHIP_ID: u8 = 0xD0;
pub(crate) const REG_RESET: u8 = 0xE0;
pub(crate) const REG_CALIB_26: u8 = 0xE1; // second calibration window, 7 bytes
pub(crate) const REG_CTRL_HUM: u8 = 0xF2;
pub(crate) const REG_CTRL_MEAS: u8 = 0xF4;
pub(crate) const REG_CONFIG: u8 = 0xF5;
pub(crate) const REG_DATA: u8 = 0xF7; // press_msb, start of the 8-byte burst

/// Magic byte accepted by the reset register.
pub(crate) const RESET_MAGIC: u8 = 0xB6;

pub(crate) trait Bme280Register: Default {
    const ADDRESS: u8;

    fn read<T: I2c<SevenBitAddress>>(
        &mut self,
        bme: &mut Bme280<T>,
    ) -> Result<(), Error<T::Error>>;
    fn write<T: I2c<SevenBitAddress>>(
        &self,
        _bme: &mut Bme280<T>,
    ) -> Result<(), Error<T::Error>> {
        Err(Error::ReadOnly)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Rejected symbolic setting name.
///
/// Produced by the `FromStr` implementations of the setting enums before
/// any register traffic takes place; the register content is untouched.
pub struct InvalidSetting {
    /// The setting class that failed to parse.
    pub setting: &'static str,
    /// The recognized symbolic names for the class.
    pub expected: &'static str,
}

impl fmt::Display for InvalidSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown {} value, valid settings: {}",
            self.setting, self.expected
        )
    }
}

impl core::error::Error for InvalidSetting {}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Oversampling rate for one measurement channel.
///
/// Higher rates average more internal samples per measurement, trading
/// conversion time and power for lower noise.
pub enum Oversampling {
    #[default]
    /// No measurement, the channel output stays at its reset value.
    Skip = 0,
    /// 1x oversampling.
    X1 = 1,
    /// 2x oversampling.
    X2 = 2,
    /// 4x oversampling.
    X4 = 3,
    /// 8x oversampling.
    X8 = 4,
    /// 16x oversampling.
    X16 = 5,
}

impl Oversampling {
    pub(crate) const fn from_bits(bits: u8) -> Self {
        match bits {
            0 => Oversampling::Skip,
            1 => Oversampling::X1,
            2 => Oversampling::X2,
            3 => Oversampling::X4,
            4 => Oversampling::X8,
            // codes 6 and 7 also select 16x on the hardware
            _ => Oversampling::X16,
        }
    }

    pub(crate) const fn into_bits(self) -> u8 {
        self as u8
    }
}

impl FromStr for Oversampling {
    type Err = InvalidSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(Oversampling::Skip),
            "1" => Ok(Oversampling::X1),
            "2" => Ok(Oversampling::X2),
            "4" => Ok(Oversampling::X4),
            "8" => Ok(Oversampling::X8),
            "16" => Ok(Oversampling::X16),
            _ => Err(InvalidSetting {
                setting: "oversampling rate",
                expected: "skip, 1, 2, 4, 8, 16",
            }),
        }
    }
}

impl fmt::Display for Oversampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Oversampling::Skip => "OFF (skip)",
            Oversampling::X1 => "1x",
            Oversampling::X2 => "2x",
            Oversampling::X4 => "4x",
            Oversampling::X8 => "8x",
            Oversampling::X16 => "16x",
        };
        f.write_str(name)
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// IIR filter coefficient applied to pressure and temperature readings.
pub enum IirFilter {
    #[default]
    /// Filter disabled.
    Off = 0,
    /// Coefficient 2.
    X2 = 1,
    /// Coefficient 4.
    X4 = 2,
    /// Coefficient 8.
    X8 = 3,
    /// Coefficient 16.
    X16 = 4,
}

impl IirFilter {
    pub(crate) const fn from_bits(bits: u8) -> Self {
        match bits {
            0 => IirFilter::Off,
            1 => IirFilter::X2,
            2 => IirFilter::X4,
            3 => IirFilter::X8,
            // codes 5 to 7 also select coefficient 16
            _ => IirFilter::X16,
        }
    }

    pub(crate) const fn into_bits(self) -> u8 {
        self as u8
    }
}

impl FromStr for IirFilter {
    type Err = InvalidSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(IirFilter::Off),
            "2" => Ok(IirFilter::X2),
            "4" => Ok(IirFilter::X4),
            "8" => Ok(IirFilter::X8),
            "16" => Ok(IirFilter::X16),
            _ => Err(InvalidSetting {
                setting: "IIR filter mode",
                expected: "off, 2, 4, 8, 16",
            }),
        }
    }
}

impl fmt::Display for IirFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IirFilter::Off => "OFF",
            IirFilter::X2 => "2",
            IirFilter::X4 => "4",
            IirFilter::X8 => "8",
            IirFilter::X16 => "16",
        };
        f.write_str(name)
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Standby interval between measurement cycles in normal power mode.
pub enum StandbyTime {
    #[default]
    /// 0.5 ms.
    Ms0_5 = 0,
    /// 62.5 ms.
    Ms62_5 = 1,
    /// 125 ms.
    Ms125 = 2,
    /// 250 ms.
    Ms250 = 3,
    /// 500 ms.
    Ms500 = 4,
    /// 1000 ms.
    Ms1000 = 5,
    /// 10 ms.
    Ms10 = 6,
    /// 20 ms.
    Ms20 = 7,
}

impl StandbyTime {
    pub(crate) const fn from_bits(bits: u8) -> Self {
        match bits {
            0 => StandbyTime::Ms0_5,
            1 => StandbyTime::Ms62_5,
            2 => StandbyTime::Ms125,
            3 => StandbyTime::Ms250,
            4 => StandbyTime::Ms500,
            5 => StandbyTime::Ms1000,
            6 => StandbyTime::Ms10,
            _ => StandbyTime::Ms20,
        }
    }

    pub(crate) const fn into_bits(self) -> u8 {
        self as u8
    }
}

impl FromStr for StandbyTime {
    type Err = InvalidSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0.5" => Ok(StandbyTime::Ms0_5),
            "62.5" => Ok(StandbyTime::Ms62_5),
            "125" => Ok(StandbyTime::Ms125),
            "250" => Ok(StandbyTime::Ms250),
            "500" => Ok(StandbyTime::Ms500),
            "1000" => Ok(StandbyTime::Ms1000),
            "10" => Ok(StandbyTime::Ms10),
            "20" => Ok(StandbyTime::Ms20),
            _ => Err(InvalidSetting {
                setting: "standby time",
                expected: "0.5, 10, 20, 62.5, 125, 250, 500, 1000",
            }),
        }
    }
}

impl fmt::Display for StandbyTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StandbyTime::Ms0_5 => "0.5ms",
            StandbyTime::Ms62_5 => "62.5ms",
            StandbyTime::Ms125 => "125ms",
            StandbyTime::Ms250 => "250ms",
            StandbyTime::Ms500 => "500ms",
            StandbyTime::Ms1000 => "1s",
            StandbyTime::Ms10 => "10ms",
            StandbyTime::Ms20 => "20ms",
        };
        f.write_str(name)
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Power mode of the sensor.
pub enum PowerMode {
    #[default]
    /// No periodic measurements, lowest power draw. Default after power-up.
    Sleep = 0,
    /// Take a single measurement, then return to sleep automatically.
    Forced = 1,
    /// Cycle between measuring and standby forever.
    Normal = 3,
}

impl PowerMode {
    pub(crate) const fn from_bits(bits: u8) -> Self {
        match bits {
            0 => PowerMode::Sleep,
            // the hardware treats both 01 and 10 as forced mode
            1 | 2 => PowerMode::Forced,
            _ => PowerMode::Normal,
        }
    }

    pub(crate) const fn into_bits(self) -> u8 {
        self as u8
    }
}

impl FromStr for PowerMode {
    type Err = InvalidSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sleep" => Ok(PowerMode::Sleep),
            "forced" => Ok(PowerMode::Forced),
            "normal" => Ok(PowerMode::Normal),
            _ => Err(InvalidSetting {
                setting: "power mode",
                expected: "sleep, forced, normal",
            }),
        }
    }
}

impl fmt::Display for PowerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PowerMode::Sleep => "SLEEP",
            PowerMode::Forced => "FORCED",
            PowerMode::Normal => "NORMAL",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Measurement channel selector for the oversampling accessors.
pub enum Channel {
    /// Temperature channel, `ctrl_meas` bits 7:5.
    Temperature,
    /// Humidity channel, `ctrl_hum` bits 2:0.
    Humidity,
    /// Pressure channel, `ctrl_meas` bits 4:2.
    Pressure,
}

impl FromStr for Channel {
    type Err = InvalidSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "t" => Ok(Channel::Temperature),
            "h" => Ok(Channel::Humidity),
            "p" => Ok(Channel::Pressure),
            _ => Err(InvalidSetting {
                setting: "measurement channel",
                expected: "t, h, p",
            }),
        }
    }
}

#[bitfield(u8)]
/// The `ctrl_hum` register (0xF2).
///
/// Writes to this register only take effect after the next write to
/// `ctrl_meas`.
pub struct CtrlHum {
    #[bits(3, default = Oversampling::Skip)]
    /// Humidity oversampling.
    pub osrs_h: Oversampling,
    #[bits(5)]
    rsvd: u8,
}

#[bitfield(u8)]
/// The `ctrl_meas` register (0xF4): temperature and pressure oversampling
/// plus the power mode, all in one multi-purpose byte.
pub struct CtrlMeas {
    #[bits(2, default = PowerMode::Sleep)]
    /// Power mode.
    pub mode: PowerMode,
    #[bits(3, default = Oversampling::Skip)]
    /// Pressure oversampling.
    pub osrs_p: Oversampling,
    #[bits(3, default = Oversampling::Skip)]
    /// Temperature oversampling.
    pub osrs_t: Oversampling,
}

#[bitfield(u8)]
/// The `config` register (0xF5): standby time, IIR filter and the
/// 3-wire SPI switch.
pub struct Config {
    #[bits(1, default = false)]
    /// Enables the 3-wire SPI interface.
    pub spi3w_en: bool,
    #[bits(1)]
    rsvd: bool,
    #[bits(3, default = IirFilter::Off)]
    /// IIR filter coefficient.
    pub filter: IirFilter,
    #[bits(3, default = StandbyTime::Ms0_5)]
    /// Standby interval for normal mode.
    pub t_sb: StandbyTime,
}

macro_rules! control_register {
    ($reg:ty, $addr:expr) => {
        impl Bme280Register for $reg {
            const ADDRESS: u8 = $addr;

            fn read<T: I2c<SevenBitAddress>>(
                &mut self,
                bme: &mut Bme280<T>,
            ) -> Result<(), Error<T::Error>> {
                let mut buffer = [0u8; 1];
                bme.read_bytes(Self::ADDRESS, &mut buffer)?;
                *self = Self::from_bits(buffer[0]);
                Ok(())
            }

            fn write<T: I2c<SevenBitAddress>>(
                &self,
                bme: &mut Bme280<T>,
            ) -> Result<(), Error<T::Error>> {
                bme.write_byte(Self::ADDRESS, self.into_bits())
            }
        }
    };
}

control_register!(CtrlHum, REG_CTRL_HUM);
control_register!(CtrlMeas, REG_CTRL_MEAS);
control_register!(Config, REG_CONFIG);

#[derive(Debug, Default)]
pub(crate) struct ChipId(pub(crate) u8);

impl Bme280Register for ChipId {
    const ADDRESS: u8 = REG_CHIP_ID;

    fn read<T: I2c<SevenBitAddress>>(
        &mut self,
        bme: &mut Bme280<T>,
    ) -> Result<(), Error<T::Error>> {
        let mut buffer = [0u8; 1];
        bme.read_bytes(Self::ADDRESS, &mut buffer)?;
        self.0 = buffer[0];
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
/// One raw ADC triplet, captured in a single 8-byte burst read so that
/// the three values cannot interleave with a concurrent register write.
pub struct RawReading {
    /// 20-bit pressure ADC value.
    pub pressure: u32,
    /// 20-bit temperature ADC value.
    pub temperature: u32,
    /// 16-bit humidity ADC value.
    pub humidity: u16,
}

impl Bme280Register for RawReading {
    const ADDRESS: u8 = REG_DATA;

    fn read<T: I2c<SevenBitAddress>>(
        &mut self,
        bme: &mut Bme280<T>,
    ) -> Result<(), Error<T::Error>> {
        // press_msb/lsb/xlsb, temp_msb/lsb/xlsb, hum_msb/lsb
        let mut buffer = [0u8; 8];
        bme.read_bytes(Self::ADDRESS, &mut buffer)?;
        self.pressure = ((buffer[0] as u32) << 12)
            | ((buffer[1] as u32) << 4)
            | ((buffer[2] as u32) >> 4);
        self.temperature = ((buffer[3] as u32) << 12)
            | ((buffer[4] as u32) << 4)
            | ((buffer[5] as u32) >> 4);
        self.humidity = ((buffer[6] as u16) << 8) | buffer[7] as u16;
        Ok(())
    }
}
