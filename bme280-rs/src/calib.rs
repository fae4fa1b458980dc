use embedded_hal::i2c::{I2c, SevenBitAddress};

use crate::{
    Error,
    core::Bme280,
    register::{REG_CALIB_00, REG_CALIB_25, REG_CALIB_26},
};

/// Sign-extend a 16-bit register pair read as an unsigned value.
const fn signed16(value: u16) -> i16 {
    (value as i32 - if value > 32767 { 65536 } else { 0 }) as i16
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
/// Factory calibration coefficients, burned into the sensor's NVM.
///
/// Every unit carries a different set; raw ADC output is meaningless
/// without running it through these via the compensation formulas.
pub struct CalibrationData {
    /// Temperature coefficient 1.
    pub dig_t1: u16,
    /// Temperature coefficient 2.
    pub dig_t2: i16,
    /// Temperature coefficient 3.
    pub dig_t3: i16,
    /// Pressure coefficient 1.
    pub dig_p1: u16,
    /// Pressure coefficient 2.
    pub dig_p2: i16,
    /// Pressure coefficient 3.
    pub dig_p3: i16,
    /// Pressure coefficient 4.
    pub dig_p4: i16,
    /// Pressure coefficient 5.
    pub dig_p5: i16,
    /// Pressure coefficient 6.
    pub dig_p6: i16,
    /// Pressure coefficient 7.
    pub dig_p7: i16,
    /// Pressure coefficient 8.
    pub dig_p8: i16,
    /// Pressure coefficient 9.
    pub dig_p9: i16,
    /// Humidity coefficient 1.
    pub dig_h1: u8,
    /// Humidity coefficient 2.
    pub dig_h2: i16,
    /// Humidity coefficient 3.
    pub dig_h3: u8,
    /// Humidity coefficient 4, 12 bits packed across three bytes.
    pub dig_h4: i16,
    /// Humidity coefficient 5, 12 bits packed across three bytes.
    pub dig_h5: i16,
    /// Humidity coefficient 6.
    pub dig_h6: i8,
}

impl CalibrationData {
    /// Decodes the coefficients from the raw calibration windows.
    ///
    /// `block0` is the 24-byte window at 0x88, `h1` the lone byte at
    /// 0xA1 and `block1` the 7-byte window at 0xE1. All multi-byte
    /// coefficients are little-endian except H4 and H5, which share a
    /// packed nibble in the middle byte of `block1`.
    pub fn decode(block0: &[u8; 24], h1: u8, block1: &[u8; 7]) -> Self {
        let le = |lo: u8, hi: u8| u16::from_le_bytes([lo, hi]);
        // H4: bits 11:4 from byte 3, bits 3:0 from the low nibble of byte 4.
        // H5: bits 3:0 from the high nibble of byte 4, bits 11:4 from byte 5.
        // 12-bit quantities never exceed 4095, so no sign adjustment fires.
        let h4 = block1[3] as u16 * 16 + (block1[4] & 0x0F) as u16;
        let h5 = (block1[4] >> 4) as u16 + block1[5] as u16 * 16;
        CalibrationData {
            dig_t1: le(block0[0], block0[1]),
            dig_t2: signed16(le(block0[2], block0[3])),
            dig_t3: signed16(le(block0[4], block0[5])),
            dig_p1: le(block0[6], block0[7]),
            dig_p2: signed16(le(block0[8], block0[9])),
            dig_p3: signed16(le(block0[10], block0[11])),
            dig_p4: signed16(le(block0[12], block0[13])),
            dig_p5: signed16(le(block0[14], block0[15])),
            dig_p6: signed16(le(block0[16], block0[17])),
            dig_p7: signed16(le(block0[18], block0[19])),
            dig_p8: signed16(le(block0[20], block0[21])),
            dig_p9: signed16(le(block0[22], block0[23])),
            dig_h1: h1,
            dig_h2: signed16(le(block1[0], block1[1])),
            dig_h3: block1[2],
            dig_h4: signed16(h4),
            dig_h5: signed16(h5),
            dig_h6: block1[6] as i8,
        }
    }

    pub(crate) fn read<T: I2c<SevenBitAddress>>(
        bme: &mut Bme280<T>,
    ) -> Result<Self, Error<T::Error>> {
        let mut block0 = [0u8; 24];
        bme.read_bytes(REG_CALIB_00, &mut block0)?;
        let mut h1 = [0u8; 1];
        bme.read_bytes(REG_CALIB_25, &mut h1)?;
        let mut block1 = [0u8; 7];
        bme.read_bytes(REG_CALIB_26, &mut block1)?;
        Ok(CalibrationData::decode(&block0, h1[0], &block1))
    }
}
