//! Floating-point compensation formulas from the Bosch datasheet.
//!
//! Raw ADC words are run through per-unit calibration coefficients to
//! produce physical quantities. Temperature must be compensated first:
//! its intermediate `t_fine` value feeds both the pressure and the
//! humidity formulas.

use crate::{calib::CalibrationData, register::RawReading};

/// The `t_fine` carrier linking temperature compensation to the
/// pressure and humidity formulas. Opaque on purpose so a caller
/// cannot feed an unrelated value into the downstream formulas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TFine(f64);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
/// One fully compensated measurement.
pub struct Measurement {
    /// Temperature in degrees Celsius.
    pub temp_c: f64,
    /// Temperature in degrees Fahrenheit.
    pub temp_f: f64,
    /// Relative humidity in percent, clamped to 0..=100.
    pub humidity: f64,
    /// Barometric pressure in Pascal.
    pub pressure: f64,
}

/// Computes the temperature in degrees Celsius along with the `t_fine`
/// intermediate required by [`compensate_pressure`] and
/// [`compensate_humidity`].
pub fn compensate_temperature(adc_t: u32, cal: &CalibrationData) -> (f64, TFine) {
    let adc_t = adc_t as f64;
    let var1 = (adc_t / 16384.0 - cal.dig_t1 as f64 / 1024.0) * cal.dig_t2 as f64;
    let var2 = (adc_t / 131072.0 - cal.dig_t1 as f64 / 8192.0)
        * (adc_t / 131072.0 - cal.dig_t1 as f64 / 8192.0)
        * cal.dig_t3 as f64;
    let t_fine = libm::floor(var1 + var2);
    ((var1 + var2) / 5120.0, TFine(t_fine))
}

/// Computes the barometric pressure in Pascal.
///
/// A sensor reporting `dig_P1 == 0` makes the denominator zero; the
/// resulting infinity or NaN is passed through to the caller.
pub fn compensate_pressure(adc_p: u32, t_fine: TFine, cal: &CalibrationData) -> f64 {
    let var1 = t_fine.0 / 2.0 - 64000.0;
    let var2 = var1 * var1 * cal.dig_p6 as f64 / 32768.0;
    let var2 = var2 + var1 * cal.dig_p5 as f64 * 2.0;
    let var2 = var2 / 4.0 + cal.dig_p4 as f64 * 65536.0;
    let var1 = (cal.dig_p3 as f64 * var1 * var1 / 524288.0 + cal.dig_p2 as f64 * var1)
        / 524288.0;
    let var1 = (1.0 + var1 / 32768.0) * cal.dig_p1 as f64;
    let p = 1048576.0 - adc_p as f64;
    let p = (p - var2 / 4096.0) * 6250.0 / var1;
    let var1 = cal.dig_p9 as f64 * p * p / 2147483648.0;
    let var2 = p * cal.dig_p8 as f64 / 32768.0;
    p + (var1 + var2 + cal.dig_p7 as f64) / 16.0
}

/// Computes the relative humidity in percent, clamped to 0..=100.
pub fn compensate_humidity(adc_h: u16, t_fine: TFine, cal: &CalibrationData) -> f64 {
    let var_h = t_fine.0 - 76800.0;
    let var_h = (adc_h as f64 - (cal.dig_h4 as f64 * 64.0 + cal.dig_h5 as f64 / 16384.0 * var_h))
        * (cal.dig_h2 as f64 / 65536.0
            * (1.0
                + cal.dig_h6 as f64 / 67108864.0
                    * var_h
                    * (1.0 + cal.dig_h3 as f64 / 67108864.0 * var_h)));
    let var_h = var_h * (1.0 - cal.dig_h1 as f64 * var_h / 524288.0);
    var_h.clamp(0.0, 100.0)
}

/// Runs the full compensation pipeline over one raw burst.
pub fn compensate(raw: &RawReading, cal: &CalibrationData) -> Measurement {
    let (temp_c, t_fine) = compensate_temperature(raw.temperature, cal);
    Measurement {
        temp_c,
        temp_f: temp_c * 9.0 / 5.0 + 32.0,
        humidity: compensate_humidity(raw.humidity, t_fine, cal),
        pressure: compensate_pressure(raw.pressure, t_fine, cal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Datasheet-style reference coefficients from a real sensor unit.
    fn reference_calibration() -> CalibrationData {
        CalibrationData {
            dig_t1: 27504,
            dig_t2: 26435,
            dig_t3: -1000,
            dig_p1: 36477,
            dig_p2: -10685,
            dig_p3: 3024,
            dig_p4: 2855,
            dig_p5: 140,
            dig_p6: -7,
            dig_p7: 15500,
            dig_p8: -14600,
            dig_p9: 6000,
            dig_h1: 75,
            dig_h2: 363,
            dig_h3: 0,
            dig_h4: 329,
            dig_h5: 50,
            dig_h6: 23,
        }
    }

    const EPS: f64 = 1e-9;

    #[test]
    fn temperature_reference_point() {
        let cal = reference_calibration();
        let (temp_c, t_fine) = compensate_temperature(519888, &cal);
        assert!((temp_c - 25.08247793081682).abs() < EPS, "temp_c = {temp_c}");
        assert_eq!(t_fine.0, 128422.0);
    }

    #[test]
    fn fahrenheit_conversion() {
        let cal = reference_calibration();
        let raw = RawReading {
            temperature: 519888,
            pressure: 415148,
            humidity: 32768,
        };
        let m = compensate(&raw, &cal);
        assert!((m.temp_f - 77.14846027547028).abs() < EPS, "temp_f = {}", m.temp_f);
        assert!((m.temp_f - (m.temp_c * 9.0 / 5.0 + 32.0)).abs() < EPS);
    }

    #[test]
    fn pressure_reference_point() {
        let cal = reference_calibration();
        let (_, t_fine) = compensate_temperature(519888, &cal);
        let p = compensate_pressure(415148, t_fine, &cal);
        assert!((p - 100653.25814481472).abs() < 1e-6, "pressure = {p}");
    }

    #[test]
    fn humidity_reference_point() {
        let cal = reference_calibration();
        let (_, t_fine) = compensate_temperature(519888, &cal);
        let h = compensate_humidity(32768, t_fine, &cal);
        assert!((h - 64.52492749480722).abs() < EPS, "humidity = {h}");
    }

    #[test]
    fn humidity_clamps_to_physical_range() {
        let cal = reference_calibration();
        let (_, t_fine) = compensate_temperature(519888, &cal);
        assert_eq!(compensate_humidity(65535, t_fine, &cal), 100.0);
        assert_eq!(compensate_humidity(0, t_fine, &cal), 0.0);
    }

    #[test]
    fn zero_p1_yields_non_finite_pressure() {
        let mut cal = reference_calibration();
        cal.dig_p1 = 0;
        let (_, t_fine) = compensate_temperature(519888, &cal);
        let p = compensate_pressure(415148, t_fine, &cal);
        assert!(!p.is_finite());
    }
}
