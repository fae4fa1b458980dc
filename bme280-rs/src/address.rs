use bitfield_struct::bitfield;

#[bitfield(u8)]
/// Represents the slave address of the BME280 sensor.
/// The base address is 0x76; pulling the SDO pin high moves the sensor
/// to 0x77. No other addresses are possible.
pub struct SensorAddress {
    #[bits(1, default = false)]
    /// State of the SDO address pin.
    pub sdo: bool,
    #[bits(7, default = 0x76 >> 1)]
    base: u8,
}

mod test {
    #[test]
    fn test_addr() {
        extern crate std;
        let addr = super::SensorAddress::default();
        assert_eq!(addr.into_bits(), 0x76);
        assert_eq!(addr.with_sdo(true).into_bits(), 0x77);
    }
}
