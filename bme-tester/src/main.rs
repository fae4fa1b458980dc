use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, anyhow};
use bme280::{
    Bme280, Bme280Builder, Channel, IirFilter, Measurement, Oversampling, PowerMode, RegisterDump,
    SensorAddress, StandbyTime,
};
use clap::{Parser, Subcommand};
use linux_embedded_hal::{Delay, I2cdev};

/// Control and read a Bosch BME280 sensor over I2C
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to I2C bus (e.g., /dev/i2c-1)
    #[arg(short, long, default_value = "/dev/i2c-1")]
    bus: String,

    /// Sensor address on the bus, 0x76 or 0x77
    #[arg(short, long, default_value = "0x76", value_parser = parse_address)]
    address: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print chip identity, configuration and calibration coefficients
    Info,
    /// Hex dump of the register map
    Dump,
    /// Soft-reset the sensor to its power-on defaults
    Reset,
    /// Take a single measurement, waking a sleeping sensor in forced mode
    Read,
    /// Read continuously at a 1 second cadence until interrupted
    Watch,
    /// Set the oversampling rate of one channel
    SetOsrs {
        /// Measurement channel: t, h or p
        channel: Channel,
        /// Oversampling rate: skip, 1, 2, 4, 8 or 16
        rate: Oversampling,
    },
    /// Set the IIR filter coefficient
    SetFilter {
        /// Filter coefficient: off, 2, 4, 8 or 16
        filter: IirFilter,
    },
    /// Set the standby time used in normal power mode
    SetStandby {
        /// Standby interval in ms: 0.5, 10, 20, 62.5, 125, 250, 500 or 1000
        standby: StandbyTime,
    },
    /// Set the power mode
    SetPower {
        /// Power mode: sleep, forced or normal
        mode: PowerMode,
    },
}

fn parse_address(s: &str) -> Result<u8, String> {
    let value = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    match value {
        Ok(addr @ (0x76 | 0x77)) => Ok(addr),
        _ => Err(format!("invalid sensor address {s}, must be 0x76 or 0x77")),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut dev = open(&args)?;
    match args.command {
        Command::Info => info(&mut dev),
        Command::Dump => {
            let dump = dev.dump_registers().map_err(sensor_err)?;
            print_dump(&dump);
            Ok(())
        }
        Command::Reset => {
            dev.reset(&mut Delay).map_err(sensor_err)?;
            println!("Sensor reset complete");
            Ok(())
        }
        Command::Read => read_once(&mut dev),
        Command::Watch => watch(&mut dev),
        Command::SetOsrs { channel, rate } => {
            dev.set_oversampling(channel, rate).map_err(sensor_err)?;
            println!("Oversampling set to {rate}");
            Ok(())
        }
        Command::SetFilter { filter } => {
            dev.set_filter(filter).map_err(sensor_err)?;
            println!("IIR filter set to {filter}");
            Ok(())
        }
        Command::SetStandby { standby } => {
            dev.set_standby_time(standby).map_err(sensor_err)?;
            println!("Standby time set to {standby}");
            Ok(())
        }
        Command::SetPower { mode } => {
            dev.set_power_mode(mode).map_err(sensor_err)?;
            println!("Power mode set to {mode}");
            Ok(())
        }
    }
}

fn open(args: &Args) -> anyhow::Result<Bme280<I2cdev>> {
    log::debug!("opening bus {} address 0x{:02X}", args.bus, args.address);
    let i2c = I2cdev::new(&args.bus)
        .with_context(|| format!("failed to open I2C bus {}", args.bus))?;
    let address = SensorAddress::default().with_sdo(args.address == 0x77);
    Bme280Builder::default()
        .with_address(address)
        .probe(i2c)
        .map_err(|e| {
            anyhow!(
                "no sensor at address 0x{:02X} on {}: {e:?}",
                args.address,
                args.bus
            )
        })
}

fn sensor_err<E: std::fmt::Debug>(e: bme280::Error<E>) -> anyhow::Error {
    anyhow!("sensor communication failed: {e:?}")
}

/// Wake a sleeping sensor with a forced conversion, then print one line.
fn read_once(dev: &mut Bme280<I2cdev>) -> anyhow::Result<()> {
    dev.load_calibration().map_err(sensor_err)?;
    let mode = dev.power_mode().map_err(sensor_err)?;
    if mode == PowerMode::Sleep {
        log::debug!("sensor is asleep, requesting a forced conversion");
        dev.set_power_mode(PowerMode::Forced).map_err(sensor_err)?;
        // worst-case conversion time at 16x oversampling on all channels
        std::thread::sleep(Duration::from_millis(120));
    }
    let m = dev.read_measurement().map_err(sensor_err)?;
    print_measurement(&m);
    Ok(())
}

fn watch(dev: &mut Bme280<I2cdev>) -> anyhow::Result<()> {
    dev.load_calibration().map_err(sensor_err)?;
    dev.set_power_mode(PowerMode::Normal).map_err(sensor_err)?;
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))
        .context("failed to install the interrupt handler")?;
    while running.load(Ordering::SeqCst) {
        match dev.read_measurement() {
            Ok(m) => print_measurement(&m),
            Err(e) => log::warn!("skipping failed read: {e:?}"),
        }
        std::thread::sleep(Duration::from_secs(1));
    }
    Ok(())
}

fn print_measurement(m: &Measurement) {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    println!(
        "{ts} Temp={:3.2}*C Humidity={:3.2}% Pressure={:3.2}hPa",
        m.temp_c,
        m.humidity,
        m.pressure / 100.0
    );
}

fn info(dev: &mut Bme280<I2cdev>) -> anyhow::Result<()> {
    let info = dev.info().map_err(sensor_err)?;
    dev.load_calibration().map_err(sensor_err)?;
    let cal = dev
        .calibration()
        .ok_or_else(|| anyhow!("calibration data unavailable"))?;
    println!("----------------------------------------------");
    println!("BME280 Information");
    println!("----------------------------------------------");
    println!("    Sensor Chip ID = 0x{:02X} {}", info.chip_id, info.model);
    println!("     Humidity Mode = {}", info.osrs_h);
    println!("     Pressure Mode = {}", info.osrs_p);
    println!("  Temperature Mode = {}", info.osrs_t);
    println!("      Standby Time = {}", info.standby_time);
    println!("   IIR Filter Mode = {}", info.filter);
    println!(
        "   3-wire SPI Mode = {}",
        if info.spi3wire { "ON" } else { "OFF" }
    );
    println!("        Power Mode = {}", info.power_mode);
    println!(
        " Temperature Coeff = T1:{:6} T2:{:6} T3:{:5}",
        cal.dig_t1, cal.dig_t2, cal.dig_t3
    );
    println!(
        "    Pressure Coeff = P1:{:6} P2:{:6} P3:{:5}",
        cal.dig_p1, cal.dig_p2, cal.dig_p3
    );
    println!(
        "                     P4:{:6} P5:{:6} P6:{:5}",
        cal.dig_p4, cal.dig_p5, cal.dig_p6
    );
    println!(
        "                     P7:{:6} P8:{:6} P9:{:5}",
        cal.dig_p7, cal.dig_p8, cal.dig_p9
    );
    println!(
        "    Humidity Coeff = H1:{:6} H2:{:6} H3:{:5}",
        cal.dig_h1, cal.dig_h2, cal.dig_h3
    );
    println!(
        "                     H4:{:6} H5:{:6} H6:{:5}",
        cal.dig_h4, cal.dig_h5, cal.dig_h6
    );
    Ok(())
}

fn print_dump(dump: &RegisterDump) {
    let hex = |bytes: &[u8]| {
        bytes
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(" ")
    };
    println!("------------------------------------------------------");
    println!("BME280 register dump:");
    println!("------------------------------------------------------");
    println!(" reg    0  1  2  3  4  5  6  7  8  9  A  B  C  D  E  F");
    println!("------------------------------------------------------");
    // calibration data starts at 0x88, pad the row out to 0x80
    println!("[0x80]                         {}", hex(&dump.calib[0..8]));
    println!(
        "[0x90] {} {}",
        hex(&dump.calib[8..16]),
        hex(&dump.calib[16..24])
    );
    println!("[0xA0] {}", hex(&dump.calib[24..26]));
    println!("[0xD0] {:02X}", dump.chip_id);
    println!(
        "[0xE0] {} {}",
        hex(&dump.control[0..8]),
        hex(&dump.control[8..16])
    );
    println!(
        "[0xF0] {} {}",
        hex(&dump.control[16..24]),
        hex(&dump.control[24..31])
    );
}
