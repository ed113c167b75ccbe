//! SkyGuard operator front end
//!
//! # Commands
//!
//! - `learn`: one calibration cycle with an interactive label prompt
//! - `predict`: sky temperature and class for a reading, no writes
//! - `report`: quality report and current model, no writes
//! - `init`: write the factory coefficient document if none exists
//!
//! `learn` and `predict` read the MLX90614 over SMBus (`--bus`, `--address`)
//! unless a reading is given by hand with `--ambient` and `--object`.
//!
//! Library log records go to stderr; everything the operator reads goes to
//! stdout.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::debug;
use tracing_subscriber::{fmt, EnvFilter};

use skyguard_core::constants::DEFAULT_I2C_BUS;
use skyguard_core::station::{COEFFICIENTS_FILE, HISTORY_FILE, SAMPLES_FILE};
use skyguard_core::{
    Clock, CoefficientSet, CycleOutcome, FixedReading, PromptLabelSource, Reading, Station,
    StationPaths, TemperatureSource,
};

/// Self-calibrating cloud-cover classifier for MLX90614 sky sensors
#[derive(Debug, Parser)]
#[command(name = "skyguard")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Directory holding the station files
    #[arg(long, global = true, default_value = ".")]
    data_dir: PathBuf,

    /// Coefficient document, relative to the data directory
    #[arg(long, global = true, default_value = COEFFICIENTS_FILE)]
    coefficients: PathBuf,

    /// Sample log, relative to the data directory
    #[arg(long, global = true, default_value = SAMPLES_FILE)]
    samples: PathBuf,

    /// History log, relative to the data directory
    #[arg(long, global = true, default_value = HISTORY_FILE)]
    history: PathBuf,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one calibration cycle
    ///
    /// Shows the quality report, reads the sensor, asks for the true cloud
    /// class and updates the model. Press Enter without a digit to abort
    /// without saving.
    Learn(SourceArgs),
    /// Classify a reading with the stored coefficients
    Predict(SourceArgs),
    /// Print the quality report and the current model
    Report,
    /// Create the default coefficient document
    Init,
}

/// Where a reading comes from
#[derive(Debug, Args)]
struct SourceArgs {
    /// i2c-dev node the MLX90614 is attached to
    #[arg(long, default_value = DEFAULT_I2C_BUS)]
    bus: PathBuf,

    /// SMBus address of the MLX90614, hex (0x5a) or decimal
    #[arg(long, default_value = "0x5a", value_parser = parse_address)]
    address: u8,

    /// Ambient (sensor die) temperature in °C, instead of reading the sensor
    #[arg(long, allow_negative_numbers = true, requires = "object", conflicts_with_all = ["bus", "address"])]
    ambient: Option<f64>,

    /// Object (sky) temperature in °C, instead of reading the sensor
    #[arg(long, allow_negative_numbers = true, requires = "ambient", conflicts_with_all = ["bus", "address"])]
    object: Option<f64>,
}

impl SourceArgs {
    /// Reading typed in by hand, if any
    fn manual(&self) -> Option<Reading> {
        Some(Reading::new(self.ambient?, self.object?))
    }
}

fn parse_address(text: &str) -> Result<u8, String> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => text.parse::<u8>(),
    };
    match parsed {
        Ok(address) if address <= 0x7F => Ok(address),
        Ok(address) => Err(format!("{address:#04x} is not a 7-bit address")),
        Err(err) => Err(format!("invalid address {text:?}: {err}")),
    }
}

#[cfg(target_os = "linux")]
fn open_sensor(args: &SourceArgs) -> Result<Box<dyn TemperatureSource>> {
    use log::info;
    use skyguard_core::{LinuxSmbus, Mlx90614};

    if let Some(reading) = args.manual() {
        return Ok(Box::new(FixedReading(reading)));
    }
    info!("Reading MLX90614 at {:#04x} on {}", args.address, args.bus.display());
    let sensor = Mlx90614::new(LinuxSmbus::new(&args.bus)).with_address(args.address);
    Ok(Box::new(sensor))
}

#[cfg(not(target_os = "linux"))]
fn open_sensor(args: &SourceArgs) -> Result<Box<dyn TemperatureSource>> {
    match args.manual() {
        Some(reading) => Ok(Box::new(FixedReading(reading))),
        None => anyhow::bail!(
            "SMBus access to {} (address {:#04x}) needs Linux; pass --ambient and --object",
            args.bus.display(),
            args.address
        ),
    }
}

impl Cli {
    fn paths(&self) -> StationPaths {
        StationPaths {
            coefficients: self.data_dir.join(&self.coefficients),
            samples: self.data_dir.join(&self.samples),
            history: self.data_dir.join(&self.history),
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let paths = cli.paths();
    debug!("Station files: {paths:?}");
    let station = Station::new(paths);
    let result = match &cli.command {
        Commands::Learn(args) => learn(&station, args),
        Commands::Predict(args) => predict(&station, args),
        Commands::Report => print_overview(&station, io::stdout().lock()),
        Commands::Init => init(&station),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn print_model(out: &mut impl Write, set: &CoefficientSet) -> io::Result<()> {
    let m = &set.model;
    writeln!(out, "Model")?;
    writeln!(out, "K1={:.4} K2={:.4} K3={:.4} K4={:.4}", m.k1, m.k2, m.k3, m.k4)?;
    writeln!(out, "K5={:.4} K6={:.4} K7={:.4}", m.k5, m.k6, m.k7)?;
    let t = &set.thresholds;
    writeln!(
        out,
        "Thresholds: clear<={:.2} light<={:.2} heavy<={:.2}",
        t.clear, t.light, t.heavy
    )
}

fn print_overview<C: Clock>(station: &Station<C>, mut out: impl Write) -> Result<()> {
    let overview = station.overview().context("reading station state")?;

    write!(out, "{}", overview.quality.render(&overview.coefficients))?;
    if overview.skipped_rows > 0 {
        writeln!(out, "Unreadable sample rows: {}", overview.skipped_rows)?;
    }
    writeln!(out)?;
    print_model(&mut out, &overview.coefficients)?;
    writeln!(out)?;
    Ok(())
}

fn learn(station: &Station, args: &SourceArgs) -> Result<()> {
    let mut sensor = open_sensor(args)?;
    run_learn(station, sensor.as_mut(), io::stdin().lock(), io::stdout())
}

/// One cycle: report, read, prompt on `input`/`out`, learn, summarize
fn run_learn<C, S, R, W>(station: &Station<C>, sensor: &mut S, input: R, mut out: W) -> Result<()>
where
    C: Clock,
    S: TemperatureSource + ?Sized,
    R: BufRead,
    W: Write,
{
    print_overview(station, &mut out)?;

    let mut labels = PromptLabelSource::new(input, out);
    let outcome = station
        .run_cycle(sensor, &mut labels)
        .context("calibration cycle failed")?;
    let mut out = labels.into_output();

    match outcome {
        CycleOutcome::Aborted(_) => {
            writeln!(out, "No label given. Nothing saved.")?;
        }
        CycleOutcome::Completed(cycle) => {
            let report = &cycle.report;
            writeln!(out)?;
            writeln!(out, "Label {} stored ({} samples)", cycle.label, report.total_samples)?;
            writeln!(out, "Phase 1 thresholds : {}", report.thresholds)?;
            writeln!(out, "Phase 2 K1/K2      : {}", report.primary)?;
            writeln!(out, "Phase 3 K3..K7     : {}", report.secondary)?;
            writeln!(out, "Freeze             : {}", report.freeze)?;
            if !cycle.saved {
                writeln!(out, "Model is frozen, coefficient file left unchanged.")?;
            }
            writeln!(out)?;
            print_model(&mut out, &cycle.coefficients)?;
        }
    }
    Ok(())
}

fn predict(station: &Station, args: &SourceArgs) -> Result<()> {
    let mut sensor = open_sensor(args)?;
    run_predict(station, sensor.as_mut(), io::stdout().lock())
}

fn run_predict<C, S>(station: &Station<C>, sensor: &mut S, mut out: impl Write) -> Result<()>
where
    C: Clock,
    S: TemperatureSource + ?Sized,
{
    let reading = sensor.read_temperatures().context("reading temperatures")?;
    let measurement = station
        .predict(reading)
        .context("loading coefficients")?;

    writeln!(out, "Ta         : {} °C", reading.ambient)?;
    writeln!(out, "Ts         : {} °C", reading.object)?;
    writeln!(out, "Delta      : {} °C", reading.delta())?;
    writeln!(out, "Tsky       : {:.2} °C", measurement.sky_temperature)?;
    writeln!(out, "Prediction : {}", measurement.predicted)?;
    Ok(())
}

fn init(station: &Station) -> Result<()> {
    let store = station.coefficients();
    let created = store
        .ensure_exists()
        .with_context(|| format!("writing {}", store.path().display()))?;

    if created {
        println!("Created {}", store.path().display());
    } else {
        println!("{} already exists, left unchanged", store.path().display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use skyguard_core::constants::{REG_AMBIENT, REG_OBJECT_1};
    use skyguard_core::{CloudClass, Mlx90614, RegisterBus};
    use std::io::Cursor;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Register words by register, as the MLX90614 RAM would hold them
    struct RegisterMap {
        ambient: u16,
        object: u16,
        addresses: Vec<u8>,
    }

    impl RegisterMap {
        fn new(ambient: f64, object: f64) -> Self {
            let raw = |celsius: f64| ((celsius + 273.15) / 0.02).round() as u16;
            Self { ambient: raw(ambient), object: raw(object), addresses: Vec::new() }
        }
    }

    impl RegisterBus for RegisterMap {
        fn read_block(&mut self, address: u8, register: u8, buf: &mut [u8]) -> io::Result<()> {
            self.addresses.push(address);
            let word = match register {
                REG_AMBIENT => self.ambient,
                REG_OBJECT_1 => self.object,
                _ => return Err(io::Error::new(io::ErrorKind::InvalidInput, "unmapped register")),
            };
            buf[..2].copy_from_slice(&word.to_le_bytes());
            Ok(())
        }

        fn reopen(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn sensor(ambient: f64, object: f64) -> Mlx90614<RegisterMap> {
        Mlx90614::new(RegisterMap::new(ambient, object))
            .with_address(0x5B)
            .with_settle_delay(Duration::ZERO)
    }

    fn station(dir: &TempDir) -> Station {
        Station::new(StationPaths::in_dir(dir.path()))
    }

    #[test]
    fn command_line_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn paths_join_data_dir() {
        let cli = Cli::parse_from(["skyguard", "--data-dir", "/srv/sky", "report"]);
        let paths = cli.paths();
        assert_eq!(paths, StationPaths::in_dir("/srv/sky"));
    }

    #[test]
    fn sensor_is_the_default_source() {
        let cli = Cli::parse_from(["skyguard", "learn", "--address", "0x5b"]);
        match cli.command {
            Commands::Learn(args) => {
                assert_eq!(args.bus, PathBuf::from("/dev/i2c-1"));
                assert_eq!(args.address, 0x5B);
                assert_eq!(args.manual(), None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn manual_reading_overrides_sensor() {
        let cli = Cli::parse_from(["skyguard", "predict", "--ambient", "-3.5", "--object", "-24.25"]);
        match cli.command {
            Commands::Predict(args) => assert_eq!(args.manual(), Some(Reading::new(-3.5, -24.25))),
            other => panic!("unexpected {other:?}"),
        }

        assert!(Cli::try_parse_from(["skyguard", "learn", "--ambient", "4"]).is_err());
        assert!(Cli::try_parse_from([
            "skyguard", "learn", "--ambient", "4", "--object", "-20", "--bus", "/dev/i2c-0",
        ])
        .is_err());
    }

    #[test]
    fn addresses_parse_as_hex_or_decimal() {
        assert_eq!(parse_address("0x5a"), Ok(0x5A));
        assert_eq!(parse_address("0X5B"), Ok(0x5B));
        assert_eq!(parse_address("90"), Ok(0x5A));
        assert!(parse_address("0x80").is_err());
        assert!(parse_address("zz").is_err());
    }

    #[test]
    fn learn_reads_sensor_and_stores_label() {
        let dir = TempDir::new().unwrap();
        let station = station(&dir);
        let mut mlx = sensor(10.01, -15.01);
        let mut out = Vec::new();

        run_learn(&station, &mut mlx, Cursor::new("1\n"), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Quality Report"));
        assert!(text.contains("Ta Ambient : 10.01 °C"));
        assert!(text.contains("Ts Object  : -15.01 °C"));
        assert!(text.contains("Prediction : 0 (clear)"));
        assert!(text.contains("Label 1 (light clouds) stored (1 samples)"));
        assert!(text.contains("Phase 1 thresholds : updated"));

        assert!(mlx.into_inner().addresses.iter().all(|&a| a == 0x5B));
        let window = station.samples().read_recent(0).unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window.observations[0].ambient, 10.01);
        assert_eq!(window.observations[0].label, CloudClass::LightClouds);
    }

    #[test]
    fn learn_without_label_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut mlx = sensor(10.01, -15.01);
        let mut out = Vec::new();

        run_learn(&station(&dir), &mut mlx, Cursor::new(""), &mut out).unwrap();

        assert!(String::from_utf8(out).unwrap().contains("No label given. Nothing saved."));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn predict_from_sensor_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut out = Vec::new();

        run_predict(&station(&dir), &mut sensor(5.01, -10.01), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Tsky       : -15.02 °C"));
        assert!(text.contains("Prediction : 2 (heavy clouds)"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn manual_reading_is_validated() {
        let dir = TempDir::new().unwrap();
        let mut reading = FixedReading::new(5.0, 999.0);
        assert!(run_predict(&station(&dir), &mut reading, Vec::new()).is_err());
    }

    #[test]
    fn init_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let station = station(&dir);

        init(&station).unwrap();
        let first = std::fs::read_to_string(station.coefficients().path()).unwrap();
        init(&station).unwrap();
        let second = std::fs::read_to_string(station.coefficients().path()).unwrap();
        assert_eq!(first, second);
    }
}
