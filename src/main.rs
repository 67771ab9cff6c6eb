use serial_injector::config::{InjectorConfig, CLI_MAX_SCAN};
use serial_injector::error::{self, Error};
use serial_injector::image::{self, HexImage, ImageError};
use serial_injector::injector::{self, Endianness};
use serial_injector::report::InjectionReport;
use serial_injector::serial;
use snafu::{ensure, ResultExt};
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "serial-injector",
    about = "Inject a serial number into an Intel HEX firmware image at a marker-designated address"
)]
struct Options {
    /// Serial number in hex; a 0x prefix, spaces and hyphens are allowed
    #[structopt(long)]
    serial: String,
    /// Path to the input HEX file
    #[structopt(long, parse(from_os_str))]
    input: PathBuf,
    /// Address of the marker, decimal or 0x-prefixed hex
    #[structopt(long, parse(try_from_str = parse_address), default_value = "0x4000")]
    address: usize,
    /// Byte value treated as free space after the marker
    #[structopt(long = "padding_bytes", parse(try_from_str = parse_byte), default_value = "0x00")]
    padding_bytes: u8,
    /// Output file path
    #[structopt(long, parse(from_os_str))]
    output: PathBuf,
    /// Optional path for a JSON summary of the run
    #[structopt(long, parse(from_os_str))]
    report: Option<PathBuf>,
}

fn parse_address(s: &str) -> Result<usize, String> {
    if s.starts_with('-') {
        return Err("address must be non-negative".to_string());
    }
    let parsed = if s.starts_with("0x") || s.starts_with("0X") {
        usize::from_str_radix(&s[2..], 16)
    } else {
        s.parse()
    };
    parsed.map_err(|_| format!("invalid address: {}", s))
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let parsed = if s.starts_with("0x") || s.starts_with("0X") {
        u8::from_str_radix(&s[2..], 16)
    } else {
        s.parse()
    };
    parsed.map_err(|_| format!("invalid byte value: {}", s))
}

fn main() {
    // Diagnostics go to stderr; stdout is reserved for the operator dialog.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let options = Options::from_args();
    if let Err(err) = run(&options) {
        eprintln!("{}", err);
        if let Error::VerificationMismatch { ref mismatches } = err {
            for mismatch in mismatches {
                eprintln!("  {}", mismatch);
            }
        }
        process::exit(1);
    }
}

fn run(options: &Options) -> Result<(), Error> {
    let config = InjectorConfig {
        padding_byte: options.padding_bytes,
        max_scan: CLI_MAX_SCAN,
        ..InjectorConfig::default()
    };

    let mut image = load_input(&options.input)?;
    let backup = image::create_backup(&options.input)
        .context(error::BackupFailure { path: &options.input })?;
    println!("Backup written to {}", backup.display());

    let endianness = injector::detect_endianness(&image, options.address, &config);
    ensure!(
        endianness.is_known(),
        error::MarkerNotFound {
            marker: config.marker_value,
            address: options.address,
        }
    );
    println!(
        "Marker found at {:#x}, stored {}-endian",
        options.address, endianness
    );

    let payload_start = options.address + config.marker_len;
    let free_space = injector::free_space_after(&image, payload_start, &config);
    ensure!(free_space > 0, error::NoFreeSpace { address: payload_start });
    println!(
        "Available space found: {} bytes ({} hex characters)",
        free_space,
        free_space * 2
    );

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut writer = io::stdout();
    let serial_bytes =
        serial::prompt_serial(&mut reader, &mut writer, &options.serial, free_space)
            .context(error::PromptFailure)?;

    let payload = injector::orient_payload(endianness, &serial_bytes);
    if endianness == Endianness::Little {
        println!("Marker is stored little-endian: payload bytes will be reversed");
    }

    println!("Planned changes (address : old -> new):");
    for (i, &byte) in payload.iter().enumerate() {
        let address = payload_start + i;
        match image.get(address) {
            Some(old) => println!(" {:#x} : {:#04x} -> {:#04x}", address, old, byte),
            None => println!(" {:#x} : (unmapped) -> {:#04x}", address, byte),
        }
    }

    injector::inject_and_verify(&mut image, payload_start, &payload, &options.output)?;
    println!(
        "Successfully injected the serial number into {}",
        options.output.display()
    );

    if let Some(report_path) = &options.report {
        let report = InjectionReport {
            input: options.input.clone(),
            output: options.output.clone(),
            marker_address: options.address,
            endianness,
            injection_address: payload_start,
            free_space,
            payload,
        };
        report
            .write_json(report_path)
            .context(error::ReportFailure { path: report_path })?;
        println!("Report written to {}", report_path.display());
    }

    Ok(())
}

fn load_input(path: &Path) -> Result<HexImage, Error> {
    HexImage::load(path).map_err(|err| match err {
        ImageError::Io { ref source } if source.kind() == io::ErrorKind::NotFound => {
            Error::InputNotFound {
                path: path.to_path_buf(),
            }
        }
        other => Error::LoadFailure {
            path: path.to_path_buf(),
            source: other,
        },
    })
}
