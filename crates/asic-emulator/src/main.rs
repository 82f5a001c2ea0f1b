//! CLI entry point for the ASIC emulator binary.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use asic_emulator::{
    init_logging, AsicDevice, EmulatorClient, EmulatorConfig, EmulatorServer, LogConfig,
    DEFAULT_ENDPOINT,
};
use asic_model::Register;
use crossbeam_channel as _;
use parking_lot as _;
#[cfg(test)]
use proptest as _;
use rand as _;
#[cfg(test)]
use rstest as _;
use serde as _;
use serde_json as _;
#[cfg(test)]
use tempfile as _;
use thiserror as _;
use tracing::info;
use tracing_subscriber as _;

const USAGE_TEXT: &str = "\
Usage: asic-emulator <command> [options]

Commands:
  serve                          Run the emulator server
  read <addr> [len]              Read registers from a running emulator
  write <addr> <val> [vals...]   Write registers on a running emulator
  map                            Print the register map

Options:
  -e, --endpoint <host:port>  Emulator endpoint (default: 127.0.0.1:5555)
  -c, --config <file>         JSON config file (serve only)
      --log-register-writes   Log every stored register byte (serve only)
  -r, --radix <radix>         Display radix: hex, dec or bin (read only, default: hex)
  -v, --verbose               Enable debug logging
  -h, --help                  Show this help message

Integers accept decimal, 0x hex, 0o octal and 0b binary.

Examples:
  asic-emulator serve --endpoint 0.0.0.0:5555
  asic-emulator read 0x05 2 --radix dec
  asic-emulator write 0 0x51
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Serve(ServeArgs),
    Read(ReadArgs),
    Write(WriteArgs),
    Map,
}

#[derive(Debug, PartialEq, Eq, Default)]
struct ServeArgs {
    endpoint: Option<String>,
    config: Option<PathBuf>,
    log_register_writes: bool,
    verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct ReadArgs {
    endpoint: String,
    address: u8,
    length: usize,
    radix: Radix,
    verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct WriteArgs {
    endpoint: String,
    address: u8,
    values: Vec<u8>,
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Radix {
    #[default]
    Hex,
    Dec,
    Bin,
}

impl Radix {
    fn parse(text: &str) -> Result<Self, String> {
        match text {
            "hex" => Ok(Self::Hex),
            "dec" => Ok(Self::Dec),
            "bin" => Ok(Self::Bin),
            other => Err(format!("unknown radix: {other}")),
        }
    }

    fn format(self, value: u8) -> String {
        match self {
            Self::Hex => format!("{value:#04x}"),
            Self::Dec => format!("{value:03}"),
            Self::Bin => format!("{value:#010b}"),
        }
    }
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    match command_str.as_str() {
        "serve" => parse_serve_args(args)
            .map(Command::Serve)
            .map(ParseResult::Command),
        "read" => parse_read_args(args)
            .map(Command::Read)
            .map(ParseResult::Command),
        "write" => parse_write_args(args)
            .map(Command::Write)
            .map(ParseResult::Command),
        "map" => parse_map_args(args).map(|()| ParseResult::Command(Command::Map)),
        other => Err(format!("unknown command: {other}")),
    }
}

#[allow(clippy::while_let_on_iterator)]
fn parse_serve_args(mut args: impl Iterator<Item = OsString>) -> Result<ServeArgs, String> {
    let mut parsed = ServeArgs::default();

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--verbose" || arg == "-v" {
            parsed.verbose = true;
            continue;
        }

        if arg == "--log-register-writes" {
            parsed.log_register_writes = true;
            continue;
        }

        if arg == "-e" || arg == "--endpoint" {
            parsed.endpoint = Some(option_value(&mut args, "--endpoint")?);
            continue;
        }

        if arg == "-c" || arg == "--config" {
            parsed.config = Some(PathBuf::from(option_value(&mut args, "--config")?));
            continue;
        }

        return Err(format!("unknown option: {}", arg.to_string_lossy()));
    }

    Ok(parsed)
}

#[allow(clippy::while_let_on_iterator)]
fn parse_read_args(mut args: impl Iterator<Item = OsString>) -> Result<ReadArgs, String> {
    let mut endpoint = DEFAULT_ENDPOINT.to_string();
    let mut radix = Radix::default();
    let mut verbose = false;
    let mut positional = Vec::new();

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--verbose" || arg == "-v" {
            verbose = true;
            continue;
        }

        if arg == "-e" || arg == "--endpoint" {
            endpoint = option_value(&mut args, "--endpoint")?;
            continue;
        }

        if arg == "-r" || arg == "--radix" {
            radix = Radix::parse(&option_value(&mut args, "--radix")?)?;
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        positional.push(arg.to_string_lossy().to_string());
    }

    let (address, length) = match positional.as_slice() {
        [] => return Err("missing register address".to_string()),
        [address] => (parse_byte(address)?, 1),
        [address, length] => (parse_byte(address)?, parse_length(length)?),
        _ => return Err("too many arguments for read".to_string()),
    };

    Ok(ReadArgs {
        endpoint,
        address,
        length,
        radix,
        verbose,
    })
}

#[allow(clippy::while_let_on_iterator)]
fn parse_write_args(mut args: impl Iterator<Item = OsString>) -> Result<WriteArgs, String> {
    let mut endpoint = DEFAULT_ENDPOINT.to_string();
    let mut verbose = false;
    let mut positional = Vec::new();

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--verbose" || arg == "-v" {
            verbose = true;
            continue;
        }

        if arg == "-e" || arg == "--endpoint" {
            endpoint = option_value(&mut args, "--endpoint")?;
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        positional.push(parse_byte(&arg.to_string_lossy())?);
    }

    let Some((&address, values)) = positional.split_first() else {
        return Err("missing register address".to_string());
    };
    if values.is_empty() {
        return Err("missing value to write".to_string());
    }

    Ok(WriteArgs {
        endpoint,
        address,
        values: values.to_vec(),
        verbose,
    })
}

fn parse_map_args(mut args: impl Iterator<Item = OsString>) -> Result<(), String> {
    match args.next() {
        None => Ok(()),
        Some(arg) if arg == "--help" || arg == "-h" => Err(USAGE_TEXT.to_string()),
        Some(arg) => Err(format!("unexpected argument: {}", arg.to_string_lossy())),
    }
}

fn option_value(args: &mut impl Iterator<Item = OsString>, name: &str) -> Result<String, String> {
    args.next()
        .map(|value| value.to_string_lossy().to_string())
        .ok_or_else(|| format!("missing value for {name}"))
}

fn parse_integer(text: &str) -> Result<u64, String> {
    let lower = text.to_ascii_lowercase();
    let (digits, radix) = if let Some(hex) = lower.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        (bin, 2)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        (oct, 8)
    } else {
        (lower.as_str(), 10)
    };
    u64::from_str_radix(&digits.replace('_', ""), radix)
        .map_err(|_| format!("invalid integer: {text}"))
}

fn parse_byte(text: &str) -> Result<u8, String> {
    u8::try_from(parse_integer(text)?).map_err(|_| format!("value out of range 0..=255: {text}"))
}

fn parse_length(text: &str) -> Result<usize, String> {
    usize::try_from(parse_integer(text)?).map_err(|_| format!("length too large: {text}"))
}

fn install_logging(verbose: bool) {
    let mut config = LogConfig::from_env();
    if verbose {
        config = config.verbose();
    }
    if let Err(e) = init_logging(&config) {
        eprintln!("warning: {e}");
    }
}

fn run_serve(args: ServeArgs) -> Result<(), i32> {
    install_logging(args.verbose);

    let mut config = match &args.config {
        Some(path) => EmulatorConfig::load(path).map_err(|e| {
            eprintln!("error: {e}");
            1
        })?,
        None => EmulatorConfig::default(),
    };
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    if args.log_register_writes {
        config.log_register_writes = true;
    }

    let mut server = EmulatorServer::bind(&config).map_err(|e| {
        eprintln!("error: {e}");
        1
    })?;
    info!(
        endpoint = %server.local_addr(),
        log_register_writes = config.log_register_writes,
        "MERCURY ASIC emulator running"
    );
    server.wait();
    Ok(())
}

fn connect(endpoint: &str) -> Result<AsicDevice, i32> {
    EmulatorClient::connect(endpoint)
        .map(AsicDevice::new)
        .map_err(|e| {
            eprintln!("error: {e}");
            1
        })
}

fn format_values(values: &[u8], radix: Radix) -> String {
    values
        .iter()
        .map(|value| radix.format(*value))
        .collect::<Vec<_>>()
        .join(" ")
}

fn run_read(args: &ReadArgs) -> Result<(), i32> {
    install_logging(args.verbose);
    let mut device = connect(&args.endpoint)?;

    let response = device
        .register_read(args.address, args.length)
        .map_err(|e| {
            eprintln!("error: {e}");
            1
        })?;

    let values = response.get(1..).unwrap_or_default();
    println!("{:03} : {}", args.address, format_values(values, args.radix));
    Ok(())
}

fn run_write(args: &WriteArgs) -> Result<(), i32> {
    install_logging(args.verbose);
    let mut device = connect(&args.endpoint)?;

    let response = device
        .register_write(args.address, &args.values)
        .map_err(|e| {
            eprintln!("error: {e}");
            1
        })?;

    if let Some((control, values)) = response.split_first() {
        println!("{control:03} : {}", format_values(values, Radix::Dec));
    }
    Ok(())
}

fn run_map() {
    for register in Register::ALL {
        println!(
            "{:03}  {:<20} {}",
            register.address(),
            register.name(),
            register.description()
        );
    }
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(command)) => {
            let result = match command {
                Command::Serve(args) => run_serve(args),
                Command::Read(args) => run_read(&args),
                Command::Write(args) => run_write(&args),
                Command::Map => {
                    run_map();
                    Ok(())
                }
            };
            match result {
                Ok(()) => 0,
                Err(code) => code,
            }
        }
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn args(values: &[&str]) -> impl Iterator<Item = OsString> {
        values
            .iter()
            .map(OsString::from)
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn parses_serve_command() {
        let result = parse_serve_args(args(&[
            "--endpoint",
            "0.0.0.0:6000",
            "--config",
            "emulator.json",
            "--log-register-writes",
            "-v",
        ]))
        .expect("valid serve args should parse");

        assert_eq!(
            result,
            ServeArgs {
                endpoint: Some("0.0.0.0:6000".to_string()),
                config: Some(PathBuf::from("emulator.json")),
                log_register_writes: true,
                verbose: true,
            }
        );
    }

    #[test]
    fn parses_read_command_with_defaults() {
        let result = parse_read_args(args(&["0x05"])).expect("valid read args should parse");

        assert_eq!(
            result,
            ReadArgs {
                endpoint: DEFAULT_ENDPOINT.to_string(),
                address: 5,
                length: 1,
                radix: Radix::Hex,
                verbose: false,
            }
        );
    }

    #[test]
    fn parses_read_command_with_options() {
        let result = parse_read_args(args(&["26", "5", "--radix", "bin", "-e", "host:1"]))
            .expect("valid read args should parse");

        assert_eq!(result.address, 26);
        assert_eq!(result.length, 5);
        assert_eq!(result.radix, Radix::Bin);
        assert_eq!(result.endpoint, "host:1");
    }

    #[test]
    fn parses_write_command() {
        let result = parse_write_args(args(&["0", "0b1", "0x10", "200"]))
            .expect("valid write args should parse");

        assert_eq!(result.address, 0);
        assert_eq!(result.values, vec![1, 0x10, 200]);
    }

    #[test]
    fn write_requires_a_value() {
        let error = parse_write_args(args(&["3"])).expect_err("missing value should fail");
        assert!(error.contains("missing value"));
    }

    #[test]
    fn rejects_out_of_range_bytes() {
        let error = parse_write_args(args(&["3", "256"])).expect_err("256 should fail");
        assert!(error.contains("out of range"));
    }

    #[test]
    fn rejects_unknown_radix() {
        let error = parse_read_args(args(&["0", "--radix", "oct"])).expect_err("bad radix");
        assert!(error.contains("unknown radix"));
    }

    #[test]
    fn parses_help_flag() {
        let result = parse_args(args(&["--help"])).expect("help should parse without error");
        assert!(matches!(result, ParseResult::Help));
    }

    #[test]
    fn parses_map_command() {
        let result = parse_args(args(&["map"])).expect("map should parse");
        assert!(matches!(result, ParseResult::Command(Command::Map)));
        assert!(parse_args(args(&["map", "extra"])).is_err());
    }

    #[test]
    fn rejects_unknown_command() {
        let error = parse_args(args(&["unknown"])).expect_err("unknown command should fail parse");
        assert!(error.contains("unknown command"));
    }

    #[test]
    fn integers_accept_prefixed_radixes() {
        assert_eq!(parse_integer("42"), Ok(42));
        assert_eq!(parse_integer("0x2A"), Ok(42));
        assert_eq!(parse_integer("0b101010"), Ok(42));
        assert_eq!(parse_integer("0o52"), Ok(42));
        assert!(parse_integer("0xZZ").is_err());
        assert!(parse_integer("").is_err());
    }

    #[test]
    fn radix_formats_match_shell_output() {
        assert_eq!(format_values(&[5, 200], Radix::Hex), "0x05 0xc8");
        assert_eq!(format_values(&[5, 200], Radix::Dec), "005 200");
        assert_eq!(format_values(&[5], Radix::Bin), "0b00000101");
    }
}
