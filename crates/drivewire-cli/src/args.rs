//! CLI argument parsing with clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use drivewire_core::error::DriverError;

const PORT_HELP: &str = "Port the driver connects to";

/// Talk to automation drivers from the command line.
///
/// Every subcommand listens on a TCP port and waits for a driver to dial
/// in, then speaks the length-prefixed driver protocol.
#[derive(Debug, Parser)]
#[command(name = "drivewire", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Accept one driver, send one command and print the reply
    #[command(after_help = "\
Examples:
  drivewire call -p 56000 -- getAndroidId          # Print the device id
  drivewire call -p 56000 -- click 100.0 200.0     # Tap a coordinate
  drivewire call -p 56000 --binary shot.png -- takeScreenshot 0 0 0 0 1.0")]
    Call(CallArgs),

    /// Accept one driver and poll a command until it succeeds
    #[command(after_help = "\
By default a reply of \"null\" means \"not yet\". Use --sentinel to name a
different not-found reply, or --until to wait for a reply matching a regex.

Examples:
  drivewire wait -p 56000 -- getElementText '//*[@id=\"title\"]'
  drivewire wait -p 56000 --sentinel='-1.0|-1.0' -- findImage /sdcard/ok.png 0 0 0 0 0.9 0 0 0 1
  drivewire wait -p 56000 --until '^true$' -t 10000 -- appIsRunnig com.example.app")]
    Wait(WaitArgs),

    /// Send a command to every driver that connects
    #[command(after_help = "\
Examples:
  drivewire serve -p 56000 -- getWindowSize         # Log each device's size
  drivewire serve -p 56000 --send-buffer 4194304 -- takeScreenshot 0 0 0 0 1.0")]
    Serve(ServeArgs),

    /// Show an end-to-end usage example
    Examples,
}

/// Parse a port through the same range check the library uses.
fn parse_port(value: &str) -> Result<u16, String> {
    let port: i64 = value
        .parse()
        .map_err(|_| format!("`{}` is not a number", value))?;
    DriverError::check_port(port).map_err(|e| e.to_string())
}

#[derive(Debug, clap::Args)]
pub struct CallArgs {
    #[arg(short, long, value_parser = parse_port, help = PORT_HELP)]
    pub port: u16,

    /// Write the raw reply bytes to this file instead of printing text
    #[arg(long, value_name = "FILE")]
    pub binary: Option<PathBuf>,

    /// Command name followed by its arguments
    #[arg(
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

#[derive(Debug, clap::Args)]
pub struct WaitArgs {
    #[arg(short, long, value_parser = parse_port, help = PORT_HELP)]
    pub port: u16,

    /// Reply meaning "not found yet"
    #[arg(long, conflicts_with = "until", value_name = "REPLY")]
    pub sentinel: Option<String>,

    /// Succeed once the reply matches this regex
    #[arg(long, value_name = "REGEX")]
    pub until: Option<String>,

    /// Give up after this many milliseconds [default: DRIVEWIRE_WAIT_TIMEOUT_MS or 3000]
    #[arg(short, long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Pause between attempts in milliseconds [default: DRIVEWIRE_INTERVAL_MS or 500]
    #[arg(short, long, value_name = "MS")]
    pub interval: Option<u64>,

    /// Exit with an error instead of printing nothing on timeout
    #[arg(long)]
    pub raise: bool,

    /// Command name followed by its arguments
    #[arg(
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

#[derive(Debug, clap::Args)]
pub struct ServeArgs {
    #[arg(short, long, value_parser = parse_port, help = PORT_HELP)]
    pub port: u16,

    /// SO_SNDBUF for accepted drivers [default: DRIVEWIRE_SEND_BUFFER or 1 MiB]
    #[arg(long, value_name = "BYTES")]
    pub send_buffer: Option<usize>,

    /// Command name followed by its arguments
    #[arg(
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

/// End-to-end example text for the `examples` command.
pub const EXAMPLES_TEXT: &str = r#"End-to-end example: log in on an Android device

The device agent dials in to the script machine, so start drivewire first and
then point the agent at this host and port.

# 1. Check the device is reachable and read its id
drivewire call -p 56000 -- getAndroidId

# 2. Launch the app and wait until it is in the foreground
drivewire call -p 56000 -- startApp com.example.shop
drivewire wait -p 56000 --until '^true$' -t 10000 -- appIsRunnig com.example.shop

# 3. Wait for the login button, then tap it
drivewire wait -p 56000 --sentinel='-1|-1|-1|-1' -- getElementRect '//*[@text="Login"]'
drivewire call -p 56000 -- clickElement '//*[@text="Login"]'

# 4. Save a screenshot of the result
drivewire call -p 56000 --binary result.png -- takeScreenshot 0 0 0 0 1.0

Defaults can be set once per shell:
  export DRIVEWIRE_WAIT_TIMEOUT_MS=5000
  export DRIVEWIRE_INTERVAL_MS=250
  export RUST_LOG=drivewire=debug          # log every frame sent and received
"#;

#[cfg(test)]
mod tests {
    use super::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn test_call_parses_hyphenated_args() {
        let cli = Cli::parse_from(["drivewire", "call", "-p", "56000", "--", "swipe", "-1", "5"]);

        match cli.command {
            Commands::Call(args) => {
                assert_eq!(args.port, 56000);
                assert_eq!(args.command, vec!["swipe", "-1", "5"]);
                assert!(args.binary.is_none());
            }
            _ => panic!("Expected call command"),
        }
    }

    #[test]
    fn test_port_out_of_range_is_rejected() {
        let result = Cli::try_parse_from(["drivewire", "call", "-p", "70000", "--", "home"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_sentinel_and_until_conflict() {
        let result = Cli::try_parse_from([
            "drivewire", "wait", "-p", "1", "--sentinel", "null", "--until", "x", "--", "home",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_wait_overrides_are_optional() {
        let cli = Cli::parse_from(["drivewire", "wait", "-p", "1", "-t", "100", "--", "getTitle"]);
        match cli.command {
            Commands::Wait(args) => {
                assert_eq!(args.timeout, Some(100));
                assert_eq!(args.interval, None);
                assert!(!args.raise);
            }
            _ => panic!("Expected wait command"),
        }
    }
}
