use std::fmt;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use esphome_client::{Connection, ConnectionConfig};
use esphome_transport::DEFAULT_PORT;
use tracing::debug;

use crate::exit::{api_error, io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod entities;
pub mod info;
pub mod light;
pub mod logs;
pub mod states;
pub mod switch;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect and print device information.
    Info(DeviceArgs),
    /// List the entities a device exposes.
    Entities(DeviceArgs),
    /// Stream device log output.
    Logs(LogsArgs),
    /// Stream entity state updates.
    States(StatesArgs),
    /// Send a light command.
    Light(LightArgs),
    /// Turn a switch on or off.
    Switch(SwitchArgs),
    /// Decode hex-encoded frames offline.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))?;

    runtime.block_on(async move {
        match command {
            Command::Info(args) => info::run(args, format).await,
            Command::Entities(args) => entities::run(args, format).await,
            Command::Logs(args) => logs::run(args, format).await,
            Command::States(args) => states::run(args, format).await,
            Command::Light(args) => light::run(args).await,
            Command::Switch(args) => switch::run(args).await,
            Command::Decode(args) => decode::run(args, format),
            Command::Version(args) => version::run(args),
        }
    })
}

/// Where and how to reach a device.
#[derive(Args)]
pub struct DeviceArgs {
    /// Device hostname or IP address.
    #[arg(env = "ESPHOME_HOST")]
    pub host: String,
    /// Native API port.
    #[arg(long, env = "ESPHOME_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// API password, if the device has one.
    #[arg(long, env = "ESPHOME_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,
    /// Per-request timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

impl fmt::Debug for DeviceArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceArgs")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "password",
                &format_args!("<redacted:{} bytes>", self.password.len()),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl DeviceArgs {
    pub fn config(&self) -> CliResult<ConnectionConfig> {
        let timeout = parse_duration(&self.timeout)?;
        Ok(ConnectionConfig::new(self.host.as_str())
            .with_port(self.port)
            .with_password(self.password.as_str())
            .with_client_info(concat!("esphome-cli ", env!("CARGO_PKG_VERSION")))
            .with_response_timeout(timeout))
    }
}

/// Connect and complete the handshake.
pub async fn open(args: &DeviceArgs) -> CliResult<Connection> {
    let conn = Connection::new(args.config()?);
    conn.connect()
        .await
        .map_err(|err| api_error("connect failed", err))?;
    Ok(conn)
}

/// End the session politely; errors only matter for diagnostics here.
pub async fn close(conn: Connection) {
    if let Err(err) = conn.disconnect().await {
        debug!(error = %err, "disconnect failed");
    }
}

/// Device log verbosity.
#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum DeviceLogLevel {
    Error,
    Warn,
    Info,
    Config,
    Debug,
    Verbose,
    VeryVerbose,
}

impl From<DeviceLogLevel> for esphome_client::LogLevel {
    fn from(level: DeviceLogLevel) -> Self {
        match level {
            DeviceLogLevel::Error => Self::Error,
            DeviceLogLevel::Warn => Self::Warn,
            DeviceLogLevel::Info => Self::Info,
            DeviceLogLevel::Config => Self::Config,
            DeviceLogLevel::Debug => Self::Debug,
            DeviceLogLevel::Verbose => Self::Verbose,
            DeviceLogLevel::VeryVerbose => Self::VeryVerbose,
        }
    }
}

#[derive(Args, Debug)]
pub struct LogsArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Lowest level the device should forward.
    #[arg(long, value_enum, default_value = "debug")]
    pub level: DeviceLogLevel,
    /// Ask the device to print its configuration first.
    #[arg(long)]
    pub dump_config: bool,
    /// Exit after N lines.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct StatesArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Only print updates for these entity keys (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub keys: Option<Vec<u32>>,
    /// Exit after N updates.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct LightArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Entity key, as shown by `entities`.
    #[arg(long)]
    pub key: u32,
    /// Turn the light on.
    #[arg(long, conflicts_with = "off")]
    pub on: bool,
    /// Turn the light off.
    #[arg(long)]
    pub off: bool,
    /// Brightness between 0 and 1.
    #[arg(long)]
    pub brightness: Option<f32>,
    /// Color as red,green,blue components between 0 and 1.
    #[arg(long, value_delimiter = ',', num_args = 3)]
    pub rgb: Option<Vec<f32>>,
    /// Transition length (e.g. 2s, 500ms).
    #[arg(long)]
    pub transition: Option<String>,
    /// Effect name as listed by `entities`.
    #[arg(long)]
    pub effect: Option<String>,
}

#[derive(Args, Debug)]
pub struct SwitchArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// Entity key, as shown by `entities`.
    #[arg(long)]
    pub key: u32,
    #[arg(long, conflicts_with = "off", required_unless_present = "off")]
    pub on: bool,
    #[arg(long)]
    pub off: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex-encoded frames. Read from stdin when omitted.
    pub hex: Option<String>,
    /// Fail on unknown message types instead of skipping them.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `5s`, `500ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
    }

    #[test]
    fn parse_duration_invalid() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn device_args_build_config() {
        let args = DeviceArgs {
            host: "10.0.0.5".to_string(),
            port: 6053,
            password: "secret".to_string(),
            timeout: "750ms".to_string(),
        };
        let config = args.config().unwrap();
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.password, "secret");
        assert_eq!(config.response_timeout, Duration::from_millis(750));
        assert!(config.client_info.starts_with("esphome-cli "));
    }
}
