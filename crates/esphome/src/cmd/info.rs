use esphome_client::DeviceInfo;
use serde::Serialize;

use crate::cmd::{close, open, DeviceArgs};
use crate::exit::{api_error, CliResult, SUCCESS};
use crate::output::{print_json, table, OutputFormat};

#[derive(Serialize)]
struct InfoOutput {
    name: String,
    friendly_name: String,
    api_version: String,
    server_info: String,
    esphome_version: String,
    compilation_time: String,
    model: String,
    manufacturer: String,
    mac_address: String,
    project: Option<String>,
    suggested_area: String,
    uses_password: bool,
    has_deep_sleep: bool,
    webserver_port: Option<u16>,
    ping_latency_ms: Option<f64>,
}

pub async fn run(args: DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    let conn = open(&args).await?;
    let info = conn
        .device_info()
        .await
        .map_err(|err| api_error("device info failed", err))?;
    let ping_latency_ms = conn
        .ping()
        .await
        .ok()
        .map(|d| (d.as_secs_f64() * 1000.0 * 100.0).round() / 100.0);

    let out = InfoOutput {
        api_version: conn
            .api_version()
            .map(|version| version.to_string())
            .unwrap_or_default(),
        server_info: conn.server_info().unwrap_or_default().to_string(),
        ping_latency_ms,
        ..InfoOutput::from(info)
    };
    close(conn).await;

    print_info(&out, format);
    Ok(SUCCESS)
}

impl From<DeviceInfo> for InfoOutput {
    fn from(info: DeviceInfo) -> Self {
        let project = (!info.project_name.is_empty())
            .then(|| format!("{} {}", info.project_name, info.project_version));
        Self {
            name: info.name,
            friendly_name: info.friendly_name,
            api_version: String::new(),
            server_info: String::new(),
            esphome_version: info.esphome_version,
            compilation_time: info.compilation_time,
            model: info.model,
            manufacturer: info.manufacturer,
            mac_address: info.mac_address,
            project,
            suggested_area: info.suggested_area,
            uses_password: info.uses_password,
            has_deep_sleep: info.has_deep_sleep,
            webserver_port: (info.webserver_port != 0).then_some(info.webserver_port),
            ping_latency_ms: None,
        }
    }
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = table(vec!["FIELD", "VALUE"]);
            for (field, value) in rows(out) {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Device Info:");
            for (field, value) in rows(out) {
                println!("  {:<18}{value}", format!("{field}:"));
            }
        }
    }
}

fn rows(out: &InfoOutput) -> Vec<(&'static str, String)> {
    vec![
        ("Name", out.name.clone()),
        ("Friendly name", out.friendly_name.clone()),
        ("API version", out.api_version.clone()),
        ("Server", out.server_info.clone()),
        ("ESPHome", out.esphome_version.clone()),
        ("Compiled", out.compilation_time.clone()),
        ("Model", out.model.clone()),
        ("Manufacturer", out.manufacturer.clone()),
        ("MAC", out.mac_address.clone()),
        ("Project", out.project.clone().unwrap_or_else(|| "-".to_string())),
        ("Area", out.suggested_area.clone()),
        ("Password", out.uses_password.to_string()),
        ("Deep sleep", out.has_deep_sleep.to_string()),
        (
            "Web server",
            out.webserver_port
                .map(|port| port.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ),
        (
            "Ping",
            out.ping_latency_ms
                .map(|ms| format!("{ms:.2}ms"))
                .unwrap_or_else(|| "unavailable".to_string()),
        ),
    ]
}
