use esphome_client::LogEntry;
use serde::Serialize;

use crate::cmd::{close, open, LogsArgs};
use crate::exit::{api_error, CliResult, INTERRUPTED, SUCCESS};
use crate::output::{print_json, strip_ansi, OutputFormat};

#[derive(Serialize)]
struct LogOutput<'a> {
    level: String,
    message: &'a str,
}

pub async fn run(args: LogsArgs, format: OutputFormat) -> CliResult<i32> {
    let conn = open(&args.device).await?;
    let mut logs = conn
        .subscribe_logs(args.level.into(), args.dump_config)
        .await
        .map_err(|err| api_error("subscribing to logs failed", err))?;

    let mut printed = 0usize;
    while args.count.is_none_or(|count| printed < count) {
        let entry = tokio::select! {
            entry = logs.next() => entry,
            _ = tokio::signal::ctrl_c() => {
                close(conn).await;
                return Ok(INTERRUPTED);
            }
        };
        let Some(entry) = entry else {
            return Err(api_error("log stream ended", logs.end_reason()));
        };
        print_log(&entry, format);
        printed = printed.saturating_add(1);
    }

    close(conn).await;
    Ok(SUCCESS)
}

fn print_log(entry: &LogEntry, format: OutputFormat) {
    let message = strip_ansi(&entry.message);
    match format {
        OutputFormat::Json => print_json(&LogOutput {
            level: format!("{:?}", entry.level).to_lowercase(),
            message: &message,
        }),
        OutputFormat::Table | OutputFormat::Pretty => println!("{message}"),
    }
}
