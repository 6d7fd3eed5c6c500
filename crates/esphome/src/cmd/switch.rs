use crate::cmd::{close, open, SwitchArgs};
use crate::exit::{api_error, CliResult, SUCCESS};

pub async fn run(args: SwitchArgs) -> CliResult<i32> {
    let conn = open(&args.device).await?;
    conn.switch_command(args.key, args.on)
        .await
        .map_err(|err| api_error("switch command failed", err))?;
    close(conn).await;
    Ok(SUCCESS)
}
