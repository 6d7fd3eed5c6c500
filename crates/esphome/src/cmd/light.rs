use esphome_client::LightCommand;

use crate::cmd::{close, open, parse_duration, LightArgs};
use crate::exit::{api_error, CliError, CliResult, SUCCESS, USAGE};

pub async fn run(args: LightArgs) -> CliResult<i32> {
    let command = build_command(&args)?;
    let conn = open(&args.device).await?;
    conn.light_command(command)
        .await
        .map_err(|err| api_error("light command failed", err))?;
    close(conn).await;
    Ok(SUCCESS)
}

fn build_command(args: &LightArgs) -> CliResult<LightCommand> {
    let mut command = LightCommand::new(args.key);
    if args.on || args.off {
        command = command.state(args.on);
    }
    if let Some(brightness) = args.brightness {
        command = command.brightness(brightness);
    }
    if let Some(rgb) = &args.rgb {
        let [red, green, blue] = rgb[..] else {
            return Err(CliError::new(USAGE, "--rgb takes exactly three components"));
        };
        command = command.rgb(red, green, blue);
    }
    if let Some(transition) = &args.transition {
        command = command.transition(parse_duration(transition)?);
    }
    if let Some(effect) = &args.effect {
        command = command.effect(effect.as_str());
    }
    Ok(command)
}
