use esphome_client::EntityState;
use serde::Serialize;

use crate::cmd::{close, open, StatesArgs};
use crate::exit::{api_error, CliResult, INTERRUPTED, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct StateOutput {
    key: u32,
    kind: &'static str,
    state: String,
}

impl From<&EntityState> for StateOutput {
    fn from(state: &EntityState) -> Self {
        let (kind, value) = match state {
            EntityState::BinarySensor { state, .. } => ("binary_sensor", optional(state)),
            EntityState::Cover { position, tilt, .. } => {
                ("cover", format!("position={position} tilt={tilt}"))
            }
            EntityState::Fan {
                state,
                oscillating,
                speed_level,
                ..
            } => (
                "fan",
                format!("{} speed={speed_level} oscillating={oscillating}", on_off(*state)),
            ),
            EntityState::Light(light) => (
                "light",
                format!(
                    "{} brightness={:.2} rgb=({:.2},{:.2},{:.2}) effect={:?}",
                    on_off(light.state),
                    light.brightness,
                    light.red,
                    light.green,
                    light.blue,
                    light.effect
                ),
            ),
            EntityState::Sensor { state, .. } => ("sensor", optional(state)),
            EntityState::Switch { state, .. } => ("switch", on_off(*state).to_string()),
            EntityState::TextSensor { state, .. } => ("text_sensor", optional(state)),
        };
        Self {
            key: state.key(),
            kind,
            state: value,
        }
    }
}

fn on_off(state: bool) -> &'static str {
    if state {
        "on"
    } else {
        "off"
    }
}

fn optional<T: ToString>(state: &Option<T>) -> String {
    state
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn run(args: StatesArgs, format: OutputFormat) -> CliResult<i32> {
    let conn = open(&args.device).await?;
    let mut states = conn
        .subscribe_states()
        .await
        .map_err(|err| api_error("subscribing to states failed", err))?;

    let mut printed = 0usize;
    while args.count.is_none_or(|count| printed < count) {
        let update = tokio::select! {
            update = states.next() => update,
            _ = tokio::signal::ctrl_c() => {
                close(conn).await;
                return Ok(INTERRUPTED);
            }
        };
        let Some(update) = update else {
            return Err(api_error("state stream ended", states.end_reason()));
        };
        if let Some(keys) = &args.keys {
            if !keys.contains(&update.key()) {
                continue;
            }
        }

        let out = StateOutput::from(&update);
        match format {
            OutputFormat::Json => print_json(&out),
            OutputFormat::Table | OutputFormat::Pretty => {
                println!("{} {} {}", out.kind, out.key, out.state)
            }
        }
        printed = printed.saturating_add(1);
    }

    close(conn).await;
    Ok(SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sensor_state_is_unknown() {
        let out = StateOutput::from(&EntityState::Sensor { key: 3, state: None });
        assert_eq!((out.kind, out.key, out.state.as_str()), ("sensor", 3, "unknown"));
    }

    #[test]
    fn switch_state_is_on_off() {
        let out = StateOutput::from(&EntityState::Switch { key: 7, state: true });
        assert_eq!(out.state, "on");
    }
}
