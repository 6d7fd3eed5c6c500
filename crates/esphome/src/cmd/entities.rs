use esphome_client::{EntityDetails, EntityInfo};
use serde::Serialize;

use crate::cmd::{close, open, DeviceArgs};
use crate::exit::{api_error, CliResult, SUCCESS};
use crate::output::{print_json, table, OutputFormat};

#[derive(Serialize)]
struct EntityOutput {
    kind: &'static str,
    key: u32,
    object_id: String,
    name: String,
    category: String,
    disabled_by_default: bool,
    details: String,
}

impl From<&EntityInfo> for EntityOutput {
    fn from(entity: &EntityInfo) -> Self {
        Self {
            kind: entity.kind.as_str(),
            key: entity.key,
            object_id: entity.object_id.clone(),
            name: entity.name.clone(),
            category: format!("{:?}", entity.category).to_lowercase(),
            disabled_by_default: entity.disabled_by_default,
            details: details(&entity.details),
        }
    }
}

pub async fn run(args: DeviceArgs, format: OutputFormat) -> CliResult<i32> {
    let conn = open(&args).await?;
    let entities = conn
        .list_entities()
        .await
        .map_err(|err| api_error("listing entities failed", err))?;
    close(conn).await;

    let out: Vec<EntityOutput> = entities.iter().map(EntityOutput::from).collect();
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = table(vec!["KIND", "KEY", "OBJECT ID", "NAME", "DETAILS"]);
            for entity in &out {
                table.add_row(vec![
                    entity.kind.to_string(),
                    entity.key.to_string(),
                    entity.object_id.clone(),
                    entity.name.clone(),
                    entity.details.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for entity in &out {
                println!(
                    "{} {} key={} name={:?} {}",
                    entity.kind, entity.object_id, entity.key, entity.name, entity.details
                );
            }
        }
    }
    Ok(SUCCESS)
}

fn details(details: &EntityDetails) -> String {
    match details {
        EntityDetails::None => String::new(),
        EntityDetails::Light {
            supported_color_modes,
            effects,
            ..
        } => {
            let modes: Vec<String> = supported_color_modes
                .iter()
                .map(|mode| format!("{mode:?}"))
                .collect();
            format!("modes=[{}] effects=[{}]", modes.join(","), effects.join(","))
        }
        EntityDetails::Sensor {
            unit_of_measurement,
            accuracy_decimals,
            device_class,
        } => format!(
            "unit={unit_of_measurement} decimals={accuracy_decimals} class={device_class}"
        ),
        EntityDetails::Service { args } => format!("args=[{}]", args.join(",")),
    }
}
