//! User-facing values built from decoded protocol messages.

use std::fmt;
use std::time::Duration;

use esphome_proto::api;
use esphome_proto::Message;

pub use esphome_proto::api::{ColorMode, EntityCategory, LogLevel};

/// Protocol version reported by the device during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// What the device said about itself in the `HelloResponse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloInfo {
    pub api_version: ApiVersion,
    pub name: String,
    pub server_info: String,
}

impl From<api::HelloResponse> for HelloInfo {
    fn from(hello: api::HelloResponse) -> Self {
        Self {
            api_version: ApiVersion {
                major: hello.api_version_major,
                minor: hello.api_version_minor,
            },
            name: hello.name,
            server_info: hello.server_info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    pub uses_password: bool,
    pub has_deep_sleep: bool,
    pub name: String,
    pub friendly_name: String,
    pub mac_address: String,
    pub compilation_time: String,
    pub model: String,
    pub manufacturer: String,
    pub esphome_version: String,
    pub project_name: String,
    pub project_version: String,
    pub webserver_port: u16,
    pub suggested_area: String,
}

impl From<api::DeviceInfoResponse> for DeviceInfo {
    fn from(info: api::DeviceInfoResponse) -> Self {
        Self {
            uses_password: info.uses_password,
            has_deep_sleep: info.has_deep_sleep,
            name: info.name,
            friendly_name: info.friendly_name,
            mac_address: info.mac_address,
            compilation_time: info.compilation_time,
            model: info.model,
            manufacturer: info.manufacturer,
            esphome_version: info.esphome_version,
            project_name: info.project_name,
            project_version: info.project_version,
            webserver_port: u16::try_from(info.webserver_port).unwrap_or(0),
            suggested_area: info.suggested_area,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    BinarySensor,
    Cover,
    Fan,
    Light,
    Sensor,
    Switch,
    TextSensor,
    Service,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BinarySensor => "binary_sensor",
            Self::Cover => "cover",
            Self::Fan => "fan",
            Self::Light => "light",
            Self::Sensor => "sensor",
            Self::Switch => "switch",
            Self::TextSensor => "text_sensor",
            Self::Service => "service",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific part of an [`EntityInfo`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EntityDetails {
    #[default]
    None,
    Light {
        min_mireds: f32,
        max_mireds: f32,
        supported_color_modes: Vec<ColorMode>,
        effects: Vec<String>,
    },
    Sensor {
        unit_of_measurement: String,
        accuracy_decimals: i32,
        device_class: String,
    },
    Service {
        args: Vec<String>,
    },
}

/// One entity announced by the device during `list_entities`.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInfo {
    pub kind: EntityKind,
    pub object_id: String,
    pub key: u32,
    pub name: String,
    pub unique_id: String,
    pub disabled_by_default: bool,
    pub icon: String,
    pub category: EntityCategory,
    pub details: EntityDetails,
}

impl EntityInfo {
    /// Build from a list-entities response; `None` for any other message.
    pub fn from_message(message: &Message) -> Option<Self> {
        let info = match message {
            Message::ListEntitiesBinarySensorResponse(m) => Self::base(
                EntityKind::BinarySensor,
                &m.object_id,
                m.key,
                &m.name,
                &m.unique_id,
                m.disabled_by_default,
                &m.icon,
                m.entity_category,
            ),
            Message::ListEntitiesCoverResponse(m) => Self::base(
                EntityKind::Cover,
                &m.object_id,
                m.key,
                &m.name,
                &m.unique_id,
                m.disabled_by_default,
                &m.icon,
                m.entity_category,
            ),
            Message::ListEntitiesFanResponse(m) => Self::base(
                EntityKind::Fan,
                &m.object_id,
                m.key,
                &m.name,
                &m.unique_id,
                m.disabled_by_default,
                &m.icon,
                m.entity_category,
            ),
            Message::ListEntitiesLightResponse(m) => Self {
                details: EntityDetails::Light {
                    min_mireds: m.min_mireds,
                    max_mireds: m.max_mireds,
                    supported_color_modes: m
                        .supported_color_modes
                        .iter()
                        .map(|&mode| color_mode(mode))
                        .collect(),
                    effects: m.effects.clone(),
                },
                ..Self::base(
                    EntityKind::Light,
                    &m.object_id,
                    m.key,
                    &m.name,
                    &m.unique_id,
                    m.disabled_by_default,
                    &m.icon,
                    m.entity_category,
                )
            },
            Message::ListEntitiesSensorResponse(m) => Self {
                details: EntityDetails::Sensor {
                    unit_of_measurement: m.unit_of_measurement.clone(),
                    accuracy_decimals: m.accuracy_decimals,
                    device_class: m.device_class.clone(),
                },
                ..Self::base(
                    EntityKind::Sensor,
                    &m.object_id,
                    m.key,
                    &m.name,
                    &m.unique_id,
                    m.disabled_by_default,
                    &m.icon,
                    m.entity_category,
                )
            },
            Message::ListEntitiesSwitchResponse(m) => Self::base(
                EntityKind::Switch,
                &m.object_id,
                m.key,
                &m.name,
                &m.unique_id,
                m.disabled_by_default,
                &m.icon,
                m.entity_category,
            ),
            Message::ListEntitiesTextSensorResponse(m) => Self::base(
                EntityKind::TextSensor,
                &m.object_id,
                m.key,
                &m.name,
                &m.unique_id,
                m.disabled_by_default,
                &m.icon,
                m.entity_category,
            ),
            Message::ListEntitiesServicesResponse(m) => Self {
                details: EntityDetails::Service {
                    args: m.args.iter().map(|arg| arg.name.clone()).collect(),
                },
                ..Self::base(EntityKind::Service, "", m.key, &m.name, "", false, "", 0)
            },
            _ => return None,
        };
        Some(info)
    }

    #[allow(clippy::too_many_arguments)]
    fn base(
        kind: EntityKind,
        object_id: &str,
        key: u32,
        name: &str,
        unique_id: &str,
        disabled_by_default: bool,
        icon: &str,
        category: i32,
    ) -> Self {
        Self {
            kind,
            object_id: object_id.to_string(),
            key,
            name: name.to_string(),
            unique_id: unique_id.to_string(),
            disabled_by_default,
            icon: icon.to_string(),
            category: EntityCategory::try_from(category).unwrap_or(EntityCategory::None),
            details: EntityDetails::None,
        }
    }
}

fn color_mode(raw: i32) -> ColorMode {
    ColorMode::try_from(raw).unwrap_or(ColorMode::Unknown)
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LightState {
    pub key: u32,
    pub state: bool,
    pub brightness: f32,
    pub color_mode: Option<ColorMode>,
    pub color_brightness: f32,
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    pub white: f32,
    pub color_temperature: f32,
    pub cold_white: f32,
    pub warm_white: f32,
    pub effect: String,
}

impl From<&api::LightStateResponse> for LightState {
    fn from(m: &api::LightStateResponse) -> Self {
        Self {
            key: m.key,
            state: m.state,
            brightness: m.brightness,
            color_mode: Some(color_mode(m.color_mode)),
            color_brightness: m.color_brightness,
            red: m.red,
            green: m.green,
            blue: m.blue,
            white: m.white,
            color_temperature: m.color_temperature,
            cold_white: m.cold_white,
            warm_white: m.warm_white,
            effect: m.effect.clone(),
        }
    }
}

/// A state update pushed by the device.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityState {
    BinarySensor { key: u32, state: Option<bool> },
    Cover { key: u32, position: f32, tilt: f32 },
    Fan { key: u32, state: bool, oscillating: bool, speed_level: i32 },
    Light(LightState),
    Sensor { key: u32, state: Option<f32> },
    Switch { key: u32, state: bool },
    TextSensor { key: u32, state: Option<String> },
}

impl EntityState {
    /// Build from a state response; `None` for any other message.
    pub fn from_message(message: &Message) -> Option<Self> {
        let state = match message {
            Message::BinarySensorStateResponse(m) => Self::BinarySensor {
                key: m.key,
                state: (!m.missing_state).then_some(m.state),
            },
            Message::CoverStateResponse(m) => Self::Cover {
                key: m.key,
                position: m.position,
                tilt: m.tilt,
            },
            Message::FanStateResponse(m) => Self::Fan {
                key: m.key,
                state: m.state,
                oscillating: m.oscillating,
                speed_level: m.speed_level,
            },
            Message::LightStateResponse(m) => Self::Light(m.into()),
            Message::SensorStateResponse(m) => Self::Sensor {
                key: m.key,
                state: (!m.missing_state).then_some(m.state),
            },
            Message::SwitchStateResponse(m) => Self::Switch {
                key: m.key,
                state: m.state,
            },
            Message::TextSensorStateResponse(m) => Self::TextSensor {
                key: m.key,
                state: (!m.missing_state).then(|| m.state.clone()),
            },
            _ => return None,
        };
        Some(state)
    }

    pub fn key(&self) -> u32 {
        match self {
            Self::BinarySensor { key, .. }
            | Self::Cover { key, .. }
            | Self::Fan { key, .. }
            | Self::Sensor { key, .. }
            | Self::Switch { key, .. }
            | Self::TextSensor { key, .. } => *key,
            Self::Light(light) => light.key,
        }
    }
}

/// One line of device log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn from_message(message: &Message) -> Option<Self> {
        match message {
            Message::SubscribeLogsResponse(m) => Some(Self {
                level: LogLevel::try_from(m.level).unwrap_or(LogLevel::None),
                message: String::from_utf8_lossy(&m.message).into_owned(),
            }),
            _ => None,
        }
    }
}

/// Command for a light entity. Unset fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LightCommand {
    pub key: u32,
    pub state: Option<bool>,
    pub brightness: Option<f32>,
    pub rgb: Option<(f32, f32, f32)>,
    pub color_mode: Option<ColorMode>,
    pub transition: Option<Duration>,
    pub effect: Option<String>,
}

impl LightCommand {
    pub fn new(key: u32) -> Self {
        Self {
            key,
            ..Self::default()
        }
    }

    pub fn state(mut self, on: bool) -> Self {
        self.state = Some(on);
        self
    }

    pub fn brightness(mut self, brightness: f32) -> Self {
        self.brightness = Some(brightness.clamp(0.0, 1.0));
        self
    }

    pub fn rgb(mut self, red: f32, green: f32, blue: f32) -> Self {
        self.rgb = Some((red, green, blue));
        self
    }

    pub fn color_mode(mut self, mode: ColorMode) -> Self {
        self.color_mode = Some(mode);
        self
    }

    pub fn transition(mut self, transition: Duration) -> Self {
        self.transition = Some(transition);
        self
    }

    pub fn effect(mut self, effect: impl Into<String>) -> Self {
        self.effect = Some(effect.into());
        self
    }
}

impl From<LightCommand> for api::LightCommandRequest {
    fn from(command: LightCommand) -> Self {
        let mut request = api::LightCommandRequest {
            key: command.key,
            ..Default::default()
        };
        if let Some(state) = command.state {
            request.has_state = true;
            request.state = state;
        }
        if let Some(brightness) = command.brightness {
            request.has_brightness = true;
            request.brightness = brightness;
        }
        if let Some((red, green, blue)) = command.rgb {
            request.has_rgb = true;
            request.red = red;
            request.green = green;
            request.blue = blue;
        }
        if let Some(mode) = command.color_mode {
            request.has_color_mode = true;
            request.color_mode = mode as i32;
        }
        if let Some(transition) = command.transition {
            request.has_transition_length = true;
            request.transition_length = u32::try_from(transition.as_millis()).unwrap_or(u32::MAX);
        }
        if let Some(effect) = command.effect {
            request.has_effect = true;
            request.effect = effect;
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn light_entity_conversion() {
        let message = Message::from(api::ListEntitiesLightResponse {
            object_id: "desk".into(),
            key: 42,
            name: "Desk".into(),
            supported_color_modes: vec![ColorMode::Rgb as i32, 999],
            effects: vec!["Pulse".into()],
            entity_category: EntityCategory::Config as i32,
            ..Default::default()
        });

        let info = EntityInfo::from_message(&message).unwrap();
        assert_eq!(info.kind, EntityKind::Light);
        assert_eq!(info.key, 42);
        assert_eq!(info.category, EntityCategory::Config);
        assert_eq!(
            info.details,
            EntityDetails::Light {
                min_mireds: 0.0,
                max_mireds: 0.0,
                supported_color_modes: vec![ColorMode::Rgb, ColorMode::Unknown],
                effects: vec!["Pulse".into()],
            }
        );
    }

    #[test]
    fn non_entity_message_is_not_converted() {
        let message = Message::from(api::ListEntitiesDoneResponse {});
        assert!(EntityInfo::from_message(&message).is_none());
        assert!(EntityState::from_message(&message).is_none());
        assert!(LogEntry::from_message(&message).is_none());
    }

    #[test]
    fn missing_state_maps_to_none() {
        let message = Message::from(api::SensorStateResponse {
            key: 7,
            state: 21.5,
            missing_state: true,
        });
        let state = EntityState::from_message(&message).unwrap();
        assert_eq!(state, EntityState::Sensor { key: 7, state: None });
        assert_eq!(state.key(), 7);
    }

    #[test]
    fn log_entry_tolerates_invalid_utf8() {
        let message = Message::from(api::SubscribeLogsResponse {
            level: LogLevel::Warn as i32,
            message: vec![b'o', b'k', 0xFF],
            send_failed: false,
        });
        let entry = LogEntry::from_message(&message).unwrap();
        assert_eq!(entry.level, LogLevel::Warn);
        assert!(entry.message.starts_with("ok"));
    }

    #[test]
    fn light_command_sets_presence_flags() {
        let request = api::LightCommandRequest::from(
            LightCommand::new(42)
                .state(true)
                .brightness(1.5)
                .transition(Duration::from_secs(2))
                .effect("Rainbow"),
        );
        assert_eq!(request.key, 42);
        assert!(request.has_state && request.state);
        assert!(request.has_brightness);
        assert_eq!(request.brightness, 1.0);
        assert!(request.has_transition_length);
        assert_eq!(request.transition_length, 2000);
        assert!(request.has_effect);
        assert_eq!(request.effect, "Rainbow");
        assert!(!request.has_rgb);
        assert!(!request.has_color_mode);
    }

    #[test]
    fn effect_only_command() {
        let request = api::LightCommandRequest::from(LightCommand::new(3).effect("None"));
        assert!(!request.has_state);
        assert!(request.has_effect);
    }

    #[test]
    fn api_version_display() {
        assert_eq!(ApiVersion { major: 1, minor: 9 }.to_string(), "1.9");
    }
}
