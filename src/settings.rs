//! Runtime settings.
//!
//! Sources are layered with the `config` crate, later ones winning:
//!
//! 1. an optional file (`--config`, TOML/YAML/JSON by extension)
//! 2. the process environment (`PULSE_MULTIPLIER`, `GPIO_PIN`, ...)
//! 3. command-line overrides
//!
//! Every key is optional. Values are parsed leniently: a malformed value is
//! logged and replaced by its default, never a startup failure.
//!
//! ```toml
//! pulse_multiplier = 0.5
//! gpio_pin = 37
//! bounce_time = 200
//! mqtt_address = "mqtt:1883"
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, ConfigError, Environment, File};
use pulsemeter_sdk::PULL_PORT;
use serde::Deserialize;
use tracing::warn;

/// Default multiplier.
pub const DEFAULT_MULTIPLIER: f64 = 1.0;
/// Default pulse input, physical header pin.
pub const DEFAULT_GPIO_PIN: u8 = 37;
/// Default reset input, physical header pin.
pub const DEFAULT_RESET_PIN: u8 = 38;
/// Default debounce in milliseconds.
pub const DEFAULT_BOUNCE_MS: u64 = 200;

/// Which resistor the pulse input uses, and so which level is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    /// Pull-down: idle low, a pulse drives the line high.
    #[default]
    Down,
    /// Pull-up: idle high, a pulse drives the line low.
    Up,
}

impl Polarity {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "UP" => Some(Polarity::Up),
            "DOWN" => Some(Polarity::Down),
            _ => None,
        }
    }
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Scale factor for the `*_mult` snapshot fields.
    pub multiplier: f64,
    /// Pulse input, physical header pin.
    pub gpio_pin: u8,
    /// Reset input, physical header pin.
    pub reset_pin: u8,
    /// Debounce applied to each pulse edge. Zero disables it.
    pub debounce: Duration,
    /// Pulse input resistor and active level.
    pub polarity: Polarity,
    /// Broker `host[:port]`, `None` when no broker is configured.
    pub broker: Option<String>,
    /// Serve the pull sink even when the broker is connected.
    pub force_pull: bool,
    /// Device identifier stamped on snapshots.
    pub uuid: String,
    /// Pull-sink TCP port.
    pub pull_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            multiplier: DEFAULT_MULTIPLIER,
            gpio_pin: DEFAULT_GPIO_PIN,
            reset_pin: DEFAULT_RESET_PIN,
            debounce: Duration::from_millis(DEFAULT_BOUNCE_MS),
            polarity: Polarity::Down,
            broker: None,
            force_pull: false,
            uuid: default_uuid(),
            pull_port: PULL_PORT,
        }
    }
}

/// Values given on the command line. They take precedence over every other
/// source.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub broker: Option<String>,
    pub force_pull: bool,
    pub multiplier: Option<f64>,
    pub debounce_ms: Option<u64>,
}

/// Raw values as the sources provide them, all strings so that one bad key
/// cannot fail the whole load.
#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    pulse_multiplier: Option<String>,
    gpio_pin: Option<String>,
    gpio_reset_pin: Option<String>,
    bounce_time: Option<String>,
    pull_up_down: Option<String>,
    mqtt_address: Option<String>,
    always_use_webserver: Option<String>,
    balena_device_uuid: Option<String>,
    webserver_port: Option<String>,
}

impl Settings {
    /// Load from an optional file, the environment and `overrides`.
    pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(Environment::default());
        builder = apply_overrides(builder, overrides)?;

        Self::from_config(&builder.build()?)
    }

    /// Resolve settings from an already built [`Config`].
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let raw: RawSettings = config.clone().try_deserialize()?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawSettings) -> Self {
        let multiplier = match parse_key("PULSE_MULTIPLIER", raw.pulse_multiplier.as_deref()) {
            Some(m) if f64::is_finite(m) && m >= 0.0 => m,
            Some(m) => {
                warn!(
                    key = "PULSE_MULTIPLIER",
                    value = m,
                    "Multiplier must be finite and non-negative, using default"
                );
                DEFAULT_MULTIPLIER
            }
            None => DEFAULT_MULTIPLIER,
        };

        // An unparseable debounce disables debouncing rather than guessing
        let debounce = match raw.bounce_time.as_deref() {
            None => Duration::from_millis(DEFAULT_BOUNCE_MS),
            Some(value) => match value.trim().parse::<u64>() {
                Ok(ms) => Duration::from_millis(ms),
                Err(_) => {
                    warn!(key = "BOUNCE_TIME", value, "Malformed debounce, disabling");
                    Duration::ZERO
                }
            },
        };

        let polarity = match raw.pull_up_down.as_deref() {
            None => Polarity::Down,
            Some(value) => Polarity::parse(value).unwrap_or_else(|| {
                warn!(key = "PULL_UP_DOWN", value, "Expected UP or DOWN, using DOWN");
                Polarity::Down
            }),
        };

        let broker = raw
            .mqtt_address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty() && !a.eq_ignore_ascii_case("none"));

        let uuid = raw
            .balena_device_uuid
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(default_uuid);

        Self {
            multiplier,
            gpio_pin: parse_key("GPIO_PIN", raw.gpio_pin.as_deref()).unwrap_or(DEFAULT_GPIO_PIN),
            reset_pin: parse_key("GPIO_RESET_PIN", raw.gpio_reset_pin.as_deref())
                .unwrap_or(DEFAULT_RESET_PIN),
            debounce,
            polarity,
            broker,
            force_pull: parse_flag("ALWAYS_USE_WEBSERVER", raw.always_use_webserver.as_deref()),
            uuid,
            pull_port: parse_key("WEBSERVER_PORT", raw.webserver_port.as_deref())
                .unwrap_or(PULL_PORT),
        }
    }
}

fn apply_overrides(
    mut builder: ConfigBuilder<DefaultState>,
    overrides: &Overrides,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    if let Some(broker) = &overrides.broker {
        builder = builder.set_override("mqtt_address", broker.as_str())?;
    }
    if overrides.force_pull {
        builder = builder.set_override("always_use_webserver", "true")?;
    }
    if let Some(m) = overrides.multiplier {
        builder = builder.set_override("pulse_multiplier", m.to_string())?;
    }
    if let Some(ms) = overrides.debounce_ms {
        builder = builder.set_override("bounce_time", ms.to_string())?;
    }
    Ok(builder)
}

/// Parse a present value, warning and returning `None` if it is malformed.
fn parse_key<T: FromStr>(key: &str, raw: Option<&str>) -> Option<T> {
    let value = raw?.trim();
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value, "Malformed value, using default");
            None
        }
    }
}

/// `1/true/yes/on` in any case. Anything else is false.
fn parse_flag(key: &str, raw: Option<&str>) -> bool {
    let Some(value) = raw.map(str::trim) else {
        return false;
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "" | "0" | "false" | "no" | "off" => false,
        _ => {
            warn!(key, value, "Unrecognized boolean, treating as false");
            false
        }
    }
}

fn default_uuid() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
