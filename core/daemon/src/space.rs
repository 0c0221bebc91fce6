//! Public space status document.
//!
//! The daemon serves a Space API style JSON document at `/` describing the
//! space and its current door state. Everything except the door state
//! comes from an optional TOML config file; a missing file or flag falls
//! back to neutral defaults so the daemon still boots.

use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;

use doorstate_core::{DerivedState, DoorStatus};

const SPACE_API_VERSION: &str = "0.13";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    pub space: String,
    pub url: String,
    pub logo: String,
    pub address: String,
    pub lat: f64,
    pub lon: f64,
    pub phone: String,
    pub email: String,
    /// Static message shown under `state.message`, e.g. opening-hours
    /// hints.
    pub message: String,
    pub open_icon: String,
    pub closed_icon: String,
    pub issue_report_channels: Vec<String>,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            space: "Unconfigured space".to_string(),
            url: String::new(),
            logo: String::new(),
            address: String::new(),
            lat: 0.0,
            lon: 0.0,
            phone: String::new(),
            email: String::new(),
            message: String::new(),
            open_icon: String::new(),
            closed_icon: String::new(),
            issue_report_channels: vec!["email".to_string()],
        }
    }
}

pub fn load_space_config(path: Option<PathBuf>) -> Result<SpaceConfig, String> {
    let config_path = match path {
        Some(path) => path,
        None => return Ok(SpaceConfig::default()),
    };

    if !config_path.exists() {
        return Ok(SpaceConfig::default());
    }

    let content = fs_err::read_to_string(&config_path).map_err(|err| {
        format!(
            "Failed to read space config {}: {}",
            config_path.display(),
            err
        )
    })?;
    toml::from_str::<SpaceConfig>(&content).map_err(|err| {
        format!(
            "Failed to parse space config {}: {}",
            config_path.display(),
            err
        )
    })
}

/// Builds the document served at `/`.
///
/// Door fields are duplicated at the top level in the older flat layout
/// some consumers still read, alongside the structured `state` object.
pub fn space_document(config: &SpaceConfig, status: &DoorStatus) -> Value {
    let open = open_value(status.state);
    let icon = json!({
        "open": config.open_icon,
        "closed": config.closed_icon,
    });

    json!({
        "api": SPACE_API_VERSION,
        "space": config.space,
        "logo": config.logo,
        "url": config.url,
        "address": config.address,
        "lat": config.lat,
        "lon": config.lon,
        "open": open,
        "lastchange": status.time,
        "phone": config.phone,
        "location": {
            "address": config.address,
            "lat": config.lat,
            "lon": config.lon,
        },
        "contact": {
            "phone": config.phone,
            "email": config.email,
        },
        "issue_report_channels": config.issue_report_channels,
        "state": {
            "open": open,
            "lastchange": status.time,
            "message": config.message,
            "icon": icon,
        },
        "icon": icon,
    })
}

fn open_value(state: DerivedState) -> Value {
    match state {
        DerivedState::Unknown => Value::Null,
        DerivedState::Open => Value::Bool(true),
        DerivedState::Closed => Value::Bool(false),
    }
}
