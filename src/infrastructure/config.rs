use crate::domain::color::Palette;
use crate::domain::slots::TimeFormat;
use crate::infrastructure::error::PlannerError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const PLANNER_JSON: &str = "planner.json";

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub schema: u8,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigBundle {
    pub app: serde_json::Value,
    pub planner: serde_json::Value,
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    let palette =
        serde_json::to_value(Palette::default()).unwrap_or_else(|_| serde_json::json!({}));
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "DayPlan",
                "timezone": "UTC",
                "timeFormat": "24h"
            }),
        ),
        (
            PLANNER_JSON,
            serde_json::json!({
                "schema": 1,
                "reminders": {
                    "defaultLeadMinutes": 10,
                    "evaluationIntervalSeconds": 30
                },
                "palette": palette
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), PlannerError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, PlannerError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| {
            PlannerError::InvalidConfig(format!("missing schema in {}", path.display()))
        })?;
    if schema != 1 {
        return Err(PlannerError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_configs(config_dir: &Path) -> Result<ConfigBundle, PlannerError> {
    Ok(ConfigBundle {
        app: read_config(&config_dir.join(APP_JSON))?,
        planner: read_config(&config_dir.join(PLANNER_JSON))?,
    })
}

pub fn read_timezone(config_dir: &Path) -> Result<Option<String>, PlannerError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    Ok(app
        .get("timezone")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned))
}

pub fn read_time_format(config_dir: &Path) -> Result<TimeFormat, PlannerError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    Ok(app
        .get("timeFormat")
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default())
}

pub fn save_time_format(config_dir: &Path, format: TimeFormat) -> Result<(), PlannerError> {
    let path = config_dir.join(APP_JSON);
    let mut app = read_config(&path)?;
    let object = app.as_object_mut().ok_or_else(|| {
        PlannerError::InvalidConfig(format!("invalid object structure in {}", path.display()))
    })?;
    object.insert("timeFormat".to_string(), serde_json::to_value(format)?);
    let formatted = serde_json::to_string_pretty(&app)?;
    fs::write(path, format!("{formatted}\n"))?;
    Ok(())
}

pub fn load_palette(config_dir: &Path) -> Result<Palette, PlannerError> {
    let planner = read_config(&config_dir.join(PLANNER_JSON))?;
    match planner.get("palette") {
        Some(value) => Ok(serde_json::from_value(value.clone())?),
        None => Ok(Palette::default()),
    }
}
