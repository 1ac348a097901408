use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::finalize::{stadium_by_name, StadiumRules};
use crate::input::{Binding, KeyBindings};
use crate::navigator::Timing;
use crate::Result;

const OPTIONS_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MiiOptions {
    pub database_path: String,
}

impl Default for MiiOptions {
    fn default() -> Self {
        Self {
            database_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultCaptains {
    #[serde(rename = "awayCaptainID")]
    pub away_captain_id: u16,
    #[serde(rename = "homeCaptainID")]
    pub home_captain_id: u16,
}

impl Default for DefaultCaptains {
    fn default() -> Self {
        Self {
            away_captain_id: 0,
            home_captain_id: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AutomationOptions {
    pub auto_start_game: bool,
    /// Seconds a key is held.
    pub input_delay: f64,
    /// Seconds after each release.
    pub release_delay: f64,
}

impl Default for AutomationOptions {
    fn default() -> Self {
        Self {
            auto_start_game: false,
            input_delay: 0.05,
            release_delay: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlOptions {
    pub up: String,
    pub down: String,
    pub left: String,
    pub right: String,
    pub a_button: String,
    pub b_button: String,
    pub minus_button: String,
}

impl Default for ControlOptions {
    fn default() -> Self {
        Self {
            up: "w".into(),
            down: "s".into(),
            left: "a".into(),
            right: "d".into(),
            a_button: "k".into(),
            b_button: "l".into(),
            minus_button: "q".into(),
        }
    }
}

/// Last selections, restored the next time the tool starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UiState {
    pub last_away_team: String,
    pub last_home_team: String,
    pub last_stadium: String,
    pub last_day_night: String,
    pub last_innings: u8,
    pub last_mercy: String,
    pub last_stars: String,
    pub last_items: String,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            last_away_team: String::new(),
            last_home_team: String::new(),
            last_stadium: "Mario Stadium".into(),
            last_day_night: "Day".into(),
            last_innings: 9,
            last_mercy: "On".into(),
            last_stars: "On".into(),
            last_items: "Off".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub version: u32,
    pub mii: MiiOptions,
    pub defaults: DefaultCaptains,
    pub automation: AutomationOptions,
    pub controls: ControlOptions,
    pub ui: UiState,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            version: OPTIONS_VERSION,
            mii: MiiOptions::default(),
            defaults: DefaultCaptains::default(),
            automation: AutomationOptions::default(),
            controls: ControlOptions::default(),
            ui: UiState::default(),
        }
    }
}

fn is_on(value: &str) -> bool {
    value.eq_ignore_ascii_case("on")
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl Options {
    pub fn default_path() -> Option<PathBuf> {
        let mut base = dirs::config_dir().or_else(dirs::data_dir)?;
        base.push("MSS-AutoTeam");
        base.push("options.json");
        Some(base)
    }

    /// Load options, creating, migrating or repairing the file as needed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let options = Options::default();
            options.save(path)?;
            info!("created new options file: {}", path.display());
            return Ok(options);
        }

        let text = fs::read_to_string(path)?;
        let value: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                warn!("error parsing {}: {}; using defaults", path.display(), e);
                let backup = path.with_extension("json.backup");
                if let Err(e) = fs::rename(path, &backup) {
                    warn!("could not back up options file: {}", e);
                } else {
                    info!("backed up corrupt options to {}", backup.display());
                }
                let options = Options::default();
                options.save(path)?;
                return Ok(options);
            }
        };

        let is_current = value.get("version").is_some()
            && value.get("mii").map_or(false, Value::is_object);
        if !is_current {
            info!("migrating legacy options format");
            let options = Options::from_legacy(&value);
            options.save(path)?;
            return Ok(options);
        }

        Ok(Options::merged(&value))
    }

    /// Stored values over defaults, one field at a time. A field whose value
    /// has the wrong shape keeps its default.
    pub fn merged(value: &Value) -> Self {
        let version = value
            .get("version")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(OPTIONS_VERSION);

        Options {
            version,
            mii: merge_section(value, "mii"),
            defaults: merge_section(value, "defaults"),
            automation: merge_section(value, "automation"),
            controls: merge_section(value, "controls"),
            ui: merge_section(value, "ui"),
        }
    }

    /// Translate the flat pre-versioned layout.
    pub fn from_legacy(legacy: &Value) -> Self {
        let mut options = Options::default();

        if let Some(p) = legacy.get("MiiDBPath").and_then(Value::as_str) {
            options.mii.database_path = p.to_string();
        }
        if let Some(id) = legacy.get("DefaultAwayCaptainID").and_then(legacy_int) {
            options.defaults.away_captain_id = id;
        }
        if let Some(id) = legacy.get("DefaultHomeCaptainID").and_then(legacy_int) {
            options.defaults.home_captain_id = id;
        }
        if let Some(v) = legacy.get("AutoStartGame") {
            options.automation.auto_start_game = match v {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_i64().map_or(false, |n| n != 0),
                Value::String(s) => !s.is_empty(),
                _ => false,
            };
        }

        options
    }

    /// Write atomically: a temporary file next to `path`, then a rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        if let Err(e) = fs::write(&tmp, data).and_then(|_| fs::rename(&tmp, path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    pub fn timing(&self) -> Timing {
        Timing {
            input_delay: seconds(self.automation.input_delay),
            release_delay: seconds(self.automation.release_delay),
            ..Timing::default()
        }
    }

    pub fn key_bindings(&self) -> KeyBindings {
        let c = &self.controls;
        KeyBindings {
            up: Binding::parse(&c.up),
            down: Binding::parse(&c.down),
            left: Binding::parse(&c.left),
            right: Binding::parse(&c.right),
            a_button: Binding::parse(&c.a_button),
            b_button: Binding::parse(&c.b_button),
            minus_button: Binding::parse(&c.minus_button),
        }
    }

    /// Stadium and rules from the last session.
    pub fn stadium_rules(&self) -> StadiumRules {
        let ui = &self.ui;
        StadiumRules {
            stadium: stadium_by_name(&ui.last_stadium).unwrap_or(0),
            night: u8::from(ui.last_day_night.eq_ignore_ascii_case("night")),
            innings: ui.last_innings,
            mercy: u8::from(is_on(&ui.last_mercy)),
            stars: u8::from(is_on(&ui.last_stars)),
            items: u8::from(is_on(&ui.last_items)),
        }
    }
}

fn merge_section<T>(root: &Value, key: &str) -> T
where
    T: Serialize + DeserializeOwned + Default,
{
    let stored = match root.get(key) {
        None => return T::default(),
        Some(Value::Object(fields)) => fields,
        Some(_) => {
            warn!("options section '{}' is not an object; using defaults", key);
            return T::default();
        }
    };
    let mut merged = match serde_json::to_value(T::default()) {
        Ok(Value::Object(m)) => m,
        _ => return T::default(),
    };

    for (name, v) in stored {
        let previous = merged.insert(name.clone(), v.clone());
        if serde_json::from_value::<T>(Value::Object(merged.clone())).is_err() {
            warn!("ignoring invalid options value {}.{} = {}", key, name, v);
            match previous {
                Some(p) => merged.insert(name.clone(), p),
                None => merged.remove(name),
            };
        }
    }

    serde_json::from_value(Value::Object(merged)).unwrap_or_default()
}

fn legacy_int(v: &Value) -> Option<u16> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("autoteam-config-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir.join("options.json")
    }

    #[test]
    fn creates_defaults_when_missing() {
        let path = scratch("missing");
        let options = Options::load(&path).unwrap();
        assert_eq!(options, Options::default());
        assert!(path.exists());
        assert_eq!(Options::load(&path).unwrap(), options);
    }

    #[test]
    fn migrates_legacy_flat_file() {
        let path = scratch("legacy");
        let legacy = json!({
            "MiiDBPath": "C:/Dolphin/Wii/shared2/menu/FaceLib/RFL_DB.dat",
            "DefaultAwayCaptainID": "9",
            "DefaultHomeCaptainID": 19,
            "AutoStartGame": 1
        });
        fs::write(&path, legacy.to_string()).unwrap();

        let options = Options::load(&path).unwrap();
        assert_eq!(
            options.mii.database_path,
            "C:/Dolphin/Wii/shared2/menu/FaceLib/RFL_DB.dat"
        );
        assert_eq!(options.defaults.away_captain_id, 9);
        assert_eq!(options.defaults.home_captain_id, 19);
        assert!(options.automation.auto_start_game);

        let saved: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["version"], 1);
        assert_eq!(saved["defaults"]["awayCaptainID"], 9);
    }

    #[test]
    fn merges_partial_file_over_defaults() {
        let path = scratch("partial");
        fs::write(
            &path,
            json!({
                "version": 1,
                "mii": { "databasePath": "db.dat" },
                "automation": { "inputDelay": 0.1 },
                "ui": { "lastStadium": "Wario City", "lastDayNight": "Night", "lastItems": "On" }
            })
            .to_string(),
        )
        .unwrap();

        let options = Options::load(&path).unwrap();
        assert_eq!(options.mii.database_path, "db.dat");
        assert_eq!(options.automation.release_delay, 0.05);
        assert_eq!(options.timing().input_delay, Duration::from_millis(100));
        assert_eq!(options.controls, ControlOptions::default());

        let rules = options.stadium_rules();
        assert_eq!(rules.stadium, 2);
        assert_eq!(rules.night, 1);
        assert_eq!(rules.rule_bytes(), [9, 1, 1, 1]);
    }

    #[test]
    fn wrongly_typed_field_keeps_its_default() {
        let path = scratch("mistyped");
        fs::write(
            &path,
            json!({
                "version": 1,
                "mii": { "databasePath": "x" },
                "automation": { "autoStartGame": "yes", "inputDelay": 0.2 },
                "ui": { "lastInnings": "9", "lastStadium": "Yoshi Park" }
            })
            .to_string(),
        )
        .unwrap();

        let options = Options::load(&path).unwrap();
        assert_eq!(options.mii.database_path, "x");
        assert!(!options.automation.auto_start_game);
        assert_eq!(options.automation.input_delay, 0.2);
        assert_eq!(options.ui.last_innings, 9);
        assert_eq!(options.ui.last_stadium, "Yoshi Park");
    }

    #[test]
    fn non_object_section_falls_back() {
        let options = Options::merged(&json!({
            "version": 1,
            "mii": {},
            "controls": "wasd"
        }));
        assert_eq!(options.controls, ControlOptions::default());
    }

    #[test]
    fn backs_up_corrupt_file() {
        let path = scratch("corrupt");
        fs::write(&path, "{ not json").unwrap();

        let options = Options::load(&path).unwrap();
        assert_eq!(options, Options::default());
        assert!(path.with_extension("json.backup").exists());
        assert!(path.exists());
    }

    #[test]
    fn mouse_controls_become_mouse_bindings() {
        let mut options = Options::default();
        options.controls.a_button = "mouse_left".into();
        assert_eq!(
            options.key_bindings().a_button,
            Binding::Mouse(crate::input::MouseButton::Left)
        );
    }
}
