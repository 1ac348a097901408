//! Lineups exported by the CLB (Comets League Baseball) lineup builder.

use chrono::Local;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::mii_db::MiiRegistry;
use crate::roster::{
    character_id_by_name, position_by_name, Player, Team, MII_START_INDEX, POSITION_NAMES,
    TEAM_SIZE,
};

#[derive(Debug, Error)]
pub enum ClbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("lineup uses the old export format (player IDs only); re-export it from the CLB Lineup Builder")]
    OldFormat,

    #[error("lineup '{0}' has no resolvable players")]
    Empty(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClbPlayer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub database_id: String,
    #[serde(default)]
    pub is_mii: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClbLineup {
    #[serde(default)]
    pub name: String,
    /// Position name to player.
    pub roster: BTreeMap<String, Option<ClbPlayer>>,
    pub batting_order: Vec<Option<ClbPlayer>>,
    #[serde(default)]
    pub bench: Vec<Value>,
    #[serde(default)]
    pub chemistry: Value,
    #[serde(default)]
    pub exported_at: String,
    #[serde(default)]
    pub season: String,
}

/// A loaded save: display name and converted lineup.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedTeam {
    pub name: String,
    pub team: Team,
    pub path: PathBuf,
}

/// Parse lineup JSON. Exports from older builder versions store bare id
/// strings instead of player objects and are rejected.
pub fn parse_lineup(text: &str) -> Result<ClbLineup, ClbError> {
    let value: Value = serde_json::from_str(text)?;
    let old_roster = value
        .get("roster")
        .and_then(Value::as_object)
        .and_then(|r| r.values().find(|v| !v.is_null()))
        .map_or(false, Value::is_string);
    let old_order = value
        .get("battingOrder")
        .and_then(Value::as_array)
        .map_or(false, |b| b.iter().any(Value::is_string));
    if old_roster || old_order {
        return Err(ClbError::OldFormat);
    }
    Ok(serde_json::from_value(value)?)
}

fn resolve_character(player: &ClbPlayer, registry: &MiiRegistry) -> Option<u16> {
    if player.is_mii {
        let found = registry
            .find(&player.name)
            .map(|idx| MII_START_INDEX + idx as u16);
        if found.is_none() {
            warn!("Mii '{}' not found in the Mii database", player.name);
        }
        found
    } else {
        let found = character_id_by_name(&player.database_id);
        if found.is_none() {
            warn!("character '{}' is not a known character", player.database_id);
        }
        found
    }
}

/// Convert a CLB lineup. Players that cannot be resolved, or that hold no
/// fielding position, are skipped with a warning.
///
/// The returned team is in batting order, and the first batting entry becomes
/// the first roster entry. Captain resolution and patch emission both walk
/// roster order, so they see the lineup as the builder's batting card.
pub fn from_clb(lineup: &ClbLineup, registry: &MiiRegistry) -> Result<Team, ClbError> {
    let mut fielding: BTreeMap<&str, u8> = BTreeMap::new();
    for (pos_name, player) in &lineup.roster {
        if let (Some(player), Some(pos)) = (player, position_by_name(pos_name)) {
            fielding.insert(player.id.as_str(), pos);
        }
    }

    let mut players = Vec::new();
    for (batting, player) in lineup.batting_order.iter().enumerate() {
        let Some(player) = player else {
            continue;
        };
        if player.id.is_empty() {
            continue;
        }
        let Some(character_id) = resolve_character(player, registry) else {
            continue;
        };
        let Some(&pos) = fielding.get(player.id.as_str()) else {
            warn!("no fielding position for {}", player.name);
            continue;
        };
        let Ok(batting) = u8::try_from(batting) else {
            warn!("batting slot {} for {} is out of range", batting, player.name);
            continue;
        };
        players.push(Player::new(character_id, batting, pos));
    }

    if players.len() != TEAM_SIZE {
        warn!(
            "lineup '{}' has {} players instead of {}",
            lineup.name,
            players.len(),
            TEAM_SIZE
        );
    }
    if players.is_empty() {
        return Err(ClbError::Empty(lineup.name.clone()));
    }

    Ok(Team::new(players))
}

/// Convert a team back into a CLB lineup.
pub fn to_clb(team: &Team, name: &str, registry: &MiiRegistry) -> ClbLineup {
    let mut roster = BTreeMap::new();
    let mut batting_order = vec![None; TEAM_SIZE];

    for p in team {
        let char_name = registry
            .character_name(p.character_id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Unknown_{}", p.character_id));
        let is_mii = p.is_mii();

        let player = ClbPlayer {
            id: char_name.to_lowercase().replace(' ', "-"),
            database_id: if is_mii { "Mii".to_string() } else { char_name.clone() },
            name: char_name,
            is_mii,
        };

        let pos_name = POSITION_NAMES
            .get(usize::from(p.fielding_position))
            .copied()
            .unwrap_or("P");
        roster.insert(pos_name.to_string(), Some(player.clone()));

        if let Some(slot) = batting_order.get_mut(usize::from(p.batting_order)) {
            *slot = Some(player);
        }
    }

    ClbLineup {
        name: name.to_string(),
        roster,
        batting_order,
        bench: Vec::new(),
        chemistry: serde_json::json!({ "positive": 0, "negative": 0 }),
        exported_at: Local::now().to_rfc3339(),
        season: "custom".to_string(),
    }
}

/// File name used for a team: anything but alphanumerics, space, `-` and
/// `_` becomes `_`.
pub fn safe_file_name(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.json", stem)
}

fn json_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().map_or(false, |ext| ext == "json"))
        .collect();
    files.sort();
    files
}

fn lineup_name(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    let value: Value = serde_json::from_str(&text).ok()?;
    value.get("name").and_then(Value::as_str).map(str::to_string)
}

/// Load every lineup in `dir`, sorted by file name. Files that fail to load
/// are skipped.
pub fn load_saves(dir: &Path, registry: &MiiRegistry) -> Vec<SavedTeam> {
    let mut teams = Vec::new();
    if !dir.exists() {
        warn!("saves directory not found: {}", dir.display());
        return teams;
    }

    for path in json_files(dir) {
        let loaded = fs::read_to_string(&path)
            .map_err(ClbError::from)
            .and_then(|text| parse_lineup(&text))
            .and_then(|lineup| {
                let team = from_clb(&lineup, registry)?;
                Ok((lineup.name, team))
            });

        match loaded {
            Ok((name, team)) => {
                let name = if name.is_empty() {
                    path.file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default()
                } else {
                    name
                };
                info!("loaded {} ({} players)", name, team.len());
                teams.push(SavedTeam { name, team, path });
            }
            Err(e) => warn!("skipped {}: {}", path.display(), e),
        }
    }

    info!("loaded {} team(s)", teams.len());
    teams
}

pub fn save_lineup(
    dir: &Path,
    name: &str,
    team: &Team,
    registry: &MiiRegistry,
) -> Result<PathBuf, ClbError> {
    fs::create_dir_all(dir)?;
    let lineup = to_clb(team, name, registry);
    let path = dir.join(safe_file_name(name));
    fs::write(&path, serde_json::to_string_pretty(&lineup)?)?;
    info!("saved team to {}", path.display());
    Ok(path)
}

/// Find a team's file by its sanitised name, then by the `name` field.
pub fn find_lineup(dir: &Path, name: &str) -> Option<PathBuf> {
    let direct = dir.join(safe_file_name(name));
    if direct.exists() {
        return Some(direct);
    }
    json_files(dir)
        .into_iter()
        .find(|p| lineup_name(p).as_deref() == Some(name))
}

/// Remove a team's file. Returns `false` when no file matched.
pub fn delete_lineup(dir: &Path, name: &str) -> Result<bool, ClbError> {
    match find_lineup(dir, name) {
        Some(path) => {
            fs::remove_file(&path)?;
            info!("deleted team file {}", path.display());
            Ok(true)
        }
        None => {
            warn!("team file not found for {}", name);
            Ok(false)
        }
    }
}
