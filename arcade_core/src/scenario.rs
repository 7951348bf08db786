//! Read-only extraction of scored vehicles and mission objectives from the
//! scenario text files the simulator loads.
//!
//! Scenario files are nested `Name { key = value; ... }` blocks. Only the
//! keys that sit directly inside a wanted block are collected; nested blocks
//! (coalition lists, damage reports) are skipped.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::num::{ParseFloatError, ParseIntError};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::PathsConfig;
use crate::geometry::Point3;
use crate::objectives::{MissionObjective, ObjectiveSet};

const ARCADE_MARKER: &str = "Arcade Game:";
const VEHICLE_BLOCK: &str = "Vehicle";
const OBJECTIVE_BLOCK: &str = "MCU_TR_MissionObjective";

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("scenario file {path:?} is neither UTF-8 nor UTF-16 text")]
    Encoding { path: PathBuf },
    #[error("{block} block at line {line} has no '{key}' entry")]
    MissingKey {
        block: &'static str,
        key: &'static str,
        line: usize,
    },
    #[error("invalid integer '{value}' for {key}: {source}")]
    InvalidInteger {
        key: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("invalid coordinate '{value}' for {key}: {source}")]
    InvalidCoordinate {
        key: &'static str,
        value: String,
        #[source]
        source: ParseFloatError,
    },
    #[error("vehicle script '{0}' does not name a vehicle definition")]
    UnknownScript(String),
    #[error("briefing has no name for objective label {0}")]
    MissingObjectiveName(String),
}

/// A designer-placed vehicle that counts toward the score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioVehicle {
    pub name: String,
    pub vehicle_type: String,
    pub obj_id: i64,
    pub link_id: i64,
}

/// Everything the arcade needs from one scenario load.
#[derive(Debug, Clone, Default)]
pub struct Scenario {
    pub vehicles: Vec<ScenarioVehicle>,
    pub objectives: ObjectiveSet,
    pub is_arcade: bool,
}

impl Scenario {
    /// Loads the scenario named by `paths`. The mission and briefing files
    /// are only read when the description marks an arcade mission.
    pub fn load(paths: &PathsConfig) -> Result<Self, ScenarioError> {
        let description = read_text_file(&paths.description_file)?;
        if !is_arcade_mission(&description) {
            return Ok(Scenario::default());
        }
        let mission = read_text_file(&paths.mission_file)?;
        let briefing = read_text_file(&paths.briefing_file)?;
        Ok(Scenario {
            vehicles: parse_scenario_vehicles(&mission),
            objectives: ObjectiveSet::new(parse_scenario_objectives(&mission, &briefing)),
            is_arcade: true,
        })
    }
}

pub fn is_arcade_mission(description_text: &str) -> bool {
    description_text.contains(ARCADE_MARKER)
}

/// Reads UTF-8 or UTF-16 (BOM or zero-byte heuristic) text.
pub fn read_text_file(path: &Path) -> Result<String, ScenarioError> {
    let bytes = fs::read(path).map_err(|source| ScenarioError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    decode_text(&bytes).ok_or_else(|| ScenarioError::Encoding {
        path: path.to_path_buf(),
    })
}

fn decode_text(bytes: &[u8]) -> Option<String> {
    match bytes {
        [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, u16::from_be_bytes),
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8(rest.to_vec()).ok(),
        [_, 0, ..] if bytes.len() % 2 == 0 => decode_utf16(bytes, u16::from_le_bytes),
        _ => String::from_utf8(bytes.to_vec()).ok(),
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}

pub fn parse_scenario_vehicles(text: &str) -> Vec<ScenarioVehicle> {
    scan_blocks(text, VEHICLE_BLOCK)
        .iter()
        .filter_map(|block| match vehicle_from_block(block) {
            Ok(vehicle) => vehicle,
            Err(err) => {
                tracing::warn!(
                    target: "arcade::scenario",
                    line = block.line,
                    error = %err,
                    "scenario.vehicle_skipped"
                );
                None
            }
        })
        .collect()
}

pub fn parse_scenario_objectives(mission_text: &str, briefing_text: &str) -> Vec<MissionObjective> {
    let names = briefing_labels(briefing_text);
    scan_blocks(mission_text, OBJECTIVE_BLOCK)
        .iter()
        .filter_map(|block| match objective_from_block(block, &names) {
            Ok(objective) => Some(objective),
            Err(err) => {
                tracing::warn!(
                    target: "arcade::scenario",
                    line = block.line,
                    error = %err,
                    "scenario.objective_skipped"
                );
                None
            }
        })
        .collect()
}

#[derive(Debug)]
struct Block {
    line: usize,
    entries: HashMap<String, String>,
}

impl Block {
    fn get(&self, block: &'static str, key: &'static str) -> Result<&str, ScenarioError> {
        self.entries
            .get(key)
            .map(String::as_str)
            .ok_or(ScenarioError::MissingKey {
                block,
                key,
                line: self.line,
            })
    }

    fn int(&self, block: &'static str, key: &'static str) -> Result<i64, ScenarioError> {
        let value = self.get(block, key)?;
        value
            .parse::<i64>()
            .map_err(|source| ScenarioError::InvalidInteger {
                key,
                value: value.to_string(),
                source,
            })
    }

    fn float(&self, block: &'static str, key: &'static str) -> Result<f64, ScenarioError> {
        let value = self.get(block, key)?;
        value
            .parse::<f64>()
            .map_err(|source| ScenarioError::InvalidCoordinate {
                key,
                value: value.to_string(),
                source,
            })
    }
}

struct Frame {
    name: Option<String>,
    line: usize,
    entries: HashMap<String, String>,
}

/// Collects every `wanted` block at any depth, keeping only its direct entries.
fn scan_blocks(text: &str, wanted: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut pending_name: Option<(String, usize)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(head) = line.strip_suffix('{') {
            let head = head.trim();
            let (name, start) = if head.is_empty() {
                pending_name
                    .take()
                    .map_or((None, idx + 1), |(name, at)| (Some(name), at))
            } else {
                pending_name = None;
                (Some(head.to_string()), idx + 1)
            };
            stack.push(Frame {
                name,
                line: start,
                entries: HashMap::new(),
            });
            continue;
        }
        if line == "}" {
            pending_name = None;
            if let Some(frame) = stack.pop() {
                if frame.name.as_deref() == Some(wanted) {
                    blocks.push(Block {
                        line: frame.line,
                        entries: frame.entries,
                    });
                }
            }
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            pending_name = None;
            if let Some(frame) = stack.last_mut() {
                let value = value.trim().trim_end_matches(';').trim().trim_matches('"');
                frame
                    .entries
                    .insert(key.trim().to_string(), value.to_string());
            }
            continue;
        }
        pending_name = Some((line.to_string(), idx + 1));
    }
    blocks
}

// Scored vehicles follow the `m<2 digits>_<rest>` naming convention.
fn is_scored_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() > 4
        && bytes[0] == b'm'
        && bytes[1].is_ascii_digit()
        && bytes[2].is_ascii_digit()
        && bytes[3] == b'_'
}

fn vehicle_type_from_script(script: &str) -> Option<String> {
    let lowered = script.to_ascii_lowercase();
    let marker = "vehicles\\";
    let start = lowered.rfind(marker)? + marker.len();
    let file = &script[start..];
    let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
    (!stem.is_empty()).then(|| stem.to_string())
}

fn vehicle_from_block(block: &Block) -> Result<Option<ScenarioVehicle>, ScenarioError> {
    let name = block.get(VEHICLE_BLOCK, "Name")?;
    if !is_scored_name(name) {
        return Ok(None);
    }
    let script = block.get(VEHICLE_BLOCK, "Script")?;
    let vehicle_type = vehicle_type_from_script(script)
        .ok_or_else(|| ScenarioError::UnknownScript(script.to_string()))?;
    Ok(Some(ScenarioVehicle {
        name: name.to_string(),
        vehicle_type,
        obj_id: block.int(VEHICLE_BLOCK, "Index")?,
        link_id: block.int(VEHICLE_BLOCK, "LinkTrId")?,
    }))
}

fn briefing_labels(briefing_text: &str) -> HashMap<String, String> {
    briefing_text
        .lines()
        .filter_map(|line| {
            let (label, name) = line.split_once(':')?;
            let label = label.trim();
            (!label.is_empty() && label.chars().all(|c| c.is_ascii_digit()))
                .then(|| (label.to_string(), name.trim().to_string()))
        })
        .collect()
}

fn objective_from_block(
    block: &Block,
    names: &HashMap<String, String>,
) -> Result<MissionObjective, ScenarioError> {
    let index = block.int(OBJECTIVE_BLOCK, "Index")?;
    let coordinates = Point3::new(
        block.float(OBJECTIVE_BLOCK, "XPos")?,
        block.float(OBJECTIVE_BLOCK, "YPos")?,
        block.float(OBJECTIVE_BLOCK, "ZPos")?,
    );
    let label = block.get(OBJECTIVE_BLOCK, "LCName")?;
    let name = names
        .get(label)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ScenarioError::MissingObjectiveName(label.to_string()))?;
    Ok(MissionObjective {
        name: name.clone(),
        index,
        coordinates,
    })
}
