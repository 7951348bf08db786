//! Mission-log line classification and typed field extraction.
//!
//! Each line carries an `AType:N` tag naming the event, followed by
//! `KEY:value` tokens. Which tokens an event needs, what ends each value and
//! how the value is typed is described by a static [`FieldRule`] table per
//! [`EventKind`], so the grammar can be read and tested without the state
//! machine.

use std::fmt;
use std::num::{ParseFloatError, ParseIntError};

use thiserror::Error;

use crate::geometry::{Point3, PointParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MissionStart,
    PlayerSpawn,
    PlayerExit,
    ObjectiveTrigger,
    PilotEject,
    VehicleSpawn,
    Damage,
    Kill,
    Unknown,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::MissionStart => "mission_start",
            EventKind::PlayerSpawn => "player_spawn",
            EventKind::PlayerExit => "player_exit",
            EventKind::ObjectiveTrigger => "objective_trigger",
            EventKind::PilotEject => "pilot_eject",
            EventKind::VehicleSpawn => "vehicle_spawn",
            EventKind::Damage => "damage",
            EventKind::Kill => "kill",
            EventKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tags are distinct because each ends in a space after the type number.
const KIND_TAGS: [(&str, EventKind); 8] = [
    ("AType:0 ", EventKind::MissionStart),
    ("AType:10 ", EventKind::PlayerSpawn),
    ("AType:4 ", EventKind::PlayerExit),
    ("AType:8 ", EventKind::ObjectiveTrigger),
    ("AType:18 ", EventKind::PilotEject),
    ("AType:12 ", EventKind::VehicleSpawn),
    ("AType:2 ", EventKind::Damage),
    ("AType:3 ", EventKind::Kill),
];

pub fn classify(line: &str) -> EventKind {
    KIND_TAGS
        .iter()
        .find(|(tag, _)| line.contains(tag))
        .map_or(EventKind::Unknown, |(_, kind)| *kind)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Float,
    Point,
    Text,
}

/// One `TAG:value` extraction: the value runs from the tag to `terminator`.
/// A single-space terminator also accepts end of line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub tag: &'static str,
    pub terminator: &'static str,
    pub kind: ValueKind,
}

impl FieldRule {
    const fn new(tag: &'static str, terminator: &'static str, kind: ValueKind) -> Self {
        Self {
            tag,
            terminator,
            kind,
        }
    }

    /// Raw value text, with the tag matched only at a token boundary.
    pub fn raw<'a>(&self, line: &'a str) -> Result<&'a str, EventParseError> {
        let start =
            find_token(line, self.tag).ok_or(EventParseError::MissingField { tag: self.tag })?;
        let rest = &line[start + self.tag.len()..];
        if self.terminator == " " {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            return Ok(&rest[..end]);
        }
        let end = rest
            .find(self.terminator)
            .ok_or(EventParseError::Unterminated {
                tag: self.tag,
                terminator: self.terminator,
            })?;
        Ok(&rest[..end])
    }

    pub fn extract(&self, line: &str) -> Result<FieldValue, EventParseError> {
        let raw = self.raw(line)?;
        match self.kind {
            ValueKind::Int => raw
                .parse::<i64>()
                .map(FieldValue::Int)
                .map_err(|source| EventParseError::InvalidInteger {
                    tag: self.tag,
                    value: raw.to_string(),
                    source,
                }),
            ValueKind::Float => raw
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|source| EventParseError::InvalidFloat {
                    tag: self.tag,
                    value: raw.to_string(),
                    source,
                }),
            ValueKind::Point => raw
                .parse::<Point3>()
                .map(FieldValue::Point)
                .map_err(|source| EventParseError::InvalidPoint {
                    tag: self.tag,
                    source,
                }),
            ValueKind::Text => Ok(FieldValue::Text(raw.trim().to_string())),
        }
    }
}

fn find_token(line: &str, tag: &str) -> Option<usize> {
    line.match_indices(tag).map(|(idx, _)| idx).find(|&idx| {
        idx == 0 || matches!(line.as_bytes()[idx - 1], b' ' | b'(' | b'\t')
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Point(Point3),
    Text(String),
}

use ValueKind::{Float, Int, Point, Text};

const PLAYER_SPAWN_RULES: &[FieldRule] = &[
    FieldRule::new("PLID:", " ", Int),
    FieldRule::new("PID:", " ", Int),
    FieldRule::new("(", ")", Point),
    FieldRule::new("IDS:", " ", Text),
    FieldRule::new("LOGIN:", " ", Text),
    FieldRule::new("NAME:", " TYPE:", Text),
    FieldRule::new("TYPE:", " COUNTRY:", Text),
];
const PLAYER_EXIT_RULES: &[FieldRule] = &[
    FieldRule::new("PLID:", " ", Int),
    FieldRule::new("PID:", " ", Int),
];
const OBJECTIVE_RULES: &[FieldRule] = &[
    FieldRule::new("OBJID:", " ", Int),
    FieldRule::new("POS(", ")", Point),
];
const EJECT_RULES: &[FieldRule] = &[
    FieldRule::new("BOTID:", " ", Int),
    FieldRule::new("PARENTID:", " ", Int),
    FieldRule::new("POS(", ")", Point),
];
const VEHICLE_SPAWN_RULES: &[FieldRule] = &[
    FieldRule::new("ID:", " ", Int),
    FieldRule::new("TYPE:", " COUNTRY:", Text),
    FieldRule::new("NAME:", " PID:", Text),
];
const DAMAGE_RULES: &[FieldRule] = &[
    FieldRule::new("DMG:", " ", Float),
    FieldRule::new("AID:", " ", Int),
    FieldRule::new("TID:", " ", Int),
];
const KILL_RULES: &[FieldRule] = &[
    FieldRule::new("AID:", " ", Int),
    FieldRule::new("TID:", " ", Int),
];

pub fn field_rules(kind: EventKind) -> &'static [FieldRule] {
    match kind {
        EventKind::PlayerSpawn => PLAYER_SPAWN_RULES,
        EventKind::PlayerExit => PLAYER_EXIT_RULES,
        EventKind::ObjectiveTrigger => OBJECTIVE_RULES,
        EventKind::PilotEject => EJECT_RULES,
        EventKind::VehicleSpawn => VEHICLE_SPAWN_RULES,
        EventKind::Damage => DAMAGE_RULES,
        EventKind::Kill => KILL_RULES,
        EventKind::MissionStart | EventKind::Unknown => &[],
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSpawn {
    pub plane_id: i64,
    pub pilot_id: i64,
    pub position: Point3,
    /// Account ID that stays fixed across aliases.
    pub permanent_id: String,
    pub profile_id: String,
    pub alias: String,
    pub plane_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    MissionStart,
    PlayerSpawn(PlayerSpawn),
    PlayerExit {
        plane_id: i64,
        pilot_id: i64,
    },
    ObjectiveTrigger {
        objective_id: i64,
        position: Point3,
    },
    PilotEject {
        bot_id: i64,
        parent_id: i64,
        position: Point3,
    },
    VehicleSpawn {
        runtime_id: i64,
        display_type: String,
        design_name: String,
    },
    Damage {
        amount: f64,
        attacker_id: i64,
        target_id: i64,
    },
    Kill {
        attacker_id: i64,
        target_id: i64,
    },
}

impl LogEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LogEvent::MissionStart => EventKind::MissionStart,
            LogEvent::PlayerSpawn(_) => EventKind::PlayerSpawn,
            LogEvent::PlayerExit { .. } => EventKind::PlayerExit,
            LogEvent::ObjectiveTrigger { .. } => EventKind::ObjectiveTrigger,
            LogEvent::PilotEject { .. } => EventKind::PilotEject,
            LogEvent::VehicleSpawn { .. } => EventKind::VehicleSpawn,
            LogEvent::Damage { .. } => EventKind::Damage,
            LogEvent::Kill { .. } => EventKind::Kill,
        }
    }
}

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("missing field '{tag}'")]
    MissingField { tag: &'static str },
    #[error("field '{tag}' is not terminated by '{terminator}'")]
    Unterminated {
        tag: &'static str,
        terminator: &'static str,
    },
    #[error("invalid integer '{value}' for '{tag}': {source}")]
    InvalidInteger {
        tag: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("invalid number '{value}' for '{tag}': {source}")]
    InvalidFloat {
        tag: &'static str,
        value: String,
        #[source]
        source: ParseFloatError,
    },
    #[error("invalid position for '{tag}': {source}")]
    InvalidPoint {
        tag: &'static str,
        #[source]
        source: PointParseError,
    },
    #[error("field table for {0} does not match its event shape")]
    Shape(EventKind),
}

/// Parses one log line. Lines of no interest yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<LogEvent>, EventParseError> {
    let kind = classify(line);
    match kind {
        EventKind::Unknown => return Ok(None),
        EventKind::MissionStart => return Ok(Some(LogEvent::MissionStart)),
        _ => {}
    }
    let fields = field_rules(kind)
        .iter()
        .map(|rule| rule.extract(line))
        .collect::<Result<Vec<_>, _>>()?;
    build_event(kind, fields).map(Some)
}

fn build_event(kind: EventKind, fields: Vec<FieldValue>) -> Result<LogEvent, EventParseError> {
    use FieldValue as F;
    let event = match (kind, fields.as_slice()) {
        (
            EventKind::PlayerSpawn,
            [F::Int(plane_id), F::Int(pilot_id), F::Point(position), F::Text(permanent_id), F::Text(profile_id), F::Text(alias), F::Text(plane_type)],
        ) => LogEvent::PlayerSpawn(PlayerSpawn {
            plane_id: *plane_id,
            pilot_id: *pilot_id,
            position: *position,
            permanent_id: permanent_id.clone(),
            profile_id: profile_id.clone(),
            alias: alias.clone(),
            plane_type: plane_type.clone(),
        }),
        (EventKind::PlayerExit, [F::Int(plane_id), F::Int(pilot_id)]) => LogEvent::PlayerExit {
            plane_id: *plane_id,
            pilot_id: *pilot_id,
        },
        (EventKind::ObjectiveTrigger, [F::Int(objective_id), F::Point(position)]) => {
            LogEvent::ObjectiveTrigger {
                objective_id: *objective_id,
                position: *position,
            }
        }
        (EventKind::PilotEject, [F::Int(bot_id), F::Int(parent_id), F::Point(position)]) => {
            LogEvent::PilotEject {
                bot_id: *bot_id,
                parent_id: *parent_id,
                position: *position,
            }
        }
        (
            EventKind::VehicleSpawn,
            [F::Int(runtime_id), F::Text(display_type), F::Text(design_name)],
        ) => LogEvent::VehicleSpawn {
            runtime_id: *runtime_id,
            display_type: display_type.clone(),
            design_name: design_name.clone(),
        },
        (EventKind::Damage, [F::Float(amount), F::Int(attacker_id), F::Int(target_id)]) => {
            LogEvent::Damage {
                amount: *amount,
                attacker_id: *attacker_id,
                target_id: *target_id,
            }
        }
        (EventKind::Kill, [F::Int(attacker_id), F::Int(target_id)]) => LogEvent::Kill {
            attacker_id: *attacker_id,
            target_id: *target_id,
        },
        _ => return Err(EventParseError::Shape(kind)),
    };
    Ok(event)
}
