//! Final score computation and the text breakdown shown to players.
//!
//! The breakdown's detail block is a list of `label: value` rows; the
//! leaderboard reads it back with [`parse_detail_rows`] for tooltips.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::player::ArcadePlayer;
use crate::registry::Vehicle;

const SEPARATOR: &str = "---";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringRules {
    pub score_multiplier: i64,
    /// Share of a vehicle's value awarded for damage that did not kill it.
    pub damage_multiplier: f64,
    pub plane_destroyed_penalty: i64,
    pub eject_penalty: i64,
    pub pilot_killed_penalty: i64,
    /// Game title used in the score heading.
    pub title: String,
    /// Points per vehicle type (script stem).
    pub points: BTreeMap<String, i64>,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            score_multiplier: 1,
            damage_multiplier: 0.5,
            plane_destroyed_penalty: -500,
            eject_penalty: -250,
            pilot_killed_penalty: -500,
            title: "STUKA ATTACK!".to_string(),
            points: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreLine {
    pub label: String,
    pub value: i64,
}

impl ScoreLine {
    fn new(label: impl Into<String>, value: i64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreReport {
    pub score: i64,
    pub heading: String,
    pub kills: Vec<ScoreLine>,
    pub damaged: Vec<ScoreLine>,
    pub penalties: Vec<ScoreLine>,
}

fn percent(fraction: f64) -> i64 {
    (fraction * 100.0).round() as i64
}

// Half away from zero, before the integer multiplier.
fn partial(fraction: f64, value: i64, damage_multiplier: f64) -> i64 {
    (fraction * value as f64 * damage_multiplier).round() as i64
}

pub fn compute_score(
    player: &ArcadePlayer,
    vehicles: &[Vehicle],
    rules: &ScoringRules,
) -> ScoreReport {
    let m = rules.score_multiplier;
    let mut ordered: Vec<&Vehicle> = vehicles.iter().collect();
    ordered.sort_by_key(|vehicle| vehicle.count_id);

    let mut kills = Vec::new();
    let mut damaged = Vec::new();
    for vehicle in ordered {
        if vehicle.destroyed && vehicle.killed_by_player {
            kills.push(ScoreLine::new(
                format!("{} (#{:02})", vehicle.full_name, vehicle.count_id),
                vehicle.score_value * m,
            ));
        } else if vehicle.damage_by_player > 0.0 {
            let fraction = vehicle.damage_by_player.min(1.0);
            damaged.push(ScoreLine::new(
                format!(
                    "{} (#{:02}) {}%",
                    vehicle.full_name,
                    vehicle.count_id,
                    percent(fraction)
                ),
                partial(fraction, vehicle.score_value, rules.damage_multiplier) * m,
            ));
        }
    }

    let mut penalties = Vec::new();
    if player.killed {
        penalties.push(ScoreLine::new("Pilot died", rules.pilot_killed_penalty * m));
    } else {
        if player.ejected {
            penalties.push(ScoreLine::new("Pilot ejected", rules.eject_penalty * m));
        }
        if player.pilot_damage > 0.0 {
            let pilot_damage = player.pilot_damage.min(1.0);
            penalties.push(ScoreLine::new(
                format!("Pilot injured ({}%)", percent(pilot_damage)),
                partial(
                    pilot_damage,
                    rules.pilot_killed_penalty,
                    rules.damage_multiplier,
                ) * m,
            ));
        }
    }
    if player.plane_destroyed {
        penalties.push(ScoreLine::new(
            format!("{} destroyed", player.plane_type),
            rules.plane_destroyed_penalty * m,
        ));
    } else if player.plane_damage > 0.0 {
        // Plane damage carries over a respawn and can pass 100%.
        let plane_damage = player.plane_damage.min(1.0);
        penalties.push(ScoreLine::new(
            format!("{} {}%", player.plane_type, percent(plane_damage)),
            partial(
                plane_damage,
                rules.plane_destroyed_penalty,
                rules.damage_multiplier,
            ) * m,
        ));
    }

    let score = kills
        .iter()
        .chain(&damaged)
        .chain(&penalties)
        .map(|line| line.value)
        .sum();

    ScoreReport {
        score,
        heading: format!(
            "{} scores for {} flying a {}",
            player.possessive_alias(),
            rules.title,
            player.plane_type
        ),
        kills,
        damaged,
        penalties,
    }
}

impl ScoreReport {
    /// The `label: value` block between the separators.
    pub fn detail_text(&self) -> String {
        let mut rows: Vec<String> = Vec::new();
        let row = |line: &ScoreLine| format!("{}: {} points", line.label, line.value);
        if self.kills.is_empty() && self.damaged.is_empty() {
            rows.push("No vehicles destroyed: 0 points".to_string());
            rows.push("No vehicles damaged: 0 points".to_string());
        }
        if !self.kills.is_empty() {
            rows.push("Vehicles Killed:".to_string());
            rows.extend(self.kills.iter().map(row));
        }
        if !self.damaged.is_empty() {
            rows.push("Vehicles Damaged:".to_string());
            rows.extend(self.damaged.iter().map(row));
        }
        rows.push("Player Damage:".to_string());
        if self.penalties.is_empty() {
            rows.push("No player damage: 0 points".to_string());
        } else {
            rows.extend(self.penalties.iter().map(row));
        }
        rows.join("\n")
    }

    pub fn render(&self) -> String {
        format!(
            "{}\n{SEPARATOR}\n{}\n{SEPARATOR}\nTOTAL SCORE: {} points",
            self.heading,
            self.detail_text(),
            self.score
        )
    }
}

/// One parsed detail row; section headers have an empty value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailRow {
    pub label: String,
    pub value: String,
}

pub fn parse_detail_rows(detail: &str) -> Vec<DetailRow> {
    detail
        .lines()
        .filter_map(|line| {
            let (label, value) = line.split_once(':')?;
            Some(DetailRow {
                label: label.trim().to_string(),
                value: value.trim().to_string(),
            })
        })
        .collect()
}
