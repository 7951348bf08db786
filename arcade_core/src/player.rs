use serde::Serialize;

use crate::log_event::PlayerSpawn;

/// The pilot playing the current arcade session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArcadePlayer {
    pub alias: String,
    pub permanent_id: String,
    pub profile_id: String,
    pub plane_type: String,
    pub plane_runtime_id: i64,
    pub pilot_runtime_id: i64,
    pub plane_damage: f64,
    pub plane_destroyed: bool,
    pub pilot_damage: f64,
    pub killed: bool,
    pub ejected: bool,
}

impl ArcadePlayer {
    pub fn from_spawn(spawn: &PlayerSpawn) -> Self {
        Self {
            alias: spawn.alias.clone(),
            permanent_id: spawn.permanent_id.clone(),
            profile_id: spawn.profile_id.clone(),
            plane_type: spawn.plane_type.clone(),
            plane_runtime_id: spawn.plane_id,
            pilot_runtime_id: spawn.pilot_id,
            plane_damage: 0.0,
            plane_destroyed: false,
            pilot_damage: 0.0,
            killed: false,
            ejected: false,
        }
    }

    /// New airframe and pilot body; accumulated damage is kept.
    pub fn respawn(&mut self, spawn: &PlayerSpawn) {
        self.plane_runtime_id = spawn.plane_id;
        self.pilot_runtime_id = spawn.pilot_id;
        self.plane_type = spawn.plane_type.clone();
    }

    pub fn is_flying_intact(&self) -> bool {
        !self.killed && !self.ejected && !self.plane_destroyed
    }

    /// `Stukas'` or `Limbo's`.
    pub fn possessive_alias(&self) -> String {
        if self.alias.ends_with('s') {
            format!("{}'", self.alias)
        } else {
            format!("{}'s", self.alias)
        }
    }
}
