use std::collections::{BTreeMap, HashMap};

use crate::scenario::ScenarioVehicle;

/// Runtime ID the simulator uses for self-inflicted or environmental events.
pub const SENTINEL_ATTACKER_ID: i64 = -1;

const UNSPAWNED: i64 = -1;

/// Who caused a piece of vehicle damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageSource {
    Player,
    SelfInflicted,
    Other,
}

/// A scored vehicle and everything that happened to it this session.
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub name: String,
    pub vehicle_type: String,
    /// Display type reported at spawn; the design name until then.
    pub full_name: String,
    pub obj_id: i64,
    pub link_id: i64,
    pub runtime_id: i64,
    pub damage_by_player: f64,
    pub damage_self: f64,
    pub damage_by_other: f64,
    pub destroyed: bool,
    pub player_damaged: bool,
    pub killed_by_player: bool,
    pub score_value: i64,
    /// 1-based position in scenario order.
    pub count_id: usize,
}

impl Vehicle {
    fn from_scenario(source: &ScenarioVehicle, score_value: i64, count_id: usize) -> Self {
        Self {
            name: source.name.clone(),
            vehicle_type: source.vehicle_type.clone(),
            full_name: source.name.clone(),
            obj_id: source.obj_id,
            link_id: source.link_id,
            runtime_id: UNSPAWNED,
            damage_by_player: 0.0,
            damage_self: 0.0,
            damage_by_other: 0.0,
            destroyed: false,
            player_damaged: false,
            killed_by_player: false,
            score_value,
            count_id,
        }
    }

    pub fn damage_total(&self) -> f64 {
        self.damage_by_player + self.damage_self + self.damage_by_other
    }

    pub fn is_spawned(&self) -> bool {
        self.runtime_id != UNSPAWNED
    }

    pub fn apply_damage(&mut self, amount: f64, source: DamageSource) {
        match source {
            DamageSource::Player => {
                self.damage_by_player += amount;
                self.player_damaged = true;
            }
            DamageSource::SelfInflicted => self.damage_self += amount,
            DamageSource::Other => self.damage_by_other += amount,
        }
    }
}

/// Spawned entity that is not part of the score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherEntity {
    pub display_type: String,
    pub name: String,
}

/// Scored vehicles by design name and, once spawned, by runtime ID.
#[derive(Debug, Clone, Default)]
pub struct VehicleRegistry {
    vehicles: Vec<Vehicle>,
    by_name: HashMap<String, usize>,
    by_runtime: HashMap<i64, usize>,
    others: HashMap<i64, OtherEntity>,
}

impl VehicleRegistry {
    pub fn from_scenario(vehicles: &[ScenarioVehicle], points: &BTreeMap<String, i64>) -> Self {
        let mut registry = VehicleRegistry {
            others: HashMap::from([(
                SENTINEL_ATTACKER_ID,
                OtherEntity {
                    display_type: "environment".to_string(),
                    name: "self".to_string(),
                },
            )]),
            ..VehicleRegistry::default()
        };
        for (idx, source) in vehicles.iter().enumerate() {
            let score_value = match points.get(&source.vehicle_type) {
                Some(value) => *value,
                None => {
                    tracing::warn!(
                        target: "arcade::state",
                        vehicle = %source.name,
                        vehicle_type = %source.vehicle_type,
                        "registry.unscored_type"
                    );
                    0
                }
            };
            registry
                .by_name
                .insert(source.name.clone(), registry.vehicles.len());
            registry
                .vehicles
                .push(Vehicle::from_scenario(source, score_value, idx + 1));
        }
        registry
    }

    /// Attaches a runtime ID to a scored vehicle, or records an unscored entity.
    /// Returns true when the spawn belongs to a scored vehicle.
    pub fn register_spawn(&mut self, runtime_id: i64, design_name: &str, display_type: &str) -> bool {
        let Some(&slot) = self.by_name.get(design_name) else {
            self.others.insert(
                runtime_id,
                OtherEntity {
                    display_type: display_type.to_string(),
                    name: design_name.to_string(),
                },
            );
            return false;
        };
        let vehicle = &mut self.vehicles[slot];
        if vehicle.is_spawned() && vehicle.runtime_id != runtime_id {
            self.by_runtime.remove(&vehicle.runtime_id);
            tracing::debug!(
                target: "arcade::state",
                vehicle = %vehicle.name,
                previous = vehicle.runtime_id,
                runtime_id,
                "registry.respawned"
            );
        }
        vehicle.runtime_id = runtime_id;
        vehicle.full_name = display_type.to_string();
        self.by_runtime.insert(runtime_id, slot);
        true
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn by_name(&self, design_name: &str) -> Option<&Vehicle> {
        self.by_name.get(design_name).map(|&slot| &self.vehicles[slot])
    }

    pub fn by_runtime(&self, runtime_id: i64) -> Option<&Vehicle> {
        self.by_runtime
            .get(&runtime_id)
            .map(|&slot| &self.vehicles[slot])
    }

    pub fn by_runtime_mut(&mut self, runtime_id: i64) -> Option<&mut Vehicle> {
        self.by_runtime
            .get(&runtime_id)
            .map(|&slot| &mut self.vehicles[slot])
    }

    pub fn other(&self, runtime_id: i64) -> Option<&OtherEntity> {
        self.others.get(&runtime_id)
    }
}
