use crate::geometry::Point3;

/// Named marker placed by the mission designer.
#[derive(Debug, Clone, PartialEq)]
pub struct MissionObjective {
    pub name: String,
    pub index: i64,
    pub coordinates: Point3,
}

/// Immutable set of objectives for one scenario load.
#[derive(Debug, Clone, Default)]
pub struct ObjectiveSet {
    objectives: Vec<MissionObjective>,
}

impl ObjectiveSet {
    pub fn new(objectives: Vec<MissionObjective>) -> Self {
        Self { objectives }
    }

    pub fn len(&self) -> usize {
        self.objectives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objectives.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MissionObjective> {
        self.objectives.iter()
    }

    /// First objective carrying `name`.
    pub fn get(&self, name: &str) -> Option<&MissionObjective> {
        self.objectives.iter().find(|objective| objective.name == name)
    }

    /// Closest objective strictly within `tolerance` of `position`.
    pub fn nearest_within(&self, position: &Point3, tolerance: f64) -> Option<&MissionObjective> {
        self.objectives
            .iter()
            .map(|objective| (objective, objective.coordinates.distance(position)))
            .filter(|(_, distance)| *distance < tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(objective, _)| objective)
    }
}
