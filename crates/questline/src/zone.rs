use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::nav::GridPoint;
use crate::progress::PlayerId;

/// Named axis-aligned box, bounds inclusive on every axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub min: GridPoint,
    pub max: GridPoint,
}

impl Zone {
    /// Builds a zone from any two opposite corners.
    pub fn new(name: impl Into<String>, a: GridPoint, b: GridPoint) -> Self {
        Self {
            name: name.into(),
            min: GridPoint::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: GridPoint::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    pub fn contains(&self, point: GridPoint) -> bool {
        (self.min.x..=self.max.x).contains(&point.x)
            && (self.min.y..=self.max.y).contains(&point.y)
            && (self.min.z..=self.max.z).contains(&point.z)
    }

    pub fn center(&self) -> GridPoint {
        GridPoint::new(
            midpoint(self.min.x, self.max.x),
            midpoint(self.min.y, self.max.y),
            midpoint(self.min.z, self.max.z),
        )
    }

    /// Center column at floor level, the point guidance aims for.
    pub fn anchor(&self) -> GridPoint {
        self.center().with_y(self.min.y)
    }
}

fn midpoint(a: i32, b: i32) -> i32 {
    a + (b - a) / 2
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneTransition {
    Entered(String),
    Left(String),
}

/// Edge detector over player movement so zone entry fires once per visit.
#[derive(Debug, Default)]
pub struct ZoneTracker {
    zones: Vec<Zone>,
    inside: HashMap<PlayerId, String>,
}

impl ZoneTracker {
    pub fn new(zones: Vec<Zone>) -> Self {
        Self {
            zones,
            inside: HashMap::new(),
        }
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone_at(&self, point: GridPoint) -> Option<&Zone> {
        self.zones.iter().find(|zone| zone.contains(point))
    }

    /// Records a new position and reports the transitions it caused, the
    /// `Left` edge always before the `Entered` edge.
    pub fn update(&mut self, player: PlayerId, point: GridPoint) -> Vec<ZoneTransition> {
        let now_inside = self.zone_at(point).map(|zone| zone.name.clone());
        let previous = self.inside.get(&player).cloned();
        if previous == now_inside {
            return Vec::new();
        }

        let mut transitions = Vec::new();
        if let Some(left) = previous {
            transitions.push(ZoneTransition::Left(left));
        }
        match now_inside {
            Some(entered) => {
                self.inside.insert(player, entered.clone());
                transitions.push(ZoneTransition::Entered(entered));
            }
            None => {
                self.inside.remove(&player);
            }
        }
        transitions
    }

    pub fn forget(&mut self, player: PlayerId) {
        self.inside.remove(&player);
    }
}
