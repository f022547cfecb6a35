//! Named filter regions.

use crate::engine::TrackedBox;
use crate::geometry::{CanonicalBox, GeometryError, Polygon, TriggerPosition};

use super::config::RegionConfig;

/// A polygon plus the box anchor that decides membership.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterRegion {
    name: String,
    polygon: Polygon,
    trigger: TriggerPosition,
}

impl FilterRegion {
    pub fn new(
        name: impl Into<String>,
        polygon: Polygon,
        trigger: TriggerPosition,
    ) -> Self {
        Self {
            name: name.into(),
            polygon,
            trigger,
        }
    }

    pub fn from_config(name: &str, config: &RegionConfig) -> Result<Self, GeometryError> {
        Ok(Self::new(
            name,
            Polygon::new(&config.polygon)?,
            config.trigger_position,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }

    pub fn trigger(&self) -> TriggerPosition {
        self.trigger
    }

    /// Whether the box anchor lies inside the polygon.
    pub fn contains(&self, bbox: &CanonicalBox) -> bool {
        self.polygon.contains(bbox.anchor(self.trigger))
    }

    /// Track ids of the boxes inside the region, in input order.
    pub fn filter(&self, tracked: &[TrackedBox]) -> Vec<u64> {
        tracked
            .iter()
            .filter(|t| self.contains(&t.detection.bbox))
            .map(|t| t.track_id)
            .collect()
    }
}
