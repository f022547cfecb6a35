//! Bounded anchor history per track id.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::engine::TrackedBox;
use crate::geometry::Point;

use super::config::TraceConfig;

#[derive(Debug, Default)]
pub(crate) struct TraceHistory {
    paths: HashMap<u64, VecDeque<Point>>,
}

impl TraceHistory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends the anchor of every tracked box and forgets ids that are not
    /// part of this frame.
    pub(crate) fn record(&mut self, tracked: &[TrackedBox], config: TraceConfig) {
        let current: HashSet<u64> = tracked.iter().map(|t| t.track_id).collect();
        self.paths.retain(|id, _| current.contains(id));

        for t in tracked {
            let path = self.paths.entry(t.track_id).or_default();
            path.push_back(t.detection.bbox.anchor(config.position));
            while path.len() > config.length {
                path.pop_front();
            }
        }
    }

    /// Paths of the given boxes, oldest point first, in box order.
    pub(crate) fn paths_for(&self, tracked: &[TrackedBox]) -> Vec<(u64, Vec<Point>)> {
        tracked
            .iter()
            .filter_map(|t| {
                self.paths
                    .get(&t.track_id)
                    .map(|path| (t.track_id, path.iter().copied().collect()))
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.paths.len()
    }
}
