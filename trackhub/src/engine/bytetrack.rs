//! ByteTrack-style association engine.
//!
//! Detections are split by confidence and associated to existing tracks in
//! rounds, cheapest IoU cost first:
//!
//! 1. high score detections against tracked and lost tracks (`match_thresh`)
//! 2. low score detections against tracks still unmatched (cost <= 0.5)
//! 3. leftover high score detections against tentative tracks (cost <= 0.7)
//!
//! Unmatched high score detections open tentative tracks, which become
//! visible once a second frame confirms them. Tracks opened on the very first
//! frame are confirmed immediately. Lost tracks are kept for
//! [`TrackerThresholds::max_time_lost`] frames before being dropped.
//!
//! Motion is a constant-velocity prediction of the box corner; the returned
//! geometry is always the raw detection, never the prediction.

use tracing::trace;

use super::{Detection, EngineError, EngineFactory, TrackedBox, TrackerThresholds, TrackingEngine};
use crate::geometry::CanonicalBox;

/// Detections below this confidence are ignored entirely.
const LOW_SCORE_THRESH: f64 = 0.1;

/// Maximum cost when rescuing tracks with low score detections.
const SECOND_ROUND_MAX_COST: f64 = 0.5;

/// Maximum cost when confirming tentative tracks.
const UNCONFIRMED_MAX_COST: f64 = 0.7;

/// New tracks need this much confidence above `track_thresh`.
const NEW_TRACK_MARGIN: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackState {
    Tentative,
    Tracked,
    Lost,
}

#[derive(Debug, Clone)]
struct Tracklet {
    /// Zero until the track is confirmed.
    id: u64,
    bbox: CanonicalBox,
    velocity: (f64, f64),
    state: TrackState,
    last_frame: u64,
    /// Detection matched in the current frame.
    matched: Option<Detection>,
}

impl Tracklet {
    fn new(detection: Detection, frame: u64) -> Self {
        Self {
            id: 0,
            bbox: detection.bbox,
            velocity: (0.0, 0.0),
            state: TrackState::Tentative,
            last_frame: frame,
            matched: None,
        }
    }

    fn predicted(&self, frame: u64) -> CanonicalBox {
        let dt = frame.saturating_sub(self.last_frame) as f64;
        CanonicalBox::new(
            self.bbox.x + self.velocity.0 * dt,
            self.bbox.y + self.velocity.1 * dt,
            self.bbox.width,
            self.bbox.height,
        )
    }

    fn observe(&mut self, detection: Detection, frame: u64) {
        let dt = frame.saturating_sub(self.last_frame).max(1) as f64;
        self.velocity = (
            (detection.bbox.x - self.bbox.x) / dt,
            (detection.bbox.y - self.bbox.y) / dt,
        );
        self.bbox = detection.bbox;
        self.last_frame = frame;
        self.state = TrackState::Tracked;
        self.matched = Some(detection);
    }
}

/// ByteTrack multi-object tracker.
#[derive(Debug)]
pub struct ByteTrack {
    thresholds: TrackerThresholds,
    tracks: Vec<Tracklet>,
    frame_id: u64,
    next_id: u64,
}

impl ByteTrack {
    pub fn new(thresholds: TrackerThresholds) -> Self {
        Self {
            thresholds,
            tracks: Vec::new(),
            frame_id: 0,
            next_id: 1,
        }
    }

    /// Number of frames processed so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_id
    }

    /// Number of tracks currently held, in any state.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    fn assign_id(&mut self, idx: usize) {
        if self.tracks[idx].id == 0 {
            self.tracks[idx].id = self.next_id;
            self.next_id += 1;
        }
    }

    /// Greedy lowest-cost assignment between tracks and detections.
    fn associate(
        &self,
        track_indices: &[usize],
        detections: &[Detection],
        det_indices: &[usize],
        max_cost: f64,
    ) -> Vec<(usize, usize)> {
        let mut candidates = Vec::new();
        for &t in track_indices {
            let predicted = self.tracks[t].predicted(self.frame_id);
            for &d in det_indices {
                let iou = predicted.iou(&detections[d].bbox);
                let cost = 1.0 - iou;
                if iou > 0.0 && cost <= max_cost {
                    candidates.push((cost, t, d));
                }
            }
        }
        candidates.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then(a.1.cmp(&b.1))
                .then(a.2.cmp(&b.2))
        });

        let mut used_tracks = vec![false; self.tracks.len()];
        let mut used_dets = vec![false; detections.len()];
        let mut pairs = Vec::new();
        for (_, t, d) in candidates {
            if !used_tracks[t] && !used_dets[d] {
                used_tracks[t] = true;
                used_dets[d] = true;
                pairs.push((t, d));
            }
        }
        pairs
    }
}

impl TrackingEngine for ByteTrack {
    fn update(&mut self, detections: &[Detection]) -> Result<Vec<TrackedBox>, EngineError> {
        if let Some(index) = detections
            .iter()
            .position(|d| !d.bbox.is_finite() || !d.confidence.is_finite())
        {
            return Err(EngineError::InvalidDetection {
                index,
                reason: "non-finite value".to_string(),
            });
        }

        self.frame_id += 1;
        let frame = self.frame_id;
        for track in &mut self.tracks {
            track.matched = None;
        }

        let track_thresh = self.thresholds.track_thresh;
        let mut det_used = vec![false; detections.len()];
        let high: Vec<usize> = (0..detections.len())
            .filter(|&i| detections[i].confidence >= track_thresh)
            .collect();
        let low: Vec<usize> = (0..detections.len())
            .filter(|&i| {
                let c = detections[i].confidence;
                (LOW_SCORE_THRESH..track_thresh).contains(&c)
            })
            .collect();

        // Round 1: high score detections against confirmed tracks.
        let confirmed: Vec<usize> = (0..self.tracks.len())
            .filter(|&i| self.tracks[i].state != TrackState::Tentative)
            .collect();
        for (t, d) in self.associate(&confirmed, detections, &high, self.thresholds.match_thresh) {
            self.tracks[t].observe(detections[d], frame);
            det_used[d] = true;
        }

        // Round 2: low score detections rescue tracks that were tracked last frame.
        let unmatched_tracked: Vec<usize> = confirmed
            .iter()
            .copied()
            .filter(|&i| {
                self.tracks[i].state == TrackState::Tracked && self.tracks[i].matched.is_none()
            })
            .collect();
        for (t, d) in self.associate(&unmatched_tracked, detections, &low, SECOND_ROUND_MAX_COST) {
            self.tracks[t].observe(detections[d], frame);
            det_used[d] = true;
        }
        for &i in &unmatched_tracked {
            if self.tracks[i].matched.is_none() {
                self.tracks[i].state = TrackState::Lost;
            }
        }

        // Round 3: remaining high score detections confirm tentative tracks.
        let tentative: Vec<usize> = (0..self.tracks.len())
            .filter(|&i| self.tracks[i].state == TrackState::Tentative)
            .collect();
        let remaining_high: Vec<usize> = high.iter().copied().filter(|&d| !det_used[d]).collect();
        for (t, d) in self.associate(&tentative, detections, &remaining_high, UNCONFIRMED_MAX_COST)
        {
            self.tracks[t].observe(detections[d], frame);
            self.assign_id(t);
            det_used[d] = true;
        }

        // Drop stale tentative and expired lost tracks before opening new ones.
        let max_time_lost = self.thresholds.max_time_lost();
        self.tracks.retain(|t| match t.state {
            TrackState::Tentative => false,
            TrackState::Lost => frame - t.last_frame <= max_time_lost,
            TrackState::Tracked => true,
        });

        for d in remaining_high {
            if det_used[d] || detections[d].confidence < track_thresh + NEW_TRACK_MARGIN {
                continue;
            }
            let mut track = Tracklet::new(detections[d], frame);
            if frame == 1 {
                track.state = TrackState::Tracked;
                track.matched = Some(detections[d]);
            }
            self.tracks.push(track);
            if frame == 1 {
                let idx = self.tracks.len() - 1;
                self.assign_id(idx);
            }
        }

        let output: Vec<TrackedBox> = self
            .tracks
            .iter()
            .filter(|t| t.state == TrackState::Tracked)
            .filter_map(|t| {
                t.matched.map(|detection| TrackedBox {
                    detection,
                    track_id: t.id,
                })
            })
            .collect();

        trace!(
            frame,
            detections = detections.len(),
            tracked = output.len(),
            held = self.tracks.len(),
            "ByteTrack update"
        );

        Ok(output)
    }
}

/// Factory producing [`ByteTrack`] engines.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteTrackFactory;

impl EngineFactory for ByteTrackFactory {
    fn create(&self, thresholds: &TrackerThresholds) -> Box<dyn TrackingEngine> {
        Box::new(ByteTrack::new(*thresholds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f64, y: f64, confidence: f64) -> Detection {
        Detection::new(CanonicalBox::new(x, y, 40.0, 80.0), confidence, 0)
    }

    fn ids(boxes: &[TrackedBox]) -> Vec<u64> {
        boxes.iter().map(|b| b.track_id).collect()
    }

    #[test]
    fn test_first_frame_tracks_are_confirmed() {
        let mut engine = ByteTrack::new(TrackerThresholds::default());
        let out = engine.update(&[det(10.0, 10.0, 0.9), det(300.0, 10.0, 0.9)]).unwrap();
        assert_eq!(ids(&out), vec![1, 2]);
        assert_eq!(out[0].detection, det(10.0, 10.0, 0.9));
    }

    #[test]
    fn test_same_detection_keeps_identity() {
        let mut engine = ByteTrack::new(TrackerThresholds::default());
        let first = engine.update(&[det(100.0, 100.0, 0.9)]).unwrap();
        let second = engine.update(&[det(100.0, 100.0, 0.9)]).unwrap();
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn test_moving_object_keeps_identity() {
        let mut engine = ByteTrack::new(TrackerThresholds::default());
        let mut last = Vec::new();
        for step in 0..10 {
            let out = engine
                .update(&[det(100.0 + step as f64 * 8.0, 100.0, 0.9)])
                .unwrap();
            assert_eq!(out.len(), 1);
            last.push(out[0].track_id);
        }
        assert!(last.iter().all(|&id| id == 1));
    }

    #[test]
    fn test_later_tracks_need_confirmation() {
        let mut engine = ByteTrack::new(TrackerThresholds::default());
        assert!(engine.update(&[]).unwrap().is_empty());

        // Seen once after the first frame: tentative, not reported.
        assert!(engine.update(&[det(50.0, 50.0, 0.9)]).unwrap().is_empty());
        // Seen again: confirmed.
        let out = engine.update(&[det(50.0, 50.0, 0.9)]).unwrap();
        assert_eq!(ids(&out), vec![1]);
    }

    #[test]
    fn test_low_score_does_not_open_track() {
        let mut engine = ByteTrack::new(TrackerThresholds::default());
        assert!(engine.update(&[det(10.0, 10.0, 0.2)]).unwrap().is_empty());
        assert_eq!(engine.track_count(), 0);
    }

    #[test]
    fn test_low_score_rescues_tracked_object() {
        let mut engine = ByteTrack::new(TrackerThresholds::default());
        engine.update(&[det(10.0, 10.0, 0.9)]).unwrap();
        let out = engine.update(&[det(12.0, 10.0, 0.15)]).unwrap();
        assert_eq!(ids(&out), vec![1]);
    }

    #[test]
    fn test_lost_track_recovers_within_buffer() {
        let mut engine = ByteTrack::new(TrackerThresholds::default());
        engine.update(&[det(10.0, 10.0, 0.9)]).unwrap();
        for _ in 0..5 {
            assert!(engine.update(&[]).unwrap().is_empty());
        }
        let out = engine.update(&[det(10.0, 10.0, 0.9)]).unwrap();
        assert_eq!(ids(&out), vec![1]);
    }

    #[test]
    fn test_lost_track_expires_after_buffer() {
        let thresholds = TrackerThresholds {
            track_buffer: 3,
            ..Default::default()
        };
        let mut engine = ByteTrack::new(thresholds);
        engine.update(&[det(10.0, 10.0, 0.9)]).unwrap();
        for _ in 0..5 {
            engine.update(&[]).unwrap();
        }
        assert_eq!(engine.track_count(), 0);

        // Reappearing object is a new, tentative track.
        assert!(engine.update(&[det(10.0, 10.0, 0.9)]).unwrap().is_empty());
        let out = engine.update(&[det(10.0, 10.0, 0.9)]).unwrap();
        assert_eq!(ids(&out), vec![2]);
    }

    #[test]
    fn test_non_finite_detection_is_rejected() {
        let mut engine = ByteTrack::new(TrackerThresholds::default());
        let bad = Detection::new(CanonicalBox::new(f64::NAN, 0.0, 1.0, 1.0), 0.9, 0);
        let err = engine.update(&[det(0.0, 0.0, 0.9), bad]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidDetection { index: 1, .. }));
        assert_eq!(engine.frame_count(), 0);
    }

    #[test]
    fn test_factory_creates_fresh_engines() {
        let factory = ByteTrackFactory;
        let mut a = factory.create(&TrackerThresholds::default());
        let mut b = factory.create(&TrackerThresholds::default());
        a.update(&[det(0.0, 0.0, 0.9)]).unwrap();
        a.update(&[det(0.0, 0.0, 0.9), det(500.0, 0.0, 0.9)]).unwrap();
        let out = b.update(&[det(500.0, 0.0, 0.9)]).unwrap();
        assert_eq!(ids(&out), vec![1]);
    }
}
