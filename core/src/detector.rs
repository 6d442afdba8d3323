//! Turns elapsed-time ticks into "pause point reached" transitions.

use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;

use crate::media::PlaybackAdapter;
use crate::model::{BlockKey, PausePoint, VideoBlock};
use crate::store::CompletionStore;

/// Emitted once when playback reaches an unsolved pause point.
#[derive(Debug, Clone, PartialEq)]
pub struct Reached {
    pub key: BlockKey,
    pub point: PausePoint,
    /// The tick that triggered the transition.
    pub elapsed: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Gate {
    Armed,
    Suspended(BlockKey),
}

/// Armed/Suspended gate over the sorted pause points of one video block.
///
/// While suspended every tick is ignored, however many providers keep
/// sending after `pause()`. Only [`CheckpointDetector::resume`] re-arms it.
pub struct CheckpointDetector {
    video_block_id: String,
    points: Vec<PausePoint>,
    tolerance: f64,
    store: Arc<CompletionStore>,
    gate: Mutex<Gate>,
}

impl CheckpointDetector {
    pub fn new(block: &VideoBlock, store: Arc<CompletionStore>, tolerance_seconds: f64) -> Self {
        Self {
            video_block_id: block.id.clone(),
            points: block.sorted_pause_points(),
            tolerance: tolerance_seconds,
            store,
            gate: Mutex::new(Gate::Armed),
        }
    }

    pub fn points(&self) -> &[PausePoint] {
        &self.points
    }

    fn key(&self, point: &PausePoint) -> BlockKey {
        BlockKey::new(&self.video_block_id, &point.id)
    }

    /// Earliest pause point that is not completed yet.
    pub fn next_pending(&self) -> Option<&PausePoint> {
        self.points
            .iter()
            .find(|p| !self.store.is_completed(&self.key(p)))
    }

    /// Feed one tick. Pauses `adapter` and returns the reached point on the
    /// Armed to Suspended transition, `None` otherwise.
    pub fn on_tick(&self, elapsed: f64, adapter: &dyn PlaybackAdapter) -> Option<Reached> {
        if !elapsed.is_finite() {
            debug!("Ignoring non-finite tick {}", elapsed);
            return None;
        }

        let mut gate = self.gate.lock();
        if let Gate::Suspended(key) = &*gate {
            debug!("Tick {:.2}s ignored, waiting on {}", elapsed, key);
            return None;
        }

        let point = self.next_pending()?;
        if point.timestamp_seconds > elapsed + self.tolerance {
            return None;
        }

        let key = self.key(point);
        info!(
            "Pause point {} at {:.2}s reached at {:.2}s",
            key, point.timestamp_seconds, elapsed
        );
        *gate = Gate::Suspended(key.clone());
        drop(gate);

        adapter.pause();
        Some(Reached {
            key,
            point: point.clone(),
            elapsed,
        })
    }

    /// Return to Armed after the active challenge was resolved.
    pub fn resume(&self) {
        let mut gate = self.gate.lock();
        if let Gate::Suspended(key) = &*gate {
            debug!("Re-arming after {}", key);
        }
        *gate = Gate::Armed;
    }

    pub fn is_armed(&self) -> bool {
        *self.gate.lock() == Gate::Armed
    }

    pub fn suspended_on(&self) -> Option<BlockKey> {
        match &*self.gate.lock() {
            Gate::Suspended(key) => Some(key.clone()),
            Gate::Armed => None,
        }
    }
}
