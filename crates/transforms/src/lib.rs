//! Coordinate frame management for SLAM and navigation.
//!
//! Maintains a per-frame-pair set of time-ordered transform buffers and
//! answers interpolated lookups between any two frames:
//! - `map`: Global fixed frame, SLAM-corrected
//! - `odom`: Continuous odometry frame, drifts over time
//! - `base_link`: Robot body frame
//! - sensor frames: fixed offsets published as static transforms
//!
//! Frames form an undirected graph; lookups that have no direct or inverse
//! buffer are resolved by BFS over the graph and chain composition.
//! Designed for single-threaded cooperative use on the host's update thread.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use thiserror::Error;
use tracing::{debug, info, trace, warn};
use types::Pose;

mod buffer;
pub mod msg;
mod quaternion;

pub use buffer::{FrameBuffer, StampedTransform};
pub use msg::TransformEntry;
pub use quaternion::Quaternion;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("no transform data for {parent} <- {child}")]
    NoData { parent: String, child: String },
    #[error("requested time {requested} outside buffered range [{earliest}, {latest}]")]
    Extrapolation {
        requested: f64,
        earliest: f64,
        latest: f64,
    },
    #[error("no path between frames {from} and {to}")]
    NoPath { from: String, to: String },
}

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long dynamic transforms are retained, in seconds
    pub buffer_duration: f64,
    /// Requested broker-side throttle in Hz (0 = no throttle). Forwarded
    /// opaquely to the transport; the registry itself never throttles.
    pub tf_throttle_rate: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            buffer_duration: 30.0,
            tf_throttle_rate: 0.0,
        }
    }
}

/// Synchronous notifications the registry emits on its ingestion thread.
///
/// Hosts may fan these out to channels, callbacks, or a reactive stream.
pub trait RegistryObserver {
    /// The set of known frames changed.
    fn frames_changed(&mut self, _frames: &BTreeSet<String>) {}
    /// The registry started (or stopped) receiving data.
    fn active_changed(&mut self, _active: bool) {}
}

/// Directed buffer key: transforms mapping `child` coordinates into `parent`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PairKey {
    parent: String,
    child: String,
}

impl PairKey {
    fn new(parent: &str, child: &str) -> Self {
        Self {
            parent: parent.to_string(),
            child: child.to_string(),
        }
    }
}

/// Time-buffered transform registry.
pub struct TransformRegistry {
    config: RegistryConfig,
    /// Dynamic buffers, age-evicted at `buffer_duration`
    dynamic: HashMap<PairKey, FrameBuffer>,
    /// Static buffers, never evicted, lookups always return latest
    statics: HashMap<PairKey, FrameBuffer>,
    /// Undirected frame adjacency
    adjacency: HashMap<String, HashSet<String>>,
    known_frames: BTreeSet<String>,
    active: bool,
    observer: Option<Box<dyn RegistryObserver>>,
}

impl TransformRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            dynamic: HashMap::new(),
            statics: HashMap::new(),
            adjacency: HashMap::new(),
            known_frames: BTreeSet::new(),
            active: false,
            observer: None,
        }
    }

    /// Install the observer notified on ingestion-side signal changes.
    pub fn set_observer(&mut self, observer: Box<dyn RegistryObserver>) {
        self.observer = Some(observer);
    }

    /// Requested broker-side throttle rate (forwarded by the host transport).
    pub fn tf_throttle_rate(&self) -> f64 {
        self.config.tf_throttle_rate
    }

    /// All frames seen so far, in sorted order.
    pub fn known_frames(&self) -> &BTreeSet<String> {
        &self.known_frames
    }

    /// Whether any transform has been ingested.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Ingest a batch of already-decoded transforms.
    pub fn insert_transforms(&mut self, transforms: Vec<StampedTransform>, is_static: bool) {
        if transforms.is_empty() {
            return;
        }
        let mut frames_changed = false;
        for tf in transforms {
            frames_changed |= self.insert_one(tf, is_static);
        }
        self.publish_signals(frames_changed);
    }

    /// Ingest a wire-shaped stamped-transforms list.
    ///
    /// Entries that fail to decode are dropped individually; one malformed
    /// entry never poisons the rest of the batch.
    pub fn ingest_json(&mut self, entries: &[serde_json::Value], is_static: bool) {
        let mut frames_changed = false;
        let mut inserted = false;
        for value in entries {
            match serde_json::from_value::<TransformEntry>(value.clone()) {
                Ok(entry) => {
                    frames_changed |= self.insert_one(entry.into_stamped(), is_static);
                    inserted = true;
                }
                Err(e) => {
                    warn!(error = %e, "dropping malformed transform entry");
                }
            }
        }
        if inserted {
            self.publish_signals(frames_changed);
        }
    }

    /// Look up the transform taking `child` coordinates into `parent` at
    /// time `t` (`t == 0` means latest).
    ///
    /// Buffer-level failures collapse to `None` here; the caller re-queries
    /// on its next frame.
    pub fn lookup_transform(&self, parent: &str, child: &str, t: f64) -> Option<StampedTransform> {
        if !self.known_frames.contains(parent) || !self.known_frames.contains(child) {
            return None;
        }

        match self.lookup_pair(parent, child, t) {
            Ok(tf) => return Some(tf),
            Err(e) => trace!(parent, child, error = %e, "direct lookup missed"),
        }

        match self.lookup_chained(parent, child, t) {
            Ok(tf) => Some(tf),
            Err(e) => {
                debug!(parent, child, t, error = %e, "transform lookup failed");
                None
            }
        }
    }

    /// Planar pose of `frame` in `reference` at the latest common time.
    pub fn latest_pose(&self, frame: &str, reference: &str) -> Option<Pose> {
        let tf = self.lookup_transform(reference, frame, 0.0)?;
        Some(Pose::new(
            tf.translation.x,
            tf.translation.y,
            tf.rotation.yaw(),
        ))
    }

    /// Whether a chain of buffers connects two frames.
    pub fn frames_connected(&self, a: &str, b: &str) -> bool {
        self.known_frames.contains(a)
            && self.known_frames.contains(b)
            && self.find_path(b, a).is_some()
    }

    /// Insert one transform; returns whether the frame set grew.
    fn insert_one(&mut self, tf: StampedTransform, is_static: bool) -> bool {
        let key = PairKey::new(&tf.parent, &tf.child);
        let (bucket, max_age) = if is_static {
            (&mut self.statics, 0.0)
        } else {
            (&mut self.dynamic, self.config.buffer_duration)
        };
        bucket
            .entry(key)
            .or_insert_with(|| FrameBuffer::new(tf.parent.clone(), tf.child.clone(), max_age))
            .insert(tf.clone());

        self.adjacency
            .entry(tf.parent.clone())
            .or_default()
            .insert(tf.child.clone());
        self.adjacency
            .entry(tf.child.clone())
            .or_default()
            .insert(tf.parent.clone());

        let mut grew = self.known_frames.insert(tf.parent.clone());
        grew |= self.known_frames.insert(tf.child);
        if grew {
            info!(parent = %tf.parent, "frame graph grew");
        }
        grew
    }

    fn publish_signals(&mut self, frames_changed: bool) {
        let became_active = !self.active;
        self.active = true;
        if let Some(observer) = self.observer.as_mut() {
            if frames_changed {
                observer.frames_changed(&self.known_frames);
            }
            if became_active {
                observer.active_changed(true);
            }
        }
    }

    /// Direct buffered lookup for one ordered pair: static bucket first
    /// (latest entry), then dynamic at `t`, then the reverse buffer inverted.
    fn lookup_pair(
        &self,
        parent: &str,
        child: &str,
        t: f64,
    ) -> Result<StampedTransform, TransformError> {
        match self.lookup_directed(parent, child, t) {
            Ok(tf) => Ok(tf),
            Err(direct_err) => match self.lookup_directed(child, parent, t) {
                Ok(tf) => Ok(tf.inverse()),
                Err(_) => Err(direct_err),
            },
        }
    }

    fn lookup_directed(
        &self,
        parent: &str,
        child: &str,
        t: f64,
    ) -> Result<StampedTransform, TransformError> {
        let key = PairKey::new(parent, child);
        if let Some(buf) = self.statics.get(&key) {
            return buf.lookup(0.0);
        }
        if let Some(buf) = self.dynamic.get(&key) {
            return buf.lookup(t);
        }
        Err(TransformError::NoData {
            parent: parent.to_string(),
            child: child.to_string(),
        })
    }

    /// Resolve a lookup through the frame graph: BFS from `child` to
    /// `parent`, then compose buffered transforms along the path.
    fn lookup_chained(
        &self,
        parent: &str,
        child: &str,
        t: f64,
    ) -> Result<StampedTransform, TransformError> {
        let path = self
            .find_path(child, parent)
            .ok_or_else(|| TransformError::NoPath {
                from: child.to_string(),
                to: parent.to_string(),
            })?;

        let mut result = StampedTransform::identity(path[0].clone(), child.to_string());
        result.stamp = t;
        for pair in path.windows(2) {
            let step = self.lookup_pair(&pair[1], &pair[0], t)?;
            result.translation = step.rotation.rotate(result.translation) + step.translation;
            result.rotation = step.rotation * result.rotation;
            result.parent = step.parent;
        }
        Ok(result)
    }

    /// Breadth-first path through the undirected frame graph.
    fn find_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        if from == to {
            return Some(vec![from.to_string()]);
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut parents: HashMap<&str, &str> = HashMap::new();
        let mut frontier: VecDeque<&str> = VecDeque::new();
        visited.insert(from);
        frontier.push_back(from);

        while let Some(current) = frontier.pop_front() {
            if current == to {
                break;
            }
            if let Some(neighbors) = self.adjacency.get(current) {
                for next in neighbors {
                    if visited.insert(next.as_str()) {
                        parents.insert(next.as_str(), current);
                        frontier.push_back(next.as_str());
                    }
                }
            }
        }

        let mut path = vec![to.to_string()];
        let mut cursor = to;
        while cursor != from {
            cursor = parents.get(cursor).copied()?;
            path.push(cursor.to_string());
        }
        path.reverse();
        Some(path)
    }
}
