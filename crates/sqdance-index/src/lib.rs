//! Spatial indexing abstractions for nearest free lattice slot queries.

use std::collections::HashMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors emitted by slot index implementations.
#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., non-positive cell size).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A slot coordinate was NaN or infinite.
    #[error("slot {index} has a non-finite coordinate")]
    NonFiniteSlot { index: usize },
}

/// Common behaviour exposed by slot indices.
///
/// Slots are identified by their position in the slice handed to [`SlotIndex::rebuild`].
/// Availability changes every round, so queries take an `accept` filter instead of
/// forcing a rebuild whenever a slot is claimed.
pub trait SlotIndex: Send {
    /// Stable identifier for logging.
    fn kind(&self) -> &'static str;

    /// Rebuild internal structures from slot coordinates.
    fn rebuild(&mut self, slots: &[(f64, f64)]) -> Result<(), IndexError>;

    /// Return the accepted slot closest to `target` and its squared distance.
    ///
    /// Equal distances resolve to the lowest slot index.
    fn nearest(
        &self,
        target: (f64, f64),
        accept: &mut dyn FnMut(usize) -> bool,
    ) -> Option<(usize, OrderedFloat<f64>)>;
}

fn distance_sq(a: (f64, f64), b: (f64, f64)) -> OrderedFloat<f64> {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    OrderedFloat(dx * dx + dy * dy)
}

fn validate_slots(slots: &[(f64, f64)]) -> Result<(), IndexError> {
    match slots
        .iter()
        .position(|(x, y)| !x.is_finite() || !y.is_finite())
    {
        Some(index) => Err(IndexError::NonFiniteSlot { index }),
        None => Ok(()),
    }
}

/// Exhaustive scan over every slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearScanIndex {
    #[serde(skip)]
    slots: Vec<(f64, f64)>,
}

impl LinearScanIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl SlotIndex for LinearScanIndex {
    fn kind(&self) -> &'static str {
        "linear-scan"
    }

    fn rebuild(&mut self, slots: &[(f64, f64)]) -> Result<(), IndexError> {
        validate_slots(slots)?;
        self.slots.clear();
        self.slots.extend_from_slice(slots);
        Ok(())
    }

    fn nearest(
        &self,
        target: (f64, f64),
        accept: &mut dyn FnMut(usize) -> bool,
    ) -> Option<(usize, OrderedFloat<f64>)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(idx, _)| accept(*idx))
            .map(|(idx, slot)| (distance_sq(target, *slot), idx))
            .min()
            .map(|(dist, idx)| (idx, dist))
    }
}

/// Uniform bucket grid searched in expanding square rings around the target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketGridIndex {
    /// Edge length of each bucket.
    pub cell_size: f64,
    #[serde(skip)]
    slots: Vec<(f64, f64)>,
    #[serde(skip)]
    buckets: HashMap<(i64, i64), Vec<usize>>,
    #[serde(skip)]
    bounds: Option<((i64, i64), (i64, i64))>,
}

impl BucketGridIndex {
    /// Create a new bucket grid with the provided cell size.
    pub fn new(cell_size: f64) -> Result<Self, IndexError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(IndexError::InvalidConfig("cell_size must be positive"));
        }
        Ok(Self {
            cell_size,
            slots: Vec::new(),
            buckets: HashMap::new(),
            bounds: None,
        })
    }

    fn bucket_of(&self, point: (f64, f64)) -> (i64, i64) {
        (
            (point.0 / self.cell_size).floor() as i64,
            (point.1 / self.cell_size).floor() as i64,
        )
    }

    /// Visits every bucket on the square ring at Chebyshev distance `ring` around `center`.
    fn for_each_ring_bucket(
        &self,
        center: (i64, i64),
        ring: i64,
        visitor: &mut dyn FnMut(&[usize]),
    ) {
        let (cx, cy) = center;
        let mut visit = |key: (i64, i64)| {
            if let Some(bucket) = self.buckets.get(&key) {
                visitor(bucket);
            }
        };
        if ring == 0 {
            visit(center);
            return;
        }
        for x in (cx - ring)..=(cx + ring) {
            visit((x, cy - ring));
            visit((x, cy + ring));
        }
        for y in (cy - ring + 1)..(cy + ring) {
            visit((cx - ring, y));
            visit((cx + ring, y));
        }
    }
}

impl Default for BucketGridIndex {
    fn default() -> Self {
        Self {
            cell_size: 2.0,
            slots: Vec::new(),
            buckets: HashMap::new(),
            bounds: None,
        }
    }
}

impl SlotIndex for BucketGridIndex {
    fn kind(&self) -> &'static str {
        "bucket-grid"
    }

    fn rebuild(&mut self, slots: &[(f64, f64)]) -> Result<(), IndexError> {
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(IndexError::InvalidConfig("cell_size must be positive"));
        }
        validate_slots(slots)?;
        self.slots.clear();
        self.slots.extend_from_slice(slots);
        self.buckets.clear();
        self.bounds = None;
        for (idx, slot) in slots.iter().enumerate() {
            let key = self.bucket_of(*slot);
            self.buckets.entry(key).or_default().push(idx);
            self.bounds = Some(match self.bounds {
                None => (key, key),
                Some((lo, hi)) => (
                    (lo.0.min(key.0), lo.1.min(key.1)),
                    (hi.0.max(key.0), hi.1.max(key.1)),
                ),
            });
        }
        Ok(())
    }

    fn nearest(
        &self,
        target: (f64, f64),
        accept: &mut dyn FnMut(usize) -> bool,
    ) -> Option<(usize, OrderedFloat<f64>)> {
        let ((min_x, min_y), (max_x, max_y)) = self.bounds?;
        let center = self.bucket_of(target);
        let last_ring = [
            (center.0 - min_x).abs(),
            (max_x - center.0).abs(),
            (center.1 - min_y).abs(),
            (max_y - center.1).abs(),
        ]
        .into_iter()
        .max()
        .unwrap_or(0);

        let mut best: Option<(OrderedFloat<f64>, usize)> = None;
        for ring in 0..=last_ring {
            // Anything on this ring or beyond is at least (ring - 1) buckets away.
            if let Some((dist, _)) = best {
                let reach = (ring - 1).max(0) as f64 * self.cell_size;
                if dist.0 < reach * reach {
                    break;
                }
            }
            self.for_each_ring_bucket(center, ring, &mut |bucket| {
                for &idx in bucket {
                    if !accept(idx) {
                        continue;
                    }
                    let candidate = (distance_sq(target, self.slots[idx]), idx);
                    if best.is_none_or(|current| candidate < current) {
                        best = Some(candidate);
                    }
                }
            });
        }
        best.map(|(dist, idx)| (idx, dist))
    }
}
