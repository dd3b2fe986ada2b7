//! Bounded history of secant pairs for limited-memory quasi-Newton methods.
//!
//! Each accepted iteration contributes one pair `(s_k, y_k)` with
//! `s_k = x_{k+1} - x_k` and `y_k = g_{k+1} - g_k`. The two-loop recursion
//! only ever needs the `m` most recent pairs together with
//! `ρ_k = 1 / <s_k, y_k>`, so the buffer keeps exactly that.
//!
//! # Storage
//!
//! The buffer is a fixed-capacity arena: slots are allocated lazily up to
//! `capacity`, after which the oldest slot is overwritten in place. No
//! allocation happens once the buffer is full, and the preconditioner walks
//! the slots by index.
//!
//! # Curvature Condition
//!
//! A pair is only stored when `<s, y> > ε`. Otherwise the implied inverse
//! Hessian approximation could lose positive definiteness; such pairs are
//! rejected and the buffer is left untouched.

use crate::{
    error::{OptimizerError, Result},
    types::{DVector, Scalar},
};
use num_traits::Float;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One secant pair with its cached inverse curvature.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(
        serialize = "T: Scalar + Serialize",
        deserialize = "T: Scalar + Deserialize<'de>"
    ))
)]
pub struct SecantPair<T: Scalar> {
    /// Position change `s = x_{k+1} - x_k`
    pub position_delta: DVector<T>,
    /// Gradient change `y = g_{k+1} - g_k`
    pub gradient_delta: DVector<T>,
    /// `ρ = 1 / <s, y>`
    pub inverse_curvature: T,
}

impl<T: Scalar> SecantPair<T> {
    /// Builds a pair, or returns `None` if `<s, y> ≤ ε`.
    ///
    /// Non-finite curvature is rejected as well.
    pub fn new(position_delta: DVector<T>, gradient_delta: DVector<T>) -> Option<Self> {
        let curvature = position_delta.dot(&gradient_delta);
        if !(curvature > T::CURVATURE_EPSILON) || !<T as Float>::is_finite(curvature) {
            return None;
        }
        Some(Self {
            position_delta,
            gradient_delta,
            inverse_curvature: T::one() / curvature,
        })
    }

    /// Returns `<s, y>`.
    pub fn curvature(&self) -> T {
        T::one() / self.inverse_curvature
    }
}

/// Fixed-capacity FIFO ring buffer of secant pairs.
///
/// Deserialization goes through [`HistoryRecord`] and rejects checkpoints
/// that break the ring-buffer or curvature invariants.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(
        try_from = "HistoryRecord<T>",
        bound(
            serialize = "T: Scalar + Serialize",
            deserialize = "T: Scalar + Deserialize<'de>"
        )
    )
)]
pub struct HistoryBuffer<T: Scalar> {
    capacity: usize,
    slots: Vec<SecantPair<T>>,
    /// Index of the oldest stored pair
    head: usize,
    len: usize,
}

impl<T: Scalar> HistoryBuffer<T> {
    /// Creates an empty history holding at most `capacity` pairs.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(OptimizerError::invalid_configuration(
                "history must hold at least one pair",
                "memory_size",
                capacity,
            ));
        }
        Ok(Self {
            capacity,
            slots: Vec::with_capacity(capacity),
            head: 0,
            len: 0,
        })
    }

    /// Maximum number of stored pairs.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of stored pairs.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no pair is stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Dimension of the stored vectors, if any pair is stored.
    pub fn dimension(&self) -> Option<usize> {
        self.newest().map(|p| p.position_delta.len())
    }

    /// Removes every pair.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
        self.len = 0;
    }

    /// Attempts to store the pair `(position_delta, gradient_delta)`.
    ///
    /// Returns `Ok(true)` if stored, `Ok(false)` if rejected by the
    /// curvature condition. When the buffer is full the oldest pair is
    /// evicted.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the two vectors, or the vectors and
    /// the pairs already stored, disagree in length.
    pub fn push(&mut self, position_delta: DVector<T>, gradient_delta: DVector<T>) -> Result<bool> {
        if position_delta.len() != gradient_delta.len() {
            return Err(OptimizerError::dimension_mismatch(
                position_delta.len(),
                gradient_delta.len(),
            ));
        }
        if let Some(dim) = self.dimension() {
            if dim != position_delta.len() {
                return Err(OptimizerError::dimension_mismatch(dim, position_delta.len()));
            }
        }

        match SecantPair::new(position_delta, gradient_delta) {
            Some(pair) => {
                self.push_pair(pair);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn push_pair(&mut self, pair: SecantPair<T>) {
        if self.slots.len() < self.capacity {
            // Still filling: slots are in insertion order and head stays at 0.
            self.slots.push(pair);
            self.len += 1;
        } else {
            self.slots[self.head] = pair;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    /// Pair at logical position `i`, where 0 is the oldest.
    pub fn get(&self, i: usize) -> Option<&SecantPair<T>> {
        if i >= self.len {
            return None;
        }
        self.slots.get((self.head + i) % self.slots.len())
    }

    /// Most recently stored pair.
    pub fn newest(&self) -> Option<&SecantPair<T>> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    /// Iterates over stored pairs from oldest to newest.
    pub fn pairs(&self) -> impl DoubleEndedIterator<Item = &SecantPair<T>> + ExactSizeIterator + '_ {
        (0..self.len).map(move |i| &self.slots[(self.head + i) % self.slots.len()])
    }
}

/// Unchecked field-for-field image of a [`HistoryBuffer`].
///
/// This is what a checkpoint contains. Converting it back validates every
/// invariant the buffer relies on.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(deserialize = "T: Scalar + Deserialize<'de>"))
)]
pub struct HistoryRecord<T: Scalar> {
    /// Maximum number of pairs
    pub capacity: usize,
    /// Occupied slots in storage order
    pub slots: Vec<SecantPair<T>>,
    /// Slot of the oldest pair
    pub head: usize,
    /// Number of stored pairs
    pub len: usize,
}

impl<T: Scalar> TryFrom<HistoryRecord<T>> for HistoryBuffer<T> {
    type Error = OptimizerError;

    fn try_from(record: HistoryRecord<T>) -> Result<Self> {
        let HistoryRecord {
            capacity,
            slots,
            head,
            len,
        } = record;

        let mut history = Self::new(capacity)?;
        if slots.len() > capacity {
            return Err(OptimizerError::invalid_history(format!(
                "{} pairs stored with capacity {capacity}",
                slots.len()
            )));
        }
        if len != slots.len() {
            return Err(OptimizerError::invalid_history(format!(
                "length {len} but {} pairs stored",
                slots.len()
            )));
        }
        // The head only moves once every slot is occupied.
        let head_limit = if len == capacity { capacity } else { 1 };
        if head >= head_limit {
            return Err(OptimizerError::invalid_history(format!(
                "oldest pair at slot {head} with {len} of {capacity} slots used"
            )));
        }

        let tolerance = <T as Float>::sqrt(<T as Float>::epsilon());
        for (i, stored) in slots.into_iter().enumerate() {
            let SecantPair {
                position_delta,
                gradient_delta,
                inverse_curvature,
            } = stored;
            if let Some(dim) = history.slots.first().map(|p| p.position_delta.len()) {
                if position_delta.len() != dim {
                    return Err(OptimizerError::dimension_mismatch(dim, position_delta.len()));
                }
            }
            if position_delta.len() != gradient_delta.len() {
                return Err(OptimizerError::dimension_mismatch(
                    position_delta.len(),
                    gradient_delta.len(),
                ));
            }

            let pair = SecantPair::new(position_delta, gradient_delta).ok_or_else(|| {
                OptimizerError::invalid_history(format!(
                    "slot {i} fails the curvature condition"
                ))
            })?;
            let drift = <T as Float>::abs(pair.inverse_curvature - inverse_curvature);
            if !(drift <= tolerance * <T as Float>::abs(pair.inverse_curvature)) {
                return Err(OptimizerError::invalid_history(format!(
                    "slot {i} stores inverse curvature {inverse_curvature}, expected {}",
                    pair.inverse_curvature
                )));
            }
            history.slots.push(pair);
        }

        history.head = head;
        history.len = len;
        Ok(history)
    }
}
