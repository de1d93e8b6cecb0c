//! Engine-wide constants and pool sizing configuration

use serde::{Deserialize, Serialize};

/// Maximum number of dimensions a tensor shape may carry.
pub const MAX_RANK: usize = 4;

/// Width of the operand snapshot attached to each consumer node.
///
/// Three slots are needed for the linear layer (input, weights, bias); the
/// fourth is headroom for future operators.
pub const MAX_OPERANDS: usize = 4;

/// Pool sizing knobs.
///
/// These only affect how often the pools fall back to fresh heap
/// allocations; semantics are identical for any sizing. `max_live_tensors`
/// optionally caps the number of tensors simultaneously checked out of the
/// pool, turning exhaustion into a reportable [`crate::Error::OutOfMemory`]
/// instead of unbounded growth.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoolSizing {
    /// Tensor slots created up front.
    pub tensor_slots: usize,
    /// Graph node slots created up front.
    pub node_slots: usize,
    /// Outgoing-link capacity reserved per node slot.
    pub link_capacity: usize,
    /// Optional ceiling on simultaneously live tensors.
    pub max_live_tensors: Option<usize>,
}

impl Default for PoolSizing {
    fn default() -> Self {
        Self {
            tensor_slots: 64,
            node_slots: 64,
            link_capacity: 4,
            max_live_tensors: None,
        }
    }
}

impl PoolSizing {
    /// Parse a sizing description from JSON.
    pub fn from_json(text: &str) -> crate::Result<Self> {
        serde_json::from_str(text).map_err(|e| crate::Error::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sizing_is_unbounded() {
        let sizing = PoolSizing::default();
        assert!(sizing.max_live_tensors.is_none());
        assert!(sizing.tensor_slots > 0);
    }

    #[test]
    fn sizing_round_trips_through_json() {
        let sizing = PoolSizing {
            tensor_slots: 8,
            node_slots: 4,
            link_capacity: 2,
            max_live_tensors: Some(16),
        };
        let text = serde_json::to_string(&sizing).expect("sizing serializes");
        let back = PoolSizing::from_json(&text).expect("sizing parses");
        assert_eq!(back.tensor_slots, 8);
        assert_eq!(back.max_live_tensors, Some(16));
    }
}
