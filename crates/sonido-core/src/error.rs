//! Control-surface error types (§7).
//!
//! The audio path itself never returns a `Result` — it clamps and flushes
//! non-finite values instead (see [`crate::PolyFloat::flush_non_finite`]).
//! These types cover the fallible control-surface operations: graph
//! mutation ([`crate::graph::GraphError`], declared alongside the graph it
//! describes), modulation routing ([`ModulationError`]), and the top-level
//! [`EngineError`] that wraps both for [`crate::graph`]'s router-facing API.

#[cfg(not(feature = "std"))]
use alloc::string::String;

use crate::graph::GraphError;

/// Errors from modulation bank connect/disconnect requests (§4.4).
#[derive(Debug)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum ModulationError {
    /// No free slot remained in the fixed 64-entry bank.
    #[cfg_attr(feature = "std", error("modulation bank is full"))]
    BankFull,
    /// `source_name == destination_name`, which would let a slot modulate
    /// its own amount control.
    #[cfg_attr(feature = "std", error("modulation self-loop rejected: {0}"))]
    SelfLoop(String),
    /// The given slot index is out of range for the bank.
    #[cfg_attr(feature = "std", error("modulation slot {0} out of range"))]
    InvalidSlot(usize),
    /// No connection matches the given source/destination pair.
    #[cfg_attr(feature = "std", error("no modulation connection from {0} to {1}"))]
    ConnectionNotFound(String, String),
}

/// Top-level error returned by [`crate::graph`]'s engine-facing control
/// surface: graph mutation and modulation routing funneled into one type.
#[derive(Debug)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum EngineError {
    /// A graph topology mutation failed.
    #[cfg_attr(feature = "std", error("graph error: {0}"))]
    Graph(GraphError),
    /// A modulation routing request failed.
    #[cfg_attr(feature = "std", error("modulation error: {0}"))]
    Modulation(ModulationError),
}

#[cfg(feature = "std")]
impl From<GraphError> for EngineError {
    fn from(e: GraphError) -> Self {
        Self::Graph(e)
    }
}

#[cfg(feature = "std")]
impl From<ModulationError> for EngineError {
    fn from(e: ModulationError) -> Self {
        Self::Modulation(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "std"))]
    use alloc::format;

    #[test]
    fn modulation_error_debug_is_informative() {
        let err = ModulationError::BankFull;
        assert!(format!("{err:?}").contains("BankFull"));
    }

    #[cfg(feature = "std")]
    #[test]
    fn engine_error_wraps_modulation_error() {
        let err: EngineError = ModulationError::InvalidSlot(99).into();
        assert!(matches!(err, EngineError::Modulation(ModulationError::InvalidSlot(99))));
    }
}
