//! Pass ordering guard shared by all layers
//!
//! Each layer owns a `PassCache`: the input seen by the last forward pass and
//! the state tag that decides which call may come next.

use std::fmt;

use crate::error::{NnError, Result};
use crate::tensor::Tensor;

/// Where a layer is in the forward -> backward -> update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerState {
    /// No forward pass yet.
    Fresh,
    /// Input cached, gradients not derived from it yet.
    Forwarded,
    /// Gradients derived from the cached input.
    Backwarded,
}

impl fmt::Display for LayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LayerState::Fresh => "fresh",
            LayerState::Forwarded => "forwarded",
            LayerState::Backwarded => "backwarded",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PassCache {
    state: LayerState,
    input: Option<Tensor>,
}

impl PassCache {
    pub fn new() -> Self {
        Self {
            state: LayerState::Fresh,
            input: None,
        }
    }

    pub fn state(&self) -> LayerState {
        self.state
    }

    /// Replace the cached input; any earlier input is dropped.
    pub fn store(&mut self, input: &Tensor) {
        self.input = Some(input.clone());
        self.state = LayerState::Forwarded;
    }

    /// Input of the last forward pass.
    ///
    /// Only a `Forwarded` layer may run backward: a second backward on the
    /// same input would see parameters already changed by an update.
    pub fn input(&self, layer: &str) -> Result<&Tensor> {
        match (self.state, &self.input) {
            (LayerState::Forwarded, Some(input)) => Ok(input),
            _ => Err(NnError::ordering(layer, "backward", self.state)),
        }
    }

    pub fn mark_backwarded(&mut self) {
        self.state = LayerState::Backwarded;
    }

    pub fn check_update(&self, layer: &str) -> Result<()> {
        if self.state != LayerState::Backwarded {
            return Err(NnError::ordering(layer, "update_parameters", self.state));
        }
        Ok(())
    }
}
