//! Graph replication
//!
//! One model definition, N device replicas. Each replica binds a
//! device-local batch and shares the parameter sets allocated by the first
//! build. Construction goes through an explicit per-run `GraphContext`
//! rather than a process-wide graph, so two runs in one process cannot
//! bleed into each other; the context is dropped when its run ends.

use crate::config::TrainSpec;
use crate::data::DataSource;
use crate::error::{Error, Result};
use crate::model::ModelDefinition;
use crate::summary::SummaryHub;
use std::str::FromStr;

/// Which entry of the loss mapping a replica contributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossKind {
    Generator,
    Discriminator,
}

impl FromStr for LossKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "g" => Ok(LossKind::Generator),
            "d" => Ok(LossKind::Discriminator),
            other => Err(Error::UnsupportedLossType(other.to_string())),
        }
    }
}

impl std::fmt::Display for LossKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LossKind::Generator => write!(f, "g"),
            LossKind::Discriminator => write!(f, "d"),
        }
    }
}

/// One replica's tagged scalar loss
pub struct LossTerm {
    pub kind: LossKind,
    pub device: usize,
    pub loss: crate::autograd::Tensor,
}

/// Per-run graph builder context
///
/// Tracks how many subgraphs have been built (replicas alias parameters via
/// `reuse` after the first build) and carries the summary hub models record
/// into.
pub struct GraphContext {
    device_count: usize,
    builds: usize,
    hub: SummaryHub,
}

impl GraphContext {
    pub fn new(device_count: usize, hub: SummaryHub) -> Self {
        Self {
            device_count,
            builds: 0,
            hub,
        }
    }

    pub fn device_count(&self) -> usize {
        self.device_count
    }

    /// Whether any loss graph has been built in this run
    pub fn graph_built(&self) -> bool {
        self.builds > 0
    }

    /// Total loss-graph builds in this run
    pub fn builds(&self) -> usize {
        self.builds
    }

    /// Record a build; the first one must allocate, later ones must reuse
    pub fn register_build(&mut self, reuse: bool) -> Result<()> {
        if reuse && self.builds == 0 {
            return Err(Error::Config(
                "reuse requested before any parameters were built".to_string(),
            ));
        }
        if !reuse && self.builds > 0 {
            return Err(Error::Config(
                "parameters already built; replicas must reuse them".to_string(),
            ));
        }
        self.builds += 1;
        Ok(())
    }

    pub fn hub(&self) -> &SummaryHub {
        &self.hub
    }
}

/// Build one loss replica per device and select the requested loss.
///
/// Every replica draws its own batch from `source`, so each device sees
/// device-local data. Appends `device_count` fresh subgraphs per call;
/// callers invoke this once per step.
pub fn replicate(
    model: &mut dyn ModelDefinition,
    source: &mut dyn DataSource,
    config: &TrainSpec,
    ctx: &mut GraphContext,
    kind: LossKind,
) -> Result<Vec<LossTerm>> {
    let device_count = ctx.device_count();
    if device_count == 0 {
        return Err(Error::Config("device count must be at least 1".to_string()));
    }

    let mut terms = Vec::with_capacity(device_count);
    for device in 0..device_count {
        let batch = source.data_pipeline(config.batch_size)?;
        let reuse = ctx.graph_built();
        // Loss scalars are recorded once per step, from the generator's
        // first replica, matching the primary trainer's summary graph.
        let summary = kind == LossKind::Generator && device == 0;
        let graph = model.build_graph_with_losses(ctx, &batch, config, reuse, summary)?;

        let loss = match kind {
            LossKind::Generator => graph.losses.g_loss,
            LossKind::Discriminator => graph.losses.d_loss,
        };
        terms.push(LossTerm { kind, device, loss });
    }
    Ok(terms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loss_kind_parses_g_and_d_only() {
        assert_eq!(LossKind::from_str("g").unwrap(), LossKind::Generator);
        assert_eq!(LossKind::from_str("d").unwrap(), LossKind::Discriminator);
        assert!(matches!(
            LossKind::from_str("q"),
            Err(Error::UnsupportedLossType(_))
        ));
        assert!(matches!(
            LossKind::from_str(""),
            Err(Error::UnsupportedLossType(_))
        ));
    }

    #[test]
    fn test_loss_kind_display_round_trips() {
        for kind in [LossKind::Generator, LossKind::Discriminator] {
            assert_eq!(LossKind::from_str(&kind.to_string()).unwrap(), kind);
        }
    }

    #[test]
    fn test_context_rejects_reuse_before_first_build() {
        let mut ctx = GraphContext::new(1, SummaryHub::new());
        assert!(ctx.register_build(true).is_err());
        assert!(ctx.register_build(false).is_ok());
        assert!(ctx.graph_built());
    }

    #[test]
    fn test_context_rejects_second_allocation() {
        let mut ctx = GraphContext::new(2, SummaryHub::new());
        ctx.register_build(false).unwrap();
        assert!(ctx.register_build(false).is_err());
        assert!(ctx.register_build(true).is_ok());
        assert_eq!(ctx.builds(), 2);
    }
}
