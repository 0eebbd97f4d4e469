//! Model/data pipeline shared by the training loops
//!
//! Both loops and the static-view callback need the model, the data source,
//! and the graph context, all mutably. The pipeline owns that trio behind
//! one `Rc<RefCell>`, so the borrows are sequenced at runtime the same way
//! the steps are.

use crate::autograd::Tensor;
use crate::config::TrainSpec;
use crate::data::{Batch, DataSource};
use crate::error::Result;
use crate::graph::{replicate, GraphContext, LossKind};
use crate::model::{validate_disjoint, ModelDefinition, ModelGraph};
use crate::summary::SummaryHub;

pub struct GraphPipeline {
    model: Box<dyn ModelDefinition>,
    source: Box<dyn DataSource>,
    config: TrainSpec,
    ctx: GraphContext,
}

impl GraphPipeline {
    pub fn new(
        model: Box<dyn ModelDefinition>,
        source: Box<dyn DataSource>,
        config: TrainSpec,
        hub: SummaryHub,
    ) -> Self {
        let ctx = GraphContext::new(config.device_count(), hub);
        Self {
            model,
            source,
            config,
            ctx,
        }
    }

    pub fn config(&self) -> &TrainSpec {
        &self.config
    }

    /// Build the first graph, allocating parameters.
    ///
    /// Must run once before either loop starts; the returned parameter sets
    /// alias the live storage every later replica reuses.
    pub fn warm_up(&mut self) -> Result<ModelGraph> {
        let batch = self.source.data_pipeline(self.config.batch_size)?;
        let graph =
            self.model
                .build_graph_with_losses(&mut self.ctx, &batch, &self.config, false, false)?;
        validate_disjoint(&graph.g_params, &graph.d_params)?;
        Ok(graph)
    }

    /// One fresh loss subgraph per device, each on its own batch.
    ///
    /// Scalars recorded while the replicas build carry `step`.
    pub fn replica_losses(&mut self, kind: LossKind, step: u64) -> Result<Vec<Tensor>> {
        self.ctx.hub().set_step(step);
        let terms = replicate(
            self.model.as_mut(),
            self.source.as_mut(),
            &self.config,
            &mut self.ctx,
            kind,
        )?;
        Ok(terms.into_iter().map(|t| t.loss).collect())
    }

    /// Inference output over a pinned batch, off the gradient path
    pub fn static_view(&mut self, batch: &Batch, name: &str) -> Result<Tensor> {
        self.model
            .build_static_infer_graph(&mut self.ctx, batch, &self.config, name)
    }
}
