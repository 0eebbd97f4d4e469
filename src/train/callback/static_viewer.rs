//! Fixed-batch validation views
//!
//! A pinned batch of validation frames is run through the inference graph
//! on the callback's interval, and per-view mean intensities are recorded
//! as summary scalars. The batch never changes, so successive events show
//! how the fill of the same frames evolves.

use super::traits::{CallbackContext, TrainCallback};
use crate::data::Batch;
use crate::error::Result;
use crate::summary::SummaryHub;
use crate::train::GraphPipeline;
use std::cell::RefCell;
use std::rc::Rc;

pub struct StaticViewer {
    pipeline: Rc<RefCell<GraphPipeline>>,
    batch: Batch,
    frame_len: usize,
    hub: SummaryHub,
}

impl StaticViewer {
    pub fn new(
        pipeline: Rc<RefCell<GraphPipeline>>,
        batch: Batch,
        frame_len: usize,
        hub: SummaryHub,
    ) -> Self {
        Self {
            pipeline,
            batch,
            frame_len,
            hub,
        }
    }
}

impl TrainCallback for StaticViewer {
    fn name(&self) -> &'static str {
        "StaticViewer"
    }

    fn on_step(&mut self, _ctx: &CallbackContext) -> Result<()> {
        let out = self
            .pipeline
            .borrow_mut()
            .static_view(&self.batch, "static_view")?;
        let data = out.data();
        for (i, frame) in data
            .as_slice()
            .unwrap_or(&[])
            .chunks(self.frame_len)
            .enumerate()
        {
            let mean = frame.iter().sum::<f32>() / frame.len() as f32;
            self.hub.record(&format!("static_view/{i}"), mean);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::Tensor;
    use crate::config::TrainSpec;
    use crate::data::MemorySource;
    use crate::model::CoarseInpaintModel;

    #[test]
    fn test_views_are_recorded_per_frame() {
        let config: TrainSpec = serde_yaml::from_str(
            "batch_size: 1\nmax_iters: 10\ntrain_spe: 5\nimg_shapes: 4\n",
        )
        .unwrap();
        let hub = SummaryHub::new();
        let mut pipeline = GraphPipeline::new(
            Box::new(CoarseInpaintModel::new()),
            Box::new(MemorySource::new(vec![vec![1.0; 4]])),
            config,
            hub.clone(),
        );
        pipeline.warm_up().unwrap();
        let pipeline = Rc::new(RefCell::new(pipeline));

        let pinned = Batch::new(Tensor::from_vec(vec![0.5; 8], false), None);
        let mut viewer = StaticViewer::new(pipeline, pinned, 4, hub.clone());

        let ctx = CallbackContext {
            step: 1,
            max_steps: 10,
        };
        viewer.on_step(&ctx).unwrap();

        let tags: Vec<String> = hub.drain().into_iter().map(|e| e.tag).collect();
        assert_eq!(tags, vec!["static_view/0", "static_view/1"]);
    }
}
