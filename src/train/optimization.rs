//! The optimization loop
//!
//! One loop owns one parameter set, one optimizer, and one counter. A step
//! is: build fresh replica losses, aggregate gradients, apply the update,
//! advance the counter. The pre-step hook and the callback phases bracket
//! that sequence; stop requests and the step bound are only honored at the
//! step boundary.

use super::aggregate::aggregate_gradients;
use super::callback::{CallbackContext, CallbackPhase, CallbackRegistry};
use super::counter::StepCounter;
use super::pipeline::GraphPipeline;
use super::SharedOptimizer;
use crate::error::Result;
use crate::graph::LossKind;
use crate::model::ParameterSet;
use crate::optim::ShapingPolicy;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Loop lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped,
}

/// Cooperative stop signal, checked between steps
#[derive(Clone, Default)]
pub struct StopHandle {
    flag: Rc<Cell<bool>>,
}

impl StopHandle {
    pub fn request(&self) {
        self.flag.set(true);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.get()
    }
}

/// Work injected before each primary step
pub trait PreStepHook {
    fn before_step(&mut self, step: u64) -> Result<()>;
}

pub struct OptimizationLoop {
    name: String,
    kind: LossKind,
    pipeline: Rc<RefCell<GraphPipeline>>,
    params: ParameterSet,
    optimizer: SharedOptimizer,
    policy: ShapingPolicy,
    counter: StepCounter,
    state: LoopState,
    stop: StopHandle,
}

impl OptimizationLoop {
    pub fn new(
        name: impl Into<String>,
        kind: LossKind,
        pipeline: Rc<RefCell<GraphPipeline>>,
        params: ParameterSet,
        optimizer: SharedOptimizer,
        policy: ShapingPolicy,
        counter: StepCounter,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            pipeline,
            params,
            optimizer,
            policy,
            counter,
            state: LoopState::Idle,
            stop: StopHandle::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Shared handle to this loop's counter
    pub fn counter(&self) -> StepCounter {
        self.counter.clone()
    }

    /// Handle for requesting a stop from outside the loop
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// One full gradient step at 1-based index `step`
    pub(crate) fn step_once(&mut self, step: u64) -> Result<()> {
        let losses = self.pipeline.borrow_mut().replica_losses(self.kind, step)?;
        let mut tensors = self.params.tensors();
        let grads = aggregate_gradients(&losses, &tensors, &self.policy, &self.name, step)?;
        for (tensor, grad) in tensors.iter().zip(grads) {
            tensor.set_grad(grad);
        }
        self.optimizer.borrow_mut().step(&mut tensors);
        self.counter.increment();
        Ok(())
    }

    /// Drive the loop until `max_steps` completed steps or a stop request.
    ///
    /// The counter may already be nonzero after a restore; the loop then
    /// picks up at the next step. Any error aborts immediately with no
    /// rollback of the partial step.
    pub fn run(
        &mut self,
        max_steps: u64,
        callbacks: &mut CallbackRegistry,
        mut hook: Option<&mut dyn PreStepHook>,
    ) -> Result<()> {
        self.state = LoopState::Running;
        let result = self.drive(max_steps, callbacks, &mut hook);
        self.state = LoopState::Stopped;
        result
    }

    fn drive(
        &mut self,
        max_steps: u64,
        callbacks: &mut CallbackRegistry,
        hook: &mut Option<&mut dyn PreStepHook>,
    ) -> Result<()> {
        callbacks.train_begin(&CallbackContext {
            step: self.counter.get(),
            max_steps,
        })?;

        while self.counter.get() < max_steps && !self.stop.is_requested() {
            let step = self.counter.get() + 1;
            let ctx = CallbackContext { step, max_steps };

            if let Some(hook) = hook.as_mut() {
                hook.before_step(step)?;
            }
            callbacks.dispatch(CallbackPhase::PreStep, &ctx)?;
            self.step_once(step)?;
            callbacks.dispatch(CallbackPhase::PostStep, &ctx)?;
        }

        callbacks.train_end(&CallbackContext {
            step: self.counter.get(),
            max_steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainSpec;
    use crate::data::MemorySource;
    use crate::model::CoarseInpaintModel;
    use crate::optim::Adam;
    use crate::summary::SummaryHub;
    use crate::train::share_optimizer;

    fn setup(num_gpus: usize) -> (OptimizationLoop, Rc<RefCell<GraphPipeline>>) {
        let mut config: TrainSpec = serde_yaml::from_str(
            "batch_size: 2\nmax_iters: 100\ntrain_spe: 50\nimg_shapes: 4\n",
        )
        .unwrap();
        config.num_gpus = num_gpus;

        let frames: Vec<Vec<f32>> = (0..6).map(|i| vec![0.1 * i as f32; 4]).collect();
        let mut pipeline = GraphPipeline::new(
            Box::new(CoarseInpaintModel::new()),
            Box::new(MemorySource::new(frames)),
            config.clone(),
            SummaryHub::new(),
        );
        let graph = pipeline.warm_up().unwrap();
        let pipeline = Rc::new(RefCell::new(pipeline));

        let primary = OptimizationLoop::new(
            "generator",
            LossKind::Generator,
            Rc::clone(&pipeline),
            graph.g_params,
            share_optimizer(Adam::gan_defaults(1e-3)),
            config.gradient_clip,
            StepCounter::new(),
        );
        (primary, pipeline)
    }

    #[test]
    fn test_run_completes_max_steps() {
        let (mut primary, _pipeline) = setup(1);
        let mut callbacks = CallbackRegistry::new();

        assert_eq!(primary.state(), LoopState::Idle);
        primary.run(3, &mut callbacks, None).unwrap();
        assert_eq!(primary.counter().get(), 3);
        assert_eq!(primary.state(), LoopState::Stopped);
    }

    #[test]
    fn test_steps_change_parameters() {
        let (mut primary, _pipeline) = setup(1);
        let before: Vec<Vec<f32>> = primary
            .params
            .tensors()
            .iter()
            .map(|t| t.data().to_vec())
            .collect();

        primary.run(2, &mut CallbackRegistry::new(), None).unwrap();

        let after: Vec<Vec<f32>> = primary
            .params
            .tensors()
            .iter()
            .map(|t| t.data().to_vec())
            .collect();
        assert_ne!(before, after);
    }

    #[test]
    fn test_stop_request_halts_at_boundary() {
        struct StopAt {
            at: u64,
            handle: StopHandle,
        }
        impl PreStepHook for StopAt {
            fn before_step(&mut self, step: u64) -> Result<()> {
                if step >= self.at {
                    self.handle.request();
                }
                Ok(())
            }
        }

        let (mut primary, _pipeline) = setup(1);
        let mut hook = StopAt {
            at: 2,
            handle: primary.stop_handle(),
        };
        primary
            .run(10, &mut CallbackRegistry::new(), Some(&mut hook))
            .unwrap();

        // The step that requested the stop still completes.
        assert_eq!(primary.counter().get(), 2);
    }

    #[test]
    fn test_restored_counter_shortens_run() {
        let (mut primary, _pipeline) = setup(1);
        primary.counter().set(8);
        primary.run(10, &mut CallbackRegistry::new(), None).unwrap();
        assert_eq!(primary.counter().get(), 10);
    }

    #[test]
    fn test_hook_runs_before_every_step() {
        struct CountHook {
            calls: Rc<Cell<u64>>,
        }
        impl PreStepHook for CountHook {
            fn before_step(&mut self, _step: u64) -> Result<()> {
                self.calls.set(self.calls.get() + 1);
                Ok(())
            }
        }

        let (mut primary, _pipeline) = setup(2);
        let calls = Rc::new(Cell::new(0));
        let mut hook = CountHook {
            calls: Rc::clone(&calls),
        };
        primary
            .run(4, &mut CallbackRegistry::new(), Some(&mut hook))
            .unwrap();
        assert_eq!(calls.get(), 4);
    }
}
