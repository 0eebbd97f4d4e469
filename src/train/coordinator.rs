//! End-to-end run assembly
//!
//! The coordinator owns the wiring a run needs: the run directory with its
//! date-stamped label, the warm-up graph build, per-loop Adam optimizers,
//! the discriminator hook, and the callback set. `run` drives the primary
//! loop to completion and reports both counters.

use super::callback::{
    CallbackPhase, CallbackRegistry, ModelRestorer, ModelSaver, StaticViewer, SummaryWriter,
    WeightsViewer,
};
use super::counter::StepCounter;
use super::optimization::{OptimizationLoop, PreStepHook};
use super::pipeline::GraphPipeline;
use super::secondary::SecondaryLoop;
use super::{share_optimizer, SharedOptimizer};
use crate::config::TrainSpec;
use crate::data::DataSource;
use crate::error::Result;
use crate::graph::LossKind;
use crate::model::{ModelDefinition, ParameterSet};
use crate::optim::Adam;
use crate::summary::{SummaryHub, SummaryStream};
use chrono::Local;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

/// Counters and paths from one completed run
#[derive(Debug)]
pub struct RunReport {
    pub run_dir: PathBuf,
    pub generator_steps: u64,
    pub discriminator_steps: u64,
}

pub struct TrainingCoordinator {
    config: TrainSpec,
    hub: SummaryHub,
    pipeline: Rc<RefCell<GraphPipeline>>,
    val_source: Option<Box<dyn DataSource>>,
}

impl TrainingCoordinator {
    pub fn new(
        config: TrainSpec,
        model: Box<dyn ModelDefinition>,
        source: Box<dyn DataSource>,
    ) -> Result<Self> {
        config.validate()?;
        let hub = SummaryHub::new();
        let pipeline = GraphPipeline::new(model, source, config.clone(), hub.clone());
        Ok(Self {
            config,
            hub,
            pipeline: Rc::new(RefCell::new(pipeline)),
            val_source: None,
        })
    }

    /// Attach a validation source for the static views
    pub fn with_val_source(mut self, source: Box<dyn DataSource>) -> Self {
        self.val_source = Some(source);
        self
    }

    /// Date-stamped run label, such as `20260829103000_places2_NORMAL_sngan`
    fn run_label(config: &TrainSpec) -> String {
        let date_uid = Local::now().format("%Y%m%d%H%M%S");
        let masked = if config.gan_with_mask {
            "MASKED"
        } else {
            "NORMAL"
        };
        format!("{date_uid}_{}_{masked}_{}", config.dataset, config.gan)
    }

    pub fn run(&mut self) -> Result<RunReport> {
        let config = self.config.clone();
        let run_dir = PathBuf::from(&config.log_dir).join(Self::run_label(&config));
        std::fs::create_dir_all(&run_dir)?;
        let restore_dir = if config.model_restore.is_empty() {
            run_dir.clone()
        } else {
            PathBuf::from(&config.log_dir).join(&config.model_restore)
        };
        println!("Logging to {}.", run_dir.display());

        let graph = self.pipeline.borrow_mut().warm_up()?;
        let mut all_params = ParameterSet::new();
        for (name, tensor) in graph.g_params.iter().chain(graph.d_params.iter()) {
            all_params.push(name, tensor.clone());
        }

        let g_optimizer = share_optimizer(Adam::gan_defaults(config.lr));
        let d_optimizer = share_optimizer(Adam::gan_defaults(config.lr));
        let named_optimizers: Vec<(String, SharedOptimizer)> = vec![
            ("g".to_string(), Rc::clone(&g_optimizer)),
            ("d".to_string(), Rc::clone(&d_optimizer)),
        ];

        let g_counter = StepCounter::new();
        let mut primary = OptimizationLoop::new(
            "generator",
            LossKind::Generator,
            Rc::clone(&self.pipeline),
            graph.g_params,
            g_optimizer,
            config.gradient_clip,
            g_counter.clone(),
        );

        let mut secondary = if config.pretrain_coarse_network {
            None
        } else {
            let inner = OptimizationLoop::new(
                "discriminator",
                LossKind::Discriminator,
                Rc::clone(&self.pipeline),
                graph.d_params,
                d_optimizer,
                config.gradient_clip,
                StepCounter::new(),
            );
            Some(SecondaryLoop::new(inner, 1, config.d_train_iters))
        };
        let d_counter = secondary.as_ref().map(|s| s.counter());

        let mut callbacks = CallbackRegistry::new();
        callbacks.register(
            Box::new(WeightsViewer::new(all_params.clone())),
            0,
            CallbackPhase::PreStep,
        );
        callbacks.register(
            Box::new(ModelRestorer::new(
                restore_dir,
                all_params.clone(),
                named_optimizers.clone(),
                g_counter.clone(),
                true,
            )),
            0,
            CallbackPhase::PreStep,
        );
        callbacks.register(
            Box::new(ModelSaver::new(
                run_dir.clone(),
                all_params,
                named_optimizers,
            )),
            config.train_spe,
            CallbackPhase::PostStep,
        );
        callbacks.register(
            Box::new(SummaryWriter::new(
                self.hub.clone(),
                SummaryStream::open(run_dir.join("events.jsonl"))?,
            )),
            config.val_psteps,
            CallbackPhase::PostStep,
        );
        if config.val {
            if let Some(val_source) = self.val_source.as_mut() {
                let pinned = val_source.data_pipeline(config.static_view_size)?;
                callbacks.register(
                    Box::new(StaticViewer::new(
                        Rc::clone(&self.pipeline),
                        pinned,
                        config.img_shapes,
                        self.hub.clone(),
                    )),
                    config.val_psteps,
                    CallbackPhase::PostStep,
                );
            } else {
                println!("Validation views requested but no val source attached; skipping.");
            }
        }

        let hook = secondary
            .as_mut()
            .map(|s| s as &mut dyn PreStepHook);
        primary.run(config.max_iters, &mut callbacks, hook)?;

        let report = RunReport {
            run_dir,
            generator_steps: g_counter.get(),
            discriminator_steps: d_counter.map_or(0, |c| c.get()),
        };
        println!(
            "Training done: {} generator steps, {} discriminator steps.",
            report.generator_steps, report.discriminator_steps
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemorySource;
    use crate::model::CoarseInpaintModel;

    fn config(dir: &std::path::Path) -> TrainSpec {
        let yaml = format!(
            "batch_size: 2\nmax_iters: 3\ntrain_spe: 2\nimg_shapes: 4\nd_train_iters: 2\nlog_dir: {}\n",
            dir.display()
        );
        serde_yaml::from_str(&yaml).unwrap()
    }

    fn frames() -> Vec<Vec<f32>> {
        (0..5).map(|i| vec![0.2 * i as f32; 4]).collect()
    }

    #[test]
    fn test_run_counts_both_loops() {
        let dir = tempfile::tempdir().unwrap();
        let mut coordinator = TrainingCoordinator::new(
            config(dir.path()),
            Box::new(CoarseInpaintModel::new()),
            Box::new(MemorySource::new(frames())),
        )
        .unwrap();

        let report = coordinator.run().unwrap();
        assert_eq!(report.generator_steps, 3);
        assert_eq!(report.discriminator_steps, 6);
    }

    #[test]
    fn test_pretrain_disables_secondary() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.pretrain_coarse_network = true;

        let mut coordinator = TrainingCoordinator::new(
            cfg,
            Box::new(CoarseInpaintModel::new()),
            Box::new(MemorySource::new(frames())),
        )
        .unwrap();

        let report = coordinator.run().unwrap();
        assert_eq!(report.generator_steps, 3);
        assert_eq!(report.discriminator_steps, 0);
    }

    #[test]
    fn test_checkpoints_land_in_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut coordinator = TrainingCoordinator::new(
            config(dir.path()),
            Box::new(CoarseInpaintModel::new()),
            Box::new(MemorySource::new(frames())),
        )
        .unwrap();

        let report = coordinator.run().unwrap();
        // train_spe = 2 with 3 steps saves exactly once, at step 2.
        assert!(report.run_dir.join("snap-2.json").exists());
        assert!(report.run_dir.join("latest").exists());
    }
}
