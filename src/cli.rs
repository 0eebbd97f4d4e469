//! CLI command definitions and handlers

use crate::config::TrainSpec;
use crate::data::{DataSource, FileListSource};
use crate::error::{Error, Result};
use crate::model::CoarseInpaintModel;
use crate::train::TrainingCoordinator;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rellenar: image inpainting trainer
#[derive(Parser, Debug, Clone)]
#[command(name = "rellenar")]
#[command(version)]
#[command(about = "GAN training orchestration for image inpainting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Train from a YAML configuration
    Train(TrainArgs),

    /// Validate a configuration file without training
    Validate(ConfigArgs),

    /// Display information about a configuration
    Info(ConfigArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct TrainArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Override generator step bound
    #[arg(long)]
    pub max_iters: Option<u64>,

    /// Override learning rate
    #[arg(long)]
    pub lr: Option<f32>,

    /// Override log directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Override RNG seed
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Parser, Debug, Clone)]
pub struct ConfigArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,
}

/// Execute a parsed CLI command
pub fn run_command(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Train(args) => run_train(args),
        Command::Validate(args) => run_validate(args),
        Command::Info(args) => run_info(args),
    }
}

fn apply_overrides(config: &mut TrainSpec, args: &TrainArgs) {
    if let Some(max_iters) = args.max_iters {
        config.max_iters = max_iters;
    }
    if let Some(lr) = args.lr {
        config.lr = lr;
    }
    if let Some(log_dir) = &args.log_dir {
        config.log_dir = log_dir.display().to_string();
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
}

fn training_source(config: &TrainSpec) -> Result<Box<dyn DataSource>> {
    if config.data_flist.is_empty() {
        return Err(Error::Config(
            "data_flist is required for training".to_string(),
        ));
    }
    let source = FileListSource::from_flist(
        &config.data_flist,
        config.img_shapes,
        config.random_crop,
        config.seed,
    )?;
    let source = if config.mask_from_file {
        source.with_mask_flist(&config.mask_flist, config.mask_shapes)?
    } else {
        source
    };
    Ok(Box::new(source))
}

fn run_train(args: TrainArgs) -> Result<()> {
    let mut config = TrainSpec::from_yaml_file(&args.config)?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    let source = training_source(&config)?;
    let mut coordinator = TrainingCoordinator::new(
        config.clone(),
        Box::new(CoarseInpaintModel::new()),
        source,
    )?;

    if config.val && !config.val_flist.is_empty() {
        let val_source = FileListSource::from_flist(
            &config.val_flist,
            config.img_shapes,
            false,
            config.seed,
        )?;
        coordinator = coordinator.with_val_source(Box::new(val_source));
    }

    coordinator.run()?;
    Ok(())
}

fn run_validate(args: ConfigArgs) -> Result<()> {
    TrainSpec::from_yaml_file(&args.config)?;
    println!("{} is valid.", args.config.display());
    Ok(())
}

fn run_info(args: ConfigArgs) -> Result<()> {
    let config = TrainSpec::from_yaml_file(&args.config)?;
    println!("Configuration: {}", args.config.display());
    println!("  dataset: {}", config.dataset);
    println!("  gan: {}", config.gan);
    println!("  devices: {}", config.device_count());
    println!("  batch_size: {}", config.batch_size);
    println!("  max_iters: {}", config.max_iters);
    println!("  d_train_iters: {}", config.d_train_iters);
    println!("  lr: {}", config.lr);
    println!("  gradient_clip: {:?}", config.gradient_clip);
    println!(
        "  pretrain_coarse_network: {}",
        config.pretrain_coarse_network
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses_train_with_overrides() {
        let cli = Cli::try_parse_from([
            "rellenar",
            "train",
            "config.yml",
            "--max-iters",
            "10",
            "--lr",
            "0.001",
        ])
        .unwrap();
        match cli.command {
            Command::Train(args) => {
                assert_eq!(args.config, PathBuf::from("config.yml"));
                assert_eq!(args.max_iters, Some(10));
                assert_eq!(args.lr, Some(0.001));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_structure_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_overrides_are_applied() {
        let mut config: TrainSpec = serde_yaml::from_str(
            "batch_size: 2\nmax_iters: 100\ntrain_spe: 50\nimg_shapes: 4\n",
        )
        .unwrap();
        let args = TrainArgs {
            config: PathBuf::from("x.yml"),
            max_iters: Some(7),
            lr: None,
            log_dir: Some(PathBuf::from("runs")),
            seed: Some(1),
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.max_iters, 7);
        assert_eq!(config.lr, 1e-4);
        assert_eq!(config.log_dir, "runs");
        assert_eq!(config.seed, 1);
    }

    #[test]
    fn test_missing_data_flist_is_rejected() {
        let config: TrainSpec = serde_yaml::from_str(
            "batch_size: 2\nmax_iters: 100\ntrain_spe: 50\nimg_shapes: 4\n",
        )
        .unwrap();
        assert!(matches!(training_source(&config), Err(Error::Config(_))));
    }
}
