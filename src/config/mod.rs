//! YAML training configuration
//!
//! Every recognized option maps to one orchestration behavior: replica
//! count, loop bounds, callback cadences, gradient shaping, checkpoint
//! restore, and the validation side channel. `validate` runs before any
//! graph is built so bad configs fail fast.

use crate::error::{Error, Result};
use crate::optim::ShapingPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete training specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainSpec {
    /// Per-device batch size
    pub batch_size: usize,

    /// Number of device replicas
    #[serde(default = "default_num_gpus")]
    pub num_gpus: usize,

    /// Pin to a single device instead of replicating (-1 = use num_gpus)
    #[serde(default = "default_gpu_id")]
    pub gpu_id: i32,

    /// Generator steps to run
    pub max_iters: u64,

    /// Steps per epoch; also the checkpoint interval
    pub train_spe: u64,

    /// Summary flush interval in steps
    #[serde(default = "default_val_psteps")]
    pub val_psteps: u64,

    /// Gradient shaping applied after cross-replica averaging
    #[serde(default)]
    pub gradient_clip: ShapingPolicy,

    /// Discriminator inner iterations per generator step
    #[serde(default = "default_d_train_iters")]
    pub d_train_iters: u64,

    /// Adam learning rate shared by both loops
    #[serde(default = "default_lr")]
    pub lr: f32,

    /// Masks come from a paired file list instead of being synthesized
    #[serde(default)]
    pub mask_from_file: bool,

    /// Random-crop images to img_shapes during loading
    #[serde(default)]
    pub random_crop: bool,

    /// Flattened image frame length
    pub img_shapes: usize,

    /// Flattened mask frame length
    #[serde(default)]
    pub mask_shapes: usize,

    /// Train the coarse network alone; the discriminator loop is not wired
    #[serde(default)]
    pub pretrain_coarse_network: bool,

    /// Run directory to restore from, relative to log_dir ("" = fresh run)
    #[serde(default)]
    pub model_restore: String,

    /// Root directory for run logs and checkpoints
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Adversarial loss family tag (recorded in the run label)
    #[serde(default = "default_gan")]
    pub gan: String,

    /// Restrict the critic to the masked region
    #[serde(default)]
    pub gan_with_mask: bool,

    /// Build static validation views
    #[serde(default)]
    pub val: bool,

    /// Number of static validation views
    #[serde(default = "default_static_view_size")]
    pub static_view_size: usize,

    /// Dataset tag used in the run label
    #[serde(default = "default_dataset")]
    pub dataset: String,

    /// Training file list (one raw f32 frame path per line)
    #[serde(default)]
    pub data_flist: String,

    /// Validation file list
    #[serde(default)]
    pub val_flist: String,

    /// Mask file list, paired line-by-line with data_flist
    #[serde(default)]
    pub mask_flist: String,

    /// RNG seed for model init and synthetic masks
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_num_gpus() -> usize {
    1
}
fn default_gpu_id() -> i32 {
    -1
}
fn default_val_psteps() -> u64 {
    100
}
fn default_d_train_iters() -> u64 {
    5
}
fn default_lr() -> f32 {
    1e-4
}
fn default_log_dir() -> String {
    "model_logs".to_string()
}
fn default_gan() -> String {
    "sngan".to_string()
}
fn default_static_view_size() -> usize {
    10
}
fn default_dataset() -> String {
    "default".to_string()
}
fn default_seed() -> u64 {
    42
}

impl TrainSpec {
    /// Load and validate a spec from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let spec: TrainSpec = serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid config: {e}")))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Effective replica count: a pinned device means one replica
    pub fn device_count(&self) -> usize {
        if self.gpu_id >= 0 {
            1
        } else {
            self.num_gpus
        }
    }

    /// Fail-fast structural validation
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be positive".to_string()));
        }
        if self.num_gpus == 0 {
            return Err(Error::Config("num_gpus must be at least 1".to_string()));
        }
        if self.max_iters == 0 {
            return Err(Error::Config("max_iters must be positive".to_string()));
        }
        if self.train_spe == 0 {
            return Err(Error::Config("train_spe must be positive".to_string()));
        }
        if self.val_psteps == 0 {
            return Err(Error::Config("val_psteps must be positive".to_string()));
        }
        if self.img_shapes == 0 {
            return Err(Error::Config("img_shapes must be positive".to_string()));
        }
        if self.mask_from_file && self.mask_shapes == 0 {
            return Err(Error::Config(
                "mask_shapes must be positive when mask_from_file is set".to_string(),
            ));
        }
        if !self.pretrain_coarse_network && self.d_train_iters == 0 {
            return Err(Error::Config(
                "d_train_iters must be positive unless pretraining the coarse network".to_string(),
            ));
        }
        if let ShapingPolicy::ClipAvgNorm { value } = self.gradient_clip {
            if !(value > 0.0) {
                return Err(Error::Config(
                    "gradient_clip value must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}
