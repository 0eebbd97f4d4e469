//! Coarse inpainting model
//!
//! A deliberately small generator/critic pair over flattened frames. The
//! generator fills masked regions with a per-frame affine map; the critic
//! scores frames element-wise. Small enough to train on the CPU tape,
//! structured like its larger siblings: lazy parameter allocation on the
//! first build, aliasing on every `reuse` build.
//!
//! Both losses read one shared forward pass. The tape visits each node
//! once in reverse topological order, so the inpainted output can feed
//! the reconstruction, adversarial, and hinge terms without re-running
//! the generator.

use super::{Losses, ModelDefinition, ModelGraph, ParameterSet};
use crate::autograd::{add, add_scalar, mean, mul, relu, scale, sub, tile, Tensor};
use crate::config::TrainSpec;
use crate::data::Batch;
use crate::error::{Error, Result};
use crate::graph::GraphContext;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

struct Params {
    fill_weight: Tensor,
    fill_bias: Tensor,
    critic_weight: Tensor,
}

/// Coarse stage of the inpainting pipeline
pub struct CoarseInpaintModel {
    params: Option<Params>,
}

impl CoarseInpaintModel {
    pub fn new() -> Self {
        Self { params: None }
    }

    fn allocate(&mut self, frame_len: usize, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        let fill_weight: Vec<f32> = (0..frame_len)
            .map(|_| 1.0 + rng.random_range(-0.05..0.05))
            .collect();
        let critic_weight: Vec<f32> = (0..frame_len)
            .map(|_| rng.random_range(-0.05..0.05))
            .collect();

        self.params = Some(Params {
            fill_weight: Tensor::from_vec(fill_weight, true),
            fill_bias: Tensor::zeros(frame_len, true),
            critic_weight: Tensor::from_vec(critic_weight, true),
        });
    }

    fn params(&self) -> Result<&Params> {
        self.params
            .as_ref()
            .ok_or_else(|| Error::Config("model parameters are not built yet".to_string()))
    }

    /// Mask covering the middle half of each frame, repeated per batch
    fn synthesize_mask(frame_len: usize, batch_count: usize) -> Tensor {
        let lo = frame_len / 4;
        let hi = frame_len - frame_len / 4;
        let mut frame = vec![0.0f32; frame_len];
        for v in frame.iter_mut().take(hi).skip(lo) {
            *v = 1.0;
        }
        let mut values = Vec::with_capacity(frame_len * batch_count);
        for _ in 0..batch_count {
            values.extend_from_slice(&frame);
        }
        Tensor::from_vec(values, false)
    }

    fn batch_mask(batch: &Batch, frame_len: usize, batch_count: usize) -> Tensor {
        match &batch.masks {
            Some(masks) => masks.clone(),
            None => Self::synthesize_mask(frame_len, batch_count),
        }
    }

    /// Forward pass: keep the visible region, fill the hole
    fn inpaint(&self, images: &Tensor, mask: &Tensor, batch_count: usize) -> Result<Tensor> {
        let params = self.params()?;
        let keep = scale(mask, -1.0);
        let keep = add_scalar(&keep, 1.0);
        let visible = mul(images, &keep);

        let w = tile(&params.fill_weight, batch_count);
        let b = tile(&params.fill_bias, batch_count);
        let fill = add(&mul(&w, &visible), &b);

        Ok(add(&visible, &mul(&fill, mask)))
    }

    /// Element-wise critic scores for a frame batch
    fn critic(
        &self,
        frames: &Tensor,
        mask: &Tensor,
        batch_count: usize,
        with_mask: bool,
    ) -> Result<Tensor> {
        let params = self.params()?;
        let input = if with_mask {
            mul(frames, mask)
        } else {
            frames.clone()
        };
        let c = tile(&params.critic_weight, batch_count);
        Ok(mul(&c, &input))
    }
}

impl Default for CoarseInpaintModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelDefinition for CoarseInpaintModel {
    fn build_graph_with_losses(
        &mut self,
        ctx: &mut GraphContext,
        batch: &Batch,
        config: &TrainSpec,
        reuse: bool,
        summary: bool,
    ) -> Result<ModelGraph> {
        ctx.register_build(reuse)?;

        let frame_len = config.img_shapes;
        if batch.images.len() % frame_len != 0 {
            return Err(Error::Config(format!(
                "batch of {} values is not a multiple of frame length {frame_len}",
                batch.images.len()
            )));
        }
        let batch_count = batch.images.len() / frame_len;

        if !reuse {
            self.allocate(frame_len, config.seed);
        }
        let mask = Self::batch_mask(batch, frame_len, batch_count);

        // One fake forward feeds the generator loss and the critic hinge.
        let inpainted = self.inpaint(&batch.images, &mask, batch_count)?;
        let diff = sub(&inpainted, &batch.images);
        let recon = mean(&mul(&diff, &diff));
        let g_loss = if config.pretrain_coarse_network {
            recon
        } else {
            let fake_scores =
                self.critic(&inpainted, &mask, batch_count, config.gan_with_mask)?;
            let g_adv = scale(&mean(&fake_scores), -1.0);
            add(&recon, &g_adv)
        };

        let real_scores =
            self.critic(&batch.images, &mask, batch_count, config.gan_with_mask)?;
        let fake_scores = self.critic(&inpainted, &mask, batch_count, config.gan_with_mask)?;
        let real_hinge = mean(&relu(&add_scalar(&scale(&real_scores, -1.0), 1.0)));
        let fake_hinge = mean(&relu(&add_scalar(&fake_scores, 1.0)));
        let d_loss = add(&real_hinge, &fake_hinge);

        if summary {
            ctx.hub().record("g_loss", g_loss.item());
            ctx.hub().record("d_loss", d_loss.item());
        }

        let params = self.params()?;
        let mut g_params = ParameterSet::new();
        g_params.push("inpaint/fill_weight", params.fill_weight.clone());
        g_params.push("inpaint/fill_bias", params.fill_bias.clone());
        let mut d_params = ParameterSet::new();
        d_params.push("critic/weight", params.critic_weight.clone());

        Ok(ModelGraph {
            g_params,
            d_params,
            losses: Losses { g_loss, d_loss },
        })
    }

    fn build_static_infer_graph(
        &mut self,
        _ctx: &mut GraphContext,
        batch: &Batch,
        config: &TrainSpec,
        _name: &str,
    ) -> Result<Tensor> {
        let frame_len = config.img_shapes;
        if batch.images.len() % frame_len != 0 {
            return Err(Error::Config(format!(
                "batch of {} values is not a multiple of frame length {frame_len}",
                batch.images.len()
            )));
        }
        let batch_count = batch.images.len() / frame_len;
        let mask = Self::batch_mask(batch, frame_len, batch_count);
        self.inpaint(&batch.images, &mask, batch_count)
    }
}
