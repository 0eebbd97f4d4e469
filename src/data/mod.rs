//! Batches and data sources
//!
//! The orchestration treats a source as an infinite, restartable supplier:
//! `data_pipeline` is called once per device replica per step and must keep
//! producing batches for the whole run. Shuffling and looping are the
//! source's own business.

use crate::autograd::Tensor;
use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;

/// One device-local training batch
#[derive(Clone)]
pub struct Batch {
    /// Flattened image frames, `batch_size * frame_len` values
    pub images: Tensor,
    /// Paired masks, when the run supplies them externally
    pub masks: Option<Tensor>,
}

impl Batch {
    pub fn new(images: Tensor, masks: Option<Tensor>) -> Self {
        Self { images, masks }
    }
}

/// Supplier of device-local batches
pub trait DataSource {
    /// Produce the next batch of `batch_size` frames
    fn data_pipeline(&mut self, batch_size: usize) -> Result<Batch>;
}

/// Cycling in-memory source
///
/// Frames are served in order and wrap around forever. Useful for tests and
/// for small pre-decoded datasets.
pub struct MemorySource {
    frames: Vec<Vec<f32>>,
    masks: Option<Vec<Vec<f32>>>,
    cursor: usize,
}

impl MemorySource {
    pub fn new(frames: Vec<Vec<f32>>) -> Self {
        Self {
            frames,
            masks: None,
            cursor: 0,
        }
    }

    /// Pair each frame with a mask, index for index
    pub fn with_masks(mut self, masks: Vec<Vec<f32>>) -> Self {
        self.masks = Some(masks);
        self
    }
}

impl DataSource for MemorySource {
    fn data_pipeline(&mut self, batch_size: usize) -> Result<Batch> {
        if self.frames.is_empty() {
            return Err(Error::DataExhausted("memory source has no frames".to_string()));
        }
        if let Some(masks) = &self.masks {
            if masks.len() != self.frames.len() {
                return Err(Error::DataExhausted(format!(
                    "{} frames but {} masks",
                    self.frames.len(),
                    masks.len()
                )));
            }
        }

        let mut images = Vec::new();
        let mut mask_values = Vec::new();
        for _ in 0..batch_size {
            let idx = self.cursor % self.frames.len();
            images.extend_from_slice(&self.frames[idx]);
            if let Some(masks) = &self.masks {
                mask_values.extend_from_slice(&masks[idx]);
            }
            self.cursor += 1;
        }

        let masks = if self.masks.is_some() {
            Some(Tensor::from_vec(mask_values, false))
        } else {
            None
        };
        Ok(Batch::new(Tensor::from_vec(images, false), masks))
    }
}

/// File-list source reading raw little-endian f32 frames
///
/// Mirrors a file-list data pipeline: one path per line, cycled forever,
/// optionally paired line-by-line with a mask list. Frames longer than the
/// configured length are cropped (randomly when `random_crop` is set).
pub struct FileListSource {
    files: Vec<PathBuf>,
    mask_files: Option<Vec<PathBuf>>,
    frame_len: usize,
    mask_len: usize,
    random_crop: bool,
    rng: StdRng,
    cursor: usize,
}

impl FileListSource {
    pub fn new(files: Vec<PathBuf>, frame_len: usize, random_crop: bool, seed: u64) -> Self {
        Self {
            files,
            mask_files: None,
            frame_len,
            mask_len: 0,
            random_crop,
            rng: StdRng::seed_from_u64(seed),
            cursor: 0,
        }
    }

    /// Read paths from a file list, one per line
    pub fn from_flist(path: &str, frame_len: usize, random_crop: bool, seed: u64) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let files: Vec<PathBuf> = content.lines().map(PathBuf::from).collect();
        if files.is_empty() {
            return Err(Error::DataExhausted(format!("file list {path} is empty")));
        }
        Ok(Self::new(files, frame_len, random_crop, seed))
    }

    /// Pair with a mask file list, line for line
    pub fn with_mask_flist(mut self, path: &str, mask_len: usize) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let files: Vec<PathBuf> = content.lines().map(PathBuf::from).collect();
        if files.len() != self.files.len() {
            return Err(Error::DataExhausted(format!(
                "mask list {path} has {} entries, expected {}",
                files.len(),
                self.files.len()
            )));
        }
        self.mask_files = Some(files);
        self.mask_len = mask_len;
        Ok(self)
    }

    fn read_frame(&mut self, path: &PathBuf, len: usize) -> Result<Vec<f32>> {
        let bytes = std::fs::read(path)
            .map_err(|e| Error::DataExhausted(format!("{}: {e}", path.display())))?;
        if bytes.len() % 4 != 0 {
            return Err(Error::DataExhausted(format!(
                "{}: not a raw f32 frame",
                path.display()
            )));
        }
        let mut frame: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        if frame.len() < len {
            return Err(Error::DataExhausted(format!(
                "{}: frame has {} values, need {len}",
                path.display(),
                frame.len()
            )));
        }
        if frame.len() > len {
            let start = if self.random_crop {
                self.rng.random_range(0..=frame.len() - len)
            } else {
                0
            };
            frame = frame[start..start + len].to_vec();
        }
        Ok(frame)
    }
}

impl DataSource for FileListSource {
    fn data_pipeline(&mut self, batch_size: usize) -> Result<Batch> {
        if self.files.is_empty() {
            return Err(Error::DataExhausted("file list is empty".to_string()));
        }

        let mut images = Vec::with_capacity(batch_size * self.frame_len);
        let mut mask_values = Vec::new();
        for _ in 0..batch_size {
            let idx = self.cursor % self.files.len();
            let image_path = self.files[idx].clone();
            images.extend(self.read_frame(&image_path, self.frame_len)?);

            if let Some(mask_files) = &self.mask_files {
                let mask_path = mask_files[idx].clone();
                let mask_len = self.mask_len;
                mask_values.extend(self.read_frame(&mask_path, mask_len)?);
            }
            self.cursor += 1;
        }

        let masks = if self.mask_files.is_some() {
            Some(Tensor::from_vec(mask_values, false))
        } else {
            None
        };
        Ok(Batch::new(Tensor::from_vec(images, false), masks))
    }
}
