use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use vton_core::{DeviceMap, GenerationInput, GenerationOutput, MaskLayer, TryOnPipeline};

/// Deterministic in-process pipeline backend.
///
/// The actual diffusion stack is a deployment concern wired in behind
/// [`TryOnPipeline`]; this backend answers every request from the host with
/// dimension-correct images, which is enough for wiring, operations work,
/// and the HTTP tests. Failure injection and call counters let tests drive
/// the residency and generation paths through their error branches.
pub struct StubPipeline {
    device_memory_bytes: Option<u64>,
    fail_load: AtomicBool,
    fail_generate: AtomicBool,
    load_calls: AtomicUsize,
    unload_calls: AtomicUsize,
    generate_calls: AtomicUsize,
}

impl StubPipeline {
    pub fn new() -> Self {
        Self {
            device_memory_bytes: None,
            fail_load: AtomicBool::new(false),
            fail_generate: AtomicBool::new(false),
            load_calls: AtomicUsize::new(0),
            unload_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
        }
    }

    /// Reports a fixed total accelerator memory through `/health`.
    pub fn with_device_memory(mut self, bytes: u64) -> Self {
        self.device_memory_bytes = Some(bytes);
        self
    }

    /// Makes subsequent `load` calls fail, like an exhausted accelerator.
    pub fn set_fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent `generate` calls fail mid-pass.
    pub fn set_fail_generate(&self, fail: bool) {
        self.fail_generate.store(fail, Ordering::SeqCst);
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn unload_calls(&self) -> usize {
        self.unload_calls.load(Ordering::SeqCst)
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }
}

impl Default for StubPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl TryOnPipeline for StubPipeline {
    fn load(&self, device: DeviceMap) -> Result<()> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(anyhow!("not enough free memory on {device}"));
        }
        Ok(())
    }

    fn unload(&self) {
        self.unload_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn generate(&self, input: GenerationInput) -> Result<GenerationOutput> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_generate.load(Ordering::SeqCst) {
            return Err(anyhow!("denoising pass failed"));
        }

        let (width, height) = input.human.person.dimensions();
        let mask = match input.human.mask {
            MaskLayer::Auto => RgbImage::from_pixel(width, height, Rgb([255, 255, 255])),
            MaskLayer::Explicit(mask) => mask,
        };
        Ok(GenerationOutput { result: input.human.person, mask })
    }

    fn device_memory_bytes(&self) -> Option<u64> {
        self.device_memory_bytes
    }
}
