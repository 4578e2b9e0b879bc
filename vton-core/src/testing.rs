//! Shared pipeline double for the unit tests in this crate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

use crate::{DeviceMap, GenerationInput, GenerationOutput, MaskLayer, TryOnPipeline};

pub(crate) const TEST_DEVICE_MEMORY_BYTES: u64 = 8 * 1024 * 1024 * 1024;

/// Counts every call, records the last generation input, and tracks how many
/// generation passes ran at the same time.
pub(crate) struct CountingPipeline {
    pub load_calls: AtomicUsize,
    pub unload_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
    pub max_active: AtomicUsize,
    pub fail_load: AtomicBool,
    pub fail_generate: AtomicBool,
    pub last_input: Mutex<Option<GenerationInput>>,
    active: AtomicUsize,
    work: Duration,
}

impl CountingPipeline {
    pub fn new() -> Self {
        Self::with_work(Duration::from_millis(5))
    }

    /// `work` is slept inside `load` and `generate` to widen race windows.
    pub fn with_work(work: Duration) -> Self {
        Self {
            load_calls: AtomicUsize::new(0),
            unload_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            fail_load: AtomicBool::new(false),
            fail_generate: AtomicBool::new(false),
            last_input: Mutex::new(None),
            active: AtomicUsize::new(0),
            work,
        }
    }
}

impl TryOnPipeline for CountingPipeline {
    fn load(&self, _device: DeviceMap) -> Result<()> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.work);
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(anyhow!("not enough free device memory"));
        }
        Ok(())
    }

    fn unload(&self) {
        self.unload_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn generate(&self, input: GenerationInput) -> Result<GenerationOutput> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        std::thread::sleep(self.work);
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail_generate.load(Ordering::SeqCst) {
            return Err(anyhow!("simulated inference failure"));
        }

        let (width, height) = input.human.person.dimensions();
        let mask = match &input.human.mask {
            MaskLayer::Auto => RgbImage::from_pixel(width, height, Rgb([255, 255, 255])),
            MaskLayer::Explicit(mask) => mask.clone(),
        };
        let output = GenerationOutput { result: input.human.person.clone(), mask };
        *self.last_input.lock().unwrap() = Some(input);
        Ok(output)
    }

    fn device_memory_bytes(&self) -> Option<u64> {
        Some(TEST_DEVICE_MEMORY_BYTES)
    }
}
