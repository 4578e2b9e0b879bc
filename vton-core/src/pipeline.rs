use image::RgbImage;

use crate::{DeviceMap, TryOnOptions};

/// Person image plus the mask layer the pipeline should work from.
#[derive(Debug, Clone)]
pub struct CompositeInput {
    pub person: RgbImage,
    pub mask: MaskLayer,
}

/// How the garment region on the person image is selected.
#[derive(Debug, Clone)]
pub enum MaskLayer {
    /// The pipeline derives the region with its own segmentation.
    Auto,
    /// Explicit region layer; auto-segmentation is skipped.
    Explicit(RgbImage),
}

/// Everything a single inference pass needs.
#[derive(Debug, Clone)]
pub struct GenerationInput {
    pub human: CompositeInput,
    pub garment: RgbImage,
    pub options: TryOnOptions,
}

/// The two rasters a successful pass produces.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub result: RgbImage,
    pub mask: RgbImage,
}

/// The generation pipeline behind the service.
///
/// Implementations wrap whatever inference stack actually renders the
/// try-on. The service only moves weights between host and accelerator and
/// feeds the pipeline one admitted request at a time. `load`, `unload`, and
/// `generate` block and are called off the async runtime;
/// [`device_memory_bytes`](Self::device_memory_bytes) is the exception and
/// is read inline on the health path.
pub trait TryOnPipeline: Send + Sync {
    /// Moves the pipeline weights onto `device`.
    fn load(&self, device: DeviceMap) -> anyhow::Result<()>;

    /// Moves weights off the accelerator and releases its cache.
    fn unload(&self);

    /// Runs one inference pass. Never retried by the caller.
    fn generate(&self, input: GenerationInput) -> anyhow::Result<GenerationOutput>;

    /// Total accelerator memory, when the backend can report it.
    ///
    /// Read inline by health reporting; return a cached value rather than
    /// query the device.
    fn device_memory_bytes(&self) -> Option<u64> {
        None
    }
}
