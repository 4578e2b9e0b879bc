use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task;
use tracing::{error, info};

use crate::codec;
use crate::{
    CompositeInput, GenerationInput, MaskLayer, ResidencyManager, ResidencyStatus, TryOnError,
    TryOnOptions, TryOnParams, TryOnPipeline,
};

/// One finished try-on: both output rasters PNG-encoded as base64, plus the
/// normalized parameters they were produced with.
#[derive(Debug, Clone, Serialize)]
pub struct TryOnResult {
    pub result_image: String,
    pub mask_image: String,
    pub parameters: TryOnOptions,
}

/// Request-handling core: validates, guarantees residency, decodes, and
/// drives the pipeline exactly once per request.
pub struct TryOnService {
    pipeline: Arc<dyn TryOnPipeline>,
    residency: Arc<ResidencyManager>,
    /// Admission gate around generation; one permit per concurrent pass.
    gate: Arc<Semaphore>,
}

impl TryOnService {
    pub fn new(
        pipeline: Arc<dyn TryOnPipeline>,
        residency: Arc<ResidencyManager>,
        generation_slots: usize,
    ) -> Self {
        // Zero slots would park every request forever.
        let slots = generation_slots.max(1);
        Self { pipeline, residency, gate: Arc::new(Semaphore::new(slots)) }
    }

    /// Try-on over raw image bytes.
    pub async fn try_on(
        &self,
        human: &[u8],
        garment: &[u8],
        params: TryOnParams,
    ) -> Result<TryOnResult, TryOnError> {
        let options = params.validate()?;
        self.residency.ensure_loaded().await?;
        let human = codec::decode(human)?;
        let garment = codec::decode(garment)?;
        self.run(human, garment, options).await
    }

    /// Try-on over base64-encoded image text.
    pub async fn try_on_base64(
        &self,
        human: &str,
        garment: &str,
        params: TryOnParams,
    ) -> Result<TryOnResult, TryOnError> {
        let options = params.validate()?;
        self.residency.ensure_loaded().await?;
        let human = codec::decode_base64(human)?;
        let garment = codec::decode_base64(garment)?;
        self.run(human, garment, options).await
    }

    async fn run(
        &self,
        human: RgbImage,
        garment: RgbImage,
        options: TryOnOptions,
    ) -> Result<TryOnResult, TryOnError> {
        let mask = if options.auto_mask {
            MaskLayer::Auto
        } else {
            // Solid black layer at the person's dimensions: skip
            // auto-segmentation, work from the explicit region.
            MaskLayer::Explicit(RgbImage::new(human.width(), human.height()))
        };
        let input = GenerationInput {
            human: CompositeInput { person: human, mask },
            garment,
            options: options.clone(),
        };

        let permit = self
            .gate
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TryOnError::generation("generation gate closed"))?;
        info!(
            description = %options.garment_description,
            steps = options.denoise_steps,
            "processing try-on request"
        );
        let started = Instant::now();
        let pipeline = self.pipeline.clone();
        let output = task::spawn_blocking(move || {
            let _permit = permit;
            pipeline.generate(input)
        })
        .await
        .map_err(|e| {
            error!("generation task panicked: {e}");
            TryOnError::generation("internal")
        })?
        .map_err(|e| TryOnError::generation(e.to_string()))?;
        info!(elapsed_ms = started.elapsed().as_millis() as u64, "try-on request complete");

        Ok(TryOnResult {
            result_image: codec::encode_base64(&output.result)?,
            mask_image: codec::encode_base64(&output.mask)?,
            parameters: options,
        })
    }

    /// Explicit operator-facing load, independent of inference traffic.
    pub async fn load_model(&self) -> Result<ResidencyStatus, TryOnError> {
        self.residency.ensure_loaded().await?;
        Ok(self.residency.status())
    }

    /// Explicit operator-facing unload; safe to call at any time.
    pub async fn unload_model(&self) -> ResidencyStatus {
        self.residency.ensure_unloaded().await;
        self.residency.status()
    }

    /// Residency snapshot for health reporting.
    pub fn status(&self) -> ResidencyStatus {
        self.residency.status()
    }

    /// Total accelerator memory as reported by the backend, if any.
    pub fn device_memory_bytes(&self) -> Option<u64> {
        self.pipeline.device_memory_bytes()
    }
}
