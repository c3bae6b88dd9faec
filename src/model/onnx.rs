//! ONNX inference through `tract-onnx`.
//!
//! The Keras classifier is exported to ONNX once; the graph is loaded and
//! optimized at startup for a fixed clip shape and shared by all requests.

use std::path::Path;
use tract_onnx::prelude::*;

use super::DeepfakeModel;
use crate::error::{DetectError, Result};
use crate::video::ClipTensor;

pub struct OnnxModel {
    plan: TypedRunnableModel<TypedModel>,
    input_shape: [usize; 5],
}

impl std::fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxModel")
            .field("input_shape", &self.input_shape)
            .finish()
    }
}

impl OnnxModel {
    /// Load a model taking `[1, frames, size, size, 3]` f32 input.
    pub fn load(path: &Path, frames: usize, size: u32) -> Result<Self> {
        if frames == 0 || size == 0 {
            return Err(DetectError::Model(
                "clip shape dimensions must all be > 0".to_string(),
            ));
        }
        let input_shape = [1, frames, size as usize, size as usize, 3];

        log::info!("[model] Loading {:?} for input {:?}", path, input_shape);

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| DetectError::Model(format!("onnx load failed: {e}")))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, frames, size as usize, size as usize, 3),
                ),
            )
            .map_err(|e| DetectError::Model(format!("onnx input fact failed: {e}")))?
            .into_optimized()
            .map_err(|e| DetectError::Model(format!("onnx optimize failed: {e}")))?
            .into_runnable()
            .map_err(|e| DetectError::Model(format!("onnx runnable failed: {e}")))?;

        let model = Self { plan, input_shape };

        // A dummy pass catches graphs whose output cannot be read as a probability.
        let zeros = ClipTensor {
            shape: input_shape,
            data: vec![0.0; input_shape.iter().product::<usize>()],
        };
        let warmup = model.run(&zeros)?;
        log::info!(
            "[model] Model loaded successfully ({} output values)",
            warmup.len()
        );

        Ok(model)
    }

    pub fn input_shape(&self) -> &[usize; 5] {
        &self.input_shape
    }

    fn run(&self, clip: &ClipTensor) -> Result<Vec<f32>> {
        if clip.shape != self.input_shape {
            return Err(DetectError::Model(format!(
                "clip shape {:?} does not match model input {:?}",
                clip.shape, self.input_shape
            )));
        }

        let tensor = tract_ndarray::ArrayD::<f32>::from_shape_vec(
            tract_ndarray::IxDyn(&clip.shape),
            clip.data.clone(),
        )
        .map_err(|e| DetectError::Model(format!("onnx input reshape failed: {e}")))?
        .into_tvalue();

        let outputs = self
            .plan
            .run(tvec!(tensor))
            .map_err(|e| DetectError::Model(format!("onnx run failed: {e}")))?;
        let first = outputs
            .first()
            .ok_or_else(|| DetectError::Model("onnx produced no outputs".to_string()))?;

        let values: Vec<f32> = first
            .to_array_view::<f32>()
            .map_err(|e| DetectError::Model(format!("onnx output decode failed: {e}")))?
            .iter()
            .copied()
            .collect();
        if values.is_empty() {
            return Err(DetectError::Model("onnx output has zero elements".to_string()));
        }
        Ok(values)
    }
}

impl DeepfakeModel for OnnxModel {
    fn predict(&self, clip: &ClipTensor) -> Result<f32> {
        let values = self.run(clip)?;
        // Single sigmoid unit: element 0 is P(fake)
        Ok(values[0])
    }
}
