//! Shared ONNX Runtime helpers for the YOLOv8 family of models.

use std::path::Path;
use std::sync::Mutex;

use image::imageops::FilterType;
use image::RgbImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// A loaded model with its square input edge.
pub struct OnnxModel {
    session: Mutex<Session>,
    input_size: u32,
}

impl OnnxModel {
    /// Load a model from disk.
    pub fn load(model_path: &Path, input_size: u32) -> MediaResult<Self> {
        if !model_path.exists() {
            return Err(MediaError::model_not_found(model_path.display().to_string()));
        }
        let session = create_session(model_path)?;
        Ok(Self {
            session: Mutex::new(session),
            input_size,
        })
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// Resize, normalise and run the model, returning the flat `output0` tensor.
    pub fn infer(&self, frame: &RgbImage) -> MediaResult<Vec<f32>> {
        let input = to_nchw_tensor(frame, self.input_size)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::detection_failed(format!("ONNX inference failed: {}", e)))?;

        let output = outputs
            .get("output0")
            .ok_or_else(|| MediaError::detection_failed("Missing output0 tensor"))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::detection_failed(format!("Failed to extract tensor: {}", e)))?;

        Ok(tensor.1.to_vec())
    }
}

/// Stretch the frame to `size`x`size` and lay it out as `[1, 3, H, W]` in 0..1.
fn to_nchw_tensor(frame: &RgbImage, size: u32) -> MediaResult<Value> {
    let resized = image::imageops::resize(frame, size, size, FilterType::Triangle);
    let plane = (size * size) as usize;

    let mut chw = vec![0f32; 3 * plane];
    for (i, pixel) in resized.pixels().enumerate() {
        chw[i] = pixel[0] as f32 / 255.0;
        chw[plane + i] = pixel[1] as f32 / 255.0;
        chw[2 * plane + i] = pixel[2] as f32 / 255.0;
    }

    let shape = vec![1usize, 3, size as usize, size as usize];
    Tensor::from_array((shape, chw.into_boxed_slice()))
        .map(Value::from)
        .map_err(|e| MediaError::internal(format!("Failed to create tensor: {}", e)))
}

/// Create an ONNX Runtime session, preferring accelerated providers.
fn create_session(model_path: &Path) -> MediaResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| MediaError::internal(format!("Failed to read model file: {}", e)))?;

    let mut builder = Session::builder()
        .map_err(|e| MediaError::internal(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MediaError::internal(format!("Failed to set optimization level: {}", e)))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!(model = %model_path.display(), "Using CUDA execution provider");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, using CPU");
    }

    debug!(model = %model_path.display(), "Using CPU execution provider");
    let session = builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| MediaError::internal(format!("Failed to load ONNX model: {}", e)))?;
    info!(model = %model_path.display(), "ONNX model loaded");
    Ok(session)
}

/// Greedy non-maximum suppression over `(score, box)` candidates.
///
/// Boxes are `[x1, y1, x2, y2]`; candidates are returned highest score first.
pub fn non_maximum_suppression<T>(
    mut candidates: Vec<(f32, [f32; 4], T)>,
    iou_threshold: f32,
) -> Vec<(f32, [f32; 4], T)> {
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut keep: Vec<(f32, [f32; 4], T)> = Vec::new();
    for candidate in candidates {
        if keep.iter().all(|k| iou(&k.1, &candidate.1) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let intersection = inter_w * inter_h;
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    let union = area_a + area_b - intersection;
    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nms_suppresses_overlaps() {
        let candidates = vec![
            (0.6, [0.0, 0.0, 10.0, 10.0], "b"),
            (0.9, [1.0, 1.0, 11.0, 11.0], "a"),
            (0.8, [50.0, 50.0, 60.0, 60.0], "c"),
        ];
        let kept = non_maximum_suppression(candidates, 0.45);
        let labels: Vec<_> = kept.iter().map(|k| k.2).collect();
        assert_eq!(labels, vec!["a", "c"]);
    }

    #[test]
    fn test_load_missing_model() {
        let err = OnnxModel::load(Path::new("/nonexistent/model.onnx"), 640)
            .err()
            .unwrap();
        assert!(matches!(err, MediaError::ModelNotFound(_)));
    }
}
