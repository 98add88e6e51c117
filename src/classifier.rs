use std::path::Path;

use ndarray::Array4;
use thiserror::Error;
use tract_onnx::prelude::*;

use crate::preprocess::InputSpec;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("model inference failed: {0}")]
    Tract(#[from] TractError),

    #[error("model produced no output")]
    NoOutput,

    #[error("model produced {actual} scores but {expected} classes are configured")]
    OutputMismatch { expected: usize, actual: usize },
}

/// A loaded model that scores a batch of one preprocessed image.
pub trait Classifier: Send + Sync {
    /// Returns one score per class, in class-list order.
    fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError>;
}

/// Index of the highest score; ties go to the lowest index and `NaN` never wins.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;

    for (index, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((index, score)),
        }
    }

    best.map(|(index, _)| index)
}

pub struct TractClassifier {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>,
}

impl TractClassifier {
    /// Loads an ONNX model, pinning its first input to `spec`'s shape.
    pub fn from_onnx(path: &Path, spec: &InputSpec) -> Result<Self, ClassifierError> {
        let model = tract_onnx::onnx()
            .model_for_path(path)?
            .with_input_fact(0, f32::fact(spec.shape()).into())?
            .into_optimized()?;

        Self::from_typed(model)
    }

    pub fn from_typed(model: TypedModel) -> Result<Self, ClassifierError> {
        Ok(Self {
            model: model.into_runnable()?,
        })
    }
}

impl Classifier for TractClassifier {
    fn classify(&self, input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
        let data: Vec<f32> = input.iter().copied().collect();
        let tensor = Tensor::from_shape(input.shape(), &data)?;

        let outputs = self.model.run(tvec!(tensor.into()))?;
        let scores = outputs.first().ok_or(ClassifierError::NoOutput)?;

        Ok(scores.to_array_view::<f32>()?.iter().copied().collect())
    }
}
