use crate::error::EngineError;

use super::tensor::Tensor;

// Value handed from one stage to the next
#[derive(Clone, Debug, PartialEq)]
pub enum StageData {
    Tensor(Tensor),
    Table(Vec<StageData>),
}

impl StageData {
    pub fn variant_name(&self) -> &'static str {
        match self {
            StageData::Tensor(_) => "Tensor",
            StageData::Table(_) => "Table",
        }
    }

    // `stage` names the caller in the error message
    pub fn as_tensor(&self, stage: &str) -> Result<&Tensor, EngineError> {
        match self {
            StageData::Tensor(tensor) => Ok(tensor),
            other => Err(EngineError::TypeMismatch(
                format!("{} expects a Tensor input, got {}", stage, other.variant_name())
            )),
        }
    }

    pub fn into_tensor(self, stage: &str) -> Result<Tensor, EngineError> {
        match self {
            StageData::Tensor(tensor) => Ok(tensor),
            other => Err(EngineError::TypeMismatch(
                format!("{} expects a Tensor input, got {}", stage, other.variant_name())
            )),
        }
    }
}

impl From<Tensor> for StageData {
    fn from(tensor: Tensor) -> Self {
        StageData::Tensor(tensor)
    }
}
