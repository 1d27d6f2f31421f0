use crate::{error::EngineError, loader::{input_stream::InputStream, output_stream::OutputStream}, tensor::{stage_data::StageData, tensor::Tensor}};

use super::stage::{Stage, StageType};

// Inference form of dropout: every activation is scaled by the keep probability
#[derive(Clone, Debug)]
pub struct SpatialDropout {
    pub p: f32,
}

impl SpatialDropout {
    pub fn new(p: f32) -> Self {
        Self { p }
    }

    pub fn load_from_stream(stream: &mut InputStream<'_>) -> Result<Self, EngineError> {
        Ok(Self { p: stream.read_f32()? })
    }
}

impl Stage for SpatialDropout {
    fn stage_type(&self) -> StageType {
        StageType::SpatialDropout
    }

    fn name(&self) -> String {
        "SpatialDropout".to_string()
    }

    fn config_string(&self) -> Option<String> {
        Some(format!("p={}", self.p))
    }

    fn forward_prop(&self, input: &StageData) -> Result<StageData, EngineError> {
        let input = input.as_tensor("SpatialDropout")?;
        let mut output = input.clone();
        Tensor::mul(&mut output, 1.0 - self.p);
        Ok(output.into())
    }

    fn save_to_stream(&self, stream: &mut OutputStream) {
        stream.write_f32(self.p);
    }
}
