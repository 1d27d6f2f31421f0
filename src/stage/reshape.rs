use crate::{error::EngineError, loader::{input_stream::InputStream, output_stream::OutputStream}, tensor::{stage_data::StageData, tensor::Tensor}};

use super::stage::{Stage, StageType};

#[derive(Clone, Debug)]
pub struct Reshape {
    target_shape: Vec<usize>,
}

impl Reshape {
    pub fn new(target_shape: &[usize]) -> Self {
        Self { target_shape: target_shape.to_vec() }
    }

    pub fn target_shape(&self) -> &[usize] {
        &self.target_shape
    }

    pub fn load_from_stream(stream: &mut InputStream<'_>) -> Result<Self, EngineError> {
        let rank = stream.read_u32()? as usize;
        let sizes = stream.read_u32_array(rank)?;
        let target_shape: Vec<usize> = sizes.into_iter().map(|s| s as usize).collect();

        if Tensor::checked_nelems(&target_shape).is_none() {
            return Err(EngineError::Protocol(
                format!("Reshape target {:?} has an element count that overflows", target_shape)
            ));
        }

        Ok(Self { target_shape })
    }
}

impl Stage for Reshape {
    fn stage_type(&self) -> StageType {
        StageType::Reshape
    }

    fn name(&self) -> String {
        "Reshape".to_string()
    }

    fn config_string(&self) -> Option<String> {
        let dims = self.target_shape.iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("x");
        Some(format!("shape={}", dims))
    }

    fn forward_prop(&self, input: &StageData) -> Result<StageData, EngineError> {
        let input = input.as_tensor("Reshape")?;

        let target_nelems = Tensor::checked_nelems(&self.target_shape).ok_or_else(|| EngineError::ShapeMismatch(
            format!("Reshape target {:?} has an element count that overflows", self.target_shape)
        ))?;
        if target_nelems != input.nelems() {
            return Err(EngineError::SizeMismatch {
                expected: target_nelems,
                got: input.nelems(),
            });
        }

        Ok(input.view(&self.target_shape)?.into())
    }

    fn save_to_stream(&self, stream: &mut OutputStream) {
        stream.write_u32(self.target_shape.len() as u32);
        for &size in &self.target_shape {
            stream.write_u32(size as u32);
        }
    }
}
