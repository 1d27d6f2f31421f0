use std::fmt;

use crate::{error::EngineError, loader::output_stream::OutputStream, tensor::stage_data::StageData};

// Type tags as they appear in model files
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageType {
    Sequential,
    Tanh,
    Threshold,
    Linear,
    Reshape,
    SpatialConvolution,
    SpatialMaxPooling,
    SpatialDropout,
}

// Older exporters wrote the GEMM based convolution under its own tag
pub const SPATIAL_CONVOLUTION_MM_TAG: i32 = 18;

impl StageType {
    pub fn tag(self) -> i32 {
        match self {
            StageType::Sequential => 1,
            StageType::Tanh => 3,
            StageType::Threshold => 4,
            StageType::Linear => 5,
            StageType::Reshape => 6,
            StageType::SpatialConvolution => 7,
            StageType::SpatialMaxPooling => 10,
            StageType::SpatialDropout => 21,
        }
    }

    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            1 => Some(StageType::Sequential),
            3 => Some(StageType::Tanh),
            4 => Some(StageType::Threshold),
            5 => Some(StageType::Linear),
            6 => Some(StageType::Reshape),
            7 | SPATIAL_CONVOLUTION_MM_TAG => Some(StageType::SpatialConvolution),
            10 => Some(StageType::SpatialMaxPooling),
            21 => Some(StageType::SpatialDropout),
            _ => None,
        }
    }
}

pub trait Stage: fmt::Debug + Send + Sync {
    fn stage_type(&self) -> StageType;

    // Return a string representation of the stage name
    fn name(&self) -> String;

    // Return optional configuration details for the stage
    fn config_string(&self) -> Option<String> {
        None
    }

    // Return the total number of learned parameters in this stage
    fn parameter_count(&self) -> usize {
        0
    }

    // Never mutates the input, always returns freshly allocated output
    fn forward_prop(&self, input: &StageData) -> Result<StageData, EngineError>;

    // Write the fields the stage decoder reads, in order, without the leading type tag
    fn save_to_stream(&self, stream: &mut OutputStream);

    fn description(&self) -> String {
        match self.config_string() {
            Some(config) => format!("{}({})", self.name(), config),
            None => self.name(),
        }
    }
}
