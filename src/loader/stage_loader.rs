use std::path::Path;

use crate::{
    config::{EngineConfig, DEFAULT_MAX_STAGE_DEPTH},
    error::EngineError,
    stage::{
        activations::{Tanh, Threshold},
        linear::Linear,
        reshape::Reshape,
        sequential::Sequential,
        spatial_convolution::SpatialConvolution,
        spatial_dropout::SpatialDropout,
        spatial_max_pooling::SpatialMaxPooling,
        stage::{Stage, StageType},
    },
};

use super::{file_utils, input_stream::InputStream, output_stream::OutputStream};

// Rebuilds a stage graph from the tagged record layout. Each record is an i32 type tag
// followed by the fields of that stage; Sequential records recurse once per child.
pub struct StageLoader {
    max_depth: usize,
}

impl StageLoader {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_STAGE_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        Self::with_max_depth(config.max_stage_depth)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    // Decodes any single stage record
    pub fn load_stage(&self, buffer: &[u8]) -> Result<Box<dyn Stage>, EngineError> {
        let mut stream = InputStream::new(buffer);
        let stage = self.load_from_stream(&mut stream, 0)?;
        warn_on_trailing_bytes(&stream);
        Ok(stage)
    }

    // Decodes a model file, the root record must be a Sequential
    pub fn load_model(&self, buffer: &[u8]) -> Result<Sequential, EngineError> {
        let mut stream = InputStream::new(buffer);

        let tag = stream.read_i32()?;
        match StageType::from_tag(tag) {
            Some(StageType::Sequential) => {},
            Some(other) => return Err(EngineError::Protocol(
                format!("Model root must be a Sequential, found {:?}", other)
            )),
            None => return Err(EngineError::UnknownStageType(tag)),
        }

        let model = Sequential::load_from_stream(&mut stream, self, 0)?;
        warn_on_trailing_bytes(&stream);

        log::info!(
            "Loaded model: {} top level stages, kind {:?}, {} classes, {} parameters",
            model.size(), model.network_kind(), model.labels().len(), model.parameter_count()
        );
        Ok(model)
    }

    pub fn load_model_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Sequential, EngineError> {
        let buffer = file_utils::read_to_buffer(path)?;
        self.load_model(&buffer)
    }

    // Fatal decode errors end the process here, everything else goes back to the caller
    pub fn load_model_or_exit<P: AsRef<Path>>(&self, path: P) -> Result<Sequential, EngineError> {
        let path = path.as_ref();
        match self.load_model_from_file(path) {
            Err(e) if e.is_fatal() => {
                log::error!("Fatal: cannot load model {}: {}", path.display(), e);
                std::process::exit(1);
            },
            result => result,
        }
    }

    // Generic entry point: one tag, then the matching decoder
    pub fn load_from_stream(&self, stream: &mut InputStream<'_>, depth: usize) -> Result<Box<dyn Stage>, EngineError> {
        if depth > self.max_depth {
            return Err(EngineError::Protocol(
                format!("Stage nesting exceeds the maximum depth of {} at offset {}",
                        self.max_depth, stream.position())
            ));
        }

        let offset = stream.position();
        let tag = stream.read_i32()?;
        let stage_type = StageType::from_tag(tag).ok_or(EngineError::UnknownStageType(tag))?;

        log::debug!("Decoding {:?} (tag {}) at offset {}, depth {}", stage_type, tag, offset, depth);

        let stage: Box<dyn Stage> = match stage_type {
            StageType::Sequential => Box::new(Sequential::load_from_stream(stream, self, depth)?),
            StageType::Tanh => Box::new(Tanh::load_from_stream(stream)?),
            StageType::Threshold => Box::new(Threshold::load_from_stream(stream)?),
            StageType::Linear => Box::new(Linear::load_from_stream(stream)?),
            StageType::Reshape => Box::new(Reshape::load_from_stream(stream)?),
            StageType::SpatialConvolution => Box::new(SpatialConvolution::load_from_stream(stream)?),
            StageType::SpatialMaxPooling => Box::new(SpatialMaxPooling::load_from_stream(stream)?),
            StageType::SpatialDropout => Box::new(SpatialDropout::load_from_stream(stream)?),
        };

        Ok(stage)
    }
}

impl Default for StageLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn warn_on_trailing_bytes(stream: &InputStream<'_>) {
    if stream.remaining() > 0 {
        log::warn!(
            "{} trailing bytes after the root stage at offset {} were not read",
            stream.remaining(), stream.position()
        );
    }
}

// Writes the tag and then the stage fields, the exact layout load_from_stream reads
pub fn save_stage(stage: &dyn Stage, stream: &mut OutputStream) {
    stream.write_i32(stage.stage_type().tag());
    stage.save_to_stream(stream);
}

pub fn save_model_to_file<P: AsRef<Path>>(model: &Sequential, path: P) -> Result<(), EngineError> {
    let mut stream = OutputStream::new();
    save_stage(model, &mut stream);
    file_utils::write_buffer(path, stream.as_bytes())
}
