use crate::{
    error::EngineError,
    loader::{input_stream::InputStream, output_stream::OutputStream, stage_loader::{self, StageLoader}},
    tensor::{stage_data::StageData, tensor::Tensor},
};

use super::stage::{Stage, StageType};

// Marker word every Sequential record carries after its tag
const SEQUENTIAL_RESERVED: i32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkKind {
    Mlp,
    Convnet,
    Undefined,
}

impl NetworkKind {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => NetworkKind::Mlp,
            1 => NetworkKind::Convnet,
            _ => NetworkKind::Undefined,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            NetworkKind::Mlp => 0,
            NetworkKind::Convnet => 1,
            NetworkKind::Undefined => -1,
        }
    }
}

// Ordered pipeline of owned stages, executed in insertion order
#[derive(Debug)]
pub struct Sequential {
    stages: Vec<Box<dyn Stage>>,
    network_kind: NetworkKind,
    labels: Vec<i32>,
}

impl Sequential {
    pub fn new() -> Self {
        Self::new_with(NetworkKind::Undefined, Vec::new())
    }

    pub fn new_with(network_kind: NetworkKind, labels: Vec<i32>) -> Self {
        Self {
            stages: Vec::new(),
            network_kind,
            labels,
        }
    }

    pub fn add(&mut self, stage: Box<dyn Stage>) {
        self.stages.push(stage);
    }

    pub fn get(&self, index: usize) -> Option<&dyn Stage> {
        self.stages.get(index).map(|stage| stage.as_ref())
    }

    pub fn size(&self) -> usize {
        self.stages.len()
    }

    pub fn stages(&self) -> &[Box<dyn Stage>] {
        &self.stages
    }

    pub fn network_kind(&self) -> NetworkKind {
        self.network_kind
    }

    pub fn set_network_kind(&mut self, network_kind: NetworkKind) {
        self.network_kind = network_kind;
    }

    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    pub fn set_labels(&mut self, labels: Vec<i32>) {
        self.labels = labels;
    }

    // Wraps a flat, row-major square image in the input shape the network kind expects
    pub fn forward_image(&self, image: &[f32], image_dim: usize) -> Result<Tensor, EngineError> {
        let shape: Vec<usize> = match self.network_kind {
            NetworkKind::Mlp => vec![image_dim, image_dim],
            NetworkKind::Convnet => vec![image_dim, image_dim, 1],
            NetworkKind::Undefined => return Err(EngineError::UndefinedNetworkKind),
        };

        if image.len() != image_dim * image_dim {
            return Err(EngineError::ShapeMismatch(
                format!("Image of {} pixels is not {}x{}", image.len(), image_dim, image_dim)
            ));
        }

        let input = Tensor::from_data(&shape, image)?;
        self.forward_prop(&input.into())?.into_tensor("Sequential")
    }

    // Decodes the record body after the tag, children go back through the loader
    pub fn load_from_stream(
        stream: &mut InputStream<'_>,
        loader: &StageLoader,
        depth: usize,
    ) -> Result<Self, EngineError> {
        let reserved = stream.read_i32()?;
        if reserved != SEQUENTIAL_RESERVED {
            log::debug!("Sequential: reserved word is {}, ignoring", reserved);
        }

        let network_kind = NetworkKind::from_code(stream.read_i32()?);
        let num_classes = stream.read_count("class label count")?;
        let labels = stream.read_i32_array(num_classes)?;
        let num_children = stream.read_count("Sequential child count")?;

        let mut sequential = Self::new_with(network_kind, labels);
        for _ in 0..num_children {
            sequential.add(loader.load_from_stream(stream, depth + 1)?);
        }

        log::debug!(
            "Sequential: decoded {} stages at depth {}, kind {:?}, {} labels",
            sequential.size(), depth, network_kind, sequential.labels.len()
        );
        Ok(sequential)
    }

    pub fn summary(&self) -> String {
        let rule = format!("{:-<80}", "");
        let mut lines = vec![
            "Model Summary".to_string(),
            "=============".to_string(),
            format!("Network kind: {:?}", self.network_kind),
            format!("Classes: {}", self.labels.len()),
            rule.clone(),
            format!("{:<4} {:<60} {:<15}", "ID", "Stage", "Parameters"),
            rule.clone(),
        ];

        lines.extend(self.stages.iter().enumerate().map(|(id, stage)| {
            format!("{:<4} {:<60} {:<15}", id, stage.description(), stage.parameter_count())
        }));

        lines.push(rule);
        lines.push(format!("Total stages: {}", self.stages.len()));
        lines.push(format!("Total parameters: {}", self.parameter_count()));

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

impl Default for Sequential {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for Sequential {
    fn stage_type(&self) -> StageType {
        StageType::Sequential
    }

    fn name(&self) -> String {
        "Sequential".to_string()
    }

    fn config_string(&self) -> Option<String> {
        Some(format!("{} stages", self.stages.len()))
    }

    fn parameter_count(&self) -> usize {
        self.stages.iter().map(|stage| stage.parameter_count()).sum()
    }

    fn forward_prop(&self, input: &StageData) -> Result<StageData, EngineError> {
        let (first, rest) = self.stages.split_first().ok_or_else(|| EngineError::Configuration(
            "Cannot run an empty Sequential".to_string()
        ))?;

        let mut current = first.forward_prop(input)?;
        log::debug!("Stage 0 ({}) done", first.name());

        // Each intermediate is dropped once the next stage has produced its output
        for (id, stage) in rest.iter().enumerate() {
            current = stage.forward_prop(&current)?;
            log::debug!("Stage {} ({}) done", id + 1, stage.name());
        }

        Ok(current)
    }

    fn save_to_stream(&self, stream: &mut OutputStream) {
        stream.write_i32(SEQUENTIAL_RESERVED);
        stream.write_i32(self.network_kind.code());
        stream.write_i32(self.labels.len() as i32);
        stream.write_i32_array(&self.labels);
        stream.write_i32(self.stages.len() as i32);
        for stage in &self.stages {
            stage_loader::save_stage(stage.as_ref(), stream);
        }
    }
}
