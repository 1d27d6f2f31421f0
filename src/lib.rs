pub mod blas;
pub mod config;
pub mod error;
pub mod loader;
pub mod stage;
pub mod tensor;

pub use config::EngineConfig;
pub use error::EngineError;
pub use loader::stage_loader::{save_model_to_file, save_stage, StageLoader};
pub use stage::{
    factory::Stages,
    sequential::{NetworkKind, Sequential},
    stage::{Stage, StageType},
};
pub use tensor::{stage_data::StageData, tensor::Tensor, tensor_init::TensorInit};
