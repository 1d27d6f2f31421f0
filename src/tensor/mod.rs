pub mod compare;
pub mod stage_data;
pub mod tensor;
pub mod tensor_file;
pub mod tensor_init;
