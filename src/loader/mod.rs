pub mod file_utils;
pub mod input_stream;
pub mod output_stream;
pub mod stage_loader;
