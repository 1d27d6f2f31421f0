use std::path::Path;

use crate::{error::EngineError, loader::{file_utils, input_stream::InputStream, output_stream::OutputStream}};

use super::tensor::Tensor;

// On disk: [rank:i32][dim_{rank-1}:i32]...[dim_0:i32][f32 data], little-endian.
// Dimensions are stored highest axis first, the reverse of the in-memory order.

pub fn encode(tensor: &Tensor, stream: &mut OutputStream) {
    stream.write_i32(tensor.rank() as i32);
    for &dim in tensor.shape().iter().rev() {
        stream.write_i32(dim as i32);
    }
    stream.write_f32_array(tensor.data());
}

pub fn decode(stream: &mut InputStream<'_>) -> Result<Tensor, EngineError> {
    let rank = stream.read_count("tensor rank")?;
    if rank == 0 {
        return Err(EngineError::Protocol("Tensor file with rank 0".to_string()));
    }

    // Fit checked against the remaining bytes before anything is allocated
    let dims = stream.read_i32_array(rank)?;
    let shape = dims.iter().rev()
        .map(|&d| usize::try_from(d).map_err(|_| EngineError::Protocol(
            format!("Negative tensor dimension ({})", d)
        )))
        .collect::<Result<Vec<usize>, EngineError>>()?;

    let nelems = Tensor::checked_nelems(&shape)
        .ok_or_else(|| EngineError::Protocol(format!("Tensor shape {:?} overflows", shape)))?;
    let data = stream.read_f32_array(nelems)?;

    Tensor::from_vec(&shape, data)
}

pub fn save_to_file<P: AsRef<Path>>(tensor: &Tensor, path: P) -> Result<(), EngineError> {
    let mut stream = OutputStream::new();
    encode(tensor, &mut stream);
    file_utils::write_buffer(path, stream.as_bytes())
}

pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Tensor, EngineError> {
    let buffer = file_utils::read_to_buffer(path)?;
    let mut stream = InputStream::new(&buffer);
    decode(&mut stream)
}
