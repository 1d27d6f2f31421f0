use std::fs;
use std::path::Path;

use crate::error::EngineError;

pub fn read_to_buffer<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, EngineError> {
    let path = path.as_ref();
    let buffer = fs::read(path)?;
    log::debug!("Read {} bytes from {}", buffer.len(), path.display());
    Ok(buffer)
}

pub fn write_buffer<P: AsRef<Path>>(path: P, buffer: &[u8]) -> Result<(), EngineError> {
    let path = path.as_ref();
    fs::write(path, buffer)?;
    log::debug!("Wrote {} bytes to {}", buffer.len(), path.display());
    Ok(())
}
