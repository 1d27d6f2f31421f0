use crate::error::EngineError;

// Forward only reader over a model buffer. Every read is bounds checked,
// running past the end is a protocol error rather than a bad read.
pub struct InputStream<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> InputStream<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    fn take(&mut self, num_bytes: usize) -> Result<&'a [u8], EngineError> {
        if num_bytes > self.remaining() {
            return Err(EngineError::Protocol(
                format!("Unexpected end of stream: need {} bytes at offset {}, {} left",
                        num_bytes, self.position, self.remaining())
            ));
        }
        let bytes = &self.buffer[self.position..self.position + num_bytes];
        self.position += num_bytes;
        Ok(bytes)
    }

    fn take_word(&mut self) -> Result<[u8; 4], EngineError> {
        let bytes = self.take(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    pub fn read_i32(&mut self) -> Result<i32, EngineError> {
        Ok(i32::from_le_bytes(self.take_word()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, EngineError> {
        Ok(u32::from_le_bytes(self.take_word()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, EngineError> {
        Ok(f32::from_le_bytes(self.take_word()?))
    }

    // An i32 used as a size or count, negative values are rejected
    pub fn read_count(&mut self, what: &str) -> Result<usize, EngineError> {
        let offset = self.position;
        let value = self.read_i32()?;
        usize::try_from(value).map_err(|_| EngineError::Protocol(
            format!("Negative {} ({}) at offset {}", what, value, offset)
        ))
    }

    fn array_bytes(&self, num_elements: usize) -> Result<usize, EngineError> {
        num_elements.checked_mul(4)
            .filter(|&n| n <= self.remaining())
            .ok_or_else(|| EngineError::Protocol(
                format!("Array of {} words at offset {} does not fit in the {} remaining bytes",
                        num_elements, self.position, self.remaining())
            ))
    }

    pub fn read_f32_array(&mut self, num_elements: usize) -> Result<Vec<f32>, EngineError> {
        let num_bytes = self.array_bytes(num_elements)?;
        let bytes = self.take(num_bytes)?;
        Ok(bytes.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    pub fn read_i32_array(&mut self, num_elements: usize) -> Result<Vec<i32>, EngineError> {
        let num_bytes = self.array_bytes(num_elements)?;
        let bytes = self.take(num_bytes)?;
        Ok(bytes.chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    pub fn read_u32_array(&mut self, num_elements: usize) -> Result<Vec<u32>, EngineError> {
        let num_bytes = self.array_bytes(num_elements)?;
        let bytes = self.take(num_bytes)?;
        Ok(bytes.chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_words_in_order() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(-7i32).to_le_bytes());
        bytes.extend_from_slice(&42u32.to_le_bytes());
        bytes.extend_from_slice(&1.5f32.to_le_bytes());

        let mut stream = InputStream::new(&bytes);
        assert_eq!(stream.read_i32().unwrap(), -7);
        assert_eq!(stream.read_u32().unwrap(), 42);
        assert_eq!(stream.read_f32().unwrap(), 1.5);
        assert_eq!(stream.remaining(), 0);
        assert_eq!(stream.position(), 12);
    }

    #[test]
    fn reading_past_the_end_fails() {
        let bytes = [1u8, 0, 0];
        let mut stream = InputStream::new(&bytes);
        assert!(matches!(stream.read_i32(), Err(EngineError::Protocol(_))));
    }

    #[test]
    fn negative_count_fails() {
        let bytes = (-1i32).to_le_bytes();
        let mut stream = InputStream::new(&bytes);
        assert!(stream.read_count("labels").is_err());
    }

    #[test]
    fn oversized_array_fails_without_reading() {
        let bytes = [0u8; 8];
        let mut stream = InputStream::new(&bytes);
        assert!(stream.read_f32_array(3).is_err());
        assert!(stream.read_f32_array(usize::MAX).is_err());
        assert_eq!(stream.position(), 0);
        assert_eq!(stream.read_f32_array(2).unwrap(), vec![0.0, 0.0]);
    }
}
