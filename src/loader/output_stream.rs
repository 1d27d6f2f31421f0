// Writes the little-endian layout InputStream reads back
#[derive(Default)]
pub struct OutputStream {
    buffer: Vec<u8>,
}

impl OutputStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32_array(&mut self, values: &[f32]) {
        self.buffer.reserve(values.len() * 4);
        for value in values {
            self.write_f32(*value);
        }
    }

    pub fn write_i32_array(&mut self, values: &[i32]) {
        self.buffer.reserve(values.len() * 4);
        for value in values {
            self.write_i32(*value);
        }
    }

    pub fn write_u32_array(&mut self, values: &[u32]) {
        self.buffer.reserve(values.len() * 4);
        for value in values {
            self.write_u32(*value);
        }
    }
}
