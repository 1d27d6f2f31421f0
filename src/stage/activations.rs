use crate::{error::EngineError, loader::{input_stream::InputStream, output_stream::OutputStream}, tensor::{stage_data::StageData, tensor::Tensor}};

use super::stage::{Stage, StageType};

pub const DEFAULT_THRESHOLD: f32 = 1e-6;
pub const DEFAULT_THRESHOLD_VALUE: f32 = 0.0;

// Applies `op` to every element into a fresh tensor of the same shape
fn map_elements(input: &StageData, stage: &str, op: impl Fn(f32) -> f32) -> Result<StageData, EngineError> {
    let input = input.as_tensor(stage)?;
    let data = input.data().iter().map(|&x| op(x)).collect();
    Ok(Tensor::from_vec(input.shape(), data)?.into())
}

#[derive(Clone, Debug, Default)]
pub struct Tanh;

impl Tanh {
    pub fn new() -> Self {
        Self
    }

    // No fields on the wire
    pub fn load_from_stream(_stream: &mut InputStream<'_>) -> Result<Self, EngineError> {
        Ok(Self)
    }
}

impl Stage for Tanh {
    fn stage_type(&self) -> StageType {
        StageType::Tanh
    }

    fn name(&self) -> String {
        "Tanh".to_string()
    }

    fn forward_prop(&self, input: &StageData) -> Result<StageData, EngineError> {
        map_elements(input, "Tanh", f32::tanh)
    }

    fn save_to_stream(&self, _stream: &mut OutputStream) {}
}

// Passes values strictly above `threshold`, replaces the rest with `val`
#[derive(Clone, Debug)]
pub struct Threshold {
    pub threshold: f32,
    pub val: f32,
}

impl Threshold {
    pub fn new() -> Self {
        Self::new_with(DEFAULT_THRESHOLD, DEFAULT_THRESHOLD_VALUE)
    }

    pub fn new_with(threshold: f32, val: f32) -> Self {
        Self { threshold, val }
    }

    // Both fields are consumed and then dropped in favour of the defaults.
    // Models exported with other values still evaluate as a plain ReLU.
    pub fn load_from_stream(stream: &mut InputStream<'_>) -> Result<Self, EngineError> {
        let threshold = stream.read_f32()?;
        let val = stream.read_f32()?;

        if threshold != DEFAULT_THRESHOLD || val != DEFAULT_THRESHOLD_VALUE {
            log::debug!(
                "Threshold: stream holds threshold={} val={}, using defaults {} and {}",
                threshold, val, DEFAULT_THRESHOLD, DEFAULT_THRESHOLD_VALUE
            );
        }

        Ok(Self::new())
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for Threshold {
    fn stage_type(&self) -> StageType {
        StageType::Threshold
    }

    fn name(&self) -> String {
        "Threshold".to_string()
    }

    fn config_string(&self) -> Option<String> {
        Some(format!("threshold={}, val={}", self.threshold, self.val))
    }

    fn forward_prop(&self, input: &StageData) -> Result<StageData, EngineError> {
        let (threshold, val) = (self.threshold, self.val);
        map_elements(input, "Threshold", |x| if x > threshold { x } else { val })
    }

    fn save_to_stream(&self, stream: &mut OutputStream) {
        stream.write_f32(self.threshold);
        stream.write_f32(self.val);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(stage: &dyn Stage, shape: &[usize], data: &[f32]) -> Tensor {
        let input = Tensor::from_data(shape, data).unwrap();
        stage.forward_prop(&input.into()).unwrap().into_tensor("test").unwrap()
    }

    #[test]
    fn tanh_keeps_shape() {
        let out = run(&Tanh::new(), &[2, 2], &[0.0, 1.0, -1.0, 10.0]);
        assert_eq!(out.shape(), &[2, 2]);
        assert_eq!(out.data()[0], 0.0);
        assert!((out.data()[1] - 0.761_594_2).abs() < 1e-6);
        assert!((out.data()[2] + 0.761_594_2).abs() < 1e-6);
        assert!((out.data()[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn threshold_defaults() {
        let out = run(&Threshold::new(), &[4], &[-1.0, 0.0, 1e-7, 1.0]);
        assert_eq!(out.data(), &[0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn threshold_with_custom_values() {
        let out = run(&Threshold::new_with(0.5, -2.0), &[3], &[0.5, 0.6, 0.1]);
        assert_eq!(out.data(), &[-2.0, 0.6, -2.0]);
    }

    #[test]
    fn threshold_decode_resets_to_defaults() {
        let mut stream = OutputStream::new();
        Threshold::new_with(3.0, 9.0).save_to_stream(&mut stream);
        let bytes = stream.into_bytes();

        let mut input = InputStream::new(&bytes);
        let decoded = Threshold::load_from_stream(&mut input).unwrap();
        assert_eq!(input.remaining(), 0);
        assert_eq!(decoded.threshold, DEFAULT_THRESHOLD);
        assert_eq!(decoded.val, DEFAULT_THRESHOLD_VALUE);
    }

    #[test]
    fn table_input_is_rejected() {
        let table = StageData::Table(vec![Tensor::new(&[1]).into()]);
        assert!(matches!(Tanh::new().forward_prop(&table), Err(EngineError::TypeMismatch(_))));
        assert!(matches!(Threshold::new().forward_prop(&table), Err(EngineError::TypeMismatch(_))));
    }
}
