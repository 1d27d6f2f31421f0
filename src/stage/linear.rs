use crate::{error::EngineError, loader::{input_stream::InputStream, output_stream::OutputStream}, tensor::{stage_data::StageData, tensor::Tensor, tensor_init::TensorInit}};

use super::stage::{Stage, StageType};

// Fully connected stage. Weights are [n_outputs, n_inputs] column-major,
// so weight (i, k) sits at i + n_outputs * k.
#[derive(Clone, Debug)]
pub struct Linear {
    n_inputs: usize,
    n_outputs: usize,
    weights: Tensor,
    biases: Tensor,
}

impl Linear {
    pub fn new(n_inputs: usize, n_outputs: usize) -> Self {
        Self {
            n_inputs,
            n_outputs,
            weights: Tensor::new(&[n_outputs, n_inputs]),
            biases: Tensor::new(&[n_outputs]),
        }
    }

    pub fn new_with_init(n_inputs: usize, n_outputs: usize, init: &TensorInit) -> Self {
        Self {
            n_inputs,
            n_outputs,
            weights: init.init(&[n_outputs, n_inputs]),
            biases: init.init(&[n_outputs]),
        }
    }

    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    pub fn weights(&self) -> &Tensor {
        &self.weights
    }

    pub fn biases(&self) -> &Tensor {
        &self.biases
    }

    pub fn set_weights(&mut self, weights: &[f32]) -> Result<(), EngineError> {
        self.weights.set_data(weights)
    }

    pub fn set_biases(&mut self, biases: &[f32]) -> Result<(), EngineError> {
        self.biases.set_data(biases)
    }

    pub fn load_from_stream(stream: &mut InputStream<'_>) -> Result<Self, EngineError> {
        let n_outputs = stream.read_count("Linear output count")?;
        let n_inputs = stream.read_count("Linear input count")?;

        let num_weights = n_outputs.checked_mul(n_inputs).ok_or_else(|| EngineError::Protocol(
            format!("Linear weight count {}x{} overflows", n_outputs, n_inputs)
        ))?;
        let weights = stream.read_f32_array(num_weights)?;
        let biases = stream.read_f32_array(n_outputs)?;

        Ok(Self {
            n_inputs,
            n_outputs,
            weights: Tensor::from_vec(&[n_outputs, n_inputs], weights)?,
            biases: Tensor::from_vec(&[n_outputs], biases)?,
        })
    }
}

impl Stage for Linear {
    fn stage_type(&self) -> StageType {
        StageType::Linear
    }

    fn name(&self) -> String {
        "Linear".to_string()
    }

    fn config_string(&self) -> Option<String> {
        Some(format!("{} -> {}", self.n_inputs, self.n_outputs))
    }

    fn parameter_count(&self) -> usize {
        self.weights.nelems() + self.biases.nelems()
    }

    fn forward_prop(&self, input: &StageData) -> Result<StageData, EngineError> {
        let input = input.as_tensor("Linear")?;

        if input.rank() != 1 || input.nelems() != self.n_inputs {
            return Err(EngineError::ShapeMismatch(
                format!("Linear expects a rank 1 input of {} elements, got {:?}",
                        self.n_inputs, input.shape())
            ));
        }

        let x = input.data();
        let w = self.weights.data();
        let mut output = self.biases.clone();

        // Bias is added last so the summation order matches an explicit
        // sum over k followed by + b[i]
        for (i, out) in output.data_mut().iter_mut().enumerate() {
            let mut acc = 0.0f32;
            for (k, &xk) in x.iter().enumerate() {
                acc += w[i + self.n_outputs * k] * xk;
            }
            *out += acc;
        }

        Ok(output.into())
    }

    fn save_to_stream(&self, stream: &mut OutputStream) {
        stream.write_i32(self.n_outputs as i32);
        stream.write_i32(self.n_inputs as i32);
        stream.write_f32_array(self.weights.data());
        stream.write_f32_array(self.biases.data());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_like_projection() {
        let mut linear = Linear::new(3, 2);
        // w(0,0) = 1, w(1,1) = 1, column-major [2, 3]
        linear.set_weights(&[1.0, 0.0, 0.0, 1.0, 0.0, 0.0]).unwrap();
        linear.set_biases(&[0.0, 0.0]).unwrap();

        let input = Tensor::from_data(&[3], &[5.0, 7.0, 9.0]).unwrap();
        let out = linear.forward_prop(&input.into()).unwrap().into_tensor("test").unwrap();
        assert_eq!(out.shape(), &[2]);
        assert_eq!(out.data(), &[5.0, 7.0]);
    }

    #[test]
    fn weights_and_biases_combine() {
        let mut linear = Linear::new(2, 2);
        // [[1, 2], [3, 4]] as rows, stored column-major
        linear.set_weights(&[1.0, 3.0, 2.0, 4.0]).unwrap();
        linear.set_biases(&[0.5, -1.0]).unwrap();

        let input = Tensor::from_data(&[2], &[1.0, 1.0]).unwrap();
        let out = linear.forward_prop(&input.into()).unwrap().into_tensor("test").unwrap();
        assert_eq!(out.data(), &[3.5, 6.0]);
    }

    #[test]
    fn wrong_input_shape() {
        let linear = Linear::new(3, 2);
        assert!(matches!(linear.forward_prop(&Tensor::new(&[4]).into()),
                         Err(EngineError::ShapeMismatch(_))));
        assert!(linear.forward_prop(&Tensor::new(&[3, 1]).into()).is_err());
    }

    #[test]
    fn bad_parameter_lengths() {
        let mut linear = Linear::new(3, 2);
        assert!(linear.set_weights(&[1.0; 5]).is_err());
        assert!(linear.set_biases(&[1.0; 3]).is_err());
    }

    #[test]
    fn parameter_count_and_init() {
        let linear = Linear::new_with_init(4, 3, &TensorInit::Constant(0.5));
        assert_eq!(linear.parameter_count(), 15);
        assert!(linear.weights().data().iter().all(|&w| w == 0.5));
    }

    #[test]
    fn stream_layout() {
        let mut linear = Linear::new(2, 1);
        linear.set_weights(&[0.25, -0.5]).unwrap();
        linear.set_biases(&[2.0]).unwrap();

        let mut stream = OutputStream::new();
        linear.save_to_stream(&mut stream);
        let bytes = stream.into_bytes();
        assert_eq!(bytes.len(), 4 * (2 + 2 + 1));
        assert_eq!(&bytes[0..4], &1i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &2i32.to_le_bytes());

        let decoded = Linear::load_from_stream(&mut InputStream::new(&bytes)).unwrap();
        assert_eq!(decoded.weights(), linear.weights());
        assert_eq!(decoded.biases(), linear.biases());
    }

    #[test]
    fn truncated_weights() {
        let mut stream = OutputStream::new();
        stream.write_i32(4);
        stream.write_i32(4);
        stream.write_f32_array(&[0.0; 3]);
        let bytes = stream.into_bytes();
        assert!(matches!(Linear::load_from_stream(&mut InputStream::new(&bytes)),
                         Err(EngineError::Protocol(_))));
    }
}
