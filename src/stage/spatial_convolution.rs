use crate::{
    blas::{self, im2col::output_extent, Transpose},
    error::EngineError,
    loader::{input_stream::InputStream, output_stream::OutputStream},
    tensor::{stage_data::StageData, tensor::Tensor, tensor_init::TensorInit},
};

use super::stage::{Stage, StageType};

// 2D convolution with unit stride, lowered to im2col plus two GEMM calls.
// Weights are [filt_w, filt_h, feats_in, feats_out], biases [feats_out].
#[derive(Clone, Debug)]
pub struct SpatialConvolution {
    feats_in: usize,
    feats_out: usize,
    filt_h: usize,
    filt_w: usize,
    pad_w: usize,
    pad_h: usize,
    weights: Tensor,
    biases: Tensor,
}

impl SpatialConvolution {
    pub fn new(
        feats_in: usize,
        feats_out: usize,
        filt_h: usize,
        filt_w: usize,
        pad_w: usize,
        pad_h: usize,
    ) -> Self {
        Self {
            feats_in,
            feats_out,
            filt_h,
            filt_w,
            pad_w,
            pad_h,
            weights: Tensor::new(&[filt_w, filt_h, feats_in, feats_out]),
            biases: Tensor::new(&[feats_out]),
        }
    }

    pub fn new_with_init(
        feats_in: usize,
        feats_out: usize,
        filt_h: usize,
        filt_w: usize,
        pad_w: usize,
        pad_h: usize,
        init: &TensorInit,
    ) -> Self {
        let mut conv = Self::new(feats_in, feats_out, filt_h, filt_w, pad_w, pad_h);
        conv.weights = init.init(&[filt_w, filt_h, feats_in, feats_out]);
        conv.biases = init.init(&[feats_out]);
        conv
    }

    pub fn feats_in(&self) -> usize {
        self.feats_in
    }

    pub fn feats_out(&self) -> usize {
        self.feats_out
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
        let filt_w = stream.read_count("convolution filter width")?;
        let filt_h = stream.read_count("convolution filter height")?;
        let feats_in = stream.read_count("convolution input features")?;
        let feats_out = stream.read_count("convolution output features")?;
        let pad_w = stream.read_count("convolution padding width")?;
        let pad_h = stream.read_count("convolution padding height")?;

        let num_weights = [filt_h, feats_in, feats_out].iter()
            .try_fold(filt_w, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| EngineError::Protocol(
                format!("Convolution weight count {}x{}x{}x{} overflows",
                        filt_w, filt_h, feats_in, feats_out)
            ))?;

        let weights = stream.read_f32_array(num_weights)?;
        let biases = stream.read_f32_array(feats_out)?;

        Ok(Self {
            feats_in,
            feats_out,
            filt_h,
            filt_w,
            pad_w,
            pad_h,
            weights: Tensor::from_vec(&[filt_w, filt_h, feats_in, feats_out], weights)?,
            biases: Tensor::from_vec(&[feats_out], biases)?,
        })
    }
}

impl Stage for SpatialConvolution {
    fn stage_type(&self) -> StageType {
        StageType::SpatialConvolution
    }

    fn name(&self) -> String {
        "SpatialConvolution".to_string()
    }

    fn config_string(&self) -> Option<String> {
        Some(format!(
            "{} -> {}, kernel={}x{}, padding={}x{}",
            self.feats_in, self.feats_out, self.filt_w, self.filt_h, self.pad_w, self.pad_h
        ))
    }

    fn parameter_count(&self) -> usize {
        self.weights.nelems() + self.biases.nelems()
    }

    fn forward_prop(&self, input: &StageData) -> Result<StageData, EngineError> {
        let input = input.as_tensor("SpatialConvolution")?;
        let shape = input.shape();

        if shape.len() != 3 || shape[2] != self.feats_in {
            return Err(EngineError::ShapeMismatch(
                format!("SpatialConvolution expects a [w, h, {}] input, got {:?}",
                        self.feats_in, shape)
            ));
        }

        let (in_w, in_h) = (shape[0], shape[1]);
        let out_w = output_extent(in_w, self.filt_w, self.pad_w, 1)?;
        let out_h = output_extent(in_h, self.filt_h, self.pad_h, 1)?;

        let n = out_w * out_h;
        let m = self.feats_out;
        let k = self.feats_in * self.filt_h * self.filt_w;

        let mut output = Tensor::new(&[out_w, out_h, self.feats_out]);
        if n == 0 || m == 0 {
            return Ok(output.into());
        }

        // Every output plane starts out as its bias: out = ones(n) * biases^T
        let ones = vec![1.0f32; n];
        blas::gemm(
            Transpose::Yes, Transpose::No,
            n, m, 1,
            1.0, &ones, 1,
            self.biases.data(), 1,
            0.0, output.data_mut(), n,
        )?;

        // Rows of `columns` are output positions, columns are (feature, ky, kx) taps
        let mut columns = vec![0.0f32; n * k];
        blas::im2col(
            input.data(),
            self.feats_in, in_h, in_w,
            self.filt_h, self.filt_w,
            self.pad_h, self.pad_w,
            1, 1,
            &mut columns,
        )?;

        blas::gemm(
            Transpose::No, Transpose::No,
            n, m, k,
            1.0, &columns, n,
            self.weights.data(), k.max(1),
            1.0, output.data_mut(), n,
        )?;

        log::debug!(
            "SpatialConvolution: [{}, {}, {}] -> [{}, {}, {}]",
            in_w, in_h, self.feats_in, out_w, out_h, self.feats_out
        );

        Ok(output.into())
    }

    fn save_to_stream(&self, stream: &mut OutputStream) {
        stream.write_i32(self.filt_w as i32);
        stream.write_i32(self.filt_h as i32);
        stream.write_i32(self.feats_in as i32);
        stream.write_i32(self.feats_out as i32);
        stream.write_i32(self.pad_w as i32);
        stream.write_i32(self.pad_h as i32);
        stream.write_f32_array(self.weights.data());
        stream.write_f32_array(self.biases.data());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Direct convolution over [w, h, f] tensors, zero padded
    fn direct(conv: &SpatialConvolution, input: &Tensor) -> Vec<f32> {
        let (in_w, in_h, fin) = (input.shape()[0], input.shape()[1], input.shape()[2]);
        let (fw, fh) = (conv.filt_w, conv.filt_h);
        let out_w = in_w + 2 * conv.pad_w - fw + 1;
        let out_h = in_h + 2 * conv.pad_h - fh + 1;
        let w = conv.weights.data();
        let mut out = vec![0.0; out_w * out_h * conv.feats_out];

        for o in 0..conv.feats_out {
            for y in 0..out_h {
                for x in 0..out_w {
                    let mut acc = conv.biases.data()[o];
                    for f in 0..fin {
                        for ky in 0..fh {
                            for kx in 0..fw {
                                let ix = (x + kx) as isize - conv.pad_w as isize;
                                let iy = (y + ky) as isize - conv.pad_h as isize;
                                if ix < 0 || iy < 0 || ix >= in_w as isize || iy >= in_h as isize {
                                    continue;
                                }
                                let value = input.data()[ix as usize + in_w * (iy as usize + in_h * f)];
                                acc += w[kx + fw * (ky + fh * (f + fin * o))] * value;
                            }
                        }
                    }
                    out[x + out_w * (y + out_h * o)] = acc;
                }
            }
        }
        out
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            assert!((a - e).abs() < 1e-4, "index {}: {} vs {}", i, a, e);
        }
    }

    #[test]
    fn impulse_reproduces_flipped_weights() {
        // A single hot pixel in the centre of a 5x5 image, 3x3 filter, no padding
        let mut conv = SpatialConvolution::new(1, 1, 3, 3, 0, 0);
        let weights: Vec<f32> = (1..=9).map(|v| v as f32).collect();
        conv.set_weights(&weights).unwrap();

        let mut input = Tensor::new(&[5, 5, 1]);
        input.set_data_at(2 + 5 * 2, 1.0);

        let out = conv.forward_prop(&input.into()).unwrap().into_tensor("test").unwrap();
        assert_eq!(out.shape(), &[3, 3, 1]);

        // Output (x, y) sees the pixel through tap (2 - x, 2 - y)
        let expected: Vec<f32> = (0..9).map(|i| weights[8 - i]).collect();
        assert_eq!(out.data(), expected.as_slice());
    }

    #[test]
    fn bias_fills_every_output_plane() {
        let mut conv = SpatialConvolution::new(2, 3, 1, 1, 0, 0);
        conv.set_biases(&[1.0, -2.0, 0.5]).unwrap();

        let out = conv.forward_prop(&Tensor::new(&[2, 2, 2]).into()).unwrap()
            .into_tensor("test").unwrap();
        assert_eq!(out.shape(), &[2, 2, 3]);
        assert_eq!(out.data(), &[1.0, 1.0, 1.0, 1.0, -2.0, -2.0, -2.0, -2.0, 0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn matches_direct_convolution_with_padding() {
        let conv = SpatialConvolution::new_with_init(
            3, 4, 3, 2, 1, 2,
            &TensorInit::Seeded { seed: 7, min: -1.0, max: 1.0 },
        );
        let input = TensorInit::Seeded { seed: 11, min: -1.0, max: 1.0 }.init(&[6, 5, 3]);

        let out = conv.forward_prop(&input.clone().into()).unwrap().into_tensor("test").unwrap();
        assert_eq!(out.shape(), &[6 + 2 - 2 + 1, 5 + 4 - 3 + 1, 4]);
        assert_close(out.data(), &direct(&conv, &input));
    }

    #[test]
    fn rejects_bad_inputs() {
        let conv = SpatialConvolution::new(2, 1, 3, 3, 0, 0);
        assert!(matches!(conv.forward_prop(&Tensor::new(&[5, 5, 3]).into()),
                         Err(EngineError::ShapeMismatch(_))));
        assert!(conv.forward_prop(&Tensor::new(&[5, 5]).into()).is_err());
        // Filter larger than the input
        assert!(conv.forward_prop(&Tensor::new(&[2, 2, 2]).into()).is_err());
    }

    #[test]
    fn stream_layout() {
        let conv = SpatialConvolution::new_with_init(
            2, 3, 2, 2, 1, 0,
            &TensorInit::Seeded { seed: 3, min: 0.0, max: 1.0 },
        );
        let mut stream = OutputStream::new();
        conv.save_to_stream(&mut stream);
        let bytes = stream.into_bytes();
        assert_eq!(bytes.len(), 4 * (6 + 2 * 2 * 2 * 3 + 3));

        let decoded = SpatialConvolution::load_from_stream(&mut InputStream::new(&bytes)).unwrap();
        assert_eq!(decoded.weights(), conv.weights());
        assert_eq!(decoded.biases(), conv.biases());
        assert_eq!(decoded.config_string(), conv.config_string());
    }
}
