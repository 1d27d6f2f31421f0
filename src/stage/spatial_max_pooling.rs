use crate::{error::EngineError, loader::{input_stream::InputStream, output_stream::OutputStream}, tensor::{stage_data::StageData, tensor::Tensor}};

use super::stage::{Stage, StageType};

// Non-overlapping max pooling. The window always advances by the kernel size;
// stride and padding are carried through the model file but not applied.
#[derive(Clone, Debug)]
pub struct SpatialMaxPooling {
    pub kernel_w: usize,
    pub kernel_h: usize,
    pub stride_w: usize,
    pub stride_h: usize,
    pub pad_w: usize,
    pub pad_h: usize,
}

impl SpatialMaxPooling {
    pub fn new(kernel_w: usize, kernel_h: usize) -> Self {
        Self::new_with(kernel_w, kernel_h, kernel_w, kernel_h, 0, 0)
    }

    pub fn new_with(
        kernel_w: usize,
        kernel_h: usize,
        stride_w: usize,
        stride_h: usize,
        pad_w: usize,
        pad_h: usize,
    ) -> Self {
        Self { kernel_w, kernel_h, stride_w, stride_h, pad_w, pad_h }
    }

    pub fn load_from_stream(stream: &mut InputStream<'_>) -> Result<Self, EngineError> {
        let kernel_w = stream.read_count("pooling kernel width")?;
        let kernel_h = stream.read_count("pooling kernel height")?;
        let stride_w = stream.read_count("pooling stride width")?;
        let stride_h = stream.read_count("pooling stride height")?;
        let pad_w = stream.read_count("pooling padding width")?;
        let pad_h = stream.read_count("pooling padding height")?;
        Ok(Self::new_with(kernel_w, kernel_h, stride_w, stride_h, pad_w, pad_h))
    }
}

impl Stage for SpatialMaxPooling {
    fn stage_type(&self) -> StageType {
        StageType::SpatialMaxPooling
    }

    fn name(&self) -> String {
        "SpatialMaxPooling".to_string()
    }

    fn config_string(&self) -> Option<String> {
        Some(format!("kernel={}x{}", self.kernel_w, self.kernel_h))
    }

    fn forward_prop(&self, input: &StageData) -> Result<StageData, EngineError> {
        let input = input.as_tensor("SpatialMaxPooling")?;
        let shape = input.shape();

        if shape.len() != 2 && shape.len() != 3 {
            return Err(EngineError::ShapeMismatch(
                format!("SpatialMaxPooling expects a rank 2 or 3 input, got rank {}", shape.len())
            ));
        }
        if self.kernel_w == 0 || self.kernel_h == 0 {
            return Err(EngineError::ShapeMismatch(
                format!("SpatialMaxPooling kernel {}x{} is empty", self.kernel_w, self.kernel_h)
            ));
        }

        let (in_w, in_h) = (shape[0], shape[1]);
        let feats = shape.get(2).copied().unwrap_or(1);

        if in_w % self.kernel_w != 0 || in_h % self.kernel_h != 0 {
            return Err(EngineError::ShapeMismatch(
                format!("SpatialMaxPooling input {}x{} is not a multiple of kernel {}x{}",
                        in_w, in_h, self.kernel_w, self.kernel_h)
            ));
        }

        let out_w = in_w / self.kernel_w;
        let out_h = in_h / self.kernel_h;
        let out_shape: Vec<usize> = if shape.len() == 2 {
            vec![out_w, out_h]
        } else {
            vec![out_w, out_h, feats]
        };

        let src = input.data();
        let mut data = Vec::with_capacity(out_w * out_h * feats);

        for f in 0..feats {
            let plane = &src[f * in_w * in_h..(f + 1) * in_w * in_h];
            for y_out in 0..out_h {
                for x_out in 0..out_w {
                    let mut max = f32::NEG_INFINITY;
                    for v in y_out * self.kernel_h..(y_out + 1) * self.kernel_h {
                        let row = &plane[v * in_w..(v + 1) * in_w];
                        for &value in &row[x_out * self.kernel_w..(x_out + 1) * self.kernel_w] {
                            if value > max {
                                max = value;
                            }
                        }
                    }
                    data.push(max);
                }
            }
        }

        Ok(Tensor::from_vec(&out_shape, data)?.into())
    }

    fn save_to_stream(&self, stream: &mut OutputStream) {
        stream.write_i32(self.kernel_w as i32);
        stream.write_i32(self.kernel_h as i32);
        stream.write_i32(self.stride_w as i32);
        stream.write_i32(self.stride_h as i32);
        stream.write_i32(self.pad_w as i32);
        stream.write_i32(self.pad_h as i32);
    }
}
