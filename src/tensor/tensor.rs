use std::fmt;

use crate::error::EngineError;

// Dense f32 tensor. shape[0] is the fastest varying (lowest stride) axis.
// Invariant: data.len() == shape.iter().product()
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    // Zero filled tensor of the given shape
    pub fn new(shape: &[usize]) -> Self {
        let nelems = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            data: vec![0.0; nelems],
        }
    }

    pub fn from_data(shape: &[usize], data: &[f32]) -> Result<Self, EngineError> {
        let mut tensor = Self::new(shape);
        tensor.set_data(data)?;
        Ok(tensor)
    }

    // Takes ownership of an already sized buffer
    pub fn from_vec(shape: &[usize], data: Vec<f32>) -> Result<Self, EngineError> {
        let nelems: usize = shape.iter().product();
        if data.len() != nelems {
            return Err(EngineError::ShapeMismatch(
                format!("Shape {:?} needs {} elements, got {}", shape, nelems, data.len())
            ));
        }
        Ok(Self { shape: shape.to_vec(), data })
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn nelems(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    pub fn set_data(&mut self, data: &[f32]) -> Result<(), EngineError> {
        if data.len() != self.data.len() {
            return Err(EngineError::ShapeMismatch(
                format!("Tensor of shape {:?} holds {} elements, got {}",
                        self.shape, self.data.len(), data.len())
            ));
        }
        self.data.copy_from_slice(data);
        Ok(())
    }

    // Panics if index is out of range, like slice indexing
    pub fn set_data_at(&mut self, index: usize, value: f32) {
        self.data[index] = value;
    }

    pub fn is_same_size_as(&self, other: &Tensor) -> bool {
        self.shape == other.shape
    }

    pub fn calc_stride(&self) -> Vec<usize> {
        let mut stride = Vec::with_capacity(self.shape.len());
        let mut acc = 1;
        for &size in &self.shape {
            stride.push(acc);
            acc *= size;
        }
        stride
    }

    // Product of the dimensions, None when it does not fit in usize
    pub fn checked_nelems(shape: &[usize]) -> Option<usize> {
        shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    // New tensor with the same element sequence under a different shape.
    // Values are copied, the new tensor does not alias this one.
    pub fn view(&self, shape: &[usize]) -> Result<Tensor, EngineError> {
        if shape.is_empty() {
            return Err(EngineError::ShapeMismatch(
                "view() with zero dimensions is not allowed".to_string()
            ));
        }

        let view_nelems = Self::checked_nelems(shape).ok_or_else(|| EngineError::ShapeMismatch(
            format!("Element count of {:?} overflows", shape)
        ))?;
        if view_nelems != self.nelems() {
            return Err(EngineError::ShapeMismatch(
                format!("Cannot view {} elements as {:?} ({} elements)",
                        self.nelems(), shape, view_nelems)
            ));
        }

        Ok(Tensor {
            shape: shape.to_vec(),
            data: self.data.clone(),
        })
    }

    // Elementwise helpers below expect operands of equal length, there is no broadcasting.
    // Mismatched lengths trip a debug assertion, release builds only touch the common prefix.

    pub fn copy(dst: &mut Tensor, src: &Tensor) {
        debug_assert_eq!(dst.nelems(), src.nelems());
        for (d, s) in dst.data.iter_mut().zip(&src.data) {
            *d = *s;
        }
    }

    pub fn add(dst: &mut Tensor, x: &Tensor, y: &Tensor) {
        debug_assert_eq!(dst.nelems(), x.nelems());
        debug_assert_eq!(dst.nelems(), y.nelems());
        for ((d, a), b) in dst.data.iter_mut().zip(&x.data).zip(&y.data) {
            *d = a + b;
        }
    }

    pub fn mul(x: &mut Tensor, value: f32) {
        x.data.iter_mut().for_each(|v| *v *= value);
    }

    pub fn div(x: &mut Tensor, value: f32) {
        x.data.iter_mut().for_each(|v| *v /= value);
    }

    pub fn accumulate(dst: &mut Tensor, src: &Tensor) {
        debug_assert_eq!(dst.nelems(), src.nelems());
        for (d, s) in dst.data.iter_mut().zip(&src.data) {
            *d += s;
        }
    }

    pub fn fill(x: &mut Tensor, value: f32) {
        x.data.fill(value);
    }

    pub fn zero(x: &mut Tensor) {
        Self::fill(x, 0.0);
    }

    pub fn slow_sum(x: &Tensor) -> f32 {
        x.data.iter().sum()
    }

    // 1D gaussian kernel, sigma = 0.25 * kernel_size, sampled at 1 based positions
    pub fn gaussian_1d(kernel_size: usize) -> Tensor {
        let sigma = 0.25f32;
        let amplitude = 1.0f32;
        let center = kernel_size as f32 / 2.0 + 0.5;

        let data = (0..kernel_size)
            .map(|i| {
                let d = ((i + 1) as f32 - center) / (sigma * kernel_size as f32);
                amplitude * (-(d * d) / 2.0).exp()
            })
            .collect();

        Tensor { shape: vec![kernel_size], data }
    }

    // 2D (kernel_size x kernel_size) version of gaussian_1d
    pub fn gaussian(kernel_size: usize) -> Tensor {
        let sigma = 0.25f32;
        let amplitude = 1.0f32;
        let center = kernel_size as f32 / 2.0 + 0.5;
        let scale = sigma * kernel_size as f32;

        let mut data = Vec::with_capacity(kernel_size * kernel_size);
        for v in 0..kernel_size {
            for u in 0..kernel_size {
                let du = ((u + 1) as f32 - center) / scale;
                let dv = ((v + 1) as f32 - center) / scale;
                data.push(amplitude * (-(du * du + dv * dv) / 2.0).exp());
            }
        }

        Tensor { shape: vec![kernel_size, kernel_size], data }
    }
}

impl fmt::Display for Tensor {
    // Highest axis first, matching how the shape reads on disk
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims = self.shape.iter()
            .rev()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("x");
        write!(f, "Tensor[{}]", dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nelems_matches_shape_product() {
        for shape in [vec![1], vec![7], vec![3, 4], vec![2, 3, 5], vec![2, 2, 3, 4]] {
            let t = Tensor::new(&shape);
            assert_eq!(t.nelems(), shape.iter().product::<usize>());
            assert!(t.data().iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn from_data_rejects_wrong_length() {
        assert!(Tensor::from_data(&[2, 2], &[1.0, 2.0, 3.0]).is_err());
        assert!(Tensor::from_vec(&[3], vec![1.0]).is_err());
    }

    #[test]
    fn stride_is_column_major() {
        let t = Tensor::new(&[4, 3, 2]);
        assert_eq!(t.calc_stride(), vec![1, 4, 12]);
    }

    #[test]
    fn view_round_trip_keeps_elements() {
        let data: Vec<f32> = (0..24).map(|v| v as f32).collect();
        let t = Tensor::from_data(&[4, 3, 2], &data).unwrap();

        let flat = t.view(&[24]).unwrap();
        assert_eq!(flat.shape(), &[24]);
        let back = flat.view(&[4, 3, 2]).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn view_size_mismatch_fails() {
        let t = Tensor::new(&[4, 3]);
        assert!(matches!(t.view(&[5, 3]), Err(EngineError::ShapeMismatch(_))));
        assert!(t.view(&[]).is_err());

        // 2^64 wraps to 0 without the overflow check
        let empty = Tensor::new(&[0]);
        assert!(matches!(empty.view(&[65536; 4]), Err(EngineError::ShapeMismatch(_))));
        assert_eq!(Tensor::checked_nelems(&[65536; 4]), None);
        assert_eq!(Tensor::checked_nelems(&[2, 3, 4]), Some(24));
    }

    #[test]
    fn view_does_not_alias() {
        let t = Tensor::from_data(&[2], &[1.0, 2.0]).unwrap();
        let mut v = t.view(&[1, 2]).unwrap();
        v.set_data_at(0, 9.0);
        assert_eq!(t.data()[0], 1.0);
    }

    #[test]
    fn elementwise_helpers() {
        let x = Tensor::from_data(&[3], &[1.0, 2.0, 3.0]).unwrap();
        let y = Tensor::from_data(&[3], &[10.0, 20.0, 30.0]).unwrap();
        let mut dst = Tensor::new(&[3]);

        Tensor::add(&mut dst, &x, &y);
        assert_eq!(dst.data(), &[11.0, 22.0, 33.0]);

        Tensor::mul(&mut dst, 2.0);
        assert_eq!(dst.data(), &[22.0, 44.0, 66.0]);

        Tensor::div(&mut dst, 11.0);
        assert_eq!(dst.data(), &[2.0, 4.0, 6.0]);

        Tensor::accumulate(&mut dst, &x);
        assert_eq!(dst.data(), &[3.0, 6.0, 9.0]);
        assert_eq!(Tensor::slow_sum(&dst), 18.0);

        Tensor::copy(&mut dst, &y);
        assert_eq!(dst.data(), y.data());

        Tensor::fill(&mut dst, 0.5);
        assert_eq!(dst.data(), &[0.5, 0.5, 0.5]);
        Tensor::zero(&mut dst);
        assert_eq!(Tensor::slow_sum(&dst), 0.0);
    }

    #[test]
    fn gaussian_kernels_are_symmetric_and_peak_in_the_middle() {
        let g = Tensor::gaussian_1d(5);
        assert_eq!(g.shape(), &[5]);
        let d = g.data();
        assert!((d[0] - d[4]).abs() < 1e-6);
        assert!((d[1] - d[3]).abs() < 1e-6);
        assert!((d[2] - 1.0).abs() < 1e-6);

        let g2 = Tensor::gaussian(5);
        assert_eq!(g2.shape(), &[5, 5]);
        // Separable: g2(u, v) == g(u) * g(v)
        for v in 0..5 {
            for u in 0..5 {
                let expected = d[u] * d[v];
                assert!((g2.data()[v * 5 + u] - expected).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn display_lists_highest_axis_first() {
        let t = Tensor::new(&[4, 3, 2]);
        assert_eq!(t.to_string(), "Tensor[2x3x4]");
    }
}
