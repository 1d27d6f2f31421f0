use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

use super::tensor::Tensor;

// Ways to fill a freshly constructed parameter tensor when no model file is involved.
// Shapes follow the stage layouts: Linear is [n_outputs, n_inputs],
// SpatialConvolution is [filt_w, filt_h, feats_in, feats_out].
#[derive(Clone, Debug)]
pub enum TensorInit {
    Xavier,             // Good for tanh activation
    He,                 // Good for threshold (ReLU like) activation
    LeCun,
    UniformRandom {     // Simple uniform random in range
        min: f32,
        max: f32,
    },
    Constant(f32),
    // Same as UniformRandom but reproducible, used for fixtures
    Seeded {
        seed: u64,
        min: f32,
        max: f32,
    },
}

impl TensorInit {
    // Box-Muller transform to generate normal distribution
    fn normal_sample<R: Rng>(rng: &mut R, mean: f32, std_dev: f32) -> f32 {
        let uniform = Uniform::new(f32::EPSILON, 1.0);

        let u1 = uniform.sample(rng);
        let u2 = uniform.sample(rng);

        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        mean + std_dev * z
    }

    fn fans(shape: &[usize]) -> (usize, usize) {
        match shape.len() {
            // Linear: [n_outputs, n_inputs]
            2 => (shape[1], shape[0]),
            // SpatialConvolution: [filt_w, filt_h, feats_in, feats_out]
            4 => {
                let kernel_size = shape[0] * shape[1];
                (shape[2] * kernel_size, shape[3] * kernel_size)
            },
            // Biases and anything else
            _ => (1, shape.first().copied().unwrap_or(1)),
        }
    }

    pub fn init(&self, shape: &[usize]) -> Tensor {
        let total_elements: usize = shape.iter().product();
        let (fan_in, fan_out) = Self::fans(shape);

        let data = match self {
            TensorInit::Xavier => {
                let limit = (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
                let dist = Uniform::new_inclusive(-limit, limit);
                let mut rng = rand::thread_rng();
                (0..total_elements)
                    .map(|_| dist.sample(&mut rng))
                    .collect()
            },

            TensorInit::He => {
                let std_dev = (2.0 / fan_in.max(1) as f32).sqrt();
                let mut rng = rand::thread_rng();
                (0..total_elements)
                    .map(|_| Self::normal_sample(&mut rng, 0.0, std_dev))
                    .collect()
            },

            TensorInit::LeCun => {
                let std_dev = (1.0 / fan_in.max(1) as f32).sqrt();
                let mut rng = rand::thread_rng();
                (0..total_elements)
                    .map(|_| Self::normal_sample(&mut rng, 0.0, std_dev))
                    .collect()
            },

            TensorInit::UniformRandom { min, max } => {
                let dist = Uniform::new_inclusive(*min, *max);
                let mut rng = rand::thread_rng();
                (0..total_elements)
                    .map(|_| dist.sample(&mut rng))
                    .collect()
            },

            TensorInit::Constant(value) => {
                vec![*value; total_elements]
            },

            TensorInit::Seeded { seed, min, max } => {
                let dist = Uniform::new_inclusive(*min, *max);
                let mut rng = StdRng::seed_from_u64(*seed);
                (0..total_elements)
                    .map(|_| dist.sample(&mut rng))
                    .collect()
            },
        };

        // Length always matches the shape product
        Tensor::from_vec(shape, data).unwrap_or_else(|_| Tensor::new(shape))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_fills_every_element() {
        let t = TensorInit::Constant(0.25).init(&[3, 4]);
        assert_eq!(t.shape(), &[3, 4]);
        assert!(t.data().iter().all(|&v| v == 0.25));
    }

    #[test]
    fn seeded_is_reproducible_and_in_range() {
        let init = TensorInit::Seeded { seed: 727, min: -0.5, max: 0.5 };
        let a = init.init(&[5, 5, 2, 3]);
        let b = init.init(&[5, 5, 2, 3]);
        assert_eq!(a, b);
        assert!(a.data().iter().all(|&v| (-0.5..=0.5).contains(&v)));
    }

    #[test]
    fn xavier_stays_within_limit() {
        let t = TensorInit::Xavier.init(&[10, 20]);
        let limit = (6.0f32 / 30.0).sqrt();
        assert!(t.data().iter().all(|v| v.abs() <= limit));
    }

    #[test]
    fn normal_schemes_produce_finite_values() {
        for init in [TensorInit::He, TensorInit::LeCun] {
            let t = init.init(&[3, 3, 4, 8]);
            assert_eq!(t.nelems(), 288);
            assert!(t.data().iter().all(|v| v.is_finite()));
        }
    }
}
