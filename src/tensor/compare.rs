use super::tensor::Tensor;

// Floor for the relative error denominator
pub const LOOSE_EPSILON: f32 = 0.000001;
pub const DEFAULT_PRECISION: f32 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub enum Mismatch {
    Size { actual: Vec<usize>, expected: Vec<usize> },
    Value { index: usize, actual: f32, expected: f32 },
}

// An element only fails when both its absolute and its relative error exceed precision
pub fn first_mismatch(actual: &Tensor, expected: &Tensor, precision: f32) -> Option<Mismatch> {
    if !actual.is_same_size_as(expected) {
        return Some(Mismatch::Size {
            actual: actual.shape().to_vec(),
            expected: expected.shape().to_vec(),
        });
    }

    actual.data().iter()
        .zip(expected.data())
        .enumerate()
        .find(|(_, (&a, &e))| {
            let delta = (a - e).abs();
            delta > precision && delta / e.abs().max(LOOSE_EPSILON) > precision
        })
        .map(|(index, (&a, &e))| Mismatch::Value { index, actual: a, expected: e })
}
