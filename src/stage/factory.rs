use crate::tensor::tensor_init::TensorInit;

use super::{
    activations::{Tanh, Threshold},
    linear::Linear,
    reshape::Reshape,
    sequential::{NetworkKind, Sequential},
    spatial_convolution::SpatialConvolution,
    spatial_dropout::SpatialDropout,
    spatial_max_pooling::SpatialMaxPooling,
    stage::Stage,
};

pub struct Stages;

impl Stages {
    pub fn tanh() -> Box<dyn Stage> {
        Box::new(Tanh::new())
    }

    pub fn threshold() -> Box<dyn Stage> {
        Box::new(Threshold::new())
    }

    pub fn threshold_with(threshold: f32, val: f32) -> Box<dyn Stage> {
        Box::new(Threshold::new_with(threshold, val))
    }

    pub fn reshape(target_shape: &[usize]) -> Box<dyn Stage> {
        Box::new(Reshape::new(target_shape))
    }

    pub fn linear(n_inputs: usize, n_outputs: usize) -> Box<dyn Stage> {
        Box::new(Linear::new(n_inputs, n_outputs))
    }

    pub fn linear_with(n_inputs: usize, n_outputs: usize, init: &TensorInit) -> Box<dyn Stage> {
        Box::new(Linear::new_with_init(n_inputs, n_outputs, init))
    }

    pub fn spatial_convolution(
        feats_in: usize,
        feats_out: usize,
        filt_h: usize,
        filt_w: usize,
    ) -> Box<dyn Stage> {
        Box::new(SpatialConvolution::new(feats_in, feats_out, filt_h, filt_w, 0, 0))
    }

    pub fn spatial_convolution_with(
        feats_in: usize,
        feats_out: usize,
        filt_h: usize,
        filt_w: usize,
        pad_w: usize,
        pad_h: usize,
        init: &TensorInit,
    ) -> Box<dyn Stage> {
        Box::new(SpatialConvolution::new_with_init(
            feats_in,
            feats_out,
            filt_h,
            filt_w,
            pad_w,
            pad_h,
            init,
        ))
    }

    pub fn spatial_max_pooling(kernel_w: usize, kernel_h: usize) -> Box<dyn Stage> {
        Box::new(SpatialMaxPooling::new(kernel_w, kernel_h))
    }

    pub fn spatial_dropout(p: f32) -> Box<dyn Stage> {
        Box::new(SpatialDropout::new(p))
    }

    pub fn sequential(network_kind: NetworkKind, labels: Vec<i32>, stages: Vec<Box<dyn Stage>>) -> Box<dyn Stage> {
        let mut sequential = Sequential::new_with(network_kind, labels);
        for stage in stages {
            sequential.add(stage);
        }
        Box::new(sequential)
    }
}
