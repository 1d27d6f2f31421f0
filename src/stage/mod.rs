pub mod activations;
pub mod factory;
pub mod linear;
pub mod reshape;
pub mod sequential;
pub mod spatial_convolution;
pub mod spatial_dropout;
pub mod spatial_max_pooling;
pub mod stage;
