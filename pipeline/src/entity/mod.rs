pub mod layer;
pub mod layer_attribute;
