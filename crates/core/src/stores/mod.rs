pub mod flat;

pub use flat::{l2_normalize, FlatIndex};
