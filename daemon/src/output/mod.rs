mod classifier;
pub mod rules;

pub use classifier::{classify, OutputRules};
