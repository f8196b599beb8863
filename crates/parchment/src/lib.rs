pub mod cfi;
pub mod range;
pub mod tree;

pub use cfi::Cfi;
pub use cfi::CfiError;
pub use range::Boundary;
pub use range::Range;
pub use tree::Document;
pub use tree::NodeId;
