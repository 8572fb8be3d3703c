pub mod guide;
pub mod normalize;
pub mod pipeline;
pub mod types;

pub use guide::GuideWindow;
pub use pipeline::{build_guide, fetch_channels};
pub use types::{Channel, Programme};
