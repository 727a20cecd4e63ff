/// Vision-language infrastructure
mod dashscope;

pub use dashscope::{DashScopeVision, VisionClientConfig};
