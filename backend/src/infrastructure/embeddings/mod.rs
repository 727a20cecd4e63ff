/// Embedding infrastructure
mod fastembed_provider;

pub use fastembed_provider::{FastEmbedProvider, IMAGE_DIMENSION, TEXT_DIMENSION};
