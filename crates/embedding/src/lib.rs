//! Network-backed text encoders and the startup strategy chain that picks
//! one of them, degrading to the keyword encoder when none can be reached.

mod chain;
mod http;
mod mean_pooling;
mod sentence;

pub use chain::{
    build_encoder, candidate_strategies, EncoderAttempt, EncoderInitError, EncoderSelection,
};
pub use mean_pooling::{mean_pool, MeanPoolingEncoder};
pub use sentence::SentenceEncoder;
