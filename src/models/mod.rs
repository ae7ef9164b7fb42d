//! Wire schemas and domain types for the prediction, prescription and voice
//! services. Every response is validated before it reaches session state.

pub mod health;
pub mod prediction;
pub mod wire;

pub use health::*;
pub use prediction::*;
pub use wire::*;
