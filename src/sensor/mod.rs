pub mod classifier;
pub mod decoder;

pub use classifier::classify;
pub use decoder::decode_payload;
