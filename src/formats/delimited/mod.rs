mod decoder;

pub use decoder::{DelimitedConfig, DelimitedDecoder};
