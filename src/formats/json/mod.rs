mod decoder;

pub use decoder::JsonDecoder;
