pub mod config;
pub mod error;
pub mod structs;

pub mod codec;
pub mod payload;

pub mod attack;
pub mod buffer;
pub mod stream;
pub mod synth;
