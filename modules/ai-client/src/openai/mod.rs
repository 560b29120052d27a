mod client;
mod types;

pub use client::{OpenAi, DEFAULT_MODEL};
