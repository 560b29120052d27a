mod client;
mod types;

pub use client::{Claude, DEFAULT_MODEL};
