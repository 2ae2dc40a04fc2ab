pub mod reader;
pub mod writer;
mod data;

// Re-exports
pub use data::{Face, Material, Psk, Wedge, Weight};
