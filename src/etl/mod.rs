//! Core extract/transform abstractions
//!
//! The scheduler is built from these two seams: an [`Extractor`] produces
//! items asynchronously (source names, records) and a [`Transformer`] turns
//! them into something the sink can write.

mod extract;
mod transform;

pub use extract::Extractor;
pub use transform::Transformer;
