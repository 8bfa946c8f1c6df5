//! Extractor trait for asynchronous data extraction

use eyre::Result;

/// Extractor trait for extracting items from a remote source
///
/// # Example
/// ```no_run
/// use mds_extract::etl::Extractor;
/// use eyre::Result;
///
/// struct StaticNames(Vec<String>);
///
/// impl Extractor for StaticNames {
///     type Item = String;
///
///     async fn extract(&self) -> Result<Vec<Self::Item>> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
pub trait Extractor: Send + Sync {
    /// The type of items extracted
    type Item: Send;

    /// Extract items from the source
    ///
    /// # Errors
    /// Returns an error if extraction fails (network, I/O, parsing, etc.)
    fn extract(&self) -> impl std::future::Future<Output = Result<Vec<Self::Item>>> + Send;
}
