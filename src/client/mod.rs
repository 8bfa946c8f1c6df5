//! Remote data-access clients
//!
//! The scheduler talks to sources only through the [`DataClient`] trait.
//! [`MdsClient`] is the HTTP implementation used by the CLI; tests drive the
//! scheduler with in-process doubles.

mod auth;
mod mds;

pub use auth::Auth;
pub use mds::MdsClient;

use crate::record::Record;
use chrono::{DateTime, Utc};
use eyre::Result;
use regex::Regex;
use std::future::Future;
use std::pin::Pin;

/// A fetch that has been accepted by the client and is waiting to complete
///
/// The future owns everything it needs, so it can be moved onto another task.
pub type FetchFuture = Pin<Box<dyn Future<Output = Result<Vec<Record>>> + Send + 'static>>;

/// One time-bounded, predicate-filtered read from a single source
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub source: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub query: String,
}

/// Capabilities the extraction core needs from a remote tabular store
pub trait DataClient: Send + Sync + 'static {
    /// List the concrete source names matching `pattern`
    ///
    /// # Errors
    /// Returns an error if the listing could not be retrieved.
    fn list_sources(
        &self,
        pattern: &Regex,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Start a fetch for `request`
    ///
    /// Errors returned here happen before any I/O and mean the fetch never
    /// started. Errors from the returned future are transport or query
    /// failures.
    fn fetch(&self, request: &FetchRequest) -> Result<FetchFuture>;
}
