use crate::config::Credentials;
use crate::error::{AuthError, FetchError};
use crate::models::ListingRecord;
use crate::scrapers::browser::SessionHandle;
use crate::scrapers::types::QuerySpec;
use async_trait::async_trait;

/// Runs one cell query against the listings backend.
///
/// The production implementation posts to the map service; tests swap in
/// fakes to inject per-cell failures.
#[async_trait]
pub trait CellFetcher: Send + Sync {
    /// Fetch the rows for one signed query. An empty vector is a valid answer.
    async fn fetch(&self, spec: &QuerySpec, token: &str) -> Result<Vec<ListingRecord>, FetchError>;
}

/// Computes the authorization value the backend checks against each query.
pub trait TokenDeriver: Send + Sync {
    fn derive(&self, query_text: &str) -> String;
}

/// Logs in and hands back a handle that can issue authenticated requests.
pub trait SessionProvider {
    fn authenticate(&self, credentials: &Credentials) -> Result<SessionHandle, AuthError>;
}
