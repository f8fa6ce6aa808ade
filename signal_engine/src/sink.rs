use async_trait::async_trait;
use snafu::{Backtrace, Snafu};

use crate::{models::NewAnalysisRecord, store::StoreError};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// The backing store failed.
    #[snafu(display("Storage error: {source}"))]
    Store {
        source: StoreError,
        backtrace: Backtrace,
    },
}

#[async_trait]
pub trait AnalysisSink: Send + Sync {
    /// The type returned after a successful write.
    ///
    /// The SQLite store returns the stored [`AnalysisRecord`](crate::models::AnalysisRecord)
    /// with its id; an in-memory sink may return just an index.
    type Output: Send;

    async fn write(&self, record: &NewAnalysisRecord) -> Result<Self::Output, SinkError>;
}
