//! Weekly power-rankings ingestion: render each configured publisher page,
//! reduce it to article text, extract `(team, rank)` pairs with a model, and
//! write them to the rank store.

pub mod extractor;
pub mod fetcher;
pub mod normalizer;
pub mod pipeline;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use extractor::{OpenAiInference, RankExtractor, RankingInference};
pub use fetcher::{BrowserlessFetcher, PageFetcher};
pub use pipeline::{BatchSummary, IngestPipeline, IngestReport, JobStatus};
