pub mod catalog;
pub mod config;
pub mod domain;
pub mod encoding;
pub mod errors;
pub mod formatting;
pub mod matching;
pub mod pricing;
pub mod reasons;
pub mod similarity;

pub use catalog::{CatalogSnapshot, InMemoryCatalog, JsonFileCatalog, ProductCatalog};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::product::{CoverageLine, Product, ProductId};
pub use domain::profile::{TravelFrequency, UserProfile};
pub use domain::recommendation::{MatchSource, Recommendation};
pub use encoding::{Embedding, EncoderStrategy, KeywordEncoder, TextEncoder};
pub use errors::{CatalogError, DomainError, EncodeError, ProcessingError};
pub use matching::{
    EmbeddingCache, EngineSettings, RecommendationEngine, SelectionOptions, SelectionReport,
    SkippedProduct,
};
pub use pricing::{HeuristicPriceEstimator, PriceBoundPolicy, PriceEstimator, PriceQuote};
pub use reasons::{ReasonGenerator, RuleBasedReasons};
pub use similarity::{SimilarityKind, SimilarityOutcome, SimilarityScorer};
