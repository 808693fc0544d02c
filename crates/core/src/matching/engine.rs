//! Recommendation engine: encode, score, filter, fall back, rank

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::cache::EmbeddingCache;
use super::selection::{diversify, fallback_candidates, rank};
use super::types::{EngineSettings, SelectionOptions, SelectionReport, SkippedProduct};
use crate::catalog::{CatalogSnapshot, ProductCatalog};
use crate::domain::product::{Product, ProductId};
use crate::domain::profile::UserProfile;
use crate::domain::recommendation::{MatchSource, Recommendation};
use crate::encoding::{Embedding, TextEncoder};
use crate::errors::ProcessingError;
use crate::formatting::{format_product, format_profile};
use crate::pricing::{HeuristicPriceEstimator, PriceEstimator};
use crate::reasons::{ReasonGenerator, RuleBasedReasons};
use crate::similarity::SimilarityScorer;

/// Matches user profiles against catalog snapshots.
///
/// One engine is built per process around the encoder selected at startup
/// and shared across requests; it holds no per-request state apart from the
/// product embedding cache.
pub struct RecommendationEngine {
    encoder: Arc<dyn TextEncoder>,
    settings: EngineSettings,
    scorer: SimilarityScorer,
    pricer: Arc<dyn PriceEstimator>,
    reasons: Arc<dyn ReasonGenerator>,
    cache: EmbeddingCache,
}

impl RecommendationEngine {
    pub fn new(encoder: Arc<dyn TextEncoder>, settings: EngineSettings) -> Self {
        Self {
            encoder,
            scorer: SimilarityScorer::with_mismatch_band(settings.mismatch_band),
            pricer: Arc::new(HeuristicPriceEstimator::new(settings.price_policy)),
            reasons: Arc::new(RuleBasedReasons::with_affordability_ratio(
                settings.affordability_ratio,
            )),
            cache: EmbeddingCache::new(),
            settings,
        }
    }

    pub fn with_price_estimator(mut self, pricer: Arc<dyn PriceEstimator>) -> Self {
        self.pricer = pricer;
        self
    }

    pub fn with_reason_generator(mut self, reasons: Arc<dyn ReasonGenerator>) -> Self {
        self.reasons = reasons;
        self
    }

    pub fn encoder_name(&self) -> &'static str {
        self.encoder.name()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Ranked recommendations for `profile`. Never fails: every error path
    /// degrades to a shorter or empty list.
    pub async fn recommend(
        &self,
        profile: &UserProfile,
        catalog: &CatalogSnapshot,
        options: &SelectionOptions,
    ) -> Vec<Recommendation> {
        self.recommend_detailed(profile, catalog, options).await.recommendations
    }

    /// Loads a snapshot from `catalog` first; an unavailable catalog yields
    /// an empty list.
    pub async fn recommend_from_catalog(
        &self,
        profile: &UserProfile,
        catalog: &dyn ProductCatalog,
        options: &SelectionOptions,
    ) -> Vec<Recommendation> {
        match catalog.snapshot().await {
            Ok(snapshot) => self.recommend(profile, &snapshot, options).await,
            Err(error) => {
                warn!(
                    event_name = "engine.catalog.unavailable",
                    error = %error,
                    "catalog snapshot failed; returning no recommendations"
                );
                Vec::new()
            }
        }
    }

    pub async fn recommend_detailed(
        &self,
        profile: &UserProfile,
        catalog: &CatalogSnapshot,
        options: &SelectionOptions,
    ) -> SelectionReport {
        let timeout = self.settings.request_timeout;
        match tokio::time::timeout(timeout, self.select(profile, catalog, options)).await {
            Ok(report) => report,
            Err(_) => {
                warn!(
                    event_name = "engine.selection.timed_out",
                    timeout_ms = timeout.as_millis() as u64,
                    catalog_version = catalog.version(),
                    "selection exceeded request timeout; returning no recommendations"
                );
                SelectionReport::empty(self.encoder.name(), Some(catalog.version().to_string()))
            }
        }
    }

    async fn select(
        &self,
        profile: &UserProfile,
        catalog: &CatalogSnapshot,
        options: &SelectionOptions,
    ) -> SelectionReport {
        let mut report =
            SelectionReport::empty(self.encoder.name(), Some(catalog.version().to_string()));

        if catalog.is_empty() {
            info!(
                event_name = "engine.selection.empty_catalog",
                catalog_version = catalog.version(),
                "catalog has no products"
            );
            return report;
        }

        if let Err(error) = profile.validate() {
            warn!(event_name = "engine.profile.invalid", error = %error, "profile rejected");
            return report;
        }

        let user_embedding = match self.encoder.encode(&format_profile(profile)).await {
            Ok(embedding) => embedding,
            Err(error) => {
                warn!(
                    event_name = "engine.profile.encode_failed",
                    encoder = self.encoder.name(),
                    error = %error,
                    "profile could not be encoded; returning no recommendations"
                );
                return report;
            }
        };

        let scored = self.product_embeddings(catalog, &mut report.skipped).await;
        report.candidates_scored = scored.len();

        let mut recommendations = Vec::new();
        for (product, embedding) in scored {
            let outcome = self.scorer.score(&user_embedding, &embedding);
            debug!(
                event_name = "engine.product.scored",
                product_id = %product.id,
                score = outcome.score,
                kind = ?outcome.kind,
                "product scored"
            );
            if outcome.score > self.settings.min_score {
                recommendations.push(self.build(
                    profile,
                    product,
                    outcome.score,
                    MatchSource::Similarity,
                ));
            }
        }

        if recommendations.len() < self.settings.fallback_min_results {
            let passed: HashSet<ProductId> =
                recommendations.iter().map(|rec| rec.product_id.clone()).collect();
            let fallbacks = fallback_candidates(
                profile,
                catalog.products(),
                &passed,
                self.settings.fallback_count,
            );
            if !fallbacks.is_empty() {
                info!(
                    event_name = "engine.selection.fallback",
                    passed = passed.len(),
                    fallbacks = fallbacks.len(),
                    "too few products cleared the threshold; adding fallback recommendations"
                );
                report.fallback_used = true;
            }
            for (product, score) in fallbacks {
                recommendations.push(self.build(profile, product, score, MatchSource::Fallback));
            }
        }

        rank(&mut recommendations);
        let recommendations = if options.diversity {
            diversify(recommendations, options.top_n)
        } else {
            let mut recommendations = recommendations;
            recommendations.truncate(options.top_n);
            recommendations
        };

        info!(
            event_name = "engine.selection.completed",
            encoder = self.encoder.name(),
            catalog_version = catalog.version(),
            catalog_size = catalog.len(),
            scored = report.candidates_scored,
            skipped = report.skipped.len(),
            returned = recommendations.len(),
            fallback_used = report.fallback_used,
            "selection completed"
        );

        report.recommendations = recommendations;
        report
    }

    fn build(
        &self,
        profile: &UserProfile,
        product: &Product,
        score: f64,
        source: MatchSource,
    ) -> Recommendation {
        let quote = self.pricer.estimate(profile, product);
        let reason = self.reasons.generate(profile, product, score);
        Recommendation::from_product(product, score, quote.amount, reason, source)
    }

    /// Embeddings for every valid product, in catalog order. Uncached
    /// products are encoded in one batch; if the batch fails they are retried
    /// one by one so a single bad product cannot sink the rest.
    async fn product_embeddings<'a>(
        &self,
        catalog: &'a CatalogSnapshot,
        skipped: &mut Vec<SkippedProduct>,
    ) -> Vec<(&'a Product, Embedding)> {
        let encoder = self.encoder.name();
        let version = catalog.version();
        let use_cache = self.settings.cache_product_embeddings;

        let mut slots: Vec<(&'a Product, Option<Embedding>)> = Vec::new();
        for product in catalog.products() {
            if let Err(error) = product.validate() {
                record_skip(skipped, product, ProcessingError::from(error));
                continue;
            }
            let cached =
                if use_cache { self.cache.get(encoder, version, &product.id) } else { None };
            slots.push((product, cached));
        }

        let pending: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter_map(|(index, (_, embedding))| embedding.is_none().then_some(index))
            .collect();
        if !pending.is_empty() {
            let texts: Vec<String> =
                pending.iter().map(|&index| format_product(slots[index].0)).collect();

            let batch = match self.encoder.encode_batch(&texts).await {
                Ok(embeddings) if embeddings.len() == texts.len() => Some(embeddings),
                Ok(embeddings) => {
                    debug!(
                        event_name = "engine.batch.size_mismatch",
                        expected = texts.len(),
                        actual = embeddings.len(),
                        "batch encode returned the wrong count; encoding individually"
                    );
                    None
                }
                Err(error) => {
                    debug!(
                        event_name = "engine.batch.failed",
                        error = %error,
                        "batch encode failed; encoding individually"
                    );
                    None
                }
            };

            match batch {
                Some(embeddings) => {
                    for (&index, embedding) in pending.iter().zip(embeddings) {
                        slots[index].1 = Some(embedding);
                    }
                }
                None => {
                    for (&index, text) in pending.iter().zip(&texts) {
                        match self.encoder.encode(text).await {
                            Ok(embedding) => slots[index].1 = Some(embedding),
                            Err(error) => {
                                record_skip(skipped, slots[index].0, ProcessingError::from(error))
                            }
                        }
                    }
                }
            }

            if use_cache {
                for &index in &pending {
                    let (product, embedding) = &slots[index];
                    if let Some(embedding) = embedding {
                        self.cache.insert(encoder, version, product.id.clone(), embedding.clone());
                    }
                }
            }
        }

        slots
            .into_iter()
            .filter_map(|(product, embedding)| embedding.map(|embedding| (product, embedding)))
            .collect()
    }
}

fn record_skip(skipped: &mut Vec<SkippedProduct>, product: &Product, error: ProcessingError) {
    warn!(
        event_name = "engine.product.skipped",
        product_id = %product.id,
        error_class = error.class(),
        error = %error,
        "product skipped"
    );
    skipped.push(SkippedProduct::new(product.id.clone(), &error));
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::RecommendationEngine;
    use crate::catalog::{CatalogSnapshot, InMemoryCatalog, JsonFileCatalog};
    use crate::domain::product::{Product, ProductId};
    use crate::domain::profile::{TravelFrequency, UserProfile};
    use crate::domain::recommendation::MatchSource;
    use crate::encoding::{Embedding, TextEncoder};
    use crate::errors::EncodeError;
    use crate::matching::{EngineSettings, SelectionOptions};

    /// Profile text maps to `user`; product text maps to the vector listed
    /// for the first product name it contains.
    struct ScriptedEncoder {
        user: Vec<f32>,
        products: Vec<(&'static str, Vec<f32>)>,
        fail_on: Option<&'static str>,
        product_encodes: AtomicUsize,
        delay: Option<Duration>,
    }

    impl ScriptedEncoder {
        fn new(user: Vec<f32>, products: Vec<(&'static str, Vec<f32>)>) -> Self {
            Self { user, products, fail_on: None, product_encodes: AtomicUsize::new(0), delay: None }
        }
    }

    #[async_trait]
    impl TextEncoder for ScriptedEncoder {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn dimension(&self) -> Option<usize> {
            Some(self.user.len())
        }

        async fn encode(&self, text: &str) -> Result<Embedding, EncodeError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_on.is_some_and(|marker| text.contains(marker)) {
                return Err(EncodeError::Transport("scripted failure".to_string()));
            }
            if text.starts_with("Age:") {
                return Ok(Embedding::new(self.user.clone()));
            }
            self.product_encodes.fetch_add(1, Ordering::SeqCst);
            self.products
                .iter()
                .find(|(name, _)| text.contains(&format!("Name: {name},")))
                .map(|(_, values)| Embedding::new(values.clone()))
                .ok_or_else(|| EncodeError::InvalidResponse(format!("no script for `{text}`")))
        }
    }

    fn profile() -> UserProfile {
        UserProfile {
            age: 30,
            gender: "male".to_string(),
            occupation: "Engineer".to_string(),
            income: 75_000.0,
            marital_status: "single".to_string(),
            has_children: false,
            has_vehicle: true,
            has_home: false,
            has_medical_conditions: false,
            travel_frequency: TravelFrequency::Occasional,
        }
    }

    fn product(name: &'static str, category: &str) -> Product {
        Product {
            id: ProductId(name.to_lowercase()),
            name: name.to_string(),
            provider: "Northwind Mutual".to_string(),
            category: category.to_string(),
            description: format!("{category} cover"),
            features: vec![],
            suitable_for: vec![],
            risks_covered: vec![],
            price_floor: 400.0,
            price_ceiling: 1_200.0,
        }
    }

    fn snapshot(products: Vec<Product>) -> CatalogSnapshot {
        CatalogSnapshot::new(products).expect("snapshot")
    }

    fn engine(encoder: ScriptedEncoder) -> (Arc<ScriptedEncoder>, RecommendationEngine) {
        let encoder = Arc::new(encoder);
        let engine = RecommendationEngine::new(encoder.clone(), EngineSettings::default());
        (encoder, engine)
    }

    #[tokio::test]
    async fn products_above_threshold_are_ranked_by_similarity() {
        let (_, engine) = engine(ScriptedEncoder::new(
            vec![1.0, 0.0],
            vec![("Alpha", vec![0.6, 0.8]), ("Beta", vec![1.0, 0.1]), ("Gamma", vec![-1.0, 0.0])],
        ));
        let catalog = snapshot(vec![
            product("Alpha", "Life"),
            product("Beta", "Auto"),
            product("Gamma", "Travel"),
        ]);

        let report = engine.recommend_detailed(&profile(), &catalog, &SelectionOptions::new()).await;
        let ids: Vec<&str> =
            report.recommendations.iter().map(|rec| rec.product_id.0.as_str()).collect();
        assert_eq!(ids, vec!["beta", "alpha"], "gamma scores 0.0 and is filtered");
        assert!(!report.fallback_used);
        assert_eq!(report.encoder, "scripted");
        assert_eq!(report.candidates_scored, 3);
        assert!(report.recommendations.iter().all(|rec| rec.source == MatchSource::Similarity));
    }

    #[tokio::test]
    async fn fallback_kicks_in_when_nothing_clears_the_threshold() {
        let (_, engine) = engine(ScriptedEncoder::new(
            vec![1.0, 0.0],
            vec![
                ("Alpha", vec![-1.0, 0.0]),
                ("Beta", vec![-1.0, 0.1]),
                ("Gamma", vec![-1.0, -0.1]),
                ("Delta", vec![-1.0, 0.0]),
            ],
        ));
        let catalog = snapshot(vec![
            product("Alpha", "Life"),
            product("Beta", "Travel"),
            product("Gamma", "Auto"),
            product("Delta", "Health"),
        ]);

        let report = engine.recommend_detailed(&profile(), &catalog, &SelectionOptions::new()).await;
        assert!(report.fallback_used);
        let summary: Vec<(&str, f64)> = report
            .recommendations
            .iter()
            .map(|rec| (rec.product_id.0.as_str(), rec.match_score))
            .collect();
        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0], ("gamma", 0.8));
        assert_eq!(summary[1].0, "alpha");
        assert!((summary[1].1 - 0.7).abs() < 1e-9);
        assert_eq!(summary[2].0, "beta");
        assert!(report.recommendations.iter().all(|rec| rec.source == MatchSource::Fallback));
    }

    #[tokio::test]
    async fn product_with_other_width_gets_a_banded_score() {
        let (_, engine) = engine(ScriptedEncoder::new(
            vec![1.0, 0.0, 0.0],
            vec![("Alpha", vec![1.0, 0.0, 0.0]), ("Bravo", vec![0.2, 0.4, 0.1, 0.3])],
        ));
        let catalog = snapshot(vec![product("Alpha", "Life"), product("Bravo", "Auto")]);

        let report = engine.recommend_detailed(&profile(), &catalog, &SelectionOptions::new()).await;
        assert!(report.skipped.is_empty());
        assert_eq!(report.candidates_scored, 2);

        let bravo = report
            .recommendations
            .iter()
            .find(|rec| rec.product_id == ProductId::from("bravo"))
            .expect("bravo is kept");
        assert!((0.5..=0.8).contains(&bravo.match_score), "score {}", bravo.match_score);
        assert_eq!(bravo.source, MatchSource::Similarity);
        assert_eq!(report.recommendations[0].product_id, ProductId::from("alpha"));
    }

    #[tokio::test]
    async fn failing_products_are_skipped_and_reported() {
        let mut encoder = ScriptedEncoder::new(
            vec![1.0, 0.0],
            vec![("Alpha", vec![1.0, 0.0]), ("Beta", vec![0.9, 0.1])],
        );
        encoder.fail_on = Some("Name: Beta,");
        let (_, engine) = engine(encoder);

        let mut inverted = product("Broken", "Auto");
        inverted.price_floor = 5_000.0;
        let catalog =
            snapshot(vec![product("Alpha", "Life"), product("Beta", "Auto"), inverted]);

        let report = engine.recommend_detailed(&profile(), &catalog, &SelectionOptions::new()).await;
        assert_eq!(report.recommendations.len(), 1);
        assert_eq!(report.recommendations[0].product_id, ProductId::from("alpha"));

        let mut skipped: Vec<(&str, &str)> = report
            .skipped
            .iter()
            .map(|skip| (skip.product_id.0.as_str(), skip.error_class.as_str()))
            .collect();
        skipped.sort();
        assert_eq!(skipped, vec![("beta", "encoding"), ("broken", "invalid_record")]);
    }

    #[tokio::test]
    async fn profile_encode_failure_returns_empty() {
        let mut encoder = ScriptedEncoder::new(vec![1.0], vec![("Alpha", vec![1.0])]);
        encoder.fail_on = Some("Age:");
        let (encoder, engine) = engine(encoder);

        let catalog = snapshot(vec![product("Alpha", "Life")]);
        let report = engine.recommend_detailed(&profile(), &catalog, &SelectionOptions::new()).await;
        assert!(report.recommendations.is_empty());
        assert!(!report.fallback_used);
        assert_eq!(encoder.product_encodes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_profile_returns_empty() {
        let (_, engine) = engine(ScriptedEncoder::new(vec![1.0], vec![("Alpha", vec![1.0])]));

        let mut invalid = profile();
        invalid.income = -1.0;
        let catalog = snapshot(vec![product("Alpha", "Life")]);
        let recommendations = engine.recommend(&invalid, &catalog, &SelectionOptions::new()).await;
        assert!(recommendations.is_empty());
    }

    #[tokio::test]
    async fn empty_catalog_returns_empty_without_encoding() {
        let (encoder, engine) = engine(ScriptedEncoder::new(vec![1.0], vec![]));
        let report = engine
            .recommend_detailed(&profile(), &CatalogSnapshot::empty(), &SelectionOptions::new())
            .await;
        assert!(report.recommendations.is_empty());
        assert!(!report.fallback_used);
        assert_eq!(encoder.product_encodes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn product_embeddings_are_cached_per_catalog_version() {
        let (encoder, engine) = engine(ScriptedEncoder::new(
            vec![1.0, 0.0],
            vec![("Alpha", vec![1.0, 0.0]), ("Beta", vec![0.8, 0.2])],
        ));
        let catalog = snapshot(vec![product("Alpha", "Life"), product("Beta", "Auto")]);

        let first = engine.recommend(&profile(), &catalog, &SelectionOptions::new()).await;
        let second = engine.recommend(&profile(), &catalog, &SelectionOptions::new()).await;
        assert_eq!(first, second);
        assert_eq!(encoder.product_encodes.load(Ordering::SeqCst), 2);
        assert_eq!(engine.cache().len(), 2);

        let grown = snapshot(vec![product("Alpha", "Life"), product("Beta", "Travel")]);
        engine.recommend(&profile(), &grown, &SelectionOptions::new()).await;
        assert_eq!(encoder.product_encodes.load(Ordering::SeqCst), 4);
        assert_eq!(engine.cache().catalog_version().as_deref(), Some(grown.version()));
    }

    #[tokio::test]
    async fn top_n_and_diversity_shape_the_output() {
        let (_, engine) = engine(ScriptedEncoder::new(
            vec![1.0, 0.0],
            vec![
                ("Alpha", vec![1.0, 0.0]),
                ("Beta", vec![1.0, 0.1]),
                ("Gamma", vec![1.0, 0.2]),
                ("Delta", vec![1.0, 0.5]),
            ],
        ));
        let catalog = snapshot(vec![
            product("Alpha", "Auto"),
            product("Beta", "Auto"),
            product("Gamma", "Auto"),
            product("Delta", "Health"),
        ]);

        let plain = engine.recommend(&profile(), &catalog, &SelectionOptions::new().with_top_n(2)).await;
        let plain_ids: Vec<&str> = plain.iter().map(|rec| rec.product_id.0.as_str()).collect();
        assert_eq!(plain_ids, vec!["alpha", "beta"]);

        let diverse = engine
            .recommend(&profile(), &catalog, &SelectionOptions::new().with_top_n(2).with_diversity(true))
            .await;
        let diverse_ids: Vec<&str> = diverse.iter().map(|rec| rec.product_id.0.as_str()).collect();
        assert_eq!(diverse_ids, vec!["alpha", "delta"]);
    }

    #[tokio::test]
    async fn slow_encoder_is_cut_off_by_request_timeout() {
        let mut encoder = ScriptedEncoder::new(vec![1.0], vec![("Alpha", vec![1.0])]);
        encoder.delay = Some(Duration::from_secs(5));
        let settings =
            EngineSettings { request_timeout: Duration::from_millis(50), ..EngineSettings::default() };
        let engine = RecommendationEngine::new(Arc::new(encoder), settings);

        let catalog = snapshot(vec![product("Alpha", "Life")]);
        let report = engine.recommend_detailed(&profile(), &catalog, &SelectionOptions::new()).await;
        assert!(report.recommendations.is_empty());
        assert_eq!(report.catalog_version.as_deref(), Some(catalog.version()));
    }

    #[tokio::test]
    async fn catalog_sources_feed_the_engine() {
        let (_, engine) = engine(ScriptedEncoder::new(vec![1.0], vec![("Alpha", vec![1.0])]));
        let catalog = InMemoryCatalog::new(vec![product("Alpha", "Life")]).expect("catalog");
        let recommendations =
            engine.recommend_from_catalog(&profile(), &catalog, &SelectionOptions::new()).await;
        assert_eq!(recommendations.len(), 1);

        let missing = JsonFileCatalog::new("/nonexistent/covermatch/products.json");
        let recommendations =
            engine.recommend_from_catalog(&profile(), &missing, &SelectionOptions::new()).await;
        assert!(recommendations.is_empty());
    }

    #[tokio::test]
    async fn prices_stay_inside_declared_range() {
        let (_, engine) = engine(ScriptedEncoder::new(
            vec![1.0, 0.0],
            vec![("Alpha", vec![1.0, 0.0]), ("Beta", vec![0.7, 0.3])],
        ));
        let mut senior = profile();
        senior.age = 70;
        senior.has_children = true;
        let catalog = snapshot(vec![product("Alpha", "Life"), product("Beta", "Auto")]);

        for rec in engine.recommend(&senior, &catalog, &SelectionOptions::new()).await {
            assert!((400.0..=1_200.0).contains(&rec.estimated_price));
            assert!((0.0..=1.0).contains(&rec.match_score));
        }
    }
}
