use std::sync::Arc;

use covermatch_core::{
    CatalogSnapshot, EngineSettings, JsonFileCatalog, KeywordEncoder, MatchSource, Product,
    ProductId, RecommendationEngine, SelectionOptions, TravelFrequency, UserProfile,
};

fn engineer() -> UserProfile {
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

fn product(
    id: &str,
    name: &str,
    category: &str,
    description: &str,
    features: &[&str],
    floor: f64,
    ceiling: f64,
) -> Product {
    Product {
        id: ProductId::from(id),
        name: name.to_string(),
        provider: "Northwind Mutual".to_string(),
        category: category.to_string(),
        description: description.to_string(),
        features: features.iter().map(|feature| feature.to_string()).collect(),
        suitable_for: vec!["Individuals".to_string()],
        risks_covered: vec![],
        price_floor: floor,
        price_ceiling: ceiling,
    }
}

fn catalog_products() -> Vec<Product> {
    vec![
        product(
            "auto-drivesafe",
            "DriveSafe Auto",
            "Auto",
            "Comprehensive car insurance for vehicle owners",
            &["Collision", "Accident towing"],
            500.0,
            1_500.0,
        ),
        product(
            "health-vitalplus",
            "VitalPlus Health",
            "Health",
            "Medical plan with hospital stays and doctor visits",
            &["Medicine", "Illness and disease"],
            800.0,
            2_400.0,
        ),
        product(
            "life-shield",
            "Shield Life",
            "Life",
            "Term life protection for your family",
            &["Fixed premiums"],
            300.0,
            900.0,
        ),
        product(
            "travel-globetrotter",
            "Globetrotter Travel",
            "Travel",
            "Trip cover abroad including flight delays",
            &["Baggage"],
            50.0,
            150.0,
        ),
    ]
}

fn keyword_engine(settings: EngineSettings) -> RecommendationEngine {
    RecommendationEngine::new(Arc::new(KeywordEncoder::new()), settings)
}

fn ids(recommendations: &[covermatch_core::Recommendation]) -> Vec<&str> {
    recommendations.iter().map(|rec| rec.product_id.0.as_str()).collect()
}

#[tokio::test]
async fn engineer_with_vehicle_gets_auto_cover_first() {
    let engine = keyword_engine(EngineSettings::default());
    let catalog = CatalogSnapshot::new(catalog_products()).expect("snapshot");

    let recommendations = engine.recommend(&engineer(), &catalog, &SelectionOptions::new()).await;
    assert!(!recommendations.is_empty());
    assert!(recommendations.len() <= 5);

    let top = &recommendations[0];
    assert_eq!(top.product_id, ProductId::from("auto-drivesafe"));
    assert_eq!(top.source, MatchSource::Similarity);
    assert!(top.recommendation_reason.contains("vehicle owner"));
    assert!((500.0..=1_500.0).contains(&top.estimated_price));
    assert!((top.estimated_price - 950.0).abs() < 1e-9, "midpoint 1000 with a 0.95 income factor");

    let order = ids(&recommendations);
    let auto = order.iter().position(|id| *id == "auto-drivesafe");
    let health = order.iter().position(|id| *id == "health-vitalplus");
    assert!(auto < health);
}

#[tokio::test]
async fn output_is_sorted_bounded_and_stable_on_ties() {
    let engine = keyword_engine(EngineSettings::default());
    let catalog = CatalogSnapshot::new(catalog_products()).expect("snapshot");

    let recommendations = engine.recommend(&engineer(), &catalog, &SelectionOptions::new()).await;
    for pair in recommendations.windows(2) {
        assert!(pair[0].match_score >= pair[1].match_score);
    }
    for rec in &recommendations {
        assert!((0.0..=1.0).contains(&rec.match_score));
    }

    // health and travel each hit a single profile keyword, so they tie and
    // keep catalog order
    let order = ids(&recommendations);
    let health = order.iter().position(|id| *id == "health-vitalplus");
    let travel = order.iter().position(|id| *id == "travel-globetrotter");
    assert!(health.is_some() && travel.is_some());
    assert!(health < travel);
}

#[tokio::test]
async fn repeated_requests_are_deterministic() {
    let engine = keyword_engine(EngineSettings::default());
    let catalog = CatalogSnapshot::new(catalog_products()).expect("snapshot");

    let first = engine.recommend(&engineer(), &catalog, &SelectionOptions::new()).await;
    let second = engine.recommend(&engineer(), &catalog, &SelectionOptions::new()).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn empty_catalog_yields_nothing() {
    let engine = keyword_engine(EngineSettings::default());
    let recommendations =
        engine.recommend(&engineer(), &CatalogSnapshot::empty(), &SelectionOptions::new()).await;
    assert!(recommendations.is_empty());
}

#[tokio::test]
async fn strict_threshold_falls_back_to_vehicle_cover() {
    let engine = keyword_engine(EngineSettings { min_score: 0.99, ..EngineSettings::default() });
    let catalog = CatalogSnapshot::new(catalog_products()).expect("snapshot");

    let report =
        engine.recommend_detailed(&engineer(), &catalog, &SelectionOptions::new()).await;
    assert!(report.fallback_used);
    assert_eq!(
        ids(&report.recommendations),
        vec!["auto-drivesafe", "health-vitalplus", "life-shield"]
    );
    assert!((report.recommendations[0].match_score - 0.8).abs() < 1e-9);
    assert!(report.recommendations.iter().all(|rec| rec.source == MatchSource::Fallback));
}

#[tokio::test]
async fn top_n_and_diversity_limit_the_result() {
    let engine = keyword_engine(EngineSettings::default());
    let mut products = catalog_products();
    products.push(product(
        "auto-roadstar",
        "Roadstar Auto",
        "auto",
        "Third-party vehicle liability",
        &[],
        400.0,
        900.0,
    ));
    let catalog = CatalogSnapshot::new(products).expect("snapshot");

    let two = engine.recommend(&engineer(), &catalog, &SelectionOptions::new().with_top_n(2)).await;
    assert_eq!(two.len(), 2);
    assert!(two.iter().all(|rec| rec.category.eq_ignore_ascii_case("auto")));

    let diverse = engine
        .recommend(&engineer(), &catalog, &SelectionOptions::new().with_top_n(2).with_diversity(true))
        .await;
    assert_eq!(diverse.len(), 2);
    assert!(diverse[0].category.eq_ignore_ascii_case("auto"));
    assert!(!diverse[1].category.eq_ignore_ascii_case("auto"));
}

#[tokio::test]
async fn json_catalog_round_trips_through_the_engine() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("products_data.json");
    std::fs::write(&path, serde_json::to_vec(&catalog_products()).expect("json")).expect("write");

    let engine = keyword_engine(EngineSettings::default());
    let recommendations = engine
        .recommend_from_catalog(&engineer(), &JsonFileCatalog::new(&path), &SelectionOptions::new())
        .await;
    assert_eq!(recommendations.first().map(|rec| rec.product_id.0.as_str()), Some("auto-drivesafe"));
}
