//! Ranking, diversity and fallback selection

use std::collections::HashSet;

use crate::domain::product::{CoverageLine, Product, ProductId};
use crate::domain::profile::UserProfile;
use crate::domain::recommendation::Recommendation;

use super::{
    GENERIC_FALLBACK_START, GENERIC_FALLBACK_STEP, HEALTH_FALLBACK_SCORE, VEHICLE_FALLBACK_SCORE,
};

/// Sort by match score descending. The sort is stable, so equal scores keep
/// their catalog order.
pub fn rank(recommendations: &mut [Recommendation]) {
    recommendations.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
}

/// Pick the best recommendation of each category first, then fill the
/// remaining slots by score. `ranked` must already be sorted by [`rank`]; the
/// output keeps that order.
pub fn diversify(ranked: Vec<Recommendation>, limit: usize) -> Vec<Recommendation> {
    let mut chosen = vec![false; ranked.len()];
    let mut seen_categories = HashSet::new();
    let mut picked = 0;

    for (index, recommendation) in ranked.iter().enumerate() {
        if picked == limit {
            break;
        }
        if seen_categories.insert(normalize_category(&recommendation.category)) {
            chosen[index] = true;
            picked += 1;
        }
    }

    for flag in chosen.iter_mut() {
        if picked == limit {
            break;
        }
        if !*flag {
            *flag = true;
            picked += 1;
        }
    }

    ranked
        .into_iter()
        .zip(chosen)
        .filter_map(|(recommendation, keep)| keep.then_some(recommendation))
        .collect()
}

fn normalize_category(category: &str) -> String {
    category.trim().to_lowercase()
}

/// Products to recommend when too few clear the threshold, with their
/// synthetic scores.
///
/// A vehicle owner gets the first auto product, someone with medical
/// conditions the first health product, and the remaining slots go to the
/// first catalog products in order. Products in `exclude` and products that
/// fail validation are never picked.
pub fn fallback_candidates<'a>(
    profile: &UserProfile,
    products: &'a [Product],
    exclude: &HashSet<ProductId>,
    count: usize,
) -> Vec<(&'a Product, f64)> {
    let mut picks: Vec<(&'a Product, f64)> = Vec::with_capacity(count);
    let eligible = |product: &&'a Product, picks: &[(&'a Product, f64)]| {
        !exclude.contains(&product.id)
            && product.validate().is_ok()
            && !picks.iter().any(|(picked, _)| picked.id == product.id)
    };

    let targeted = [
        (profile.has_vehicle, CoverageLine::Auto, VEHICLE_FALLBACK_SCORE),
        (profile.has_medical_conditions, CoverageLine::Health, HEALTH_FALLBACK_SCORE),
    ];
    for (wanted, line, score) in targeted {
        if !wanted || picks.len() == count {
            continue;
        }
        let found = products
            .iter()
            .find(|product| product.coverage_line() == line && eligible(product, &picks));
        if let Some(product) = found {
            picks.push((product, score));
        }
    }

    let mut generic_index = 0usize;
    for product in products {
        if picks.len() == count {
            break;
        }
        if eligible(&product, &picks) {
            let score = GENERIC_FALLBACK_START - GENERIC_FALLBACK_STEP * generic_index as f64;
            picks.push((product, score.max(0.0)));
            generic_index += 1;
        }
    }

    picks
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{diversify, fallback_candidates, rank};
    use crate::domain::product::{Product, ProductId};
    use crate::domain::profile::{TravelFrequency, UserProfile};
    use crate::domain::recommendation::{MatchSource, Recommendation};

    fn product(id: &str, category: &str) -> Product {
        Product {
            id: ProductId(id.to_string()),
            name: id.to_string(),
            provider: "Northwind Mutual".to_string(),
            category: category.to_string(),
            description: String::new(),
            features: vec![],
            suitable_for: vec![],
            risks_covered: vec![],
            price_floor: 100.0,
            price_ceiling: 200.0,
        }
    }

    fn recommendation(id: &str, category: &str, score: f64) -> Recommendation {
        Recommendation::from_product(
            &product(id, category),
            score,
            150.0,
            String::new(),
            MatchSource::Similarity,
        )
    }

    fn profile(has_vehicle: bool, has_medical_conditions: bool) -> UserProfile {
        UserProfile {
            age: 40,
            gender: "female".to_string(),
            occupation: "Pharmacist".to_string(),
            income: 45_000.0,
            marital_status: "single".to_string(),
            has_children: false,
            has_vehicle,
            has_home: false,
            has_medical_conditions,
            travel_frequency: TravelFrequency::Rarely,
        }
    }

    fn ids(recommendations: &[Recommendation]) -> Vec<&str> {
        recommendations.iter().map(|rec| rec.product_id.0.as_str()).collect()
    }

    #[test]
    fn rank_is_descending_and_stable() {
        let mut recommendations = vec![
            recommendation("a", "Auto", 0.6),
            recommendation("b", "Life", 0.9),
            recommendation("c", "Health", 0.6),
            recommendation("d", "Travel", 0.7),
        ];
        rank(&mut recommendations);
        assert_eq!(ids(&recommendations), vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn diversify_prefers_one_per_category_then_fills_by_score() {
        let ranked = vec![
            recommendation("auto-1", "Auto", 0.95),
            recommendation("auto-2", "Auto", 0.9),
            recommendation("auto-3", "auto ", 0.85),
            recommendation("health-1", "Health", 0.6),
            recommendation("life-1", "Life", 0.5),
        ];

        let diverse = diversify(ranked.clone(), 4);
        assert_eq!(ids(&diverse), vec!["auto-1", "auto-2", "health-1", "life-1"]);

        let tight = diversify(ranked, 2);
        assert_eq!(ids(&tight), vec!["auto-1", "health-1"]);
    }

    #[test]
    fn diversify_keeps_everything_when_limit_allows() {
        let ranked = vec![recommendation("a", "Auto", 0.9), recommendation("b", "Auto", 0.8)];
        assert_eq!(ids(&diversify(ranked, 5)), vec!["a", "b"]);
    }

    #[test]
    fn fallback_favors_vehicle_and_health_lines() {
        let catalog = vec![
            product("life-1", "Life"),
            product("health-1", "Health"),
            product("auto-1", "Auto"),
            product("travel-1", "Travel"),
        ];
        let picks = fallback_candidates(&profile(true, true), &catalog, &HashSet::new(), 3);
        let summary: Vec<(&str, f64)> =
            picks.iter().map(|(product, score)| (product.id.0.as_str(), *score)).collect();
        assert_eq!(summary, vec![("auto-1", 0.8), ("health-1", 0.75), ("life-1", 0.7)]);
    }

    #[test]
    fn fallback_recognizes_russian_catalog_categories() {
        let catalog = vec![
            product("life-ru", "Страхование жизни"),
            product("health-ru", "Медицинское страхование"),
            product("auto-ru", "Автострахование"),
        ];
        let picks = fallback_candidates(&profile(true, true), &catalog, &HashSet::new(), 3);
        let picked: Vec<&str> = picks.iter().map(|(product, _)| product.id.0.as_str()).collect();
        assert_eq!(picked, vec!["auto-ru", "health-ru", "life-ru"]);
    }

    #[test]
    fn generic_fallback_scores_step_down_in_catalog_order() {
        let catalog =
            vec![product("a", "Life"), product("b", "Travel"), product("c", "Property")];
        let picks = fallback_candidates(&profile(false, false), &catalog, &HashSet::new(), 3);
        let scores: Vec<f64> = picks.iter().map(|(_, score)| *score).collect();
        assert_eq!(picks.len(), 3);
        assert!((scores[0] - 0.7).abs() < 1e-9);
        assert!((scores[1] - 0.6).abs() < 1e-9);
        assert!((scores[2] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn fallback_skips_excluded_and_invalid_products() {
        let mut broken = product("broken", "Auto");
        broken.price_floor = 900.0;
        let catalog = vec![broken, product("auto-2", "Auto"), product("life-1", "Life")];
        let exclude: HashSet<ProductId> = [ProductId::from("life-1")].into_iter().collect();

        let picks = fallback_candidates(&profile(true, false), &catalog, &exclude, 3);
        let picked: Vec<&str> = picks.iter().map(|(product, _)| product.id.0.as_str()).collect();
        assert_eq!(picked, vec!["auto-2"]);
    }

    #[test]
    fn fallback_respects_count() {
        let catalog = vec![product("auto-1", "Auto"), product("health-1", "Health")];
        let picks = fallback_candidates(&profile(true, true), &catalog, &HashSet::new(), 1);
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].0.id, ProductId::from("auto-1"));
    }
}
