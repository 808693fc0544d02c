use async_trait::async_trait;

use super::{Embedding, TextEncoder};
use crate::errors::EncodeError;

pub const KEYWORD_DIMENSION: usize = 5;

/// Category keyword lists, in vector component order.
pub const KEYWORD_CATEGORIES: [(&str, &[&str]); KEYWORD_DIMENSION] = [
    ("health", &["health", "medical", "doctor", "hospital", "medicine", "disease", "illness"]),
    ("auto", &["car", "vehicle", "drive", "auto", "transportation", "accident"]),
    ("property", &["home", "house", "apartment", "property", "building", "real estate"]),
    ("life", &["life", "death", "family", "children", "spouse", "protection"]),
    ("travel", &["travel", "trip", "journey", "abroad", "vacation", "tourism", "flight"]),
];

const MARKER_BOOST: f32 = 0.5;

/// Profile markers that add [`MARKER_BOOST`] to a component. Matched against
/// the lower-cased text, so they follow `formatting::format_profile`.
const MARKERS: [(usize, &[&str]); KEYWORD_DIMENSION] = [
    (0, &["has medical conditions: yes"]),
    (1, &["owns vehicle: yes"]),
    (2, &["owns home: yes"]),
    (3, &["has children: yes", "marital status: married"]),
    (4, &["travel frequency: often", "travel frequency: very_often"]),
];

/// Keyword-frequency encoder used when no pretrained model can be loaded.
/// Needs no I/O and always produces [`KEYWORD_DIMENSION`] components.
#[derive(Clone, Debug, Default)]
pub struct KeywordEncoder;

impl KeywordEncoder {
    pub fn new() -> Self {
        Self
    }

    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let mut vector = [0.0f32; KEYWORD_DIMENSION];

        for (index, (_, keywords)) in KEYWORD_CATEGORIES.iter().enumerate() {
            let hits = keywords.iter().filter(|keyword| lowered.contains(*keyword)).count();
            vector[index] = hits as f32 / keywords.len() as f32;
        }

        for (index, markers) in MARKERS {
            if markers.iter().any(|marker| lowered.contains(marker)) {
                vector[index] += MARKER_BOOST;
            }
        }

        let sum: f32 = vector.iter().sum();
        if sum > 0.0 {
            for value in &mut vector {
                *value /= sum;
            }
        }

        vector.to_vec()
    }
}

#[async_trait]
impl TextEncoder for KeywordEncoder {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn dimension(&self) -> Option<usize> {
        Some(KEYWORD_DIMENSION)
    }

    async fn encode(&self, text: &str) -> Result<Embedding, EncodeError> {
        Ok(Embedding::new(self.vectorize(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::{KeywordEncoder, KEYWORD_DIMENSION};
    use crate::encoding::TextEncoder;

    fn approx(left: f32, right: f32) -> bool {
        (left - right).abs() < 1e-5
    }

    #[test]
    fn counts_keyword_fraction_per_category() {
        let encoder = KeywordEncoder::new();
        // health: medical + hospital = 2/7; travel: trip = 1/7
        let vector = encoder.vectorize("Medical HOSPITAL bill after a trip");
        let sum = 3.0 / 7.0;
        assert!(approx(vector[0], (2.0 / 7.0) / sum));
        assert!(approx(vector[1], 0.0));
        assert!(approx(vector[4], (1.0 / 7.0) / sum));
    }

    #[test]
    fn profile_markers_boost_matching_component() {
        let encoder = KeywordEncoder::new();
        let boosted = encoder.vectorize("Owns vehicle: yes, Owns home: no");
        let plain = encoder.vectorize("Owns vehicle: no, Owns home: no");
        // both texts hit one auto keyword and one property keyword; only the
        // first carries the vehicle marker
        assert!(approx(plain[1], plain[2]));
        assert!(approx(boosted[1], (1.0 / 6.0 + 0.5) / (2.0 / 6.0 + 0.5)));
        assert!(boosted[1] > boosted[2]);

        let married = encoder.vectorize("Marital status: married, Has children: no");
        let frequent = encoder.vectorize("Travel frequency: very_often");
        assert!(married[3] > 0.9);
        assert!(frequent[4] > 0.9);
    }

    #[test]
    fn output_is_l1_normalized_when_any_component_is_positive() {
        let encoder = KeywordEncoder::new();
        let vector = encoder.vectorize("family home with a car, frequent flight and doctor visits");
        let sum: f32 = vector.iter().sum();
        assert!(approx(sum, 1.0));
        assert!(vector.iter().all(|value| *value >= 0.0));
    }

    #[test]
    fn text_without_keywords_encodes_to_zero_vector() {
        let encoder = KeywordEncoder::new();
        assert_eq!(encoder.vectorize("plain words only"), vec![0.0; KEYWORD_DIMENSION]);
    }

    #[tokio::test]
    async fn encode_is_deterministic() {
        let encoder = KeywordEncoder::new();
        let first = encoder.encode("Has medical conditions: yes").await.expect("encode");
        let second = encoder.encode("Has medical conditions: yes").await.expect("encode");
        assert_eq!(first, second);
        assert_eq!(first.dimension(), KEYWORD_DIMENSION);
        assert_eq!(encoder.dimension(), Some(KEYWORD_DIMENSION));
    }
}
