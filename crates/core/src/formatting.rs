//! Text rendering of profiles and products for the encoders.
//!
//! Output must be byte-stable: the keyword encoder matches on exact marker
//! phrases (`Owns vehicle: yes`, `Travel frequency: often`, ...), and cached
//! product embeddings assume the same product always renders the same way.

use crate::domain::product::Product;
use crate::domain::profile::UserProfile;

pub fn format_profile(profile: &UserProfile) -> String {
    format!(
        "Age: {}, Gender: {}, Occupation: {}, Income: {}, Marital status: {}, \
         Has children: {}, Owns vehicle: {}, Owns home: {}, Has medical conditions: {}, \
         Travel frequency: {}",
        profile.age,
        profile.gender,
        profile.occupation,
        profile.income,
        profile.marital_status,
        yes_no(profile.has_children),
        yes_no(profile.has_vehicle),
        yes_no(profile.has_home),
        yes_no(profile.has_medical_conditions),
        profile.travel_frequency,
    )
}

pub fn format_product(product: &Product) -> String {
    format!(
        "Name: {}, Provider: {}, Category: {}, Description: {}, Features: {}, \
         Suitable for: {}, Risks covered: {}, Price range: {:.2}-{:.2}",
        product.name,
        product.provider,
        product.category,
        product.description,
        product.features.join(", "),
        product.suitable_for.join(", "),
        product.risks_covered.join(", "),
        product.price_floor,
        product.price_ceiling,
    )
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
