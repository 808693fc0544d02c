pub mod product;
pub mod profile;
pub mod recommendation;
