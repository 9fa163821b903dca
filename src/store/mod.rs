pub mod cache;
pub mod feature_store;
pub mod record;
