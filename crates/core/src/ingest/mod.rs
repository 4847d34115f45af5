pub mod cache;
pub mod provider;
