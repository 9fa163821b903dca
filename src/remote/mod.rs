pub mod client;
pub mod envelope;
pub mod error;
#[cfg(test)]
pub mod fake;
