pub mod batch;
pub mod reconciler;
