pub mod factory;
pub mod pipelines;
