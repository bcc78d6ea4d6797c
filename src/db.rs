pub mod flow_repo;
pub mod memory;

pub use flow_repo::{FlowRepository, FlowStore};
