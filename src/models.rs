pub mod field;
pub mod flow;
