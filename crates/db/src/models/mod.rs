pub mod edge;
pub mod node;
