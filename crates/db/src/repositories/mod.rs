//! Repository layer: one struct per table, all queries take an open
//! connection so they can run inside a caller's transaction.

pub mod edge_repo;
pub mod node_repo;

pub use edge_repo::EdgeRepo;
pub use node_repo::NodeRepo;
