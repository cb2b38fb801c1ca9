pub mod dataset;
pub mod elements;
pub mod graph;
pub mod loader;
pub mod neighbors;
pub mod statistics;
pub mod structure;
pub mod xyz;

pub use dataset::GraphDataset;
pub use graph::{collate, AtomicGraph, GraphBatch};
pub use loader::DataLoader;
pub use statistics::{graph_statistics, GraphStats, Statistics};
pub use structure::{read_structures, LabelKeys, Structure};
