pub mod adjacency;
pub mod analyzer;
pub mod arrays;
pub mod intervals;
pub mod matcher;
pub mod metrics;
pub mod types;
pub mod velocity;
