pub mod compose;
pub mod context;
pub mod outlet;
pub mod plan;
pub mod research;
pub mod workflow;
