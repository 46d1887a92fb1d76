pub mod aggregate;
pub mod pipeline;
pub mod report;
pub mod score;
