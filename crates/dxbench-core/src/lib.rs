pub mod config;
pub mod engine;
pub mod errors;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod prompt;
pub mod providers;
pub mod report;
pub mod similarity;
