pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod parser;
pub mod pool;
pub mod preprocessing;
