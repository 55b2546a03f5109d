pub mod config;
pub mod controller;
pub mod error;
pub mod llm;
pub mod model;
pub mod parse;
pub mod prompt;
pub mod storage;
