pub mod fiscal;
pub mod matching;
pub mod models;
