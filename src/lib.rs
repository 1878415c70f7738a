pub mod config;
pub mod cors;
pub mod error;
pub mod fanout;
pub mod models;
pub mod openai;
pub mod prompts;
pub mod routes;
pub mod storage;
