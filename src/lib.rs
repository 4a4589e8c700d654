pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod parser;
pub mod schedule;
pub mod store;
pub mod synth;
pub mod web;
