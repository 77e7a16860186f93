pub mod actors;
pub mod alerts;
pub mod config;
pub mod discord;
pub mod monitors;
pub mod pipeline;
pub mod service;
pub mod storage;
pub mod store;
pub mod util;

pub use pipeline::{Dependencies, Pipeline};
