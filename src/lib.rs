pub mod config;
pub mod event;
pub mod grid;
pub mod logging;
pub mod output;
pub mod qualy;
pub mod scoring;
pub mod standings;
pub mod teams;
pub mod timing;
