pub mod app;
pub mod config;
pub mod converter;
pub mod modules;
pub mod style;
