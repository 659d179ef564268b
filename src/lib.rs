pub mod app;
pub mod audio;
pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod fetch;
pub mod i18n;
pub mod install;
pub mod likes;
pub mod logging;
pub mod model;
pub mod playlist;
pub mod progress;
pub mod session;
pub mod ui;
pub mod visualizer;
