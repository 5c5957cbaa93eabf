// src/config/mod.rs
pub mod services;

pub use services::{
    load_config_default, load_config_from, ServiceConfig, WeatherMode, ENV_CONFIG_PATH,
};
