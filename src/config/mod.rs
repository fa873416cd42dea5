// src/config/mod.rs

//! Configuration loading and validation for skillrun.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: reads the file and applies environment overrides.
//! - `validate.rs`: turns a `RawConfigFile` into a checked `Config`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{apply_env_overrides, default_config_path, load_and_validate, load_from_path};
pub use model::{
    BackendConfig, Config, LogConfig, RawConfigFile, SecretsConfig, ServiceConfig,
};
