pub mod components;
pub mod config;
pub mod error;
pub mod shutdown;
pub mod utils;

#[cfg(feature = "web-interface")]
pub mod startup;
#[cfg(feature = "web-interface")]
pub mod web;
