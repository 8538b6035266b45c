//! Cached, invalidatable data layer for browsing the PokéAPI catalog.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod dex;
pub mod display;
pub mod error;
pub mod event;
pub mod favorites;
pub mod keys;
pub mod pokeapi;
pub mod query;
pub mod resource;

#[cfg(test)]
mod testing;

pub use dex::Dex;
pub use error::FetchError;
