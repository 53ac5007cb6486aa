//! Collaborators the relay core depends on

pub mod catalog;

pub use catalog::{CatalogError, TrackCatalog, TRACK_EXTENSION};
