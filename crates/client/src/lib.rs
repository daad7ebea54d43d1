//! Upstream client code for comicvine-proxy.
//!
//! This crate provides the `Upstream` seam the request pipeline fetches
//! through, and its ComicVine implementation over reqwest.

pub mod comicvine;
pub mod upstream;

pub use comicvine::{ComicVineClient, ComicVineConfig};
pub use upstream::{FetchedImage, Upstream};
