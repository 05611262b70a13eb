//! MapLegend: turns hand-drawn climate and landform maps into rasters that
//! contain only legend colours.
//!
//! The flow is load → [`ops::preprocess::normalize_aliases`] → analyze →
//! classify unknown colours → apply → finalize, driven through
//! [`session::ClassificationSession`].

#[macro_use]
pub mod logger;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod config;
pub mod io;
pub mod ops;
pub mod session;
