//! User photo gallery client for a climbing-route encyclopedia.
//!
//! - `gallery`: cursor-paginated in-memory store.
//! - `session`: feeds the store page by page for one viewer.
//! - `commands` / `upload`: remote mutations that keep the store and the
//!   site's page cache in step.
//! - `invalidate`: page-cache fan-out after tagging or upload.

pub mod api;
pub mod commands;
pub mod config;
pub mod gallery;
pub mod invalidate;
pub mod model;
pub mod notice;
pub mod session;
pub mod slideshow;
pub mod storage;
pub mod upload;
