//! Geometry synchronization engine for an interactive WKT sketching map.
//!
//! This crate owns the logic core of the application: the content-addressed
//! geometry store, change detection for interactive edits, multi-select
//! geometry combination, and thumbnail rasterization, driven by a
//! selection/edit controller. The map rendering surface, DOM widgets and
//! clipboard wrappers are external collaborators wired in behind the traits
//! in [`surface`], [`storage`] and [`settings`] — the engine is fully
//! testable without a map.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`controller`] | Selection/edit lifecycle and the testable [`controller::SyncController`] |
//! | [`store`] | Content-addressed geometry store and change detection |
//! | [`wkt`] | WKT parsing, canonical formatting, bounding boxes |
//! | [`checksum`] | Content hashing for deduplication |
//! | [`combine`] | Join/union combination of a polygonal multi-selection |
//! | [`thumbnail`] | Fixed-size raster previews with staleness control |
//! | [`surface`] | Live feature arena and map-surface boundary traits |
//! | [`storage`] | Key-value persistence backends |
//! | [`settings`] | User preference lookups |
//! | [`events`] | Typed domain events and the broadcast bus |
//! | [`consts`] | Shared constants (storage keys, thumbnail geometry) |

pub mod checksum;
pub mod combine;
pub mod consts;
pub mod controller;
pub mod events;
pub mod settings;
pub mod storage;
pub mod store;
pub mod surface;
pub mod thumbnail;
pub mod wkt;
