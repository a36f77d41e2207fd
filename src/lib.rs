pub mod app;
pub mod band;
pub mod domain;
pub mod error;
pub mod geometry;
pub mod io;
pub mod mesh;
pub mod packing;
pub mod periodic;
pub mod reconcile;
pub mod report;
pub mod stats;
pub mod tessellation;
