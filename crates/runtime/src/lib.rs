//! # Fusion Runtime
//!
//! Drives the [`recon`] engine from the command line. Without a sensor
//! attached, frames come from an analytic scene rendered along a scripted
//! camera path, so every pipeline stage can be exercised end to end.
//!
//! -   [`app`] parses the command line, builds the engine and runs the
//!     frame loop.
//! -   [`synthetic`] renders depth and colour frames of a sphere in front
//!     of a wall and a floor, and replays the camera path as a tracker.
//! -   [`export`] writes rendered images to timestamped PNG files.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod export;
pub mod synthetic;
