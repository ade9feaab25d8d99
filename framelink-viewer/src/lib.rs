//! # framelink-viewer: live camera feed viewer
//!
//! Connects to a paired CV200 camera, feeds its frames to a decoder sink,
//! and lays out the video surface behind the static overlay image.

pub mod config;
pub mod display;
pub mod sink;
