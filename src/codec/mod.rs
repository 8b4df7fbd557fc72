//! Profile-picture transport: the backend stores pictures in a text field, so
//! images travel as hex-encoded RGB buffers and are rebuilt for display.

pub mod hex;
pub mod picture;
pub mod raster;
