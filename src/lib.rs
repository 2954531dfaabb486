// src/lib.rs

//! udpquake: USGS earthquake feed to Meshtastic relay library

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;
