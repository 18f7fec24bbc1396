//! Core buildboard library (protocol, execution model, connection control).

pub mod config;
pub mod controller;
pub mod logging;
pub mod model;
pub mod protocol;
pub mod registry;
pub mod render;
pub mod richtext;
pub mod text;
pub mod transport;
pub mod visibility;
