// src/models/mod.rs

pub mod category;
pub mod node;
pub mod path;
pub mod progress;
