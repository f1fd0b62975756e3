// src/services/mod.rs

pub mod chart;
pub mod gaps;
pub mod normalize;
pub mod refresh;
pub mod table;
