//! Core building blocks: scene graph, timers and origin management

pub mod coordinates;
pub mod entity;
pub mod scheduler;
