//! Domain Layer
//!
//! Core types and pure logic of the route registry. Nothing in here performs
//! I/O or owns shared state.

pub mod entities;
pub mod ports;
pub mod services;
pub mod value_objects;
