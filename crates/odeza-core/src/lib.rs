//! # Odeza Core
//!
//! Core math library for the Odeza game engine.
//!
//! This crate provides the foundational types shared by the gameplay crates:
//! - **Math**: glam re-exports, axis conventions, tolerances and easing curves
//! - **Transform**: rigid position + rotation transforms with composition

pub mod math;
pub mod transform;

pub use math::AlphaBlend;
pub use transform::Transform;
