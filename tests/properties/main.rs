//! Property-based tests for fusion and composite ranking.

mod fusion_properties;
mod ranking_properties;
