// Engram Engine: memory coordination and retrieval over pluggable stores.
//
//   engram    routing, dedup, implicit relations, retrieval, effectiveness
//   stores    collaborator traits and the bundled SQLite implementation
//   config    TOML loading and fail-fast validation

pub mod config;
pub mod engram;
pub mod stores;
