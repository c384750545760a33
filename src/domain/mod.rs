// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing a launch:
// which GPUs to use, what command to run, and where its
// output goes.
//
// Rules for this layer:
//   - NO process spawning
//   - NO file I/O
//   - Only values, validation and pure functions
//
// Everything here can be unit tested on a machine without
// a single GPU.

// Per-device memory usage and least-loaded selection
pub mod gpu;

// A fully assembled process invocation
pub mod command;

// The distributed training job and its log layout
pub mod job;

// The interactive container session
pub mod container;

// Seams implemented by the infra layer
pub mod traits;
