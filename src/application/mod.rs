// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflows that wire the domain values to the infra layer:
//
//   select_use_case    — decide which GPUs a launch gets
//   train_use_case     — the distributed training run
//   container_use_case — the interactive container session
//
// Rules for this layer:
//   - No printing (that's Layer 1)
//   - No direct process spawning; go through CommandRunner
//   - Only workflow coordination and config resolution

// GPU selection workflow
pub mod select_use_case;

// The torchx training launch
pub mod train_use_case;

// The interactive container launch
pub mod container_use_case;
