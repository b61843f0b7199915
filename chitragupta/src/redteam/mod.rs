//! Red-team stages
//!
//! Concrete implementations of the three stage traits, each talking to an
//! [`LlmBackend`](crate::backend::LlmBackend):
//!
//! - Phase 1: brainstorm adversarial personas for the target
//! - Phase 2: probe the target model as one persona
//! - Phase 3: synthesize all findings into a markdown report

pub mod phase1_personas;
pub mod phase2_probe;
pub mod phase3_report;

pub use phase1_personas::{FallbackPolicy, PersonaGenerator, FALLBACK_PERSONA};
pub use phase2_probe::{RedTeamProber, DEFAULT_ATTEMPTS};
pub use phase3_report::{default_report, findings_digest, ReportSynthesizer};
