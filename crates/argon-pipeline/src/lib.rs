//! Argon Pipeline
//!
//! The five model lifecycle stages and the plumbing between them:
//! - Per-stage configuration resolved once from an environment snapshot
//! - Training submission with cancellable polling (`run_training`)
//! - The quality gate (`evaluate`)
//! - Registry entry with idempotent group creation (`register_model`)
//! - Endpoint promotion, update-else-create (`promote`)
//! - Error-rate health check (`check_health`)
//!
//! Stages run as separate invocations and pass values forward through the
//! handoff store.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod handoff;
pub mod health;
pub mod naming;
pub mod poll;
pub mod promotion;
pub mod registration;
pub mod training;

pub use artifacts::MetricsArtifact;
pub use config::{
    required_keys, ArgonConfig, ConfigResolver, EnvSnapshot, EvaluationConfig, HealthConfig,
    PlatformConfig, PromotionConfig, RegistrationConfig, TrainingConfig,
};
pub use error::{InvalidKey, PipelineError, PipelineResult, Stage};
pub use evaluation::{evaluate, load_metric, run_evaluation, MetricDirection, MetricSnapshot};
pub use handoff::{load_handoff_dir, FileHandoffStore, HandoffStore, MemoryHandoffStore};
pub use health::{check_health, HealthReport};
pub use naming::ResourceNamer;
pub use poll::PollSchedule;
pub use promotion::{promote, resolve_endpoint, EndpointAction, EndpointState, PromotionOutcome};
pub use registration::{ensure_model_package_group, register_model, GroupOutcome};
pub use training::{run_training, wait_for_training_job, TrainingOutcome};

pub use tokio_util::sync::CancellationToken;
