pub mod communication_gate;
pub mod messaging;
pub mod retention;
pub mod retention_config;

pub use communication_gate::{CommunicationGate, GateDecision};
pub use messaging::MessagingFacade;
pub use retention::{EnforcementResult, RetentionPolicyEngine, RetentionStats, SweepFailure, SweepReport};
pub use retention_config::{RetentionConfig, RetentionSettings};
