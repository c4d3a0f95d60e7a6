//! Domain core of the sales assistant: slot schema, tool kinds, transcript, the
//! dialogue flow graph, configuration, error taxonomy and audit events.

pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use domain::dialogue::{DialogueState, PendingCall};
pub use domain::session::{Language, LanguageParseError, SessionId};
pub use domain::slots::{GpuNeed, GpuNeedParseError, SlotName, SlotPatch, Slots};
pub use domain::tool::{ToolArgsError, ToolCall, ToolName};
pub use domain::transcript::Message;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{DialogueEvent, DialogueStage, FlowEngine, FlowTransitionError, SlotFillingFlow};
