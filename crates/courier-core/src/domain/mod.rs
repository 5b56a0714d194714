//! Domain model (IDs, content items, channels, lifecycle, outcomes, ...).

pub mod channel;
pub mod content;
pub mod decision;
pub mod engagement;
pub mod errors;
pub mod ids;
pub mod lifecycle;
pub mod outcome;
pub mod task;

pub use channel::{Channel, ChannelInfo};
pub use content::{ContentItem, ContentStatus, DeliveryClaim};
pub use decision::{Decider, Decision, DecisionRecord, DefaultDecider};
pub use engagement::{EngagementSnapshot, MessageStats, Subject};
pub use errors::{ErrorKind, PipelineError};
pub use ids::{ChannelId, ContentId, ParseIdError, TaskId};
pub use lifecycle::{LifecycleEvent, Transition, allowed_events, transition};
pub use outcome::{Artifact, Outcome, OutcomeKind};
pub use task::{TaskEnvelope, TaskType, Trigger};
