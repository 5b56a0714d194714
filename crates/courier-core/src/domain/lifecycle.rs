//! Publish state machine.
//!
//! 純粋関数: `(current, event) -> Transition`。
//! 副作用（ストアへの書き込み）は呼び出し側が compare-and-set で行います。

use serde::{Deserialize, Serialize};

use super::content::ContentStatus;

/// Something that happened to a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Authoring surface approved the draft.
    Approve,
    /// Dispatcher armed delivery.
    Dispatch,
    /// Channel accepted the message.
    Delivered,
    /// Channel rejected the message (or attempts ran out).
    DeliveryFailed,
    /// Owning channel was inactive at fire time.
    ChannelInactive,
    /// External reset of a failed item back to draft.
    Reset,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 6] = [
        LifecycleEvent::Approve,
        LifecycleEvent::Dispatch,
        LifecycleEvent::Delivered,
        LifecycleEvent::DeliveryFailed,
        LifecycleEvent::ChannelInactive,
        LifecycleEvent::Reset,
    ];
}

/// Result of applying an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Next(ContentStatus),
    /// The pair is not allowed. Callers treat this as a silent no-op.
    Rejected {
        from: ContentStatus,
        event: LifecycleEvent,
    },
}

impl Transition {
    pub fn next(self) -> Option<ContentStatus> {
        match self {
            Transition::Next(s) => Some(s),
            Transition::Rejected { .. } => None,
        }
    }

    pub fn is_rejected(self) -> bool {
        matches!(self, Transition::Rejected { .. })
    }
}

/// Apply `event` to `current`.
pub fn transition(current: ContentStatus, event: LifecycleEvent) -> Transition {
    use ContentStatus as S;
    use LifecycleEvent as E;

    let next = match (current, event) {
        (S::Draft, E::Approve) => S::Approved,
        (S::Approved, E::Dispatch) => S::Scheduled,
        (S::Scheduled, E::Delivered) => S::Published,
        (S::Scheduled, E::DeliveryFailed | E::ChannelInactive) => S::Failed,
        (S::Failed, E::Reset) => S::Draft,
        _ => {
            return Transition::Rejected {
                from: current,
                event,
            };
        }
    };
    Transition::Next(next)
}

/// Events `status` accepts.
pub fn allowed_events(status: ContentStatus) -> Vec<LifecycleEvent> {
    LifecycleEvent::ALL
        .into_iter()
        .filter(|e| !transition(status, *e).is_rejected())
        .collect()
}
