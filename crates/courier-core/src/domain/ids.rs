//! Domain identifiers (strongly-typed IDs).
//!
//! ULID ベースの ID を Phantom type で型付けしています。
//! `ContentId` と `ChannelId` は同じ 128-bit 表現ですが、コンパイル時に混同できません。
//!
//! Display は `content-01J...` のようにプレフィックス付き、
//! serde はプレフィックスなしの ULID 文字列そのものです。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// Marker trait for each ID kind.
pub trait IdMarker: Send + Sync + 'static {
    /// Display prefix, e.g. `"content-"`.
    fn prefix() -> &'static str;
}

/// Generic ULID identifier.
///
/// `T` is never instantiated; it only keeps `ContentId` and `ChannelId` apart.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Error returned when an id string is neither `<prefix><ulid>` nor a bare ULID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid id: {0}")]
pub struct ParseIdError(String);

impl<T: IdMarker> FromStr for Id<T> {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ulid::from_string(raw)
            .map(Self::from_ulid)
            .map_err(|_| ParseIdError(s.to_string()))
    }
}

// ========================================
// マーカー型の定義
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Content {}

impl IdMarker for Content {
    fn prefix() -> &'static str {
        "content-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {}

impl IdMarker for Channel {
    fn prefix() -> &'static str {
        "channel-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn prefix() -> &'static str {
        "task-"
    }
}

/// Identifier of a content item.
pub type ContentId = Id<Content>;

/// Identifier of a channel (ours, not the external channel id).
pub type ChannelId = Id<Channel>;

/// Identifier of one enqueued unit of work. Retries keep the same id.
pub type TaskId = Id<Task>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_kind_prefix() {
        let ulid = Ulid::new();
        assert!(ContentId::from_ulid(ulid).to_string().starts_with("content-"));
        assert!(ChannelId::from_ulid(ulid).to_string().starts_with("channel-"));
        assert!(TaskId::from_ulid(ulid).to_string().starts_with("task-"));
    }

    #[test]
    fn parses_with_or_without_prefix() {
        let id = ContentId::from_ulid(Ulid::new());
        let prefixed: ContentId = id.to_string().parse().unwrap();
        let bare: ContentId = id.as_ulid().to_string().parse().unwrap();
        assert_eq!(prefixed, id);
        assert_eq!(bare, id);

        assert!("channel-nope".parse::<ChannelId>().is_err());
    }

    #[test]
    fn serializes_as_bare_ulid_string() {
        let ulid = Ulid::new();
        let id = ChannelId::from_ulid(ulid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{ulid}\""));

        let back: ChannelId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<ContentId>(), size_of::<Ulid>());
        assert_eq!(size_of::<TaskId>(), 16);
    }
}
