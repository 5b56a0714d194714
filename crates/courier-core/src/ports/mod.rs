//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」です。各 trait は外部システム
//! （ストレージ、生成 API、Blob、配信チャネル）へのインターフェースを提供し、
//! 実装の詳細は `impls` に置きます。

pub mod clock;
pub mod collaborators;
pub mod content_store;
pub mod id_generator;
pub mod schedule_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::collaborators::{AssetUploader, ChannelGateway, ContentResolver};
pub use self::content_store::{ContentPatch, ContentStore};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::schedule_store::{ScheduleEntry, ScheduleStore};
