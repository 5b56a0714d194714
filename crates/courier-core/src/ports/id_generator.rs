//! IdGenerator port - ID 生成の抽象化
//!
//! Clock を使って現在時刻ベースの ULID を生成します。
//! テスト時に FixedClock を使えば timestamp 部分が決定的になります。

use std::sync::Arc;

use ulid::Ulid;

use crate::domain::ids::{ChannelId, ContentId, TaskId};
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate_content_id(&self) -> ContentId;

    fn generate_channel_id(&self) -> ChannelId;

    fn generate_task_id(&self) -> TaskId;
}

pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl IdGenerator for UlidGenerator {
    fn generate_content_id(&self) -> ContentId {
        ContentId::from(self.next_ulid())
    }

    fn generate_channel_id(&self) -> ChannelId {
        ChannelId::from(self.next_ulid())
    }

    fn generate_task_id(&self) -> TaskId {
        TaskId::from(self.next_ulid())
    }
}
