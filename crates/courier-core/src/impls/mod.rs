//! Impls - ports の実装
//!
//! - **InMemoryContentStore / InMemoryScheduleStore**: 開発用・テスト用の正本
//! - **TelegramGateway**: Telegram Bot API
//! - **OpenAiResolver**: OpenAI の文章・画像生成
//! - **LocalAssetUploader**: ローカルディレクトリへの Blob 保存

pub mod local_assets;
pub mod memory_schedule;
pub mod memory_store;
pub mod openai;
pub mod telegram;

pub use self::local_assets::LocalAssetUploader;
pub use self::memory_schedule::InMemoryScheduleStore;
pub use self::memory_store::InMemoryContentStore;
pub use self::openai::OpenAiResolver;
pub use self::telegram::TelegramGateway;
