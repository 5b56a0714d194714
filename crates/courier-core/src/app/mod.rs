//! App - アプリケーション層
//!
//! ports とパイプラインのハンドラを組み合わせて動かします。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: アプリケーションの構築とワイヤリング
//! - **Runtime**: task_type から Handler への振り分け
//! - **WorkerGroup**: タスク実行ループ（lease → execute → ack / fail）
//! - **ScheduleSweeper**: 定期スケジュール表から poll タスクを投入
//! - **PipelineStatus**: 運用者向けの状況まとめ

pub mod builder;
pub mod runtime;
pub mod status;
pub mod sweeper;
pub mod worker_loop;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::runtime::Runtime;
pub use self::status::{LifecycleView, PipelineStatus};
pub use self::sweeper::{ScheduleSweeper, SweeperHandle};
pub use self::worker_loop::WorkerGroup;
