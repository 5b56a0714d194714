//! courier-core
//!
//! Core building blocks for the Courier publish pipeline.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, content, channel, lifecycle, outcome, decision, errors）
//! - **ports**: 抽象化レイヤー（ContentStore, ScheduleStore, ContentResolver, ChannelGateway, Clock など）
//! - **queue**: 遅延実行キュー（Queue trait, InMemoryQueue, RetryPolicy）
//! - **typed**: 型付き Task API（Task trait, Handler trait, TypedRegistry）
//! - **pipeline**: dispatch → publish → metrics の各ハンドラ
//! - **app**: アプリケーション層（builder, runtime, worker_loop, sweeper, status）
//! - **impls**: 実装（in-memory ストア, Telegram, OpenAI, ローカル asset）
//! - **config**: figment による設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod pipeline;
pub mod ports;
pub mod queue;
pub mod typed;
