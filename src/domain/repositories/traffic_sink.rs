// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::listing_repository::StorageError;
use crate::domain::models::traffic::TrafficEvent;
use async_trait::async_trait;

/// 流量日志接收端
///
/// 只追加，按发现顺序写入，从不重写或压缩
#[async_trait]
pub trait TrafficSink: Send {
    async fn append(&mut self, events: &[TrafficEvent]) -> Result<(), StorageError>;
}
