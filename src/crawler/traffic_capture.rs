// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::traffic::TrafficEvent;
use crate::domain::repositories::listing_repository::StorageError;
use crate::domain::repositories::traffic_sink::TrafficSink;
use crate::engines::traits::{BrowserError, BrowserSession};
use metrics::counter;
use std::collections::HashSet;
use thiserror::Error;

/// 流量捕获错误
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),
    #[error("Sink error: {0}")]
    Sink(#[from] StorageError),
}

/// 增量流量捕获
///
/// 持有本次运行已见过的时间戳集合，每次调用只把未见过的事件追加到接收端。
/// 写入失败的批次留在待写队列中，排在下一批事件之前重新写入。
/// 一次运行一个实例，不跨运行共享。
pub struct TrafficCapture<S> {
    sink: S,
    seen: HashSet<i64>,
    pending: Vec<TrafficEvent>,
    written: u64,
}

impl<S: TrafficSink> TrafficCapture<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            seen: HashSet::new(),
            pending: Vec::new(),
            written: 0,
        }
    }

    /// 拉取浏览器缓冲的事件并追加新事件，返回本次写入的行数
    pub async fn capture(&mut self, session: &dyn BrowserSession) -> Result<usize, CaptureError> {
        let events = session.read_performance_log().await?;
        self.record(events).await
    }

    /// 对一批事件去重后写入接收端
    ///
    /// 同一批内重复的时间戳也只保留第一条；写入成功后才合并到已见集合
    pub async fn record(&mut self, events: Vec<TrafficEvent>) -> Result<usize, CaptureError> {
        let mut batch = std::mem::take(&mut self.pending);
        batch.extend(events);

        let mut batch_keys = HashSet::new();
        let fresh: Vec<TrafficEvent> = batch
            .into_iter()
            .filter(|event| {
                let key = event.dedup_key();
                !self.seen.contains(&key) && batch_keys.insert(key)
            })
            .collect();

        if fresh.is_empty() {
            return Ok(0);
        }

        if let Err(e) = self.sink.append(&fresh).await {
            tracing::debug!("Keeping {} traffic events for the next capture", fresh.len());
            self.pending = fresh;
            return Err(e.into());
        }
        self.seen.extend(batch_keys);
        self.written += fresh.len() as u64;
        counter!("staycrawl_traffic_events_written_total").increment(fresh.len() as u64);
        tracing::debug!(
            "Captured {} new traffic events ({} total)",
            fresh.len(),
            self.written
        );

        Ok(fresh.len())
    }

    /// 已写入的事件总数
    pub fn written(&self) -> u64 {
        self.written
    }

    /// 等待重新写入的事件数
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
