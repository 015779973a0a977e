// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 网络流量事件
///
/// 来自浏览器插桩的结构化日志条目，`timestamp` 作为去重键
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficEvent {
    /// 事件时间戳（微秒），去重键
    pub timestamp: i64,
    /// 协议方法名，如 `Network.requestWillBeSent`
    pub method: String,
    /// 原始事件参数
    pub params: serde_json::Value,
}

impl TrafficEvent {
    pub fn new(timestamp: i64, method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            timestamp,
            method: method.into(),
            params,
        }
    }

    /// 由CDP单调时钟（秒）构造事件
    pub fn from_monotonic_secs(
        secs: f64,
        method: impl Into<String>,
        params: serde_json::Value,
    ) -> Self {
        Self::new((secs * 1_000_000.0).round() as i64, method, params)
    }

    pub fn dedup_key(&self) -> i64 {
        self.timestamp
    }
}
