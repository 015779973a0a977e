// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::domain::models::traffic::TrafficEvent;
use crate::domain::repositories::listing_repository::StorageError;
use crate::domain::repositories::traffic_sink::TrafficSink;

/// JSON Lines 流量日志
///
/// 以追加模式打开，每个事件一行，已有内容从不改写
pub struct JsonlTrafficSink {
    path: PathBuf,
    file: File,
}

impl JsonlTrafficSink {
    /// 打开（必要时创建）日志文件
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        tracing::info!("Appending traffic log to {}", path.display());
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TrafficSink for JsonlTrafficSink {
    async fn append(&mut self, events: &[TrafficEvent]) -> Result<(), StorageError> {
        let mut buffer = Vec::new();
        for event in events {
            serde_json::to_writer(&mut buffer, event)?;
            buffer.push(b'\n');
        }
        self.file.write_all(&buffer).await?;
        self.file.flush().await?;
        Ok(())
    }
}
