// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::listing::ListingDetail;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 存储错误
    #[error("Storage error: {0}")]
    Other(String),
}

/// 房源持久化仓库特质
///
/// 消费一条完整的详情记录，写入结构化记录和附属资源。
/// 资源下载是尽力而为的，不保证存在。
#[async_trait]
pub trait ListingRepository: Send + Sync {
    /// 保存记录，返回记录所在位置
    async fn save(&self, listing: &ListingDetail) -> Result<PathBuf, StorageError>;
}
