// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::listing::ListingDetail;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 爬取游标
///
/// 仅在一次运行内存在，由分页控制器推进，不持久化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlCursor {
    /// 页码，从1开始
    pub page_number: u32,
}

impl CrawlCursor {
    pub fn start() -> Self {
        Self { page_number: 1 }
    }

    pub fn next(self) -> Self {
        Self {
            page_number: self.page_number + 1,
        }
    }
}

impl Default for CrawlCursor {
    fn default() -> Self {
        Self::start()
    }
}

/// 正常结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneReason {
    /// 列表页没有卡片，目录已遍历完
    CatalogExhausted,
    /// 找不到下一页控件
    NextControlNotFound,
    /// 达到配置的页数上限
    PageLimitReached,
}

/// 中止原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// 控件引用反复失效，重试耗尽
    StaleRetryExhausted,
    /// 点击被覆盖层拦截
    ClickIntercepted,
    /// 翻页后的等待超时
    NavigationTimeout,
    /// 其他意外错误
    Unexpected(String),
}

/// 爬取最终状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    Completed(DoneReason),
    Aborted(AbortReason),
}

impl CrawlStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, CrawlStatus::Completed(_))
    }
}

impl fmt::Display for DoneReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DoneReason::CatalogExhausted => write!(f, "catalog exhausted"),
            DoneReason::NextControlNotFound => write!(f, "next page control not found"),
            DoneReason::PageLimitReached => write!(f, "page limit reached"),
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AbortReason::StaleRetryExhausted => write!(f, "stale-retry-exhausted"),
            AbortReason::ClickIntercepted => write!(f, "click-intercepted"),
            AbortReason::NavigationTimeout => write!(f, "navigation-timeout"),
            AbortReason::Unexpected(msg) => write!(f, "unexpected: {}", msg),
        }
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CrawlStatus::Completed(reason) => write!(f, "completed ({})", reason),
            CrawlStatus::Aborted(reason) => write!(f, "aborted ({})", reason),
        }
    }
}

/// 爬取报告
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// 结束状态
    pub status: CrawlStatus,
    /// 最后到达的页码
    pub pages_visited: u32,
    /// 已处理的条目数
    pub items_processed: usize,
    /// 累积的详情记录，按处理顺序
    pub listings: Vec<ListingDetail>,
}
