// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::listing::{ListingDetail, ListingSummary, NOT_FOUND};
use crate::engines::traits::{BrowserError, BrowserSession, ContextId};
use crate::extractors::PageExtractor;
use futures::FutureExt;
use metrics::counter;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// 详情页浏览上下文
///
/// 获取时打开新上下文并切换过去；`release` 关闭它并切回原上下文。
/// 调用方必须在每条退出路径上调用 `release`。
pub struct DetailContext<'a> {
    session: &'a dyn BrowserSession,
    origin: ContextId,
    context: ContextId,
}

impl<'a> DetailContext<'a> {
    /// 打开并切换到新的隔离上下文
    pub async fn acquire(session: &'a dyn BrowserSession) -> Result<Self, BrowserError> {
        let origin = session.active_context().await?;
        let context = session.open_context().await?;
        let scope = Self {
            session,
            origin,
            context,
        };
        if let Err(e) = session.switch_to(context).await {
            scope.release().await;
            return Err(e);
        }
        Ok(scope)
    }

    pub fn origin(&self) -> ContextId {
        self.origin
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    /// 关闭上下文并切回列表上下文，失败只记录日志
    pub async fn release(self) {
        if let Err(e) = self.session.close_context(self.context).await {
            warn!("Failed to close {}: {}", self.context, e);
        }
        if let Err(e) = self.session.switch_to(self.origin).await {
            error!(
                "Failed to switch back to listing {}: {}",
                self.origin, e
            );
        }
    }
}

/// 详情导航器
///
/// 一个摘要进，恰好一个详情出。字段级失败由各提取器自行消化，
/// 导航失败时描述为哨兵值，记录仍然输出。
pub struct DetailNavigator {
    session: Arc<dyn BrowserSession>,
    extractor: PageExtractor,
    page_load_timeout: Duration,
}

impl DetailNavigator {
    pub fn new(
        session: Arc<dyn BrowserSession>,
        extractor: PageExtractor,
        page_load_timeout: Duration,
    ) -> Self {
        Self {
            session,
            extractor,
            page_load_timeout,
        }
    }

    /// 抓取一个房源的详情
    pub async fn fetch(&self, summary: &ListingSummary, page_number: u32) -> ListingDetail {
        let mut detail = ListingDetail::from_summary(summary.clone(), page_number);

        if !summary.is_actionable() {
            warn!(
                "Listing '{}' has no detail URL, emitting record with sentinel values",
                summary.title
            );
            return detail;
        }

        let scope = match DetailContext::acquire(self.session.as_ref()).await {
            Ok(scope) => scope,
            Err(e) => {
                warn!(
                    "Could not open detail context for {}: {}",
                    summary.detail_url, e
                );
                counter!("staycrawl_detail_failures_total").increment(1);
                return detail;
            }
        };

        let outcome = AssertUnwindSafe(self.extract_into(&mut detail))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => debug!("Extracted details for {}", summary.detail_url),
            Ok(Err(e)) => {
                warn!(
                    "Error loading details for {}: {}",
                    summary.detail_url, e
                );
                detail.description = NOT_FOUND.to_string();
                counter!("staycrawl_detail_failures_total").increment(1);
            }
            Err(_) => {
                error!("Detail extraction panicked for {}", summary.detail_url);
                counter!("staycrawl_detail_failures_total").increment(1);
            }
        }

        scope.release().await;
        detail
    }

    async fn extract_into(&self, detail: &mut ListingDetail) -> Result<(), BrowserError> {
        let url = detail.summary.detail_url.clone();
        tokio::time::timeout(self.page_load_timeout, self.session.navigate(&url))
            .await
            .map_err(|_| {
                BrowserError::Timeout(format!(
                    "loading {} after {:?}",
                    url, self.page_load_timeout
                ))
            })??;

        detail.description = self.extractor.description().await;
        let location = self.extractor.location().await;
        if location != NOT_FOUND {
            detail.summary.location = location;
        }
        detail.photos = self.extractor.photos().await;
        detail.comments = self.extractor.comments().await;
        detail.rating = self.extractor.rating().await;
        Ok(())
    }
}
