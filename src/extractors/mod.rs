// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 页面提取器
//!
//! 对当前页面状态的只读操作。每个提取器都独立容错，
//! 失败时返回约定的默认值而不是向上传播错误。

pub mod detail_page;
pub mod listing_page;
pub mod selector_catalog;

use crate::engines::traits::{BrowserSession, ElementHandle};
use crate::engines::waits::{self, WaitOptions};
use selector_catalog::{Field, SelectorCatalog};
use std::sync::Arc;
use std::time::Duration;

/// 覆盖层等尽力而为操作的超时上限
pub const BEST_EFFORT_TIMEOUT: Duration = Duration::from_secs(2);

/// 提取器选项
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// 等待参数
    pub wait: WaitOptions,
    /// 丢弃画廊最后一张图片（已观察到的布局占位符）
    pub drop_last_photo: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            wait: WaitOptions::default(),
            drop_last_photo: true,
        }
    }
}

/// 页面提取器
///
/// 列表页与详情页提取方法分别在 `listing_page` 和 `detail_page` 中实现
#[derive(Clone)]
pub struct PageExtractor {
    session: Arc<dyn BrowserSession>,
    catalog: Arc<SelectorCatalog>,
    options: ExtractOptions,
}

impl PageExtractor {
    pub fn new(
        session: Arc<dyn BrowserSession>,
        catalog: Arc<SelectorCatalog>,
        options: ExtractOptions,
    ) -> Self {
        Self {
            session,
            catalog,
            options,
        }
    }

    pub fn catalog(&self) -> &SelectorCatalog {
        &self.catalog
    }

    pub fn options(&self) -> ExtractOptions {
        self.options
    }

    fn session(&self) -> &dyn BrowserSession {
        self.session.as_ref()
    }

    fn short_wait(&self) -> WaitOptions {
        self.options.wait.capped(BEST_EFFORT_TIMEOUT)
    }

    /// 第一个非空文本，按候选顺序
    async fn first_text(&self, scope: Option<ElementHandle>, field: Field) -> Option<String> {
        for selector in self.catalog.candidates(field) {
            let element = match self.session().find_one(scope, selector).await {
                Ok(Some(element)) => element,
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!("Lookup of {:?} via '{}' failed: {}", field, selector, e);
                    continue;
                }
            };
            match self.session().text(element).await {
                Ok(text) if !text.trim().is_empty() => return Some(text.trim().to_string()),
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!("Reading text of {:?} via '{}' failed: {}", field, selector, e);
                }
            }
        }
        None
    }

    /// 第一个非空属性值，按候选顺序
    async fn first_attribute(
        &self,
        scope: Option<ElementHandle>,
        field: Field,
        name: &str,
    ) -> Option<String> {
        for selector in self.catalog.candidates(field) {
            let element = match self.session().find_one(scope, selector).await {
                Ok(Some(element)) => element,
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!("Lookup of {:?} via '{}' failed: {}", field, selector, e);
                    continue;
                }
            };
            match self.session().attribute(element, name).await {
                Ok(Some(value)) if !value.trim().is_empty() => {
                    return Some(value.trim().to_string())
                }
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!("Reading {} of {:?} failed: {}", name, field, e);
                }
            }
        }
        None
    }

    /// 尽力点击：控件不存在或点击失败都不算错误
    async fn click_if_present(&self, field: Field, options: WaitOptions) -> bool {
        let control =
            match waits::wait_for_clickable(self.session(), self.catalog.candidates(field), options)
                .await
            {
                Ok(control) => control,
                Err(e) => {
                    tracing::debug!("Optional control {:?} not available: {}", field, e);
                    return false;
                }
            };
        match self.session().click(control).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Optional click on {:?} failed: {}", field, e);
                false
            }
        }
    }
}
