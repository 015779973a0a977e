// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::selector_catalog::Field;
use super::PageExtractor;
use crate::domain::models::listing::{ListingSummary, NOT_FOUND};
use crate::engines::traits::{BrowserError, ElementHandle};
use crate::engines::waits;
use crate::utils::url_utils::absolutize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

impl PageExtractor {
    /// 提取分类标签
    ///
    /// 等待至少一个分类控件出现，超时返回空序列
    pub async fn categories(&self) -> Vec<String> {
        let elements = match waits::wait_for_all_present(
            self.session(),
            self.catalog.candidates(Field::Category),
            self.options.wait,
        )
        .await
        {
            Ok(elements) => elements,
            Err(BrowserError::Timeout(_)) => {
                info!("Timeout: categories not found within the given time");
                return Vec::new();
            }
            Err(e) => {
                warn!("Error extracting categories: {}", e);
                return Vec::new();
            }
        };

        let mut categories = Vec::with_capacity(elements.len());
        for element in elements {
            match self.session().text(element).await {
                Ok(label) => categories.push(label.trim().to_string()),
                Err(e) => debug!("Skipping unreadable category {}: {}", element, e),
            }
        }
        info!("Successfully extracted {} categories", categories.len());
        categories
    }

    /// 提取当前列表页的所有卡片
    ///
    /// 每个卡片容器对应一个摘要；缺少详情链接的卡片仍然保留，
    /// 其 `detail_url` 为空，由调用方视为不可跟进。
    pub async fn listing_cards(&self) -> Vec<ListingSummary> {
        let containers = match waits::wait_for_all_present(
            self.session(),
            self.catalog.candidates(Field::CardContainer),
            self.options.wait,
        )
        .await
        {
            Ok(containers) => containers,
            Err(BrowserError::Timeout(_)) => {
                info!("No listing cards found on this page");
                return Vec::new();
            }
            Err(e) => {
                warn!("Error extracting listings data: {}", e);
                return Vec::new();
            }
        };

        let base = match self.session().current_url().await {
            Ok(url) => Url::parse(&url).ok(),
            Err(e) => {
                debug!("Could not read page URL for link resolution: {}", e);
                None
            }
        };

        let mut cards = Vec::with_capacity(containers.len());
        for container in containers {
            cards.push(self.read_card(container, base.as_ref()).await);
        }
        debug!("Extracted {} listing cards", cards.len());
        cards
    }

    async fn read_card(&self, card: ElementHandle, base: Option<&Url>) -> ListingSummary {
        let scope = Some(card);
        let title = self.first_text(scope, Field::CardTitle).await;
        let host = self.first_text(scope, Field::CardHost).await;
        let price_label = self.first_text(scope, Field::CardPrice).await;
        let date_label = self.first_text(scope, Field::CardDate).await;
        let location = self.first_text(scope, Field::CardLocation).await;
        let main_image_url = self.first_attribute(scope, Field::CardImage, "src").await;
        let href = self.first_attribute(scope, Field::CardLink, "href").await;

        let detail_url = match href {
            Some(href) => absolutize(base, &href),
            None => {
                warn!(
                    "Listing card '{}' has no detail link",
                    title.as_deref().unwrap_or_default()
                );
                String::new()
            }
        };

        ListingSummary {
            title: title.unwrap_or_default(),
            host: host.unwrap_or_default(),
            price_label: price_label.unwrap_or_default(),
            date_label,
            main_image_url,
            detail_url,
            location: location.unwrap_or_else(|| NOT_FOUND.to_string()),
        }
    }

    /// 定位下一页控件
    ///
    /// 有界等待控件变为可点击，超时返回 `None`，这是分页结束的主要信号
    pub async fn next_page_control(&self) -> Option<ElementHandle> {
        match waits::wait_for_clickable(
            self.session(),
            self.catalog.candidates(Field::NextPage),
            self.options.wait,
        )
        .await
        {
            Ok(control) => Some(control),
            Err(BrowserError::Timeout(_)) => {
                info!("Timeout: next page button not found within the given time");
                None
            }
            Err(e) => {
                warn!("Error finding next page button: {}", e);
                None
            }
        }
    }

    /// 读取页面内嵌的 data-bootstrap 数据
    ///
    /// 仅作诊断上下文。缺失、值为 `"true"` 或解析失败时返回空映射
    pub async fn data_bootstrap(&self) -> Map<String, Value> {
        let raw = match self
            .first_attribute(None, Field::DataBootstrap, "data-bootstrap")
            .await
        {
            Some(raw) => raw,
            None => {
                debug!("No data-bootstrap blob on this page");
                return Map::new();
            }
        };
        parse_bootstrap(&raw)
    }
}

/// 解析 data-bootstrap 属性值
pub fn parse_bootstrap(raw: &str) -> Map<String, Value> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "true" {
        return Map::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!("Ignoring non-object data-bootstrap value: {}", other);
            Map::new()
        }
        Err(e) => {
            warn!("Could not extract data-bootstrap: {}", e);
            Map::new()
        }
    }
}
