// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::selector_catalog::{Field, SelectorCatalog};
use super::PageExtractor;
use crate::domain::models::listing::NOT_FOUND;
use crate::engines::waits;
use std::collections::HashSet;
use tracing::{debug, warn};

/// 画廊中读取到的一张图片
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GalleryImage {
    /// 无障碍标签（aria-label 或 alt）
    pub label: Option<String>,
    /// 图片地址
    pub src: Option<String>,
}

impl PageExtractor {
    /// 提取描述
    ///
    /// 先尽力关闭翻译弹窗，再等待描述容器
    pub async fn description(&self) -> String {
        if self
            .click_if_present(Field::TranslationClose, self.short_wait())
            .await
        {
            debug!("Dismissed translation overlay");
        }

        let container = match waits::wait_for_present(
            self.session(),
            self.catalog.candidates(Field::Description),
            self.options.wait,
        )
        .await
        {
            Ok(container) => container,
            Err(e) => {
                warn!("Description not loaded: {}", e);
                return NOT_FOUND.to_string();
            }
        };

        match self.session().text(container).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => NOT_FOUND.to_string(),
            Err(e) => {
                warn!("Could not read description text: {}", e);
                NOT_FOUND.to_string()
            }
        }
    }

    /// 提取位置
    ///
    /// 页面版本之间结构不同，依次尝试候选选择器
    pub async fn location(&self) -> String {
        if let Err(e) = waits::wait_for_present(
            self.session(),
            self.catalog.candidates(Field::Location),
            self.short_wait(),
        )
        .await
        {
            debug!("Location section not rendered yet: {}", e);
        }

        self.first_text(None, Field::Location)
            .await
            .unwrap_or_else(|| NOT_FOUND.to_string())
    }

    /// 提取图片列表
    pub async fn photos(&self) -> Vec<String> {
        if self
            .click_if_present(Field::ShowAllPhotos, self.short_wait())
            .await
        {
            debug!("Opened photo gallery");
        }

        let elements = match waits::wait_for_all_present(
            self.session(),
            self.catalog.candidates(Field::GalleryImage),
            self.options.wait,
        )
        .await
        {
            Ok(elements) => elements,
            Err(e) => {
                warn!("Gallery images not found: {}", e);
                self.close_gallery().await;
                return Vec::new();
            }
        };

        let mut images = Vec::with_capacity(elements.len());
        for element in elements {
            let label = match self.session().attribute(element, "aria-label").await {
                Ok(Some(label)) => Some(label),
                Ok(None) => self.session().attribute(element, "alt").await.ok().flatten(),
                Err(e) => {
                    debug!("Skipping unreadable gallery image {}: {}", element, e);
                    continue;
                }
            };
            let src = self.session().attribute(element, "src").await.ok().flatten();
            images.push(GalleryImage { label, src });
        }

        self.close_gallery().await;
        curate_photos(images, &self.catalog, self.options.drop_last_photo)
    }

    async fn close_gallery(&self) {
        let close = match waits::find_first(
            self.session(),
            None,
            self.catalog.candidates(Field::GalleryClose),
        )
        .await
        {
            Ok(Some(close)) => close,
            Ok(None) => return,
            Err(e) => {
                debug!("Gallery close control lookup failed: {}", e);
                return;
            }
        };
        if let Err(e) = self.session().click(close).await {
            debug!("Could not close photo gallery: {}", e);
        }
    }

    /// 提取评论文本，去掉首尾空白并丢弃空串
    pub async fn comments(&self) -> Vec<String> {
        let elements = match waits::find_all_first(
            self.session(),
            None,
            self.catalog.candidates(Field::Comment),
        )
        .await
        {
            Ok(elements) => elements,
            Err(e) => {
                warn!("Could not collect comments: {}", e);
                return Vec::new();
            }
        };

        let mut comments = Vec::with_capacity(elements.len());
        for element in elements {
            match self.session().text(element).await {
                Ok(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        comments.push(text.to_string());
                    }
                }
                Err(e) => debug!("Skipping unreadable comment {}: {}", element, e),
            }
        }
        comments
    }

    /// 提取评分
    ///
    /// 读取评分容器内嵌元素的无障碍值，没有时退回到其文本
    pub async fn rating(&self) -> String {
        let container = match waits::wait_for_present(
            self.session(),
            self.catalog.candidates(Field::RatingContainer),
            self.options.wait,
        )
        .await
        {
            Ok(container) => container,
            Err(e) => {
                warn!("Rating not found: {}", e);
                return NOT_FOUND.to_string();
            }
        };

        if let Some(label) = self
            .first_attribute(Some(container), Field::RatingValue, "aria-label")
            .await
        {
            return label;
        }
        self.first_text(Some(container), Field::RatingValue)
            .await
            .unwrap_or_else(|| NOT_FOUND.to_string())
    }
}

/// 整理画廊图片
///
/// 过滤房东/头像照片，按URL去重并保持首次出现顺序。
/// `drop_last` 为真时丢弃最后一项：在观察到的画廊布局中最后一格是占位符，
/// 页面布局变化后需要重新验证。
pub fn curate_photos(
    images: Vec<GalleryImage>,
    catalog: &SelectorCatalog,
    drop_last: bool,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut photos = Vec::new();

    for image in images {
        if image
            .label
            .as_deref()
            .is_some_and(|label| catalog.is_host_photo_label(label))
        {
            continue;
        }
        let Some(src) = image.src.map(|s| s.trim().to_string()) else {
            continue;
        };
        if src.is_empty() || !seen.insert(src.clone()) {
            continue;
        }
        photos.push(src);
    }

    if drop_last {
        photos.pop();
    }
    photos
}
