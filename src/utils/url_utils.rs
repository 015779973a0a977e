// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::Url;

/// 将卡片上的链接转换为绝对URL
///
/// 已是绝对地址时原样返回。无法得到绝对地址时返回空串，
/// 卡片因此被视为不可跟进
pub fn absolutize(base: Option<&Url>, href: &str) -> String {
    let href = href.trim();
    if let Ok(url) = Url::parse(href) {
        return url.to_string();
    }
    match base.map(|base| base.join(href)) {
        Some(Ok(url)) => url.to_string(),
        Some(Err(e)) => {
            tracing::warn!("Could not resolve detail link '{}': {}", href, e);
            String::new()
        }
        None => {
            tracing::warn!("No page URL to resolve detail link '{}' against", href);
            String::new()
        }
    }
}

/// 从详情URL中提取房源编号（`/rooms/<id>` 路径段）
pub fn listing_id(detail_url: &str) -> Option<String> {
    let url = Url::parse(detail_url).ok()?;
    let mut segments = url.path_segments()?;
    segments
        .by_ref()
        .find(|segment| *segment == "rooms")
        .and_then(|_| segments.next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}
