// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 哨兵值：字段尝试提取但失败
///
/// 与空值区分开，下游可以分辨"尝试过但失败"和"不适用"
pub const NOT_FOUND: &str = "not found";

/// 房源卡片摘要
///
/// 由列表页提取器产生，每张卡片一个实例，创建后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSummary {
    /// 标题
    pub title: String,
    /// 房东/副标题第一行
    pub host: String,
    /// 价格标签
    pub price_label: String,
    /// 日期标签
    pub date_label: Option<String>,
    /// 主图URL
    pub main_image_url: Option<String>,
    /// 详情页绝对URL，为空表示不可跟进
    pub detail_url: String,
    /// 位置，缺失时为哨兵值
    pub location: String,
}

impl Default for ListingSummary {
    fn default() -> Self {
        Self {
            title: String::new(),
            host: String::new(),
            price_label: String::new(),
            date_label: None,
            main_image_url: None,
            detail_url: String::new(),
            location: NOT_FOUND.to_string(),
        }
    }
}

impl ListingSummary {
    /// 是否有可跟进的详情URL
    pub fn is_actionable(&self) -> bool {
        !self.detail_url.trim().is_empty()
    }
}

/// 房源详情
///
/// 在摘要字段基础上扩展详情页字段。失败的字段用哨兵值占位，
/// 因此记录总是可以被持久化。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingDetail {
    #[serde(flatten)]
    pub summary: ListingSummary,
    /// 描述，失败时为哨兵值
    pub description: String,
    /// 图片URL，去重并保持画廊顺序
    pub photos: Vec<String>,
    /// 评论文本，不含空串
    pub comments: Vec<String>,
    /// 评分，失败时为哨兵值
    pub rating: String,
    /// 卡片所在的列表页页码
    pub page_number: u32,
    /// 抓取时间
    pub scraped_at: DateTime<Utc>,
}

impl ListingDetail {
    /// 以默认（哨兵）值构造详情记录
    pub fn from_summary(summary: ListingSummary, page_number: u32) -> Self {
        Self {
            summary,
            description: NOT_FOUND.to_string(),
            photos: Vec::new(),
            comments: Vec::new(),
            rating: NOT_FOUND.to_string(),
            page_number,
            scraped_at: Utc::now(),
        }
    }

    pub fn title(&self) -> &str {
        &self.summary.title
    }

    pub fn detail_url(&self) -> &str {
        &self.summary.detail_url
    }
}
