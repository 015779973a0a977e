// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::engines::traits::Selector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// 内置选择器表的版本
pub const BUILTIN_CATALOG_VERSION: u32 = 3;

/// 选择器目录错误
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid selector overrides: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// 逻辑字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Category,
    CardContainer,
    CardTitle,
    CardHost,
    CardDate,
    CardPrice,
    CardLocation,
    CardImage,
    CardLink,
    NextPage,
    DataBootstrap,
    TranslationClose,
    Description,
    Location,
    ShowAllPhotos,
    GalleryImage,
    GalleryClose,
    Comment,
    RatingContainer,
    RatingValue,
}

// 每个字段的候选按顺序尝试，第一个命中者生效
const BUILTIN_SELECTORS: &[(Field, &[&str])] = &[
    (
        Field::Category,
        &[r#"button[role="radio"][name="categoryScroller"]"#],
    ),
    (Field::CardContainer, &[r#"div[data-testid="card-container"]"#]),
    (Field::CardTitle, &[r#"div[data-testid="listing-card-title"]"#]),
    (
        Field::CardHost,
        &[
            r#"div[data-testid="listing-card-subtitle"] span:nth-of-type(1)"#,
            r#"div[data-testid="listing-card-name"]"#,
        ],
    ),
    (
        Field::CardDate,
        &[r#"div[data-testid="listing-card-subtitle"] span:nth-of-type(2)"#],
    ),
    (
        Field::CardPrice,
        &[
            "span._11jcbg2",
            r#"div[data-testid="price-availability-row"] span"#,
        ],
    ),
    (
        Field::CardLocation,
        &[r#"div[data-testid="listing-card-subtitle"] span:nth-of-type(3)"#],
    ),
    (
        Field::CardImage,
        &[r#"img[data-original-uri]"#, "picture img", "img"],
    ),
    (
        Field::CardLink,
        &[r#"a[href*="/rooms/"]"#, "a[href]"],
    ),
    (
        Field::NextPage,
        &[
            r#"nav[aria-label="Pagination"] a:last-child"#,
            r#"nav[aria-label="Pagination des résultats de recherche"] a:last-child"#,
            r#"a[aria-label="Suivant"]"#,
            r#"a[aria-label="Next"]"#,
        ],
    ),
    (Field::DataBootstrap, &["#data-bootstrap"]),
    (
        Field::TranslationClose,
        &[
            r#"div[role="dialog"] button[aria-label="Fermer"]"#,
            r#"div[role="dialog"] button[aria-label="Close"]"#,
        ],
    ),
    (
        Field::Description,
        &[
            r#"div[data-section-id="DESCRIPTION_DEFAULT"]"#,
            r#"div[data-plugin-in-point-id="DESCRIPTION_DEFAULT"]"#,
        ],
    ),
    (
        Field::Location,
        &[
            r#"div[data-section-id="LOCATION_DEFAULT"] section div h3 + div"#,
            r#"div[data-plugin-in-point-id="LOCATION_DEFAULT"] span"#,
            r#"div[data-section-id="OVERVIEW_DEFAULT_V2"] h2"#,
            r#"div[data-section-id="OVERVIEW_DEFAULT"] h2"#,
        ],
    ),
    (
        Field::ShowAllPhotos,
        &[
            r#"button[data-testid="pdp-show-all-photos-button"]"#,
            r#"div[data-section-id="HERO_DEFAULT"] button"#,
        ],
    ),
    (
        Field::GalleryImage,
        &[
            r#"div[data-testid="photo-viewer-section"] img"#,
            r#"div[data-section-id="HERO_DEFAULT"] img"#,
        ],
    ),
    (
        Field::GalleryClose,
        &[
            r#"button[aria-label="Fermer"]"#,
            r#"button[aria-label="Close"]"#,
        ],
    ),
    (
        Field::Comment,
        &[
            r#"div[data-section-id="REVIEWS_DEFAULT"] div[data-review-id] span"#,
            r#"div[data-testid="pdp-reviews-modal-scrollable-panel"] span"#,
        ],
    ),
    (
        Field::RatingContainer,
        &[
            r#"div[data-testid="pdp-reviews-highlight-banner-host-rating"]"#,
            r#"div[data-section-id="GUEST_FAVORITE_BANNER"]"#,
            r#"div[data-section-id="OVERVIEW_DEFAULT_V2"]"#,
        ],
    ),
    (Field::RatingValue, &["[aria-label]"]),
];

const BUILTIN_HOST_PHOTO_MARKERS: &[&str] = &["hôte", "host", "profil", "profile"];

#[derive(Debug, Deserialize)]
struct CatalogOverrides {
    version: Option<u32>,
    #[serde(default)]
    selectors: HashMap<Field, Vec<Selector>>,
    #[serde(default)]
    host_photo_markers: Vec<String>,
}

/// 选择器目录
///
/// 带版本的逻辑字段到候选选择器的映射表。页面结构变化时，
/// 通过覆盖文件把新选择器加在内置候选之前，而不是修改代码分支。
#[derive(Debug, Clone)]
pub struct SelectorCatalog {
    version: u32,
    entries: HashMap<Field, Vec<Selector>>,
    host_photo_markers: Vec<String>,
}

impl Default for SelectorCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SelectorCatalog {
    /// 内置选择器表
    pub fn builtin() -> Self {
        let entries = BUILTIN_SELECTORS
            .iter()
            .map(|(field, selectors)| {
                (
                    *field,
                    selectors.iter().map(|css| Selector::new(*css)).collect(),
                )
            })
            .collect();

        Self {
            version: BUILTIN_CATALOG_VERSION,
            entries,
            host_photo_markers: BUILTIN_HOST_PHOTO_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }

    /// 加载目录，可选地合并覆盖文件
    pub fn load(overrides: Option<&Path>) -> Result<Self, CatalogError> {
        let catalog = Self::builtin();
        match overrides {
            Some(path) => {
                let yaml = std::fs::read_to_string(path)?;
                let catalog = catalog.with_overrides_yaml(&yaml)?;
                tracing::info!(
                    "Loaded selector overrides from {} (catalog version {})",
                    path.display(),
                    catalog.version
                );
                Ok(catalog)
            }
            None => Ok(catalog),
        }
    }

    /// 合并YAML覆盖：新候选排在已有候选之前，重复项去掉
    pub fn with_overrides_yaml(mut self, yaml: &str) -> Result<Self, CatalogError> {
        let overrides: CatalogOverrides = serde_yaml::from_str(yaml)?;

        if let Some(version) = overrides.version {
            self.version = version;
        }
        for (field, selectors) in overrides.selectors {
            let existing = self.entries.remove(&field).unwrap_or_default();
            let mut merged = selectors;
            for selector in existing {
                if !merged.contains(&selector) {
                    merged.push(selector);
                }
            }
            self.entries.insert(field, merged);
        }
        for marker in overrides.host_photo_markers {
            let marker = marker.to_lowercase();
            if !self.host_photo_markers.contains(&marker) {
                self.host_photo_markers.push(marker);
            }
        }

        Ok(self)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// 字段的候选选择器，按优先级排序
    pub fn candidates(&self, field: Field) -> &[Selector] {
        self.entries.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 字段的首选选择器
    pub fn primary(&self, field: Field) -> Option<&Selector> {
        self.candidates(field).first()
    }

    /// 图片的无障碍标签是否表明这是房东/头像照片
    pub fn is_host_photo_label(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.host_photo_markers
            .iter()
            .any(|marker| label.contains(marker.as_str()))
    }
}
