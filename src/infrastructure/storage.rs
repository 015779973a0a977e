// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::domain::models::listing::ListingDetail;
use crate::domain::repositories::listing_repository::{ListingRepository, StorageError};
use crate::utils::url_utils::listing_id;

const RECORD_FILE: &str = "listing.json";
const MAX_SLUG_LEN: usize = 48;

/// 本地文件系统房源存储
///
/// 每条记录一个目录 `<root>/<NNNN>-<slug>/`，序号按保存顺序递增，
/// 目录中包含 `listing.json`，启用下载时还包含图片文件。
pub struct LocalListingStore {
    root: PathBuf,
    sequence: AtomicU32,
    http: Option<reqwest::Client>,
}

impl LocalListingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sequence: AtomicU32::new(0),
            http: None,
        }
    }

    /// 启用图片下载
    pub fn with_photo_downloads(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn folder_for(&self, listing: &ListingDetail) -> PathBuf {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let slug = match slugify(listing.title()) {
            slug if !slug.is_empty() => slug,
            _ => listing_id(listing.detail_url()).unwrap_or_else(|| "listing".to_string()),
        };
        self.root.join(format!("{:04}-{}", sequence, slug))
    }

    async fn download_photos(&self, client: &reqwest::Client, folder: &Path, photos: &[String]) {
        for (index, url) in photos.iter().enumerate() {
            let path = folder.join(photo_file_name(index, url));
            match fetch_bytes(client, url).await {
                Ok(bytes) => {
                    if let Err(e) = fs::write(&path, &bytes).await {
                        tracing::warn!("Failed to write photo {}: {}", path.display(), e);
                    }
                }
                Err(e) => tracing::warn!("Failed to download photo {}: {}", url, e),
            }
        }
    }
}

#[async_trait]
impl ListingRepository for LocalListingStore {
    async fn save(&self, listing: &ListingDetail) -> Result<PathBuf, StorageError> {
        let folder = self.folder_for(listing);
        fs::create_dir_all(&folder).await?;

        let json = serde_json::to_vec_pretty(listing)?;
        let mut file = fs::File::create(folder.join(RECORD_FILE)).await?;
        file.write_all(&json).await?;
        file.flush().await?;

        if let Some(client) = &self.http {
            self.download_photos(client, &folder, &listing.photos).await;
        }

        tracing::debug!("Saved '{}' to {}", listing.title(), folder.display());
        Ok(folder)
    }
}

async fn fetch_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, StorageError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| StorageError::Other(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(StorageError::Other(format!("HTTP {}", status)));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| StorageError::Other(e.to_string()))?;
    Ok(bytes.to_vec())
}

/// 由标题生成目录名：转写为 ASCII、小写、非字母数字折叠为 `-`
pub fn slugify(title: &str) -> String {
    let ascii = deunicode::deunicode(title).to_lowercase();
    let mut slug = String::with_capacity(ascii.len());
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.truncate(MAX_SLUG_LEN);
    slug.trim_end_matches('-').to_string()
}

/// 图片文件名：序号加URL摘要，扩展名取自URL路径
pub fn photo_file_name(index: usize, url: &str) -> String {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    let extension = url::Url::parse(url)
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
        })
        .filter(|e| matches!(e.as_str(), "jpg" | "jpeg" | "png" | "webp" | "avif"))
        .unwrap_or_else(|| "jpg".to_string());
    format!("photo-{:02}-{}.{}", index + 1, &digest[..12], extension)
}
