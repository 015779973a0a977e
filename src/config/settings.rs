// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::crawler::CrawlOptions;
use crate::engines::chrome_session::ChromeLaunchOptions;
use crate::engines::waits::WaitOptions;
use crate::extractors::ExtractOptions;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 默认起始页：巴黎房源分类搜索
pub const DEFAULT_START_URL: &str = "https://www.airbnb.fr/s/Paris/homes?search_mode=flex_destinations_search&category_tag=Tag%3A8661&place_id=ChIJD7fiBh9u5kcRYJSMaMOCCwQ";

/// 应用程序配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 爬取配置
    pub crawl: CrawlSettings,
    /// 浏览器配置
    pub browser: BrowserSettings,
    /// 输出配置
    pub output: OutputSettings,
}

/// 爬取配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlSettings {
    /// 起始列表页URL
    pub start_url: String,
    /// 有界等待超时（秒）
    pub timeout_secs: u64,
    /// 翻页后的延迟（秒）
    pub page_delay_secs: u64,
    /// 轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 最多处理的页数
    pub max_pages: Option<u32>,
    /// 控件失效时的重试次数
    pub stale_retries: u32,
    /// 丢弃画廊最后一张图片
    pub drop_last_photo: bool,
    /// 选择器覆盖文件（YAML）
    pub selector_overrides: Option<PathBuf>,
}

/// 浏览器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSettings {
    /// 远程调试地址
    pub remote_debugging_url: Option<String>,
    /// 无头模式
    pub headless: bool,
    /// CDP 请求超时（秒）
    pub request_timeout_secs: u64,
}

/// 输出配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct OutputSettings {
    /// 房源记录根目录
    pub root_dir: PathBuf,
    /// 流量日志文件
    pub traffic_log: PathBuf,
    /// 是否下载图片
    pub download_photos: bool,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加内置默认值、`config/default`、`config/{APP_ENVIRONMENT}`
    /// 和 `STAYCRAWL__` 前缀的环境变量
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        Self::load(Path::new("config"), &env)
    }

    /// 从指定目录加载配置
    pub fn load(config_dir: &Path, env: &str) -> Result<Self, ConfigError> {
        let default_file = config_dir.join("default");
        let env_file = config_dir.join(env);

        let builder = Config::builder()
            .set_default("crawl.start_url", DEFAULT_START_URL)?
            .set_default("crawl.timeout_secs", 10)?
            .set_default("crawl.page_delay_secs", 1)?
            .set_default("crawl.poll_interval_ms", 250)?
            .set_default("crawl.stale_retries", 1)?
            .set_default("crawl.drop_last_photo", true)?
            .set_default("browser.headless", false)?
            .set_default("browser.request_timeout_secs", 30)?
            .set_default("output.root_dir", "./output")?
            .set_default("output.traffic_log", "./output/traffic.jsonl")?
            .set_default("output.download_photos", false)?
            .set_override_option(
                "browser.remote_debugging_url",
                std::env::var("CHROMIUM_REMOTE_DEBUGGING_URL").ok(),
            )?
            .add_source(File::from(default_file).required(false))
            .add_source(File::from(env_file).required(false))
            .add_source(Environment::with_prefix("STAYCRAWL").separator("__"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if url::Url::parse(&self.crawl.start_url).is_err() {
            return Err(ConfigError::Message(format!(
                "crawl.start_url is not a valid URL: {}",
                self.crawl.start_url
            )));
        }
        if self.crawl.timeout_secs == 0 {
            return Err(ConfigError::Message(
                "crawl.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.crawl.max_pages == Some(0) {
            return Err(ConfigError::Message(
                "crawl.max_pages must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

impl CrawlSettings {
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions::new(
            Duration::from_secs(self.timeout_secs),
            Duration::from_millis(self.poll_interval_ms.max(1)),
        )
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            wait: self.wait_options(),
            drop_last_photo: self.drop_last_photo,
        }
    }

    pub fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            wait: self.wait_options(),
            page_delay: Duration::from_secs(self.page_delay_secs),
            max_pages: self.max_pages,
            stale_retries: self.stale_retries,
        }
    }
}

impl BrowserSettings {
    pub fn launch_options(&self) -> ChromeLaunchOptions {
        ChromeLaunchOptions {
            remote_debugging_url: self.remote_debugging_url.clone(),
            headless: self.headless,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}
