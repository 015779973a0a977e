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

use staycrawl::application::use_cases::crawl_use_case::{CrawlPlan, CrawlUseCase};
use staycrawl::config::settings::Settings;
use staycrawl::engines::chrome_session::ChromeSession;
use staycrawl::engines::traits::BrowserSession;
use staycrawl::extractors::selector_catalog::SelectorCatalog;
use staycrawl::infrastructure::storage::LocalListingStore;
use staycrawl::infrastructure::traffic_log::JsonlTrafficSink;
use staycrawl::utils::telemetry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// 主函数
///
/// 加载配置、启动浏览器、运行一次完整爬取并输出报告
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting staycrawl...");

    // 2. Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded");

    let catalog = Arc::new(SelectorCatalog::load(
        settings.crawl.selector_overrides.as_deref(),
    )?);
    info!("Selector catalog version {}", catalog.version());

    // 3. Output targets
    let mut store = LocalListingStore::new(&settings.output.root_dir);
    if settings.output.download_photos {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.browser.request_timeout_secs))
            .build()?;
        store = store.with_photo_downloads(client);
    }
    let sink = JsonlTrafficSink::open(&settings.output.traffic_log).await?;

    // 4. Browser
    let chrome = Arc::new(ChromeSession::launch(&settings.browser.launch_options()).await?);
    let session: Arc<dyn BrowserSession> = chrome.clone();

    let use_case = CrawlUseCase::new(session, catalog, Arc::new(store));
    let plan = CrawlPlan {
        start_url: settings.crawl.start_url.clone(),
        extract: settings.crawl.extract_options(),
        crawl: settings.crawl.crawl_options(),
    };

    let result = tokio::select! {
        result = use_case.execute(&plan, sink) => Some(result),
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down browser");
            None
        }
    };

    if let Err(e) = chrome.shutdown().await {
        error!("Failed to close browser: {}", e);
    }

    if let Some(result) = result {
        let outcome = result?;
        info!(
            "Finished: {} ({} listings saved to {}, {} failed)",
            outcome.report.status,
            outcome.saved.len(),
            settings.output.root_dir.display(),
            outcome.save_failures
        );
    }

    Ok(())
}
