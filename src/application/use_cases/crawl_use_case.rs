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

use crate::{
    crawler::{CrawlOptions, PaginationController, SaveLedger, TrafficCapture},
    domain::{
        models::crawl::CrawlReport,
        repositories::{listing_repository::ListingRepository, traffic_sink::TrafficSink},
    },
    engines::traits::{BrowserError, BrowserSession},
    extractors::{selector_catalog::SelectorCatalog, ExtractOptions, PageExtractor},
};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Error, Debug)]
pub enum CrawlUseCaseError {
    #[error("Could not open start page {url}: {source}")]
    StartPage {
        url: String,
        #[source]
        source: BrowserError,
    },
}

/// 一次爬取的参数
#[derive(Debug, Clone)]
pub struct CrawlPlan {
    /// 起始列表页
    pub start_url: String,
    pub extract: ExtractOptions,
    pub crawl: CrawlOptions,
}

/// 爬取结果
#[derive(Debug)]
pub struct CrawlOutcome {
    pub report: CrawlReport,
    /// 成功保存的记录位置
    pub saved: Vec<PathBuf>,
    /// 保存失败的记录数
    pub save_failures: usize,
    /// 写入流量日志的事件数
    pub traffic_events: u64,
}

/// 爬取用例
///
/// 打开起始页，记录诊断上下文，再运行分页控制器；每条记录产生后立即持久化，
/// 中途中断时已处理的记录不会丢失
pub struct CrawlUseCase<R> {
    session: Arc<dyn BrowserSession>,
    catalog: Arc<SelectorCatalog>,
    listing_repo: Arc<R>,
}

impl<R> CrawlUseCase<R>
where
    R: ListingRepository + 'static,
{
    pub fn new(
        session: Arc<dyn BrowserSession>,
        catalog: Arc<SelectorCatalog>,
        listing_repo: Arc<R>,
    ) -> Self {
        Self {
            session,
            catalog,
            listing_repo,
        }
    }

    #[instrument(skip(self, plan, sink), fields(start_url = %plan.start_url))]
    pub async fn execute<S: TrafficSink>(
        &self,
        plan: &CrawlPlan,
        sink: S,
    ) -> Result<CrawlOutcome, CrawlUseCaseError> {
        info!("Opening start page");
        self.session
            .navigate(&plan.start_url)
            .await
            .map_err(|source| CrawlUseCaseError::StartPage {
                url: plan.start_url.clone(),
                source,
            })?;

        let extractor = PageExtractor::new(self.session.clone(), self.catalog.clone(), plan.extract);

        let bootstrap = extractor.data_bootstrap().await;
        if !bootstrap.is_empty() {
            let keys: Vec<&String> = bootstrap.keys().collect();
            info!("Data bootstrap keys: {:?}", keys);
        }
        let categories = extractor.categories().await;
        info!("Categories: {:?}", categories);

        let repository: Arc<dyn ListingRepository> = self.listing_repo.clone();
        let mut controller = PaginationController::new(
            self.session.clone(),
            extractor,
            TrafficCapture::new(sink),
            plan.crawl.clone(),
        )
        .with_repository(repository);
        let report = controller.run().await;
        let traffic_events = controller.capture().written();
        let SaveLedger {
            saved,
            failures: save_failures,
        } = controller.saves().clone();

        info!(
            "Crawl {}: {} page(s), {} item(s), {} saved, {} traffic event(s)",
            report.status,
            report.pages_visited,
            report.items_processed,
            saved.len(),
            traffic_events
        );

        Ok(CrawlOutcome {
            report,
            saved,
            save_failures,
            traffic_events,
        })
    }
}
