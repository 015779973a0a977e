// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::navigator::DetailNavigator;
use super::traffic_capture::TrafficCapture;
use crate::domain::models::crawl::{
    AbortReason, CrawlCursor, CrawlReport, CrawlStatus, DoneReason,
};
use crate::domain::models::listing::ListingDetail;
use crate::domain::repositories::listing_repository::ListingRepository;
use crate::domain::repositories::traffic_sink::TrafficSink;
use crate::engines::traits::{BrowserError, BrowserSession, ElementHandle, ErrorKind};
use crate::engines::waits::{self, WaitOptions};
use crate::extractors::selector_catalog::Field;
use crate::extractors::PageExtractor;
use crate::utils::retry_policy::RetryPolicy;
use metrics::counter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 爬取选项
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// 所有有界等待共用的参数
    pub wait: WaitOptions,
    /// 每次成功翻页后的固定延迟
    pub page_delay: Duration,
    /// 最多处理的页数
    pub max_pages: Option<u32>,
    /// 控件失效时重新定位的次数
    pub stale_retries: u32,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            wait: WaitOptions::default(),
            page_delay: Duration::from_secs(1),
            max_pages: None,
            stale_retries: 1,
        }
    }
}

/// 分页状态机
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlState {
    Scraping(CrawlCursor),
    Paginating(CrawlCursor),
    Done(DoneReason),
    Aborted(AbortReason),
}

/// 逐条保存的结果
#[derive(Debug, Clone, Default)]
pub struct SaveLedger {
    /// 成功保存的记录位置
    pub saved: Vec<PathBuf>,
    /// 保存失败的记录数
    pub failures: usize,
}

/// 翻页结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Advance {
    Moved,
    NoControl,
}

/// 分页控制器
///
/// 逐页提取卡片，把每张卡片交给详情导航器，再推进到下一页，
/// 直到目录耗尽或翻页失败。页按顺序处理，卡片按DOM顺序处理，不并发。
pub struct PaginationController<S> {
    session: Arc<dyn BrowserSession>,
    extractor: PageExtractor,
    navigator: DetailNavigator,
    capture: TrafficCapture<S>,
    repository: Option<Arc<dyn ListingRepository>>,
    saves: SaveLedger,
    retry: RetryPolicy,
    options: CrawlOptions,
}

impl<S: TrafficSink> PaginationController<S> {
    pub fn new(
        session: Arc<dyn BrowserSession>,
        extractor: PageExtractor,
        capture: TrafficCapture<S>,
        options: CrawlOptions,
    ) -> Self {
        let navigator = DetailNavigator::new(
            session.clone(),
            extractor.clone(),
            options.wait.timeout,
        );
        Self {
            session,
            extractor,
            navigator,
            capture,
            repository: None,
            saves: SaveLedger::default(),
            retry: RetryPolicy::pagination(options.stale_retries),
            options,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 每条记录产生后立即写入仓库
    pub fn with_repository(mut self, repository: Arc<dyn ListingRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn saves(&self) -> &SaveLedger {
        &self.saves
    }

    pub fn capture(&self) -> &TrafficCapture<S> {
        &self.capture
    }

    pub fn into_capture(self) -> TrafficCapture<S> {
        self.capture
    }

    /// 运行到终止状态，返回累积的记录和结束原因
    pub async fn run(&mut self) -> CrawlReport {
        let mut listings = Vec::new();
        let mut cursor = CrawlCursor::start();
        let mut state = CrawlState::Scraping(cursor);

        self.capture_traffic().await;

        let status = loop {
            state = match state {
                CrawlState::Scraping(page) => {
                    cursor = page;
                    self.scrape_page(page, &mut listings).await
                }
                CrawlState::Paginating(page) => self.paginate(page).await,
                CrawlState::Done(reason) => break CrawlStatus::Completed(reason),
                CrawlState::Aborted(reason) => break CrawlStatus::Aborted(reason),
            };
        };

        info!(
            "Crawl finished after {} page(s) and {} item(s): {}",
            cursor.page_number,
            listings.len(),
            status
        );

        CrawlReport {
            status,
            pages_visited: cursor.page_number,
            items_processed: listings.len(),
            listings,
        }
    }

    async fn scrape_page(
        &mut self,
        page: CrawlCursor,
        listings: &mut Vec<ListingDetail>,
    ) -> CrawlState {
        info!("Scraping page: {}", page.page_number);
        counter!("staycrawl_pages_visited_total").increment(1);

        let cards = self.extractor.listing_cards().await;
        if cards.is_empty() {
            info!(
                "No listings found on page {}, ending scraping",
                page.page_number
            );
            return CrawlState::Done(DoneReason::CatalogExhausted);
        }

        for (index, card) in cards.iter().enumerate() {
            debug!(
                "Page {} card {}/{}: {}",
                page.page_number,
                index + 1,
                cards.len(),
                card.title
            );
            let detail = self.navigator.fetch(card, page.page_number).await;
            self.persist(&detail).await;
            listings.push(detail);
            counter!("staycrawl_listings_processed_total").increment(1);
            self.capture_traffic().await;
        }

        if self
            .options
            .max_pages
            .is_some_and(|max| page.page_number >= max)
        {
            info!("Reached page limit at page {}", page.page_number);
            return CrawlState::Done(DoneReason::PageLimitReached);
        }

        CrawlState::Paginating(page)
    }

    async fn paginate(&mut self, page: CrawlCursor) -> CrawlState {
        match self.locate_and_advance().await {
            Ok(Advance::Moved) => {
                let next = page.next();
                info!("Navigated to page {} successfully", next.page_number);
                self.release_page_elements().await;
                self.capture_traffic().await;
                if !self.options.page_delay.is_zero() {
                    tokio::time::sleep(self.options.page_delay).await;
                }
                CrawlState::Scraping(next)
            }
            Ok(Advance::NoControl) => {
                info!("No next button found on page {}, end of pagination", page.page_number);
                CrawlState::Done(DoneReason::NextControlNotFound)
            }
            Err(reason) => {
                warn!(
                    "Pagination from page {} aborted: {}",
                    page.page_number, reason
                );
                CrawlState::Aborted(reason)
            }
        }
    }

    /// 定位下一页控件并翻页
    ///
    /// 控件引用失效时重新定位并重试，次数由重试策略决定；
    /// 点击被拦截、等待超时或其他错误都直接终止。
    async fn locate_and_advance(&self) -> Result<Advance, AbortReason> {
        let mut attempt = 0;
        loop {
            let Some(control) = self.extractor.next_page_control().await else {
                return Ok(Advance::NoControl);
            };

            let error = match self.click_and_wait(control).await {
                Ok(()) => return Ok(Advance::Moved),
                Err(error) => error,
            };

            match error.kind() {
                ErrorKind::TransientDom if self.retry.should_retry_with_error(attempt, &error) => {
                    attempt += 1;
                    warn!(
                        "{} while paginating, locating next button again (retry {}/{})",
                        error, attempt, self.retry.max_retries
                    );
                    tokio::time::sleep(self.retry.calculate_backoff(attempt)).await;
                }
                ErrorKind::TransientDom => return Err(AbortReason::StaleRetryExhausted),
                ErrorKind::BlockedInteraction => return Err(AbortReason::ClickIntercepted),
                ErrorKind::Timeout => return Err(AbortReason::NavigationTimeout),
                ErrorKind::Unexpected => return Err(AbortReason::Unexpected(error.to_string())),
            }
        }
    }

    /// 点击控件并等待新页面渲染
    ///
    /// 旧的第一张卡片失效证明文档已被替换，新的第一张卡片出现证明新页已渲染。
    /// 只有失效等待超时才算翻页超时。
    async fn click_and_wait(&self, control: ElementHandle) -> Result<(), BrowserError> {
        let session = self.session.as_ref();
        let cards = self.extractor.catalog().candidates(Field::CardContainer);
        let wait = self.options.wait;

        let first_card = waits::find_first(session, None, cards).await?;
        waits::wait_until_interactable(session, control, wait).await?;
        session.click(control).await?;

        if let Some(first_card) = first_card {
            waits::wait_until_stale(session, first_card, wait).await?;
        }
        // 文档已替换；新页没有卡片时交给下一轮提取判定目录结束
        match waits::wait_for_present(session, cards, wait).await {
            Ok(_) => Ok(()),
            Err(BrowserError::Timeout(_)) => {
                debug!("No listing cards rendered after pagination");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn persist(&mut self, listing: &ListingDetail) {
        let Some(repository) = &self.repository else {
            return;
        };
        debug!(
            "Page {}: {} | {} | {} photo(s) | rating {}",
            listing.page_number,
            listing.summary.title,
            listing.summary.location,
            listing.photos.len(),
            listing.rating
        );
        match repository.save(listing).await {
            Ok(location) => self.saves.saved.push(location),
            Err(e) => {
                self.saves.failures += 1;
                warn!("Failed to save listing {}: {}", listing.detail_url(), e);
            }
        }
    }

    /// 旧页面的元素引用在翻页后全部作废
    async fn release_page_elements(&self) {
        let released = match self.session.active_context().await {
            Ok(context) => self.session.release_elements(context).await,
            Err(e) => Err(e),
        };
        if let Err(e) = released {
            debug!("Could not release element handles: {}", e);
        }
    }

    async fn capture_traffic(&mut self) {
        if let Err(e) = self.capture.capture(self.session.as_ref()).await {
            warn!("Traffic capture failed: {}", e);
        }
    }
}
