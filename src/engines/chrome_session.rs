// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::traffic::TrafficEvent;
use crate::engines::traits::{BrowserError, BrowserSession, ContextId, ElementHandle, Selector};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventRequestWillBeSent, EventResponseReceived,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use parking_lot::Mutex as SyncMutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const INTERACTABLE_JS: &str = r#"function() {
    if (!this.isConnected) { return false; }
    const rect = this.getBoundingClientRect();
    const style = window.getComputedStyle(this);
    return rect.width > 0 && rect.height > 0
        && style.visibility !== 'hidden'
        && style.display !== 'none'
        && !this.disabled;
}"#;

const DETACHED_JS: &str = "function() { return !this.isConnected; }";

// 返回遮挡元素中心点的节点描述，未被遮挡时返回空串
const HIT_TEST_JS: &str = r#"function() {
    this.scrollIntoView({ block: 'center', inline: 'center' });
    const rect = this.getBoundingClientRect();
    const hit = document.elementFromPoint(rect.left + rect.width / 2, rect.top + rect.height / 2);
    if (!hit || hit === this || this.contains(hit)) { return ''; }
    return hit.tagName.toLowerCase() + (hit.id ? '#' + hit.id : '');
}"#;

/// Chrome 启动选项
#[derive(Debug, Clone)]
pub struct ChromeLaunchOptions {
    /// 远程调试地址，设置时连接已有实例而不是启动新浏览器
    pub remote_debugging_url: Option<String>,
    /// 无头模式
    pub headless: bool,
    /// CDP 请求超时
    pub request_timeout: Duration,
}

impl Default for ChromeLaunchOptions {
    fn default() -> Self {
        Self {
            remote_debugging_url: std::env::var("CHROMIUM_REMOTE_DEBUGGING_URL").ok(),
            headless: false,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// 已发出的元素引用
///
/// 同一上下文中的同一DOM节点只登记一次，重复查找复用原有引用。
/// 上下文导航、关闭、元素失效或调用方释放时移除对应条目。
struct ElementRegistry<T> {
    entries: HashMap<ElementHandle, TrackedElement<T>>,
    by_node: HashMap<(ContextId, i64), ElementHandle>,
    next: u64,
}

struct TrackedElement<T> {
    context: ContextId,
    node: i64,
    element: T,
}

impl<T> Default for ElementRegistry<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            by_node: HashMap::new(),
            next: 0,
        }
    }
}

impl<T> ElementRegistry<T> {
    fn register(&mut self, context: ContextId, node: i64, element: T) -> ElementHandle {
        if let Some(handle) = self.by_node.get(&(context, node)) {
            return *handle;
        }
        self.next += 1;
        let handle = ElementHandle(self.next);
        self.entries.insert(
            handle,
            TrackedElement {
                context,
                node,
                element,
            },
        );
        self.by_node.insert((context, node), handle);
        handle
    }

    fn get(&self, handle: ElementHandle) -> Option<(ContextId, &T)> {
        self.entries
            .get(&handle)
            .map(|tracked| (tracked.context, &tracked.element))
    }

    fn remove(&mut self, handle: ElementHandle) {
        if let Some(tracked) = self.entries.remove(&handle) {
            self.by_node.remove(&(tracked.context, tracked.node));
        }
    }

    /// 移除上下文中的全部引用，返回移除的数量
    fn release_context(&mut self, context: ContextId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, tracked| tracked.context != context);
        self.by_node.retain(|(owner, _), _| *owner != context);
        before - self.entries.len()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Default)]
struct SessionState {
    pages: BTreeMap<ContextId, Page>,
    active: Option<ContextId>,
    elements: ElementRegistry<Element>,
    next_context: u64,
}

impl SessionState {
    fn active_page(&self) -> Result<(ContextId, &Page), BrowserError> {
        let active = self
            .active
            .ok_or_else(|| BrowserError::Other("no active context".to_string()))?;
        let page = self
            .pages
            .get(&active)
            .ok_or(BrowserError::NoSuchContext(active))?;
        Ok((active, page))
    }

    fn element(&self, handle: ElementHandle) -> Result<(ContextId, &Element), BrowserError> {
        self.elements
            .get(handle)
            .ok_or_else(|| BrowserError::StaleElement(format!("{} is no longer tracked", handle)))
    }

    fn add_page(&mut self, page: Page) -> ContextId {
        self.next_context += 1;
        let id = ContextId(self.next_context);
        self.pages.insert(id, page);
        id
    }
}

/// 基于 chromiumoxide 的浏览器会话
///
/// 每个上下文对应一个标签页，网络事件由后台任务缓冲，
/// `read_performance_log` 读取时清空缓冲区。
pub struct ChromeSession {
    browser: Mutex<Browser>,
    state: Mutex<SessionState>,
    traffic: Arc<SyncMutex<Vec<TrafficEvent>>>,
}

impl ChromeSession {
    /// 启动或连接浏览器，并打开第一个上下文
    pub async fn launch(options: &ChromeLaunchOptions) -> Result<Self, BrowserError> {
        let (browser, mut handler) = if let Some(ref url) = options.remote_debugging_url {
            tracing::info!("Connecting to remote Chrome instance at: {}", url);
            Browser::connect(url.as_str()).await.map_err(|e| {
                BrowserError::Other(format!("Failed to connect to remote Chrome: {}", e))
            })?
        } else {
            let mut builder = BrowserConfig::builder()
                .no_sandbox()
                .request_timeout(options.request_timeout)
                .arg("--disable-gpu")
                .arg("--disable-dev-shm-usage");
            if !options.headless {
                builder = builder.with_head();
            }
            let config = builder.build().map_err(BrowserError::Other)?;
            tracing::info!("Launching Chrome (headless: {})", options.headless);
            Browser::launch(config)
                .await
                .map_err(|e| BrowserError::Other(format!("Failed to launch Chrome: {}", e)))?
        };

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let session = Self {
            browser: Mutex::new(browser),
            state: Mutex::new(SessionState::default()),
            traffic: Arc::new(SyncMutex::new(Vec::new())),
        };
        let first = session.open_context().await?;
        session.switch_to(first).await?;
        Ok(session)
    }

    /// 关闭浏览器
    pub async fn shutdown(&self) -> Result<(), BrowserError> {
        self.state.lock().await.pages.clear();
        let mut browser = self.browser.lock().await;
        browser.close().await.map_err(map_cdp_error)?;
        if let Err(e) = browser.wait().await {
            tracing::debug!("Chrome process did not exit cleanly: {}", e);
        }
        Ok(())
    }

    async fn new_page(&self) -> Result<Page, BrowserError> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(map_cdp_error)?;
        page.execute(EnableParams::default())
            .await
            .map_err(map_cdp_error)?;
        self.record_network_events(&page).await?;
        Ok(page)
    }

    async fn record_network_events(&self, page: &Page) -> Result<(), BrowserError> {
        let mut requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(map_cdp_error)?;
        let buffer = self.traffic.clone();
        tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                let params = serde_json::to_value(&*event).unwrap_or_default();
                buffer.lock().push(TrafficEvent::from_monotonic_secs(
                    *event.timestamp.inner(),
                    "Network.requestWillBeSent",
                    params,
                ));
            }
        });

        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(map_cdp_error)?;
        let buffer = self.traffic.clone();
        tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                let params = serde_json::to_value(&*event).unwrap_or_default();
                buffer.lock().push(TrafficEvent::from_monotonic_secs(
                    *event.timestamp.inner(),
                    "Network.responseReceived",
                    params,
                ));
            }
        });
        Ok(())
    }

    async fn call_on(
        &self,
        element: ElementHandle,
        function: &str,
    ) -> Result<serde_json::Value, BrowserError> {
        let state = self.state.lock().await;
        let returns = state
            .element(element)?
            .1
            .call_js_fn(function, false)
            .await
            .map_err(map_cdp_error)?;
        Ok(returns.result.value.unwrap_or_default())
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let page = {
            let mut state = self.state.lock().await;
            let (context, page) = state.active_page()?;
            let page = page.clone();
            state.elements.release_context(context);
            page
        };
        tracing::debug!("Navigating to {}", url);
        page.goto(url).await.map_err(map_cdp_error)?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let state = self.state.lock().await;
        let url = state.active_page()?.1.url().await.map_err(map_cdp_error)?;
        Ok(url.unwrap_or_default())
    }

    async fn find_one(
        &self,
        scope: Option<ElementHandle>,
        selector: &Selector,
    ) -> Result<Option<ElementHandle>, BrowserError> {
        let found = self.find_all(scope, selector).await?;
        Ok(found.first().copied())
    }

    async fn find_all(
        &self,
        scope: Option<ElementHandle>,
        selector: &Selector,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        let mut state = self.state.lock().await;
        let (context, found) = match scope {
            Some(scope) => {
                let (context, element) = state.element(scope)?;
                (context, element.find_elements(selector.as_str()).await)
            }
            None => {
                let (context, page) = state.active_page()?;
                (context, page.find_elements(selector.as_str()).await)
            }
        };

        let elements = match found {
            Ok(elements) => elements,
            Err(e) => match map_cdp_error(e) {
                // 选择器无匹配时 CDP 报告节点不存在
                BrowserError::Protocol(msg) if msg.contains("Could not find node") => Vec::new(),
                other => return Err(other),
            },
        };
        Ok(elements
            .into_iter()
            .map(|element| {
                let node = *element.backend_node_id.inner();
                state.elements.register(context, node, element)
            })
            .collect())
    }

    async fn text(&self, element: ElementHandle) -> Result<String, BrowserError> {
        let state = self.state.lock().await;
        let text = state
            .element(element)?
            .1
            .inner_text()
            .await
            .map_err(map_cdp_error)?;
        Ok(text.unwrap_or_default())
    }

    async fn attribute(
        &self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        let state = self.state.lock().await;
        state
            .element(element)?
            .1
            .attribute(name)
            .await
            .map_err(map_cdp_error)
    }

    async fn is_interactable(&self, element: ElementHandle) -> Result<bool, BrowserError> {
        let value = self.call_on(element, INTERACTABLE_JS).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn is_stale(&self, element: ElementHandle) -> Result<bool, BrowserError> {
        let stale = match self.call_on(element, DETACHED_JS).await {
            Ok(value) => value.as_bool().unwrap_or(true),
            Err(BrowserError::StaleElement(_)) => true,
            Err(e) => return Err(e),
        };
        if stale {
            self.state.lock().await.elements.remove(element);
        }
        Ok(stale)
    }

    async fn click(&self, element: ElementHandle) -> Result<(), BrowserError> {
        let interceptor = self.call_on(element, HIT_TEST_JS).await?;
        if let Some(interceptor) = interceptor.as_str().filter(|s| !s.is_empty()) {
            return Err(BrowserError::ClickIntercepted(format!(
                "{} is covered by <{}>",
                element, interceptor
            )));
        }

        let state = self.state.lock().await;
        state
            .element(element)?
            .1
            .click()
            .await
            .map_err(map_cdp_error)?;
        Ok(())
    }

    async fn open_context(&self) -> Result<ContextId, BrowserError> {
        let page = self.new_page().await?;
        let id = self.state.lock().await.add_page(page);
        tracing::debug!("Opened {}", id);
        Ok(id)
    }

    async fn close_context(&self, context: ContextId) -> Result<(), BrowserError> {
        let page = {
            let mut state = self.state.lock().await;
            let page = state
                .pages
                .remove(&context)
                .ok_or(BrowserError::NoSuchContext(context))?;
            state.elements.release_context(context);
            if state.active == Some(context) {
                state.active = None;
            }
            page
        };
        page.close().await.map_err(map_cdp_error)?;
        tracing::debug!("Closed {}", context);
        Ok(())
    }

    async fn switch_to(&self, context: ContextId) -> Result<(), BrowserError> {
        let mut state = self.state.lock().await;
        let page = state
            .pages
            .get(&context)
            .ok_or(BrowserError::NoSuchContext(context))?;
        page.bring_to_front().await.map_err(map_cdp_error)?;
        state.active = Some(context);
        Ok(())
    }

    async fn active_context(&self) -> Result<ContextId, BrowserError> {
        self.state
            .lock()
            .await
            .active
            .ok_or_else(|| BrowserError::Other("no active context".to_string()))
    }

    async fn contexts(&self) -> Result<Vec<ContextId>, BrowserError> {
        Ok(self.state.lock().await.pages.keys().copied().collect())
    }

    async fn release_elements(&self, context: ContextId) -> Result<(), BrowserError> {
        let mut state = self.state.lock().await;
        let released = state.elements.release_context(context);
        tracing::debug!(
            "Released {} element handle(s) in {} ({} still tracked)",
            released,
            context,
            state.elements.len()
        );
        Ok(())
    }

    async fn read_performance_log(&self) -> Result<Vec<TrafficEvent>, BrowserError> {
        Ok(std::mem::take(&mut *self.traffic.lock()))
    }
}

/// 把 CDP 错误映射到会话错误分类
fn map_cdp_error(error: CdpError) -> BrowserError {
    if matches!(error, CdpError::Timeout) {
        return BrowserError::Timeout(error.to_string());
    }
    let message = error.to_string();
    classify_protocol_message(message)
}

fn classify_protocol_message(message: String) -> BrowserError {
    const STALE_MARKERS: [&str; 4] = [
        "No node with given id",
        "does not belong to the document",
        "Cannot find context with specified id",
        "Node is detached",
    ];
    const NOT_INTERACTABLE_MARKERS: [&str; 2] = ["not visible", "has no box model"];

    if STALE_MARKERS.iter().any(|marker| message.contains(marker)) {
        BrowserError::StaleElement(message)
    } else if NOT_INTERACTABLE_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
    {
        BrowserError::NotInteractable(message)
    } else {
        BrowserError::Protocol(message)
    }
}
