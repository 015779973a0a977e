// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use serde_json::json;
use staycrawl::domain::models::traffic::TrafficEvent;
use staycrawl::engines::traits::{BrowserError, BrowserSession, ContextId, ElementHandle, Selector};
use staycrawl::extractors::selector_catalog::{Field, SelectorCatalog};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

pub const START_URL: &str = "https://www.airbnb.fr/s/Paris/homes";

/// 字段的内置首选选择器
pub fn css(field: Field) -> String {
    SelectorCatalog::builtin()
        .primary(field)
        .map(|s| s.as_str().to_string())
        .unwrap_or_default()
}

/// 脚本化的 DOM 节点，按选择器字符串精确匹配
#[derive(Debug, Clone, Default)]
pub struct FakeNode {
    selectors: Vec<String>,
    text: String,
    attrs: HashMap<String, String>,
    interactable: bool,
    next_page: bool,
    children: Vec<FakeNode>,
}

impl FakeNode {
    pub fn new(field: Field) -> Self {
        Self::with_selector(&css(field))
    }

    pub fn with_selector(selector: &str) -> Self {
        Self {
            selectors: vec![selector.to_string()],
            interactable: true,
            ..Default::default()
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn also(mut self, field: Field) -> Self {
        self.selectors.push(css(field));
        self
    }

    pub fn hidden(mut self) -> Self {
        self.interactable = false;
        self
    }

    pub fn child(mut self, child: FakeNode) -> Self {
        self.children.push(child);
        self
    }

    fn matches(&self, selector: &Selector) -> bool {
        self.selectors.iter().any(|s| s == selector.as_str())
    }
}

/// 一份文档：若干根节点
#[derive(Debug, Clone, Default)]
pub struct FakeDoc {
    pub roots: Vec<FakeNode>,
}

impl FakeDoc {
    pub fn new(roots: Vec<FakeNode>) -> Self {
        Self { roots }
    }

    fn node(&self, path: &[usize]) -> Option<&FakeNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.roots.get(*first)?;
        for index in rest {
            node = node.children.get(*index)?;
        }
        Some(node)
    }
}

/// 列表卡片
pub fn card(id: u32, title: &str) -> FakeNode {
    FakeNode::new(Field::CardContainer)
        .child(FakeNode::new(Field::CardTitle).text(title))
        .child(FakeNode::new(Field::CardHost).text(&format!("Hôte {}", id)))
        .child(FakeNode::new(Field::CardPrice).text(&format!("{} € par nuit", 80 + id)))
        .child(FakeNode::new(Field::CardImage).attr("src", &format!("https://img/{}/main.jpg", id)))
        .child(FakeNode::new(Field::CardLink).attr("href", &detail_path(id)))
}

pub fn detail_path(id: u32) -> String {
    format!("/rooms/{}", id)
}

pub fn detail_url(id: u32) -> String {
    format!("https://www.airbnb.fr/rooms/{}", id)
}

pub fn next_control() -> FakeNode {
    let mut node = FakeNode::new(Field::NextPage).text("Suivant");
    node.next_page = true;
    node
}

/// 列表页：若干卡片，可选下一页控件
pub fn listing_page(ids: &[u32], with_next: bool) -> FakeDoc {
    let mut roots: Vec<FakeNode> = ids.iter().map(|id| card(*id, &format!("Logement {}", id))).collect();
    if with_next {
        roots.push(next_control());
    }
    FakeDoc::new(roots)
}

/// 完整的详情页
pub fn detail_page(id: u32) -> FakeDoc {
    FakeDoc::new(vec![
        FakeNode::new(Field::Description).text(&format!("Description du logement {}", id)),
        FakeNode::new(Field::Location).text("Paris, Île-de-France"),
        FakeNode::new(Field::ShowAllPhotos).text("Afficher toutes les photos"),
        FakeNode::new(Field::GalleryImage)
            .attr("aria-label", "Salon")
            .attr("src", &format!("https://img/{}/1.jpg", id)),
        FakeNode::new(Field::GalleryImage)
            .attr("aria-label", "Photo de profil de l'hôte")
            .attr("src", "https://img/host.jpg"),
        FakeNode::new(Field::GalleryImage)
            .attr("aria-label", "Chambre")
            .attr("src", &format!("https://img/{}/2.jpg", id)),
        FakeNode::new(Field::GalleryImage)
            .attr("aria-label", "")
            .attr("src", "https://img/placeholder.jpg"),
        FakeNode::new(Field::GalleryClose),
        FakeNode::new(Field::Comment).text("  Super séjour  "),
        FakeNode::new(Field::Comment).text("   "),
        FakeNode::new(Field::Comment).text("Très propre"),
        FakeNode::new(Field::RatingContainer)
            .child(FakeNode::new(Field::RatingValue).attr("aria-label", "Note de 4,92 sur 5")),
    ])
}

/// 点击下一页控件时的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextClick {
    /// 加载下一份列表页
    Navigate,
    /// 点击被覆盖层拦截
    Intercept,
    /// 第一次点击报告失效，之后正常翻页
    StaleOnce,
    /// 每次点击都报告失效
    StaleAlways,
    /// 点击成功但页面不变
    Frozen,
    /// 点击报告协议错误
    Error,
    /// 第一次点击报告失效，且重新渲染后的页面没有下一页控件
    StaleThenGone,
}

#[derive(Debug, Clone)]
struct FakeContext {
    url: String,
    doc: FakeDoc,
    generation: u64,
    catalog_index: Option<usize>,
}

impl FakeContext {
    fn blank() -> Self {
        Self {
            url: "about:blank".to_string(),
            doc: FakeDoc::default(),
            generation: 0,
            catalog_index: None,
        }
    }
}

#[derive(Debug, Clone)]
struct HandleRef {
    context: ContextId,
    generation: u64,
    path: Vec<usize>,
}

struct FakeState {
    catalog: Vec<FakeDoc>,
    details: HashMap<String, FakeDoc>,
    contexts: BTreeMap<ContextId, FakeContext>,
    active: Option<ContextId>,
    handles: HashMap<ElementHandle, HandleRef>,
    next_context: u64,
    next_handle: u64,
    next_click: NextClick,
    stale_clicks: u32,
    failing_selectors: HashSet<String>,
    panicking_selectors: HashSet<String>,
    failing_navigations: HashSet<String>,
    hanging_navigations: HashSet<String>,
    traffic: Vec<TrafficEvent>,
    clock: i64,
    clicks: u32,
    next_clicks: u32,
    navigations: Vec<String>,
    max_open_contexts: usize,
    element_releases: u32,
}

/// 内存中的浏览器会话
pub struct FakeBrowser {
    state: Mutex<FakeState>,
}

impl FakeBrowser {
    pub fn new(catalog: Vec<FakeDoc>) -> Self {
        let mut contexts = BTreeMap::new();
        contexts.insert(ContextId(1), FakeContext::blank());
        Self {
            state: Mutex::new(FakeState {
                catalog,
                details: HashMap::new(),
                contexts,
                active: Some(ContextId(1)),
                handles: HashMap::new(),
                next_context: 1,
                next_handle: 0,
                next_click: NextClick::Navigate,
                stale_clicks: 0,
                failing_selectors: HashSet::new(),
                panicking_selectors: HashSet::new(),
                failing_navigations: HashSet::new(),
                hanging_navigations: HashSet::new(),
                traffic: Vec::new(),
                clock: 1_000,
                clicks: 0,
                next_clicks: 0,
                navigations: Vec::new(),
                max_open_contexts: 1,
                element_releases: 0,
            }),
        }
    }

    pub fn with_detail(self, url: &str, doc: FakeDoc) -> Self {
        self.lock().details.insert(url.to_string(), doc);
        self
    }

    /// 为 `ids` 中每个房源注册完整详情页
    pub fn with_details(self, ids: &[u32]) -> Self {
        {
            let mut state = self.lock();
            for id in ids {
                state.details.insert(detail_url(*id), detail_page(*id));
            }
        }
        self
    }

    pub fn with_next_click(self, mode: NextClick) -> Self {
        self.lock().next_click = mode;
        self
    }

    pub fn fail_selector(&self, field: Field) {
        self.lock().failing_selectors.insert(css(field));
    }

    pub fn panic_on_selector(&self, field: Field) {
        self.lock().panicking_selectors.insert(css(field));
    }

    pub fn fail_navigation(&self, url: &str) {
        self.lock().failing_navigations.insert(url.to_string());
    }

    pub fn hang_navigation(&self, url: &str) {
        self.lock().hanging_navigations.insert(url.to_string());
    }

    /// 直接在活动上下文中加载列表页，不经过导航
    pub fn load_catalog_page(&self, index: usize) {
        let mut state = self.lock();
        let doc = state.catalog.get(index).cloned().unwrap_or_default();
        let active = state.active.unwrap_or(ContextId(1));
        if let Some(context) = state.contexts.get_mut(&active) {
            context.url = catalog_url(index);
            context.doc = doc;
            context.generation += 1;
            context.catalog_index = Some(index);
        }
    }

    pub fn push_traffic(&self, events: Vec<TrafficEvent>) {
        self.lock().traffic.extend(events);
    }

    pub fn open_context_count(&self) -> usize {
        self.lock().contexts.len()
    }

    pub fn max_open_contexts(&self) -> usize {
        self.lock().max_open_contexts
    }

    pub fn active(&self) -> Option<ContextId> {
        self.lock().active
    }

    pub fn click_count(&self) -> u32 {
        self.lock().clicks
    }

    pub fn next_click_count(&self) -> u32 {
        self.lock().next_clicks
    }

    /// 仍被跟踪的元素引用数
    pub fn tracked_handle_count(&self) -> usize {
        self.lock().handles.len()
    }

    pub fn element_release_count(&self) -> u32 {
        self.lock().element_releases
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_selector(&self, selector: &Selector) -> Result<(), BrowserError> {
        let (fail, panic) = {
            let state = self.lock();
            (
                state.failing_selectors.contains(selector.as_str()),
                state.panicking_selectors.contains(selector.as_str()),
            )
        };
        if panic {
            panic!("scripted panic on selector {}", selector);
        }
        if fail {
            return Err(BrowserError::Protocol(format!(
                "scripted failure on selector {}",
                selector
            )));
        }
        Ok(())
    }
}

fn catalog_url(index: usize) -> String {
    if index == 0 {
        START_URL.to_string()
    } else {
        format!("{}?page={}", START_URL, index + 1)
    }
}

impl FakeState {
    fn active_id(&self) -> Result<ContextId, BrowserError> {
        self.active
            .ok_or_else(|| BrowserError::Other("no active context".to_string()))
    }

    fn active_context(&mut self) -> Result<&mut FakeContext, BrowserError> {
        let id = self.active_id()?;
        self.contexts
            .get_mut(&id)
            .ok_or(BrowserError::NoSuchContext(id))
    }

    fn record(&mut self, method: &str, params: serde_json::Value) {
        self.clock += 1;
        self.traffic
            .push(TrafficEvent::new(self.clock, method, params));
    }

    fn resolve(&self, handle: ElementHandle) -> Result<(&FakeContext, &FakeNode, &HandleRef), BrowserError> {
        let stale = || BrowserError::StaleElement(format!("{} is detached", handle));
        let handle_ref = self.handles.get(&handle).ok_or_else(stale)?;
        let context = self.contexts.get(&handle_ref.context).ok_or_else(stale)?;
        if context.generation != handle_ref.generation {
            return Err(stale());
        }
        let node = context.doc.node(&handle_ref.path).ok_or_else(stale)?;
        Ok((context, node, handle_ref))
    }

    fn issue(&mut self, context: ContextId, generation: u64, path: Vec<usize>) -> ElementHandle {
        self.next_handle += 1;
        let handle = ElementHandle(self.next_handle);
        self.handles.insert(
            handle,
            HandleRef {
                context,
                generation,
                path,
            },
        );
        handle
    }

    fn forget_handles(&mut self, context: ContextId) {
        self.handles.retain(|_, handle_ref| handle_ref.context != context);
    }

    /// 重新渲染活动页并移除下一页控件
    fn drop_next_control(&mut self) -> Result<(), BrowserError> {
        let context = self.active_context()?;
        context.doc.roots.retain(|node| !node.next_page);
        context.generation += 1;
        Ok(())
    }

    fn load(&mut self, url: &str) -> Result<(), BrowserError> {
        let (doc, catalog_index) = if url == START_URL {
            (self.catalog.first().cloned().unwrap_or_default(), Some(0))
        } else {
            (self.details.get(url).cloned().unwrap_or_default(), None)
        };
        let context = self.active_context()?;
        context.url = url.to_string();
        context.doc = doc;
        context.generation += 1;
        context.catalog_index = catalog_index;
        Ok(())
    }

    fn advance_catalog(&mut self) -> Result<(), BrowserError> {
        let context = self.active_context()?;
        let next = context.catalog_index.map_or(0, |index| index + 1);
        let doc = self.catalog.get(next).cloned().unwrap_or_default();
        let context = self.active_context()?;
        context.url = catalog_url(next);
        context.doc = doc;
        context.generation += 1;
        context.catalog_index = Some(next);
        self.record("Network.requestWillBeSent", json!({ "url": catalog_url(next) }));
        Ok(())
    }
}

fn collect(nodes: &[FakeNode], prefix: &mut Vec<usize>, selector: &Selector, out: &mut Vec<Vec<usize>>) {
    for (index, node) in nodes.iter().enumerate() {
        prefix.push(index);
        if node.matches(selector) {
            out.push(prefix.clone());
        }
        collect(&node.children, prefix, selector, out);
        prefix.pop();
    }
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let hang = {
            let mut state = self.lock();
            state.navigations.push(url.to_string());
            if state.failing_navigations.contains(url) {
                return Err(BrowserError::Protocol(format!("net::ERR_FAILED loading {}", url)));
            }
            state.hanging_navigations.contains(url)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        let mut state = self.lock();
        let active = state.active_id()?;
        state.forget_handles(active);
        state.load(url)?;
        state.record("Network.requestWillBeSent", json!({ "url": url }));
        state.record("Network.responseReceived", json!({ "url": url, "status": 200 }));
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        let mut state = self.lock();
        Ok(state.active_context()?.url.clone())
    }

    async fn find_one(
        &self,
        scope: Option<ElementHandle>,
        selector: &Selector,
    ) -> Result<Option<ElementHandle>, BrowserError> {
        Ok(self.find_all(scope, selector).await?.into_iter().next())
    }

    async fn find_all(
        &self,
        scope: Option<ElementHandle>,
        selector: &Selector,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        self.check_selector(selector)?;
        let mut state = self.lock();

        let (context_id, generation, base, paths) = match scope {
            Some(scope) => {
                let (context, node, handle_ref) = state.resolve(scope)?;
                let mut found = Vec::new();
                collect(&node.children, &mut Vec::new(), selector, &mut found);
                (handle_ref.context, context.generation, handle_ref.path.clone(), found)
            }
            None => {
                let id = state.active_id()?;
                let context = state.contexts.get(&id).ok_or(BrowserError::NoSuchContext(id))?;
                let mut found = Vec::new();
                collect(&context.doc.roots, &mut Vec::new(), selector, &mut found);
                (id, context.generation, Vec::new(), found)
            }
        };

        Ok(paths
            .into_iter()
            .map(|path| {
                let mut full = base.clone();
                full.extend(path);
                state.issue(context_id, generation, full)
            })
            .collect())
    }

    async fn text(&self, element: ElementHandle) -> Result<String, BrowserError> {
        let state = self.lock();
        let (_, node, _) = state.resolve(element)?;
        Ok(node.text.clone())
    }

    async fn attribute(
        &self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        let state = self.lock();
        let (_, node, _) = state.resolve(element)?;
        Ok(node.attrs.get(name).cloned())
    }

    async fn is_interactable(&self, element: ElementHandle) -> Result<bool, BrowserError> {
        let state = self.lock();
        let (_, node, _) = state.resolve(element)?;
        Ok(node.interactable)
    }

    async fn is_stale(&self, element: ElementHandle) -> Result<bool, BrowserError> {
        Ok(self.lock().resolve(element).is_err())
    }

    async fn click(&self, element: ElementHandle) -> Result<(), BrowserError> {
        let mut state = self.lock();
        let next_page = {
            let (_, node, _) = state.resolve(element)?;
            if !node.interactable {
                return Err(BrowserError::NotInteractable(format!("{} is hidden", element)));
            }
            node.next_page
        };
        state.clicks += 1;
        if !next_page {
            return Ok(());
        }

        state.next_clicks += 1;
        let mode = state.next_click;
        match mode {
            NextClick::Navigate => state.advance_catalog(),
            NextClick::Intercept => Err(BrowserError::ClickIntercepted(
                "covered by div#cookie-banner".to_string(),
            )),
            NextClick::StaleOnce if state.stale_clicks == 0 => {
                state.stale_clicks += 1;
                Err(BrowserError::StaleElement(format!("{} re-rendered", element)))
            }
            NextClick::StaleOnce => state.advance_catalog(),
            NextClick::StaleAlways => {
                state.stale_clicks += 1;
                Err(BrowserError::StaleElement(format!("{} re-rendered", element)))
            }
            NextClick::Frozen => Ok(()),
            NextClick::Error => Err(BrowserError::Protocol(
                "Target crashed while dispatching click".to_string(),
            )),
            NextClick::StaleThenGone => {
                state.stale_clicks += 1;
                state.drop_next_control()?;
                Err(BrowserError::StaleElement(format!("{} re-rendered", element)))
            }
        }
    }

    async fn open_context(&self) -> Result<ContextId, BrowserError> {
        let mut state = self.lock();
        state.next_context += 1;
        let id = ContextId(state.next_context);
        state.contexts.insert(id, FakeContext::blank());
        state.max_open_contexts = state.max_open_contexts.max(state.contexts.len());
        Ok(id)
    }

    async fn close_context(&self, context: ContextId) -> Result<(), BrowserError> {
        let mut state = self.lock();
        state
            .contexts
            .remove(&context)
            .ok_or(BrowserError::NoSuchContext(context))?;
        state.forget_handles(context);
        if state.active == Some(context) {
            state.active = None;
        }
        Ok(())
    }

    async fn switch_to(&self, context: ContextId) -> Result<(), BrowserError> {
        let mut state = self.lock();
        if !state.contexts.contains_key(&context) {
            return Err(BrowserError::NoSuchContext(context));
        }
        state.active = Some(context);
        Ok(())
    }

    async fn active_context(&self) -> Result<ContextId, BrowserError> {
        self.lock().active_id()
    }

    async fn contexts(&self) -> Result<Vec<ContextId>, BrowserError> {
        Ok(self.lock().contexts.keys().copied().collect())
    }

    async fn release_elements(&self, context: ContextId) -> Result<(), BrowserError> {
        let mut state = self.lock();
        state.forget_handles(context);
        state.element_releases += 1;
        Ok(())
    }

    async fn read_performance_log(&self) -> Result<Vec<TrafficEvent>, BrowserError> {
        Ok(std::mem::take(&mut self.lock().traffic))
    }
}
