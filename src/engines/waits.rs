// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 有界等待与候选选择器查找
//!
//! 所有等待都轮询会话直到条件满足或超时，是爬取过程中唯一的阻塞点。

use crate::engines::traits::{BrowserError, BrowserSession, ElementHandle, Selector};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// 等待参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// 超时时间
    pub timeout: Duration,
    /// 轮询间隔
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl WaitOptions {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// 取当前超时与 `cap` 中较小者
    pub fn capped(self, cap: Duration) -> Self {
        Self {
            timeout: self.timeout.min(cap),
            ..self
        }
    }
}

async fn poll_until<T, F, Fut>(
    options: WaitOptions,
    what: impl FnOnce() -> String,
    mut probe: F,
) -> Result<T, BrowserError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, BrowserError>>,
{
    let deadline = Instant::now() + options.timeout;
    loop {
        if let Some(value) = probe().await? {
            return Ok(value);
        }
        if Instant::now() >= deadline {
            return Err(BrowserError::Timeout(format!(
                "{} after {:?}",
                what(),
                options.timeout
            )));
        }
        tokio::time::sleep(options.poll_interval).await;
    }
}

fn describe(candidates: &[Selector]) -> String {
    candidates
        .iter()
        .map(Selector::as_str)
        .collect::<Vec<_>>()
        .join(" | ")
}

/// 依次尝试候选选择器，返回第一个匹配
pub async fn find_first(
    session: &dyn BrowserSession,
    scope: Option<ElementHandle>,
    candidates: &[Selector],
) -> Result<Option<ElementHandle>, BrowserError> {
    for selector in candidates {
        if let Some(element) = session.find_one(scope, selector).await? {
            return Ok(Some(element));
        }
    }
    Ok(None)
}

/// 依次尝试候选选择器，返回第一个非空结果集
pub async fn find_all_first(
    session: &dyn BrowserSession,
    scope: Option<ElementHandle>,
    candidates: &[Selector],
) -> Result<Vec<ElementHandle>, BrowserError> {
    for selector in candidates {
        let elements = session.find_all(scope, selector).await?;
        if !elements.is_empty() {
            return Ok(elements);
        }
    }
    Ok(Vec::new())
}

/// 等待任一候选选择器出现匹配元素
pub async fn wait_for_present(
    session: &dyn BrowserSession,
    candidates: &[Selector],
    options: WaitOptions,
) -> Result<ElementHandle, BrowserError> {
    poll_until(
        options,
        || format!("presence of {}", describe(candidates)),
        move || find_first(session, None, candidates),
    )
    .await
}

/// 等待至少一个匹配元素出现，返回全部匹配
pub async fn wait_for_all_present(
    session: &dyn BrowserSession,
    candidates: &[Selector],
    options: WaitOptions,
) -> Result<Vec<ElementHandle>, BrowserError> {
    poll_until(
        options,
        || format!("presence of all {}", describe(candidates)),
        move || probe_all_present(session, candidates),
    )
    .await
}

/// 等待匹配元素变为可点击
///
/// 每次轮询都重新定位，因此查找期间的失效引用只算"尚未就绪"
pub async fn wait_for_clickable(
    session: &dyn BrowserSession,
    candidates: &[Selector],
    options: WaitOptions,
) -> Result<ElementHandle, BrowserError> {
    poll_until(
        options,
        || format!("clickable {}", describe(candidates)),
        move || probe_clickable(session, candidates),
    )
    .await
}

/// 等待已持有的元素变为可点击，元素失效时直接返回错误
pub async fn wait_until_interactable(
    session: &dyn BrowserSession,
    element: ElementHandle,
    options: WaitOptions,
) -> Result<(), BrowserError> {
    poll_until(
        options,
        || format!("{} to become interactable", element),
        move || probe_interactable(session, element),
    )
    .await
}

/// 等待元素失效，作为文档已被替换的证据
pub async fn wait_until_stale(
    session: &dyn BrowserSession,
    element: ElementHandle,
    options: WaitOptions,
) -> Result<(), BrowserError> {
    poll_until(
        options,
        || format!("staleness of {}", element),
        move || probe_stale(session, element),
    )
    .await
}

async fn probe_all_present(
    session: &dyn BrowserSession,
    candidates: &[Selector],
) -> Result<Option<Vec<ElementHandle>>, BrowserError> {
    let elements = find_all_first(session, None, candidates).await?;
    Ok((!elements.is_empty()).then_some(elements))
}

async fn probe_clickable(
    session: &dyn BrowserSession,
    candidates: &[Selector],
) -> Result<Option<ElementHandle>, BrowserError> {
    let Some(element) = find_first(session, None, candidates).await? else {
        return Ok(None);
    };
    match session.is_interactable(element).await {
        Ok(true) => Ok(Some(element)),
        Ok(false) | Err(BrowserError::StaleElement(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

async fn probe_interactable(
    session: &dyn BrowserSession,
    element: ElementHandle,
) -> Result<Option<()>, BrowserError> {
    Ok(session.is_interactable(element).await?.then_some(()))
}

async fn probe_stale(
    session: &dyn BrowserSession,
    element: ElementHandle,
) -> Result<Option<()>, BrowserError> {
    Ok(session.is_stale(element).await?.then_some(()))
}
