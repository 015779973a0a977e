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

use crate::domain::models::traffic::TrafficEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 浏览器错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrowserError {
    /// 元素引用已失效（文档被替换或变更）
    #[error("Stale element reference: {0}")]
    StaleElement(String),
    /// 元素暂不可交互
    #[error("Element not interactable: {0}")]
    NotInteractable(String),
    /// 点击被覆盖层拦截
    #[error("Click intercepted: {0}")]
    ClickIntercepted(String),
    /// 超时
    #[error("Timeout: {0}")]
    Timeout(String),
    /// 浏览上下文不存在
    #[error("No such context: {0}")]
    NoSuchContext(ContextId),
    /// 协议层错误
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

/// 错误分类
///
/// 决定错误在哪一层被消化：字段级、条目级还是分页级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 瞬时 DOM 错误，在出现的步骤上重试一次
    TransientDom,
    /// 有界等待超时
    Timeout,
    /// 交互被阻挡，本次运行内视为终止条件
    BlockedInteraction,
    /// 其他任何错误
    Unexpected,
}

impl BrowserError {
    /// 获取错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrowserError::StaleElement(_) | BrowserError::NotInteractable(_) => {
                ErrorKind::TransientDom
            }
            BrowserError::Timeout(_) => ErrorKind::Timeout,
            BrowserError::ClickIntercepted(_) => ErrorKind::BlockedInteraction,
            BrowserError::NoSuchContext(_) | BrowserError::Protocol(_) | BrowserError::Other(_) => {
                ErrorKind::Unexpected
            }
        }
    }

    /// 判断错误是否可重试
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientDom
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }
}

/// 元素句柄
///
/// 由会话分配的不透明标识，文档被替换后失效
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle(pub u64);

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

/// 浏览上下文标识（相当于一个标签页）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "context#{}", self.0)
    }
}

/// 元素定位描述（CSS 选择器）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selector(String);

impl Selector {
    pub fn new(css: impl Into<String>) -> Self {
        Self(css.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Selector {
    fn from(css: &str) -> Self {
        Self::new(css)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 浏览器会话特质
///
/// 爬取核心与浏览器之间的唯一边界。所有操作都针对当前活动上下文执行，
/// 会话的启动、关闭和能力协商不属于该接口。
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// 在活动上下文中打开URL
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// 活动上下文的当前URL
    async fn current_url(&self) -> Result<String, BrowserError>;

    /// 查找第一个匹配元素，`scope` 为空时在整个文档中查找
    async fn find_one(
        &self,
        scope: Option<ElementHandle>,
        selector: &Selector,
    ) -> Result<Option<ElementHandle>, BrowserError>;

    /// 按文档顺序查找全部匹配元素
    async fn find_all(
        &self,
        scope: Option<ElementHandle>,
        selector: &Selector,
    ) -> Result<Vec<ElementHandle>, BrowserError>;

    /// 元素的可见文本
    async fn text(&self, element: ElementHandle) -> Result<String, BrowserError>;

    /// 元素属性值
    async fn attribute(
        &self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError>;

    /// 元素是否可见且可点击
    async fn is_interactable(&self, element: ElementHandle) -> Result<bool, BrowserError>;

    /// 元素引用是否已失效
    async fn is_stale(&self, element: ElementHandle) -> Result<bool, BrowserError>;

    /// 点击元素
    async fn click(&self, element: ElementHandle) -> Result<(), BrowserError>;

    /// 打开新的隔离上下文（不切换）
    async fn open_context(&self) -> Result<ContextId, BrowserError>;

    /// 关闭指定上下文
    async fn close_context(&self, context: ContextId) -> Result<(), BrowserError>;

    /// 切换活动上下文
    async fn switch_to(&self, context: ContextId) -> Result<(), BrowserError>;

    /// 当前活动上下文
    async fn active_context(&self) -> Result<ContextId, BrowserError>;

    /// 所有打开的上下文
    async fn contexts(&self) -> Result<Vec<ContextId>, BrowserError>;

    /// 释放上下文中已发出的全部元素引用，之后这些引用视为失效
    async fn release_elements(&self, context: ContextId) -> Result<(), BrowserError>;

    /// 读取并清空已缓冲的网络事件
    async fn read_performance_log(&self) -> Result<Vec<TrafficEvent>, BrowserError>;
}
