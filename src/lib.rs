// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 组装完整的爬取流程
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 爬取核心
///
/// 分页控制器、详情导航器与流量捕获
pub mod crawler;

/// 领域模块
///
/// 房源、流量事件和爬取状态等实体，以及仓库接口
pub mod domain;

/// 引擎模块
///
/// 浏览器会话接口、有界等待和 Chrome 实现
pub mod engines;

/// 提取器模块
///
/// 列表页与详情页的字段提取，以及选择器目录
pub mod extractors;

/// 基础设施模块
///
/// 本地文件存储与流量日志
pub mod infrastructure;

/// 工具模块
pub mod utils;
