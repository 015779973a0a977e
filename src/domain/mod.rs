// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型
///
/// 房源摘要、详情、流量事件和爬取状态
pub mod models;

/// 仓库接口
///
/// 持久化与流量日志的外部协作方边界
pub mod repositories;
