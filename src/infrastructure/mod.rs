// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 领域仓库接口的本地实现：房源记录目录与 JSON Lines 流量日志
pub mod storage;
pub mod traffic_log;
