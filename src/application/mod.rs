// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 把爬取核心、提取器和存储组装成完整的运行流程
pub mod use_cases;
