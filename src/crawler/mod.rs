// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 爬取核心：分页控制器、详情导航器与流量捕获

pub mod controller;
pub mod navigator;
pub mod traffic_capture;

pub use controller::{CrawlOptions, CrawlState, PaginationController, SaveLedger};
pub use navigator::{DetailContext, DetailNavigator};
pub use traffic_capture::{CaptureError, TrafficCapture};
