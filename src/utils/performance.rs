// 该文件是 Shanan （山南西风） 项目的一部分。
// src/utils/performance.rs - 性能统计
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::time::{Duration, Instant};

use tracing::debug;

pub const FPS_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

/// 窗口化 FPS 统计
///
/// 两次重算之间返回上一次的结果，不会归零。
#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
  anchor: Instant,
  counter: u32,
  current_fps: f64,
  interval: Duration,
}

impl Default for PerformanceMonitor {
  fn default() -> Self {
    Self::new()
  }
}

impl PerformanceMonitor {
  pub fn new() -> Self {
    Self::with_anchor(Instant::now())
  }

  pub fn with_anchor(anchor: Instant) -> Self {
    Self {
      anchor,
      counter: 0,
      current_fps: 0.0,
      interval: FPS_UPDATE_INTERVAL,
    }
  }

  pub fn update_fps(&mut self) -> f64 {
    self.update_fps_at(Instant::now())
  }

  pub fn update_fps_at(&mut self, now: Instant) -> f64 {
    self.counter += 1;
    let elapsed = now.saturating_duration_since(self.anchor);

    if elapsed >= self.interval {
      self.current_fps = self.counter as f64 / elapsed.as_secs_f64();
      debug!("FPS 更新: {:.2} ({} 帧 / {:.2?})", self.current_fps, self.counter, elapsed);
      self.counter = 0;
      self.anchor = now;
    }

    self.current_fps
  }

  pub fn fps(&self) -> f64 {
    self.current_fps
  }

  pub fn pending_frames(&self) -> u32 {
    self.counter
  }

  pub fn reset(&mut self) {
    self.anchor = Instant::now();
    self.counter = 0;
    self.current_fps = 0.0;
  }
}

/// 计时器
#[derive(Debug, Clone, Copy)]
pub struct Timer {
  start: Instant,
}

impl Timer {
  pub fn start() -> Self {
    Self {
      start: Instant::now(),
    }
  }

  pub fn elapsed_ms(&self) -> f64 {
    self.start.elapsed().as_secs_f64() * 1000.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fps_is_sticky_inside_window() {
    let anchor = Instant::now();
    let mut monitor = PerformanceMonitor::with_anchor(anchor);
    for i in 1..=30 {
      let fps = monitor.update_fps_at(anchor + Duration::from_millis(i * 10));
      assert_eq!(fps, 0.0);
    }
    assert_eq!(monitor.pending_frames(), 30);
  }

  #[test]
  fn fps_recomputed_after_interval() {
    let anchor = Instant::now();
    let mut monitor = PerformanceMonitor::with_anchor(anchor);
    for i in 1..=29 {
      monitor.update_fps_at(anchor + Duration::from_millis(i * 20));
    }
    let fps = monitor.update_fps_at(anchor + Duration::from_millis(1500));
    assert!((fps - 20.0).abs() < 1e-9);
    assert_eq!(monitor.pending_frames(), 0);

    // 新窗口内保持上一次的数值
    let fps = monitor.update_fps_at(anchor + Duration::from_millis(1600));
    assert!((fps - 20.0).abs() < 1e-9);
  }

  #[test]
  fn reset_clears_state() {
    let anchor = Instant::now();
    let mut monitor = PerformanceMonitor::with_anchor(anchor);
    monitor.update_fps_at(anchor + Duration::from_secs(2));
    assert!(monitor.fps() > 0.0);
    monitor.reset();
    assert_eq!(monitor.fps(), 0.0);
    assert_eq!(monitor.pending_frames(), 0);
  }
}
