// 该文件是 Shanan （山南西风） 项目的一部分。
// src/config.rs - 运行时配置
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

use std::ops::RangeInclusive;

use tracing::warn;

pub const CONFIDENCE_RANGE: RangeInclusive<f32> = 0.1..=0.9;
pub const FRAME_SKIP_RANGE: RangeInclusive<u32> = 0..=5;

pub const DEFAULT_CONFIDENCE: f32 = 0.5;
pub const DANGER_DISTANCE: f32 = 5.0;
pub const WARNING_DISTANCE: f32 = 10.0;

/// 运行时开关
///
/// 由使用方（界面、命令行）修改，处理线程在每次迭代开始时取一份快照。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
  /// 是否启用目标检测
  pub detection_enabled: bool,
  /// 是否启用实例分割叠加
  pub segmentation_enabled: bool,
  /// 是否启用车道检测
  pub lane_detection_enabled: bool,
  /// 是否绘制标签
  pub show_labels: bool,
  /// 标签中是否附带距离
  pub show_distance: bool,
  /// 置信度阈值，限定在 [0.1, 0.9]
  confidence_threshold: f32,
  /// 跳帧数，限定在 [0, 5]
  frame_skip: u32,
  /// 危险距离阈值（米）
  pub danger_threshold: f32,
  /// 警告距离阈值（米）
  pub warning_threshold: f32,
  /// 是否按源帧率节流
  pub realtime: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      detection_enabled: true,
      segmentation_enabled: false,
      lane_detection_enabled: true,
      show_labels: true,
      show_distance: true,
      confidence_threshold: DEFAULT_CONFIDENCE,
      frame_skip: 0,
      danger_threshold: DANGER_DISTANCE,
      warning_threshold: WARNING_DISTANCE,
      realtime: true,
    }
  }
}

impl Config {
  pub fn confidence_threshold(&self) -> f32 {
    self.confidence_threshold
  }

  pub fn frame_skip(&self) -> u32 {
    self.frame_skip
  }

  pub fn set_confidence_threshold(&mut self, value: f32) {
    if !value.is_finite() {
      warn!("置信度阈值 {} 无效，已调整为 {}", value, DEFAULT_CONFIDENCE);
      self.confidence_threshold = DEFAULT_CONFIDENCE;
      return;
    }
    let clamped = value.clamp(*CONFIDENCE_RANGE.start(), *CONFIDENCE_RANGE.end());
    if clamped != value {
      warn!("置信度阈值 {} 超出范围，已调整为 {}", value, clamped);
    }
    self.confidence_threshold = clamped;
  }

  pub fn set_frame_skip(&mut self, value: u32) {
    let clamped = value.min(*FRAME_SKIP_RANGE.end());
    if clamped != value {
      warn!("跳帧数 {} 超出范围，已调整为 {}", value, clamped);
    }
    self.frame_skip = clamped;
  }

  pub fn with_confidence_threshold(mut self, value: f32) -> Self {
    self.set_confidence_threshold(value);
    self
  }

  pub fn with_frame_skip(mut self, value: u32) -> Self {
    self.set_frame_skip(value);
    self
  }

  pub fn with_detection(mut self, enabled: bool) -> Self {
    self.detection_enabled = enabled;
    self
  }

  pub fn with_segmentation(mut self, enabled: bool) -> Self {
    self.segmentation_enabled = enabled;
    self
  }

  pub fn with_lane_detection(mut self, enabled: bool) -> Self {
    self.lane_detection_enabled = enabled;
    self
  }

  pub fn with_danger_threshold(mut self, meters: f32) -> Self {
    self.danger_threshold = meters;
    self
  }

  pub fn with_realtime(mut self, realtime: bool) -> Self {
    self.realtime = realtime;
    self
  }
}

/// 车道检测参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneConfig {
  pub canny_low: f32,
  pub canny_high: f32,
  pub hough_rho: f64,
  pub hough_threshold: u32,
  pub min_line_length: u32,
  pub max_line_gap: u32,
  /// 低于该斜率绝对值的线段视为水平噪声
  pub min_slope: f64,
  pub roi_top: f64,
  pub roi_left: f64,
  pub roi_right: f64,
  /// 车道偏离的像素阈值
  pub offset_threshold: i32,
}

impl Default for LaneConfig {
  fn default() -> Self {
    Self {
      canny_low: 50.0,
      canny_high: 150.0,
      hough_rho: 2.0,
      hough_threshold: 50,
      min_line_length: 40,
      max_line_gap: 150,
      min_slope: 0.5,
      roi_top: 0.6,
      roi_left: 0.1,
      roi_right: 0.9,
      offset_threshold: 50,
    }
  }
}

/// 单目测距参数（针孔相机近似）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceConfig {
  /// 焦距（像素）
  pub focal_length: f32,
  /// 目标的已知宽度（米）
  pub known_width: f32,
}

impl Default for DistanceConfig {
  fn default() -> Self {
    Self {
      focal_length: 800.0,
      known_width: 1.8,
    }
  }
}
