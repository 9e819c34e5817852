// 该文件是 Shanan （山南西风） 项目的一部分。
// src/lane.rs - 车道检测
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

use image::{GrayImage, RgbImage, imageops};
use imageproc::{edges::canny, filter::separable_filter_equal, point::Point};
use tracing::{debug, info};

use crate::{
  config::LaneConfig,
  utils::{LaneLine, Segment, average_lane_lines, create_roi_mask, create_roi_vertices},
};

mod hough;
pub use self::hough::{HoughParams, hough_lines_p};

/// 5x5 高斯核（σ 取默认值时的二项式系数）
const GAUSSIAN_5X5: [f32; 5] = [0.0625, 0.25, 0.375, 0.25, 0.0625];

/// 缓存的 ROI 掩码
#[derive(Debug, Clone)]
pub struct RoiMask {
  mask: GrayImage,
  vertices: [Point<i32>; 4],
}

impl RoiMask {
  pub fn mask(&self) -> &GrayImage {
    &self.mask
  }

  pub fn vertices(&self) -> &[Point<i32>; 4] {
    &self.vertices
  }

  pub fn dimensions(&self) -> (u32, u32) {
    self.mask.dimensions()
  }
}

/// 车辆偏移方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartureSide {
  /// 车道中心在画面中心右侧，车辆向左偏
  Left,
  /// 车道中心在画面中心左侧，车辆向右偏
  Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneDeparture {
  pub offset: i32,
  pub side: DepartureSide,
}

/// 左右车道线
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneState {
  pub left: Option<LaneLine>,
  pub right: Option<LaneLine>,
}

impl LaneState {
  pub fn is_complete(&self) -> bool {
    self.left.is_some() && self.right.is_some()
  }

  pub fn is_empty(&self) -> bool {
    self.left.is_none() && self.right.is_none()
  }

  /// 车道中点与画面中点的有符号偏移（像素）
  ///
  /// 仅检测到一侧或没有车道线时返回 0。
  pub fn center_offset(&self, frame_width: u32) -> i32 {
    match (self.left, self.right) {
      (Some(left), Some(right)) => {
        let lane_center = (left.x1 + right.x1).div_euclid(2);
        lane_center - (frame_width / 2) as i32
      }
      _ => 0,
    }
  }

  pub fn departure(&self, frame_width: u32, offset_threshold: i32) -> Option<LaneDeparture> {
    if !self.is_complete() {
      return None;
    }
    let offset = self.center_offset(frame_width);
    if offset.abs() <= offset_threshold {
      return None;
    }
    let side = if offset > 0 {
      DepartureSide::Left
    } else {
      DepartureSide::Right
    };
    Some(LaneDeparture { offset, side })
  }
}

/// 车道检测器
///
/// ROI 掩码按帧尺寸缓存，尺寸变化或调用 [`LaneDetector::reset`] 后重建。
#[derive(Debug, Clone, Default)]
pub struct LaneDetector {
  config: LaneConfig,
  roi: Option<RoiMask>,
  roi_rebuilds: u64,
}

impl LaneDetector {
  pub fn new(config: LaneConfig) -> Self {
    Self {
      config,
      roi: None,
      roi_rebuilds: 0,
    }
  }

  pub fn config(&self) -> &LaneConfig {
    &self.config
  }

  pub fn roi(&self) -> Option<&RoiMask> {
    self.roi.as_ref()
  }

  /// ROI 掩码累计重建次数
  pub fn roi_rebuilds(&self) -> u64 {
    self.roi_rebuilds
  }

  pub fn reset(&mut self) {
    debug!("清除 ROI 缓存");
    self.roi = None;
  }

  pub fn detect(&mut self, image: &RgbImage) -> LaneState {
    let config = self.config;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
      return LaneState::default();
    }
    self.ensure_roi(width, height);
    let Some(roi) = self.roi.as_ref() else {
      return LaneState::default();
    };

    let mut edges = edge_map(image, &config);
    for (edge, inside) in edges.pixels_mut().zip(roi.mask.pixels()) {
      edge[0] &= inside[0];
    }

    let params = HoughParams {
      rho: config.hough_rho,
      threshold: config.hough_threshold,
      min_line_length: config.min_line_length,
      max_line_gap: config.max_line_gap,
      ..HoughParams::default()
    };
    let segments = hough_lines_p(&edges, &params);
    if segments.is_empty() {
      return LaneState::default();
    }

    let (left, right) = separate_lanes(&segments, config.min_slope);
    debug!("左侧候选 {} 条，右侧候选 {} 条", left.len(), right.len());

    LaneState {
      left: average_lane_lines(&left, height, config.roi_top),
      right: average_lane_lines(&right, height, config.roi_top),
    }
  }

  fn ensure_roi(&mut self, width: u32, height: u32) {
    let fresh = self
      .roi
      .as_ref()
      .is_some_and(|roi| roi.dimensions() == (width, height));
    if fresh {
      return;
    }

    let vertices = create_roi_vertices(
      width,
      height,
      self.config.roi_top,
      self.config.roi_left,
      self.config.roi_right,
    );
    let mask = create_roi_mask((width, height), &vertices);
    info!("重建 ROI 掩码: {}x{}", width, height);
    self.roi_rebuilds += 1;
    self.roi = Some(RoiMask { mask, vertices });
  }
}

/// 灰度化、5x5 高斯模糊、Canny 边缘
pub fn edge_map(image: &RgbImage, config: &LaneConfig) -> GrayImage {
  let gray = imageops::grayscale(image);
  let blurred: GrayImage = separable_filter_equal(&gray, &GAUSSIAN_5X5);
  canny(&blurred, config.canny_low, config.canny_high)
}

/// 按斜率把线段分到左右两侧
///
/// 图像坐标 y 向下增长，左侧车道线斜率为负，右侧为正。
/// 竖直线段和斜率绝对值小于 `min_slope` 的线段被丢弃。
pub fn separate_lanes(segments: &[Segment], min_slope: f64) -> (Vec<Segment>, Vec<Segment>) {
  let mut left = Vec::new();
  let mut right = Vec::new();

  for &segment in segments {
    let [x1, y1, x2, y2] = segment;
    if x2 == x1 {
      continue;
    }
    let slope = (y2 - y1) as f64 / (x2 - x1) as f64;
    if slope.abs() < min_slope {
      continue;
    }
    if slope < 0.0 {
      left.push(segment);
    } else {
      right.push(segment);
    }
  }

  (left, right)
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;
  use imageproc::drawing::draw_polygon_mut;

  fn paint_lane(image: &mut RgbImage, bottom: (i32, i32), top: (i32, i32)) {
    let poly = [
      Point::new(bottom.0 - 4, bottom.1),
      Point::new(bottom.0 + 4, bottom.1),
      Point::new(top.0 + 4, top.1),
      Point::new(top.0 - 4, top.1),
    ];
    draw_polygon_mut(image, &poly, Rgb([255, 255, 255]));
  }

  fn road(shift: i32) -> RgbImage {
    let mut image = RgbImage::new(640, 360);
    paint_lane(&mut image, (170 + shift, 359), (280 + shift, 225));
    paint_lane(&mut image, (470 + shift, 359), (360 + shift, 225));
    image
  }

  #[test]
  fn empty_frame_has_no_lanes() {
    let mut detector = LaneDetector::default();
    for (width, height) in [(0, 0), (0, 12), (12, 0)] {
      assert!(detector.detect(&RgbImage::new(width, height)).is_empty());
    }
    assert!(detector.roi().is_none());
    assert_eq!(detector.roi_rebuilds(), 0);
  }

  #[test]
  fn blank_frame_has_no_lanes() {
    let mut detector = LaneDetector::default();
    let state = detector.detect(&RgbImage::new(320, 180));
    assert!(state.is_empty());
    assert!(!state.is_complete());
  }

  #[test]
  fn roi_cache_reused_for_same_dimensions() {
    let mut detector = LaneDetector::default();
    detector.detect(&RgbImage::new(320, 180));
    detector.detect(&RgbImage::new(320, 180));
    assert_eq!(detector.roi_rebuilds(), 1);
    assert_eq!(detector.roi().map(RoiMask::dimensions), Some((320, 180)));

    detector.detect(&RgbImage::new(640, 360));
    assert_eq!(detector.roi_rebuilds(), 2);
    assert_eq!(detector.roi().map(RoiMask::dimensions), Some((640, 360)));

    detector.reset();
    assert!(detector.roi().is_none());
    detector.detect(&RgbImage::new(640, 360));
    assert_eq!(detector.roi_rebuilds(), 3);
  }

  #[test]
  fn detects_both_lanes_on_centered_road() {
    let mut detector = LaneDetector::default();
    let state = detector.detect(&road(0));
    assert!(state.is_complete(), "车道线不完整: {:?}", state);

    let (left, right) = (state.left.unwrap(), state.right.unwrap());
    assert_eq!(left.y1, 360);
    assert_eq!(left.y2, 216);
    assert!((left.x1 - 169).abs() < 15, "左车道底部: {}", left.x1);
    assert!((right.x1 - 471).abs() < 15, "右车道底部: {}", right.x1);
    assert!(left.x2 > left.x1);
    assert!(right.x2 < right.x1);

    assert!(state.center_offset(640).abs() <= 15);
    assert_eq!(state.departure(640, 50), None);
  }

  #[test]
  fn shifted_road_signals_departure() {
    let mut detector = LaneDetector::default();
    let state = detector.detect(&road(60));
    assert!(state.is_complete(), "车道线不完整: {:?}", state);

    let departure = state.departure(640, 50).expect("应当检测到车道偏离");
    assert!(departure.offset > 50);
    assert_eq!(departure.side, DepartureSide::Left);
  }

  #[test]
  fn single_side_is_incomplete() {
    let state = LaneState {
      left: Some(LaneLine {
        x1: 100,
        y1: 360,
        x2: 200,
        y2: 216,
      }),
      right: None,
    };
    assert!(!state.is_complete());
    assert_eq!(state.center_offset(640), 0);
    assert_eq!(state.departure(640, 0), None);
  }

  #[test]
  fn center_offset_sign() {
    let line = |x1| LaneLine {
      x1,
      y1: 360,
      x2: x1,
      y2: 216,
    };
    let state = LaneState {
      left: Some(line(100)),
      right: Some(line(400)),
    };
    assert_eq!(state.center_offset(640), -70);
    let departure = state.departure(640, 50).unwrap();
    assert_eq!(departure.side, DepartureSide::Right);
  }

  #[test]
  fn separation_drops_vertical_and_flat_segments() {
    let segments = [
      [10, 100, 10, 0],
      [0, 100, 100, 90],
      [0, 100, 50, 0],
      [100, 0, 150, 100],
    ];
    let (left, right) = separate_lanes(&segments, 0.5);
    assert_eq!(left, vec![[0, 100, 50, 0]]);
    assert_eq!(right, vec![[100, 0, 150, 100]]);
  }
}
