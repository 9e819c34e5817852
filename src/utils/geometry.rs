// 该文件是 Shanan （山南西风） 项目的一部分。
// src/utils/geometry.rs - 几何运算
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

use image::{GrayImage, Luma};
use imageproc::{drawing::draw_polygon_mut, point::Point};

/// ROI 梯形上边两个顶点的水平位置（相对宽度）
const ROI_TOP_LEFT_X: f64 = 0.4;
const ROI_TOP_RIGHT_X: f64 = 0.6;

/// 线段 [x1, y1, x2, y2]
pub type Segment = [i32; 4];

/// 拟合并外推后的一条车道线
///
/// `y1` 总是帧底部，`y2` 总是 ROI 顶部。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneLine {
  pub x1: i32,
  pub y1: i32,
  pub x2: i32,
  pub y2: i32,
}

impl LaneLine {
  pub fn bottom(&self) -> (i32, i32) {
    (self.x1, self.y1)
  }

  pub fn top(&self) -> (i32, i32) {
    (self.x2, self.y2)
  }
}

/// 针孔相机测距：`距离 = 已知宽度 * 焦距 / 像素宽度`
///
/// 宽度为零（或负值）的退化框返回正无穷。
pub fn estimate_distance(bbox_width: f32, focal_length: f32, known_width: f32) -> f32 {
  if bbox_width <= 0.0 {
    return f32::INFINITY;
  }
  known_width * focal_length / bbox_width
}

/// 生成 ROI 梯形顶点：左下、左上、右上、右下
pub fn create_roi_vertices(
  width: u32,
  height: u32,
  top_ratio: f64,
  left_ratio: f64,
  right_ratio: f64,
) -> [Point<i32>; 4] {
  let w = width as f64;
  let h = height as i32;
  let top = (height as f64 * top_ratio) as i32;
  [
    Point::new((w * left_ratio) as i32, h),
    Point::new((w * ROI_TOP_LEFT_X) as i32, top),
    Point::new((w * ROI_TOP_RIGHT_X) as i32, top),
    Point::new((w * right_ratio) as i32, h),
  ]
}

/// 将多边形栅格化为掩码，内部为 255，外部为 0
pub fn create_roi_mask(shape: (u32, u32), vertices: &[Point<i32>]) -> GrayImage {
  let (width, height) = shape;
  let mut mask = GrayImage::new(width, height);

  // 退化多边形无法填充
  let degenerate = vertices.len() < 3 || vertices.first() == vertices.last();
  if degenerate || width == 0 || height == 0 {
    return mask;
  }

  draw_polygon_mut(&mut mask, vertices, Luma([255u8]));
  mask
}

/// 将同侧的若干线段合并成一条车道线
///
/// 以 y 为自变量对所有端点做最小二乘拟合 `x = a * y + b`，
/// 然后在帧底部和 `top_ratio * frame_height` 处取值。
pub fn average_lane_lines(
  segments: &[Segment],
  frame_height: u32,
  top_ratio: f64,
) -> Option<LaneLine> {
  let n = (segments.len() * 2) as f64;
  if n < 2.0 {
    return None;
  }

  let (mut sy, mut sx, mut syy, mut syx) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
  for &[x1, y1, x2, y2] in segments {
    for (x, y) in [(x1 as f64, y1 as f64), (x2 as f64, y2 as f64)] {
      sy += y;
      sx += x;
      syy += y * y;
      syx += y * x;
    }
  }

  let denom = n * syy - sy * sy;
  if denom.abs() < f64::EPSILON {
    // 所有端点在同一水平线上
    return None;
  }
  let a = (n * syx - sy * sx) / denom;
  let b = (sx - a * sy) / n;

  let y1 = frame_height as f64;
  let y2 = (frame_height as f64 * top_ratio) as i32 as f64;

  Some(LaneLine {
    x1: (a * y1 + b) as i32,
    y1: y1 as i32,
    x2: (a * y2 + b) as i32,
    y2: y2 as i32,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn distance_is_infinite_for_degenerate_box() {
    assert!(estimate_distance(0.0, 800.0, 1.8).is_infinite());
    assert!(estimate_distance(-3.0, 800.0, 1.8).is_infinite());
  }

  #[test]
  fn distance_strictly_decreases_with_width() {
    let mut previous = f32::INFINITY;
    for w in 1..400 {
      let d = estimate_distance(w as f32, 800.0, 1.8);
      assert!(d < previous, "宽度 {} 时距离未递减", w);
      previous = d;
    }
  }

  #[test]
  fn distance_for_reference_car() {
    let d = estimate_distance(180.0, 800.0, 1.8);
    assert!((d - 8.0).abs() < 1e-4);
  }

  #[test]
  fn roi_vertices_form_trapezoid() {
    let v = create_roi_vertices(1000, 500, 0.6, 0.1, 0.9);
    assert_eq!(v[0], Point::new(100, 500));
    assert_eq!(v[1], Point::new(400, 300));
    assert_eq!(v[2], Point::new(600, 300));
    assert_eq!(v[3], Point::new(900, 500));
  }

  #[test]
  fn roi_mask_fills_inside_only() {
    let v = create_roi_vertices(200, 100, 0.6, 0.1, 0.9);
    let mask = create_roi_mask((200, 100), &v);
    assert_eq!(mask.dimensions(), (200, 100));
    // 梯形中部
    assert_eq!(mask.get_pixel(100, 90)[0], 255);
    // 左上角与右上角在梯形外
    assert_eq!(mask.get_pixel(0, 0)[0], 0);
    assert_eq!(mask.get_pixel(199, 10)[0], 0);
    // 梯形顶边以上
    assert_eq!(mask.get_pixel(100, 50)[0], 0);
  }

  #[test]
  fn roi_mask_for_degenerate_polygon_is_empty() {
    let v = create_roi_vertices(1, 10, 0.6, 0.1, 0.9);
    let mask = create_roi_mask((1, 10), &v);
    assert!(mask.pixels().all(|p| p[0] == 0));
  }

  #[test]
  fn average_of_nothing_is_absent() {
    assert_eq!(average_lane_lines(&[], 500, 0.6), None);
  }

  #[test]
  fn average_extrapolates_to_bottom_and_top() {
    let line = average_lane_lines(&[[100, 400, 200, 300]], 500, 0.6).unwrap();
    assert_eq!(line.y1, 500);
    assert_eq!(line.y2, 300);
    assert_eq!(line.x1, 0);
    assert_eq!(line.x2, 200);
  }

  #[test]
  fn average_fits_several_segments() {
    // 同一直线 x = 0.5 * y + 10 上的三条线段
    let segments = [[160, 300, 185, 350], [210, 400, 235, 450], [185, 350, 210, 400]];
    let line = average_lane_lines(&segments, 480, 0.6).unwrap();
    assert_eq!(line.bottom(), (250, 480));
    assert_eq!(line.top(), (154, 288));
  }

  #[test]
  fn horizontal_points_have_no_fit() {
    assert_eq!(average_lane_lines(&[[0, 10, 50, 10]], 100, 0.6), None);
  }
}
