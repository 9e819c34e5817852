// 该文件是 Shanan （山南西风） 项目的一部分。
// src/lane/hough.rs - 概率霍夫线段变换
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

//! 渐进式概率霍夫变换。
//!
//! 随机挑选边缘点投票，一旦某条直线的票数超过阈值，就沿该方向
//! 双向行走收集线段（允许不超过 `max_line_gap` 的间隙），并把行走
//! 过的点从掩码中移除。访问顺序由固定种子打乱，保证同一输入得到
//! 同一输出。

use std::f64::consts::PI;

use image::GrayImage;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use tracing::debug;

use crate::utils::Segment;

/// 定点行走的小数位数
const SHIFT: u32 = 16;
const HOUGH_SEED: u64 = 0x5348_414e_414e;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoughParams {
  /// 距离分辨率（像素）
  pub rho: f64,
  /// 角度分辨率（弧度）
  pub theta: f64,
  /// 投票阈值
  pub threshold: u32,
  pub min_line_length: u32,
  pub max_line_gap: u32,
}

impl Default for HoughParams {
  fn default() -> Self {
    Self {
      rho: 2.0,
      theta: PI / 180.0,
      threshold: 50,
      min_line_length: 40,
      max_line_gap: 150,
    }
  }
}

struct Accumulator {
  cells: Vec<i32>,
  trig: Vec<(f64, f64)>,
  num_rho: usize,
  offset: i64,
}

impl Accumulator {
  fn new(width: u32, height: u32, params: &HoughParams) -> Self {
    let irho = 1.0 / params.rho;
    let num_angle = (PI / params.theta).round().max(1.0) as usize;
    let num_rho = ((((width + height) * 2 + 1) as f64) / params.rho).round() as usize;
    let trig = (0..num_angle)
      .map(|n| {
        let angle = n as f64 * params.theta;
        (angle.cos() * irho, angle.sin() * irho)
      })
      .collect();

    Self {
      cells: vec![0; num_angle * num_rho],
      trig,
      num_rho,
      offset: (num_rho as i64 - 1) / 2,
    }
  }

  fn bin(&self, n: usize, x: i64, y: i64) -> usize {
    let (c, s) = self.trig[n];
    let r = (x as f64 * c + y as f64 * s).round() as i64 + self.offset;
    n * self.num_rho + r as usize
  }

  /// 为点投票，返回票数最高的角度及其票数
  fn vote(&mut self, x: i64, y: i64) -> (usize, i32) {
    let mut best = (0usize, i32::MIN);
    for n in 0..self.trig.len() {
      let bin = self.bin(n, x, y);
      self.cells[bin] += 1;
      if self.cells[bin] > best.1 {
        best = (n, self.cells[bin]);
      }
    }
    best
  }

  fn retract(&mut self, x: i64, y: i64) {
    for n in 0..self.trig.len() {
      let bin = self.bin(n, x, y);
      self.cells[bin] -= 1;
    }
  }
}

/// 沿直线方向的定点步进器
#[derive(Clone, Copy)]
struct Walker {
  x: i64,
  y: i64,
  dx: i64,
  dy: i64,
  x_major: bool,
}

impl Walker {
  fn new(px: i64, py: i64, cos: f64, sin: f64) -> Self {
    let a = -sin;
    let b = cos;
    let one = (1i64 << SHIFT) as f64;
    let half = 1i64 << (SHIFT - 1);

    if a.abs() > b.abs() {
      Self {
        x: px,
        y: (py << SHIFT) + half,
        dx: if a > 0.0 { 1 } else { -1 },
        dy: (b * one / a.abs()).round() as i64,
        x_major: true,
      }
    } else {
      Self {
        x: (px << SHIFT) + half,
        y: py,
        dx: (a * one / b.abs()).round() as i64,
        dy: if b > 0.0 { 1 } else { -1 },
        x_major: false,
      }
    }
  }

  fn reversed(mut self) -> Self {
    self.dx = -self.dx;
    self.dy = -self.dy;
    self
  }

  fn position(&self) -> (i64, i64) {
    if self.x_major {
      (self.x, self.y >> SHIFT)
    } else {
      (self.x >> SHIFT, self.y)
    }
  }

  fn step(&mut self) {
    self.x += self.dx;
    self.y += self.dy;
  }
}

/// 在边缘图上检测线段，非零像素视为边缘
pub fn hough_lines_p(edges: &GrayImage, params: &HoughParams) -> Vec<Segment> {
  let (width, height) = edges.dimensions();
  if width == 0 || height == 0 || params.rho <= 0.0 || params.theta <= 0.0 {
    return Vec::new();
  }
  let (w, h) = (width as i64, height as i64);
  let index = |x: i64, y: i64| (y * w + x) as usize;
  let inside = |x: i64, y: i64| x >= 0 && x < w && y >= 0 && y < h;

  let mut mask = vec![false; (width * height) as usize];
  let mut points = Vec::new();
  for (x, y, pixel) in edges.enumerate_pixels() {
    if pixel[0] != 0 {
      mask[index(x as i64, y as i64)] = true;
      points.push((x as i64, y as i64));
    }
  }
  points.shuffle(&mut StdRng::seed_from_u64(HOUGH_SEED));

  let threshold = params.threshold as i32;
  let min_length = params.min_line_length as i64;
  let max_gap = params.max_line_gap as i64;
  let mut accum = Accumulator::new(width, height, params);
  let mut segments = Vec::new();

  for &(px, py) in &points {
    if !mask[index(px, py)] {
      continue;
    }

    let (best_n, votes) = accum.vote(px, py);
    if votes < threshold {
      continue;
    }

    let (cos, sin) = accum.trig[best_n];
    let forward = Walker::new(px, py, cos, sin);
    let walkers = [forward, forward.reversed()];

    let mut ends = [(px, py); 2];
    for (k, start) in walkers.iter().enumerate() {
      let mut walker = *start;
      let mut gap = 0;
      loop {
        let (x, y) = walker.position();
        if !inside(x, y) {
          break;
        }
        if mask[index(x, y)] {
          gap = 0;
          ends[k] = (x, y);
        } else {
          gap += 1;
          if gap > max_gap {
            break;
          }
        }
        walker.step();
      }
    }

    let good_line =
      (ends[1].0 - ends[0].0).abs() >= min_length || (ends[1].1 - ends[0].1).abs() >= min_length;

    for (k, start) in walkers.iter().enumerate() {
      let mut walker = *start;
      loop {
        let (x, y) = walker.position();
        if !inside(x, y) {
          break;
        }
        let cell = index(x, y);
        if mask[cell] {
          if good_line {
            accum.retract(x, y);
          }
          mask[cell] = false;
        }
        if (x, y) == ends[k] {
          break;
        }
        walker.step();
      }
    }

    if good_line {
      segments.push([
        ends[0].0 as i32,
        ends[0].1 as i32,
        ends[1].0 as i32,
        ends[1].1 as i32,
      ]);
    }
  }

  debug!("霍夫变换: {} 个边缘点, {} 条线段", points.len(), segments.len());
  segments
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Luma;
  use imageproc::drawing::draw_line_segment_mut;

  #[test]
  fn empty_edge_map_yields_nothing() {
    let edges = GrayImage::new(64, 48);
    assert!(hough_lines_p(&edges, &HoughParams::default()).is_empty());
  }

  #[test]
  fn finds_single_diagonal_segment() {
    let mut edges = GrayImage::new(200, 200);
    draw_line_segment_mut(&mut edges, (20.0, 180.0), (120.0, 30.0), Luma([255u8]));

    let segments = hough_lines_p(&edges, &HoughParams::default());
    assert!(!segments.is_empty());

    let [x1, y1, x2, y2] = segments[0];
    let length = (((x2 - x1).pow(2) + (y2 - y1).pow(2)) as f64).sqrt();
    assert!(length > 100.0, "线段过短: {:?}", segments[0]);
    let slope = (y2 - y1) as f64 / (x2 - x1) as f64;
    assert!((slope + 1.5).abs() < 0.15, "斜率偏差过大: {}", slope);
  }

  #[test]
  fn output_is_deterministic() {
    let mut edges = GrayImage::new(160, 120);
    draw_line_segment_mut(&mut edges, (10.0, 110.0), (70.0, 10.0), Luma([255u8]));
    draw_line_segment_mut(&mut edges, (150.0, 110.0), (90.0, 10.0), Luma([255u8]));

    let params = HoughParams::default();
    assert_eq!(hough_lines_p(&edges, &params), hough_lines_p(&edges, &params));
  }

  #[test]
  fn short_segments_below_threshold_are_ignored() {
    let mut edges = GrayImage::new(100, 100);
    draw_line_segment_mut(&mut edges, (10.0, 10.0), (20.0, 25.0), Luma([255u8]));
    assert!(hough_lines_p(&edges, &HoughParams::default()).is_empty());
  }
}
