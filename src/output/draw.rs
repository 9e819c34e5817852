// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 车道与检测结果可视化
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_polygon_mut,
    draw_text_mut, text_size,
  },
  point::Point,
  rect::Rect,
};
use thiserror::Error;
use tracing::info;

use crate::{
  config::{Config, LaneConfig},
  detection::{Detection, DistanceBand},
  lane::{LaneDeparture, LaneState},
};

const DANGER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const WARNING_COLOR: Rgb<u8> = Rgb([255, 165, 0]);
const SAFE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LANE_LEFT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const LANE_RIGHT_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const LANE_AREA_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const LANE_AREA_ALPHA: f32 = 0.3;
const LANE_THICKNESS: f32 = 8.0;
const BOX_THICKNESS: i32 = 2;
const LABEL_FONT_SIZE: f32 = 16.0;
const WARNING_FONT_SIZE: f32 = 28.0;
const LABEL_PADDING: i32 = 4;
/// 超过该距离（米）的目标不在标签中显示距离
const MAX_LABELED_DISTANCE: f32 = 100.0;

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 帧标注
///
/// 没有字体时只绘制几何图形，标签与偏离提示文字被省略。
#[derive(Clone, Default)]
pub struct Draw {
  font: Option<FontArc>,
}

impl Draw {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  pub fn with_font_file(self, path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data)?;
    info!("加载字体: {}", path.display());
    Ok(self.with_font(font))
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 依次绘制车道、偏离提示和检测框
  ///
  /// `departure` 由调用方按车道检测器的阈值算出，横幅与帧结果保持一致。
  pub fn annotate(
    &self,
    image: &mut RgbImage,
    lanes: &LaneState,
    departure: Option<LaneDeparture>,
    lane: &LaneConfig,
    detections: &[Detection],
    config: &Config,
  ) {
    if config.lane_detection_enabled {
      self.draw_lanes(image, lanes);
      self.draw_lane_warning(image, lanes, departure, lane.roi_top);
    }
    for detection in detections {
      self.draw_detection(image, detection, config);
    }
  }

  pub fn draw_lanes(&self, image: &mut RgbImage, lanes: &LaneState) {
    if let (Some(left), Some(right)) = (lanes.left, lanes.right) {
      let area = [
        Point::new(left.x1, left.y1),
        Point::new(left.x2, left.y2),
        Point::new(right.x2, right.y2),
        Point::new(right.x1, right.y1),
      ];
      if area[0] != area[3] {
        let mut overlay = image.clone();
        draw_polygon_mut(&mut overlay, &area, LANE_AREA_COLOR);
        for (pixel, over) in image.pixels_mut().zip(overlay.pixels()) {
          for c in 0..3 {
            let blended =
              pixel[c] as f32 * (1.0 - LANE_AREA_ALPHA) + over[c] as f32 * LANE_AREA_ALPHA;
            pixel[c] = blended.round() as u8;
          }
        }
      }
    }

    if let Some(left) = lanes.left {
      draw_thick_line(image, left.bottom(), left.top(), LANE_THICKNESS, LANE_LEFT_COLOR);
    }
    if let Some(right) = lanes.right {
      draw_thick_line(image, right.bottom(), right.top(), LANE_THICKNESS, LANE_RIGHT_COLOR);
    }
  }

  /// 车辆中心线，以及偏离时的提示横幅
  pub fn draw_lane_warning(
    &self,
    image: &mut RgbImage,
    lanes: &LaneState,
    departure: Option<LaneDeparture>,
    roi_top: f64,
  ) {
    let (width, height) = image.dimensions();
    if !lanes.is_complete() || width == 0 || height == 0 {
      return;
    }

    if let Some(departure) = departure {
      let banner = Rect::at(0, 0).of_size(width, (height / 12).max(4));
      draw_filled_rect_mut(image, banner, DANGER_COLOR);
      if let Some(font) = &self.font {
        let text = format!("车道偏离！（偏移：{}px）", departure.offset);
        draw_text_mut(
          image,
          TEXT_COLOR,
          LABEL_PADDING,
          LABEL_PADDING,
          PxScale::from(WARNING_FONT_SIZE),
          font,
          &text,
        );
      }
    }

    let center_x = (width / 2) as f32;
    let top = (height as f64 * roi_top) as f32;
    for dx in [-1.0, 0.0] {
      draw_line_segment_mut(
        image,
        (center_x + dx, height as f32),
        (center_x + dx, top),
        TEXT_COLOR,
      );
    }
  }

  /// 检测框按距离着色，可选附带标签
  pub fn draw_detection(&self, image: &mut RgbImage, detection: &Detection, config: &Config) {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
      return;
    }
    let [x1, y1, x2, y2] = detection.bbox;
    let x_min = (x1 as i32).clamp(0, w as i32 - 1);
    let y_min = (y1 as i32).clamp(0, h as i32 - 1);
    let x_max = (x2 as i32).clamp(0, w as i32 - 1);
    let y_max = (y2 as i32).clamp(0, h as i32 - 1);
    if x_min >= x_max || y_min >= y_max {
      return;
    }

    let color = match detection.band(config.danger_threshold, config.warning_threshold) {
      DistanceBand::Danger => DANGER_COLOR,
      DistanceBand::Warning => WARNING_COLOR,
      DistanceBand::Safe => SAFE_COLOR,
    };

    for inset in 0..BOX_THICKNESS {
      let width = x_max - x_min - 2 * inset;
      let height = y_max - y_min - 2 * inset;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + inset, y_min + inset).of_size(width as u32 + 1, height as u32 + 1);
      draw_hollow_rect_mut(image, rect, color);
    }

    if !config.show_labels {
      return;
    }
    let Some(font) = &self.font else {
      return;
    };

    let label = label_text(detection, config.show_distance);
    let scale = PxScale::from(LABEL_FONT_SIZE);
    let (text_width, text_height) = text_size(scale, font, &label);
    let label_height = text_height as i32 + 2 * LABEL_PADDING;
    let label_y = (y_min - label_height).max(0);
    let label_width = text_width.min(w - x_min as u32);
    if label_width == 0 {
      return;
    }

    let background = Rect::at(x_min, label_y).of_size(label_width, label_height as u32);
    draw_filled_rect_mut(image, background, color);
    draw_text_mut(
      image,
      TEXT_COLOR,
      x_min,
      label_y + LABEL_PADDING,
      scale,
      font,
      &label,
    );
  }
}

/// `"{类别}: {置信度}"`，需要时附带距离
pub fn label_text(detection: &Detection, show_distance: bool) -> String {
  let mut label = format!("{}: {:.2}", detection.class_name, detection.confidence);
  if show_distance && detection.distance < MAX_LABELED_DISTANCE {
    label.push_str(&format!(" ({:.1}m)", detection.distance));
  }
  label
}

/// 以四边形近似粗线
fn draw_thick_line(
  image: &mut RgbImage,
  from: (i32, i32),
  to: (i32, i32),
  thickness: f32,
  color: Rgb<u8>,
) {
  let (dx, dy) = ((to.0 - from.0) as f32, (to.1 - from.1) as f32);
  let length = (dx * dx + dy * dy).sqrt();
  if length < 1.0 {
    return;
  }
  let (nx, ny) = (-dy / length * thickness / 2.0, dx / length * thickness / 2.0);
  let corner = |p: (i32, i32), sign: f32| {
    Point::new(
      (p.0 as f32 + sign * nx).round() as i32,
      (p.1 as f32 + sign * ny).round() as i32,
    )
  };
  let quad = [
    corner(from, 1.0),
    corner(to, 1.0),
    corner(to, -1.0),
    corner(from, -1.0),
  ];
  if quad[0] == quad[3] {
    draw_line_segment_mut(
      image,
      (from.0 as f32, from.1 as f32),
      (to.0 as f32, to.1 as f32),
      color,
    );
    return;
  }
  draw_polygon_mut(image, &quad, color);
}
