// 该文件是 Shanan （山南西风） 项目的一部分。
// src/detection.rs - 检测结果适配
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

use std::collections::BTreeMap;

use image::{RgbImage, imageops};
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
  config::{Config, DistanceConfig},
  model::{DetectItem, DetectResult, Model, NoDetector, NoSegmenter, SegmentResult},
  utils::{estimate_distance, instance_color},
};

/// 分割掩码二值化阈值
const MASK_THRESHOLD: f32 = 0.5;

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("检测模型推理失败: {0}")]
  Detection(#[source] BoxedError),
  #[error("分割模型推理失败: {0}")]
  Segmentation(#[source] BoxedError),
}

/// 按距离划分的危险等级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceBand {
  Danger,
  Warning,
  Safe,
}

/// 单个检测目标，像素坐标
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub class_id: u32,
  pub class_name: String,
  pub confidence: f32,
  pub bbox: [f32; 4], // [x1, y1, x2, y2]
  /// 估计距离（米），框宽为 0 时为正无穷
  pub distance: f32,
}

impl Detection {
  fn from_item(item: &DetectItem, distance: &DistanceConfig) -> Self {
    let width = item.bbox[2] - item.bbox[0];
    Self {
      class_id: item.class_id,
      class_name: item.class_name.clone(),
      confidence: item.score,
      bbox: item.bbox,
      distance: estimate_distance(width, distance.focal_length, distance.known_width),
    }
  }

  pub fn center(&self) -> (i32, i32) {
    let [x1, y1, x2, y2] = self.bbox;
    (((x1 + x2) / 2.0) as i32, ((y1 + y2) / 2.0) as i32)
  }

  pub fn width(&self) -> i32 {
    (self.bbox[2] - self.bbox[0]) as i32
  }

  pub fn height(&self) -> i32 {
    (self.bbox[3] - self.bbox[1]) as i32
  }

  pub fn is_dangerous(&self, threshold: f32) -> bool {
    self.distance < threshold
  }

  pub fn band(&self, danger: f32, warning: f32) -> DistanceBand {
    if self.distance < danger {
      DistanceBand::Danger
    } else if self.distance < warning {
      DistanceBand::Warning
    } else {
      DistanceBand::Safe
    }
  }
}

/// 每帧重新统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionStats {
  pub total_objects: usize,
  pub dangerous_objects: usize,
  pub fps: f64,
  pub processing_time_ms: f64,
  pub object_counts: BTreeMap<String, usize>,
}

impl DetectionStats {
  pub fn reset(&mut self) {
    *self = Self::default();
  }
}

/// 持有检测与分割模型
///
/// 两个模型都可以缺省，缺省时对应的阶段直接跳过。
#[derive(Debug, Clone)]
pub struct DetectionEngine<D = NoDetector, S = NoSegmenter> {
  detector: Option<D>,
  segmenter: Option<S>,
  distance: DistanceConfig,
}

/// 只跑车道检测时的引擎
pub type LaneOnlyEngine = DetectionEngine<NoDetector, NoSegmenter>;

impl Default for DetectionEngine<NoDetector, NoSegmenter> {
  fn default() -> Self {
    Self::new()
  }
}

impl DetectionEngine<NoDetector, NoSegmenter> {
  pub fn new() -> Self {
    Self {
      detector: None,
      segmenter: None,
      distance: DistanceConfig::default(),
    }
  }
}

impl<D, S> DetectionEngine<D, S> {
  pub fn with_detector<D2>(self, detector: D2) -> DetectionEngine<D2, S> {
    DetectionEngine {
      detector: Some(detector),
      segmenter: self.segmenter,
      distance: self.distance,
    }
  }

  pub fn with_segmenter<S2>(self, segmenter: S2) -> DetectionEngine<D, S2> {
    DetectionEngine {
      detector: self.detector,
      segmenter: Some(segmenter),
      distance: self.distance,
    }
  }

  pub fn with_distance(mut self, distance: DistanceConfig) -> Self {
    self.distance = distance;
    self
  }

  pub fn distance_config(&self) -> &DistanceConfig {
    &self.distance
  }

  pub fn has_detector(&self) -> bool {
    self.detector.is_some()
  }

  pub fn has_segmenter(&self) -> bool {
    self.segmenter.is_some()
  }
}

impl<D, S> DetectionEngine<D, S>
where
  D: Model<Input = RgbImage, Output = DetectResult>,
  D::Error: std::error::Error + Send + Sync + 'static,
  S: Model<Input = RgbImage, Output = SegmentResult>,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  /// 运行检测模型并换算距离、统计危险目标
  pub fn detect_objects(
    &self,
    image: &RgbImage,
    config: &Config,
  ) -> Result<(Vec<Detection>, DetectionStats), DetectError> {
    let mut stats = DetectionStats::default();
    let detector = match (&self.detector, config.detection_enabled) {
      (Some(detector), true) => detector,
      _ => return Ok((Vec::new(), stats)),
    };

    let result = detector
      .infer(image, config.confidence_threshold())
      .map_err(|e| DetectError::Detection(Box::new(e)))?;

    let mut detections = Vec::with_capacity(result.len());
    for item in result.items.iter() {
      let detection = Detection::from_item(item, &self.distance);
      trace!(
        "{} {:.2} 距离 {:.1}m",
        detection.class_name, detection.confidence, detection.distance
      );
      *stats
        .object_counts
        .entry(detection.class_name.clone())
        .or_insert(0) += 1;
      if detection.is_dangerous(config.danger_threshold) {
        stats.dangerous_objects += 1;
      }
      detections.push(detection);
    }
    stats.total_objects = detections.len();

    debug!(
      "检测到 {} 个目标，其中 {} 个处于危险距离",
      stats.total_objects, stats.dangerous_objects
    );
    Ok((detections, stats))
  }

  /// 在帧上叠加实例分割掩码，返回叠加的实例数
  pub fn apply_segmentation(&self, image: &mut RgbImage, config: &Config) -> Result<usize, DetectError> {
    let segmenter = match (&self.segmenter, config.segmentation_enabled) {
      (Some(segmenter), true) => segmenter,
      _ => return Ok(0),
    };

    let result = segmenter
      .infer(image, config.confidence_threshold())
      .map_err(|e| DetectError::Segmentation(Box::new(e)))?;
    if result.is_empty() {
      return Ok(0);
    }

    let (width, height) = image.dimensions();
    let mut overlay = image.clone();
    let mut applied = 0;
    for (index, mask) in result.masks.iter().enumerate() {
      if mask.width() == 0 || mask.height() == 0 {
        continue;
      }
      let color = instance_color(index);
      let resized;
      let mask = if mask.dimensions() == (width, height) {
        mask
      } else {
        resized = imageops::resize(mask, width, height, imageops::FilterType::Triangle);
        &resized
      };

      for (pixel, probability) in overlay.pixels_mut().zip(mask.pixels()) {
        if probability[0] > MASK_THRESHOLD {
          for c in 0..3 {
            pixel[c] = (pixel[c] as f32 * 0.6 + color[c] as f32 * 0.4) as u8;
          }
        }
      }
      applied += 1;
    }

    for (pixel, blended) in image.pixels_mut().zip(overlay.pixels()) {
      for c in 0..3 {
        pixel[c] = ((pixel[c] as f32 + blended[c] as f32) * 0.5).round() as u8;
      }
    }

    debug!("叠加 {} 个分割实例", applied);
    Ok(applied)
  }
}

#[cfg(test)]
mod tests {
  use std::cell::Cell;

  use image::Rgb;

  use super::*;
  use crate::model::InstanceMask;

  struct StubDetector {
    items: Vec<DetectItem>,
    calls: Cell<usize>,
  }

  impl StubDetector {
    fn new(items: Vec<DetectItem>) -> Self {
      Self {
        items,
        calls: Cell::new(0),
      }
    }
  }

  impl Model for StubDetector {
    type Input = RgbImage;
    type Output = DetectResult;
    type Error = std::io::Error;

    fn infer(&self, _input: &RgbImage, confidence: f32) -> Result<DetectResult, Self::Error> {
      self.calls.set(self.calls.get() + 1);
      Ok(
        self
          .items
          .iter()
          .filter(|item| item.score >= confidence)
          .cloned()
          .collect::<Vec<_>>()
          .into(),
      )
    }
  }

  struct FailingDetector;

  impl Model for FailingDetector {
    type Input = RgbImage;
    type Output = DetectResult;
    type Error = std::io::Error;

    fn infer(&self, _input: &RgbImage, _confidence: f32) -> Result<DetectResult, Self::Error> {
      Err(std::io::Error::other("设备忙"))
    }
  }

  struct StubSegmenter(Vec<InstanceMask>);

  impl Model for StubSegmenter {
    type Input = RgbImage;
    type Output = SegmentResult;
    type Error = std::io::Error;

    fn infer(&self, _input: &RgbImage, _confidence: f32) -> Result<SegmentResult, Self::Error> {
      Ok(SegmentResult {
        masks: self.0.clone().into_boxed_slice(),
      })
    }
  }

  fn car(x1: f32, x2: f32, score: f32) -> DetectItem {
    DetectItem {
      class_id: 2,
      class_name: "car".to_string(),
      score,
      bbox: [x1, 100.0, x2, 200.0],
    }
  }

  #[test]
  fn box_width_maps_to_distance_and_danger() {
    let engine = DetectionEngine::new().with_detector(StubDetector::new(vec![car(100.0, 280.0, 0.9)]));
    let frame = RgbImage::new(640, 360);

    let (detections, stats) = engine.detect_objects(&frame, &Config::default()).unwrap();
    assert_eq!(detections.len(), 1);
    assert!((detections[0].distance - 8.0).abs() < 1e-4);
    assert!(!detections[0].is_dangerous(5.0));
    assert!(detections[0].is_dangerous(10.0));
    assert_eq!(stats.total_objects, 1);
    assert_eq!(stats.dangerous_objects, 0);

    let config = Config::default().with_danger_threshold(10.0);
    let (_, stats) = engine.detect_objects(&frame, &config).unwrap();
    assert_eq!(stats.dangerous_objects, 1);
  }

  #[test]
  fn derived_geometry_and_band() {
    let detection = Detection::from_item(&car(100.0, 281.0, 0.8), &DistanceConfig::default());
    assert_eq!(detection.center(), (190, 150));
    assert_eq!(detection.width(), 181);
    assert_eq!(detection.height(), 100);
    assert_eq!(detection.band(5.0, 10.0), DistanceBand::Warning);
    assert_eq!(detection.band(5.0, 7.0), DistanceBand::Safe);
    assert_eq!(detection.band(9.0, 10.0), DistanceBand::Danger);
  }

  #[test]
  fn degenerate_box_is_infinitely_far() {
    let detection = Detection::from_item(&car(50.0, 50.0, 0.8), &DistanceConfig::default());
    assert!(detection.distance.is_infinite());
    assert!(!detection.is_dangerous(5.0));
  }

  #[test]
  fn class_counts_are_tallied() {
    let mut person = car(0.0, 40.0, 0.7);
    person.class_name = "person".to_string();
    let engine = DetectionEngine::new().with_detector(StubDetector::new(vec![
      car(0.0, 400.0, 0.9),
      person,
      car(10.0, 30.0, 0.6),
      car(0.0, 10.0, 0.2),
    ]));

    let (detections, stats) = engine
      .detect_objects(&RgbImage::new(8, 8), &Config::default())
      .unwrap();
    assert_eq!(detections.len(), 3);
    assert_eq!(stats.object_counts.get("car"), Some(&2));
    assert_eq!(stats.object_counts.get("person"), Some(&1));
    // 400 像素宽 → 3.6m
    assert_eq!(stats.dangerous_objects, 1);

    let mut stats = stats;
    stats.reset();
    assert_eq!(stats, DetectionStats::default());
  }

  #[test]
  fn disabled_detection_skips_model() {
    let engine = DetectionEngine::new().with_detector(StubDetector::new(vec![car(0.0, 180.0, 0.9)]));
    let config = Config::default().with_detection(false);
    let (detections, stats) = engine
      .detect_objects(&RgbImage::new(8, 8), &config)
      .unwrap();
    assert!(detections.is_empty());
    assert_eq!(stats, DetectionStats::default());
    assert_eq!(engine.detector.as_ref().map(|d| d.calls.get()), Some(0));
  }

  #[test]
  fn inference_failure_is_reported() {
    let engine = DetectionEngine::new().with_detector(FailingDetector);
    let err = engine
      .detect_objects(&RgbImage::new(8, 8), &Config::default())
      .unwrap_err();
    assert!(matches!(err, DetectError::Detection(_)));
  }

  #[test]
  fn segmentation_blends_masked_pixels() {
    let mut mask = InstanceMask::new(4, 4);
    mask.put_pixel(0, 0, image::Luma([1.0]));
    let engine = DetectionEngine::new().with_segmenter(StubSegmenter(vec![mask]));

    let mut frame = RgbImage::from_pixel(4, 4, Rgb([100, 100, 100]));
    let config = Config::default().with_segmentation(true);
    assert_eq!(engine.apply_segmentation(&mut frame, &config).unwrap(), 1);

    let color = instance_color(0);
    let expected = |c: usize| {
      let overlay = (100.0 * 0.6 + color[c] as f32 * 0.4) as u8;
      ((100.0 + overlay as f32) * 0.5).round() as u8
    };
    assert_eq!(
      *frame.get_pixel(0, 0),
      Rgb([expected(0), expected(1), expected(2)])
    );
    assert_eq!(*frame.get_pixel(3, 3), Rgb([100, 100, 100]));
  }

  #[test]
  fn segmentation_resizes_masks_and_respects_toggle() {
    let mask = InstanceMask::from_pixel(2, 2, image::Luma([1.0]));
    let engine = DetectionEngine::new().with_segmenter(StubSegmenter(vec![mask]));

    let mut frame = RgbImage::from_pixel(8, 6, Rgb([0, 0, 0]));
    assert_eq!(engine.apply_segmentation(&mut frame, &Config::default()).unwrap(), 0);
    assert!(frame.pixels().all(|p| *p == Rgb([0, 0, 0])));

    let config = Config::default().with_segmentation(true);
    engine.apply_segmentation(&mut frame, &config).unwrap();
    assert!(frame.pixels().all(|p| *p != Rgb([0, 0, 0])));
  }
}
