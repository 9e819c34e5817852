// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型
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

use std::convert::Infallible;

use image::{ImageBuffer, Luma, RgbImage};

/// 推理能力
///
/// 模型本身不在本库内实现，调用方提供检测或分割模型的实现。
pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input, confidence: f32) -> Result<Self::Output, Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub class_name: String,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，像素坐标
}

#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

/// 单个实例的概率掩码，尺寸可以与帧不同
pub type InstanceMask = ImageBuffer<Luma<f32>, Vec<f32>>;

#[derive(Debug, Clone, Default)]
pub struct SegmentResult {
  pub masks: Box<[InstanceMask]>,
}

impl SegmentResult {
  pub fn is_empty(&self) -> bool {
    self.masks.is_empty()
  }
}

/// 不做检测，只跑车道线时使用
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDetector;

impl Model for NoDetector {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = Infallible;

  fn infer(&self, _input: &Self::Input, _confidence: f32) -> Result<Self::Output, Self::Error> {
    Ok(DetectResult::default())
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoSegmenter;

impl Model for NoSegmenter {
  type Input = RgbImage;
  type Output = SegmentResult;
  type Error = Infallible;

  fn infer(&self, _input: &Self::Input, _confidence: f32) -> Result<Self::Output, Self::Error> {
    Ok(SegmentResult::default())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn null_models_return_nothing() {
    let frame = RgbImage::new(8, 8);
    assert!(NoDetector.infer(&frame, 0.5).unwrap().is_empty());
    assert!(NoSegmenter.infer(&frame, 0.5).unwrap().is_empty());
  }
}
