// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 帧定义
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

use image::RgbImage;

/// 没有标称帧率时使用的默认帧率
pub const DEFAULT_FPS: f64 = 30.0;

/// 帧数据
#[derive(Debug, Clone)]
pub struct Frame {
  /// RGB 图像数据（HWC，8 位）
  pub image: RgbImage,
  /// 帧索引
  pub index: u64,
  /// 时间戳（毫秒）
  pub timestamp_ms: u64,
}

impl Frame {
  pub fn new(image: RgbImage, index: u64) -> Self {
    Self {
      image,
      index,
      timestamp_ms: 0,
    }
  }

  /// 根据帧率推算时间戳
  pub fn with_fps(mut self, fps: Option<f64>) -> Self {
    let fps = fps.filter(|f| *f > 0.0).unwrap_or(DEFAULT_FPS);
    self.timestamp_ms = (self.index as f64 * 1000.0 / fps) as u64;
    self
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn dimensions(&self) -> (u32, u32) {
    self.image.dimensions()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamp_follows_nominal_fps() {
    let frame = Frame::new(RgbImage::new(4, 2), 25).with_fps(Some(25.0));
    assert_eq!(frame.timestamp_ms, 1000);
    assert_eq!(frame.dimensions(), (4, 2));

    let frame = Frame::new(RgbImage::new(4, 2), 30).with_fps(None);
    assert_eq!(frame.timestamp_ms, 1000);
  }
}
