// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/image_file.rs - 读取单张图像文件
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{FrameSource, InputError},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像解码错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 单张图像，作为只有一帧的流
pub struct ImageFileInput {
  image: Option<RgbImage>,
  position: u64,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch);
    }
    Self::open(url.path())
  }
}

impl ImageFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    let path = path.as_ref();
    let image = ImageReader::open(path)?.decode()?.into_rgb8();
    info!(
      "打开图像文件 {}: {}x{}",
      path.display(),
      image.width(),
      image.height()
    );
    Ok(Self::from_image(image))
  }

  pub fn from_image(image: RgbImage) -> Self {
    Self {
      image: Some(image),
      position: 0,
    }
  }
}

impl FrameSource for ImageFileInput {
  fn read_next(&mut self) -> Result<Option<Frame>, InputError> {
    let image = self.image.as_ref().ok_or(InputError::Released)?;
    if self.position > 0 {
      return Ok(None);
    }
    self.position = 1;
    Ok(Some(Frame::new(image.clone(), 0).with_fps(self.fps())))
  }

  fn seek(&mut self, index: u64) -> Result<(), InputError> {
    if self.image.is_none() {
      return Err(InputError::Released);
    }
    self.position = index.min(1);
    Ok(())
  }

  fn total_frames(&self) -> Option<u64> {
    Some(1)
  }

  fn fps(&self) -> Option<f64> {
    None
  }

  fn release(&mut self) {
    self.image = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn single_image_is_one_frame_stream() {
    let mut input = ImageFileInput::from_image(RgbImage::new(4, 3));
    assert_eq!(input.total_frames(), Some(1));

    let frame = input.read_next().unwrap().unwrap();
    assert_eq!((frame.index, frame.dimensions()), (0, (4, 3)));
    assert!(input.read_next().unwrap().is_none());

    input.seek(0).unwrap();
    assert!(input.read_next().unwrap().is_some());

    input.release();
    assert!(matches!(input.read_next(), Err(InputError::Released)));
  }

  #[test]
  fn missing_file_fails_to_open() {
    let url = Url::parse("image:///nonexistent/shanan-lane.png").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::IoError(_))
    ));
  }
}
