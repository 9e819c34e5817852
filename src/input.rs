// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input.rs - 帧来源
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

mod image_file;
mod image_sequence;
mod memory;

pub use self::image_file::{ImageFileInput, ImageFileInputError};
pub use self::image_sequence::{ImageSequenceInput, ImageSequenceInputError};
pub use self::memory::MemoryInput;

/// 可随机跳转的帧来源
///
/// 读出的帧以当前位置作为索引，`seek` 之后从目标位置继续读取。
pub trait FrameSource: Send {
  /// 读取下一帧，流结束时返回 `Ok(None)`
  fn read_next(&mut self) -> Result<Option<Frame>, InputError>;

  /// 跳到第 `index` 帧，超出末尾时停在末尾
  fn seek(&mut self, index: u64) -> Result<(), InputError>;

  /// 总帧数，未知时为 `None`
  fn total_frames(&self) -> Option<u64>;

  /// 标称帧率，未知时为 `None`
  fn fps(&self) -> Option<f64>;

  /// 释放底层资源，之后的读取返回 [`InputError::Released`]
  fn release(&mut self);
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
  fn read_next(&mut self) -> Result<Option<Frame>, InputError> {
    (**self).read_next()
  }

  fn seek(&mut self, index: u64) -> Result<(), InputError> {
    (**self).seek(index)
  }

  fn total_frames(&self) -> Option<u64> {
    (**self).total_frames()
  }

  fn fps(&self) -> Option<f64> {
    (**self).fps()
  }

  fn release(&mut self) {
    (**self).release()
  }
}

#[derive(Error, Debug)]
pub enum InputError {
  #[error("图像文件输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("图像序列输入错误: {0}")]
  ImageSequenceInputError(#[from] ImageSequenceInputError),
  #[error("输入源已释放")]
  Released,
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum InputWrapper {
  ImageFile(ImageFileInput),
  ImageSequence(ImageSequenceInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ImageFileInput::SCHEME => Ok(InputWrapper::ImageFile(ImageFileInput::from_url(url)?)),
      ImageSequenceInput::SCHEME => Ok(InputWrapper::ImageSequence(
        ImageSequenceInput::from_url(url)?,
      )),
      scheme => Err(InputError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl InputWrapper {
  fn inner(&self) -> &dyn FrameSource {
    match self {
      InputWrapper::ImageFile(input) => input,
      InputWrapper::ImageSequence(input) => input,
    }
  }

  fn inner_mut(&mut self) -> &mut dyn FrameSource {
    match self {
      InputWrapper::ImageFile(input) => input,
      InputWrapper::ImageSequence(input) => input,
    }
  }
}

impl FrameSource for InputWrapper {
  fn read_next(&mut self) -> Result<Option<Frame>, InputError> {
    self.inner_mut().read_next()
  }

  fn seek(&mut self, index: u64) -> Result<(), InputError> {
    self.inner_mut().seek(index)
  }

  fn total_frames(&self) -> Option<u64> {
    self.inner().total_frames()
  }

  fn fps(&self) -> Option<f64> {
    self.inner().fps()
  }

  fn release(&mut self) {
    self.inner_mut().release()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("rtsp://camera.local/stream").unwrap();
    match InputWrapper::from_url(&url) {
      Err(InputError::SchemeMismatch(scheme)) => assert_eq!(scheme, "rtsp"),
      other => panic!("意外结果: {:?}", other.err()),
    }
  }
}
