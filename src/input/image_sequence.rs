// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/image_sequence.rs - 读取目录中的图像序列
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

use std::path::{Path, PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{FrameSource, InputError},
};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum ImageSequenceInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("无效的帧率参数: {0}")]
  InvalidFps(String),
  #[error("目录中没有图像: {0}")]
  Empty(PathBuf),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像解码错误 {path}: {source}")]
  Decode {
    path: PathBuf,
    #[source]
    source: image::ImageError,
  },
}

/// 按文件名排序的图像序列，逐帧解码
///
/// `folder:///path/to/frames?fps=25`
pub struct ImageSequenceInput {
  files: Vec<PathBuf>,
  position: u64,
  fps: Option<f64>,
  released: bool,
}

impl FromUrlWithScheme for ImageSequenceInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageSequenceInput {
  type Error = ImageSequenceInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageSequenceInputError::SchemeMismatch);
    }

    let mut fps = None;
    for (key, value) in url.query_pairs() {
      if key == "fps" {
        let parsed = value
          .parse::<f64>()
          .ok()
          .filter(|f| *f > 0.0)
          .ok_or_else(|| ImageSequenceInputError::InvalidFps(value.to_string()))?;
        fps = Some(parsed);
      }
    }

    Ok(Self::open(url.path())?.with_fps(fps))
  }
}

impl ImageSequenceInput {
  pub fn open(directory: impl AsRef<Path>) -> Result<Self, ImageSequenceInputError> {
    let directory = directory.as_ref();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
      let path = entry?.path();
      let is_image = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
      if is_image {
        files.push(path);
      }
    }

    if files.is_empty() {
      return Err(ImageSequenceInputError::Empty(directory.to_path_buf()));
    }
    files.sort();
    info!("打开图像序列 {}: {} 帧", directory.display(), files.len());

    Ok(Self {
      files,
      position: 0,
      fps: None,
      released: false,
    })
  }

  pub fn with_fps(mut self, fps: Option<f64>) -> Self {
    self.fps = fps;
    self
  }
}

impl FrameSource for ImageSequenceInput {
  fn read_next(&mut self) -> Result<Option<Frame>, InputError> {
    if self.released {
      return Err(InputError::Released);
    }
    let Some(path) = self.files.get(self.position as usize) else {
      return Ok(None);
    };

    debug!("解码 {}", path.display());
    let image = ImageReader::open(path)
      .map_err(ImageSequenceInputError::from)?
      .decode()
      .map_err(|source| ImageSequenceInputError::Decode {
        path: path.clone(),
        source,
      })?
      .into_rgb8();

    let frame = Frame::new(image, self.position).with_fps(self.fps);
    self.position += 1;
    Ok(Some(frame))
  }

  fn seek(&mut self, index: u64) -> Result<(), InputError> {
    if self.released {
      return Err(InputError::Released);
    }
    let total = self.files.len() as u64;
    if index > total {
      warn!("跳转位置 {} 超出序列长度 {}", index, total);
    }
    self.position = index.min(total);
    Ok(())
  }

  fn total_frames(&self) -> Option<u64> {
    Some(self.files.len() as u64)
  }

  fn fps(&self) -> Option<f64> {
    self.fps
  }

  fn release(&mut self) {
    self.released = true;
    self.files.clear();
  }
}
