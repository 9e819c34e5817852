// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/memory.rs - 内存中的帧序列
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

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use image::RgbImage;

use crate::{
  frame::Frame,
  input::{FrameSource, InputError},
};

/// 预先解码好的帧
#[derive(Debug, Clone, Default)]
pub struct MemoryInput {
  frames: Vec<RgbImage>,
  position: u64,
  fps: Option<f64>,
  released: Arc<AtomicBool>,
}

impl MemoryInput {
  pub fn new(frames: Vec<RgbImage>) -> Self {
    Self {
      frames,
      ..Self::default()
    }
  }

  /// `count` 张相同尺寸的黑帧
  pub fn blank(count: usize, width: u32, height: u32) -> Self {
    Self::new(vec![RgbImage::new(width, height); count])
  }

  pub fn with_fps(mut self, fps: f64) -> Self {
    self.fps = Some(fps);
    self
  }

  /// 释放标记，可在输入被移交后观察是否已释放
  pub fn release_flag(&self) -> Arc<AtomicBool> {
    self.released.clone()
  }
}

impl FrameSource for MemoryInput {
  fn read_next(&mut self) -> Result<Option<Frame>, InputError> {
    if self.released.load(Ordering::Acquire) {
      return Err(InputError::Released);
    }
    let Some(image) = self.frames.get(self.position as usize) else {
      return Ok(None);
    };
    let frame = Frame::new(image.clone(), self.position).with_fps(self.fps);
    self.position += 1;
    Ok(Some(frame))
  }

  fn seek(&mut self, index: u64) -> Result<(), InputError> {
    if self.released.load(Ordering::Acquire) {
      return Err(InputError::Released);
    }
    self.position = index.min(self.frames.len() as u64);
    Ok(())
  }

  fn total_frames(&self) -> Option<u64> {
    Some(self.frames.len() as u64)
  }

  fn fps(&self) -> Option<f64> {
    self.fps
  }

  fn release(&mut self) {
    self.frames.clear();
    self.released.store(true, Ordering::Release);
  }
}
