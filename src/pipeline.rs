// 该文件是 Shanan （山南西风） 项目的一部分。
// src/pipeline.rs - 帧处理流水线
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

use crate::{
  detection::{Detection, DetectionStats},
  frame::Frame,
  input::InputError,
  lane::{LaneDeparture, LaneState},
};

mod controller;
mod worker;

pub use self::controller::PlaybackController;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
  #[default]
  Stopped,
  Running,
  Paused,
}

/// 一帧的处理结果
#[derive(Debug, Clone)]
pub struct FrameResult {
  /// 已叠加分割与标注的帧
  pub frame: Frame,
  pub detections: Vec<Detection>,
  pub stats: DetectionStats,
  pub lanes: LaneState,
  pub departure: Option<LaneDeparture>,
  pub index: u64,
}

#[derive(Debug)]
pub enum PipelineEvent {
  Frame(Box<FrameResult>),
  /// 读到流末尾
  Finished,
  /// 加载、读取或推理失败，本次播放已停止
  Error(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("加载输入失败: {0}")]
  Load(#[from] InputError),
  #[error("尚未加载输入")]
  NotLoaded,
  #[error("处理线程异常退出")]
  WorkerPanicked,
}
