// 该文件是 Shanan （山南西风） 项目的一部分。
// src/pipeline/controller.rs - 播放控制
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

use std::{
  sync::{
    Arc,
    mpsc::{self, Receiver},
  },
  thread::{self, JoinHandle},
};

use image::RgbImage;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl,
  config::{Config, LaneConfig},
  detection::DetectionEngine,
  input::{FrameSource, InputWrapper},
  lane::LaneDetector,
  model::{DetectResult, Model, NoDetector, NoSegmenter, SegmentResult},
  output::Draw,
  pipeline::{
    PipelineError, PipelineEvent, PlaybackState,
    worker::{self, Shared, Stages, WorkerExit},
  },
  utils::PerformanceMonitor,
};

/// 播放控制器
///
/// 状态机 Stopped → Running ⇄ Paused → Stopped。处理在独立线程中进行，
/// 结果通过 [`PlaybackController::subscribe`] 得到的通道送出。
/// 暂停时处理线程阻塞在条件变量上；跳转请求在下一次迭代开始时生效。
pub struct PlaybackController<D = NoDetector, S = NoSegmenter> {
  shared: Arc<Shared>,
  stages: Option<Stages<D, S>>,
  source: Option<Box<dyn FrameSource>>,
  worker: Option<JoinHandle<WorkerExit<D, S>>>,
  total_frames: Option<u64>,
  fps: Option<f64>,
}

impl<D, S> PlaybackController<D, S> {
  pub fn new(engine: DetectionEngine<D, S>) -> Self {
    let (events, _) = mpsc::channel();
    Self {
      shared: Arc::new(Shared::new(Config::default(), events)),
      stages: Some(Stages {
        lane: LaneDetector::default(),
        engine,
        monitor: PerformanceMonitor::new(),
        draw: None,
      }),
      source: None,
      worker: None,
      total_frames: None,
      fps: None,
    }
  }

  pub fn with_config(self, config: Config) -> Self {
    self.shared.lock().config = config;
    self
  }

  pub fn with_lane_config(mut self, lane: LaneConfig) -> Self {
    if let Some(stages) = self.stages.as_mut() {
      stages.lane = LaneDetector::new(lane);
    }
    self
  }

  /// 在帧上绘制车道与检测框后再送出
  pub fn with_draw(mut self, draw: Draw) -> Self {
    if let Some(stages) = self.stages.as_mut() {
      stages.draw = Some(draw);
    }
    self
  }

  /// 新建事件通道，之前的接收端不再收到事件
  pub fn subscribe(&self) -> Receiver<PipelineEvent> {
    let (events, receiver) = mpsc::channel();
    self.shared.set_events(events);
    receiver
  }

  /// 停止当前播放并换上新的输入
  pub fn load<F: FrameSource + 'static>(&mut self, source: F) -> Result<(), PipelineError> {
    self.stop()?;
    let stages = self.stages.as_mut().ok_or(PipelineError::WorkerPanicked)?;
    stages.lane.reset();
    stages.monitor.reset();

    self.total_frames = source.total_frames();
    self.fps = source.fps();
    self.source = Some(Box::new(source));
    {
      let mut control = self.shared.lock();
      control.position = 0;
      control.pending_seek = None;
    }
    info!(
      "已加载输入: {} 帧, {:?} fps",
      self.total_frames.map_or("未知".to_string(), |n| n.to_string()),
      self.fps
    );
    Ok(())
  }

  /// 按 URL 打开输入，失败时同时送出 [`PipelineEvent::Error`]
  pub fn load_url(&mut self, url: &Url) -> Result<(), PipelineError> {
    match InputWrapper::from_url(url) {
      Ok(input) => self.load(input),
      Err(e) => {
        error!("无法打开输入 {}: {}", url, e);
        self.shared.emit(PipelineEvent::Error(format!("无法打开输入 {}: {}", url, e)));
        Err(PipelineError::Load(e))
      }
    }
  }

  pub fn pause(&self) {
    self.transition(PlaybackState::Running, PlaybackState::Paused);
  }

  pub fn resume(&self) {
    self.transition(PlaybackState::Paused, PlaybackState::Running);
  }

  /// 停止播放并释放输入，返回时处理线程已退出
  pub fn stop(&mut self) -> Result<(), PipelineError> {
    {
      let mut control = self.shared.lock();
      control.state = PlaybackState::Stopped;
      control.pending_seek = None;
    }
    self.shared.wake.notify_all();
    self.reclaim()?;

    if let Some(mut source) = self.source.take() {
      source.release();
      info!("输入已释放");
    }
    Ok(())
  }

  /// 记录跳转目标，下一次迭代开始时生效
  pub fn seek(&self, index: u64) {
    self.shared.lock().pending_seek = Some(index);
    self.shared.wake.notify_all();
  }

  /// 修改运行时配置，处理线程在下一次迭代时读取
  pub fn update_config(&self, f: impl FnOnce(&mut Config)) -> Config {
    let mut control = self.shared.lock();
    f(&mut control.config);
    control.config
  }

  pub fn config(&self) -> Config {
    self.shared.lock().config
  }

  pub fn state(&self) -> PlaybackState {
    self.shared.lock().state
  }

  /// 下一帧的索引
  pub fn position(&self) -> u64 {
    self.shared.lock().position
  }

  pub fn total_frames(&self) -> Option<u64> {
    self.total_frames
  }

  pub fn source_fps(&self) -> Option<f64> {
    self.fps
  }

  pub fn is_loaded(&self) -> bool {
    self.source.is_some() || self.worker.is_some()
  }

  /// 处理线程不在运行时可用
  pub fn lane_detector(&self) -> Option<&LaneDetector> {
    self.stages.as_ref().map(|stages| &stages.lane)
  }

  fn transition(&self, from: PlaybackState, to: PlaybackState) {
    let mut control = self.shared.lock();
    if control.state == from {
      control.state = to;
      info!("播放状态: {:?} -> {:?}", from, to);
    }
    drop(control);
    self.shared.wake.notify_all();
  }

  /// 回收已退出（或即将退出）的处理线程
  fn reclaim(&mut self) -> Result<(), PipelineError> {
    if let Some(handle) = self.worker.take() {
      let exit = handle.join().map_err(|_| PipelineError::WorkerPanicked)?;
      self.stages = Some(exit.stages);
      self.source = exit.source;
    }
    Ok(())
  }
}

impl<D, S> PlaybackController<D, S>
where
  D: Model<Input = RgbImage, Output = DetectResult> + Send + 'static,
  D::Error: std::error::Error + Send + Sync + 'static,
  S: Model<Input = RgbImage, Output = SegmentResult> + Send + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  /// 开始播放；暂停时等同于 [`PlaybackController::resume`]
  pub fn start(&mut self) -> Result<(), PipelineError> {
    match self.state() {
      PlaybackState::Running => return Ok(()),
      PlaybackState::Paused => {
        self.resume();
        return Ok(());
      }
      PlaybackState::Stopped => {}
    }

    self.reclaim()?;
    let source = self.source.take().ok_or(PipelineError::NotLoaded)?;
    let Some(stages) = self.stages.take() else {
      self.source = Some(source);
      return Err(PipelineError::WorkerPanicked);
    };

    self.shared.lock().state = PlaybackState::Running;
    info!("开始播放，从第 {} 帧开始", self.position());
    let shared = Arc::clone(&self.shared);
    self.worker = Some(thread::spawn(move || worker::run(&shared, stages, source)));
    Ok(())
  }
}

impl<D, S> Drop for PlaybackController<D, S> {
  fn drop(&mut self) {
    if let Err(e) = self.stop() {
      error!("停止播放失败: {}", e);
    }
  }
}
