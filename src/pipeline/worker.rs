// 该文件是 Shanan （山南西风） 项目的一部分。
// src/pipeline/worker.rs - 处理线程
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
  any::Any,
  panic::{self, AssertUnwindSafe},
  sync::{Condvar, Mutex, MutexGuard, PoisonError, mpsc::Sender},
  time::Duration,
};

use image::RgbImage;
use tracing::{debug, error, info, warn};

use crate::{
  config::Config,
  detection::DetectionEngine,
  frame::DEFAULT_FPS,
  input::FrameSource,
  lane::{LaneDetector, LaneState},
  model::{DetectResult, Model, SegmentResult},
  output::Draw,
  pipeline::{FrameResult, PipelineEvent, PlaybackState},
  utils::{PerformanceMonitor, Timer},
};

/// 跨线程共享的控制块
#[derive(Debug)]
pub(crate) struct Control {
  pub state: PlaybackState,
  pub pending_seek: Option<u64>,
  pub position: u64,
  pub config: Config,
}

pub(crate) struct Shared {
  control: Mutex<Control>,
  events: Mutex<Sender<PipelineEvent>>,
  pub wake: Condvar,
}

impl Shared {
  pub fn new(config: Config, events: Sender<PipelineEvent>) -> Self {
    Self {
      control: Mutex::new(Control {
        state: PlaybackState::Stopped,
        pending_seek: None,
        position: 0,
        config,
      }),
      events: Mutex::new(events),
      wake: Condvar::new(),
    }
  }

  pub fn lock(&self) -> MutexGuard<'_, Control> {
    self.control.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn set_events(&self, events: Sender<PipelineEvent>) {
    *self.events.lock().unwrap_or_else(PoisonError::into_inner) = events;
  }

  /// 接收端已关闭时静默丢弃
  pub fn emit(&self, event: PipelineEvent) {
    let sender = self.events.lock().unwrap_or_else(PoisonError::into_inner);
    if sender.send(event).is_err() {
      debug!("事件接收端已关闭");
    }
  }

  fn set_state(&self, state: PlaybackState) {
    self.lock().state = state;
    self.wake.notify_all();
  }
}

/// 处理线程独占的各阶段
pub(crate) struct Stages<D, S> {
  pub lane: LaneDetector,
  pub engine: DetectionEngine<D, S>,
  pub monitor: PerformanceMonitor,
  pub draw: Option<Draw>,
}

/// 处理线程退出时交还的资源；被停止或出错时输入已释放
pub(crate) struct WorkerExit<D, S> {
  pub stages: Stages<D, S>,
  pub source: Option<Box<dyn FrameSource>>,
}

enum Step {
  Emitted(Box<FrameResult>),
  Skipped,
  Finished,
  Failed(String),
}

pub(crate) fn run<D, S>(
  shared: &Shared,
  mut stages: Stages<D, S>,
  mut source: Box<dyn FrameSource>,
) -> WorkerExit<D, S>
where
  D: Model<Input = RgbImage, Output = DetectResult>,
  D::Error: std::error::Error + Send + Sync + 'static,
  S: Model<Input = RgbImage, Output = SegmentResult>,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let frame_delay = frame_delay(source.fps());
  let mut count: u64 = 0;
  info!("处理线程启动，帧间隔 {:?}", frame_delay);

  loop {
    let (config, index) = {
      let mut control = shared.lock();
      loop {
        if let Some(target) = control.pending_seek.take() {
          if let Err(e) = source.seek(target) {
            drop(control);
            return fail(shared, stages, source, e.to_string());
          }
          info!("跳转到第 {} 帧", target);
          control.position = target;
          stages.lane.reset();
        }
        let state = control.state;
        match state {
          PlaybackState::Stopped => {
            drop(control);
            info!("处理线程收到停止指令");
            source.release();
            return WorkerExit {
              stages,
              source: None,
            };
          }
          PlaybackState::Paused => {
            control = shared
              .wake
              .wait(control)
              .unwrap_or_else(PoisonError::into_inner);
          }
          PlaybackState::Running => break (control.config, control.position),
        }
      }
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
      step(&mut stages, source.as_mut(), &config, index, &mut count)
    }))
    .unwrap_or_else(|payload| {
      Step::Failed(format!("处理第 {} 帧时发生异常: {}", index, panic_message(&*payload)))
    });

    match outcome {
      Step::Emitted(result) => shared.emit(PipelineEvent::Frame(result)),
      Step::Skipped => {
        shared.lock().position = index + 1;
        continue;
      }
      Step::Finished => {
        info!("输入结束，共处理 {} 帧", count);
        shared.set_state(PlaybackState::Stopped);
        shared.emit(PipelineEvent::Finished);
        return WorkerExit {
          stages,
          source: Some(source),
        };
      }
      Step::Failed(message) => return fail(shared, stages, source, message),
    }

    let mut control = shared.lock();
    control.position = index + 1;
    if config.realtime {
      let (guard, _) = shared
        .wake
        .wait_timeout_while(control, frame_delay, |c| {
          c.state == PlaybackState::Running && c.pending_seek.is_none()
        })
        .unwrap_or_else(PoisonError::into_inner);
      drop(guard);
    }
  }
}

fn step<D, S>(
  stages: &mut Stages<D, S>,
  source: &mut dyn FrameSource,
  config: &Config,
  index: u64,
  count: &mut u64,
) -> Step
where
  D: Model<Input = RgbImage, Output = DetectResult>,
  D::Error: std::error::Error + Send + Sync + 'static,
  S: Model<Input = RgbImage, Output = SegmentResult>,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let mut frame = match source.read_next() {
    Ok(Some(frame)) => frame,
    Ok(None) => return Step::Finished,
    Err(e) => return Step::Failed(format!("读取第 {} 帧失败: {}", index, e)),
  };
  frame.index = index;

  let skip = config.frame_skip() as u64;
  let nth = *count;
  *count += 1;
  if skip > 0 && nth % (skip + 1) != 0 {
    debug!("跳过第 {} 帧", index);
    return Step::Skipped;
  }

  let timer = Timer::start();

  let lanes = if config.lane_detection_enabled {
    stages.lane.detect(&frame.image)
  } else {
    LaneState::default()
  };
  let departure = lanes.departure(frame.width(), stages.lane.config().offset_threshold);
  if let Some(departure) = departure {
    warn!("第 {} 帧车道偏离: {}px", index, departure.offset);
  }

  let (detections, mut stats) = match stages.engine.detect_objects(&frame.image, config) {
    Ok(result) => result,
    Err(e) => return Step::Failed(e.to_string()),
  };
  if let Err(e) = stages.engine.apply_segmentation(&mut frame.image, config) {
    return Step::Failed(e.to_string());
  }
  if let Some(draw) = &stages.draw {
    draw.annotate(
      &mut frame.image,
      &lanes,
      departure,
      stages.lane.config(),
      &detections,
      config,
    );
  }

  stats.processing_time_ms = timer.elapsed_ms();
  stats.fps = stages.monitor.update_fps();

  debug!(
    "第 {} 帧: {} 个目标, 耗时 {:.2}ms",
    index, stats.total_objects, stats.processing_time_ms
  );
  Step::Emitted(Box::new(FrameResult {
    frame,
    detections,
    stats,
    lanes,
    departure,
    index,
  }))
}

fn fail<D, S>(
  shared: &Shared,
  stages: Stages<D, S>,
  mut source: Box<dyn FrameSource>,
  message: String,
) -> WorkerExit<D, S> {
  error!("{}", message);
  source.release();
  shared.set_state(PlaybackState::Stopped);
  shared.emit(PipelineEvent::Error(message));
  WorkerExit {
    stages,
    source: None,
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message
  } else {
    "未知错误"
  }
}

/// 按标称帧率节流，未知帧率时约 33ms
fn frame_delay(fps: Option<f64>) -> Duration {
  let fps = fps.filter(|f| *f > 0.0).unwrap_or(DEFAULT_FPS);
  Duration::from_millis((1000.0 / fps) as u64)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn frame_delay_defaults_to_33ms() {
    assert_eq!(frame_delay(None), Duration::from_millis(33));
    assert_eq!(frame_delay(Some(0.0)), Duration::from_millis(33));
    assert_eq!(frame_delay(Some(25.0)), Duration::from_millis(40));
  }

  #[test]
  fn panic_message_reads_str_and_string_payloads() {
    let boxed: Box<dyn Any + Send> = Box::new("越界");
    assert_eq!(panic_message(&*boxed), "越界");
    let boxed: Box<dyn Any + Send> = Box::new(String::from("掩码尺寸不符"));
    assert_eq!(panic_message(&*boxed), "掩码尺寸不符");
    let boxed: Box<dyn Any + Send> = Box::new(7_u8);
    assert_eq!(panic_message(&*boxed), "未知错误");
  }
}
