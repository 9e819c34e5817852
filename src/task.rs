// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 任务
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
  sync::mpsc::{self, RecvTimeoutError},
  thread,
  time::{Duration, Instant},
};

use image::RgbImage;
use tracing::{info, warn};

use crate::{
  model::{DetectResult, Model, SegmentResult},
  output::Render,
  pipeline::{FrameResult, PipelineEvent, PlaybackController},
};

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub trait Task<C, O>: Sized {
  type Error;
  fn run_task(self, controller: C, output: O) -> Result<(), Self::Error>;
}

/// 回放已加载的输入，把每帧结果交给输出
///
/// 读到末尾、达到指定帧数或收到 Ctrl-C 时结束。
#[derive(Default, Debug)]
pub struct ReplayTask {
  frame_number: Option<usize>,
}

impl ReplayTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<D, S, O, RE> Task<PlaybackController<D, S>, O> for ReplayTask
where
  D: Model<Input = RgbImage, Output = DetectResult> + Send + 'static,
  D::Error: std::error::Error + Send + Sync + 'static,
  S: Model<Input = RgbImage, Output = SegmentResult> + Send + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
  O: Render<FrameResult, Error = RE>,
  RE: std::error::Error + Send + Sync + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, mut controller: PlaybackController<D, S>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (tx, rx) = mpsc::channel();

    if let Err(e) = ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    }) {
      warn!("无法设置 Ctrl-C 处理: {}", e);
    }

    let events = controller.subscribe();
    controller.start()?;

    let started = Instant::now();
    let mut frames = 0usize;
    let mut dangerous = 0usize;
    loop {
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }

      match events.recv_timeout(EVENT_POLL_INTERVAL) {
        Ok(PipelineEvent::Frame(result)) => {
          frames += 1;
          dangerous += result.stats.dangerous_objects;
          info!(
            "第 {} 帧: {} 个目标, {:.1} fps, 耗时 {:.2}ms",
            result.index, result.stats.total_objects, result.stats.fps, result.stats.processing_time_ms
          );
          output.render_result(&result)?;
          if self.frame_number.is_some_and(|n| frames >= n) {
            info!("达到指定帧数 {}, 退出任务循环", frames);
            break;
          }
        }
        Ok(PipelineEvent::Finished) => {
          info!("输入结束");
          break;
        }
        Ok(PipelineEvent::Error(message)) => {
          controller.stop()?;
          return Err(anyhow::anyhow!(message));
        }
        Err(RecvTimeoutError::Timeout) => continue,
        Err(RecvTimeoutError::Disconnected) => break,
      }
    }

    controller.stop()?;
    info!(
      "任务完成: {} 帧, 危险目标累计 {} 次, 用时 {:.2?}",
      frames,
      dangerous,
      started.elapsed()
    );
    Ok(())
  }
}
