// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
  fs::OpenOptions,
  io::Write,
  path::{Path, PathBuf},
};

use chrono::Utc;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme, output::Render, pipeline::FrameResult, utils::LaneLine,
};

pub const RECORD_FILE: &str = "records.jsonl";

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 每帧保存为 `{index:06}.png`
///
/// `folder:///path?record` 额外在 `records.jsonl` 中为每帧追加一行统计。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  record: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let record = uri.query_pairs().any(|(k, _)| k == "record");
    Ok(Self::new(uri.path()).with_record(record))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl AsRef<Path>) -> Self {
    Self {
      directory: directory.as_ref().to_path_buf(),
      record: false,
    }
  }

  pub fn with_record(mut self, record: bool) -> Self {
    self.record = record;
    self
  }

  pub fn frame_path(&self, index: u64) -> PathBuf {
    self.directory.join(format!("{:06}.png", index))
  }

  pub fn record_path(&self) -> PathBuf {
    self.directory.join(RECORD_FILE)
  }

  fn append_record(&self, result: &FrameResult) -> Result<(), DirectoryRecordOutputError> {
    let line = serde_json::to_string(&record_line(result))?;
    let mut file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(self.record_path())?;
    writeln!(file, "{}", line)?;
    Ok(())
  }
}

fn lane_value(line: Option<LaneLine>) -> Value {
  match line {
    Some(line) => json!([line.x1, line.y1, line.x2, line.y2]),
    None => Value::Null,
  }
}

/// 一帧的统计；无穷远的距离记为 null
pub fn record_line(result: &FrameResult) -> Value {
  let detections: Vec<Value> = result
    .detections
    .iter()
    .map(|d| {
      json!({
        "class_id": d.class_id,
        "class_name": d.class_name,
        "confidence": d.confidence,
        "bbox": d.bbox,
        "distance": d.distance,
      })
    })
    .collect();

  json!({
    "index": result.index,
    "timestamp_ms": result.frame.timestamp_ms,
    "recorded_at": Utc::now().to_rfc3339(),
    "fps": result.stats.fps,
    "processing_time_ms": result.stats.processing_time_ms,
    "total_objects": result.stats.total_objects,
    "dangerous_objects": result.stats.dangerous_objects,
    "object_counts": result.stats.object_counts,
    "lanes": {
      "left": lane_value(result.lanes.left),
      "right": lane_value(result.lanes.right),
    },
    "departure": result.departure.map(|d| d.offset),
    "detections": detections,
  })
}

impl Render<FrameResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, result: &FrameResult) -> Result<(), Self::Error> {
    std::fs::create_dir_all(&self.directory)?;
    let path = self.frame_path(result.index);
    result.frame.image.save(&path)?;
    if self.record {
      self.append_record(result)?;
    }
    debug!("第 {} 帧记录到 {}", result.index, path.display());
    Ok(())
  }
}
