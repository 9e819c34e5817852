// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/replay.rs - 回放任务测试
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

use image::{Rgb, RgbImage};
use url::Url;

use shanan_lane::{
  FromUrl,
  config::Config,
  detection::LaneOnlyEngine,
  input::MemoryInput,
  output::{Draw, OutputWrapper, RECORD_FILE},
  pipeline::PlaybackController,
  task::{ReplayTask, Task},
};

#[test]
fn replay_records_every_frame_until_limit() {
  let dir = std::env::temp_dir().join(format!("shanan-lane-replay-{}", std::process::id()));
  let _ = std::fs::remove_dir_all(&dir);

  let frames = (0..5)
    .map(|i| RgbImage::from_pixel(48, 32, Rgb([i * 40, 0, 0])))
    .collect();
  let mut controller = PlaybackController::new(LaneOnlyEngine::new())
    .with_config(Config::default().with_realtime(false))
    .with_draw(Draw::new());
  controller.load(MemoryInput::new(frames)).unwrap();

  let url = Url::parse(&format!("folder://{}?record", dir.display())).unwrap();
  let output = OutputWrapper::from_url(&url).unwrap();

  ReplayTask::default()
    .with_frame_number(Some(3))
    .run_task(controller, output)
    .unwrap();

  for i in 0..3 {
    assert!(dir.join(format!("{:06}.png", i)).exists());
  }
  assert!(!dir.join("000003.png").exists());

  let records = std::fs::read_to_string(dir.join(RECORD_FILE)).unwrap();
  assert_eq!(records.lines().count(), 3);
  let first: serde_json::Value = serde_json::from_str(records.lines().next().unwrap()).unwrap();
  assert_eq!(first["index"], 0);

  std::fs::remove_dir_all(&dir).unwrap();
}
