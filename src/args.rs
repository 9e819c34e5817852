// 该文件是 Shanan （山南西风） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;

/// 行车记录仪帧处理：车道检测与偏离提示
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源
  /// 支持格式:
  /// - 单张图片: image:///path/to/frame.png
  /// - 图像序列: folder:///path/to/frames?fps=30
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出路径
  /// 支持格式:
  /// - 最新一帧: image:///path/to/latest.png
  /// - 逐帧保存: folder:///path/to/out[?record]
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 跳帧数 (0 - 5)
  #[arg(long, default_value = "0", value_name = "COUNT")]
  pub frame_skip: u32,

  /// 关闭车道检测
  #[arg(long)]
  pub no_lanes: bool,

  /// 标签字体文件（TTF/OTF），缺省时不绘制文字
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 最多处理的帧数
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_flags() {
    let args = Args::try_parse_from([
      "shanan-lane",
      "--input",
      "folder:///data/clip?fps=25",
      "--output",
      "image:///tmp/latest.png",
      "--frame-skip",
      "2",
      "--no-lanes",
    ])
    .unwrap();
    assert_eq!(args.input.scheme(), "folder");
    assert_eq!(args.frame_skip, 2);
    assert!(args.no_lanes);
    assert!(args.frame_number.is_none());
    assert!(args.font.is_none());
  }

  #[test]
  fn rejects_confidence_flag() {
    let parsed = Args::try_parse_from([
      "shanan-lane",
      "--input",
      "image:///tmp/frame.png",
      "--output",
      "image:///tmp/latest.png",
      "--confidence",
      "0.7",
    ]);
    assert!(parsed.is_err());
  }
}
