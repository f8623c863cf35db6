// 该文件是 Kuangxuan （框选） 项目的一部分。
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

use clap::Parser;
use url::Url;

use kuangxuan::input::preprocess::ResizePolicy;

/// Kuangxuan 后处理参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型输出张量，如 `tensor:///tmp/out.json`
  #[arg(long, value_name = "TENSOR")]
  pub tensor: Url,
  /// 后处理配置，如 `detect:?confidence=0.5&iou=0.45`
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 原始图像，如 `image:///tmp/in.jpg`
  #[arg(long, value_name = "SOURCE")]
  pub input: Option<Url>,
  /// 没有原始图像时指定原图尺寸，如 `1280x960`
  #[arg(long, value_name = "WxH", value_parser = parse_size)]
  pub original_size: Option<(u32, u32)>,
  /// 模型输入边长
  #[arg(long, default_value_t = 640, value_name = "PIXELS")]
  pub input_size: u32,
  /// 预处理缩放方式
  #[arg(long, value_enum, default_value_t = ResizePolicy::Letterbox)]
  pub resize: ResizePolicy,
  /// 输出路径，如 `image:///tmp/out.png` 或 `record:///tmp/out.json`
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 重复执行次数，用于计时
  #[arg(long, value_name = "TIMES", value_parser = clap::value_parser!(u64).range(1..))]
  pub repeat: Option<u64>,
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
  let (w, h) = s
    .split_once(['x', 'X'])
    .ok_or_else(|| format!("尺寸格式应为 WxH: {s}"))?;
  let w = w.trim().parse::<u32>().map_err(|e| e.to_string())?;
  let h = h.trim().parse::<u32>().map_err(|e| e.to_string())?;
  Ok((w, h))
}
