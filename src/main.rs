// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/main.rs - 从张量文件执行后处理
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

mod args;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::info;

use kuangxuan::{
  FromUrl, PostprocessBuilder,
  frame::Frame,
  input::{ImageFileInput, TensorFileInput},
  output::OutputWrapper,
  task::{OneShotTask, RepeatShotTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("张量文件: {}", args.tensor);
  info!("后处理配置: {}", args.model);
  info!("输出路径: {}", args.output);

  let tensor = TensorFileInput::from_url(&args.tensor)?
    .into_tensor()
    .ok_or_else(|| anyhow::anyhow!("张量文件为空"))?;
  let model = PostprocessBuilder::from_url(&args.model)?.build()?;

  let image = match &args.input {
    Some(url) => ImageFileInput::from_url(url)?.next(),
    None => None,
  };
  let (original_width, original_height) = match (&image, args.original_size) {
    (Some(image), _) => image.dimensions(),
    (None, Some(size)) => size,
    (None, None) => bail!("需要 --input 或 --original-size 以确定原图尺寸"),
  };

  let geometry = args.resize.geometry(
    original_width,
    original_height,
    args.input_size,
    args.input_size,
  )?;
  info!(
    "原图 {}x{}, 缩放 {:?}, 填充 {:?}",
    original_width,
    original_height,
    geometry.scale(),
    geometry.padding()
  );

  let frame = match image {
    Some(image) => Frame::new(image, tensor, geometry),
    None => Frame::blank(tensor, geometry),
  };
  let output = OutputWrapper::from_url(&args.output)?;
  let input = std::iter::once(frame);

  match args.repeat {
    Some(repeat) => {
      let task = RepeatShotTask::new(usize::try_from(repeat)?);
      task.run_task(input, model, output)?
    }
    None => OneShotTask.run_task(input, model, output)?,
  }

  Ok(())
}
