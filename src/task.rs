// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/task.rs - 后处理任务
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

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::{frame::Frame, model::Postprocess, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame>,
  M: Postprocess<Output = D, Error = ME>,
  O: Render<Frame, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始后处理...");
    let now = Instant::now();
    let result = model.postprocess(&frame.view(), &frame.geometry)?;
    let elapsed = now.elapsed();
    info!("后处理完成，耗时: {:.2?}", elapsed);
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 重复执行同一帧，用于计时
pub struct RepeatShotTask {
  repeat: usize,
}

impl RepeatShotTask {
  /// 前两次视为预热，不计入平均耗时
  pub const WARMUP: usize = 2;

  pub fn new(repeat: usize) -> Self {
    Self { repeat }
  }
}

impl<
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame>,
  M: Postprocess<Output = D, Error = ME>,
  O: Render<Frame, D, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    anyhow::ensure!(self.repeat > 0, "重复次数必须为正整数");
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始后处理...");
    let view = frame.view();
    let mut times = Vec::with_capacity(self.repeat);
    for i in 0..self.repeat {
      let now = Instant::now();
      let result = model.postprocess(&view, &frame.geometry)?;
      let elapsed = now.elapsed();
      info!("({})后处理完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frame, &result)?;
      info!("({})渲染完成，耗时: {:.2?}", i, now.elapsed());
      times.push(elapsed);
    }

    if let Some(mean) = mean_after_warmup(&times) {
      warn!("平均后处理时间: {:.2?}", mean);
    }

    Ok(())
  }
}

fn mean_after_warmup(times: &[Duration]) -> Option<Duration> {
  let skip = if times.len() > RepeatShotTask::WARMUP {
    RepeatShotTask::WARMUP
  } else {
    0
  };
  let counted = &times[skip..];
  if counted.is_empty() {
    return None;
  }
  Some(counted.iter().sum::<Duration>() / counted.len() as u32)
}
