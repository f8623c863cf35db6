// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/output/record.rs - 以 JSON 记录后处理结果
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
  fs::File,
  io::{BufWriter, Write},
  path::Path,
};

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, output::Render};

#[derive(Error, Debug)]
pub enum RecordOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct Record<'a, D> {
  width: u32,
  height: u32,
  #[serde(flatten)]
  result: &'a D,
}

/// 结果记录，`record:///path/to/result.json`
pub struct RecordOutput {
  path: String,
}

impl FromUrlWithScheme for RecordOutput {
  const SCHEME: &'static str = "record";
}

impl FromUrl for RecordOutput {
  type Error = RecordOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RecordOutputError::SchemeMismatch(url.scheme().to_string()));
    }
    Ok(RecordOutput {
      path: url.path().to_string(),
    })
  }
}

impl<D: Serialize> Render<Frame, D> for RecordOutput {
  type Error = RecordOutputError;

  fn render_result(&self, frame: &Frame, result: &D) -> Result<(), Self::Error> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let record = Record {
      width: frame.width(),
      height: frame.height(),
      result,
    };
    let mut writer = BufWriter::new(File::create(&self.path)?);
    serde_json::to_writer_pretty(&mut writer, &record)?;
    writer.flush()?;

    info!("结果已写入: {}", self.path);
    Ok(())
  }
}
