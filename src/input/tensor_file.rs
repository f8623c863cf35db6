// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/input/tensor_file.rs - 从文件读取模型输出张量
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

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  tensor::{Tensor, TensorError},
};

#[derive(Error, Debug)]
pub enum TensorFileInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("张量错误: {0}")]
  TensorError(#[from] TensorError),
  #[error("原始张量文件长度 {0} 不是 4 的倍数")]
  UnalignedRawData(usize),
  #[error("原始张量文件缺少参数: {0}")]
  MissingParameter(&'static str),
  #[error("参数 {key} 的值无效: {value}")]
  InvalidParameter { key: String, value: String },
}

/// JSON 张量文件：`{ "shape": [channels, anchors], "data": [...] }`
#[derive(Debug, Deserialize)]
struct TensorFile {
  shape: Vec<usize>,
  data: Vec<f32>,
}

/// 张量文件输入
///
/// - `tensor:///path/output.json`
/// - `tensor:///path/output.bin?channels=84&anchors=8400`（小端 f32）
pub struct TensorFileInput {
  tensor: Option<Tensor>,
}

impl FromUrlWithScheme for TensorFileInput {
  const SCHEME: &'static str = "tensor";
}

impl FromUrl for TensorFileInput {
  type Error = TensorFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(TensorFileInputError::SchemeMismatch(url.scheme().to_string()));
    }

    let path = Path::new(url.path());
    info!("读取张量文件: {}", path.display());

    let is_json = path
      .extension()
      .map(|ext| ext.eq_ignore_ascii_case("json"))
      .unwrap_or(false);
    let tensor = if is_json {
      read_json(path)?
    } else {
      read_raw(path, url)?
    };

    debug!(
      "张量形状: [{}, {}], 数据长度: {}",
      tensor.channels(),
      tensor.anchors(),
      tensor.len()
    );

    Ok(TensorFileInput {
      tensor: Some(tensor),
    })
  }
}

impl TensorFileInput {
  pub fn into_tensor(mut self) -> Option<Tensor> {
    self.tensor.take()
  }
}

impl Iterator for TensorFileInput {
  type Item = Tensor;

  fn next(&mut self) -> Option<Self::Item> {
    self.tensor.take()
  }
}

fn read_json(path: &Path) -> Result<Tensor, TensorFileInputError> {
  let file = std::fs::File::open(path)?;
  let TensorFile { shape, data } = serde_json::from_reader(std::io::BufReader::new(file))?;
  Ok(Tensor::from_shape(data, &shape)?)
}

fn read_raw(path: &Path, url: &Url) -> Result<Tensor, TensorFileInputError> {
  let bytes = std::fs::read(path)?;
  if bytes.len() % 4 != 0 {
    return Err(TensorFileInputError::UnalignedRawData(bytes.len()));
  }
  let data: Vec<f32> = bytes
    .chunks_exact(4)
    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    .collect();

  let mut channels = None;
  let mut anchors = None;
  for (key, value) in url.query_pairs() {
    let parsed = value
      .parse::<usize>()
      .map_err(|_| TensorFileInputError::InvalidParameter {
        key: key.to_string(),
        value: value.to_string(),
      })?;
    match &*key {
      "channels" => channels = Some(parsed),
      "anchors" => anchors = Some(parsed),
      _ => {
        return Err(TensorFileInputError::InvalidParameter {
          key: key.to_string(),
          value: value.to_string(),
        });
      }
    }
  }

  let channels = channels
    .filter(|&c| c > 0)
    .ok_or(TensorFileInputError::MissingParameter("channels"))?;
  // 未给出锚点数时按数据长度推断
  let anchors = anchors.unwrap_or(data.len() / channels);
  Ok(Tensor::new(data, channels, anchors))
}
