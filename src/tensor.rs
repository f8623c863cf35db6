// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/tensor.rs - 通道优先（channel-major）的输出张量
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

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TensorError {
  #[error("张量数据长度不足: 期望 {expected}, 实际 {actual}")]
  MalformedTensor { expected: usize, actual: usize },
  #[error("不支持的张量形状: {0:?}")]
  UnsupportedShape(Vec<usize>),
}

/// 输出张量的只读视图，形状为 `[channels, anchors]`
///
/// 第 `c` 个通道、第 `i` 个锚点位于 `c * anchors + i`。
/// 越界读取返回 `0.0`，不会 panic。
#[derive(Debug, Clone, Copy)]
pub struct TensorView<'a> {
  data: &'a [f32],
  channels: usize,
  anchors: usize,
}

impl<'a> TensorView<'a> {
  pub fn new(data: &'a [f32], channels: usize, anchors: usize) -> Self {
    Self {
      data,
      channels,
      anchors,
    }
  }

  /// 数据长度必须覆盖声明的形状
  pub fn strict(data: &'a [f32], channels: usize, anchors: usize) -> Result<Self, TensorError> {
    let view = Self::new(data, channels, anchors);
    view.check_complete()?;
    Ok(view)
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn anchors(&self) -> usize {
    self.anchors
  }

  pub fn data(&self) -> &'a [f32] {
    self.data
  }

  pub fn expected_len(&self) -> usize {
    self.channels.saturating_mul(self.anchors)
  }

  pub fn check_complete(&self) -> Result<(), TensorError> {
    if self.data.len() < self.expected_len() {
      return Err(TensorError::MalformedTensor {
        expected: self.expected_len(),
        actual: self.data.len(),
      });
    }
    Ok(())
  }

  #[inline]
  pub fn get(&self, channel: usize, anchor: usize) -> f32 {
    if channel >= self.channels || anchor >= self.anchors {
      return 0.0;
    }
    // 声明的形状可能远大于数据，索引溢出同样按越界处理
    channel
      .checked_mul(self.anchors)
      .and_then(|offset| offset.checked_add(anchor))
      .and_then(|index| self.data.get(index))
      .copied()
      .unwrap_or(0.0)
  }
}

/// 拥有数据的张量
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
  data: Box<[f32]>,
  channels: usize,
  anchors: usize,
}

impl Tensor {
  pub fn new(data: Vec<f32>, channels: usize, anchors: usize) -> Self {
    Self {
      data: data.into_boxed_slice(),
      channels,
      anchors,
    }
  }

  /// 接受 `[channels, anchors]` 或 `[1, channels, anchors]`
  pub fn from_shape(data: Vec<f32>, shape: &[usize]) -> Result<Self, TensorError> {
    match *shape {
      [channels, anchors] | [1, channels, anchors] => Ok(Self::new(data, channels, anchors)),
      _ => Err(TensorError::UnsupportedShape(shape.to_vec())),
    }
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn anchors(&self) -> usize {
    self.anchors
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn view(&self) -> TensorView<'_> {
    TensorView::new(&self.data, self.channels, self.anchors)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_channel_major() {
    // 2 个通道，3 个锚点
    let data = [1.0, 2.0, 3.0, 10.0, 20.0, 30.0];
    let view = TensorView::new(&data, 2, 3);
    assert_eq!(view.get(0, 2), 3.0);
    assert_eq!(view.get(1, 0), 10.0);
    assert_eq!(view.get(1, 2), 30.0);
  }

  #[test]
  fn out_of_range_reads_are_zero() {
    let data = [1.0, 2.0, 3.0, 4.0];
    let view = TensorView::new(&data, 3, 2);
    assert_eq!(view.get(2, 0), 0.0);
    assert_eq!(view.get(5, 0), 0.0);
    assert_eq!(view.get(0, 7), 0.0);
  }

  #[test]
  fn oversized_shape_reads_are_zero() {
    let tensor = Tensor::from_shape(vec![0.5; 10], &[84, usize::MAX / 40]).unwrap();
    let view = tensor.view();
    assert_eq!(view.get(83, 0), 0.0);
    assert_eq!(view.get(83, usize::MAX / 40 - 1), 0.0);
    assert_eq!(view.get(0, 3), 0.5);
    assert_eq!(view.data().len(), 10);
    assert!(view.check_complete().is_err());
  }

  #[test]
  fn strict_view_rejects_short_buffers() {
    let data = [0.0; 5];
    assert_eq!(
      TensorView::strict(&data, 2, 3).unwrap_err(),
      TensorError::MalformedTensor {
        expected: 6,
        actual: 5
      }
    );
    assert!(TensorView::strict(&data, 1, 5).is_ok());
  }

  #[test]
  fn shape_with_batch_dimension() {
    let tensor = Tensor::from_shape(vec![0.0; 12], &[1, 4, 3]).unwrap();
    assert_eq!((tensor.channels(), tensor.anchors()), (4, 3));
    assert!(matches!(
      Tensor::from_shape(vec![], &[2, 4, 3]),
      Err(TensorError::UnsupportedShape(_))
    ));
  }
}
