// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/geometry.rs - 网络输入空间与原始图像空间之间的坐标映射
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

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
  #[error("原始图像尺寸无效: {0}x{1}")]
  InvalidOriginalSize(u32, u32),
  #[error("模型输入尺寸无效: {0}x{1}")]
  InvalidInputSize(u32, u32),
  #[error("缩放比例必须为有限正数: scale_x={0}, scale_y={1}")]
  InvalidScale(f32, f32),
  #[error("填充必须为有限值: pad_x={0}, pad_y={1}")]
  InvalidPadding(f32, f32),
}

/// 边界框，左上角坐标 + 宽高
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BBox {
  /// 左上角 x 坐标
  pub x: f32,
  /// 左上角 y 坐标
  pub y: f32,
  /// 宽度
  pub width: f32,
  /// 高度
  pub height: f32,
}

impl BBox {
  pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  pub fn right(&self) -> f32 {
    self.x + self.width
  }

  pub fn bottom(&self) -> f32 {
    self.y + self.height
  }

  pub fn area(&self) -> f32 {
    self.width * self.height
  }

  /// `[x, y, width, height]`
  pub fn to_array(&self) -> [f32; 4] {
    [self.x, self.y, self.width, self.height]
  }
}

/// 几何上下文：描述输入张量空间到原始图像空间的映射
///
/// `scale_*` 为输入空间像素 / 原始图像像素，`pad_*` 为输入空间中的填充偏移。
/// 映射回原图时先减去填充，再除以缩放比例。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryContext {
  original_width: u32,
  original_height: u32,
  scale_x: f32,
  scale_y: f32,
  pad_x: f32,
  pad_y: f32,
}

impl GeometryContext {
  pub fn new(
    original_width: u32,
    original_height: u32,
    scale_x: f32,
    scale_y: f32,
    pad_x: f32,
    pad_y: f32,
  ) -> Result<Self, GeometryError> {
    if original_width == 0 || original_height == 0 {
      return Err(GeometryError::InvalidOriginalSize(
        original_width,
        original_height,
      ));
    }
    if !(scale_x.is_finite() && scale_y.is_finite() && scale_x > 0.0 && scale_y > 0.0) {
      return Err(GeometryError::InvalidScale(scale_x, scale_y));
    }
    if !(pad_x.is_finite() && pad_y.is_finite()) {
      return Err(GeometryError::InvalidPadding(pad_x, pad_y));
    }

    Ok(Self {
      original_width,
      original_height,
      scale_x,
      scale_y,
      pad_x,
      pad_y,
    })
  }

  /// 等比缩放 + 对称填充（letterbox）
  pub fn letterbox(
    original_width: u32,
    original_height: u32,
    input_width: u32,
    input_height: u32,
  ) -> Result<Self, GeometryError> {
    check_sizes(original_width, original_height, input_width, input_height)?;

    let scale = (input_width as f32 / original_width as f32)
      .min(input_height as f32 / original_height as f32);
    let scaled_width = scaled_len(original_width, scale);
    let scaled_height = scaled_len(original_height, scale);
    // 填充取整数像素，与预处理时图像的实际放置位置保持一致
    let pad_x = (input_width.saturating_sub(scaled_width) / 2) as f32;
    let pad_y = (input_height.saturating_sub(scaled_height) / 2) as f32;

    Self::new(original_width, original_height, scale, scale, pad_x, pad_y)
  }

  /// 两个轴独立缩放，无填充
  pub fn stretch(
    original_width: u32,
    original_height: u32,
    input_width: u32,
    input_height: u32,
  ) -> Result<Self, GeometryError> {
    check_sizes(original_width, original_height, input_width, input_height)?;

    Self::new(
      original_width,
      original_height,
      input_width as f32 / original_width as f32,
      input_height as f32 / original_height as f32,
      0.0,
      0.0,
    )
  }

  pub fn original_width(&self) -> u32 {
    self.original_width
  }

  pub fn original_height(&self) -> u32 {
    self.original_height
  }

  pub fn scale(&self) -> (f32, f32) {
    (self.scale_x, self.scale_y)
  }

  pub fn padding(&self) -> (f32, f32) {
    (self.pad_x, self.pad_y)
  }

  /// 原始图像缩放到输入空间后的尺寸（不含填充）
  pub fn scaled_size(&self) -> (u32, u32) {
    (
      scaled_len(self.original_width, self.scale_x),
      scaled_len(self.original_height, self.scale_y),
    )
  }

  /// 中心点形式的框映射到原始图像空间，并裁剪到图像范围内
  pub fn map_to_original(&self, cx: f32, cy: f32, w: f32, h: f32) -> BBox {
    let (x1, y1) = self.unclamped(cx - w / 2.0, cy - h / 2.0);
    let (x2, y2) = self.unclamped(cx + w / 2.0, cy + h / 2.0);

    let (max_x, max_y) = (self.original_width as f32, self.original_height as f32);
    let x1 = x1.clamp(0.0, max_x);
    let y1 = y1.clamp(0.0, max_y);
    let x2 = x2.clamp(0.0, max_x);
    let y2 = y2.clamp(0.0, max_y);

    BBox::new(x1, y1, (x2 - x1).max(0.0), (y2 - y1).max(0.0))
  }

  /// 单点映射（用于关键点），同样裁剪到图像范围内
  pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
    let (x, y) = self.unclamped(x, y);
    (
      x.clamp(0.0, self.original_width as f32),
      y.clamp(0.0, self.original_height as f32),
    )
  }

  /// 原始图像空间 -> 输入空间
  pub fn to_input(&self, x: f32, y: f32) -> (f32, f32) {
    (x * self.scale_x + self.pad_x, y * self.scale_y + self.pad_y)
  }

  fn unclamped(&self, x: f32, y: f32) -> (f32, f32) {
    (
      (x - self.pad_x) / self.scale_x,
      (y - self.pad_y) / self.scale_y,
    )
  }
}

/// 自由函数形式的映射，等价于 [`GeometryContext::map_to_original`]
pub fn map_to_original(
  cx: f32,
  cy: f32,
  w: f32,
  h: f32,
  context: &GeometryContext,
) -> BBox {
  context.map_to_original(cx, cy, w, h)
}

fn check_sizes(
  original_width: u32,
  original_height: u32,
  input_width: u32,
  input_height: u32,
) -> Result<(), GeometryError> {
  if original_width == 0 || original_height == 0 {
    return Err(GeometryError::InvalidOriginalSize(
      original_width,
      original_height,
    ));
  }
  if input_width == 0 || input_height == 0 {
    return Err(GeometryError::InvalidInputSize(input_width, input_height));
  }
  Ok(())
}

fn scaled_len(len: u32, scale: f32) -> u32 {
  ((len as f32 * scale).round() as u32).max(1)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn assert_box(actual: BBox, expected: [f32; 4]) {
    let actual = actual.to_array();
    for (a, e) in actual.iter().zip(expected.iter()) {
      assert!((a - e).abs() < 1e-3, "{:?} != {:?}", actual, expected);
    }
  }

  #[test]
  fn letterbox_regression_fixture() {
    // 1280x960 -> 640x640: scale 0.5, pad (0, 80)
    let ctx = GeometryContext::letterbox(1280, 960, 640, 640).unwrap();
    assert_eq!(ctx.scale(), (0.5, 0.5));
    assert_eq!(ctx.padding(), (0.0, 80.0));

    // corner box (100, 100, 200, 150) in model space
    let mapped = ctx.map_to_original(100.0 + 100.0, 100.0 + 75.0, 200.0, 150.0);
    assert_box(mapped, [200.0, 40.0, 400.0, 300.0]);
  }

  #[test]
  fn explicit_parameters_match_fixture() {
    let ctx = GeometryContext::new(1280, 960, 0.5, 0.5, 0.0, 80.0).unwrap();
    let mapped = map_to_original(200.0, 175.0, 200.0, 150.0, &ctx);
    assert_box(mapped, [200.0, 40.0, 400.0, 300.0]);
  }

  #[test]
  fn stretch_scales_axes_independently() {
    let ctx = GeometryContext::stretch(1280, 320, 640, 640).unwrap();
    assert_eq!(ctx.padding(), (0.0, 0.0));
    let mapped = ctx.map_to_original(320.0, 320.0, 64.0, 64.0);
    assert_box(mapped, [576.0, 144.0, 128.0, 32.0]);
  }

  #[test]
  fn boxes_are_clamped_to_the_image() {
    let ctx = GeometryContext::new(100, 100, 1.0, 1.0, 0.0, 0.0).unwrap();
    let mapped = ctx.map_to_original(0.0, 95.0, 40.0, 40.0);
    assert_box(mapped, [0.0, 75.0, 20.0, 25.0]);

    // 完全落在图像外的框退化为零面积
    let outside = ctx.map_to_original(-50.0, -50.0, 10.0, 10.0);
    assert_eq!(outside.width, 0.0);
    assert_eq!(outside.height, 0.0);
  }

  #[test]
  fn points_round_trip_through_input_space() {
    let ctx = GeometryContext::letterbox(1280, 960, 640, 640).unwrap();
    let (ix, iy) = ctx.to_input(300.0, 200.0);
    let (x, y) = ctx.map_point(ix, iy);
    assert!((x - 300.0).abs() < 1e-3);
    assert!((y - 200.0).abs() < 1e-3);
  }

  #[test]
  fn rejects_invalid_parameters() {
    assert_eq!(
      GeometryContext::new(0, 10, 1.0, 1.0, 0.0, 0.0),
      Err(GeometryError::InvalidOriginalSize(0, 10))
    );
    assert!(matches!(
      GeometryContext::new(10, 10, 0.0, 1.0, 0.0, 0.0),
      Err(GeometryError::InvalidScale(..))
    ));
    assert!(matches!(
      GeometryContext::new(10, 10, 1.0, f32::NAN, 0.0, 0.0),
      Err(GeometryError::InvalidScale(..))
    ));
    assert!(matches!(
      GeometryContext::new(10, 10, 1.0, 1.0, f32::INFINITY, 0.0),
      Err(GeometryError::InvalidPadding(..))
    ));
    assert_eq!(
      GeometryContext::letterbox(10, 10, 0, 640),
      Err(GeometryError::InvalidInputSize(0, 640))
    );
  }
}
