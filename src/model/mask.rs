// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/model/mask.rs - 分割掩码生成
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

use image::{Rgba, RgbaImage};

use crate::{
  geometry::{BBox, GeometryContext, GeometryError},
  model::PostprocessError,
  tensor::TensorError,
};

/// 掩码前景像素的透明度
pub const MASK_ALPHA: u8 = 128;

/// 掩码原型张量 `[K, mh, mw]`，位于输入空间的缩小版本上
#[derive(Debug, Clone, Copy)]
pub struct MaskPrototypes<'a> {
  data: &'a [f32],
  count: usize,
  height: usize,
  width: usize,
  // 输入空间像素 / 原型像素
  stride_x: f32,
  stride_y: f32,
}

impl<'a> MaskPrototypes<'a> {
  /// `shape` 为 `[K, mh, mw]` 或 `[1, K, mh, mw]`
  pub fn new(
    data: &'a [f32],
    shape: &[usize],
    input_width: u32,
    input_height: u32,
  ) -> Result<Self, PostprocessError> {
    let (count, height, width) = match *shape {
      [k, h, w] | [1, k, h, w] if k > 0 && h > 0 && w > 0 => (k, h, w),
      _ => return Err(TensorError::UnsupportedShape(shape.to_vec()).into()),
    };
    if input_width == 0 || input_height == 0 {
      return Err(GeometryError::InvalidInputSize(input_width, input_height).into());
    }

    Ok(Self {
      data,
      count,
      height,
      width,
      stride_x: input_width as f32 / width as f32,
      stride_y: input_height as f32 / height as f32,
    })
  }

  pub fn count(&self) -> usize {
    self.count
  }

  #[inline]
  fn get(&self, k: usize, y: usize, x: usize) -> f32 {
    self
      .data
      .get((k * self.height + y) * self.width + x)
      .copied()
      .unwrap_or(0.0)
  }

  /// 输入空间坐标处的掩码 logit，坐标超出原型范围时返回 `None`
  fn logit(&self, coefficients: &[f32], input_x: f32, input_y: f32) -> Option<f32> {
    let px = (input_x / self.stride_x).floor();
    let py = (input_y / self.stride_y).floor();
    if px < 0.0 || py < 0.0 {
      return None;
    }
    let (px, py) = (px as usize, py as usize);
    if px >= self.width || py >= self.height {
      return None;
    }

    Some(
      coefficients
        .iter()
        .take(self.count)
        .enumerate()
        .map(|(k, coef)| coef * self.get(k, py, px))
        .sum(),
    )
  }
}

/// 框在图像中覆盖的像素范围 `(x0, y0, x1, y1)`，右下为开区间
fn pixel_span(bbox: &BBox, width: u32, height: u32) -> (u32, u32, u32, u32) {
  let clamp = |v: f32, max: u32| -> u32 { v.max(0.0).min(max as f32) as u32 };
  (
    clamp(bbox.x.floor(), width),
    clamp(bbox.y.floor(), height),
    clamp(bbox.right().ceil(), width),
    clamp(bbox.bottom().ceil(), height),
  )
}

/// 占位掩码：框内填充半透明颜色，其余完全透明
pub fn fill_box_mask(bbox: &BBox, geometry: &GeometryContext, color: [u8; 3]) -> RgbaImage {
  let (width, height) = (geometry.original_width(), geometry.original_height());
  let mut mask = RgbaImage::new(width, height);
  let pixel = Rgba([color[0], color[1], color[2], MASK_ALPHA]);

  let (x0, y0, x1, y1) = pixel_span(bbox, width, height);
  for y in y0..y1 {
    for x in x0..x1 {
      mask.put_pixel(x, y, pixel);
    }
  }
  mask
}

/// 由原型与系数解码掩码：框内 `sigmoid(Σ coef_k · proto_k) > 0.5` 的像素着色
pub fn decode_prototype_mask(
  bbox: &BBox,
  coefficients: &[f32],
  prototypes: &MaskPrototypes,
  geometry: &GeometryContext,
  color: [u8; 3],
) -> RgbaImage {
  let (width, height) = (geometry.original_width(), geometry.original_height());
  let mut mask = RgbaImage::new(width, height);
  let pixel = Rgba([color[0], color[1], color[2], MASK_ALPHA]);

  let (x0, y0, x1, y1) = pixel_span(bbox, width, height);
  for y in y0..y1 {
    for x in x0..x1 {
      // 取像素中心映射回输入空间
      let (ix, iy) = geometry.to_input(x as f32 + 0.5, y as f32 + 0.5);
      if let Some(logit) = prototypes.logit(coefficients, ix, iy)
        && sigmoid(logit) > 0.5
      {
        mask.put_pixel(x, y, pixel);
      }
    }
  }
  mask
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}
