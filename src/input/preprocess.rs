// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/input/preprocess.rs - 图像缩放到模型输入尺寸
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

use image::{Rgb, RgbImage, imageops};
use tracing::debug;

use crate::geometry::{GeometryContext, GeometryError};

/// letterbox 填充颜色
pub const LETTERBOX_FILL: [u8; 3] = [114, 114, 114];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ResizePolicy {
  /// 等比缩放并居中填充
  #[default]
  Letterbox,
  /// 两个轴独立缩放
  Stretch,
}

impl ResizePolicy {
  pub fn geometry(
    &self,
    original_width: u32,
    original_height: u32,
    input_width: u32,
    input_height: u32,
  ) -> Result<GeometryContext, GeometryError> {
    match self {
      ResizePolicy::Letterbox => {
        GeometryContext::letterbox(original_width, original_height, input_width, input_height)
      }
      ResizePolicy::Stretch => {
        GeometryContext::stretch(original_width, original_height, input_width, input_height)
      }
    }
  }
}

/// 按策略生成模型输入图像及其几何上下文
pub fn preprocess(
  image: &RgbImage,
  input_width: u32,
  input_height: u32,
  policy: ResizePolicy,
) -> Result<(RgbImage, GeometryContext), GeometryError> {
  match policy {
    ResizePolicy::Letterbox => letterbox(image, input_width, input_height),
    ResizePolicy::Stretch => stretch(image, input_width, input_height),
  }
}

pub fn letterbox(
  image: &RgbImage,
  input_width: u32,
  input_height: u32,
) -> Result<(RgbImage, GeometryContext), GeometryError> {
  let geometry =
    GeometryContext::letterbox(image.width(), image.height(), input_width, input_height)?;
  let (scaled_width, scaled_height) = geometry.scaled_size();
  let resized = imageops::resize(
    image,
    scaled_width.min(input_width),
    scaled_height.min(input_height),
    imageops::FilterType::Triangle,
  );

  let mut canvas = RgbImage::from_pixel(input_width, input_height, Rgb(LETTERBOX_FILL));
  let (pad_x, pad_y) = geometry.padding();
  imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

  debug!(
    "letterbox: {}x{} -> {}x{}, 填充 ({}, {})",
    image.width(),
    image.height(),
    resized.width(),
    resized.height(),
    pad_x,
    pad_y
  );
  Ok((canvas, geometry))
}

pub fn stretch(
  image: &RgbImage,
  input_width: u32,
  input_height: u32,
) -> Result<(RgbImage, GeometryContext), GeometryError> {
  let geometry =
    GeometryContext::stretch(image.width(), image.height(), input_width, input_height)?;
  let resized = imageops::resize(
    image,
    input_width,
    input_height,
    imageops::FilterType::Triangle,
  );
  Ok((resized, geometry))
}
