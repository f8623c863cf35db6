// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/frame.rs - 推理帧：原始图像、输出张量与几何上下文
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

use image::{Rgb, RgbImage};

use crate::{
  geometry::GeometryContext,
  tensor::{Tensor, TensorView},
};

const BLANK_COLOR: [u8; 3] = [0, 0, 0];

#[derive(Debug, Clone)]
pub struct Frame {
  /// 原始图像，渲染时作为底图
  pub image: RgbImage,
  pub tensor: Tensor,
  pub geometry: GeometryContext,
}

impl Frame {
  pub fn new(image: RgbImage, tensor: Tensor, geometry: GeometryContext) -> Self {
    Self {
      image,
      tensor,
      geometry,
    }
  }

  /// 没有原始图像时，用与原图等大的纯色底图
  pub fn blank(tensor: Tensor, geometry: GeometryContext) -> Self {
    let image = RgbImage::from_pixel(
      geometry.original_width(),
      geometry.original_height(),
      Rgb(BLANK_COLOR),
    );
    Self::new(image, tensor, geometry)
  }

  pub fn view(&self) -> TensorView<'_> {
    self.tensor.view()
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}
