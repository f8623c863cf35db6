// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/model/segment.rs - 实例分割结果组装
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

use tracing::debug;

use crate::{
  decode::{BOX_CHANNELS, decode_segmentation},
  geometry::GeometryContext,
  labels::{class_color, class_name},
  model::{
    Detection, MaskPrototypes, ModelType, Postprocess, PostprocessError, PostprocessOptions,
    Segmentation, decode_prototype_mask, fill_box_mask, select,
  },
  tensor::TensorView,
};

#[derive(Debug, Clone)]
pub struct YoloSegment {
  options: PostprocessOptions,
}

impl YoloSegment {
  pub fn new(options: PostprocessOptions) -> Result<Self, PostprocessError> {
    options.expect_model_type(ModelType::Segmentation)?;
    options.validate()?;
    Ok(Self { options })
  }

  pub fn options(&self) -> &PostprocessOptions {
    &self.options
  }

  /// 通道数 = 4 + 类别数 + 掩码系数数
  fn num_classes(&self, channels: usize) -> Result<usize, PostprocessError> {
    let required = BOX_CHANNELS + 1 + self.options.mask_coefficients;
    if channels < required {
      return Err(PostprocessError::LayoutMismatch {
        model_type: ModelType::Segmentation,
        channels,
        required,
      });
    }
    Ok(channels - BOX_CHANNELS - self.options.mask_coefficients)
  }

  /// 使用掩码原型解码真实掩码
  pub fn postprocess_with_prototypes(
    &self,
    tensor: &TensorView<'_>,
    prototypes: &MaskPrototypes<'_>,
    geometry: &GeometryContext,
  ) -> Result<Vec<Segmentation>, PostprocessError> {
    if prototypes.count() != self.options.mask_coefficients {
      return Err(PostprocessError::PrototypeMismatch {
        expected: self.options.mask_coefficients,
        actual: prototypes.count(),
      });
    }
    self.assemble(tensor, geometry, Some(prototypes))
  }

  fn assemble(
    &self,
    tensor: &TensorView<'_>,
    geometry: &GeometryContext,
    prototypes: Option<&MaskPrototypes<'_>>,
  ) -> Result<Vec<Segmentation>, PostprocessError> {
    self.options.check_tensor(tensor)?;
    let num_classes = self.num_classes(tensor.channels())?;
    debug!(
      "后处理分割输出: {} 个类别, {} 个掩码系数, {} 个锚点",
      num_classes,
      self.options.mask_coefficients,
      tensor.anchors()
    );

    let candidates = decode_segmentation(
      tensor,
      geometry,
      num_classes,
      self.options.mask_coefficients,
      &self.options.filter(),
    );

    let segmentations = select(candidates, &self.options)
      .into_iter()
      .map(|(bbox, score, payload)| {
        let color = class_color(payload.class_index);
        let mask = match prototypes {
          Some(prototypes) => {
            decode_prototype_mask(&bbox, &payload.coefficients, prototypes, geometry, color)
          }
          None => fill_box_mask(&bbox, geometry, color),
        };
        Segmentation {
          detection: Detection {
            bbox: bbox.to_array(),
            score,
            class: class_name(payload.class_index).to_string(),
            class_index: payload.class_index,
          },
          mask,
        }
      })
      .collect::<Vec<_>>();

    debug!("分割得到 {} 个实例", segmentations.len());
    Ok(segmentations)
  }
}

impl Postprocess for YoloSegment {
  type Output = Vec<Segmentation>;
  type Error = PostprocessError;

  /// 不带原型时生成框形占位掩码
  fn postprocess(
    &self,
    tensor: &TensorView<'_>,
    geometry: &GeometryContext,
  ) -> Result<Self::Output, Self::Error> {
    self.assemble(tensor, geometry, None)
  }
}
