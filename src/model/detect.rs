// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/model/detect.rs - 目标检测结果组装
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
  decode::{BOX_CHANNELS, decode_detection},
  geometry::GeometryContext,
  labels::class_name,
  model::{Detection, ModelType, Postprocess, PostprocessError, PostprocessOptions, select},
  tensor::TensorView,
};

#[derive(Debug, Clone)]
pub struct YoloDetect {
  options: PostprocessOptions,
}

impl YoloDetect {
  pub fn new(options: PostprocessOptions) -> Result<Self, PostprocessError> {
    options.expect_model_type(ModelType::Detection)?;
    options.validate()?;
    Ok(Self { options })
  }

  pub fn options(&self) -> &PostprocessOptions {
    &self.options
  }

  /// `[cx, cy, w, h]` 之后的通道全部视为类别分数
  fn num_classes(&self, channels: usize) -> Result<usize, PostprocessError> {
    if channels <= BOX_CHANNELS {
      return Err(PostprocessError::LayoutMismatch {
        model_type: ModelType::Detection,
        channels,
        required: BOX_CHANNELS + 1,
      });
    }
    Ok(channels - BOX_CHANNELS)
  }
}

impl Postprocess for YoloDetect {
  type Output = Vec<Detection>;
  type Error = PostprocessError;

  fn postprocess(
    &self,
    tensor: &TensorView<'_>,
    geometry: &GeometryContext,
  ) -> Result<Self::Output, Self::Error> {
    self.options.check_tensor(tensor)?;
    let num_classes = self.num_classes(tensor.channels())?;
    debug!(
      "后处理检测输出: {} 个通道, {} 个类别, {} 个锚点",
      tensor.channels(),
      num_classes,
      tensor.anchors()
    );

    let candidates = decode_detection(tensor, geometry, num_classes, &self.options.filter());
    let detections = select(candidates, &self.options)
      .into_iter()
      .map(|(bbox, score, class_index)| Detection {
        bbox: bbox.to_array(),
        score,
        class: class_name(class_index).to_string(),
        class_index,
      })
      .collect::<Vec<_>>();

    debug!("检测到 {} 个物体", detections.len());
    Ok(detections)
  }
}
