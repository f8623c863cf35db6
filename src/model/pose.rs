// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/model/pose.rs - 姿态估计结果组装
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
  decode::{POSE_CHANNELS, decode_pose},
  geometry::GeometryContext,
  labels::PERSON_LABEL,
  model::{Detection, ModelType, Pose, Postprocess, PostprocessError, PostprocessOptions, select},
  tensor::TensorView,
};

#[derive(Debug, Clone)]
pub struct YoloPose {
  options: PostprocessOptions,
}

impl YoloPose {
  pub fn new(options: PostprocessOptions) -> Result<Self, PostprocessError> {
    options.expect_model_type(ModelType::Pose)?;
    options.validate()?;
    Ok(Self { options })
  }

  pub fn options(&self) -> &PostprocessOptions {
    &self.options
  }
}

impl Postprocess for YoloPose {
  type Output = Vec<Pose>;
  type Error = PostprocessError;

  fn postprocess(
    &self,
    tensor: &TensorView<'_>,
    geometry: &GeometryContext,
  ) -> Result<Self::Output, Self::Error> {
    self.options.check_tensor(tensor)?;
    if tensor.channels() < POSE_CHANNELS {
      return Err(PostprocessError::LayoutMismatch {
        model_type: ModelType::Pose,
        channels: tensor.channels(),
        required: POSE_CHANNELS,
      });
    }

    let candidates = decode_pose(tensor, geometry, &self.options.filter());
    let poses = select(candidates, &self.options)
      .into_iter()
      .map(|(bbox, score, keypoints)| Pose {
        detection: Detection {
          bbox: bbox.to_array(),
          score,
          class: PERSON_LABEL.to_string(),
          class_index: 0,
        },
        keypoints,
      })
      .collect::<Vec<_>>();

    debug!("检测到 {} 个人体姿态", poses.len());
    Ok(poses)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::labels::KEYPOINT_COUNT;

  #[test]
  fn poses_are_always_people() {
    let anchors = 2;
    let mut data = vec![0.0; POSE_CHANNELS * anchors];
    // anchor 1: 框 + 人体置信度
    for (c, v) in [320.0, 320.0, 120.0, 240.0, 0.8].iter().enumerate() {
      data[c * anchors + 1] = *v;
    }
    let tensor = TensorView::new(&data, POSE_CHANNELS, anchors);
    let geometry = GeometryContext::new(640, 640, 1.0, 1.0, 0.0, 0.0).unwrap();
    let model = YoloPose::new(PostprocessOptions::new(ModelType::Pose)).unwrap();

    let poses = model.postprocess(&tensor, &geometry).unwrap();
    assert_eq!(poses.len(), 1);
    assert_eq!(poses[0].detection.class, "person");
    assert_eq!(poses[0].detection.class_index, 0);
    assert_eq!(poses[0].detection.score, 0.8);
    assert_eq!(poses[0].keypoints.len(), KEYPOINT_COUNT);
  }

  #[test]
  fn rejects_short_layout() {
    let data = [0.0; 10];
    let tensor = TensorView::new(&data, 10, 1);
    let geometry = GeometryContext::new(640, 640, 1.0, 1.0, 0.0, 0.0).unwrap();
    let model = YoloPose::new(PostprocessOptions::new(ModelType::Pose)).unwrap();
    assert!(matches!(
      model.postprocess(&tensor, &geometry),
      Err(PostprocessError::LayoutMismatch {
        required: POSE_CHANNELS,
        ..
      })
    ));
  }
}
