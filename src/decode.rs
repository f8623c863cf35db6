// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/decode.rs - 候选框解码
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
  geometry::{BBox, GeometryContext},
  labels::{KEYPOINT_COUNT, KEYPOINT_NAMES},
  model::Keypoint,
  tensor::TensorView,
};

/// 框所占的通道数 `[cx, cy, w, h]`
pub const BOX_CHANNELS: usize = 4;
/// 姿态模型中每个关键点的通道数 `(x, y, conf)`
pub const KEYPOINT_CHANNELS: usize = 3;
/// 姿态模型的通道数：框 + 人体置信度 + 17 个关键点
pub const POSE_CHANNELS: usize = BOX_CHANNELS + 1 + KEYPOINT_COUNT * KEYPOINT_CHANNELS;

/// 解码阶段的过滤参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeFilter {
  pub confidence_threshold: f32,
  /// 映射到原图后的最小宽高（像素）
  pub min_box_size: f32,
}

/// 解码结果：三个按索引对齐的序列
#[derive(Debug, Clone, PartialEq)]
pub struct Candidates<P> {
  pub boxes: Vec<BBox>,
  pub scores: Vec<f32>,
  pub payload: Vec<P>,
}

impl<P> Default for Candidates<P> {
  fn default() -> Self {
    Self {
      boxes: Vec::new(),
      scores: Vec::new(),
      payload: Vec::new(),
    }
  }
}

impl<P> Candidates<P> {
  fn push(&mut self, bbox: BBox, score: f32, payload: P) {
    self.boxes.push(bbox);
    self.scores.push(score);
    self.payload.push(payload);
  }

  pub fn len(&self) -> usize {
    self.boxes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.boxes.is_empty()
  }
}

/// 分割候选的附加数据
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPayload {
  pub class_index: usize,
  /// 掩码系数，原样读取，不做激活
  pub coefficients: Box<[f32]>,
}

/// 从 `first_channel` 开始的 `count` 个通道中找出最高分及其序号
///
/// 严格大于才更新，分数相同时保留序号最小者。
fn best_class(
  tensor: &TensorView,
  anchor: usize,
  first_channel: usize,
  count: usize,
) -> (f32, usize) {
  let mut best_score = f32::NEG_INFINITY;
  let mut best_index = 0usize;
  for c in 0..count {
    let score = tensor.get(first_channel + c, anchor);
    if score > best_score {
      best_score = score;
      best_index = c;
    }
  }
  (best_score, best_index)
}

/// 读取框并依次应用尺寸过滤，失败返回 `None`
fn decode_box(
  tensor: &TensorView,
  anchor: usize,
  geometry: &GeometryContext,
  filter: &DecodeFilter,
) -> Option<BBox> {
  let cx = tensor.get(0, anchor);
  let cy = tensor.get(1, anchor);
  let w = tensor.get(2, anchor);
  let h = tensor.get(3, anchor);

  if !(w > 0.0 && h > 0.0) {
    return None;
  }

  let bbox = geometry.map_to_original(cx, cy, w, h);
  if bbox.width < filter.min_box_size || bbox.height < filter.min_box_size {
    return None;
  }
  Some(bbox)
}

/// 目标检测：`[cx, cy, w, h, class_0 .. class_{C-1}]`
pub fn decode_detection(
  tensor: &TensorView,
  geometry: &GeometryContext,
  num_classes: usize,
  filter: &DecodeFilter,
) -> Candidates<usize> {
  let mut candidates = Candidates::default();

  for anchor in 0..tensor.anchors() {
    let (score, class_index) = best_class(tensor, anchor, BOX_CHANNELS, num_classes);
    if !(score >= filter.confidence_threshold) {
      continue;
    }
    if let Some(bbox) = decode_box(tensor, anchor, geometry, filter) {
      candidates.push(bbox, score, class_index);
    }
  }

  debug!(
    "检测解码: {} 个锚点, {} 个候选",
    tensor.anchors(),
    candidates.len()
  );
  candidates
}

/// 实例分割：`[cx, cy, w, h, class_0 .. class_{C-1}, coef_0 .. coef_{K-1}]`
pub fn decode_segmentation(
  tensor: &TensorView,
  geometry: &GeometryContext,
  num_classes: usize,
  mask_coefficients: usize,
  filter: &DecodeFilter,
) -> Candidates<SegmentPayload> {
  let mut candidates = Candidates::default();
  let coef_channel = BOX_CHANNELS + num_classes;

  for anchor in 0..tensor.anchors() {
    let (score, class_index) = best_class(tensor, anchor, BOX_CHANNELS, num_classes);
    if !(score >= filter.confidence_threshold) {
      continue;
    }
    let Some(bbox) = decode_box(tensor, anchor, geometry, filter) else {
      continue;
    };

    let coefficients = (0..mask_coefficients)
      .map(|k| tensor.get(coef_channel + k, anchor))
      .collect();
    candidates.push(
      bbox,
      score,
      SegmentPayload {
        class_index,
        coefficients,
      },
    );
  }

  debug!(
    "分割解码: {} 个锚点, {} 个候选",
    tensor.anchors(),
    candidates.len()
  );
  candidates
}

/// 姿态估计：`[cx, cy, w, h, person_conf, (kx, ky, kconf) x 17]`
pub fn decode_pose(
  tensor: &TensorView,
  geometry: &GeometryContext,
  filter: &DecodeFilter,
) -> Candidates<Vec<Keypoint>> {
  let mut candidates = Candidates::default();

  for anchor in 0..tensor.anchors() {
    let score = tensor.get(BOX_CHANNELS, anchor);
    if !(score >= filter.confidence_threshold) {
      continue;
    }
    let Some(bbox) = decode_box(tensor, anchor, geometry, filter) else {
      continue;
    };

    let keypoints = KEYPOINT_NAMES
      .iter()
      .enumerate()
      .map(|(k, name)| {
        let base = BOX_CHANNELS + 1 + k * KEYPOINT_CHANNELS;
        let (x, y) = geometry.map_point(tensor.get(base, anchor), tensor.get(base + 1, anchor));
        Keypoint {
          x,
          y,
          confidence: tensor.get(base + 2, anchor),
          name: (*name).to_string(),
        }
      })
      .collect();
    candidates.push(bbox, score, keypoints);
  }

  debug!(
    "姿态解码: {} 个锚点, {} 个候选",
    tensor.anchors(),
    candidates.len()
  );
  candidates
}

#[cfg(test)]
mod tests {
  use super::*;

  const FILTER: DecodeFilter = DecodeFilter {
    confidence_threshold: 0.5,
    min_box_size: 20.0,
  };

  fn identity() -> GeometryContext {
    GeometryContext::new(640, 640, 1.0, 1.0, 0.0, 0.0).unwrap()
  }

  /// 按锚点写入一组通道值
  fn set_anchor(data: &mut [f32], anchors: usize, anchor: usize, values: &[f32]) {
    for (c, v) in values.iter().enumerate() {
      data[c * anchors + anchor] = *v;
    }
  }

  #[test]
  fn class_ties_prefer_lowest_index() {
    let anchors = 1;
    let mut data = vec![0.0; 7 * anchors];
    set_anchor(&mut data, anchors, 0, &[100.0, 100.0, 50.0, 50.0, 0.2, 0.7, 0.7]);
    let tensor = TensorView::new(&data, 7, anchors);
    let out = decode_detection(&tensor, &identity(), 3, &FILTER);
    assert_eq!(out.payload, vec![1]);
    assert_eq!(out.scores, vec![0.7]);
  }

  #[test]
  fn filters_are_applied_in_order() {
    let anchors = 4;
    let mut data = vec![0.0; 5 * anchors];
    // 分数不足
    set_anchor(&mut data, anchors, 0, &[100.0, 100.0, 50.0, 50.0, 0.3]);
    // 原始宽度为 0
    set_anchor(&mut data, anchors, 1, &[100.0, 100.0, 0.0, 50.0, 0.9]);
    // 映射后过小
    set_anchor(&mut data, anchors, 2, &[100.0, 100.0, 19.0, 50.0, 0.9]);
    // 通过
    set_anchor(&mut data, anchors, 3, &[300.0, 300.0, 20.0, 20.0, 0.5]);
    let tensor = TensorView::new(&data, 5, anchors);

    let out = decode_detection(&tensor, &identity(), 1, &FILTER);
    assert_eq!(out.len(), 1);
    assert_eq!(out.boxes[0], BBox::new(290.0, 290.0, 20.0, 20.0));
    assert_eq!(out.scores[0], 0.5);
  }

  #[test]
  fn min_box_size_applies_after_mapping() {
    let anchors = 1;
    let mut data = vec![0.0; 5];
    set_anchor(&mut data, anchors, 0, &[100.0, 100.0, 15.0, 15.0, 0.9]);
    let tensor = TensorView::new(&data, 5, anchors);

    // 原图是输入的 2 倍，15px 映射为 30px
    let geometry = GeometryContext::new(1280, 1280, 0.5, 0.5, 0.0, 0.0).unwrap();
    assert_eq!(decode_detection(&tensor, &geometry, 1, &FILTER).len(), 1);
    assert!(decode_detection(&tensor, &identity(), 1, &FILTER).is_empty());
  }

  #[test]
  fn segmentation_reads_raw_coefficients() {
    let anchors = 2;
    let channels = 4 + 2 + 3;
    let mut data = vec![0.0; channels * anchors];
    set_anchor(
      &mut data,
      anchors,
      1,
      &[200.0, 200.0, 80.0, 60.0, 0.1, 0.8, -1.5, 0.0, 2.5],
    );
    let tensor = TensorView::new(&data, channels, anchors);

    let out = decode_segmentation(&tensor, &identity(), 2, 3, &FILTER);
    assert_eq!(out.len(), 1);
    assert_eq!(out.payload[0].class_index, 1);
    assert_eq!(&*out.payload[0].coefficients, &[-1.5, 0.0, 2.5]);
  }

  #[test]
  fn pose_keypoints_are_mapped_and_named() {
    let anchors = 1;
    let mut values = vec![0.0; POSE_CHANNELS];
    values[..5].copy_from_slice(&[320.0, 320.0, 100.0, 200.0, 0.95]);
    // nose
    values[5..8].copy_from_slice(&[320.0, 240.0, 0.9]);
    // right_ankle
    values[53..56].copy_from_slice(&[330.0, 410.0, 0.4]);
    let tensor = TensorView::new(&values, POSE_CHANNELS, anchors);

    let geometry = GeometryContext::new(1280, 960, 0.5, 0.5, 0.0, 80.0).unwrap();
    let out = decode_pose(&tensor, &geometry, &FILTER);
    assert_eq!(out.len(), 1);

    let keypoints = &out.payload[0];
    assert_eq!(keypoints.len(), KEYPOINT_COUNT);
    assert_eq!(keypoints[0].name, "nose");
    assert_eq!((keypoints[0].x, keypoints[0].y), (640.0, 320.0));
    assert_eq!(keypoints[0].confidence, 0.9);
    assert_eq!(keypoints[16].name, "right_ankle");
    assert_eq!((keypoints[16].x, keypoints[16].y), (660.0, 660.0));
  }

  #[test]
  fn short_tensor_degrades_to_zero() {
    // 声明 2 个锚点，但第二个锚点的类别通道缺失
    let data = [100.0, 300.0, 100.0, 300.0, 50.0, 50.0, 50.0, 50.0, 0.9];
    let tensor = TensorView::new(&data, 5, 2);
    let out = decode_detection(&tensor, &identity(), 1, &FILTER);
    assert_eq!(out.len(), 1);
    assert_eq!(out.boxes[0].x, 75.0);
  }
}
