// 该文件是 Kuangxuan （框选） 项目的一部分。
// tests/postprocess.rs - 后处理流程测试
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

use kuangxuan::{
  BBox, FromUrl, GeometryContext, Inference, ModelType, Postprocess, PostprocessBuilder,
  PostprocessError, PostprocessOptions, Postprocessor, Tensor, iou, map_to_original, postprocess,
};
use proptest::prelude::*;
use url::Url;

const COCO_CHANNELS: usize = 84;

/// 构造检测张量，每个锚点为 `(cx, cy, w, h, class_index, score)`
fn detection_tensor(anchors: &[(f32, f32, f32, f32, usize, f32)]) -> Tensor {
  let n = anchors.len();
  let mut data = vec![0.0f32; COCO_CHANNELS * n];
  for (i, &(cx, cy, w, h, class_index, score)) in anchors.iter().enumerate() {
    data[i] = cx;
    data[n + i] = cy;
    data[2 * n + i] = w;
    data[3 * n + i] = h;
    data[(4 + class_index) * n + i] = score;
  }
  Tensor::new(data, COCO_CHANNELS, n)
}

fn identity() -> GeometryContext {
  GeometryContext::new(640, 640, 1.0, 1.0, 0.0, 0.0).unwrap()
}

fn detect(options: PostprocessOptions, tensor: &Tensor) -> Inference {
  postprocess(&tensor.view(), &identity(), &options).unwrap()
}

#[test]
fn single_confident_anchor_yields_one_detection() {
  let tensor = detection_tensor(&[
    (320.0, 320.0, 100.0, 80.0, 0, 0.9),
    (0.0, 0.0, 0.0, 0.0, 0, 0.0),
  ]);
  let result = detect(PostprocessOptions::new(ModelType::Detection), &tensor);

  let detections = result.detections();
  assert_eq!(detections.len(), 1);
  assert_eq!(detections[0].class, "person");
  assert_eq!(detections[0].class_index, 0);
  assert_eq!(detections[0].score, 0.9);
  assert_eq!(detections[0].bbox, [270.0, 280.0, 100.0, 80.0]);
}

#[test]
fn duplicate_boxes_are_suppressed() {
  let tensor = detection_tensor(&[
    (300.0, 300.0, 100.0, 100.0, 2, 0.8),
    (301.0, 300.0, 100.0, 100.0, 2, 0.9),
  ]);
  let mut options = PostprocessOptions::new(ModelType::Detection);
  options.iou_threshold = 0.4;
  let result = detect(options, &tensor);

  let detections = result.detections();
  assert_eq!(detections.len(), 1);
  assert_eq!(detections[0].score, 0.9);
  assert_eq!(detections[0].class, "car");
}

#[test]
fn below_threshold_anchor_is_dropped() {
  let tensor = detection_tensor(&[(320.0, 320.0, 300.0, 300.0, 5, 0.3)]);
  let result = detect(PostprocessOptions::new(ModelType::Detection), &tensor);
  assert!(result.is_empty());
}

#[test]
fn all_zero_tensor_is_empty_not_error() {
  for model_type in [ModelType::Detection, ModelType::Segmentation, ModelType::Pose] {
    let tensor = Tensor::new(vec![0.0; 116 * 10], 116, 10);
    let result = postprocess(&tensor.view(), &identity(), &PostprocessOptions::new(model_type));
    let result = result.unwrap();
    assert_eq!(result.model_type(), model_type);
    assert!(result.is_empty());
  }
}

#[test]
fn small_boxes_never_survive() {
  let tensor = detection_tensor(&[
    (100.0, 100.0, 19.0, 40.0, 0, 0.9),
    (300.0, 300.0, 20.0, 20.0, 0, 0.8),
  ]);
  let result = detect(PostprocessOptions::new(ModelType::Detection), &tensor);
  let detections = result.detections();
  assert_eq!(detections.len(), 1);
  assert_eq!(detections[0].score, 0.8);
}

#[test]
fn output_is_capped_and_ordered() {
  let anchors: Vec<_> = (0..10)
    .map(|i| (40.0 + 60.0 * i as f32, 320.0, 40.0, 40.0, 0, 0.5 + 0.04 * i as f32))
    .collect();
  let tensor = detection_tensor(&anchors);
  let mut options = PostprocessOptions::new(ModelType::Detection);
  options.max_detections = 3;
  let result = detect(options, &tensor);

  let scores: Vec<f32> = result.detections().iter().map(|d| d.score).collect();
  assert_eq!(scores.len(), 3);
  assert!(scores.windows(2).all(|w| w[0] >= w[1]));
  assert!((scores[0] - 0.86).abs() < 1e-6);
}

#[test]
fn letterbox_geometry_maps_back_to_original() {
  let geometry = GeometryContext::letterbox(1280, 960, 640, 640).unwrap();
  assert_eq!(geometry.scale(), (0.5, 0.5));
  assert_eq!(geometry.padding(), (0.0, 80.0));

  // 输入空间中左上角 (100, 100)，宽 200，高 150
  let bbox = map_to_original(200.0, 175.0, 200.0, 150.0, &geometry);
  assert_eq!(bbox, BBox::new(200.0, 40.0, 400.0, 300.0));
}

#[test]
fn postprocess_is_idempotent() {
  let tensor = detection_tensor(&[
    (200.0, 200.0, 80.0, 80.0, 1, 0.7),
    (210.0, 205.0, 80.0, 80.0, 1, 0.75),
    (500.0, 500.0, 60.0, 90.0, 7, 0.95),
  ]);
  let model = Postprocessor::new(PostprocessOptions::new(ModelType::Detection)).unwrap();
  let first = model.postprocess(&tensor.view(), &identity()).unwrap();
  let second = model.postprocess(&tensor.view(), &identity()).unwrap();
  assert_eq!(first, second);
}

#[test]
fn builder_reads_url_options() {
  let url = Url::parse("detect:?confidence=0.25&iou=0.4&max_detections=5&min_box_size=0").unwrap();
  let builder = PostprocessBuilder::from_url(&url).unwrap();
  let options = builder.options();
  assert_eq!(options.model_type, ModelType::Detection);
  assert_eq!(options.confidence_threshold, 0.25);
  assert_eq!(options.iou_threshold, 0.4);
  assert_eq!(options.max_detections, 5);
  assert_eq!(options.min_box_size, 0.0);

  let tensor = detection_tensor(&[(100.0, 100.0, 4.0, 4.0, 0, 0.3)]);
  let result = builder
    .build()
    .unwrap()
    .postprocess(&tensor.view(), &identity())
    .unwrap();
  assert_eq!(result.len(), 1);
}

#[test]
fn invalid_configuration_fails_immediately() {
  let url = Url::parse("detect:?confidence=0").unwrap();
  assert!(matches!(
    PostprocessBuilder::from_url(&url),
    Err(PostprocessError::InvalidConfidenceThreshold(_))
  ));

  let url = Url::parse("classify:?confidence=0.5").unwrap();
  assert!(matches!(
    PostprocessBuilder::from_url(&url),
    Err(PostprocessError::UnsupportedModelType(_))
  ));
}

#[test]
fn strict_mode_rejects_short_tensor() {
  let tensor = Tensor::new(vec![0.0; 10], COCO_CHANNELS, 4);
  let mut options = PostprocessOptions::new(ModelType::Detection);
  assert!(postprocess(&tensor.view(), &identity(), &options).unwrap().is_empty());

  options.strict_tensor = true;
  assert!(matches!(
    postprocess(&tensor.view(), &identity(), &options),
    Err(PostprocessError::Tensor(_))
  ));
}

fn arb_box() -> impl Strategy<Value = BBox> {
  (0.0f32..600.0, 0.0f32..600.0, 0.0f32..200.0, 0.0f32..200.0)
    .prop_map(|(x, y, w, h)| BBox::new(x, y, w, h))
}

proptest! {
  #[test]
  fn iou_is_bounded(a in arb_box(), b in arb_box()) {
    let value = iou(&a, &b);
    prop_assert!((0.0..=1.0).contains(&value));
    prop_assert_eq!(value, iou(&b, &a));
  }

  #[test]
  fn self_iou_is_one(
    x in 0.0f32..600.0,
    y in 0.0f32..600.0,
    w in 1.0f32..200.0,
    h in 1.0f32..200.0,
  ) {
    let bbox = BBox::new(x, y, w, h);
    prop_assert!((iou(&bbox, &bbox) - 1.0).abs() < 1e-3);
  }

  #[test]
  fn detections_respect_all_invariants(
    anchors in prop::collection::vec(
      (0.0f32..640.0, 0.0f32..640.0, 0.0f32..200.0, 0.0f32..200.0, 0usize..80, 0.0f32..1.0),
      0..40,
    ),
    iou_threshold in 0.1f32..0.9,
    max_detections in 1usize..20,
  ) {
    let tensor = detection_tensor(&anchors);
    let mut options = PostprocessOptions::new(ModelType::Detection);
    options.iou_threshold = iou_threshold;
    options.max_detections = max_detections;
    let result = detect(options.clone(), &tensor);
    let detections = result.detections();

    prop_assert!(detections.len() <= max_detections);
    for pair in detections.windows(2) {
      prop_assert!(pair[0].score >= pair[1].score);
    }
    for (i, a) in detections.iter().enumerate() {
      prop_assert!(a.score >= options.confidence_threshold);
      prop_assert!(a.bbox[2] >= options.min_box_size && a.bbox[3] >= options.min_box_size);
      for b in &detections[i + 1..] {
        prop_assert!(iou(&a.bbox(), &b.bbox()) <= iou_threshold);
      }
    }

    prop_assert_eq!(&result, &detect(options, &tensor));
  }
}
