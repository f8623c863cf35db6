// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/model.rs - 后处理模型、配置与结果类型
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

use std::{fmt, str::FromStr};

use image::RgbaImage;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl,
  decode::{Candidates, DecodeFilter},
  geometry::{BBox, GeometryContext, GeometryError},
  nms::suppress,
  tensor::{TensorError, TensorView},
};

mod detect;
mod mask;
mod pose;
mod segment;

pub use self::detect::YoloDetect;
pub use self::mask::{MASK_ALPHA, MaskPrototypes, decode_prototype_mask, fill_box_mask};
pub use self::pose::YoloPose;
pub use self::segment::YoloSegment;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
pub const DEFAULT_MAX_DETECTIONS: usize = 100;
pub const DEFAULT_MIN_BOX_SIZE: f32 = 20.0;
pub const DEFAULT_MASK_COEFFICIENTS: usize = 32;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PostprocessError {
  #[error("张量错误: {0}")]
  Tensor(#[from] TensorError),
  #[error("几何参数错误: {0}")]
  Geometry(#[from] GeometryError),
  #[error("不支持的模型类型: {0}")]
  UnsupportedModelType(String),
  #[error("模型类型不匹配: 期望 {expected}, 实际 {actual}")]
  ModelTypeMismatch {
    expected: ModelType,
    actual: ModelType,
  },
  #[error("置信度阈值必须在 (0, 1] 内, 实际为 {0}")]
  InvalidConfidenceThreshold(f32),
  #[error("IoU 阈值必须在 (0, 1] 内, 实际为 {0}")]
  InvalidIouThreshold(f32),
  #[error("最大检测数必须为正整数")]
  InvalidMaxDetections,
  #[error("最小框尺寸必须为非负有限值, 实际为 {0}")]
  InvalidMinBoxSize(f32),
  #[error("掩码系数数量必须为正整数")]
  InvalidMaskCoefficients,
  #[error("未知配置项: {0}")]
  UnknownOption(String),
  #[error("配置项 {key} 的值无效: {value}")]
  InvalidOption { key: String, value: String },
  #[error("{model_type} 模型至少需要 {required} 个通道, 实际为 {channels}")]
  LayoutMismatch {
    model_type: ModelType,
    channels: usize,
    required: usize,
  },
  #[error("掩码原型数量不匹配: 期望 {expected}, 实际 {actual}")]
  PrototypeMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
  Detection,
  Segmentation,
  Pose,
}

impl ModelType {
  /// 配置 URL 使用的方案名
  pub fn scheme(&self) -> &'static str {
    match self {
      ModelType::Detection => "detect",
      ModelType::Segmentation => "segment",
      ModelType::Pose => "pose",
    }
  }
}

impl fmt::Display for ModelType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.scheme())
  }
}

impl FromStr for ModelType {
  type Err = PostprocessError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "detect" | "detection" => Ok(ModelType::Detection),
      "segment" | "segmentation" => Ok(ModelType::Segmentation),
      "pose" => Ok(ModelType::Pose),
      _ => Err(PostprocessError::UnsupportedModelType(s.to_string())),
    }
  }
}

/// 后处理选项
#[derive(Debug, Clone, PartialEq)]
pub struct PostprocessOptions {
  pub model_type: ModelType,
  pub confidence_threshold: f32,
  pub iou_threshold: f32,
  pub max_detections: usize,
  /// 映射到原图后框的最小宽高（像素）
  pub min_box_size: f32,
  /// 分割模型的掩码系数个数
  pub mask_coefficients: usize,
  /// 为真时，张量数据不足直接报错而不是按 0 处理
  pub strict_tensor: bool,
}

impl Default for PostprocessOptions {
  fn default() -> Self {
    Self::new(ModelType::Detection)
  }
}

impl PostprocessOptions {
  pub fn new(model_type: ModelType) -> Self {
    Self {
      model_type,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      max_detections: DEFAULT_MAX_DETECTIONS,
      min_box_size: DEFAULT_MIN_BOX_SIZE,
      mask_coefficients: DEFAULT_MASK_COEFFICIENTS,
      strict_tensor: false,
    }
  }

  pub fn validate(&self) -> Result<(), PostprocessError> {
    if !(self.confidence_threshold > 0.0 && self.confidence_threshold <= 1.0) {
      return Err(PostprocessError::InvalidConfidenceThreshold(
        self.confidence_threshold,
      ));
    }
    if !(self.iou_threshold > 0.0 && self.iou_threshold <= 1.0) {
      return Err(PostprocessError::InvalidIouThreshold(self.iou_threshold));
    }
    if self.max_detections == 0 {
      return Err(PostprocessError::InvalidMaxDetections);
    }
    if !(self.min_box_size.is_finite() && self.min_box_size >= 0.0) {
      return Err(PostprocessError::InvalidMinBoxSize(self.min_box_size));
    }
    if self.model_type == ModelType::Segmentation && self.mask_coefficients == 0 {
      return Err(PostprocessError::InvalidMaskCoefficients);
    }
    Ok(())
  }

  pub(crate) fn filter(&self) -> DecodeFilter {
    DecodeFilter {
      confidence_threshold: self.confidence_threshold,
      min_box_size: self.min_box_size,
    }
  }

  /// 严格模式下检查张量完整性
  pub(crate) fn check_tensor(&self, tensor: &TensorView) -> Result<(), PostprocessError> {
    if self.strict_tensor {
      tensor.check_complete()?;
    }
    Ok(())
  }

  fn expect_model_type(&self, expected: ModelType) -> Result<(), PostprocessError> {
    if self.model_type != expected {
      return Err(PostprocessError::ModelTypeMismatch {
        expected,
        actual: self.model_type,
      });
    }
    Ok(())
  }
}

/// 关键点，坐标位于原始图像空间
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Keypoint {
  pub x: f32,
  pub y: f32,
  pub confidence: f32,
  pub name: String,
}

/// 检测结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  /// `[x, y, width, height]`，原始图像像素
  pub bbox: [f32; 4],
  pub score: f32,
  pub class: String,
  pub class_index: usize,
}

impl Detection {
  pub fn bbox(&self) -> BBox {
    let [x, y, width, height] = self.bbox;
    BBox::new(x, y, width, height)
  }
}

/// 分割结果，掩码与原始图像等大
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segmentation {
  #[serde(flatten)]
  pub detection: Detection,
  #[serde(skip)]
  pub mask: RgbaImage,
}

/// 姿态结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pose {
  #[serde(flatten)]
  pub detection: Detection,
  pub keypoints: Vec<Keypoint>,
}

pub trait Postprocess {
  type Output;
  type Error;

  fn postprocess(
    &self,
    tensor: &TensorView<'_>,
    geometry: &GeometryContext,
  ) -> Result<Self::Output, Self::Error>;
}

/// NMS 后按分数截断，返回 (框, 分数, 附加数据)
pub(crate) fn select<P>(
  candidates: Candidates<P>,
  options: &PostprocessOptions,
) -> Vec<(BBox, f32, P)> {
  let kept = suppress(&candidates.boxes, &candidates.scores, options.iou_threshold);
  let Candidates {
    boxes,
    scores,
    payload,
  } = candidates;
  let mut payload: Vec<Option<P>> = payload.into_iter().map(Some).collect();

  let selected: Vec<_> = kept
    .into_iter()
    .take(options.max_detections)
    .filter_map(|i| payload[i].take().map(|p| (boxes[i], scores[i], p)))
    .collect();
  debug!(
    "保留 {} 个结果 (上限 {})",
    selected.len(),
    options.max_detections
  );
  selected
}

/// 按模型类型分派的后处理结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "task", content = "results", rename_all = "snake_case")]
pub enum Inference {
  Detection(Vec<Detection>),
  Segmentation(Vec<Segmentation>),
  Pose(Vec<Pose>),
}

impl Inference {
  pub fn model_type(&self) -> ModelType {
    match self {
      Inference::Detection(_) => ModelType::Detection,
      Inference::Segmentation(_) => ModelType::Segmentation,
      Inference::Pose(_) => ModelType::Pose,
    }
  }

  pub fn len(&self) -> usize {
    match self {
      Inference::Detection(items) => items.len(),
      Inference::Segmentation(items) => items.len(),
      Inference::Pose(items) => items.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// 所有结果的检测部分，保持顺序
  pub fn detections(&self) -> Vec<&Detection> {
    match self {
      Inference::Detection(items) => items.iter().collect(),
      Inference::Segmentation(items) => items.iter().map(|s| &s.detection).collect(),
      Inference::Pose(items) => items.iter().map(|p| &p.detection).collect(),
    }
  }
}

#[derive(Debug, Clone)]
pub enum Postprocessor {
  Detect(YoloDetect),
  Segment(YoloSegment),
  Pose(YoloPose),
}

impl Postprocessor {
  pub fn new(options: PostprocessOptions) -> Result<Self, PostprocessError> {
    Ok(match options.model_type {
      ModelType::Detection => Postprocessor::Detect(YoloDetect::new(options)?),
      ModelType::Segmentation => Postprocessor::Segment(YoloSegment::new(options)?),
      ModelType::Pose => Postprocessor::Pose(YoloPose::new(options)?),
    })
  }

  pub fn options(&self) -> &PostprocessOptions {
    match self {
      Postprocessor::Detect(model) => model.options(),
      Postprocessor::Segment(model) => model.options(),
      Postprocessor::Pose(model) => model.options(),
    }
  }
}

impl Postprocess for Postprocessor {
  type Output = Inference;
  type Error = PostprocessError;

  fn postprocess(
    &self,
    tensor: &TensorView<'_>,
    geometry: &GeometryContext,
  ) -> Result<Self::Output, Self::Error> {
    Ok(match self {
      Postprocessor::Detect(model) => Inference::Detection(model.postprocess(tensor, geometry)?),
      Postprocessor::Segment(model) => {
        Inference::Segmentation(model.postprocess(tensor, geometry)?)
      }
      Postprocessor::Pose(model) => Inference::Pose(model.postprocess(tensor, geometry)?),
    })
  }
}

/// 单次调用入口：根据 `options.model_type` 选择对应的后处理
pub fn postprocess(
  tensor: &TensorView<'_>,
  geometry: &GeometryContext,
  options: &PostprocessOptions,
) -> Result<Inference, PostprocessError> {
  Postprocessor::new(options.clone())?.postprocess(tensor, geometry)
}

/// 从 URL 构建后处理配置
///
/// `detect:?confidence=0.5&iou=0.45&max_detections=100&min_box_size=20`，
/// 分割用 `segment:`（可加 `mask_coefficients=32`），姿态用 `pose:`。
#[derive(Debug, Clone)]
pub struct PostprocessBuilder {
  options: PostprocessOptions,
}

impl FromUrl for PostprocessBuilder {
  type Error = PostprocessError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let model_type = ModelType::from_str(url.scheme())?;
    let mut options = PostprocessOptions::new(model_type);

    for (key, value) in url.query_pairs() {
      let invalid = || PostprocessError::InvalidOption {
        key: key.to_string(),
        value: value.to_string(),
      };
      match &*key {
        "confidence" | "confidence_threshold" => {
          options.confidence_threshold = value.parse().map_err(|_| invalid())?
        }
        "iou" | "iou_threshold" => options.iou_threshold = value.parse().map_err(|_| invalid())?,
        "max" | "max_detections" => {
          options.max_detections = value.parse().map_err(|_| invalid())?
        }
        "min_box_size" => options.min_box_size = value.parse().map_err(|_| invalid())?,
        "mask_coefficients" => {
          options.mask_coefficients = value.parse().map_err(|_| invalid())?
        }
        "strict" => options.strict_tensor = value.parse().map_err(|_| invalid())?,
        _ => return Err(PostprocessError::UnknownOption(key.to_string())),
      }
    }

    options.validate()?;
    info!("后处理配置: {:?}", options);
    Ok(Self { options })
  }
}

impl PostprocessBuilder {
  pub fn new(options: PostprocessOptions) -> Self {
    Self { options }
  }

  pub fn confidence_threshold(mut self, threshold: f32) -> Self {
    self.options.confidence_threshold = threshold;
    self
  }

  pub fn iou_threshold(mut self, threshold: f32) -> Self {
    self.options.iou_threshold = threshold;
    self
  }

  pub fn max_detections(mut self, max_detections: usize) -> Self {
    self.options.max_detections = max_detections;
    self
  }

  pub fn min_box_size(mut self, min_box_size: f32) -> Self {
    self.options.min_box_size = min_box_size;
    self
  }

  pub fn options(&self) -> &PostprocessOptions {
    &self.options
  }

  pub fn build(self) -> Result<Postprocessor, PostprocessError> {
    Postprocessor::new(self.options)
  }
}
