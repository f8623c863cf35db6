// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/labels.rs - 类别、关键点名称与调色板
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

/// COCO 数据集类别名称
#[rustfmt::skip]
pub const COCO_CLASSES: [&str; 80] = [
  "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck",
  "boat", "traffic light", "fire hydrant", "stop sign", "parking meter", "bench",
  "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
  "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
  "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove",
  "skateboard", "surfboard", "tennis racket", "bottle", "wine glass", "cup",
  "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
  "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
  "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
  "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
  "refrigerator", "book", "clock", "vase", "scissors", "teddy bear",
  "hair drier", "toothbrush",
];

pub const UNKNOWN_LABEL: &str = "unknown";
pub const PERSON_LABEL: &str = "person";

/// COCO-Pose 关键点数量
pub const KEYPOINT_COUNT: usize = 17;

/// COCO-Pose 关键点名称，顺序与网络输出一致
#[rustfmt::skip]
pub const KEYPOINT_NAMES: [&str; KEYPOINT_COUNT] = [
  "nose",
  "left_eye", "right_eye",
  "left_ear", "right_ear",
  "left_shoulder", "right_shoulder",
  "left_elbow", "right_elbow",
  "left_wrist", "right_wrist",
  "left_hip", "right_hip",
  "left_knee", "right_knee",
  "left_ankle", "right_ankle",
];

/// 骨架连线（关键点索引对）
#[rustfmt::skip]
pub const SKELETON: [[usize; 2]; 19] = [
  [15, 13], [13, 11], [16, 14], [14, 12], [11, 12],
  [5, 11], [6, 12], [5, 6], [5, 7], [6, 8], [7, 9], [8, 10],
  [1, 2], [0, 1], [0, 2], [1, 3], [2, 4], [3, 5], [4, 6],
];

pub fn class_name(class_index: usize) -> &'static str {
  COCO_CLASSES
    .get(class_index)
    .copied()
    .unwrap_or(UNKNOWN_LABEL)
}

/// 类别对应的颜色，80 个类别在色相环上均匀分布
pub fn class_color(class_index: usize) -> [u8; 3] {
  let hue = ((class_index % COCO_CLASSES.len()) as f32 / COCO_CLASSES.len() as f32) * 360.0;
  hsv_to_rgb(hue, 0.8, 0.9)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  [
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ]
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn class_lookup_falls_back_to_unknown() {
    assert_eq!(class_name(0), "person");
    assert_eq!(class_name(79), "toothbrush");
    assert_eq!(class_name(80), UNKNOWN_LABEL);
  }

  #[test]
  fn skeleton_indices_are_valid() {
    assert!(
      SKELETON
        .iter()
        .all(|&[a, b]| a < KEYPOINT_COUNT && b < KEYPOINT_COUNT)
    );
  }

  #[test]
  fn palette_is_stable() {
    assert_eq!(class_color(3), class_color(83));
    assert_ne!(class_color(0), class_color(40));
  }
}
