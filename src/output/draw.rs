// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/output/draw.rs - 后处理结果可视化
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

use image::{DynamicImage, Rgba, RgbaImage, RgbImage, imageops};
use imageproc::{
  drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut},
  rect::Rect,
};
use tracing::debug;

use crate::{
  geometry::BBox,
  labels::{SKELETON, class_color},
  model::{Detection, Inference, Keypoint, Pose, Segmentation},
};

const BOX_THICKNESS: u32 = 2;
const KEYPOINT_RADIUS: i32 = 4;
const KEYPOINT_THRESHOLD: f32 = 0.5;
const KEYPOINT_COLOR: [u8; 3] = [255, 128, 0];
const LIMB_COLOR: [u8; 3] = [51, 153, 255];

/// 可复用的绘图画布，由调用方持有，尺寸不符时按需重建
#[derive(Debug, Clone, Default)]
pub struct Surface {
  image: RgbaImage,
}

impl Surface {
  pub fn new(width: u32, height: u32) -> Self {
    Self {
      image: RgbaImage::new(width, height),
    }
  }

  pub fn ensure_size(&mut self, width: u32, height: u32) {
    if self.image.dimensions() != (width, height) {
      debug!(
        "画布尺寸 {:?} -> {}x{}",
        self.image.dimensions(),
        width,
        height
      );
      self.image = RgbaImage::new(width, height);
    }
  }

  /// 把底图复制到画布上
  pub fn load(&mut self, frame: &RgbImage) {
    self.ensure_size(frame.width(), frame.height());
    for (dst, src) in self.image.pixels_mut().zip(frame.pixels()) {
      *dst = Rgba([src[0], src[1], src[2], 255]);
    }
  }

  pub fn image(&self) -> &RgbaImage {
    &self.image
  }

  pub fn to_rgb_image(&self) -> RgbImage {
    DynamicImage::ImageRgba8(self.image.clone()).to_rgb8()
  }
}

pub struct Draw {
  box_thickness: u32,
  keypoint_radius: i32,
  keypoint_threshold: f32,
  keypoint_color: [u8; 3],
  limb_color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      box_thickness: BOX_THICKNESS,
      keypoint_radius: KEYPOINT_RADIUS,
      keypoint_threshold: KEYPOINT_THRESHOLD,
      keypoint_color: KEYPOINT_COLOR,
      limb_color: LIMB_COLOR,
    }
  }
}

impl Draw {
  pub fn keypoint_threshold(mut self, threshold: f32) -> Self {
    self.keypoint_threshold = threshold;
    self
  }

  // 边框向内加粗
  fn draw_bbox(&self, surface: &mut Surface, bbox: &BBox, color: [u8; 3]) {
    let (w, h) = surface.image.dimensions();
    let x = bbox.x.max(0.0) as i32;
    let y = bbox.y.max(0.0) as i32;
    let width = bbox.width.min(w as f32 - bbox.x.max(0.0)) as u32;
    let height = bbox.height.min(h as f32 - bbox.y.max(0.0)) as u32;

    for t in 0..self.box_thickness {
      let (tw, th) = (width.saturating_sub(2 * t), height.saturating_sub(2 * t));
      if tw == 0 || th == 0 {
        break;
      }
      let rect = Rect::at(x + t as i32, y + t as i32).of_size(tw, th);
      draw_hollow_rect_mut(&mut surface.image, rect, rgba(color));
    }
  }

  fn draw_mask(&self, surface: &mut Surface, mask: &RgbaImage) {
    if mask.dimensions() != surface.image.dimensions() {
      debug!(
        "掩码尺寸 {:?} 与画布 {:?} 不一致，按左上角对齐",
        mask.dimensions(),
        surface.image.dimensions()
      );
    }
    imageops::overlay(&mut surface.image, mask, 0, 0);
  }

  fn draw_keypoints(&self, surface: &mut Surface, keypoints: &[Keypoint]) {
    let visible = |k: &Keypoint| k.confidence >= self.keypoint_threshold;

    for &[a, b] in SKELETON.iter() {
      if let (Some(ka), Some(kb)) = (keypoints.get(a), keypoints.get(b))
        && visible(ka)
        && visible(kb)
      {
        draw_line_segment_mut(
          &mut surface.image,
          (ka.x, ka.y),
          (kb.x, kb.y),
          rgba(self.limb_color),
        );
      }
    }

    for keypoint in keypoints.iter().filter(|&k| visible(k)) {
      draw_filled_circle_mut(
        &mut surface.image,
        (keypoint.x as i32, keypoint.y as i32),
        self.keypoint_radius,
        rgba(self.keypoint_color),
      );
    }
  }
}

fn rgba(color: [u8; 3]) -> Rgba<u8> {
  Rgba([color[0], color[1], color[2], 255])
}

pub trait DrawOnSurface {
  fn draw_on(&self, draw: &Draw, surface: &mut Surface);
}

impl DrawOnSurface for [Detection] {
  fn draw_on(&self, draw: &Draw, surface: &mut Surface) {
    for detection in self {
      draw.draw_bbox(surface, &detection.bbox(), class_color(detection.class_index));
    }
  }
}

impl DrawOnSurface for [Segmentation] {
  fn draw_on(&self, draw: &Draw, surface: &mut Surface) {
    // 先画全部掩码，避免边框被后面的掩码覆盖
    for segmentation in self {
      draw.draw_mask(surface, &segmentation.mask);
    }
    for segmentation in self {
      let detection = &segmentation.detection;
      draw.draw_bbox(surface, &detection.bbox(), class_color(detection.class_index));
    }
  }
}

impl DrawOnSurface for [Pose] {
  fn draw_on(&self, draw: &Draw, surface: &mut Surface) {
    for pose in self {
      let detection = &pose.detection;
      draw.draw_bbox(surface, &detection.bbox(), class_color(detection.class_index));
      draw.draw_keypoints(surface, &pose.keypoints);
    }
  }
}

impl DrawOnSurface for Inference {
  fn draw_on(&self, draw: &Draw, surface: &mut Surface) {
    match self {
      Inference::Detection(items) => items.draw_on(draw, surface),
      Inference::Segmentation(items) => items.draw_on(draw, surface),
      Inference::Pose(items) => items.draw_on(draw, surface),
    }
  }
}
