// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/nms.rs - 非极大值抑制
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

use crate::geometry::BBox;

/// 计算两个边界框的 IoU
pub fn iou(a: &BBox, b: &BBox) -> f32 {
  iou_with_areas(a, b, a.area(), b.area())
}

fn iou_with_areas(a: &BBox, b: &BBox, area_a: f32, area_b: f32) -> f32 {
  let left = a.x.max(b.x);
  let top = a.y.max(b.y);
  let right = a.right().min(b.right());
  let bottom = a.bottom().min(b.bottom());

  // 不相交时直接为 0，不做除法
  if right <= left || bottom <= top {
    return 0.0;
  }

  let intersection = (right - left) * (bottom - top);
  let union = area_a + area_b - intersection;
  if union > 0.0 {
    (intersection / union).clamp(0.0, 1.0)
  } else {
    0.0
  }
}

/// 非极大值抑制（类别无关）
///
/// 返回保留下来的索引，按分数降序排列。分数相同的框保持原有相对顺序。
/// `boxes` 与 `scores` 长度不一致时只考虑两者共有的部分。
pub fn suppress(boxes: &[BBox], scores: &[f32], iou_threshold: f32) -> Vec<usize> {
  let count = boxes.len().min(scores.len());
  let areas: Vec<f32> = boxes[..count].iter().map(BBox::area).collect();

  // 按置信度降序排序（稳定排序）
  let mut order: Vec<usize> = (0..count).collect();
  order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

  let mut kept = Vec::new();
  while let Some(&best) = order.first() {
    kept.push(best);
    order.retain(|&other| {
      other != best
        && iou_with_areas(&boxes[best], &boxes[other], areas[best], areas[other])
          <= iou_threshold
    });
  }

  debug!("NMS: {} 个候选框, 保留 {} 个", count, kept.len());
  kept
}
