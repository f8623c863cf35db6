// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/output/save_image_file.rs - 绘制结果并保存图像文件
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

use std::{cell::RefCell, path::Path};

use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::Inference,
  output::{
    Render,
    draw::{Draw, DrawOnSurface, Surface},
  },
};

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("无效的输出参数 {key}={value}")]
  InvalidParameter { key: String, value: String },
}

/// 绘制结果并保存，`image:///path/to/result.png?keypoint_threshold=0.5`
pub struct SaveImageFileOutput {
  path: String,
  draw: Draw,
  surface: RefCell<Surface>,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let mut draw = Draw::default();
    for (key, value) in uri.query_pairs() {
      let invalid = || SaveImageFileError::InvalidParameter {
        key: key.to_string(),
        value: value.to_string(),
      };
      match &*key {
        "keypoint_threshold" => {
          let threshold = value.parse::<f32>().map_err(|_| invalid())?;
          draw = draw.keypoint_threshold(threshold);
        }
        _ => return Err(invalid()),
      }
    }

    Ok(SaveImageFileOutput {
      path: uri.path().to_string(),
      draw,
      surface: RefCell::new(Surface::default()),
    })
  }
}

impl SaveImageFileOutput {
  fn save_image(&self, image: image::RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(SaveImageFileError::IoError)?;
    }

    image
      .save(&self.path)
      .map_err(SaveImageFileError::ImageError)?;

    warn!("保存图像到文件: {}", self.path);

    Ok(())
  }
}

impl Render<Frame, Inference> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &Frame, result: &Inference) -> Result<(), Self::Error> {
    let image = {
      let mut surface = self.surface.borrow_mut();
      surface.load(&frame.image);
      result.draw_on(&self.draw, &mut surface);
      surface.to_rgb_image()
    };
    self.save_image(image)
  }
}
