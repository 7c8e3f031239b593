// 该文件是 Shanan-SSD 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::{
  path::{Path, PathBuf},
  sync::atomic::{AtomicU32, Ordering},
};

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  output::Render,
  pipeline::FrameResult,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// `Draw` 保存标注后的帧；`Record` 保存原始帧并在同名 .txt 中写入检测结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
  Draw,
  Record { label_with_name: bool },
}

impl RecordMode {
  fn with(kind: Option<&str>) -> Self {
    match kind {
      Some("id") => RecordMode::Record {
        label_with_name: false,
      },
      Some(_) => RecordMode::Record {
        label_with_name: true,
      },
      None => RecordMode::Draw,
    }
  }
}

/// 每行: 类别, 置信度, left, top, right, bottom（归一化坐标）
pub fn record_lines(result: &FrameResult, label_with_name: bool) -> Vec<String> {
  result
    .annotations()
    .iter()
    .map(|item| {
      let name = if label_with_name {
        item.label.to_string()
      } else {
        item.detection.class_id.to_string()
      };
      let bbox = &item.detection.bbox;
      format!(
        "{}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
        name, item.detection.confidence, bbox.left, bbox.top, bbox.right, bbox.bottom
      )
    })
    .collect()
}

pub struct DirectoryRecordOutput {
  directory: PathBuf,
  mode: RecordMode,
  frame_counter: AtomicU32,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let kind = uri
      .query_pairs()
      .find(|(k, _)| k == "record")
      .map(|(_, v)| v.into_owned());
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(
      DirectoryRecordOutput::new(uri.path(), RecordMode::with(kind.as_deref()))
        .with_always(always),
    )
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>, mode: RecordMode) -> Self {
    Self {
      directory: directory.into(),
      mode,
      frame_counter: AtomicU32::new(0),
      always: false,
    }
  }

  /// 没有检测结果的帧也保存
  pub fn with_always(mut self, always: bool) -> Self {
    self.always = always;
    self
  }

  pub fn mode(&self) -> RecordMode {
    self.mode
  }

  fn frame_id(&self) -> u32 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed) + 1
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn save_result(
    &self,
    path: &Path,
    frame: &Frame,
    result: &FrameResult,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self.mode {
      RecordMode::Draw => frame.to_rgb().save(path)?,
      RecordMode::Record { label_with_name } => {
        frame.to_rgb().save(path)?;
        std::fs::write(
          path.with_extension("txt"),
          record_lines(result, label_with_name).join("\n"),
        )?;
      }
    }
    debug!("记录帧到: {}", path.display());
    Ok(())
  }
}

impl Render for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn needs_raw_frame(&self) -> bool {
    matches!(self.mode, RecordMode::Record { .. })
  }

  fn render_result(&self, frame: &Frame, result: &FrameResult) -> Result<(), Self::Error> {
    if self.always || !result.is_empty() {
      let path = self.frame_path()?;
      self.save_result(&path, frame, result)?;
    }
    Ok(())
  }
}
