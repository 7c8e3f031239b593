// 该文件是 Shanan-SSD 项目的一部分。
// src/label.rs - 类别标签表
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

use thiserror::Error;

/// PASCAL VOC 类别名称，索引 0 为背景占位
pub const VOC_LABELS: [&str; 21] = [
  "background",
  "aeroplane",
  "bicycle",
  "bird",
  "boat",
  "bottle",
  "bus",
  "car",
  "cat",
  "chair",
  "cow",
  "diningtable",
  "dog",
  "horse",
  "motorbike",
  "person",
  "pottedplant",
  "sheep",
  "sofa",
  "train",
  "tvmonitor",
];

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("未知类别 {class_id}: 标签表仅有 {table_len} 项")]
pub struct UnknownClassError {
  pub class_id: usize,
  pub table_len: usize,
}

/// 只读的类别标签表，按 class id 索引
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelTable {
  names: &'static [&'static str],
}

impl LabelTable {
  pub const fn new(names: &'static [&'static str]) -> Self {
    Self { names }
  }

  pub const fn voc() -> Self {
    Self::new(&VOC_LABELS)
  }

  pub fn get(&self, class_id: usize) -> Result<&'static str, UnknownClassError> {
    self
      .names
      .get(class_id)
      .copied()
      .ok_or(UnknownClassError {
        class_id,
        table_len: self.names.len(),
      })
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

impl Default for LabelTable {
  fn default() -> Self {
    Self::voc()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn voc_table_has_background_and_person() {
    let table = LabelTable::voc();
    assert_eq!(table.len(), 21);
    assert_eq!(table.get(0), Ok("background"));
    assert_eq!(table.get(15), Ok("person"));
    assert_eq!(table.get(20), Ok("tvmonitor"));
  }

  #[test]
  fn out_of_range_id_is_rejected() {
    let table = LabelTable::voc();
    assert_eq!(
      table.get(999),
      Err(UnknownClassError {
        class_id: 999,
        table_len: 21
      })
    );
    assert!(table.get(21).is_err());
  }
}
