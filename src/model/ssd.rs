// 该文件是 Shanan-SSD 项目的一部分。
// src/model/ssd.rs - SSD 检测输出解码
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

use std::{cmp::Ordering, iter::FusedIterator};

use thiserror::Error;
use tracing::debug;

use crate::model::{Detection, NormalizedBox, RawDetectionBuffer};

pub const SSD_RECORD_STRIDE: usize = 7;
pub const SSD_CONFIDENCE_THRESHOLD: f32 = 0.2;

const CLASS_ID_INDEX: usize = 1;
const CONFIDENCE_INDEX: usize = 2;
const BOX_INDEX: usize = 3;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("检测输出长度 {len} 不是记录长度 {stride} 的整数倍")]
pub struct MalformedOutputError {
  pub len: usize,
  pub stride: usize,
}

/// 将原始输出解释为 7 值记录序列，丢弃置信度不高于阈值的记录。
///
/// 返回的迭代器是惰性的，只能遍历一次，并保持后端给出的顺序。
/// 这里不检查 class id 是否在标签表范围内。
pub fn decode(raw: RawDetectionBuffer, threshold: f32) -> Result<Detections, MalformedOutputError> {
  let len = raw.len();
  if len % SSD_RECORD_STRIDE != 0 {
    return Err(MalformedOutputError {
      len,
      stride: SSD_RECORD_STRIDE,
    });
  }

  debug!("解码 {} 条检测记录", len / SSD_RECORD_STRIDE);
  Ok(Detections {
    data: raw.into_vec(),
    cursor: 0,
    threshold,
  })
}

#[derive(Debug)]
pub struct Detections {
  data: Vec<f32>,
  cursor: usize,
  threshold: f32,
}

impl Detections {
  /// 尚未读取的记录数（含将被阈值过滤的记录）
  pub fn remaining_records(&self) -> usize {
    (self.data.len() - self.cursor) / SSD_RECORD_STRIDE
  }
}

impl Iterator for Detections {
  type Item = Detection;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(record) = self.data.get(self.cursor..self.cursor + SSD_RECORD_STRIDE) {
      self.cursor += SSD_RECORD_STRIDE;

      let confidence = record[CONFIDENCE_INDEX];
      // NaN 同样被丢弃
      if confidence.partial_cmp(&self.threshold) != Some(Ordering::Greater) {
        continue;
      }

      return Some(Detection {
        class_id: class_id_from(record[CLASS_ID_INDEX]),
        confidence,
        bbox: NormalizedBox::new(
          record[BOX_INDEX],
          record[BOX_INDEX + 1],
          record[BOX_INDEX + 2],
          record[BOX_INDEX + 3],
        ),
      });
    }
    None
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    (0, Some(self.remaining_records()))
  }
}

impl FusedIterator for Detections {}

// 负数与非有限值不对应任何类别，映射到一个标签表不可能包含的 id
fn class_id_from(raw: f32) -> usize {
  if raw.is_finite() && raw >= 0.0 {
    raw.trunc() as usize
  } else {
    usize::MAX
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn decode_all(data: &[f32], threshold: f32) -> Result<Vec<Detection>, MalformedOutputError> {
    decode(RawDetectionBuffer::from(data), threshold).map(Iterator::collect)
  }

  #[test]
  fn records_at_or_below_threshold_are_dropped() {
    let data = [
      0.0, 15.0, 0.2, 0.1, 0.1, 0.5, 0.5, //
      0.0, 7.0, 0.05, 0.0, 0.0, 1.0, 1.0, //
      0.0, 3.0, 0.0, 0.2, 0.2, 0.3, 0.3,
    ];
    assert!(decode_all(&data, SSD_CONFIDENCE_THRESHOLD).unwrap().is_empty());
  }

  #[test]
  fn single_record_keeps_exact_values() {
    let data = [0.0, 15.0, 0.9, 0.1, 0.2, 0.5, 0.6];
    let detections = decode_all(&data, SSD_CONFIDENCE_THRESHOLD).unwrap();
    assert_eq!(
      detections,
      vec![Detection {
        class_id: 15,
        confidence: 0.9,
        bbox: NormalizedBox::new(0.1, 0.2, 0.5, 0.6),
      }]
    );
  }

  #[test]
  fn length_not_multiple_of_stride_is_malformed() {
    let err = decode_all(&[0.0; 5], SSD_CONFIDENCE_THRESHOLD).unwrap_err();
    assert_eq!(err, MalformedOutputError { len: 5, stride: 7 });
    assert!(decode_all(&[0.0; 15], SSD_CONFIDENCE_THRESHOLD).is_err());
  }

  #[test]
  fn empty_buffer_decodes_to_nothing() {
    assert!(decode_all(&[], SSD_CONFIDENCE_THRESHOLD).unwrap().is_empty());
  }

  #[test]
  fn order_is_preserved_and_class_is_truncated() {
    let data = [
      0.0, 2.9, 0.3, 0.0, 0.0, 0.1, 0.1, //
      0.0, 12.0, 0.1, 0.0, 0.0, 0.1, 0.1, //
      0.0, 15.0, 0.95, 0.2, 0.2, 0.4, 0.4, //
      0.0, 8.0, 0.5, 0.3, 0.3, 0.9, 0.9,
    ];
    let ids: Vec<_> = decode_all(&data, SSD_CONFIDENCE_THRESHOLD)
      .unwrap()
      .into_iter()
      .map(|d| (d.class_id, d.confidence))
      .collect();
    assert_eq!(ids, vec![(2, 0.3), (15, 0.95), (8, 0.5)]);
  }

  #[test]
  fn nan_confidence_and_negative_class() {
    let data = [
      0.0, 1.0, f32::NAN, 0.0, 0.0, 1.0, 1.0, //
      0.0, -1.0, 0.8, 0.0, 0.0, 1.0, 1.0,
    ];
    let detections = decode_all(&data, SSD_CONFIDENCE_THRESHOLD).unwrap();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].class_id, usize::MAX);
  }

  #[test]
  fn iterator_is_lazy_and_fused() {
    let data = [
      0.0, 1.0, 0.9, 0.0, 0.0, 1.0, 1.0, //
      0.0, 2.0, 0.9, 0.0, 0.0, 1.0, 1.0,
    ];
    let mut detections = decode(RawDetectionBuffer::from(&data[..]), 0.2).unwrap();
    assert_eq!(detections.remaining_records(), 2);
    assert_eq!(detections.next().map(|d| d.class_id), Some(1));
    assert_eq!(detections.remaining_records(), 1);
    assert_eq!(detections.next().map(|d| d.class_id), Some(2));
    assert!(detections.next().is_none());
    assert!(detections.next().is_none());
  }
}
