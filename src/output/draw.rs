// 该文件是 Shanan-SSD 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{ImageBuffer, Pixel, Rgb, Rgba};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};

use crate::{
  frame::Frame,
  label::{LabelTable, UnknownClassError},
  model::Detection,
  output::mapper::PixelBox,
  pipeline::FrameResult,
};

const BOX_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const LABEL_BACKGROUND_COLOR: [u8; 3] = [255, 255, 255];
const LABEL_TEXT_COLOR: [u8; 3] = [0, 0, 0];

// Hershey Simplex 在 fontScale = 1 时大写字母约 22 像素高，
// 对应 DejaVu Sans 约 35 像素字号
const HERSHEY_PX_PER_SCALE: f32 = 35.0;
const LABEL_FONT_SCALE: f32 = 0.5;
const LINE_THICKNESS: i32 = 1;

/// 可直接叠加绘制的 8 位像素
pub trait OverlayPixel: Pixel<Subpixel = u8> {
  fn from_rgb(color: [u8; 3]) -> Self;
}

impl OverlayPixel for Rgb<u8> {
  fn from_rgb(color: [u8; 3]) -> Self {
    Rgb(color)
  }
}

impl OverlayPixel for Rgba<u8> {
  fn from_rgb([r, g, b]: [u8; 3]) -> Self {
    Rgba([r, g, b, u8::MAX])
  }
}

/// 标签文本的渲染尺寸；baseline 为基线以下的像素数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelSize {
  pub width: i32,
  pub height: i32,
  pub baseline: i32,
}

/// 标签文本：类别名 + ": " + 置信度的最短十进制表示
pub fn format_label(name: &str, confidence: f32) -> String {
  format!("{}: {}", name, confidence)
}

#[derive(Clone)]
pub struct AnnotationRenderer {
  labels: LabelTable,
  font: FontArc,
  scale: PxScale,
}

impl Default for AnnotationRenderer {
  fn default() -> Self {
    Self::new(LabelTable::voc())
  }
}

impl AnnotationRenderer {
  pub fn new(labels: LabelTable) -> Self {
    let font_data: &'static [u8] = include_bytes!("../../assets/DejaVuSans.ttf");
    let font = FontArc::try_from_slice(font_data).expect("无法加载嵌入的字体文件");
    Self::with_font(labels, font)
  }

  pub fn with_font(labels: LabelTable, font: FontArc) -> Self {
    Self {
      labels,
      font,
      scale: PxScale::from(HERSHEY_PX_PER_SCALE * LABEL_FONT_SCALE),
    }
  }

  pub fn labels(&self) -> &LabelTable {
    &self.labels
  }

  pub fn label_text(&self, detection: &Detection) -> Result<String, UnknownClassError> {
    let name = self.labels.get(detection.class_id)?;
    Ok(format_label(name, detection.confidence))
  }

  pub fn measure(&self, text: &str) -> LabelSize {
    let (width, _) = text_size(self.scale, &self.font, text);
    let scaled = self.font.as_scaled(self.scale);
    LabelSize {
      width: width as i32,
      height: scaled.ascent().ceil() as i32,
      baseline: (-scaled.descent()).ceil() as i32,
    }
  }

  /// 在帧上绘制一个检测框及其标签。类别越界时不绘制任何内容。
  ///
  /// 不做去重，同一检测绘制两次就会画两次。
  pub fn render(
    &self,
    frame: &mut Frame,
    detection: &Detection,
    pixel_box: &PixelBox,
  ) -> Result<(), UnknownClassError> {
    let label = self.label_text(detection)?;
    self.draw_on_frame(frame, &label, pixel_box);
    Ok(())
  }

  /// 逐个绘制一帧的检测结果，类别应已用同一标签表解析过
  pub fn annotate(
    &self,
    frame: &mut Frame,
    result: &FrameResult,
  ) -> Result<(), UnknownClassError> {
    for annotation in result.annotations() {
      self.render(frame, &annotation.detection, &annotation.pixel_box)?;
    }
    Ok(())
  }

  fn draw_on_frame(&self, frame: &mut Frame, label: &str, pixel_box: &PixelBox) {
    match frame {
      Frame::Rgb(image) => self.draw_bbox_with_label(image, label, pixel_box),
      Frame::Rgba(image) => self.draw_bbox_with_label(image, label, pixel_box),
    }
  }

  fn draw_bbox_with_label<P: OverlayPixel>(
    &self,
    image: &mut ImageBuffer<P, Vec<u8>>,
    label: &str,
    pixel_box: &PixelBox,
  ) {
    // 边框，端点包含在内，超出画面的部分被裁掉
    let (x0, x1) = ordered(pixel_box.left, pixel_box.right);
    let (y0, y1) = ordered(pixel_box.top, pixel_box.bottom);
    let inset = LINE_THICKNESS - 1;
    let box_color = P::from_rgb(BOX_COLOR);
    fill_clipped(image, x0, y0, x1, y0.saturating_add(inset), box_color);
    fill_clipped(image, x0, y1.saturating_sub(inset), x1, y1, box_color);
    fill_clipped(image, x0, y0, x0.saturating_add(inset), y1, box_color);
    fill_clipped(image, x1.saturating_sub(inset), y0, x1, y1, box_color);

    // 标签背景：从框左上角向上一个字高，向下一个基线
    let LabelSize {
      width,
      height,
      baseline,
    } = self.measure(label);
    let (left, top) = (pixel_box.left, pixel_box.top);
    let visible = fill_clipped(
      image,
      left,
      top.saturating_sub(height),
      left.saturating_add(width),
      top.saturating_add(baseline),
      P::from_rgb(LABEL_BACKGROUND_COLOR),
    );
    if !visible {
      return;
    }

    // 文本基线落在框的左上角
    let ascent = self.font.as_scaled(self.scale).ascent().round() as i32;
    draw_text_mut(
      image,
      P::from_rgb(LABEL_TEXT_COLOR),
      left,
      top - ascent,
      self.scale,
      &self.font,
      label,
    );
  }
}

fn ordered(a: i32, b: i32) -> (i32, i32) {
  if a <= b { (a, b) } else { (b, a) }
}

// 填充闭区间 [x0, x1] x [y0, y1] 与画面的交集，返回是否有像素落在画面内
fn fill_clipped<P: OverlayPixel>(
  image: &mut ImageBuffer<P, Vec<u8>>,
  x0: i32,
  y0: i32,
  x1: i32,
  y1: i32,
  color: P,
) -> bool {
  let max_x = image.width() as i64 - 1;
  let max_y = image.height() as i64 - 1;
  let (x0, x1) = ((x0 as i64).max(0), (x1 as i64).min(max_x));
  let (y0, y1) = ((y0 as i64).max(0), (y1 as i64).min(max_y));
  if x1 < x0 || y1 < y0 {
    return false;
  }

  let rect = Rect::at(x0 as i32, y0 as i32).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
  draw_filled_rect_mut(image, rect, color);
  true
}
