//! Annotation marks drawn over a rendering surface.

use std::collections::BTreeMap;

use parchment::Cfi;

use crate::geometry::Point;
use crate::geometry::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkKind {
	/// Positioned anchor over the whole extent
	Mark,
	Highlight,
	Underline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
	Butt,
	Square,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
	Anchor(Rect),
	Rect {
		rect: Rect,
		filled: bool,
	},
	Line {
		from: Point,
		to: Point,
		stroke: &'static str,
		stroke_width: f32,
		cap: LineCap,
	},
}

#[derive(Debug, Clone)]
pub struct Mark {
	pub kind: MarkKind,
	pub cfi_range: Cfi,
	pub class: String,
	pub data: BTreeMap<String, String>,
}

impl Mark {
	pub fn new(kind: MarkKind, cfi_range: Cfi) -> Self {
		let class = match kind {
			MarkKind::Mark => "mark",
			MarkKind::Highlight => "hl",
			MarkKind::Underline => "ul",
		};
		Self {
			kind,
			cfi_range,
			class: class.to_string(),
			data: BTreeMap::new(),
		}
	}

	pub fn with_class(mut self, class: impl Into<String>) -> Self {
		self.class = class.into();
		self
	}

	pub fn with_data(mut self, data: BTreeMap<String, String>) -> Self {
		self.data = data;
		self
	}

	/// Shapes for the client rects of the marked range, relative to `origin`.
	pub fn render(&self, rects: &[Rect], origin: Point) -> Vec<Shape> {
		let rects = filtered_rects(rects)
			.into_iter()
			.map(|r| r.translate(-origin.left, -origin.top))
			.collect::<Vec<_>>();
		match self.kind {
			MarkKind::Mark => rects
				.iter()
				.copied()
				.reduce(|a, b| a.union(&b))
				.map(Shape::Anchor)
				.into_iter()
				.collect(),
			MarkKind::Highlight => rects
				.into_iter()
				.map(|rect| Shape::Rect { rect, filled: true })
				.collect(),
			MarkKind::Underline => rects
				.into_iter()
				.flat_map(|rect| {
					let y = rect.bottom() - 1.0;
					[
						Shape::Rect {
							rect,
							filled: false,
						},
						Shape::Line {
							from: Point::new(rect.left, y),
							to: Point::new(rect.right(), y),
							stroke: "black",
							stroke_width: 1.0,
							cap: LineCap::Square,
						},
					]
				})
				.collect(),
		}
	}
}

/// Drop rects already covered by an earlier rect, nested inline boxes
/// report both.
pub fn filtered_rects(rects: &[Rect]) -> Vec<Rect> {
	rects
		.iter()
		.enumerate()
		.filter(|(i, r)| !rects[..*i].iter().any(|prev| prev.contains_rect(*r)))
		.map(|(_, r)| *r)
		.collect()
}
