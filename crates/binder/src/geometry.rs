use serde::Deserialize;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Point {
	pub left: f32,
	pub top: f32,
}

impl Point {
	pub fn new(left: f32, top: f32) -> Self {
		Self { left, top }
	}
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Size {
	pub width: f32,
	pub height: f32,
}

impl Size {
	pub fn new(width: f32, height: f32) -> Self {
		Self {
			width: clamp_dim(width),
			height: clamp_dim(height),
		}
	}
}

/// Negative and NaN dimensions collapse to zero.
pub fn clamp_dim(v: f32) -> f32 {
	if v.is_nan() { 0.0 } else { v.max(0.0) }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Rect {
	pub left: f32,
	pub top: f32,
	pub width: f32,
	pub height: f32,
}

impl Rect {
	pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
		Self {
			left,
			top,
			width,
			height,
		}
	}

	pub fn right(&self) -> f32 {
		self.left + self.width
	}

	pub fn bottom(&self) -> f32 {
		self.top + self.height
	}

	pub fn translate(&self, dx: f32, dy: f32) -> Rect {
		Rect {
			left: self.left + dx,
			top: self.top + dy,
			..*self
		}
	}

	/// Smallest rect covering both.
	pub fn union(&self, other: &Rect) -> Rect {
		let left = self.left.min(other.left);
		let top = self.top.min(other.top);
		let right = self.right().max(other.right());
		let bottom = self.bottom().max(other.bottom());
		Rect::new(left, top, right - left, bottom - top)
	}

	pub fn contains_rect(&self, other: &Rect) -> bool {
		other.left >= self.left
			&& other.top >= self.top
			&& other.right() <= self.right()
			&& other.bottom() <= self.bottom()
	}

	pub fn contains(&self, p: Point) -> bool {
		p.left >= self.left && p.left < self.right() && p.top >= self.top && p.top < self.bottom()
	}
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
	#[default]
	Horizontal,
	Vertical,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
	#[default]
	Ltr,
	Rtl,
}

impl Direction {
	pub fn sign(self) -> f32 {
		match self {
			Direction::Ltr => 1.0,
			Direction::Rtl => -1.0,
		}
	}
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WritingMode {
	#[default]
	HorizontalTb,
	VerticalRl,
	VerticalLr,
}

impl WritingMode {
	pub fn is_vertical(self) -> bool {
		!matches!(self, WritingMode::HorizontalTb)
	}
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overflow {
	#[default]
	Hidden,
	Auto,
	Scroll,
	Visible,
}
