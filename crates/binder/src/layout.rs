//! Column and page geometry for a viewport.

use serde::Deserialize;

use crate::contents::Contents;
use crate::geometry::Axis;
use crate::geometry::clamp_dim;

pub const DEFAULT_MIN_SPREAD_WIDTH: f32 = 800.0;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutMode {
	#[default]
	Reflowable,
	PrePaginated,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Flow {
	#[default]
	Paginated,
	Scrolled,
}

impl From<&str> for Flow {
	fn from(value: &str) -> Self {
		match value {
			"scrolled" | "scrolled-doc" | "scrolled-continuous" => Flow::Scrolled,
			_ => Flow::Paginated,
		}
	}
}

impl From<String> for Flow {
	fn from(value: String) -> Self {
		Flow::from(value.as_str())
	}
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Spread {
	None,
	#[default]
	Auto,
	Always,
}

impl Spread {
	pub fn enabled(self) -> bool {
		!matches!(self, Spread::None)
	}
}

impl From<&str> for Spread {
	fn from(value: &str) -> Self {
		match value {
			"none" => Spread::None,
			"always" => Spread::Always,
			_ => Spread::Auto,
		}
	}
}

impl From<String> for Spread {
	fn from(value: String) -> Self {
		Spread::from(value.as_str())
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct LayoutSettings {
	#[serde(default)]
	pub name: LayoutMode,
	#[serde(default)]
	pub flow: Flow,
	#[serde(default)]
	pub spread: Spread,
	#[serde(default = "default_min_spread_width")]
	pub min_spread_width: f32,
	#[serde(default)]
	pub gap: Option<f32>,
}

fn default_min_spread_width() -> f32 {
	DEFAULT_MIN_SPREAD_WIDTH
}

impl Default for LayoutSettings {
	fn default() -> Self {
		Self {
			name: LayoutMode::default(),
			flow: Flow::default(),
			spread: Spread::default(),
			min_spread_width: DEFAULT_MIN_SPREAD_WIDTH,
			gap: None,
		}
	}
}

/// Result of the last `calculate`, replaced wholesale each time.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct LayoutGeometry {
	pub name: LayoutMode,
	pub flow: Flow,
	pub spread: bool,
	pub min_spread_width: f32,
	pub width: f32,
	pub height: f32,
	pub spread_width: f32,
	pub page_width: f32,
	pub delta: f32,
	pub column_width: f32,
	pub gap: f32,
	pub divisor: u32,
}

impl LayoutGeometry {
	pub fn is_paginated(&self) -> bool {
		matches!(self.flow, Flow::Paginated)
	}

	pub fn is_pre_paginated(&self) -> bool {
		matches!(self.name, LayoutMode::PrePaginated)
	}

	/// Pages and spreads covered by `total` along the flow axis.
	pub fn count(&self, total: f32, page_length: Option<f32>) -> PageCount {
		if self.is_pre_paginated() {
			return PageCount {
				spreads: 1,
				pages: 1,
			};
		}
		let length = match (self.flow, page_length) {
			(_, Some(l)) => l,
			(Flow::Paginated, None) => self.delta,
			(Flow::Scrolled, None) => self.height,
		};
		if length <= 0.0 || total <= 0.0 || total.is_nan() {
			return PageCount::default();
		}
		let spreads = (total / length).ceil() as u32;
		let pages = match self.flow {
			Flow::Paginated => spreads * self.divisor,
			Flow::Scrolled => spreads,
		};
		PageCount { spreads, pages }
	}
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageCount {
	pub spreads: u32,
	pub pages: u32,
}

#[derive(Debug, Clone)]
pub struct Layout {
	settings: LayoutSettings,
	geometry: LayoutGeometry,
}

impl Default for Layout {
	fn default() -> Self {
		Self::new(LayoutSettings::default())
	}
}

impl Layout {
	pub fn new(settings: LayoutSettings) -> Self {
		let geometry = LayoutGeometry {
			name: settings.name,
			flow: settings.flow,
			spread: settings.spread.enabled(),
			min_spread_width: settings.min_spread_width,
			divisor: 1,
			..Default::default()
		};
		Self { settings, geometry }
	}

	pub fn settings(&self) -> &LayoutSettings {
		&self.settings
	}

	pub fn geometry(&self) -> &LayoutGeometry {
		&self.geometry
	}

	pub fn name(&self) -> LayoutMode {
		self.settings.name
	}

	pub fn set_name(&mut self, name: LayoutMode) {
		self.settings.name = name;
		self.geometry.name = name;
	}

	pub fn flow(&mut self, flow: Flow) -> Flow {
		self.settings.flow = flow;
		self.geometry.flow = flow;
		flow
	}

	/// Stores spread policy, geometry follows on the next `calculate`.
	pub fn spread(&mut self, spread: Spread, min_width: Option<f32>) -> bool {
		self.settings.spread = spread;
		if let Some(min_width) = min_width {
			self.settings.min_spread_width = min_width;
		}
		spread.enabled()
	}

	pub fn calculate(&mut self, width: f32, height: f32, gap: Option<f32>) -> &LayoutGeometry {
		let s = &self.settings;
		let mut width = clamp_dim(width);
		let height = clamp_dim(height);
		let paginated = matches!(s.flow, Flow::Paginated);

		let divisor = if s.spread.enabled() && width >= s.min_spread_width {
			2
		} else {
			1
		};

		let gap = match (s.name, gap.or(s.gap)) {
			(LayoutMode::PrePaginated, _) => 0.0,
			(LayoutMode::Reflowable, Some(gap)) => clamp_dim(gap),
			(LayoutMode::Reflowable, None) if paginated => {
				let section = (width / 12.0).floor();
				if section % 2.0 == 0.0 {
					section
				} else {
					(section - 1.0).max(0.0)
				}
			}
			(LayoutMode::Reflowable, None) => 0.0,
		};

		let (column_width, page_width) = if divisor > 1 {
			let column_width = width / divisor as f32 - gap;
			(column_width, column_width + gap)
		} else {
			(width, width)
		};

		if matches!(s.name, LayoutMode::PrePaginated) && divisor > 1 {
			width = column_width;
		}

		let spread_width = column_width * divisor as f32 + gap;

		self.geometry = LayoutGeometry {
			name: s.name,
			flow: s.flow,
			spread: s.spread.enabled(),
			min_spread_width: s.min_spread_width,
			width,
			height,
			spread_width,
			page_width,
			delta: width,
			column_width,
			gap,
			divisor,
		};
		log::debug!("Calculated layout {:?}", self.geometry);
		&self.geometry
	}

	pub fn count(&self, total: f32, page_length: Option<f32>) -> PageCount {
		self.geometry.count(total, page_length)
	}

	/// Apply the current geometry to live content.
	pub fn format(&self, contents: &mut dyn Contents, axis: Axis) {
		let g = &self.geometry;
		match (g.name, g.flow, axis) {
			(LayoutMode::PrePaginated, _, _) => contents.fit(g.column_width, g.height),
			(_, Flow::Paginated, _) => contents.columns(g.width, g.height, g.column_width, g.gap),
			(_, Flow::Scrolled, Axis::Horizontal) => contents.size(None, Some(g.height)),
			(_, Flow::Scrolled, Axis::Vertical) => contents.size(Some(g.width), None),
		}
	}
}
