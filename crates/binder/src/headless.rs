//! Monospace renderer without a display, for tests and batch tools.
//!
//! Every glyph advances by the same width and every line has the same
//! height. Block elements start new lines, words wrap at the column width
//! and paginated content flows into columns laid out left to right.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use parchment::Boundary;
use parchment::Document;
use parchment::NodeId;
use parchment::Range;
use parchment::tree::EdgeRef;
use serde::Deserialize;

use crate::contents::Contents;
use crate::frame::Frame;
use crate::frame::FrameSettings;
use crate::frame::Renderer;
use crate::frame::SurfaceError;
use crate::geometry::Rect;
use crate::geometry::Size;
use crate::geometry::WritingMode;

const BLOCK_ELEMENTS: &[&str] = &[
	"address",
	"article",
	"aside",
	"blockquote",
	"dd",
	"div",
	"dl",
	"dt",
	"figcaption",
	"figure",
	"footer",
	"h1",
	"h2",
	"h3",
	"h4",
	"h5",
	"h6",
	"header",
	"hr",
	"li",
	"nav",
	"ol",
	"p",
	"pre",
	"section",
	"table",
	"tr",
	"ul",
];

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Metrics {
	pub glyph_width: f32,
	pub line_height: f32,
}

impl Default for Metrics {
	fn default() -> Self {
		Self {
			glyph_width: 8.0,
			line_height: 16.0,
		}
	}
}

#[derive(Debug, Clone)]
pub struct HeadlessRenderer {
	metrics: Metrics,
	srcdoc: bool,
}

impl HeadlessRenderer {
	pub fn new(metrics: Metrics) -> Self {
		Self {
			metrics,
			srcdoc: true,
		}
	}

	pub fn without_srcdoc(mut self) -> Self {
		self.srcdoc = false;
		self
	}
}

impl Renderer for HeadlessRenderer {
	fn create_frame(&self, settings: &FrameSettings) -> Box<dyn Frame> {
		Box::new(HeadlessFrame::new(settings.clone(), self.metrics))
	}

	fn supports_srcdoc(&self) -> bool {
		self.srcdoc
	}
}

pub struct HeadlessFrame {
	settings: FrameSettings,
	metrics: Metrics,
	contents: Option<HeadlessContents>,
	size: Size,
	visible: bool,
	torn_down: bool,
}

impl HeadlessFrame {
	pub fn new(settings: FrameSettings, metrics: Metrics) -> Self {
		Self {
			settings,
			metrics,
			contents: None,
			size: Size::default(),
			visible: true,
			torn_down: false,
		}
	}

	pub fn settings(&self) -> &FrameSettings {
		&self.settings
	}

	pub fn size(&self) -> Size {
		self.size
	}

	pub fn is_visible(&self) -> bool {
		self.visible
	}
}

impl Frame for HeadlessFrame {
	fn load(&mut self, markup: &str) -> Result<(), SurfaceError> {
		if self.torn_down {
			return Err(SurfaceError::Destroyed);
		}
		let document = Document::parse(markup);
		if document.body().is_none() {
			return Err(SurfaceError::Load(format!("{} has no body", self.settings.id)));
		}
		log::trace!(
			"Loaded {} with {} nodes",
			self.settings.id,
			document.node_count()
		);
		self.contents = Some(HeadlessContents::new(document, self.metrics));
		Ok(())
	}

	fn contents(&self) -> Option<&dyn Contents> {
		self.contents.as_ref().map(|c| c as &dyn Contents)
	}

	fn contents_mut(&mut self) -> Option<&mut dyn Contents> {
		self.contents.as_mut().map(|c| c as &mut dyn Contents)
	}

	fn set_size(&mut self, width: f32, height: f32) {
		self.size = Size::new(width, height);
	}

	fn set_visible(&mut self, visible: bool) {
		self.visible = visible;
	}

	fn teardown(&mut self) {
		self.contents = None;
		self.torn_down = true;
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Format {
	Columns {
		width: f32,
		height: f32,
		column_width: f32,
		gap: f32,
	},
	Size {
		width: Option<f32>,
		height: Option<f32>,
	},
	Fit {
		width: f32,
		height: f32,
	},
}

/// Resolved placement rules for one reflow.
#[derive(Debug, Clone, Copy)]
struct Flow {
	capacity: usize,
	lines_per_column: Option<usize>,
	stride: f32,
	padding: f32,
	metrics: Metrics,
}

impl Flow {
	fn glyph_rect(&self, line: usize, col: usize, width: f32) -> Rect {
		let (column, row) = match self.lines_per_column {
			Some(per) => (line / per, line % per),
			None => (0, line),
		};
		Rect::new(
			self.padding + column as f32 * self.stride + col as f32 * self.metrics.glyph_width,
			row as f32 * self.metrics.line_height,
			width,
			self.metrics.line_height,
		)
	}
}

#[derive(Debug, Default)]
struct Cursor {
	line: usize,
	col: usize,
	longest: usize,
	pending_space: bool,
	word: Vec<(NodeId, usize)>,
	glyphs: BTreeMap<NodeId, Vec<Rect>>,
}

impl Cursor {
	fn set(&mut self, node: NodeId, idx: usize, rect: Rect) {
		if let Some(slot) = self.glyphs.get_mut(&node).and_then(|g| g.get_mut(idx)) {
			*slot = rect;
		}
	}

	fn place_word(&mut self, flow: &Flow) {
		if self.word.is_empty() {
			return;
		}
		if self.col > 0 {
			let needed = self.col + usize::from(self.pending_space) + self.word.len();
			if needed > flow.capacity {
				self.line += 1;
				self.col = 0;
			} else if self.pending_space {
				self.col += 1;
			}
		}
		for (node, idx) in std::mem::take(&mut self.word) {
			if self.col >= flow.capacity {
				self.line += 1;
				self.col = 0;
			}
			let rect = flow.glyph_rect(self.line, self.col, flow.metrics.glyph_width);
			self.set(node, idx, rect);
			self.col += 1;
		}
		self.longest = self.longest.max(self.col);
		self.pending_space = false;
	}

	fn space(&mut self, flow: &Flow, node: NodeId, idx: usize) {
		self.place_word(flow);
		let caret = flow.glyph_rect(self.line, self.col, 0.0);
		self.set(node, idx, caret);
		self.pending_space = self.col > 0;
	}

	fn break_line(&mut self, flow: &Flow, forced: bool) {
		self.place_word(flow);
		if self.col > 0 || forced {
			self.line += 1;
			self.col = 0;
		}
		self.pending_space = false;
	}

	fn lines(&self) -> usize {
		if self.col > 0 { self.line + 1 } else { self.line }
	}
}

pub struct HeadlessContents {
	document: Document,
	metrics: Metrics,
	format: Format,
	writing_mode: WritingMode,
	glyphs: BTreeMap<NodeId, Vec<Rect>>,
	lines: usize,
	longest_line: usize,
}

impl HeadlessContents {
	pub fn new(document: Document, metrics: Metrics) -> Self {
		let writing_mode = detect_writing_mode(&document);
		let mut contents = Self {
			document,
			metrics,
			format: Format::Size {
				width: None,
				height: None,
			},
			writing_mode,
			glyphs: BTreeMap::new(),
			lines: 0,
			longest_line: 0,
		};
		contents.reflow();
		contents
	}

	fn flow(&self) -> Flow {
		let glyph = self.metrics.glyph_width.max(f32::EPSILON);
		let capacity = |w: f32| ((w / glyph).floor() as usize).max(1);
		let single = |capacity| Flow {
			capacity,
			lines_per_column: None,
			stride: 0.0,
			padding: 0.0,
			metrics: self.metrics,
		};
		match self.format {
			Format::Columns {
				width,
				height,
				column_width,
				gap,
			} => {
				let inner = (width - gap).max(glyph);
				let per_view = if column_width + gap > 0.0 {
					(((inner + gap) / (column_width + gap)).floor() as usize).max(1)
				} else {
					1
				};
				let column = (inner - (per_view - 1) as f32 * gap) / per_view as f32;
				let lines = (height / self.metrics.line_height.max(f32::EPSILON)).floor() as usize;
				Flow {
					capacity: capacity(column),
					lines_per_column: Some(lines.max(1)),
					stride: column + gap,
					padding: gap / 2.0,
					metrics: self.metrics,
				}
			}
			Format::Size {
				width: Some(width),
				..
			}
			| Format::Fit { width, .. } => single(capacity(width)),
			Format::Size { width: None, .. } => single(usize::MAX),
		}
	}

	fn reflow(&mut self) {
		let flow = self.flow();
		let mut cursor = Cursor::default();
		let doc = &self.document;
		for edge in doc.body_iter().into_iter().flatten() {
			match edge {
				EdgeRef::OpenElement(el) => {
					let name = doc.local_name(el.id).map(|n| &**n).unwrap_or_default();
					if name == "br" {
						cursor.break_line(&flow, true);
					} else if BLOCK_ELEMENTS.contains(&name) {
						cursor.break_line(&flow, false);
					}
				}
				EdgeRef::CloseElement(_, name) => {
					if BLOCK_ELEMENTS.contains(&&*name) {
						cursor.break_line(&flow, false);
					}
				}
				EdgeRef::Text(t) => {
					let text = doc.text(t.id).unwrap_or_default();
					cursor
						.glyphs
						.insert(t.id, vec![Rect::default(); text.chars().count()]);
					for (idx, c) in text.chars().enumerate() {
						if c.is_whitespace() {
							cursor.space(&flow, t.id, idx);
						} else {
							cursor.word.push((t.id, idx));
						}
					}
				}
			}
		}
		cursor.place_word(&flow);

		self.lines = cursor.lines();
		self.longest_line = cursor.longest;
		self.glyphs = cursor.glyphs;
		log::trace!("Reflowed into {} lines", self.lines);
	}

	fn columns_used(&self) -> usize {
		match self.flow().lines_per_column {
			Some(per) => self.lines.div_ceil(per).max(1),
			None => 1,
		}
	}

	fn text_segments(&self, range: &Range) -> Vec<(NodeId, usize, usize)> {
		let doc = &self.document;
		let mut segments = Vec::new();
		for node in doc.text_nodes(doc.root()) {
			let len = doc.node_len(node);
			let from = if node == range.start.node {
				range.start.offset.min(len)
			} else if doc.compare_boundaries(&Boundary::new(node, len), &range.start) != Ordering::Greater {
				continue;
			} else {
				0
			};
			let to = if node == range.end.node {
				range.end.offset.min(len)
			} else if doc.compare_boundaries(&Boundary::new(node, 0), &range.end) != Ordering::Less {
				break;
			} else {
				len
			};
			segments.push((node, from, to.max(from)));
			if node == range.end.node {
				break;
			}
		}
		segments
	}

	fn char_rects(&self, range: &Range) -> Vec<Rect> {
		self.text_segments(range)
			.into_iter()
			.filter_map(|(node, from, to)| self.glyphs.get(&node).map(|g| (g, from, to)))
			.flat_map(|(g, from, to)| g[from.min(g.len())..to.min(g.len())].iter().copied())
			.filter(|r| r.width > 0.0)
			.collect()
	}

	/// Zero width caret where a boundary sits.
	fn caret(&self, at: &Boundary) -> Option<Rect> {
		let doc = &self.document;
		let node = if doc.is_text(at.node) {
			at.node
		} else {
			let following = Range::new(*at, Boundary::new(doc.root(), doc.child_count(doc.root())));
			self.text_segments(&following).first()?.0
		};
		let glyphs = self.glyphs.get(&node)?;
		let offset = if node == at.node { at.offset } else { 0 };
		match glyphs.get(offset) {
			Some(r) => Some(Rect::new(r.left, r.top, 0.0, r.height)),
			None => glyphs.last().map(|r| Rect::new(r.right(), r.top, 0.0, r.height)),
		}
	}
}

impl Contents for HeadlessContents {
	fn document(&self) -> &Document {
		&self.document
	}

	fn text_width(&self) -> f32 {
		match self.format {
			Format::Columns { .. } => self.columns_used() as f32 * self.flow().stride,
			Format::Fit { width, .. } => width,
			Format::Size { width, .. } => {
				width.unwrap_or(self.longest_line as f32 * self.metrics.glyph_width)
			}
		}
	}

	fn text_height(&self) -> f32 {
		match self.format {
			Format::Columns { height, .. } | Format::Fit { height, .. } => height,
			Format::Size { .. } => self.lines as f32 * self.metrics.line_height,
		}
	}

	fn scroll_width(&self) -> f32 {
		match self.format {
			Format::Columns { width, .. } => self.text_width().max(width),
			_ => self.text_width(),
		}
	}

	fn scroll_height(&self) -> f32 {
		match self.format {
			Format::Size {
				height: Some(height),
				..
			} => self.text_height().max(height),
			_ => self.text_height(),
		}
	}

	fn range_rect(&self, range: &Range) -> Option<Rect> {
		let rects = self.char_rects(range);
		match rects.into_iter().reduce(|a, b| a.union(&b)) {
			Some(rect) => Some(rect),
			None => self.caret(&range.start),
		}
	}

	fn range_rects(&self, range: &Range) -> Vec<Rect> {
		let gap = self.metrics.glyph_width + f32::EPSILON;
		let mut merged: Vec<Rect> = Vec::new();
		for rect in self.char_rects(range) {
			match merged.last_mut() {
				Some(last) if last.top == rect.top && (0.0..=gap).contains(&(rect.left - last.right())) => {
					*last = last.union(&rect);
				}
				_ => merged.push(rect),
			}
		}
		merged
	}

	fn columns(&mut self, width: f32, height: f32, column_width: f32, gap: f32) {
		self.format = Format::Columns {
			width,
			height,
			column_width,
			gap,
		};
		self.reflow();
	}

	fn size(&mut self, width: Option<f32>, height: Option<f32>) {
		self.format = Format::Size { width, height };
		self.reflow();
	}

	fn fit(&mut self, width: f32, height: f32) {
		self.format = Format::Fit { width, height };
		self.reflow();
	}

	fn writing_mode(&self) -> WritingMode {
		self.writing_mode
	}
}

fn detect_writing_mode(doc: &Document) -> WritingMode {
	let style = [doc.document_element(), doc.body()]
		.into_iter()
		.flatten()
		.filter_map(|id| doc.attr(id, "style"))
		.collect::<Vec<_>>()
		.concat();
	if style.contains("vertical-rl") {
		WritingMode::VerticalRl
	} else if style.contains("vertical-lr") {
		WritingMode::VerticalLr
	} else {
		WritingMode::HorizontalTb
	}
}
