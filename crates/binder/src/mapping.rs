//! Locates the content visible in a pixel window of a view and turns it
//! into range identifiers.
//!
//! Text nodes are scanned first as a whole, then word by word, so a page
//! never starts or ends in the middle of a word. Windows are half open:
//! content starting exactly at `end` belongs to the next page.

use parchment::Cfi;
use parchment::CfiError;
use parchment::Document;
use parchment::NodeId;
use parchment::Range;

use crate::contents::Contents;
use crate::geometry::Axis;
use crate::geometry::Direction;
use crate::geometry::Rect;
use crate::layout::LayoutGeometry;

pub const DEFAULT_SPLITTER: &str = " ";

/// First and last visible point of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRange {
	pub start: Cfi,
	pub end: Cfi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePair {
	pub start: Range,
	pub end: Range,
}

#[derive(Debug, Clone)]
pub struct Mapping {
	geometry: LayoutGeometry,
	direction: Direction,
	horizontal: bool,
}

impl Mapping {
	pub fn new(geometry: LayoutGeometry, direction: Direction, axis: Axis) -> Self {
		Self {
			geometry,
			direction,
			horizontal: matches!(axis, Axis::Horizontal),
		}
	}

	pub fn set_layout(&mut self, geometry: &LayoutGeometry) {
		self.geometry = *geometry;
	}

	pub fn set_direction(&mut self, direction: Direction) {
		self.direction = direction;
	}

	pub fn direction(&self) -> Direction {
		self.direction
	}

	/// Switch axis when given one, returns whether mapping is horizontal.
	pub fn axis(&mut self, axis: Option<Axis>) -> bool {
		if let Some(axis) = axis {
			self.horizontal = matches!(axis, Axis::Horizontal);
		}
		self.horizontal
	}

	/// Range identifiers of the content inside `[start, end)`, None when the
	/// document has no body or no text.
	pub fn page(
		&self,
		contents: &dyn Contents,
		cfi_base: &str,
		start: f32,
		end: f32,
	) -> Option<PageRange> {
		let doc = contents.document();
		let body = doc.body()?;
		let pair = RangePair {
			start: self.find_start(contents, body, start, end)?,
			end: self.find_end(contents, body, start, end)?,
		};
		range_pair_to_cfi_pair(doc, cfi_base, pair)
			.inspect_err(|e| log::warn!("Unable to map page {start}..{end}: {e}"))
			.ok()
	}

	/// Every page of a paginated section.
	pub fn section(&self, contents: &dyn Contents, cfi_base: &str) -> Vec<PageRange> {
		let doc = contents.document();
		let Some(body) = doc.body() else {
			return Vec::new();
		};
		let pairs = self.find_ranges(contents, body);
		range_list_to_cfi_list(doc, cfi_base, &pairs)
			.inspect_err(|e| log::warn!("Unable to map section {cfi_base}: {e}"))
			.unwrap_or_default()
	}

	fn find_ranges(&self, contents: &dyn Contents, root: NodeId) -> Vec<RangePair> {
		let page_width = self.geometry.page_width;
		if page_width <= 0.0 {
			return Vec::new();
		}
		let count = (contents.scroll_width() / page_width).ceil() as usize;
		(0..count)
			.filter_map(|i| {
				let start = page_width * i as f32;
				let end = start + page_width;
				Some(RangePair {
					start: self.find_start(contents, root, start, end)?,
					end: self.find_end(contents, root, start, end)?,
				})
			})
			.collect()
	}

	/// Visit non blank text nodes below `root` until `f` returns a value.
	pub fn walk<T>(
		&self,
		doc: &Document,
		root: NodeId,
		f: impl FnMut(NodeId) -> Option<T>,
	) -> Option<T> {
		doc.text_nodes(root)
			.filter(|n| doc.text(*n).is_some_and(|t| !t.trim().is_empty()))
			.find_map(f)
	}

	pub fn find_start(
		&self,
		contents: &dyn Contents,
		root: NodeId,
		start: f32,
		end: f32,
	) -> Option<Range> {
		let doc = contents.document();
		let mut prev = None;
		let found = self.walk(doc, root, |node| {
			let pos = node_bounds(contents, node)?;
			let visible = if !self.horizontal {
				(pos.top >= start && pos.top < end) || pos.bottom() > start
			} else if self.direction == Direction::Rtl {
				(pos.right() <= end && pos.right() > start) || pos.left < end
			} else {
				(pos.left >= start && pos.left < end) || pos.right() > start
			};
			if visible {
				return Some(node);
			}
			prev = Some(node);
			None
		});
		self.find_text_start_range(contents, found.or(prev)?, start, end)
	}

	pub fn find_end(
		&self,
		contents: &dyn Contents,
		root: NodeId,
		start: f32,
		end: f32,
	) -> Option<Range> {
		let doc = contents.document();
		let mut prev: Option<NodeId> = None;
		let found = self.walk(doc, root, |node| {
			let pos = node_bounds(contents, node)?;
			let (past, crossing) = self.past_and_crossing(&pos, start, end);
			if past && prev.is_some() {
				return prev;
			}
			if crossing {
				return Some(node);
			}
			prev = Some(node);
			None
		});
		self.find_text_end_range(contents, found.or(prev)?, start, end)
	}

	/// Whether `pos` lies wholly after the window, and whether it runs
	/// over the window's far edge.
	fn past_and_crossing(&self, pos: &Rect, start: f32, end: f32) -> (bool, bool) {
		if !self.horizontal {
			(pos.top >= end, pos.bottom() > end)
		} else if self.direction == Direction::Rtl {
			(pos.right() <= start, pos.left < start)
		} else {
			(pos.left >= end, pos.right() > end)
		}
	}

	fn find_text_start_range(
		&self,
		contents: &dyn Contents,
		node: NodeId,
		start: f32,
		end: f32,
	) -> Option<Range> {
		let ranges = split_text_node_into_ranges(contents.document(), node, DEFAULT_SPLITTER);
		let found = ranges.iter().find(|range| {
			let Some(pos) = contents.range_rect(range) else {
				return false;
			};
			if !self.horizontal {
				pos.top >= start
			} else if self.direction == Direction::Rtl {
				pos.right() <= end
			} else {
				pos.left >= start
			}
		});
		found.or(ranges.first()).copied()
	}

	fn find_text_end_range(
		&self,
		contents: &dyn Contents,
		node: NodeId,
		start: f32,
		end: f32,
	) -> Option<Range> {
		let ranges = split_text_node_into_ranges(contents.document(), node, DEFAULT_SPLITTER);
		let mut prev: Option<Range> = None;
		for range in &ranges {
			let Some(pos) = contents.range_rect(range) else {
				continue;
			};
			let (past, crossing) = self.past_and_crossing(&pos, start, end);
			if past && prev.is_some() {
				return prev;
			}
			if crossing {
				return Some(*range);
			}
			prev = Some(*range);
		}
		ranges.last().copied()
	}
}

fn node_bounds(contents: &dyn Contents, node: NodeId) -> Option<Rect> {
	contents.range_rect(&Range::select_node_contents(contents.document(), node))
}

/// Word ranges of a text node. Other nodes, and text without a splitter,
/// come back as one range over the whole node.
pub fn split_text_node_into_ranges(doc: &Document, node: NodeId, splitter: &str) -> Vec<Range> {
	let whole = || vec![Range::select_node_contents(doc, node)];
	let Some(text) = doc.text(node) else {
		return whole();
	};
	if splitter.is_empty() || !text.trim().contains(splitter) {
		return whole();
	}
	let splitter_len = splitter.chars().count();
	let mut ranges = Vec::new();
	let mut from = 0;
	let mut from_byte = 0;
	for (byte, _) in text.match_indices(splitter) {
		let at = from + text[from_byte..byte].chars().count();
		if at > from {
			ranges.push(Range::text_span(node, from, at));
		}
		from = at + splitter_len;
		from_byte = byte + splitter.len();
	}
	let len = from + text[from_byte..].chars().count();
	if len > from {
		ranges.push(Range::text_span(node, from, len));
	}
	ranges
}

/// Collapse a pair to its outer points and identify both.
pub fn range_pair_to_cfi_pair(
	doc: &Document,
	cfi_base: &str,
	pair: RangePair,
) -> Result<PageRange, CfiError> {
	let RangePair {
		mut start,
		mut end,
	} = pair;
	start.collapse(true);
	end.collapse(false);
	Ok(PageRange {
		start: Cfi::from_range(doc, &start, cfi_base)?,
		end: Cfi::from_range(doc, &end, cfi_base)?,
	})
}

pub fn range_list_to_cfi_list(
	doc: &Document,
	cfi_base: &str,
	pairs: &[RangePair],
) -> Result<Vec<PageRange>, CfiError> {
	pairs
		.iter()
		.map(|pair| range_pair_to_cfi_pair(doc, cfi_base, *pair))
		.collect()
}

#[cfg(test)]
mod tests {
	use parchment::Cfi;
	use parchment::Document;
	use parchment::Range;

	use crate::contents::Contents;
	use crate::geometry::Axis;
	use crate::geometry::Direction;
	use crate::headless::HeadlessContents;
	use crate::headless::Metrics;
	use crate::headless::tests::chapter;
	use crate::layout::Layout;
	use crate::layout::LayoutGeometry;
	use crate::layout::LayoutSettings;
	use crate::mapping::Mapping;
	use crate::mapping::RangePair;
	use crate::mapping::range_pair_to_cfi_pair;
	use crate::mapping::split_text_node_into_ranges;

	fn contents(markup: &str) -> HeadlessContents {
		HeadlessContents::new(
			Document::parse(markup),
			Metrics {
				glyph_width: 10.0,
				line_height: 20.0,
			},
		)
	}

	fn cfi(s: &str) -> Cfi {
		Cfi::parse(s).unwrap()
	}

	#[test]
	fn test_mapping_axis() {
		let mut m = Mapping::new(LayoutGeometry::default(), Direction::Rtl, Axis::Horizontal);
		assert_eq!(m.direction(), Direction::Rtl);
		assert!(m.axis(None));
		assert!(!m.axis(Some(Axis::Vertical)));
		assert!(!m.axis(None));
		assert!(m.axis(Some(Axis::Horizontal)));
	}

	#[test]
	fn test_split_text_node_into_ranges() {
		let doc = Document::parse("<p>hello</p><p>hello world foo</p><div>a-b-c</div>");
		let body = doc.body().unwrap();
		let texts = doc.text_nodes(body).collect::<Vec<_>>();

		assert_eq!(split_text_node_into_ranges(&doc, texts[0], " ").len(), 1);
		assert_eq!(
			split_text_node_into_ranges(&doc, texts[1], " "),
			vec![
				Range::text_span(texts[1], 0, 5),
				Range::text_span(texts[1], 6, 11),
				Range::text_span(texts[1], 12, 15),
			]
		);
		let p = doc.parent(texts[1]).unwrap();
		assert_eq!(
			split_text_node_into_ranges(&doc, p, " "),
			vec![Range::select_node_contents(&doc, p)]
		);
		assert_eq!(split_text_node_into_ranges(&doc, texts[2], "-").len(), 3);
	}

	#[test]
	fn test_walk_skips_blank_text() {
		let doc = Document::parse("<div><p>a</p> <p>b</p></div>");
		let m = Mapping::new(LayoutGeometry::default(), Direction::Ltr, Axis::Horizontal);
		let mut seen = Vec::new();
		let found = m.walk(&doc, doc.body().unwrap(), |n| {
			seen.push(doc.text(n).unwrap().to_string());
			None::<()>
		});
		assert!(found.is_none());
		assert_eq!(seen, vec!["a", "b"]);

		let empty = Document::parse("<div></div>");
		assert!(m.walk(&empty, empty.body().unwrap(), Some).is_none());
	}

	#[test]
	fn test_range_pair_collapses() {
		let doc = Document::parse("<p>Some text content</p>");
		let text = doc.text_nodes(doc.body().unwrap()).next().unwrap();
		let pair = RangePair {
			start: Range::text_span(text, 0, 4),
			end: Range::text_span(text, 5, 9),
		};
		let page = range_pair_to_cfi_pair(&doc, "/6/4", pair).unwrap();
		assert_eq!(page.start, cfi("epubcfi(/6/4!/4/2/1:0)"));
		assert_eq!(page.end, cfi("epubcfi(/6/4!/4/2/1:9)"));
		assert!(!page.start.is_range());
		assert!(page.start <= page.end);
	}

	#[test]
	fn test_mapping_section_columns() {
		let _ = env_logger::try_init();
		let mut layout = Layout::new(LayoutSettings {
			min_spread_width: 200.0,
			..Default::default()
		});
		let g = *layout.calculate(200.0, 40.0, Some(20.0));
		assert_eq!((g.divisor, g.column_width, g.page_width), (2, 80.0, 100.0));

		let mut c = contents(&chapter(1, 12));
		layout.format(&mut c, Axis::Horizontal);
		assert_eq!(c.scroll_width(), 600.0);

		let m = Mapping::new(g, Direction::Ltr, Axis::Horizontal);
		let pages = m.section(&c, "/6/2");
		assert_eq!(pages.len(), 6);
		assert_eq!(pages[0].start, cfi("epubcfi(/6/2!/4/2/1:0)"));
		assert_eq!(pages[0].end, cfi("epubcfi(/6/2!/4/2/1:9)"));
		assert_eq!(pages[1].start, cfi("epubcfi(/6/2!/4/2/1:10)"));
		assert_eq!(pages[1].end, cfi("epubcfi(/6/2!/4/2/1:19)"));
		assert_eq!(pages[5].start, cfi("epubcfi(/6/2!/4/2/1:50)"));
		assert_eq!(pages[5].end, cfi("epubcfi(/6/2!/4/2/1:61)"));
		for page in &pages {
			assert!(page.start <= page.end);
		}

		// A spread covers two columns
		let spread = m.page(&c, "/6/2", 200.0, 400.0).unwrap();
		assert_eq!(spread.start, pages[2].start);
		assert_eq!(spread.end, pages[3].end);

		// Round trip back into the document
		let doc = c.document();
		let start = spread.start.to_range(doc).unwrap();
		let end = spread.end.to_range(doc).unwrap();
		assert!(start.is_collapsed());
		assert!(end.is_collapsed());
		assert!(start.start.offset <= end.start.offset);
	}

	#[test]
	fn test_mapping_vertical_page() {
		let mut c = contents("<html><body><p>one two three four</p><p>five</p></body></html>");
		c.size(Some(100.0), None);
		let m = Mapping::new(LayoutGeometry::default(), Direction::Ltr, Axis::Vertical);

		let first = m.page(&c, "/6/4", 0.0, 40.0).unwrap();
		assert_eq!(first.start, cfi("epubcfi(/6/4!/4/2/1:0)"));
		assert_eq!(first.end, cfi("epubcfi(/6/4!/4/2/1:18)"));

		let second = m.page(&c, "/6/4", 40.0, 80.0).unwrap();
		assert_eq!(second.start, cfi("epubcfi(/6/4!/4/4/1:0)"));
		assert_eq!(second.end, cfi("epubcfi(/6/4!/4/4/1:4)"));
	}

	#[test]
	fn test_mapping_empty_document() {
		let c = contents("<html><body><div></div></body></html>");
		let m = Mapping::new(LayoutGeometry::default(), Direction::Ltr, Axis::Horizontal);
		assert!(m.page(&c, "/6/2", 0.0, 100.0).is_none());
		assert!(m.section(&c, "/6/2").is_empty());
	}
}
