//! A rendering surface bound to one section.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use parchment::Cfi;
use parchment::Range;

use crate::contents::Contents;
use crate::events::Emitter;
use crate::frame::Frame;
use crate::frame::FrameSettings;
use crate::frame::IsolationPolicy;
use crate::frame::LoadMethod;
use crate::frame::Renderer;
use crate::frame::SurfaceError;
use crate::geometry::Axis;
use crate::geometry::Point;
use crate::geometry::Rect;
use crate::geometry::Size;
use crate::geometry::WritingMode;
use crate::geometry::clamp_dim;
use crate::layout::Flow;
use crate::layout::Layout;
use crate::layout::LayoutMode;
use crate::marks::Mark;
use crate::marks::MarkKind;
use crate::marks::Shape;
use crate::reading_system::ReadingSystem;
use crate::section::Request;
use crate::section::Section;
use crate::section::SectionError;

static NEXT_VIEW_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewId(u64);

impl ViewId {
	fn next() -> Self {
		ViewId(NEXT_VIEW_ID.fetch_add(1, Ordering::Relaxed))
	}

	pub fn value(&self) -> u64 {
		let ViewId(v) = self;
		*v
	}
}

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
	#[error(transparent)]
	Section(#[from] SectionError),
	#[error(transparent)]
	Surface(#[from] SurfaceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lock {
	Width,
	Height,
	Both,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
	Displayed,
	Rendered,
	Shown,
	Hidden,
	Resized {
		width: f32,
		height: f32,
		width_delta: f32,
		height_delta: f32,
	},
	Axis(Axis),
	WritingMode(WritingMode),
}

/// What `location_of` should find.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
	Cfi(&'a Cfi),
	Anchor(&'a str),
}

#[derive(Debug, Clone)]
pub struct ViewSettings {
	pub width: f32,
	pub height: f32,
	pub axis: Axis,
	pub force_even_pages: bool,
	/// Start a spread on its right page, leaving the left one blank.
	pub force_right: bool,
	pub isolation: IsolationPolicy,
}

impl Default for ViewSettings {
	fn default() -> Self {
		Self {
			width: 0.0,
			height: 0.0,
			axis: Axis::Horizontal,
			force_even_pages: true,
			force_right: false,
			isolation: IsolationPolicy::default(),
		}
	}
}

pub struct RenderedMark<'a> {
	pub mark: &'a Mark,
	pub shapes: Vec<Shape>,
}

pub struct View {
	id: ViewId,
	section: Rc<dyn Section>,
	settings: ViewSettings,
	layout: Layout,
	renderer: Rc<dyn Renderer>,
	frame: Option<Box<dyn Frame>>,
	supports_srcdoc: bool,
	writing_mode: WritingMode,
	offset: Point,
	size: Size,
	prev_size: Size,
	lock: Option<Lock>,
	locked: Size,
	added: bool,
	displayed: bool,
	rendered: bool,
	hidden: bool,
	destroyed: bool,
	stop_expanding: bool,
	needs_reframe: bool,
	highlights: BTreeMap<String, Mark>,
	underlines: BTreeMap<String, Mark>,
	marks: BTreeMap<String, Mark>,
	events: Emitter<ViewEvent>,
}

impl View {
	pub fn new(
		section: Rc<dyn Section>,
		renderer: Rc<dyn Renderer>,
		layout: Layout,
		settings: ViewSettings,
	) -> Self {
		let id = ViewId::next();
		log::trace!("New view {} for section {}", id.value(), section.index());
		Self {
			id,
			section,
			layout,
			renderer,
			frame: None,
			supports_srcdoc: true,
			writing_mode: WritingMode::default(),
			offset: Point::default(),
			size: Size::default(),
			prev_size: Size::default(),
			lock: None,
			locked: Size::new(settings.width, settings.height),
			settings,
			added: false,
			displayed: false,
			rendered: false,
			hidden: false,
			destroyed: false,
			stop_expanding: false,
			needs_reframe: false,
			highlights: BTreeMap::new(),
			underlines: BTreeMap::new(),
			marks: BTreeMap::new(),
			events: Emitter::default(),
		}
	}

	pub fn id(&self) -> ViewId {
		self.id
	}

	pub fn section(&self) -> &Rc<dyn Section> {
		&self.section
	}

	pub fn index(&self) -> usize {
		self.section.index()
	}

	pub fn events(&mut self) -> &mut Emitter<ViewEvent> {
		&mut self.events
	}

	pub fn is_added(&self) -> bool {
		self.added
	}

	pub fn is_displayed(&self) -> bool {
		self.displayed
	}

	pub fn is_rendered(&self) -> bool {
		self.rendered
	}

	pub fn is_hidden(&self) -> bool {
		self.hidden
	}

	pub fn is_destroyed(&self) -> bool {
		self.destroyed
	}

	/// False when the renderer could not inject markup directly.
	pub fn supports_srcdoc(&self) -> bool {
		!self.destroyed && self.supports_srcdoc
	}

	pub fn axis(&self) -> Axis {
		self.settings.axis
	}

	pub fn is_forced_right(&self) -> bool {
		self.settings.force_right
	}

	pub fn writing_mode(&self) -> WritingMode {
		self.writing_mode
	}

	pub fn layout(&self) -> &Layout {
		&self.layout
	}

	pub fn contents(&self) -> Option<&dyn Contents> {
		self.frame.as_ref().and_then(|f| f.contents())
	}

	/// Create the embedded frame, or return the one already created.
	pub fn create(&mut self) -> Option<&mut (dyn Frame + 'static)> {
		if self.destroyed {
			return None;
		}
		if self.frame.is_none() {
			let method = if self.renderer.supports_srcdoc() {
				LoadMethod::Srcdoc
			} else {
				log::warn!("Renderer lacks srcdoc, writing view {} directly", self.id.value());
				LoadMethod::Write
			};
			self.supports_srcdoc = matches!(method, LoadMethod::Srcdoc);
			let settings = FrameSettings {
				id: format!("binder-view-{}", self.id.value()),
				isolation: self.settings.isolation,
				method,
				reading_system: ReadingSystem::new(self.layout.geometry().flow),
			};
			let mut frame = self.renderer.create_frame(&settings);
			frame.set_visible(false);
			self.frame = Some(frame);
			self.added = true;
			self.prev_size = Size::default();
			log::debug!("Created frame {}", settings.id);
		}
		self.frame.as_deref_mut()
	}

	/// Fetch the section and load it.
	pub async fn render(&mut self, request: &dyn Request) -> Result<(), ViewError> {
		if self.destroyed {
			return Ok(());
		}
		let markup = self.section.render(request).await?;
		self.load(&markup)
	}

	pub async fn display(&mut self, request: &dyn Request) -> Result<(), ViewError> {
		if self.displayed || self.destroyed {
			return Ok(());
		}
		let markup = self.section.render(request).await?;
		self.display_markup(&markup)
	}

	/// Display already fetched markup.
	pub fn display_markup(&mut self, markup: &str) -> Result<(), ViewError> {
		if self.displayed || self.destroyed {
			return Ok(());
		}
		self.load(markup)?;
		self.displayed = true;
		self.events.emit(&ViewEvent::Displayed);
		Ok(())
	}

	pub fn load(&mut self, markup: &str) -> Result<(), ViewError> {
		let Some(frame) = self.create() else {
			return Err(SurfaceError::Destroyed.into());
		};
		frame.load(markup)?;
		self.rendered = true;

		let writing_mode = self.contents().map(|c| c.writing_mode()).unwrap_or_default();
		let g = self.layout.geometry();
		let vertical = writing_mode.is_vertical();
		let axis = match g.flow {
			Flow::Scrolled if vertical => Axis::Horizontal,
			Flow::Scrolled => Axis::Vertical,
			Flow::Paginated if vertical => Axis::Vertical,
			Flow::Paginated => Axis::Horizontal,
		};
		self.set_writing_mode(writing_mode);
		self.set_axis(axis);

		let axis = self.settings.axis;
		if let Some(contents) = self.frame.as_mut().and_then(|f| f.contents_mut()) {
			self.layout.format(contents, axis);
		}
		self.needs_reframe = true;
		self.expand();
		self.events.emit(&ViewEvent::Rendered);
		Ok(())
	}

	/// Size according to layout: fixed layouts lock both dimensions, the
	/// horizontal axis locks height, the vertical axis locks width.
	pub fn size(&mut self, width: Option<f32>, height: Option<f32>) {
		let width = width.unwrap_or(self.settings.width);
		let height = height.unwrap_or(self.settings.height);
		let what = if self.layout.geometry().is_pre_paginated() {
			Lock::Both
		} else {
			match self.settings.axis {
				Axis::Horizontal => Lock::Height,
				Axis::Vertical => Lock::Width,
			}
		};
		self.lock(what, width, height);
		self.settings.width = width;
		self.settings.height = height;
	}

	pub fn lock(&mut self, what: Lock, width: f32, height: f32) {
		if self.destroyed {
			return;
		}
		match what {
			Lock::Width => self.locked.width = clamp_dim(width),
			Lock::Height => self.locked.height = clamp_dim(height),
			Lock::Both => self.locked = Size::new(width, height),
		}
		self.lock = Some(what);
		if what == Lock::Both && self.frame.is_some() {
			self.reframe(self.locked.width, self.locked.height);
		}
		if self.displayed && self.frame.is_some() {
			self.expand();
		}
	}

	pub fn locked(&self) -> Option<Lock> {
		self.lock
	}

	/// Grow the frame to fit its laid out content.
	pub fn expand(&mut self) {
		if self.destroyed || self.stop_expanding {
			return;
		}
		let Some(contents) = self.contents() else {
			return;
		};
		let g = *self.layout.geometry();
		let mut width = self.locked.width;
		let mut height = self.locked.height;

		if g.is_pre_paginated() {
			width = g.column_width;
			height = g.height;
		} else if matches!(self.settings.axis, Axis::Horizontal) {
			width = contents.text_width();
			if g.page_width > 0.0 {
				if width % g.page_width > 0.0 {
					width = (width / g.page_width).ceil() * g.page_width;
				}
				let columns = (width / g.page_width).round() as u32;
				if self.settings.force_even_pages
					&& g.divisor > 1
					&& matches!(g.name, LayoutMode::Reflowable)
					&& columns % 2 > 0
				{
					width += g.page_width;
				}
			}
		} else {
			height = contents.text_height();
			if g.is_paginated() && g.height > 0.0 && height % g.height > 0.0 {
				height = (height / g.height).ceil() * g.height;
			}
		}

		if self.needs_reframe || width != self.size.width || height != self.size.height {
			self.reframe(width, height);
		}
	}

	pub fn reframe(&mut self, width: f32, height: f32) {
		if self.destroyed {
			return;
		}
		let size = Size::new(width, height);
		self.size = size;
		if let Some(frame) = self.frame.as_mut() {
			frame.set_size(size.width, size.height);
		}
		let prev = self.prev_size;
		self.prev_size = size;
		self.needs_reframe = false;
		log::trace!(
			"Reframed view {} to {}x{}",
			self.id.value(),
			size.width,
			size.height
		);
		self.events.emit(&ViewEvent::Resized {
			width: size.width,
			height: size.height,
			width_delta: size.width - prev.width,
			height_delta: size.height - prev.height,
		});
	}

	/// Forget measured dimensions before content is replaced.
	pub fn reset(&mut self) {
		if let Some(frame) = self.frame.as_mut() {
			frame.set_size(0.0, 0.0);
		}
		self.size = Size::default();
		self.needs_reframe = true;
	}

	pub fn show(&mut self) {
		if self.destroyed {
			return;
		}
		if let Some(frame) = self.frame.as_mut() {
			frame.set_visible(true);
		}
		self.hidden = false;
		self.stop_expanding = false;
		self.events.emit(&ViewEvent::Shown);
	}

	pub fn hide(&mut self) {
		if self.destroyed {
			return;
		}
		if let Some(frame) = self.frame.as_mut() {
			frame.set_visible(false);
		}
		self.hidden = true;
		self.stop_expanding = true;
		self.events.emit(&ViewEvent::Hidden);
	}

	/// Tear down the frame. The box keeps its size until the view is
	/// removed from its container.
	pub fn destroy(&mut self) {
		if self.destroyed {
			return;
		}
		if let Some(mut frame) = self.frame.take() {
			frame.teardown();
		}
		log::debug!("Destroyed view {}", self.id.value());
		self.displayed = false;
		self.rendered = false;
		self.destroyed = true;
		self.stop_expanding = true;
		self.lock = None;
		self.highlights.clear();
		self.underlines.clear();
		self.marks.clear();
		self.events.clear();
	}

	/// Offset of the view inside its container.
	pub fn offset(&self) -> Point {
		self.offset
	}

	pub fn set_offset(&mut self, offset: Point) {
		self.offset = offset;
	}

	pub fn width(&self) -> f32 {
		self.size.width
	}

	pub fn height(&self) -> f32 {
		self.size.height
	}

	/// Rect of the view on screen, given where the container content starts.
	pub fn position(&self, origin: Point) -> Rect {
		Rect::new(
			origin.left + self.offset.left,
			origin.top + self.offset.top,
			self.size.width,
			self.size.height,
		)
	}

	pub fn bounds(&self) -> Rect {
		Rect::new(
			self.offset.left,
			self.offset.top,
			self.size.width,
			self.size.height,
		)
	}

	/// Position of a target inside the view's content.
	pub fn location_of(&self, target: Target<'_>) -> Option<Point> {
		let contents = self.contents()?;
		let doc = contents.document();
		let range = match target {
			Target::Cfi(cfi) => cfi
				.to_range(doc)
				.inspect_err(|e| log::warn!("Unable to locate {cfi}: {e}"))
				.ok()?,
			Target::Anchor(id) => Range::select_node_contents(doc, doc.element_by_id(id)?),
		};
		let rect = contents.range_rect(&range)?;
		Some(Point::new(rect.left, rect.top))
	}

	pub fn set_axis(&mut self, axis: Axis) {
		self.settings.axis = axis;
		self.events.emit(&ViewEvent::Axis(axis));
		self.size(None, None);
	}

	pub fn set_writing_mode(&mut self, mode: WritingMode) {
		self.writing_mode = mode;
		self.events.emit(&ViewEvent::WritingMode(mode));
	}

	pub fn set_force_even_pages(&mut self, force: bool) {
		self.settings.force_even_pages = force;
	}

	pub fn set_layout(&mut self, layout: &Layout) {
		self.layout = layout.clone();
		let axis = self.settings.axis;
		if let Some(contents) = self.frame.as_mut().and_then(|f| f.contents_mut()) {
			self.layout.format(contents, axis);
			self.expand();
		}
	}

	fn add_mark(&mut self, mark: Mark) -> bool {
		let Some(contents) = self.contents() else {
			return false;
		};
		if let Err(e) = mark.cfi_range.to_range(contents.document()) {
			log::warn!("Mark {} does not resolve: {e}", mark.cfi_range);
			return false;
		}
		let key = mark.cfi_range.to_string();
		let store = match mark.kind {
			MarkKind::Highlight => &mut self.highlights,
			MarkKind::Underline => &mut self.underlines,
			MarkKind::Mark => &mut self.marks,
		};
		store.insert(key, mark);
		true
	}

	pub fn highlight(
		&mut self,
		cfi_range: Cfi,
		data: BTreeMap<String, String>,
		class: Option<&str>,
	) -> bool {
		let mut mark = Mark::new(MarkKind::Highlight, cfi_range).with_data(data);
		if let Some(class) = class {
			mark = mark.with_class(class);
		}
		self.add_mark(mark)
	}

	pub fn underline(
		&mut self,
		cfi_range: Cfi,
		data: BTreeMap<String, String>,
		class: Option<&str>,
	) -> bool {
		let mut mark = Mark::new(MarkKind::Underline, cfi_range).with_data(data);
		if let Some(class) = class {
			mark = mark.with_class(class);
		}
		self.add_mark(mark)
	}

	pub fn mark(&mut self, cfi_range: Cfi, data: BTreeMap<String, String>) -> bool {
		self.add_mark(Mark::new(MarkKind::Mark, cfi_range).with_data(data))
	}

	pub fn unhighlight(&mut self, cfi_range: &Cfi) -> bool {
		self.highlights.remove(&cfi_range.to_string()).is_some()
	}

	pub fn ununderline(&mut self, cfi_range: &Cfi) -> bool {
		self.underlines.remove(&cfi_range.to_string()).is_some()
	}

	pub fn unmark(&mut self, cfi_range: &Cfi) -> bool {
		self.marks.remove(&cfi_range.to_string()).is_some()
	}

	pub fn render_marks(&self) -> Vec<RenderedMark<'_>> {
		let Some(contents) = self.contents() else {
			return Vec::new();
		};
		let doc = contents.document();
		self.highlights
			.values()
			.chain(self.underlines.values())
			.chain(self.marks.values())
			.filter_map(|mark| {
				let range = mark.cfi_range.to_range(doc).ok()?;
				let rects = contents.range_rects(&range);
				Some(RenderedMark {
					mark,
					shapes: mark.render(&rects, Point::default()),
				})
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;
	use std::collections::BTreeMap;
	use std::rc::Rc;

	use parchment::Cfi;

	use crate::geometry::Axis;
	use crate::geometry::Point;
	use crate::headless::HeadlessRenderer;
	use crate::headless::Metrics;
	use crate::headless::tests::StaticRequest;
	use crate::headless::tests::StaticSection;
	use crate::layout::Flow;
	use crate::layout::Layout;
	use crate::layout::LayoutMode;
	use crate::layout::LayoutSettings;
	use crate::layout::Spread;
	use crate::marks::Shape;
	use crate::view::Lock;
	use crate::view::Target;
	use crate::view::View;
	use crate::view::ViewEvent;
	use crate::view::ViewSettings;

	const CHAPTER: &str = "<html><body><p id=\"a\">one two three four five six seven eight</p></body></html>";

	fn layout(width: f32, height: f32, settings: LayoutSettings) -> Layout {
		let mut layout = Layout::new(settings);
		layout.calculate(width, height, Some(0.0));
		layout
	}

	fn view(renderer: HeadlessRenderer, layout: Layout, width: f32, height: f32) -> View {
		let section = StaticSection::chain(&[CHAPTER]).remove(0);
		View::new(
			section,
			Rc::new(renderer),
			layout,
			ViewSettings {
				width,
				height,
				..Default::default()
			},
		)
	}

	fn metrics() -> Metrics {
		Metrics {
			glyph_width: 10.0,
			line_height: 20.0,
		}
	}

	#[test]
	fn test_view_create_idempotent() {
		let _ = env_logger::try_init();
		let mut v = view(
			HeadlessRenderer::new(metrics()),
			Layout::default(),
			100.0,
			100.0,
		);
		assert!(!v.is_added());
		assert!(v.create().is_some());
		assert!(v.create().is_some());
		assert!(v.is_added());
		assert!(v.supports_srcdoc());

		let mut fallback = view(
			HeadlessRenderer::new(metrics()).without_srcdoc(),
			Layout::default(),
			100.0,
			100.0,
		);
		assert!(fallback.create().is_some());
		assert!(!fallback.supports_srcdoc());
	}

	#[test]
	fn test_view_display_expands_to_pages() {
		let settings = LayoutSettings {
			spread: Spread::None,
			..Default::default()
		};
		// 100px wide columns hold 10 glyphs, 40px high hold 2 lines
		let mut v = view(
			HeadlessRenderer::new(metrics()),
			layout(100.0, 40.0, settings),
			100.0,
			40.0,
		);
		let seen = Rc::new(RefCell::new(Vec::new()));
		let s = seen.clone();
		v.events().on(move |e| s.borrow_mut().push(e.clone()));

		pollster::block_on(v.display(&StaticRequest)).unwrap();
		assert!(v.is_displayed());
		assert_eq!(v.axis(), Axis::Horizontal);
		assert_eq!(v.locked(), Some(Lock::Height));
		// 8 words over 5 lines, 3 columns
		assert_eq!(v.width(), 300.0);
		assert_eq!(v.height(), 40.0);

		let seen = seen.borrow();
		assert!(seen.contains(&ViewEvent::Rendered));
		assert_eq!(seen.last(), Some(&ViewEvent::Displayed));
		assert!(seen.iter().any(|e| matches!(
			e,
			ViewEvent::Resized { width, width_delta, .. } if *width == 300.0 && *width_delta == 300.0
		)));
	}

	#[test]
	fn test_view_force_even_pages() {
		let settings = LayoutSettings {
			min_spread_width: 200.0,
			..Default::default()
		};
		// Two 100px columns per 200px spread
		let mut v = view(
			HeadlessRenderer::new(metrics()),
			layout(200.0, 40.0, settings.clone()),
			200.0,
			40.0,
		);
		pollster::block_on(v.display(&StaticRequest)).unwrap();
		assert_eq!(v.width(), 400.0);

		v.destroy();
		let mut v = view(
			HeadlessRenderer::new(metrics()),
			layout(200.0, 40.0, settings),
			200.0,
			40.0,
		);
		v.set_force_even_pages(false);
		pollster::block_on(v.display(&StaticRequest)).unwrap();
		assert_eq!(v.width(), 300.0);
	}

	#[test]
	fn test_view_scrolled_axis() {
		let settings = LayoutSettings {
			flow: Flow::Scrolled,
			..Default::default()
		};
		let mut v = view(
			HeadlessRenderer::new(metrics()),
			layout(100.0, 40.0, settings),
			100.0,
			40.0,
		);
		pollster::block_on(v.display(&StaticRequest)).unwrap();
		assert_eq!(v.axis(), Axis::Vertical);
		assert_eq!(v.locked(), Some(Lock::Width));
		assert_eq!(v.width(), 100.0);
		assert_eq!(v.height(), 100.0);
	}

	#[test]
	fn test_view_pre_paginated() {
		let settings = LayoutSettings {
			name: LayoutMode::PrePaginated,
			spread: Spread::None,
			..Default::default()
		};
		let mut v = view(
			HeadlessRenderer::new(metrics()),
			layout(300.0, 400.0, settings),
			300.0,
			400.0,
		);
		pollster::block_on(v.display(&StaticRequest)).unwrap();
		assert_eq!(v.locked(), Some(Lock::Both));
		assert_eq!((v.width(), v.height()), (300.0, 400.0));
	}

	#[test]
	fn test_view_show_hide_destroy() {
		let mut v = view(
			HeadlessRenderer::new(metrics()),
			Layout::default(),
			100.0,
			40.0,
		);
		// Never displayed
		v.destroy();
		assert!(v.is_destroyed());
		assert!(v.create().is_none());
		assert!(!v.supports_srcdoc());
		v.show();
		assert!(!v.is_hidden());
		assert!(v.location_of(Target::Anchor("a")).is_none());

		let mut v = view(
			HeadlessRenderer::new(metrics()),
			layout(100.0, 40.0, LayoutSettings::default()),
			100.0,
			40.0,
		);
		pollster::block_on(v.display(&StaticRequest)).unwrap();
		let seen = Rc::new(RefCell::new(Vec::new()));
		let s = seen.clone();
		v.events().on(move |e| s.borrow_mut().push(e.clone()));
		v.hide();
		v.show();
		assert_eq!(*seen.borrow(), vec![ViewEvent::Hidden, ViewEvent::Shown]);
		v.destroy();
		assert!(v.events().is_empty());
		assert!(v.contents().is_none());
		assert_eq!(v.width(), 300.0);
		v.reframe(10.0, 10.0);
		assert_eq!(v.width(), 300.0);
	}

	#[test]
	fn test_view_location_of() {
		let settings = LayoutSettings {
			spread: Spread::None,
			..Default::default()
		};
		let mut v = view(
			HeadlessRenderer::new(metrics()),
			layout(100.0, 40.0, settings),
			100.0,
			40.0,
		);
		pollster::block_on(v.display(&StaticRequest)).unwrap();
		assert_eq!(v.location_of(Target::Anchor("a")), Some(Point::new(0.0, 0.0)));
		// "five" opens the third line, the first of the second column
		let cfi = Cfi::parse("epubcfi(/6/2!/4/2/1:19)").unwrap();
		assert_eq!(v.location_of(Target::Cfi(&cfi)), Some(Point::new(100.0, 0.0)));
		assert!(v.location_of(Target::Anchor("missing")).is_none());
	}

	#[test]
	fn test_view_marks() {
		let settings = LayoutSettings {
			spread: Spread::None,
			..Default::default()
		};
		let mut v = view(
			HeadlessRenderer::new(metrics()),
			layout(100.0, 40.0, settings),
			100.0,
			40.0,
		);
		let range = Cfi::parse("epubcfi(/6/2!/4/2,/1:0,/1:3)").unwrap();
		assert!(!v.highlight(range.clone(), BTreeMap::new(), None));

		pollster::block_on(v.display(&StaticRequest)).unwrap();
		assert!(v.highlight(range.clone(), BTreeMap::new(), Some("note")));
		assert!(v.underline(range.clone(), BTreeMap::new(), None));
		let bogus = Cfi::parse("epubcfi(/6/2!/4/8,/1:0,/1:3)").unwrap();
		assert!(!v.highlight(bogus, BTreeMap::new(), None));

		let rendered = v.render_marks();
		assert_eq!(rendered.len(), 2);
		assert_eq!(rendered[0].mark.class, "note");
		assert!(matches!(
			rendered[0].shapes[..],
			[Shape::Rect { filled: true, .. }]
		));
		assert_eq!(rendered[1].shapes.len(), 2);

		assert!(v.unhighlight(&range));
		assert!(!v.unhighlight(&range));
		assert!(v.ununderline(&range));
		assert!(v.render_marks().is_empty());
	}
}
