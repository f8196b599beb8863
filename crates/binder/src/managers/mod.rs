//! View managers own the stage and its views and turn navigation requests
//! into views being created, placed, scrolled and destroyed.
//!
//! Every navigation runs as a job on the manager's queue, so a display that
//! is still fetching can not interleave with a page turn. Views report
//! their events into an inbox the manager drains after each change.

pub mod continuous;
pub mod default;

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::rc::Rc;

use parchment::Cfi;
use serde::Deserialize;

use crate::error::ManagerError;
use crate::events::Emitter;
use crate::frame::IsolationPolicy;
use crate::frame::Renderer;
use crate::geometry::Axis;
use crate::geometry::Direction;
use crate::geometry::Overflow;
use crate::geometry::Point;
use crate::geometry::Rect;
use crate::geometry::Size;
use crate::geometry::WritingMode;
use crate::layout::Flow;
use crate::layout::Layout;
use crate::layout::LayoutSettings;
use crate::layout::Spread;
use crate::location::Location;
use crate::location::ViewLocation;
use crate::mapping::Mapping;
use crate::queue::LocalFuture;
use crate::queue::QueueError;
use crate::queue::Queued;
use crate::queue::TaskQueue;
use crate::section::PageSpread;
use crate::section::Request;
use crate::section::Section;
use crate::snap::Snap;
use crate::snap::SnapAnimation;
use crate::snap::SnapSettings;
use crate::stage::Stage;
use crate::stage::StageSettings;
use crate::view::Target;
use crate::view::View;
use crate::view::ViewEvent;
use crate::view::ViewId;
use crate::view::ViewSettings;
use crate::views::Views;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
	pub width: Option<f32>,
	pub height: Option<f32>,
	/// Follows the flow when unset.
	pub axis: Option<Axis>,
	pub direction: Direction,
	/// Overflow of a scrolled stage, paginated stages always hide it.
	pub overflow: Option<Overflow>,
	pub gap: Option<f32>,
	pub hidden: bool,
	/// Each manager picks its own default when unset.
	pub force_even_pages: Option<bool>,
	pub allow_scripts: bool,
	pub allow_popups: bool,
	pub touch: bool,
	pub snap: Option<SnapSettings>,
	pub layout: LayoutSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ManagerEvent {
	/// A view finished displaying, with its section index.
	Added(usize),
	ViewResized(usize),
	Resized { width: f32, height: f32 },
	Scroll { left: f32, top: f32 },
	Scrolled { left: f32, top: f32 },
	Located(Vec<ViewLocation>),
	Relocated(Location),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
	#[default]
	Unrendered,
	Rendered,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
	#[default]
	Static,
	Navigating,
}

/// Where to land inside a displayed section.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayTarget {
	Cfi(Cfi),
	Anchor(String),
}

impl DisplayTarget {
	/// A range identifier, `href#anchor`, `#anchor` or a bare anchor.
	pub fn parse(target: &str) -> Self {
		if let Ok(cfi) = Cfi::parse(target) {
			return DisplayTarget::Cfi(cfi);
		}
		match target.split_once('#') {
			Some((_, anchor)) => DisplayTarget::Anchor(anchor.to_string()),
			None => DisplayTarget::Anchor(target.to_string()),
		}
	}

	pub fn as_target(&self) -> Target<'_> {
		match self {
			DisplayTarget::Cfi(cfi) => Target::Cfi(cfi),
			DisplayTarget::Anchor(anchor) => Target::Anchor(anchor),
		}
	}

	/// Targets naming the section itself mean its start.
	fn names_section(&self, section: &dyn Section) -> bool {
		matches!(self, DisplayTarget::Anchor(a) if a == section.href())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
	Append,
	Prepend,
}

/// Markup fetched ahead of touching any view.
pub(crate) struct Fetched {
	section: Rc<dyn Section>,
	markup: String,
	force_right: bool,
}

type Inbox = Rc<RefCell<VecDeque<(ViewId, ViewEvent)>>>;

/// State and operations shared by every manager.
pub struct ManagerCore {
	settings: ManagerSettings,
	force_even_pages: bool,
	renderer: Rc<dyn Renderer>,
	request: Rc<dyn Request>,
	layout: Layout,
	mapping: Mapping,
	stage: Stage,
	views: Views,
	snap: Option<Snap>,
	events: Emitter<ManagerEvent>,
	inbox: Inbox,
	countered: BTreeSet<ViewId>,
	state: ManagerState,
	nav: NavState,
	axis: Axis,
	writing_mode: WritingMode,
	paginated: bool,
	stage_size: Option<Size>,
	scrolled: bool,
}

impl ManagerCore {
	pub fn new(
		settings: ManagerSettings,
		renderer: Rc<dyn Renderer>,
		request: Rc<dyn Request>,
		force_even_pages: bool,
	) -> Self {
		let layout = Layout::new(settings.layout.clone());
		let paginated = settings.layout.flow == Flow::Paginated;
		let axis = settings.axis.unwrap_or(if paginated {
			Axis::Horizontal
		} else {
			Axis::Vertical
		});
		let stage = Stage::new(StageSettings {
			width: settings.width,
			height: settings.height,
			axis,
			direction: settings.direction,
			overflow: settings.overflow.unwrap_or_default(),
			hidden: settings.hidden,
		});
		let views = Views::new(stage.container());
		let mapping = Mapping::new(*layout.geometry(), settings.direction, axis);
		Self {
			force_even_pages: settings.force_even_pages.unwrap_or(force_even_pages),
			settings,
			renderer,
			request,
			layout,
			mapping,
			stage,
			views,
			snap: None,
			events: Emitter::default(),
			inbox: Inbox::default(),
			countered: BTreeSet::new(),
			state: ManagerState::Unrendered,
			nav: NavState::Static,
			axis,
			writing_mode: WritingMode::default(),
			paginated,
			stage_size: None,
			scrolled: false,
		}
	}

	pub fn settings(&self) -> &ManagerSettings {
		&self.settings
	}

	pub fn layout(&self) -> &Layout {
		&self.layout
	}

	pub fn mapping(&self) -> &Mapping {
		&self.mapping
	}

	pub fn stage(&self) -> &Stage {
		&self.stage
	}

	pub fn views(&self) -> &Views {
		&self.views
	}

	pub fn views_mut(&mut self) -> &mut Views {
		&mut self.views
	}

	pub fn snap_mut(&mut self) -> Option<&mut Snap> {
		self.snap.as_mut()
	}

	pub fn events(&mut self) -> &mut Emitter<ManagerEvent> {
		&mut self.events
	}

	pub fn state(&self) -> ManagerState {
		self.state
	}

	pub fn nav_state(&self) -> NavState {
		self.nav
	}

	pub fn axis(&self) -> Axis {
		self.axis
	}

	pub fn direction(&self) -> Direction {
		self.settings.direction
	}

	pub fn writing_mode(&self) -> WritingMode {
		self.writing_mode
	}

	pub fn is_paginated(&self) -> bool {
		self.paginated
	}

	pub fn is_rendered(&self) -> bool {
		self.state == ManagerState::Rendered
	}

	/// Whether a non silent scroll happened since the last settle.
	pub fn has_scrolled(&self) -> bool {
		self.scrolled
	}

	pub(crate) fn ensure_rendered(&self) -> Result<(), ManagerError> {
		if self.is_rendered() {
			Ok(())
		} else {
			Err(ManagerError::NotRendered)
		}
	}

	/// Attach the stage to the host element and lay out for `flow`.
	pub(crate) fn render(&mut self, element: Rect, scrolled_overflow: Overflow) {
		self.stage.attach_to(element);
		self.state = ManagerState::Rendered;
		let flow = self.settings.layout.flow;
		self.update_flow(flow, scrolled_overflow);
		log::debug!(
			"Rendered stage {} at {}x{}",
			self.stage.id(),
			element.width,
			element.height
		);
	}

	pub(crate) fn update_flow(&mut self, flow: Flow, scrolled_overflow: Overflow) {
		self.paginated = flow == Flow::Paginated;
		self.layout.flow(flow);
		let axis = if self.paginated {
			Axis::Horizontal
		} else {
			Axis::Vertical
		};
		self.update_axis(axis, true);
		let overflow = if self.paginated {
			Overflow::Hidden
		} else {
			self.settings.overflow.unwrap_or(scrolled_overflow)
		};
		self.stage.overflow(overflow);
		self.update_layout();

		if let Some(mut snap) = self.snap.take() {
			snap.destroy();
		}
		if self.paginated
			&& self.is_rendered()
			&& let Some(settings) = self.settings.snap
		{
			self.snap = Some(Snap::new(
				self.layout.geometry(),
				self.settings.touch,
				settings,
			));
		}
	}

	pub(crate) fn update_axis(&mut self, axis: Axis, force: bool) {
		if !force && axis == self.axis {
			return;
		}
		self.axis = axis;
		self.stage.axis(axis);
		self.mapping.axis(Some(axis));
		match axis {
			Axis::Vertical => self.layout.spread(Spread::None, None),
			Axis::Horizontal => self.layout.spread(self.settings.layout.spread, None),
		};
		log::debug!("Switched to {axis:?} axis");
		self.relayout();
	}

	/// Recalculate geometry for the stage size and push it to every view.
	pub(crate) fn update_layout(&mut self) {
		if !self.stage.is_attached() {
			return;
		}
		let bounds = self.stage.bounds();
		self.stage_size = Some(Size::new(bounds.width, bounds.height));
		let gap = if self.paginated { self.settings.gap } else { None };
		let geometry = *self.layout.calculate(bounds.width, bounds.height, gap);
		self.mapping = Mapping::new(geometry, self.direction(), self.axis);
		for view in self.views.iter_mut() {
			view.set_layout(&self.layout);
		}
		if let Some(snap) = self.snap.as_mut() {
			snap.set_layout(&geometry);
		}
		self.drain();
	}

	pub(crate) fn set_direction(&mut self, direction: Direction) {
		self.settings.direction = direction;
		self.stage.direction(direction);
		self.update_layout();
	}

	/// Resize the stage, false when nothing changed. Views are cleared, the
	/// caller redisplays.
	pub(crate) fn resize_stage(&mut self, width: Option<f32>, height: Option<f32>) -> bool {
		let size = self.stage.size(width, height);
		if self.stage_size == Some(size) {
			log::trace!("Stage size unchanged");
			return false;
		}
		self.clear();
		self.update_layout();
		self.events.emit(&ManagerEvent::Resized {
			width: size.width,
			height: size.height,
		});
		true
	}

	/// First visible section and where in it the reader is.
	pub(crate) fn resume_point(&self) -> Option<(Rc<dyn Section>, Option<Cfi>)> {
		let section = self.visible().first()?.section().clone();
		let cfi = self
			.current_location()
			.into_iter()
			.next()
			.and_then(|l| l.mapping)
			.map(|m| m.start);
		Some((section, cfi))
	}

	pub(crate) fn is_fixed_spread(&self) -> bool {
		let g = self.layout.geometry();
		g.is_pre_paginated() && g.divisor > 1
	}

	/// The right hand page shown beside a fixed layout section.
	fn companion(&self, section: &dyn Section, force_right: bool) -> Option<Rc<dyn Section>> {
		if !self.is_fixed_spread() || force_right || section.index() == 0 {
			return None;
		}
		let next = section.next()?;
		(next.spread_side() != Some(PageSpread::Left)).then_some(next)
	}

	pub(crate) async fn fetch(&self, section: &Rc<dyn Section>) -> Result<String, ManagerError> {
		let request = self.request.clone();
		section.render(&*request).await.map_err(|e| {
			log::error!("Failed to load {}: {e}", section.href());
			ManagerError::from(e)
		})
	}

	pub(crate) async fn fetch_one(
		&self,
		section: Rc<dyn Section>,
	) -> Result<Fetched, ManagerError> {
		let markup = self.fetch(&section).await?;
		Ok(Fetched {
			section,
			markup,
			force_right: false,
		})
	}

	/// Fetch a section going forward, with the page sharing its spread.
	pub(crate) async fn fetch_forward(
		&self,
		section: Rc<dyn Section>,
	) -> Result<Vec<Fetched>, ManagerError> {
		let markup = self.fetch(&section).await?;
		let force_right =
			self.is_fixed_spread() && section.spread_side() == Some(PageSpread::Right);
		let companion = self.companion(&*section, force_right);
		let mut fetched = vec![Fetched {
			section,
			markup,
			force_right,
		}];
		if let Some(next) = companion {
			fetched.push(self.fetch_one(next).await?);
		}
		Ok(fetched)
	}

	/// Fetch a section going backward, with the left page of its spread.
	pub(crate) async fn fetch_backward(
		&self,
		section: Rc<dyn Section>,
	) -> Result<Vec<Fetched>, ManagerError> {
		let markup = self.fetch(&section).await?;
		let fixed = self.is_fixed_spread();
		let left = section.prev();
		let mut fetched = vec![Fetched {
			section,
			markup,
			force_right: fixed && left.is_none(),
		}];
		if fixed && let Some(left) = left {
			fetched.push(self.fetch_one(left).await?);
		}
		Ok(fetched)
	}

	fn create_view(&self, section: Rc<dyn Section>, force_right: bool) -> View {
		let g = self.layout.geometry();
		let settings = ViewSettings {
			width: g.width,
			height: g.height,
			axis: self.axis,
			force_even_pages: self.force_even_pages,
			force_right,
			isolation: IsolationPolicy {
				allow_scripts: self.settings.allow_scripts,
				allow_popups: self.settings.allow_popups,
			},
		};
		let mut view = View::new(section, self.renderer.clone(), self.layout.clone(), settings);
		let id = view.id();
		let inbox = self.inbox.clone();
		view.events()
			.on(move |event| inbox.borrow_mut().push_back((id, event.clone())));
		view
	}

	/// Create and display views from fetched markup without placing them.
	/// Either every view loads or none is kept.
	pub(crate) fn prepare(&self, fetched: Vec<Fetched>) -> Result<Vec<View>, ManagerError> {
		let mut views = Vec::with_capacity(fetched.len());
		for Fetched {
			section,
			markup,
			force_right,
		} in fetched
		{
			let href = section.href().to_string();
			let mut view = self.create_view(section, force_right);
			let result = view.display_markup(&markup);
			views.push(view);
			if let Err(e) = result {
				log::error!("Failed to display {href}: {e}");
				let ids: BTreeSet<ViewId> = views.iter().map(|v| v.id()).collect();
				for view in views.iter_mut() {
					view.destroy();
				}
				self.inbox.borrow_mut().retain(|(id, _)| !ids.contains(id));
				return Err(e.into());
			}
		}
		Ok(views)
	}

	/// Put prepared views on the stage and handle what they reported while
	/// loading.
	pub(crate) fn place(&mut self, views: Vec<View>, placement: Placement) -> Vec<ViewId> {
		let mut ids = Vec::with_capacity(views.len());
		for view in views {
			let id = view.id();
			match placement {
				Placement::Append => {
					self.views.append(view);
				}
				Placement::Prepend => {
					self.countered.insert(id);
					self.views.prepend(view);
				}
			}
			ids.push(id);
		}
		self.drain();
		ids
	}

	/// Load and place a single view.
	pub(crate) fn add(
		&mut self,
		fetched: Fetched,
		placement: Placement,
	) -> Result<ViewId, ManagerError> {
		let views = self.prepare(vec![fetched])?;
		let id = views[0].id();
		self.place(views, placement);
		Ok(id)
	}

	/// Replace a destroyed view by a fresh one at the same place.
	pub(crate) fn redisplay(&mut self, id: ViewId, fetched: Fetched) -> Result<(), ManagerError> {
		let Fetched {
			section,
			markup,
			force_right,
		} = fetched;
		let view = self.create_view(section, force_right);
		let new_id = view.id();
		let Some(view) = self.views.replace(id, view) else {
			return Ok(());
		};
		let result = view.display_markup(&markup);
		self.countered.remove(&id);
		log::trace!("View {} replaced by {}", id.value(), new_id.value());
		self.drain();
		result.map_err(ManagerError::from)
	}

	/// Remove a view, keeping what is on screen in place when it sat before
	/// the visible area.
	pub(crate) fn erase(&mut self, id: ViewId, above: bool) {
		let Some(bounds) = self.views.by_id(id).map(|v| v.bounds()) else {
			return;
		};
		let (left, top) = (self.stage.scroll_left(), self.stage.scroll_top());
		self.views.remove(id);
		self.countered.remove(&id);
		self.relayout();
		if !above {
			return;
		}
		match (self.axis, self.direction()) {
			(Axis::Vertical, _) => self.scroll_to(0.0, top - bounds.height, true),
			(Axis::Horizontal, Direction::Ltr) => self.scroll_to(left - bounds.width, 0.0, true),
			(Axis::Horizontal, Direction::Rtl) => self.scroll_to(left + bounds.width, 0.0, true),
		}
	}

	/// Handle what views reported since the last drain.
	fn drain(&mut self) {
		loop {
			let next = self.inbox.borrow_mut().pop_front();
			let Some((id, event)) = next else {
				break;
			};
			let Some(index) = self.views.by_id(id).map(|v| v.index()) else {
				continue;
			};
			match event {
				ViewEvent::Displayed => self.events.emit(&ManagerEvent::Added(index)),
				ViewEvent::Resized {
					width_delta,
					height_delta,
					..
				} => {
					self.relayout();
					if self.countered.contains(&id) {
						self.counter(width_delta, height_delta);
					}
					self.events.emit(&ManagerEvent::ViewResized(index));
				}
				ViewEvent::Axis(axis) => self.update_axis(axis, false),
				ViewEvent::WritingMode(mode) => self.writing_mode = mode,
				ViewEvent::Rendered | ViewEvent::Shown | ViewEvent::Hidden => {}
			}
		}
		self.relayout();
	}

	/// Scroll by a prepended view's growth so visible content stays put.
	fn counter(&mut self, width_delta: f32, height_delta: f32) {
		match self.axis {
			Axis::Vertical => self.scroll_by(0.0, height_delta, true),
			Axis::Horizontal => self.scroll_by(width_delta, 0.0, true),
		}
	}

	fn relayout(&mut self) {
		let width = self.stage.bounds().width;
		let content = self.views.layout(self.axis, self.direction(), width);
		self.stage.set_content_size(content);
	}

	pub(crate) fn scroll_by(&mut self, x: f32, y: f32, silent: bool) {
		let sign = self.direction().sign();
		let point = self.stage.scroll_by(x * sign, y);
		self.after_scroll(point, silent);
	}

	pub(crate) fn scroll_to(&mut self, x: f32, y: f32, silent: bool) {
		let point = self.stage.scroll_to(x, y);
		self.after_scroll(point, silent);
	}

	/// The host scrolled the stage itself.
	pub(crate) fn on_scroll(&mut self, left: f32, top: f32) {
		let point = self.stage.scroll_to(left, top);
		self.after_scroll(point, false);
	}

	fn after_scroll(&mut self, point: Point, silent: bool) {
		if let Some(snap) = self.snap.as_mut() {
			snap.on_scroll(point.left);
		}
		if silent {
			return;
		}
		self.scrolled = true;
		self.events.emit(&ManagerEvent::Scroll {
			left: point.left,
			top: point.top,
		});
	}

	/// Scrolling came to rest. Returns a snap animation instead of settling
	/// when the stage is between pages.
	pub(crate) fn settle(&mut self) -> Option<SnapAnimation> {
		if let Some(snap) = self.snap.as_mut()
			&& let Some(animation) = snap.scrolled()
		{
			return Some(animation);
		}
		self.scrolled = false;
		self.events.emit(&ManagerEvent::Scrolled {
			left: self.stage.scroll_left(),
			top: self.stage.scroll_top(),
		});
		self.report_location();
		None
	}

	/// Scroll so `offset`, in container content coordinates, starts the
	/// visible page.
	pub(crate) fn move_to_absolute(&mut self, offset: Point) {
		if !self.paginated {
			self.scroll_to(0.0, offset.top, true);
			return;
		}
		let delta = self.layout.geometry().delta;
		if delta <= 0.0 {
			return;
		}
		let mut x = (offset.left / delta).floor() * delta;
		if self.direction() == Direction::Ltr && x + delta > self.stage.scroll_width() {
			x = self.stage.scroll_width() - delta;
		}
		let mut y = (offset.top / delta).floor() * delta;
		if y + delta > self.stage.scroll_height() {
			y = self.stage.scroll_height() - delta;
		}
		self.scroll_to(x, y, true);
	}

	/// Content coordinates of a target inside a view.
	fn target_offset(&self, id: ViewId, target: &DisplayTarget) -> Option<Point> {
		let view = self.views.by_id(id)?;
		let point = view.location_of(target.as_target())?;
		let offset = view.offset();
		Some(Point::new(offset.left + point.left, offset.top + point.top))
	}

	/// Show a section, replacing whatever is displayed unless it is already
	/// on the stage. Content is fetched before anything is torn down.
	pub(crate) async fn display_section(
		&mut self,
		section: Rc<dyn Section>,
		target: Option<DisplayTarget>,
		move_to: fn(&mut ManagerCore, Point),
	) -> Result<(), ManagerError> {
		let target = target.filter(|t| !t.names_section(&*section));

		let shown = if self.layout.geometry().is_pre_paginated() {
			None
		} else {
			self.views.find(&*section).map(|view| {
				let point = target
					.as_ref()
					.and_then(|t| view.location_of(t.as_target()))
					.map(|p| Point::new(view.offset().left + p.left, view.offset().top + p.top));
				(view.offset(), view.width(), point)
			})
		};
		if let Some((offset, width, point)) = shown {
			log::debug!("Section {} already displayed", section.href());
			match self.direction() {
				Direction::Ltr => self.scroll_to(offset.left, offset.top, true),
				Direction::Rtl => {
					let viewport = self.stage.bounds().width;
					self.scroll_to(offset.left + width - viewport, offset.top, true);
				}
			}
			if let Some(point) = point {
				move_to(self, point);
			}
			return Ok(());
		}

		let fetched = self.fetch_forward(section).await?;
		let views = self.prepare(fetched)?;
		self.clear();
		let mut ids = self.place(views, Placement::Append).into_iter();
		if let Some(target) = &target
			&& let Some(id) = ids.next()
			&& let Some(point) = self.target_offset(id, target)
		{
			move_to(self, point);
		}
		self.views.show();
		Ok(())
	}

	/// Tear down every view and return to the start of the stage.
	pub(crate) fn clear(&mut self) {
		if self.views.is_empty() {
			return;
		}
		let gone: BTreeSet<ViewId> = self.views.iter().map(|v| v.id()).collect();
		self.views.hide();
		self.scroll_to(0.0, 0.0, true);
		self.views.clear();
		self.countered.clear();
		self.inbox.borrow_mut().retain(|(id, _)| !gone.contains(id));
		self.relayout();
	}

	pub(crate) fn destroy(&mut self) {
		self.clear();
		if let Some(mut snap) = self.snap.take() {
			snap.destroy();
		}
		self.stage.destroy();
		self.events.clear();
		self.stage_size = None;
		self.state = ManagerState::Unrendered;
		log::debug!("Destroyed manager");
	}

	pub fn is_visible(&self, view: &View, offset_prev: f32, offset_next: f32, container: Rect) -> bool {
		let position = view.position(self.stage.origin());
		match self.axis {
			Axis::Horizontal => {
				position.right() > container.left - offset_prev
					&& position.left < container.right() + offset_next
			}
			Axis::Vertical => {
				position.bottom() > container.top - offset_prev
					&& position.top < container.bottom() + offset_next
			}
		}
	}

	/// Displayed views intersecting the stage.
	pub fn visible(&self) -> Vec<&View> {
		let bounds = self.stage.bounds();
		self.views
			.iter()
			.filter(|v| v.is_displayed() && self.is_visible(v, 0.0, 0.0, bounds))
			.collect()
	}

	pub fn current_location(&self) -> Vec<ViewLocation> {
		if self.paginated && self.axis == Axis::Horizontal {
			self.paginated_location()
		} else {
			self.scrolled_location()
		}
	}

	fn paginated_location(&self) -> Vec<ViewLocation> {
		let container = self.stage.bounds();
		let origin = self.stage.origin();
		let g = self.layout.geometry();
		let rtl = self.direction() == Direction::Rtl;
		let mut used = 0.0;
		let mut located = Vec::new();
		for view in self.visible() {
			let position = view.position(origin);
			let (start, end) = if rtl {
				let offset = container.right();
				let page_width = (offset - position.left).abs().min(container.width) - used;
				let end = position.width - (position.right() - offset) - used;
				used += page_width;
				(end - page_width, end)
			} else {
				let offset = container.left;
				let page_width = (position.right() - offset).min(container.width) - used;
				let start = offset - position.left + used;
				used += page_width;
				(start, start + page_width)
			};

			let total_pages = g.count(view.width(), None).pages;
			let pages = if g.is_pre_paginated() {
				vec![1]
			} else if g.page_width > 0.0 {
				let mut first = (start / g.page_width).floor() as i64;
				let mut last = (end / g.page_width).floor() as i64;
				if first < 0 {
					first = 0;
					last += 1;
				}
				if rtl {
					let total = total_pages as i64;
					(first, last) = (total - last, total - first);
				}
				(first + 1..=last).map(|p| p as u32).collect()
			} else {
				Vec::new()
			};
			located.push(self.located(view, pages, total_pages, start, end));
		}
		located
	}

	fn scrolled_location(&self) -> Vec<ViewLocation> {
		let container = self.stage.bounds();
		let origin = self.stage.origin();
		let g = self.layout.geometry();
		let vertical = self.axis == Axis::Vertical;
		let rtl = self.direction() == Direction::Rtl && !vertical;
		self.visible()
			.into_iter()
			.map(|view| {
				let position = view.position(origin);
				let (start, length, stop) = if vertical {
					(container.top - position.top, position.height, container.height)
				} else {
					(container.left - position.left, position.width, container.width)
				};
				let end = (start + stop).min(length);
				let start = start.max(0.0);
				let total_pages = g.count(length, Some(stop)).pages;
				let pages = if stop > 0.0 {
					let first = (start / stop).floor() as i64 + 1;
					let last = ((end / stop).ceil() as i64).max(first);
					let (first, last) = if rtl {
						let total = total_pages as i64;
						(total - last + 1, total - first + 1)
					} else {
						(first, last)
					};
					(first.max(1)..=last).map(|p| p as u32).collect()
				} else {
					Vec::new()
				};
				self.located(view, pages, total_pages, start, end)
			})
			.collect()
	}

	fn located(&self, view: &View, pages: Vec<u32>, total_pages: u32, start: f32, end: f32) -> ViewLocation {
		let section = view.section();
		ViewLocation {
			index: section.index(),
			href: section.href().to_string(),
			pages,
			total_pages,
			mapping: view
				.contents()
				.and_then(|c| self.mapping.page(c, section.cfi_base(), start, end)),
		}
	}

	/// Whether the visible views show the start and end of the spine.
	fn spine_ends(&self) -> (bool, bool) {
		let visible = self.visible();
		let first = visible.first().is_some_and(|v| v.section().prev().is_none());
		let last = visible.last().is_some_and(|v| v.section().next().is_none());
		(first, last)
	}

	pub fn location(&self) -> Option<Location> {
		let (first, last) = self.spine_ends();
		Location::from_located(&self.current_location(), first, last)
	}

	pub(crate) fn report_location(&mut self) {
		let located = self.current_location();
		let (first, last) = self.spine_ends();
		self.events.emit(&ManagerEvent::Located(located.clone()));
		if let Some(location) = Location::from_located(&located, first, last) {
			log::debug!(
				"Relocated to {} page {}",
				location.start.href,
				location.start.displayed.page
			);
			self.events.emit(&ManagerEvent::Relocated(location));
		}
	}
}

/// Run `task` as the next job of the manager's queue and wait for it.
pub(crate) async fn serialized<M, F, R>(manager: &mut M, task: F) -> Result<R, ManagerError>
where
	M: ViewManager + Queued,
	F: for<'a> FnOnce(&'a mut M) -> LocalFuture<'a, Result<R, ManagerError>> + 'static,
	R: 'static,
{
	manager.core().ensure_rendered()?;
	if manager.queue().is_paused() {
		return Err(QueueError::Paused.into());
	}
	let mut done = manager.queue().enqueue(task);
	manager.core_mut().nav = NavState::Navigating;
	TaskQueue::flush(manager).await;
	manager.core_mut().nav = NavState::Static;
	done.settled().unwrap_or(Err(QueueError::Paused))?
}

#[async_trait::async_trait(?Send)]
pub trait ViewManager {
	fn name(&self) -> &'static str;

	fn core(&self) -> &ManagerCore;

	fn core_mut(&mut self) -> &mut ManagerCore;

	/// Attach to the host element and lay out for the configured flow.
	fn render(&mut self, element: Rect);

	async fn display(
		&mut self,
		section: Rc<dyn Section>,
		target: Option<DisplayTarget>,
	) -> Result<(), ManagerError>;

	/// Move one page forward, false when there is nowhere to go.
	async fn next(&mut self) -> Result<bool, ManagerError>;

	async fn prev(&mut self) -> Result<bool, ManagerError>;

	/// Resize the stage and redisplay the section that was on screen.
	async fn resize(&mut self, width: Option<f32>, height: Option<f32>) -> Result<(), ManagerError>;

	/// The host stopped scrolling. Returns the animation to run first when
	/// the stage has to snap to a page.
	async fn scrolled(&mut self) -> Result<Option<SnapAnimation>, ManagerError>;

	fn move_to(&mut self, offset: Point);

	fn update_flow(&mut self, flow: Flow);

	fn destroy(&mut self);

	fn on_scroll(&mut self, left: f32, top: f32) {
		self.core_mut().on_scroll(left, top);
	}

	fn update_axis(&mut self, axis: Axis, force: bool) {
		self.core_mut().update_axis(axis, force);
	}

	fn update_layout(&mut self) {
		self.core_mut().update_layout();
	}

	fn direction(&mut self, direction: Direction) {
		self.core_mut().set_direction(direction);
	}

	fn scroll_by(&mut self, x: f32, y: f32, silent: bool) {
		self.core_mut().scroll_by(x, y, silent);
	}

	fn scroll_to(&mut self, x: f32, y: f32, silent: bool) {
		self.core_mut().scroll_to(x, y, silent);
	}

	fn is_visible(&self, view: &View, offset_prev: f32, offset_next: f32, container: Rect) -> bool {
		self.core().is_visible(view, offset_prev, offset_next, container)
	}

	fn visible(&self) -> Vec<&View> {
		self.core().visible()
	}

	fn current_location(&self) -> Vec<ViewLocation> {
		self.core().current_location()
	}

	fn location(&self) -> Option<Location> {
		self.core().location()
	}

	fn clear(&mut self) {
		self.core_mut().clear();
	}

	fn events(&mut self) -> &mut Emitter<ManagerEvent> {
		self.core_mut().events()
	}

	fn is_rendered(&self) -> bool {
		self.core().is_rendered()
	}
}
