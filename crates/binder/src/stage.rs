//! The scrolling container every view of a manager is placed in.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::geometry::Axis;
use crate::geometry::Direction;
use crate::geometry::Overflow;
use crate::geometry::Point;
use crate::geometry::Rect;
use crate::geometry::Size;
use crate::view::ViewId;

static NEXT_STAGE_ID: AtomicU64 = AtomicU64::new(0);

/// Child order of the container, shared with the view collection.
pub type Container = Rc<RefCell<Vec<ViewId>>>;

#[derive(Debug, Default, Clone, Copy)]
pub struct StageSettings {
	pub width: Option<f32>,
	pub height: Option<f32>,
	pub axis: Axis,
	pub direction: Direction,
	pub overflow: Overflow,
	pub hidden: bool,
}

#[derive(Debug)]
pub struct Stage {
	id: String,
	container: Container,
	element: Option<Rect>,
	settings: StageSettings,
	size: Size,
	content: Size,
	scroll: Point,
}

impl Stage {
	pub fn new(settings: StageSettings) -> Self {
		let id = format!("binder-container-{}", NEXT_STAGE_ID.fetch_add(1, Ordering::Relaxed));
		let size = Size::new(
			settings.width.unwrap_or_default(),
			settings.height.unwrap_or_default(),
		);
		log::debug!("Created stage {id}");
		Self {
			id,
			container: Container::default(),
			element: None,
			settings,
			size,
			content: Size::default(),
			scroll: Point::default(),
		}
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn container(&self) -> Container {
		self.container.clone()
	}

	pub fn is_hidden(&self) -> bool {
		self.settings.hidden
	}

	pub fn is_attached(&self) -> bool {
		self.element.is_some()
	}

	/// Place the stage in a host element with the given bounds.
	pub fn attach_to(&mut self, element: Rect) {
		self.element = Some(element);
		if self.settings.width.is_none() && self.settings.height.is_none() {
			self.size = Size::new(element.width, element.height);
		}
	}

	/// Resize the container, missing dimensions follow the host element.
	pub fn size(&mut self, width: Option<f32>, height: Option<f32>) -> Size {
		let element = self.element.unwrap_or_default();
		let width = width.or(self.settings.width).unwrap_or(element.width);
		let height = height.or(self.settings.height).unwrap_or(element.height);
		self.size = Size::new(width, height);
		self.clamp_scroll();
		self.size
	}

	pub fn bounds(&self) -> Rect {
		let origin = self.element.unwrap_or_default();
		Rect::new(origin.left, origin.top, self.size.width, self.size.height)
	}

	pub fn axis(&mut self, axis: Axis) {
		self.settings.axis = axis;
	}

	pub fn current_axis(&self) -> Axis {
		self.settings.axis
	}

	/// Views flow in a single row on the horizontal axis.
	pub fn is_row(&self) -> bool {
		matches!(self.settings.axis, Axis::Horizontal)
	}

	pub fn direction(&mut self, direction: Direction) {
		self.settings.direction = direction;
		self.clamp_scroll();
	}

	pub fn current_direction(&self) -> Direction {
		self.settings.direction
	}

	pub fn overflow(&mut self, overflow: Overflow) {
		self.settings.overflow = overflow;
	}

	pub fn overflow_x(&self) -> Overflow {
		self.overflow_for(Axis::Horizontal)
	}

	pub fn overflow_y(&self) -> Overflow {
		self.overflow_for(Axis::Vertical)
	}

	fn overflow_for(&self, axis: Axis) -> Overflow {
		match self.settings.overflow {
			o @ (Overflow::Scroll | Overflow::Auto) if axis == self.settings.axis => o,
			Overflow::Scroll | Overflow::Auto => Overflow::Hidden,
			o => o,
		}
	}

	/// Extent of the laid out views.
	pub fn set_content_size(&mut self, content: Size) {
		self.content = content;
		self.clamp_scroll();
	}

	pub fn scroll_width(&self) -> f32 {
		self.content.width.max(self.size.width)
	}

	pub fn scroll_height(&self) -> f32 {
		self.content.height.max(self.size.height)
	}

	pub fn scroll_left(&self) -> f32 {
		self.scroll.left
	}

	pub fn scroll_top(&self) -> f32 {
		self.scroll.top
	}

	pub fn scroll_by(&mut self, x: f32, y: f32) -> Point {
		self.scroll_to(self.scroll.left + x, self.scroll.top + y)
	}

	pub fn scroll_to(&mut self, x: f32, y: f32) -> Point {
		self.scroll = Point::new(x, y);
		self.clamp_scroll();
		log::trace!("Stage scrolled to {:?}", self.scroll);
		self.scroll
	}

	/// Where the content's top left corner currently sits.
	pub fn origin(&self) -> Point {
		let bounds = self.bounds();
		Point::new(bounds.left - self.scroll.left, bounds.top - self.scroll.top)
	}

	fn clamp_scroll(&mut self) {
		let max_x = (self.scroll_width() - self.size.width).max(0.0);
		let max_y = (self.scroll_height() - self.size.height).max(0.0);
		let (min_x, max_x) = match self.settings.direction {
			Direction::Ltr => (0.0, max_x),
			Direction::Rtl => (-max_x, 0.0),
		};
		self.scroll.left = self.scroll.left.clamp(min_x, max_x);
		self.scroll.top = self.scroll.top.clamp(0.0, max_y);
	}

	pub fn destroy(&mut self) {
		if self.element.take().is_some() {
			log::debug!("Detached stage {}", self.id);
		}
		self.container.borrow_mut().clear();
		self.content = Size::default();
		self.scroll = Point::default();
	}
}

#[cfg(test)]
mod tests {
	use crate::geometry::Axis;
	use crate::geometry::Direction;
	use crate::geometry::Overflow;
	use crate::geometry::Point;
	use crate::geometry::Rect;
	use crate::geometry::Size;
	use crate::stage::Stage;
	use crate::stage::StageSettings;

	#[test]
	fn test_stage_ids() {
		let a = Stage::new(StageSettings::default());
		let b = Stage::new(StageSettings::default());
		assert!(a.id().starts_with("binder-container-"));
		assert_ne!(a.id(), b.id());
	}

	#[test]
	fn test_stage_size_follows_element() {
		let mut stage = Stage::new(StageSettings::default());
		stage.attach_to(Rect::new(10.0, 20.0, 800.0, 600.0));
		assert_eq!(stage.size(None, None), Size::new(800.0, 600.0));
		assert_eq!(stage.bounds(), Rect::new(10.0, 20.0, 800.0, 600.0));
		assert_eq!(stage.size(Some(400.0), None), Size::new(400.0, 600.0));
		stage.destroy();
		assert!(!stage.is_attached());
		stage.destroy();
	}

	#[test]
	fn test_stage_overflow() {
		let mut stage = Stage::new(StageSettings {
			axis: Axis::Vertical,
			..Default::default()
		});
		stage.overflow(Overflow::Scroll);
		assert_eq!(stage.overflow_y(), Overflow::Scroll);
		assert_eq!(stage.overflow_x(), Overflow::Hidden);
		stage.axis(Axis::Horizontal);
		assert!(stage.is_row());
		assert_eq!(stage.overflow_x(), Overflow::Scroll);
		assert_eq!(stage.overflow_y(), Overflow::Hidden);
		stage.overflow(Overflow::Hidden);
		assert_eq!(stage.overflow_x(), Overflow::Hidden);
		assert_eq!(stage.overflow_y(), Overflow::Hidden);
	}

	#[test]
	fn test_stage_scroll_clamped() {
		let mut stage = Stage::new(StageSettings {
			width: Some(500.0),
			height: Some(400.0),
			..Default::default()
		});
		stage.set_content_size(Size::new(1500.0, 400.0));
		assert_eq!(stage.scroll_by(600.0, 50.0), Point::new(600.0, 0.0));
		assert_eq!(stage.scroll_by(600.0, 0.0), Point::new(1000.0, 0.0));
		assert_eq!(stage.scroll_to(-5.0, 0.0), Point::new(0.0, 0.0));

		stage.direction(Direction::Rtl);
		assert_eq!(stage.scroll_to(-700.0, 0.0), Point::new(-700.0, 0.0));
		assert_eq!(stage.scroll_by(-700.0, 0.0), Point::new(-1000.0, 0.0));
		assert_eq!(stage.scroll_to(100.0, 0.0), Point::new(0.0, 0.0));
		assert_eq!(stage.origin(), Point::new(0.0, 0.0));
	}
}
