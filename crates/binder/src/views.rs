//! Ordered collection of views mirrored into the stage container.

use crate::geometry::Axis;
use crate::geometry::Direction;
use crate::geometry::Point;
use crate::geometry::Size;
use crate::section::Section;
use crate::stage::Container;
use crate::view::View;
use crate::view::ViewId;

#[derive(Default)]
pub struct Views {
	views: Vec<View>,
	container: Container,
	hidden: bool,
}

impl Views {
	pub fn new(container: Container) -> Self {
		Self {
			views: Vec::new(),
			container,
			hidden: false,
		}
	}

	pub fn container(&self) -> &Container {
		&self.container
	}

	pub fn len(&self) -> usize {
		self.views.len()
	}

	pub fn is_empty(&self) -> bool {
		self.views.is_empty()
	}

	pub fn is_hidden(&self) -> bool {
		self.hidden
	}

	pub fn first(&self) -> Option<&View> {
		self.views.first()
	}

	pub fn last(&self) -> Option<&View> {
		self.views.last()
	}

	pub fn first_mut(&mut self) -> Option<&mut View> {
		self.views.first_mut()
	}

	pub fn last_mut(&mut self) -> Option<&mut View> {
		self.views.last_mut()
	}

	pub fn get(&self, index: usize) -> Option<&View> {
		self.views.get(index)
	}

	pub fn get_mut(&mut self, index: usize) -> Option<&mut View> {
		self.views.get_mut(index)
	}

	pub fn by_id(&self, id: ViewId) -> Option<&View> {
		self.views.iter().find(|v| v.id() == id)
	}

	pub fn by_id_mut(&mut self, id: ViewId) -> Option<&mut View> {
		self.views.iter_mut().find(|v| v.id() == id)
	}

	pub fn index_of(&self, id: ViewId) -> Option<usize> {
		self.views.iter().position(|v| v.id() == id)
	}

	pub fn slice(&self, start: usize, end: usize) -> &[View] {
		let end = end.min(self.views.len());
		&self.views[start.min(end)..end]
	}

	pub fn iter(&self) -> impl Iterator<Item = &View> {
		self.views.iter()
	}

	pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut View> {
		self.views.iter_mut()
	}

	pub fn ids(&self) -> Vec<ViewId> {
		self.views.iter().map(|v| v.id()).collect()
	}

	pub fn append(&mut self, view: View) -> &mut View {
		self.container.borrow_mut().push(view.id());
		self.views.push(view);
		let last = self.views.len() - 1;
		&mut self.views[last]
	}

	pub fn prepend(&mut self, view: View) -> &mut View {
		self.container.borrow_mut().insert(0, view.id());
		self.views.insert(0, view);
		&mut self.views[0]
	}

	pub fn insert(&mut self, view: View, index: usize) -> &mut View {
		let index = index.min(self.views.len());
		{
			let mut container = self.container.borrow_mut();
			if index < container.len() {
				container.insert(index, view.id());
			} else {
				container.push(view.id());
			}
		}
		self.views.insert(index, view);
		&mut self.views[index]
	}

	/// Swap a view for a fresh one at the same place in the container.
	pub fn replace(&mut self, id: ViewId, view: View) -> Option<&mut View> {
		let index = self.index_of(id)?;
		let new_id = view.id();
		for child in self.container.borrow_mut().iter_mut() {
			if *child == id {
				*child = new_id;
			}
		}
		let old = std::mem::replace(&mut self.views[index], view);
		self.detach(old);
		Some(&mut self.views[index])
	}

	/// Destroy and detach a view, a view not in the collection is ignored.
	pub fn remove(&mut self, id: ViewId) -> bool {
		let Some(index) = self.index_of(id) else {
			return false;
		};
		let view = self.views.remove(index);
		self.detach(view);
		true
	}

	fn detach(&self, mut view: View) {
		if view.is_displayed() {
			view.destroy();
		}
		let id = view.id();
		self.container.borrow_mut().retain(|c| *c != id);
	}

	pub fn clear(&mut self) {
		if self.views.is_empty() {
			return;
		}
		for view in std::mem::take(&mut self.views) {
			self.detach(view);
		}
		log::trace!("Cleared views");
	}

	/// First displayed view of the section, views still loading are skipped.
	pub fn find(&self, section: &dyn Section) -> Option<&View> {
		self.views
			.iter()
			.find(|v| v.is_displayed() && v.index() == section.index())
	}

	pub fn find_mut(&mut self, section: &dyn Section) -> Option<&mut View> {
		self.views
			.iter_mut()
			.find(|v| v.is_displayed() && v.index() == section.index())
	}

	pub fn displayed(&self) -> Vec<&View> {
		self.views.iter().filter(|v| v.is_displayed()).collect()
	}

	pub fn show(&mut self) {
		for view in self.views.iter_mut().filter(|v| v.is_displayed()) {
			view.show();
		}
		self.hidden = false;
	}

	pub fn hide(&mut self) {
		for view in self.views.iter_mut().filter(|v| v.is_displayed()) {
			view.hide();
		}
		self.hidden = true;
	}

	/// Place views one after another in container order and return the
	/// extent they cover. A view forced to the right page of a row is
	/// preceded by a blank page of its own width.
	pub fn layout(&mut self, axis: Axis, direction: Direction, viewport_width: f32) -> Size {
		let order = self.container.borrow().clone();
		let mut along = 0.0;
		let mut across: f32 = 0.0;
		for id in order {
			let Some(view) = self.by_id_mut(id) else {
				continue;
			};
			let (width, height) = (view.width(), view.height());
			if axis == Axis::Horizontal && view.is_forced_right() {
				along += width;
			}
			let offset = match (axis, direction) {
				(Axis::Horizontal, Direction::Ltr) => Point::new(along, 0.0),
				(Axis::Horizontal, Direction::Rtl) => Point::new(viewport_width - (along + width), 0.0),
				(Axis::Vertical, _) => Point::new(0.0, along),
			};
			view.set_offset(offset);
			match axis {
				Axis::Horizontal => {
					along += width;
					across = across.max(height);
				}
				Axis::Vertical => {
					along += height;
					across = across.max(width);
				}
			}
		}
		match axis {
			Axis::Horizontal => Size::new(along, across),
			Axis::Vertical => Size::new(across, along),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::rc::Rc;

	use crate::geometry::Axis;
	use crate::geometry::Direction;
	use crate::geometry::Point;
	use crate::geometry::Size;
	use crate::headless::HeadlessRenderer;
	use crate::headless::Metrics;
	use crate::headless::tests::StaticSection;
	use crate::layout::Layout;
	use crate::stage::Container;
	use crate::view::View;
	use crate::view::ViewId;
	use crate::view::ViewSettings;
	use crate::views::Views;

	const CHAPTER: &str = "<html><body><p>one two three</p></body></html>";

	fn views(n: usize) -> Vec<View> {
		views_with(n, false)
	}

	fn views_with(n: usize, force_right: bool) -> Vec<View> {
		let chapters = vec![CHAPTER; n];
		let renderer = Rc::new(HeadlessRenderer::new(Metrics::default()));
		StaticSection::chain(&chapters)
			.into_iter()
			.map(|section| {
				View::new(
					section,
					renderer.clone(),
					Layout::default(),
					ViewSettings {
						width: 100.0,
						height: 100.0,
						force_right,
						..Default::default()
					},
				)
			})
			.collect()
	}

	fn assert_mirrored(v: &Views) {
		assert_eq!(*v.container().borrow(), v.ids());
		assert_eq!(v.container().borrow().len(), v.len());
	}

	#[test]
	fn test_views_mirror_container() {
		let _ = env_logger::try_init();
		let container = Container::default();
		let mut v = Views::new(container.clone());
		let mut pool = views(6).into_iter();
		let a = v.append(pool.next().unwrap()).id();
		assert_mirrored(&v);
		let b = v.prepend(pool.next().unwrap()).id();
		assert_mirrored(&v);
		let c = v.insert(pool.next().unwrap(), 1).id();
		assert_mirrored(&v);
		let d = v.insert(pool.next().unwrap(), 10).id();
		assert_mirrored(&v);
		assert_eq!(v.ids(), vec![b, c, a, d]);

		let f = pool.next().unwrap();
		let f_id = f.id();
		assert_eq!(v.replace(a, f).map(|r| r.id()), Some(f_id));
		assert_mirrored(&v);
		assert_eq!(v.ids(), vec![b, c, f_id, d]);
		let a = f_id;

		assert!(v.remove(c));
		assert_mirrored(&v);
		assert!(!v.remove(c));
		assert_eq!(v.len(), 3);

		let stray: ViewId = pool.next().unwrap().id();
		assert!(!v.remove(stray));
		assert!(v.index_of(a).is_some());

		v.clear();
		assert_mirrored(&v);
		assert!(v.is_empty());
		assert!(container.borrow().is_empty());
		v.clear();
	}

	#[test]
	fn test_views_find_only_displayed() {
		let mut v = Views::new(Container::default());
		for view in views(2) {
			v.append(view);
		}
		let section = v.get(1).unwrap().section().clone();
		assert!(v.find(&*section).is_none());

		v.get_mut(1).unwrap().display_markup(CHAPTER).unwrap();
		assert_eq!(v.find(&*section).map(|f| f.index()), Some(1));
		assert_eq!(v.displayed().len(), 1);

		v.hide();
		assert!(v.is_hidden());
		assert!(v.get(1).unwrap().is_hidden());
		assert!(!v.get(0).unwrap().is_hidden());
		v.show();
		assert!(!v.get(1).unwrap().is_hidden());
	}

	#[test]
	fn test_views_layout_offsets() {
		let mut v = Views::new(Container::default());
		for mut view in views(3) {
			view.reframe(100.0, 50.0);
			v.append(view);
		}
		let size = v.layout(Axis::Horizontal, Direction::Ltr, 100.0);
		assert_eq!(size, Size::new(300.0, 50.0));
		assert_eq!(v.get(2).unwrap().offset(), Point::new(200.0, 0.0));

		v.layout(Axis::Horizontal, Direction::Rtl, 100.0);
		assert_eq!(v.get(0).unwrap().offset(), Point::new(0.0, 0.0));
		assert_eq!(v.get(2).unwrap().offset(), Point::new(-200.0, 0.0));

		let size = v.layout(Axis::Vertical, Direction::Ltr, 100.0);
		assert_eq!(size, Size::new(100.0, 150.0));
		assert_eq!(v.get(1).unwrap().offset(), Point::new(0.0, 50.0));
	}

	#[test]
	fn test_views_layout_forced_right() {
		let mut v = Views::new(Container::default());
		for mut view in views_with(1, true) {
			view.reframe(100.0, 50.0);
			v.append(view);
		}
		let size = v.layout(Axis::Horizontal, Direction::Ltr, 200.0);
		assert_eq!(size, Size::new(200.0, 50.0));
		assert_eq!(v.get(0).unwrap().offset(), Point::new(100.0, 0.0));
		let size = v.layout(Axis::Vertical, Direction::Ltr, 200.0);
		assert_eq!(size, Size::new(100.0, 50.0));
	}
}
