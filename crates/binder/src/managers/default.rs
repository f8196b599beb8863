//! Shows one section, or one fixed layout spread, at a time and pages
//! through it before loading the neighbouring section.

use std::rc::Rc;

use crate::error::ManagerError;
use crate::frame::Renderer;
use crate::geometry::Axis;
use crate::geometry::Direction;
use crate::geometry::Overflow;
use crate::geometry::Point;
use crate::geometry::Rect;
use crate::layout::Flow;
use crate::managers::DisplayTarget;
use crate::managers::ManagerCore;
use crate::managers::ManagerSettings;
use crate::managers::Placement;
use crate::managers::ViewManager;
use crate::managers::serialized;
use crate::queue::Queued;
use crate::queue::TaskQueue;
use crate::section::Request;
use crate::section::Section;
use crate::snap::SnapAnimation;

/// Outcome of a page turn.
enum Turn {
	Scrolled,
	Load(Rc<dyn Section>),
	End,
}

impl From<Option<Rc<dyn Section>>> for Turn {
	fn from(section: Option<Rc<dyn Section>>) -> Self {
		section.map_or(Turn::End, Turn::Load)
	}
}

pub struct DefaultViewManager {
	core: ManagerCore,
	queue: TaskQueue<Self>,
}

impl Queued for DefaultViewManager {
	fn queue(&mut self) -> &mut TaskQueue<Self> {
		&mut self.queue
	}
}

impl DefaultViewManager {
	pub const NAME: &'static str = "default";

	pub fn new(settings: ManagerSettings, renderer: Rc<dyn Renderer>, request: Rc<dyn Request>) -> Self {
		Self {
			core: ManagerCore::new(settings, renderer, request, true),
			queue: TaskQueue::default(),
		}
	}

	/// Run whatever is pending on the queue.
	pub async fn flush(&mut self) -> usize {
		TaskQueue::flush(self).await
	}

	async fn display_now(
		&mut self,
		section: Rc<dyn Section>,
		target: Option<DisplayTarget>,
	) -> Result<(), ManagerError> {
		self.core
			.display_section(section, target, ManagerCore::move_to_absolute)
			.await?;
		self.core.report_location();
		Ok(())
	}

	async fn next_now(&mut self) -> Result<bool, ManagerError> {
		let core = &mut self.core;
		let Some(last) = core.views.last().map(|v| v.section().clone()) else {
			return Ok(false);
		};
		let g = *core.layout.geometry();
		let bounds = core.stage.bounds();
		let (left, top) = (core.stage.scroll_left(), core.stage.scroll_top());
		let (width, height) = (core.stage.scroll_width(), core.stage.scroll_height());

		let turn = match (core.paginated, core.axis, core.direction()) {
			(true, Axis::Horizontal, Direction::Ltr) if left + bounds.width + g.delta <= width => {
				core.scroll_by(g.delta, 0.0, true);
				Turn::Scrolled
			}
			(true, Axis::Horizontal, Direction::Rtl) if left - g.delta > -width => {
				core.scroll_by(g.delta, 0.0, true);
				Turn::Scrolled
			}
			(true, Axis::Vertical, _) if top + bounds.height < height => {
				core.scroll_by(0.0, g.height, true);
				Turn::Scrolled
			}
			_ => last.next().into(),
		};

		match turn {
			Turn::End => return Ok(false),
			Turn::Scrolled => {}
			Turn::Load(section) => {
				let fetched = core.fetch_forward(section).await?;
				core.update_layout();
				let views = core.prepare(fetched)?;
				core.clear();
				core.place(views, Placement::Append);
				core.views.show();
			}
		}
		core.report_location();
		Ok(true)
	}

	async fn prev_now(&mut self) -> Result<bool, ManagerError> {
		let core = &mut self.core;
		let Some(first) = core.views.first().map(|v| v.section().clone()) else {
			return Ok(false);
		};
		let g = *core.layout.geometry();
		let (left, top) = (core.stage.scroll_left(), core.stage.scroll_top());

		let turn = match (core.paginated, core.axis, core.direction()) {
			(true, Axis::Horizontal, Direction::Ltr) if left > 0.0 => {
				core.scroll_by(-g.delta, 0.0, true);
				Turn::Scrolled
			}
			(true, Axis::Horizontal, Direction::Rtl) if left < 0.0 => {
				core.scroll_by(-g.delta, 0.0, true);
				Turn::Scrolled
			}
			(true, Axis::Vertical, _) if top > 0.0 => {
				core.scroll_by(0.0, -g.height, true);
				Turn::Scrolled
			}
			_ => first.prev().into(),
		};

		match turn {
			Turn::End => return Ok(false),
			Turn::Scrolled => {}
			Turn::Load(section) => {
				let fetched = core.fetch_backward(section).await?;
				core.update_layout();
				let views = core.prepare(fetched)?;
				core.clear();
				core.place(views, Placement::Prepend);
				if core.paginated && core.axis == Axis::Horizontal {
					let width = core.stage.scroll_width();
					let delta = core.layout.geometry().delta;
					match core.direction() {
						Direction::Ltr => core.scroll_to(width - delta, 0.0, true),
						Direction::Rtl => core.scroll_to(-width + delta, 0.0, true),
					}
				}
				core.views.show();
			}
		}
		core.report_location();
		Ok(true)
	}

	async fn resize_now(&mut self, width: Option<f32>, height: Option<f32>) -> Result<(), ManagerError> {
		let resume = self.core.resume_point();
		if !self.core.resize_stage(width, height) {
			return Ok(());
		}
		if let Some((section, cfi)) = resume {
			self.display_now(section, cfi.map(DisplayTarget::Cfi)).await?;
		}
		Ok(())
	}
}

#[async_trait::async_trait(?Send)]
impl ViewManager for DefaultViewManager {
	fn name(&self) -> &'static str {
		Self::NAME
	}

	fn core(&self) -> &ManagerCore {
		&self.core
	}

	fn core_mut(&mut self) -> &mut ManagerCore {
		&mut self.core
	}

	fn render(&mut self, element: Rect) {
		self.core.render(element, Overflow::Auto);
	}

	async fn display(
		&mut self,
		section: Rc<dyn Section>,
		target: Option<DisplayTarget>,
	) -> Result<(), ManagerError> {
		serialized(self, move |m: &mut Self| Box::pin(m.display_now(section, target))).await
	}

	async fn next(&mut self) -> Result<bool, ManagerError> {
		serialized(self, |m: &mut Self| Box::pin(m.next_now())).await
	}

	async fn prev(&mut self) -> Result<bool, ManagerError> {
		serialized(self, |m: &mut Self| Box::pin(m.prev_now())).await
	}

	async fn resize(&mut self, width: Option<f32>, height: Option<f32>) -> Result<(), ManagerError> {
		serialized(self, move |m: &mut Self| Box::pin(m.resize_now(width, height))).await
	}

	async fn scrolled(&mut self) -> Result<Option<SnapAnimation>, ManagerError> {
		self.core.ensure_rendered()?;
		Ok(self.core.settle())
	}

	fn move_to(&mut self, offset: Point) {
		self.core.move_to_absolute(offset);
	}

	fn update_flow(&mut self, flow: Flow) {
		self.core.update_flow(flow, Overflow::Auto);
	}

	fn destroy(&mut self) {
		self.queue.stop();
		self.core.destroy();
	}
}

#[cfg(test)]
mod tests {
	use std::rc::Rc;

	use parchment::Cfi;
	use pollster::block_on;

	use crate::error::ManagerError;
	use crate::geometry::Direction;
	use crate::geometry::Rect;
	use crate::headless::tests::Spine;
	use crate::headless::tests::StaticRequest;
	use crate::layout::LayoutMode;
	use crate::layout::LayoutSettings;
	use crate::layout::Spread;
	use crate::managers::DisplayTarget;
	use crate::managers::ManagerEvent;
	use crate::managers::ManagerSettings;
	use crate::managers::NavState;
	use crate::managers::ViewManager;
	use crate::managers::default::DefaultViewManager;
	use crate::managers::tests::FailingRenderer;
	use crate::managers::tests::record;
	use crate::managers::tests::renderer;
	use crate::section::PageSpread;
	use crate::section::Section;
	use crate::section::SectionError;
	use crate::snap::SnapSettings;

	/// Three 100px pages at 10 glyphs by 2 lines each.
	const CHAPTER: &str =
		"<html><body><p id=\"a\">one two three four five six seven eight</p></body></html>";
	const SHORT: &str = "<html><body><p>alpha beta</p></body></html>";
	const PAGE: &str = "<html><body><p>cover</p></body></html>";

	fn settings() -> ManagerSettings {
		ManagerSettings {
			gap: Some(0.0),
			layout: LayoutSettings {
				spread: Spread::None,
				..Default::default()
			},
			..Default::default()
		}
	}

	fn manager(spine: Spine, settings: ManagerSettings, element: Rect) -> (DefaultViewManager, Vec<Rc<dyn Section>>) {
		let sections = spine.into_sections();
		let mut m = DefaultViewManager::new(settings, renderer(), Rc::new(StaticRequest));
		m.render(element);
		(m, sections)
	}

	fn pages(m: &DefaultViewManager) -> Vec<(usize, Vec<u32>, u32)> {
		m.current_location()
			.into_iter()
			.map(|l| (l.index, l.pages, l.total_pages))
			.collect()
	}

	fn indices(m: &DefaultViewManager) -> Vec<usize> {
		m.core().views().iter().map(|v| v.index()).collect()
	}

	#[test]
	fn test_default_pages_through_sections() {
		let _ = env_logger::try_init();
		let (mut m, sections) = manager(
			Spine::new(&[CHAPTER, SHORT]),
			settings(),
			Rect::new(0.0, 0.0, 100.0, 40.0),
		);
		assert_eq!(m.name(), "default");
		let seen = record(m.events());

		block_on(m.display(sections[0].clone(), None)).unwrap();
		assert_eq!(pages(&m), vec![(0, vec![1], 3)]);
		let location = m.location().unwrap();
		assert!(location.at_start);
		assert_eq!(
			location.start.cfi.map(|c| c.to_string()),
			Some("epubcfi(/6/2!/4/2[a]/1:0)".to_string())
		);

		assert!(block_on(m.next()).unwrap());
		assert_eq!(pages(&m), vec![(0, vec![2], 3)]);
		assert!(block_on(m.next()).unwrap());
		assert_eq!(pages(&m), vec![(0, vec![3], 3)]);
		assert!(block_on(m.next()).unwrap());
		assert_eq!(pages(&m), vec![(1, vec![1], 1)]);
		assert_eq!(indices(&m), vec![1]);
		assert!(m.location().unwrap().at_end);
		assert!(!block_on(m.next()).unwrap());

		assert!(block_on(m.prev()).unwrap());
		assert_eq!(indices(&m), vec![0]);
		assert_eq!(pages(&m), vec![(0, vec![3], 3)]);
		assert!(block_on(m.prev()).unwrap());
		assert_eq!(pages(&m), vec![(0, vec![2], 3)]);
		assert_eq!(m.core().nav_state(), NavState::Static);

		let seen = seen.borrow();
		assert!(seen.contains(&ManagerEvent::Added(0)));
		assert!(seen.contains(&ManagerEvent::Added(1)));
		assert!(matches!(
			seen.last(),
			Some(ManagerEvent::Relocated(l)) if l.start.displayed.page == 2
		));
		assert!(!seen.iter().any(|e| matches!(e, ManagerEvent::Scroll { .. })));
	}

	#[test]
	fn test_default_not_rendered() {
		let mut m = DefaultViewManager::new(settings(), renderer(), Rc::new(StaticRequest));
		assert!(matches!(block_on(m.next()), Err(ManagerError::NotRendered)));
		m.render(Rect::new(0.0, 0.0, 100.0, 40.0));
		assert!(!block_on(m.next()).unwrap());
		assert!(!block_on(m.prev()).unwrap());
		assert!(m.location().is_none());

		m.destroy();
		assert!(!m.is_rendered());
		assert!(matches!(block_on(m.prev()), Err(ManagerError::NotRendered)));
	}

	#[test]
	fn test_default_fetch_failure_keeps_stage() {
		let _ = env_logger::try_init();
		let (mut m, sections) = manager(
			Spine::new(&[CHAPTER, CHAPTER]).with_missing(1),
			settings(),
			Rect::new(0.0, 0.0, 100.0, 40.0),
		);
		block_on(m.display(sections[0].clone(), None)).unwrap();
		block_on(m.next()).unwrap();
		block_on(m.next()).unwrap();
		let id = m.core().views().first().unwrap().id();

		let err = block_on(m.next()).unwrap_err();
		assert!(matches!(err, ManagerError::Section(SectionError::NotFound(_))));
		assert_eq!(m.core().views().first().map(|v| v.id()), Some(id));
		assert_eq!(m.core().stage().scroll_left(), 200.0);
		assert!(m.core().views().first().unwrap().is_displayed());

		assert!(block_on(m.display(sections[1].clone(), None)).is_err());
		assert_eq!(indices(&m), vec![0]);
		assert_eq!(pages(&m), vec![(0, vec![3], 3)]);
		assert_eq!(m.core().nav_state(), NavState::Static);
	}

	#[test]
	fn test_default_display_target() {
		let (mut m, sections) = manager(
			Spine::new(&[CHAPTER]),
			settings(),
			Rect::new(0.0, 0.0, 100.0, 40.0),
		);
		// "five" starts the second page
		let cfi = Cfi::parse("epubcfi(/6/2!/4/2/1:19)").unwrap();
		block_on(m.display(sections[0].clone(), Some(DisplayTarget::Cfi(cfi)))).unwrap();
		assert_eq!(m.core().stage().scroll_left(), 100.0);
		assert_eq!(pages(&m), vec![(0, vec![2], 3)]);

		let id = m.core().views().first().unwrap().id();
		let anchor = DisplayTarget::Anchor("a".to_string());
		block_on(m.display(sections[0].clone(), Some(anchor))).unwrap();
		assert_eq!(m.core().views().first().unwrap().id(), id);
		assert_eq!(m.core().stage().scroll_left(), 0.0);

		// Naming the section itself means its start
		m.scroll_to(200.0, 0.0, true);
		let href = DisplayTarget::parse("chapter0.xhtml");
		block_on(m.display(sections[0].clone(), Some(href))).unwrap();
		assert_eq!(m.core().stage().scroll_left(), 0.0);
	}

	#[test]
	fn test_default_rtl() {
		let (mut m, sections) = manager(
			Spine::new(&[CHAPTER]),
			ManagerSettings {
				direction: Direction::Rtl,
				..settings()
			},
			Rect::new(0.0, 0.0, 100.0, 40.0),
		);
		block_on(m.display(sections[0].clone(), None)).unwrap();
		assert_eq!(m.core().views().first().unwrap().offset().left, -200.0);
		assert_eq!(pages(&m), vec![(0, vec![1], 3)]);
		assert!(block_on(m.next()).unwrap());
		assert_eq!(m.core().stage().scroll_left(), -100.0);
		assert_eq!(pages(&m), vec![(0, vec![2], 3)]);
		assert!(block_on(m.next()).unwrap());
		assert_eq!(pages(&m), vec![(0, vec![3], 3)]);
		assert!(!block_on(m.next()).unwrap());
		assert!(block_on(m.prev()).unwrap());
		assert_eq!(pages(&m), vec![(0, vec![2], 3)]);
	}

	#[test]
	fn test_default_fixed_layout_spreads() {
		let _ = env_logger::try_init();
		let settings = ManagerSettings {
			layout: LayoutSettings {
				name: LayoutMode::PrePaginated,
				min_spread_width: 200.0,
				..Default::default()
			},
			..Default::default()
		};
		let (mut m, sections) = manager(
			Spine::new(&[PAGE; 5]).with_side(4, PageSpread::Left),
			settings,
			Rect::new(0.0, 0.0, 200.0, 100.0),
		);
		block_on(m.display(sections[0].clone(), None)).unwrap();
		assert_eq!(indices(&m), vec![0]);

		assert!(block_on(m.next()).unwrap());
		assert_eq!(indices(&m), vec![1, 2]);
		assert_eq!(pages(&m), vec![(1, vec![1], 1), (2, vec![1], 1)]);
		let location = m.location().unwrap();
		assert_eq!((location.start.index, location.end.index), (1, 2));

		// The first page opens on the right
		assert!(block_on(m.prev()).unwrap());
		assert_eq!(indices(&m), vec![0]);
		let cover = m.core().views().first().unwrap();
		assert!(cover.is_forced_right());
		assert_eq!(cover.offset().left, 100.0);
		assert_eq!(pages(&m), vec![(0, vec![1], 1)]);

		assert!(block_on(m.next()).unwrap());
		assert!(block_on(m.next()).unwrap());
		// A left page never joins the spread before it
		assert_eq!(indices(&m), vec![3]);
		assert!(block_on(m.next()).unwrap());
		assert_eq!(indices(&m), vec![4]);
		assert!(!block_on(m.next()).unwrap());
	}

	#[test]
	fn test_default_failed_spread_keeps_stage() {
		let _ = env_logger::try_init();
		let sections = Spine::new(&[PAGE, PAGE, "<html><body><p>FAIL</p></body></html>", PAGE])
			.into_sections();
		let settings = ManagerSettings {
			layout: LayoutSettings {
				name: LayoutMode::PrePaginated,
				min_spread_width: 200.0,
				..Default::default()
			},
			..Default::default()
		};
		let mut m = DefaultViewManager::new(settings, FailingRenderer::new(), Rc::new(StaticRequest));
		m.render(Rect::new(0.0, 0.0, 200.0, 100.0));
		block_on(m.display(sections[0].clone(), None)).unwrap();
		let id = m.core().views().first().unwrap().id();
		let seen = record(m.events());

		// The right page of the next spread fails after the left one loaded
		let err = block_on(m.next()).unwrap_err();
		assert!(matches!(err, ManagerError::View(_)));
		assert_eq!(indices(&m), vec![0]);
		let cover = m.core().views().first().unwrap();
		assert_eq!(cover.id(), id);
		assert!(cover.is_displayed());
		assert_eq!(pages(&m), vec![(0, vec![1], 1)]);

		assert!(block_on(m.display(sections[1].clone(), None)).is_err());
		assert_eq!(indices(&m), vec![0]);
		assert_eq!(m.core().nav_state(), NavState::Static);
		assert!(!seen.borrow().iter().any(|e| matches!(e, ManagerEvent::Added(_))));
	}

	#[test]
	fn test_default_resize_redisplays() {
		let (mut m, sections) = manager(
			Spine::new(&[CHAPTER]),
			settings(),
			Rect::new(0.0, 0.0, 100.0, 40.0),
		);
		block_on(m.display(sections[0].clone(), None)).unwrap();
		block_on(m.next()).unwrap();
		let seen = record(m.events());

		// Two lines of 20 glyphs, "five" moves to the first page
		block_on(m.resize(Some(200.0), Some(40.0))).unwrap();
		assert_eq!(m.core().layout().geometry().width, 200.0);
		assert_eq!(pages(&m), vec![(0, vec![1], 1)]);
		block_on(m.resize(Some(200.0), Some(40.0))).unwrap();

		let resized = seen
			.borrow()
			.iter()
			.filter(|e| matches!(e, ManagerEvent::Resized { .. }))
			.count();
		assert_eq!(resized, 1);
	}

	#[test]
	fn test_default_scroll_events_and_snap() {
		let (mut m, sections) = manager(
			Spine::new(&[CHAPTER]),
			ManagerSettings {
				snap: Some(SnapSettings::default()),
				..settings()
			},
			Rect::new(0.0, 0.0, 100.0, 40.0),
		);
		block_on(m.display(sections[0].clone(), None)).unwrap();
		let seen = record(m.events());

		m.scroll_to(150.0, 0.0, false);
		assert!(m.core().has_scrolled());
		let animation = block_on(m.scrolled()).unwrap().unwrap();
		assert_eq!((animation.from, animation.to), (150.0, 200.0));

		m.scroll_to(100.0, 0.0, false);
		assert_eq!(block_on(m.scrolled()).unwrap(), None);
		assert!(!m.core().has_scrolled());

		let seen = seen.borrow();
		assert_eq!(seen[0], ManagerEvent::Scroll { left: 150.0, top: 0.0 });
		assert!(seen.contains(&ManagerEvent::Scrolled { left: 100.0, top: 0.0 }));
		assert!(matches!(
			seen.last(),
			Some(ManagerEvent::Relocated(l)) if l.start.displayed.page == 2
		));
	}
}
