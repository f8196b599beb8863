//! Keeps the sections around the visible area loaded so the stage scrolls
//! through the spine as one strip.
//!
//! Views are added ahead of and behind the reader while the loaded content
//! does not reach `offset` pixels past either edge. Views that scroll out of
//! that window are destroyed and trimmed away, keeping one neighbour on
//! each side.

use std::rc::Rc;
use std::time::Duration;

use serde::Deserialize;

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
use crate::view::ViewId;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ContinuousSettings {
	/// Pixels of content kept loaded past each edge of the stage.
	pub offset: f32,
	/// Scrolling the host reports before the manager looks for more content.
	pub offset_delta: f32,
	pub after_scrolled_timeout_ms: u64,
}

impl Default for ContinuousSettings {
	fn default() -> Self {
		Self {
			offset: 500.0,
			offset_delta: 250.0,
			after_scrolled_timeout_ms: 10,
		}
	}
}

pub struct ContinuousViewManager {
	core: ManagerCore,
	settings: ContinuousSettings,
	queue: TaskQueue<Self>,
	scroll_delta: f32,
	check_pending: bool,
	trim_pending: bool,
}

impl Queued for ContinuousViewManager {
	fn queue(&mut self) -> &mut TaskQueue<Self> {
		&mut self.queue
	}
}

impl ContinuousViewManager {
	pub const NAME: &'static str = "continuous";

	pub fn new(
		settings: ManagerSettings,
		continuous: ContinuousSettings,
		renderer: Rc<dyn Renderer>,
		request: Rc<dyn Request>,
	) -> Self {
		Self {
			core: ManagerCore::new(settings, renderer, request, false),
			settings: continuous,
			queue: TaskQueue::default(),
			scroll_delta: 0.0,
			check_pending: false,
			trim_pending: false,
		}
	}

	pub fn continuous_settings(&self) -> &ContinuousSettings {
		&self.settings
	}

	/// How long the host should wait after the last scroll before calling
	/// `scrolled`.
	pub fn after_scrolled_timeout(&self) -> Duration {
		Duration::from_millis(self.settings.after_scrolled_timeout_ms)
	}

	pub async fn flush(&mut self) -> usize {
		TaskQueue::flush(self).await
	}

	/// Relative move, the stage starts at the displayed section.
	fn move_by(core: &mut ManagerCore, offset: Point) {
		let mut distance = Point::default();
		if !core.paginated {
			distance.top = offset.top;
		} else {
			let delta = core.layout.geometry().delta;
			if delta > 0.0 {
				distance.left = (offset.left / delta).floor() * delta;
			}
		}
		if distance.left > 0.0 || distance.top > 0.0 {
			core.scroll_by(distance.left, distance.top, true);
		}
	}

	async fn display_now(
		&mut self,
		section: Rc<dyn Section>,
		target: Option<DisplayTarget>,
	) -> Result<(), ManagerError> {
		self.core
			.display_section(section, target, Self::move_by)
			.await?;
		self.check().await?;
		self.core.report_location();
		Ok(())
	}

	/// Load neighbours until the window around the stage is covered, then
	/// update which views stay alive.
	async fn check(&mut self) -> Result<(), ManagerError> {
		while self.extend().await? {}
		self.update().await
	}

	/// Add at most one view at each end, true when something was added.
	async fn extend(&mut self) -> Result<bool, ManagerError> {
		let core = &mut self.core;
		let delta = self.settings.offset;
		let horizontal = core.axis == Axis::Horizontal;
		let bounds = core.stage.bounds();
		let (mut offset, visible, content) = if horizontal {
			(
				core.stage.scroll_left(),
				bounds.width.floor(),
				core.stage.scroll_width(),
			)
		} else {
			(
				core.stage.scroll_top(),
				bounds.height,
				core.stage.scroll_height(),
			)
		};
		if horizontal && core.direction() == Direction::Rtl {
			offset = -offset;
		}

		let mut added = false;
		if offset + visible + delta >= content
			&& let Some(next) = core.views.last().and_then(|v| v.section().next())
			&& let Ok(fetched) = core.fetch_one(next).await
		{
			core.add(fetched, Placement::Append)?;
			added = true;
		}
		if offset - delta < 0.0
			&& let Some(prev) = core.views.first().and_then(|v| v.section().prev())
			&& let Ok(fetched) = core.fetch_one(prev).await
		{
			core.add(fetched, Placement::Prepend)?;
			added = true;
		}
		Ok(added)
	}

	/// Show views inside the window, bring back destroyed ones that
	/// scrolled into it and queue the rest for destruction.
	async fn update(&mut self) -> Result<(), ManagerError> {
		let offset = self.settings.offset;
		let core = &mut self.core;
		let bounds = core.stage.bounds();
		let mut shown = Vec::new();
		let mut stale = Vec::new();
		let mut leaving = Vec::new();
		for view in core.views.iter() {
			let inside = core.is_visible(view, offset, offset, bounds);
			if inside && view.is_displayed() {
				shown.push(view.id());
			} else if inside && view.is_destroyed() {
				stale.push((view.id(), view.section().clone()));
			} else if !inside && view.is_displayed() {
				leaving.push(view.id());
			}
		}

		for (id, section) in stale {
			if let Ok(fetched) = core.fetch_one(section).await {
				core.redisplay(id, fetched)?;
			}
		}
		for id in shown {
			if let Some(view) = core.views.by_id_mut(id) {
				view.show();
			}
		}

		if leaving.is_empty() {
			return Ok(());
		}
		log::trace!("{} views left the window", leaving.len());
		for id in leaving {
			self.queue.enqueue_sync(move |m: &mut Self| m.release(id));
		}
		if !self.trim_pending {
			self.trim_pending = true;
			self.queue.enqueue_sync(|m: &mut Self| m.trim());
		}
		Ok(())
	}

	fn release(&mut self, id: ViewId) {
		if let Some(view) = self.core.views.by_id_mut(id) {
			view.destroy();
		}
	}

	/// Erase destroyed views beyond the nearest one on each side of the
	/// displayed run.
	fn trim(&mut self) {
		self.trim_pending = false;
		let core = &mut self.core;
		let displayed: Vec<usize> = core
			.views
			.iter()
			.enumerate()
			.filter(|(_, v)| v.is_displayed())
			.map(|(i, _)| i)
			.collect();
		let (Some(&first), Some(&last)) = (displayed.first(), displayed.last()) else {
			return;
		};
		let ids = core.views.ids();
		let above = &ids[..first];
		let below = &ids[last + 1..];
		for id in &above[..above.len().saturating_sub(1)] {
			core.erase(*id, true);
		}
		for id in below.iter().skip(1) {
			core.erase(*id, false);
		}
	}

	fn step(&self) -> f32 {
		let g = self.core.layout.geometry();
		if g.is_pre_paginated() && g.spread {
			g.delta * 2.0
		} else {
			g.delta
		}
	}

	async fn turn(&mut self, forward: bool) -> Result<bool, ManagerError> {
		if self.core.views.is_empty() {
			return Ok(false);
		}
		let sign = if forward { 1.0 } else { -1.0 };
		if self.core.paginated && self.core.axis == Axis::Horizontal {
			let delta = self.step();
			self.core.scroll_by(sign * delta, 0.0, true);
		} else {
			let height = self.core.layout.geometry().height;
			self.core.scroll_by(0.0, sign * height, true);
		}
		self.check().await?;
		self.core.report_location();
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
impl ViewManager for ContinuousViewManager {
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
		self.core.render(element, Overflow::Scroll);
	}

	async fn display(
		&mut self,
		section: Rc<dyn Section>,
		target: Option<DisplayTarget>,
	) -> Result<(), ManagerError> {
		serialized(self, move |m: &mut Self| Box::pin(m.display_now(section, target))).await
	}

	async fn next(&mut self) -> Result<bool, ManagerError> {
		serialized(self, |m: &mut Self| Box::pin(m.turn(true))).await
	}

	async fn prev(&mut self) -> Result<bool, ManagerError> {
		serialized(self, |m: &mut Self| Box::pin(m.turn(false))).await
	}

	async fn resize(&mut self, width: Option<f32>, height: Option<f32>) -> Result<(), ManagerError> {
		serialized(self, move |m: &mut Self| Box::pin(m.resize_now(width, height))).await
	}

	async fn scrolled(&mut self) -> Result<Option<SnapAnimation>, ManagerError> {
		self.scroll_delta = 0.0;
		serialized(self, |m: &mut Self| Box::pin(m.check())).await?;
		Ok(self.core.settle())
	}

	fn on_scroll(&mut self, left: f32, top: f32) {
		let before = (self.core.stage.scroll_left(), self.core.stage.scroll_top());
		self.core.on_scroll(left, top);
		let after = (self.core.stage.scroll_left(), self.core.stage.scroll_top());
		self.scroll_delta += (after.0 - before.0).abs() + (after.1 - before.1).abs();
		if self.scroll_delta < self.settings.offset_delta || self.check_pending {
			return;
		}
		self.scroll_delta = 0.0;
		self.check_pending = true;
		self.queue.enqueue::<_, ()>(|m: &mut Self| {
			Box::pin(async move {
				m.check_pending = false;
				if let Err(e) = m.check().await {
					log::warn!("Failed to load around scroll position: {e}");
				}
			})
		});
	}

	fn move_to(&mut self, offset: Point) {
		Self::move_by(&mut self.core, offset);
	}

	fn update_flow(&mut self, flow: Flow) {
		self.core.update_flow(flow, Overflow::Scroll);
	}

	fn destroy(&mut self) {
		self.queue.stop();
		self.check_pending = false;
		self.trim_pending = false;
		self.core.destroy();
	}
}

#[cfg(test)]
mod tests {
	use std::rc::Rc;

	use pollster::block_on;

	use crate::geometry::Rect;
	use crate::headless::tests::Spine;
	use crate::headless::tests::StaticRequest;
	use crate::headless::tests::chapter;
	use crate::layout::Flow;
	use crate::layout::LayoutSettings;
	use crate::layout::Spread;
	use crate::managers::ManagerEvent;
	use crate::managers::ManagerSettings;
	use crate::managers::ViewManager;
	use crate::managers::continuous::ContinuousSettings;
	use crate::managers::continuous::ContinuousViewManager;
	use crate::managers::tests::record;
	use crate::managers::tests::renderer;
	use crate::section::Section;

	fn manager(chapters: usize) -> (ContinuousViewManager, Vec<Rc<dyn Section>>) {
		// Each chapter is four 20px lines tall
		let text = chapter(2, 4);
		let texts = vec![text.as_str(); chapters];
		let sections = Spine::new(&texts).into_sections();
		let settings = ManagerSettings {
			layout: LayoutSettings {
				flow: Flow::Scrolled,
				spread: Spread::None,
				..Default::default()
			},
			..Default::default()
		};
		let continuous = ContinuousSettings {
			offset: 50.0,
			offset_delta: 25.0,
			..Default::default()
		};
		let mut m = ContinuousViewManager::new(
			settings,
			continuous,
			renderer(),
			Rc::new(StaticRequest),
		);
		m.render(Rect::new(0.0, 0.0, 100.0, 100.0));
		(m, sections)
	}

	fn indices(m: &ContinuousViewManager) -> Vec<usize> {
		m.core().views().iter().map(|v| v.index()).collect()
	}

	#[test]
	fn test_continuous_defaults() {
		let settings = ContinuousSettings::default();
		assert_eq!(settings.offset, 500.0);
		assert_eq!(settings.offset_delta, 250.0);
		let (m, _) = manager(1);
		assert_eq!(m.name(), "continuous");
		assert_eq!(m.after_scrolled_timeout().as_millis(), 10);
	}

	#[test]
	fn test_continuous_fills_around_display() {
		let _ = env_logger::try_init();
		let (mut m, sections) = manager(6);
		let seen = record(m.events());
		block_on(m.display(sections[2].clone(), None)).unwrap();

		assert_eq!(indices(&m), vec![1, 2, 3]);
		// The prepended chapter pushed the stage down by its height
		assert_eq!(m.core().stage().scroll_top(), 80.0);
		assert_eq!(m.core().stage().scroll_height(), 240.0);

		let located = m.current_location();
		assert_eq!(located.len(), 2);
		assert_eq!(located[0].index, 2);
		assert_eq!(located[0].pages, vec![1]);
		let location = m.location().unwrap();
		assert_eq!((location.start.index, location.end.index), (2, 3));
		assert!(!location.at_start);

		let seen = seen.borrow();
		for index in [1, 2, 3] {
			assert!(seen.contains(&ManagerEvent::Added(index)));
		}
	}

	#[test]
	fn test_continuous_next_trims_behind() {
		let _ = env_logger::try_init();
		let (mut m, sections) = manager(6);
		block_on(m.display(sections[2].clone(), None)).unwrap();

		assert!(block_on(m.next()).unwrap());
		assert_eq!(m.core().stage().scroll_top(), 140.0);
		assert_eq!(indices(&m), vec![1, 2, 3, 4]);
		let first = m.core().views().first().unwrap();
		assert!(first.is_destroyed());
		// The destroyed view keeps its place
		assert_eq!(first.height(), 80.0);
		assert_eq!(m.core().views().get(1).unwrap().offset().top, 80.0);

		assert!(block_on(m.next()).unwrap());
		assert_eq!(m.core().views().first().unwrap().index(), 2);
		assert!(m.core().views().iter().skip(1).all(|v| v.is_displayed()));
	}

	#[test]
	fn test_continuous_scroll_back_redisplays() {
		let (mut m, sections) = manager(6);
		block_on(m.display(sections[2].clone(), None)).unwrap();
		block_on(m.next()).unwrap();
		assert!(m.core().views().first().unwrap().is_destroyed());

		m.on_scroll(0.0, 20.0);
		assert!(block_on(m.scrolled()).unwrap().is_none());
		let first = m.core().views().first().unwrap();
		assert_eq!(first.index(), 0);
		assert!(first.is_displayed());
		assert!(m.core().views().iter().any(|v| v.index() == 1 && v.is_displayed()));
	}

	#[test]
	fn test_continuous_without_views() {
		let (mut m, sections) = manager(1);
		assert!(!block_on(m.next()).unwrap());
		assert!(!block_on(m.prev()).unwrap());

		block_on(m.display(sections[0].clone(), None)).unwrap();
		assert_eq!(indices(&m), vec![0]);
		assert!(m.location().unwrap().at_start);

		m.destroy();
		assert!(block_on(m.next()).is_err());
	}
}
