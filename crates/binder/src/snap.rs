//! Settles a paginated stage on page boundaries after touch gestures.

use std::time::Duration;

use serde::Deserialize;

use crate::layout::LayoutGeometry;

const DEFAULT_DURATION_MS: u64 = 80;
const DEFAULT_MIN_VELOCITY: f32 = 0.2;
const DEFAULT_MIN_DISTANCE: f32 = 10.0;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
	Linear,
	#[default]
	EaseInCubic,
	EaseOutCubic,
	EaseInOutCubic,
}

impl Easing {
	pub fn apply(self, t: f32) -> f32 {
		let t = t.clamp(0.0, 1.0);
		match self {
			Easing::Linear => t,
			Easing::EaseInCubic => t.powi(3),
			Easing::EaseOutCubic => (t - 1.0).powi(3) + 1.0,
			Easing::EaseInOutCubic => {
				if t < 0.5 {
					4.0 * t.powi(3)
				} else {
					(t - 1.0) * (2.0 * t - 2.0).powi(2) + 1.0
				}
			}
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SnapSettings {
	pub duration_ms: u64,
	/// Pixels per millisecond
	pub min_velocity: f32,
	pub min_distance: f32,
	pub easing: Easing,
}

impl Default for SnapSettings {
	fn default() -> Self {
		Self {
			duration_ms: DEFAULT_DURATION_MS,
			min_velocity: DEFAULT_MIN_VELOCITY,
			min_distance: DEFAULT_MIN_DISTANCE,
			easing: Easing::default(),
		}
	}
}

/// Scroll animation toward a page boundary, sampled by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapAnimation {
	pub from: f32,
	pub to: f32,
	pub duration: Duration,
	pub easing: Easing,
}

impl SnapAnimation {
	pub fn position_at(&self, elapsed: Duration) -> f32 {
		if self.is_finished(elapsed) {
			return self.to;
		}
		let t = elapsed.as_secs_f32() / self.duration.as_secs_f32();
		self.from + (self.to - self.from) * self.easing.apply(t)
	}

	pub fn is_finished(&self, elapsed: Duration) -> bool {
		elapsed >= self.duration
	}
}

#[derive(Debug, Clone, Copy)]
struct Touch {
	start_x: f32,
	start_t: Duration,
	end_x: f32,
	end_t: Duration,
}

#[derive(Debug)]
pub struct Snap {
	settings: SnapSettings,
	supports_touch: bool,
	snap_width: f32,
	scroll_left: f32,
	touch: Option<Touch>,
	attached: bool,
}

impl Snap {
	pub fn new(geometry: &LayoutGeometry, supports_touch: bool, settings: SnapSettings) -> Self {
		if !supports_touch {
			log::warn!("Touch input unavailable, snapping only after scroll");
		}
		let mut snap = Self {
			settings,
			supports_touch,
			snap_width: 0.0,
			scroll_left: 0.0,
			touch: None,
			attached: supports_touch,
		};
		snap.set_layout(geometry);
		snap
	}

	pub fn settings(&self) -> &SnapSettings {
		&self.settings
	}

	pub fn supports_touch(&self) -> bool {
		self.supports_touch
	}

	pub fn is_attached(&self) -> bool {
		self.attached
	}

	pub fn set_layout(&mut self, geometry: &LayoutGeometry) {
		self.snap_width = geometry.page_width * geometry.divisor as f32;
	}

	pub fn snap_width(&self) -> f32 {
		self.snap_width
	}

	pub fn scroll_left(&self) -> f32 {
		self.scroll_left
	}

	pub fn on_scroll(&mut self, left: f32) {
		self.scroll_left = left;
	}

	pub fn needs_snap(&self) -> bool {
		self.snap_width > 0.0 && self.scroll_left % self.snap_width != 0.0
	}

	pub fn touch_start(&mut self, x: f32, t: Duration) -> bool {
		if !self.attached {
			return false;
		}
		log::trace!("Snap touch start at {x}");
		self.touch = Some(Touch {
			start_x: x,
			start_t: t,
			end_x: x,
			end_t: t,
		});
		true
	}

	pub fn touch_move(&mut self, x: f32, t: Duration) -> bool {
		if let Some(touch) = self.touch.as_mut() {
			touch.end_x = x;
			touch.end_t = t;
			true
		} else {
			false
		}
	}

	/// Release the touch, settling on a page boundary when off one.
	pub fn touch_end(&mut self, x: f32, t: Duration) -> Option<SnapAnimation> {
		self.touch_move(x, t);
		let swiped = self.was_swiped();
		let touch = self.touch.take()?;
		log::trace!("Snap touch end at {}, swiped {swiped}", touch.end_x);
		if swiped != 0 {
			Some(self.snap(swiped))
		} else if self.needs_snap() {
			Some(self.snap(0))
		} else {
			None
		}
	}

	/// Scrolling settled outside of a gesture.
	pub fn scrolled(&mut self) -> Option<SnapAnimation> {
		if self.touch.is_none() && self.needs_snap() {
			Some(self.snap(0))
		} else {
			None
		}
	}

	/// -1 for a swipe toward the previous page, 1 toward the next, 0 for none.
	pub fn was_swiped(&self) -> i32 {
		let Some(touch) = self.touch else {
			return 0;
		};
		let distance = touch.end_x - touch.start_x;
		if distance.abs() <= self.settings.min_distance || distance.abs() >= self.snap_width {
			return 0;
		}
		let elapsed = touch.end_t.saturating_sub(touch.start_t).as_secs_f32() * 1000.0;
		if elapsed <= 0.0 {
			return 0;
		}
		let velocity = distance / elapsed;
		if velocity > self.settings.min_velocity {
			-1
		} else if velocity < -self.settings.min_velocity {
			1
		} else {
			0
		}
	}

	pub fn snap(&self, how_many: i32) -> SnapAnimation {
		let mut to = if self.snap_width > 0.0 {
			(self.scroll_left / self.snap_width).round() * self.snap_width
		} else {
			self.scroll_left
		};
		to += how_many as f32 * self.snap_width;
		log::debug!("Snapping from {} to {to}", self.scroll_left);
		SnapAnimation {
			from: self.scroll_left,
			to,
			duration: Duration::from_millis(self.settings.duration_ms),
			easing: self.settings.easing,
		}
	}

	pub fn destroy(&mut self) {
		self.touch = None;
		self.attached = false;
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use crate::layout::LayoutGeometry;
	use crate::snap::Easing;
	use crate::snap::Snap;
	use crate::snap::SnapSettings;

	fn geometry() -> LayoutGeometry {
		LayoutGeometry {
			width: 800.0,
			height: 600.0,
			page_width: 400.0,
			divisor: 2,
			delta: 800.0,
			..Default::default()
		}
	}

	fn ms(v: u64) -> Duration {
		Duration::from_millis(v)
	}

	fn swiped(from: f32, to: f32, elapsed: u64) -> i32 {
		let mut snap = Snap::new(&geometry(), true, SnapSettings::default());
		snap.touch_start(from, ms(0));
		snap.touch_move(to, ms(elapsed));
		snap.was_swiped()
	}

	#[test]
	fn test_snap_defaults() {
		let snap = Snap::new(&geometry(), true, SnapSettings::default());
		let s = snap.settings();
		assert_eq!(s.duration_ms, 80);
		assert_eq!(s.min_velocity, 0.2);
		assert_eq!(s.min_distance, 10.0);
		assert_eq!(s.easing, Easing::EaseInCubic);
		assert_eq!(snap.snap_width(), 800.0);
	}

	#[test]
	fn test_needs_snap() {
		let mut snap = Snap::new(&geometry(), true, SnapSettings::default());
		assert!(!snap.needs_snap());
		snap.on_scroll(100.0);
		assert!(snap.needs_snap());
		snap.on_scroll(800.0);
		assert!(!snap.needs_snap());
	}

	#[test]
	fn test_was_swiped() {
		let _ = env_logger::try_init();
		assert_eq!(swiped(100.0, 105.0, 100), 0);
		assert_eq!(swiped(100.0, 200.0, 100), -1);
		assert_eq!(swiped(200.0, 100.0, 100), 1);
		assert_eq!(swiped(100.0, 120.0, 1000), 0);
		assert_eq!(swiped(0.0, 900.0, 100), 0);
	}

	#[test]
	fn test_easing() {
		let e = Easing::EaseInCubic;
		assert_eq!(e.apply(0.0), 0.0);
		assert_eq!(e.apply(1.0), 1.0);
		assert!((e.apply(0.5) - 0.125).abs() < 1e-6);
		assert_eq!(Easing::EaseOutCubic.apply(1.0), 1.0);
		assert_eq!(Easing::EaseInOutCubic.apply(0.5), 0.5);
	}

	#[test]
	fn test_touch_end_animates() {
		let mut snap = Snap::new(&geometry(), true, SnapSettings::default());
		snap.on_scroll(800.0);
		snap.touch_start(200.0, ms(0));
		snap.touch_move(150.0, ms(50));
		let anim = snap.touch_end(100.0, ms(100)).unwrap();
		assert_eq!(anim.from, 800.0);
		assert_eq!(anim.to, 1600.0);
		assert_eq!(anim.position_at(ms(0)), 800.0);
		assert_eq!(anim.position_at(ms(40)), 900.0);
		assert_eq!(anim.position_at(ms(80)), 1600.0);
		assert!(anim.is_finished(ms(200)));

		// Slow drag settles on the nearest boundary
		snap.on_scroll(1000.0);
		snap.touch_start(100.0, ms(0));
		let anim = snap.touch_end(120.0, ms(1000)).unwrap();
		assert_eq!(anim.to, 800.0);

		snap.on_scroll(800.0);
		snap.touch_start(100.0, ms(0));
		assert!(snap.touch_end(101.0, ms(10)).is_none());
	}

	#[test]
	fn test_destroy_without_touch() {
		let mut snap = Snap::new(&geometry(), false, SnapSettings::default());
		assert!(!snap.supports_touch());
		assert!(!snap.touch_start(0.0, ms(0)));
		snap.destroy();
		snap.destroy();
		assert!(!snap.is_attached());

		snap.on_scroll(100.0);
		assert_eq!(snap.scrolled().map(|a| a.to), Some(0.0));
	}
}
