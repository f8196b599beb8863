use crate::layout::Flow;

bitflags::bitflags! {
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct Features: u8 {
		const DOM_MANIPULATION = 0b0000_0001;
		const LAYOUT_CHANGES   = 0b0000_0010;
		const TOUCH_EVENTS     = 0b0000_0100;
		const MOUSE_EVENTS     = 0b0000_1000;
		const KEYBOARD_EVENTS  = 0b0001_0000;
		const SPINE_SCRIPTING  = 0b0010_0000;
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutStyle {
	Paginated,
	Scrolling,
}

/// Capabilities declared to content scripts, injected into each frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingSystem {
	pub name: String,
	pub version: String,
	pub layout_style: LayoutStyle,
	pub features: Features,
}

impl ReadingSystem {
	pub fn new(flow: Flow) -> Self {
		Self {
			name: env!("CARGO_PKG_NAME").to_string(),
			version: env!("CARGO_PKG_VERSION").to_string(),
			layout_style: match flow {
				Flow::Paginated => LayoutStyle::Paginated,
				Flow::Scrolled => LayoutStyle::Scrolling,
			},
			features: Features::DOM_MANIPULATION
				| Features::LAYOUT_CHANGES
				| Features::TOUCH_EVENTS
				| Features::MOUSE_EVENTS
				| Features::KEYBOARD_EVENTS,
		}
	}

	pub fn has_feature(&self, feature: &str) -> bool {
		let flag = match feature {
			"dom-manipulation" => Features::DOM_MANIPULATION,
			"layout-changes" => Features::LAYOUT_CHANGES,
			"touch-events" => Features::TOUCH_EVENTS,
			"mouse-events" => Features::MOUSE_EVENTS,
			"keyboard-events" => Features::KEYBOARD_EVENTS,
			"spine-scripting" => Features::SPINE_SCRIPTING,
			_ => return false,
		};
		self.features.contains(flag)
	}
}
