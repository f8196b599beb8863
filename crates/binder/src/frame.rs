//! The embedded document behind a rendering surface.

use crate::contents::Contents;
use crate::reading_system::ReadingSystem;

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
	#[error("Surface was destroyed")]
	Destroyed,
	#[error("Failed to load content: {0}")]
	Load(String),
}

/// Same origin isolation always applies, scripts and popups are opt in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IsolationPolicy {
	pub allow_scripts: bool,
	pub allow_popups: bool,
}

impl IsolationPolicy {
	pub fn sandbox(&self) -> String {
		let mut tokens = vec!["allow-same-origin"];
		if self.allow_scripts {
			tokens.push("allow-scripts");
		}
		if self.allow_popups {
			tokens.push("allow-popups");
		}
		tokens.join(" ")
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMethod {
	Srcdoc,
	Write,
}

#[derive(Debug, Clone)]
pub struct FrameSettings {
	pub id: String,
	pub isolation: IsolationPolicy,
	pub method: LoadMethod,
	pub reading_system: ReadingSystem,
}

/// Creates frames, one per rendering surface.
pub trait Renderer {
	fn create_frame(&self, settings: &FrameSettings) -> Box<dyn Frame>;

	fn supports_srcdoc(&self) -> bool {
		true
	}
}

pub trait Frame {
	fn load(&mut self, markup: &str) -> Result<(), SurfaceError>;

	fn contents(&self) -> Option<&dyn Contents>;

	fn contents_mut(&mut self) -> Option<&mut dyn Contents>;

	fn set_size(&mut self, width: f32, height: f32);

	fn set_visible(&mut self, visible: bool);

	fn teardown(&mut self);
}
