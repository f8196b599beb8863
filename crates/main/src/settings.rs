use std::path::PathBuf;

use binder::ContinuousSettings;
use binder::ManagerSettings;
use binder::headless::Metrics;
use serde::Deserialize;

pub(crate) const DEFAULT_CONFIG: &str = r#"
[book]
path = "~/Documents/folio"
start = 0

[viewport]
width = 600.0
height = 800.0

[reader]
manager = "default"
turns = 12

[metrics]
glyph_width = 8.0
line_height = 16.0

[manager.layout]
flow = "paginated"
spread = "auto"
"#;

#[derive(Debug, Deserialize)]
pub(crate) struct Book {
	/// Directory holding the book's XHTML sections.
	pub(crate) path: PathBuf,
	pub(crate) start: usize,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct Viewport {
	pub(crate) width: f32,
	pub(crate) height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ManagerKind {
	Default,
	Continuous,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Reader {
	pub(crate) manager: ManagerKind,
	/// Page turns before the demo stops.
	pub(crate) turns: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Settings {
	pub(crate) book: Book,
	pub(crate) viewport: Viewport,
	pub(crate) reader: Reader,
	pub(crate) metrics: Metrics,
	#[serde(default)]
	pub(crate) manager: ManagerSettings,
	#[serde(default)]
	pub(crate) continuous: ContinuousSettings,
}

#[cfg(test)]
mod tests {
	use binder::layout::Flow;

	use crate::settings::DEFAULT_CONFIG;
	use crate::settings::ManagerKind;
	use crate::settings::Settings;

	fn load(overrides: &str) -> Settings {
		config::Config::builder()
			.add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
			.add_source(config::File::from_str(overrides, config::FileFormat::Toml))
			.build()
			.unwrap()
			.try_deserialize()
			.unwrap()
	}

	#[test]
	fn test_default_config() {
		let _ = env_logger::try_init();
		let settings = load("");
		assert_eq!(settings.reader.manager, ManagerKind::Default);
		assert_eq!(settings.viewport.width, 600.0);
		assert_eq!(settings.metrics.line_height, 16.0);
		assert_eq!(settings.manager.layout.flow, Flow::Paginated);
		assert_eq!(settings.continuous.offset, 500.0);
	}

	#[test]
	fn test_config_overrides() {
		let settings = load(
			r#"
			[reader]
			manager = "continuous"
			[manager.layout]
			flow = "scrolled-doc"
			[continuous]
			offset = 200.0
			"#,
		);
		assert_eq!(settings.reader.manager, ManagerKind::Continuous);
		assert_eq!(settings.reader.turns, 12);
		assert_eq!(settings.manager.layout.flow, Flow::Scrolled);
		assert_eq!(settings.manager.layout.spread, binder::layout::Spread::Auto);
		assert_eq!(settings.continuous.offset, 200.0);
		assert_eq!(settings.continuous.offset_delta, 250.0);
	}
}
