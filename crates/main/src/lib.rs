pub mod book;
mod settings;

use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use binder::ContinuousViewManager;
use binder::DefaultViewManager;
use binder::ManagerError;
use binder::ManagerEvent;
use binder::ViewManager;
use binder::geometry::Rect;
use binder::headless::HeadlessRenderer;
use expand_tilde::expand_tilde_owned;

use crate::book::Book;
use crate::settings::ManagerKind;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] io::Error),
	#[error(transparent)]
	Config(#[from] config::ConfigError),
	#[error(transparent)]
	ExpandTilde(#[from] expand_tilde::Error),
	#[error(transparent)]
	Manager(#[from] ManagerError),
	#[error("Book has no section {0}")]
	NoSection(usize),
}

fn load_settings(book_path: Option<PathBuf>) -> Result<settings::Settings, Error> {
	let mut builder = config::Config::builder().add_source(config::File::from_str(
		settings::DEFAULT_CONFIG,
		config::FileFormat::Toml,
	));
	if let Some(path) = xdg::BaseDirectories::with_prefix("folio").find_config_file("config.toml") {
		log::debug!("Reading config from {}", path.display());
		builder = builder.add_source(config::File::from(path).required(false));
	}
	let mut settings: settings::Settings = builder
		.add_source(config::Environment::with_prefix("FOLIO").separator("_"))
		.build()?
		.try_deserialize()?;
	if let Some(path) = book_path {
		settings.book.path = path;
	}
	settings.book.path = expand_tilde_owned(settings.book.path)?;
	Ok(settings)
}

/// Open the book, display its start section and page through it, logging
/// every relocation.
pub fn start(book_path: Option<PathBuf>) -> Result<(), Error> {
	let settings = load_settings(book_path)?;
	log::info!("Starting with {:?}", settings);
	run(settings)
}

fn run(settings: settings::Settings) -> Result<(), Error> {
	let book = Book::open(&settings.book.path)?;
	let section = book
		.section(settings.book.start)
		.ok_or(Error::NoSection(settings.book.start))?;
	let renderer = Rc::new(HeadlessRenderer::new(settings.metrics));

	let mut manager: Box<dyn ViewManager> = match settings.reader.manager {
		ManagerKind::Default => Box::new(DefaultViewManager::new(
			settings.manager.clone(),
			renderer,
			book.request(),
		)),
		ManagerKind::Continuous => Box::new(ContinuousViewManager::new(
			settings.manager.clone(),
			settings.continuous,
			renderer,
			book.request(),
		)),
	};
	manager.events().on(|event| match event {
		ManagerEvent::Relocated(location) => log::info!(
			"At {} page {}/{} to {} page {}/{}",
			location.start.href,
			location.start.displayed.page,
			location.start.displayed.total,
			location.end.href,
			location.end.displayed.page,
			location.end.displayed.total,
		),
		ManagerEvent::Resized { width, height } => log::debug!("Resized to {width}x{height}"),
		_ => {}
	});

	let viewport = settings.viewport;
	manager.render(Rect::new(0.0, 0.0, viewport.width, viewport.height));
	log::info!("Rendering with {} manager", manager.name());

	pollster::block_on(async {
		manager.display(section, None).await?;
		for turn in 0..settings.reader.turns {
			if !manager.next().await? {
				log::info!("Reached the end after {turn} turns");
				break;
			}
		}
		if let Some(location) = manager.location() {
			log::info!(
				"Stopped in {} at {:?}",
				location.end.href,
				location.end.cfi.map(|c| c.to_string())
			);
		}
		Ok::<(), ManagerError>(())
	})?;

	manager.destroy();
	Ok(())
}
