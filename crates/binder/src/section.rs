//! Narrow contracts to the package side: sections and their content.

use std::io;
use std::rc::Rc;

use parchment::Document;

#[derive(Debug, thiserror::Error)]
pub enum SectionError {
	#[error(transparent)]
	Io(#[from] io::Error),
	#[error("Resource not found: {0}")]
	NotFound(String),
	#[error("Failed to load {0}: {1}")]
	Load(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
	Text,
	Binary,
	Document,
}

pub enum Resource {
	Text(String),
	Binary(Vec<u8>),
	Document(Document),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSpread {
	Left,
	Right,
}

/// Loads resources by url, the package's request function.
#[async_trait::async_trait(?Send)]
pub trait Request {
	async fn request(&self, url: &str, kind: ResponseType) -> Result<Resource, SectionError>;
}

/// One spine item, never mutated by the engine.
#[async_trait::async_trait(?Send)]
pub trait Section {
	fn index(&self) -> usize;

	fn href(&self) -> &str;

	/// Base path every range identifier of this section is relative to.
	fn cfi_base(&self) -> &str;

	fn next(&self) -> Option<Rc<dyn Section>>;

	fn prev(&self) -> Option<Rc<dyn Section>>;

	fn spread_side(&self) -> Option<PageSpread> {
		None
	}

	/// Serialized markup of the section.
	async fn render(&self, request: &dyn Request) -> Result<String, SectionError>;
}
