//! A book unpacked into a directory, one XHTML file per spine item in
//! file name order.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use binder::section::PageSpread;
use binder::section::Request;
use binder::section::Resource;
use binder::section::ResponseType;
use binder::section::Section;
use binder::section::SectionError;
use parchment::Document;

const SECTION_EXTENSIONS: &[&str] = &["xhtml", "html", "htm"];

#[derive(Debug)]
struct Spine {
	root: PathBuf,
	items: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Book {
	spine: Rc<Spine>,
}

impl Book {
	pub fn open(root: &Path) -> Result<Self, io::Error> {
		let mut items = Vec::new();
		for entry in fs::read_dir(root)? {
			let entry = entry?;
			if !entry.file_type()?.is_file() {
				continue;
			}
			let path = entry.path();
			let is_section = path
				.extension()
				.and_then(|e| e.to_str())
				.is_some_and(|e| SECTION_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
			if is_section && let Some(name) = path.file_name().and_then(|n| n.to_str()) {
				items.push(name.to_string());
			}
		}
		items.sort();
		log::info!("Opened {} with {} sections", root.display(), items.len());
		Ok(Self {
			spine: Rc::new(Spine {
				root: root.to_path_buf(),
				items,
			}),
		})
	}

	pub fn len(&self) -> usize {
		self.spine.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.spine.items.is_empty()
	}

	pub fn section(&self, index: usize) -> Option<Rc<dyn Section>> {
		FileSection::at(&self.spine, index)
	}

	pub fn request(&self) -> Rc<dyn Request> {
		Rc::new(FileRequest {
			root: self.spine.root.clone(),
		})
	}
}

struct FileSection {
	index: usize,
	cfi_base: String,
	spine: Rc<Spine>,
}

impl FileSection {
	fn at(spine: &Rc<Spine>, index: usize) -> Option<Rc<dyn Section>> {
		if index >= spine.items.len() {
			return None;
		}
		Some(Rc::new(FileSection {
			index,
			cfi_base: format!("/6/{}", (index + 1) * 2),
			spine: spine.clone(),
		}))
	}
}

#[async_trait::async_trait(?Send)]
impl Section for FileSection {
	fn index(&self) -> usize {
		self.index
	}

	fn href(&self) -> &str {
		&self.spine.items[self.index]
	}

	fn cfi_base(&self) -> &str {
		&self.cfi_base
	}

	fn next(&self) -> Option<Rc<dyn Section>> {
		FileSection::at(&self.spine, self.index + 1)
	}

	fn prev(&self) -> Option<Rc<dyn Section>> {
		let index = self.index.checked_sub(1)?;
		FileSection::at(&self.spine, index)
	}

	/// `name.left.xhtml` and `name.right.xhtml` pin a fixed layout page to
	/// one side of its spread.
	fn spread_side(&self) -> Option<PageSpread> {
		let href = self.href();
		if href.contains(".left.") {
			Some(PageSpread::Left)
		} else if href.contains(".right.") {
			Some(PageSpread::Right)
		} else {
			None
		}
	}

	async fn render(&self, request: &dyn Request) -> Result<String, SectionError> {
		match request.request(self.href(), ResponseType::Text).await? {
			Resource::Text(markup) => Ok(markup),
			_ => Err(SectionError::Load(
				self.href().to_string(),
				"expected text".to_string(),
			)),
		}
	}
}

/// Resolves urls against the book directory.
struct FileRequest {
	root: PathBuf,
}

#[async_trait::async_trait(?Send)]
impl Request for FileRequest {
	async fn request(&self, url: &str, kind: ResponseType) -> Result<Resource, SectionError> {
		let path = self.root.join(url.split('#').next().unwrap_or(url));
		log::trace!("Request {}", path.display());
		if !path.is_file() {
			return Err(SectionError::NotFound(url.to_string()));
		}
		Ok(match kind {
			ResponseType::Text => Resource::Text(fs::read_to_string(&path)?),
			ResponseType::Binary => Resource::Binary(fs::read(&path)?),
			ResponseType::Document => Resource::Document(Document::parse(&fs::read_to_string(&path)?)),
		})
	}
}
