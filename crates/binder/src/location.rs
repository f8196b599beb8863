//! Where the reader is, per view and overall.

use parchment::Cfi;

use crate::mapping::PageRange;

/// Visible part of one view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewLocation {
	pub index: usize,
	pub href: String,
	/// One based page numbers within the section
	pub pages: Vec<u32>,
	pub total_pages: u32,
	pub mapping: Option<PageRange>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Displayed {
	pub page: u32,
	pub total: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationPoint {
	pub index: usize,
	pub href: String,
	pub cfi: Option<Cfi>,
	pub displayed: Displayed,
	/// Progress through the book, unknown until a locations index is given.
	pub percentage: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
	pub start: LocationPoint,
	pub end: LocationPoint,
	pub at_start: bool,
	pub at_end: bool,
}

impl Location {
	/// Combine the visible views, first to last. `first_section` and
	/// `last_section` tell whether those views show the ends of the spine.
	pub fn from_located(
		located: &[ViewLocation],
		first_section: bool,
		last_section: bool,
	) -> Option<Location> {
		let first = located.first()?;
		let last = located.last()?;
		let start = LocationPoint {
			index: first.index,
			href: first.href.clone(),
			cfi: first.mapping.as_ref().map(|m| m.start.clone()),
			displayed: Displayed {
				page: first.pages.first().copied().unwrap_or(1),
				total: first.total_pages,
			},
			percentage: None,
		};
		let end = LocationPoint {
			index: last.index,
			href: last.href.clone(),
			cfi: last.mapping.as_ref().map(|m| m.end.clone()),
			displayed: Displayed {
				page: last.pages.last().copied().unwrap_or(1),
				total: last.total_pages,
			},
			percentage: None,
		};
		Some(Location {
			at_start: first_section && start.displayed.page == 1,
			at_end: last_section && end.displayed.page >= end.displayed.total,
			start,
			end,
		})
	}

	/// Fill in progress for both ends from a locations index.
	pub fn with_percentages(mut self, percentage_of: impl Fn(&Cfi) -> Option<f32>) -> Self {
		for point in [&mut self.start, &mut self.end] {
			point.percentage = point.cfi.as_ref().and_then(&percentage_of);
		}
		self
	}
}
