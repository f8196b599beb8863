use parchment::CfiError;

use crate::frame::SurfaceError;
use crate::queue::QueueError;
use crate::section::SectionError;
use crate::view::ViewError;

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
	#[error(transparent)]
	View(#[from] ViewError),
	#[error(transparent)]
	Section(#[from] SectionError),
	#[error(transparent)]
	Surface(#[from] SurfaceError),
	#[error(transparent)]
	Queue(#[from] QueueError),
	#[error(transparent)]
	Cfi(#[from] CfiError),
	#[error("Manager is not rendered")]
	NotRendered,
}
