use parchment::Document;
use parchment::Range;

use crate::geometry::Rect;
use crate::geometry::WritingMode;

/// Live content loaded in a frame.
///
/// Rectangles are in the frame's own coordinates, the origin being the
/// top left corner of the first column.
pub trait Contents {
	fn document(&self) -> &Document;

	/// Extent of the laid out text along the horizontal axis.
	fn text_width(&self) -> f32;

	fn text_height(&self) -> f32;

	fn scroll_width(&self) -> f32;

	fn scroll_height(&self) -> f32;

	/// Bounding box of a range, `None` when nothing of it is laid out.
	fn range_rect(&self, range: &Range) -> Option<Rect>;

	/// One rect per line fragment of a range.
	fn range_rects(&self, range: &Range) -> Vec<Rect>;

	fn columns(&mut self, width: f32, height: f32, column_width: f32, gap: f32);

	fn size(&mut self, width: Option<f32>, height: Option<f32>);

	fn fit(&mut self, width: f32, height: f32);

	fn writing_mode(&self) -> WritingMode {
		WritingMode::HorizontalTb
	}
}
