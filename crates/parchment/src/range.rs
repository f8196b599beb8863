use crate::tree::Document;
use crate::tree::NodeId;

/// A point in a document: a char offset inside a text node, or a child
/// index inside an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Boundary {
	pub node: NodeId,
	pub offset: usize,
}

impl Boundary {
	pub fn new(node: NodeId, offset: usize) -> Self {
		Self { node, offset }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
	pub start: Boundary,
	pub end: Boundary,
}

impl Range {
	pub fn new(start: Boundary, end: Boundary) -> Self {
		Self { start, end }
	}

	pub fn collapsed(at: Boundary) -> Self {
		Self { start: at, end: at }
	}

	pub fn select_node_contents(doc: &Document, node: NodeId) -> Self {
		Self {
			start: Boundary::new(node, 0),
			end: Boundary::new(node, doc.node_len(node)),
		}
	}

	/// Span `[start, end)` chars of a text node.
	pub fn text_span(node: NodeId, start: usize, end: usize) -> Self {
		Self {
			start: Boundary::new(node, start),
			end: Boundary::new(node, end.max(start)),
		}
	}

	pub fn collapse(&mut self, to_start: bool) {
		if to_start {
			self.end = self.start;
		} else {
			self.start = self.end;
		}
	}

	pub fn is_collapsed(&self) -> bool {
		self.start == self.end
	}
}

#[cfg(test)]
mod tests {
	use crate::range::Boundary;
	use crate::range::Range;
	use crate::tree::Document;

	#[test]
	fn test_range_collapse() {
		let doc = Document::parse("<p>hello world</p>");
		let text = doc.text_nodes(doc.body().unwrap()).next().unwrap();

		let full = Range::select_node_contents(&doc, text);
		assert_eq!(full.end, Boundary::new(text, 11));
		assert!(!full.is_collapsed());

		let mut start = full;
		start.collapse(true);
		assert!(start.is_collapsed());
		assert_eq!(start.start.offset, 0);

		let mut end = full;
		end.collapse(false);
		assert!(end.is_collapsed());
		assert_eq!(end.start.offset, 11);
	}
}
