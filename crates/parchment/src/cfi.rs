//! Canonical fragment identifiers.
//!
//! A [`Cfi`] addresses a point or an extent inside one section of a larger
//! document: `epubcfi(<base>!<path>)` for points and
//! `epubcfi(<base>!<path>,<start>,<end>)` for ranges. Element steps are even,
//! text runs odd, and the terminal `:n` is a char offset.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::range::Boundary;
use crate::range::Range;
use crate::tree::Document;
use crate::tree::NodeId;

const PREFIX: &str = "epubcfi(";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CfiError {
	#[error("Malformed range identifier: {0}")]
	Malformed(String),
	#[error("Step {0} does not resolve in document")]
	MissingStep(usize),
	#[error("Document has no root element")]
	NoDocumentElement,
	#[error("Node is not attached below the document element")]
	Detached,
	#[error("Points belong to different sections: {0} and {1}")]
	BaseMismatch(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Step {
	pub index: usize,
	pub id: Option<String>,
}

impl Step {
	pub fn is_text(&self) -> bool {
		self.index % 2 == 1
	}
}

/// Run of steps with an optional terminal offset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Segment {
	pub steps: Vec<Step>,
	pub offset: Option<usize>,
}

impl Segment {
	pub fn is_empty(&self) -> bool {
		self.steps.is_empty() && self.offset.is_none()
	}

	fn joined(&self, tail: &Segment) -> Segment {
		let mut steps = self.steps.clone();
		steps.extend(tail.steps.iter().cloned());
		let offset = if tail.steps.is_empty() {
			tail.offset.or(self.offset)
		} else {
			tail.offset
		};
		Segment { steps, offset }
	}

	fn parse(input: &str) -> Result<Segment, CfiError> {
		let malformed = || CfiError::Malformed(input.to_string());
		let mut steps = Vec::new();
		let mut offset = None;
		let mut chars = input.chars().peekable();
		while let Some(c) = chars.next() {
			match c {
				'/' if offset.is_none() => {
					let index = read_number(&mut chars).ok_or_else(malformed)?;
					let id = read_assertion(&mut chars)?;
					steps.push(Step { index, id });
				}
				':' if offset.is_none() => {
					offset = Some(read_number(&mut chars).ok_or_else(malformed)?);
					// Text location assertions are not checked
					read_assertion(&mut chars)?;
				}
				// Temporal and spatial offsets are not addressed
				'~' | '@' => break,
				_ => return Err(malformed()),
			}
		}
		Ok(Segment { steps, offset })
	}
}

fn read_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<usize> {
	let mut digits = String::new();
	while let Some(c) = chars.peek().filter(|c| c.is_ascii_digit()) {
		digits.push(*c);
		chars.next();
	}
	digits.parse().ok()
}

fn read_assertion(
	chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> Result<Option<String>, CfiError> {
	if chars.peek() != Some(&'[') {
		return Ok(None);
	}
	chars.next();
	let mut value = String::new();
	loop {
		match chars.next() {
			Some('^') => match chars.next() {
				Some(c) => value.push(c),
				None => return Err(CfiError::Malformed(value)),
			},
			Some(']') => return Ok(Some(value)),
			Some(c) => value.push(c),
			None => return Err(CfiError::Malformed(value)),
		}
	}
}

fn escape(value: &str) -> String {
	value
		.chars()
		.flat_map(|c| match c {
			'[' | ']' | '^' | ',' | '(' | ')' | ';' => vec!['^', c],
			c => vec![c],
		})
		.collect()
}

impl fmt::Display for Segment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for step in &self.steps {
			write!(f, "/{}", step.index)?;
			if let Some(id) = &step.id {
				write!(f, "[{}]", escape(id))?;
			}
		}
		if let Some(offset) = self.offset {
			write!(f, ":{offset}")?;
		}
		Ok(())
	}
}

/// Split on `sep` outside of bracketed assertions.
fn split_top(input: &str, sep: char) -> Vec<&str> {
	let mut parts = Vec::new();
	let mut depth = 0;
	let mut escaped = false;
	let mut last = 0;
	for (i, c) in input.char_indices() {
		if escaped {
			escaped = false;
			continue;
		}
		match c {
			'^' => escaped = true,
			'[' => depth += 1,
			']' => depth -= 1,
			c if c == sep && depth == 0 => {
				parts.push(&input[last..i]);
				last = i + c.len_utf8();
			}
			_ => {}
		}
	}
	parts.push(&input[last..]);
	parts
}

fn cmp_segments(a: &Segment, b: &Segment) -> Ordering {
	let steps_a = a.steps.iter().map(|s| s.index);
	let steps_b = b.steps.iter().map(|s| s.index);
	steps_a.cmp(steps_b).then_with(|| a.offset.cmp(&b.offset))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cfi {
	base: Segment,
	path: Segment,
	range: Option<(Segment, Segment)>,
}

impl Cfi {
	pub fn is_cfi(input: &str) -> bool {
		let input = input.trim();
		input.starts_with(PREFIX) && input.ends_with(')')
	}

	pub fn parse(input: &str) -> Result<Cfi, CfiError> {
		let malformed = || CfiError::Malformed(input.to_string());
		let inner = input
			.trim()
			.strip_prefix(PREFIX)
			.and_then(|rest| rest.strip_suffix(')'))
			.ok_or_else(malformed)?;

		let parts = split_top(inner, ',');
		let (head, range) = match parts.as_slice() {
			[head] => (*head, None),
			[head, start, end] => (
				*head,
				Some((Segment::parse(start)?, Segment::parse(end)?)),
			),
			_ => return Err(malformed()),
		};
		let (base, path) = match split_top(head, '!').as_slice() {
			[path] => (Segment::default(), Segment::parse(path)?),
			[base, path] => (Segment::parse(base)?, Segment::parse(path)?),
			_ => return Err(malformed()),
		};
		if path.is_empty() && range.is_none() {
			return Err(malformed());
		}
		Ok(Cfi { base, path, range })
	}

	pub fn base(&self) -> &Segment {
		&self.base
	}

	pub fn path(&self) -> &Segment {
		&self.path
	}

	pub fn is_range(&self) -> bool {
		self.range.is_some()
	}

	/// Spine index encoded by the last base step.
	pub fn spine_position(&self) -> Option<usize> {
		let step = self.base.steps.last()?;
		if step.is_text() {
			return None;
		}
		(step.index / 2).checked_sub(1)
	}

	fn point(&self, start: bool) -> Segment {
		match &self.range {
			Some((s, _)) if start => self.path.joined(s),
			Some((_, e)) => self.path.joined(e),
			None => self.path.clone(),
		}
	}

	pub fn collapse(&mut self, to_start: bool) {
		if self.range.is_some() {
			self.path = self.point(to_start);
			self.range = None;
		}
	}

	pub fn start(&self) -> Cfi {
		let mut cfi = self.clone();
		cfi.collapse(true);
		cfi
	}

	pub fn end(&self) -> Cfi {
		let mut cfi = self.clone();
		cfi.collapse(false);
		cfi
	}

	fn from_points(base: Segment, a: Segment, b: Segment) -> Cfi {
		if a == b {
			return Cfi {
				base,
				path: a,
				range: None,
			};
		}
		let mut common = 0;
		while common + 1 < a.steps.len()
			&& common + 1 < b.steps.len()
			&& a.steps[common] == b.steps[common]
		{
			common += 1;
		}
		let path = Segment {
			steps: a.steps[..common].to_vec(),
			offset: None,
		};
		let start = Segment {
			steps: a.steps[common..].to_vec(),
			offset: a.offset,
		};
		let end = Segment {
			steps: b.steps[common..].to_vec(),
			offset: b.offset,
		};
		Cfi {
			base,
			path,
			range: Some((start, end)),
		}
	}

	pub fn from_point(doc: &Document, at: Boundary, base: &str) -> Result<Cfi, CfiError> {
		let base = Segment::parse(base)?;
		let path = boundary_segment(doc, at)?;
		Ok(Cfi {
			base,
			path,
			range: None,
		})
	}

	pub fn from_range(doc: &Document, range: &Range, base: &str) -> Result<Cfi, CfiError> {
		let base = Segment::parse(base)?;
		let start = boundary_segment(doc, range.start)?;
		if range.is_collapsed() {
			return Ok(Cfi {
				base,
				path: start,
				range: None,
			});
		}
		let end = boundary_segment(doc, range.end)?;
		Ok(Cfi::from_points(base, start, end))
	}

	/// Rebuild an extent from two collapsed points of the same section.
	pub fn from_pair(start: &Cfi, end: &Cfi) -> Result<Cfi, CfiError> {
		if start.base != end.base {
			return Err(CfiError::BaseMismatch(start.to_string(), end.to_string()));
		}
		Ok(Cfi::from_points(
			start.base.clone(),
			start.point(true),
			end.point(false),
		))
	}

	pub fn to_range(&self, doc: &Document) -> Result<Range, CfiError> {
		let root = doc.document_element().ok_or(CfiError::NoDocumentElement)?;
		let parent = resolve_steps(doc, root, &self.path.steps, 0)?;
		match &self.range {
			None => Ok(Range::collapsed(boundary_at(doc, parent, self.path.offset))),
			Some((start, end)) => {
				let depth = self.path.steps.len();
				let s = resolve_steps(doc, parent, &start.steps, depth)?;
				let e = resolve_steps(doc, parent, &end.steps, depth)?;
				Ok(Range::new(
					boundary_at(doc, s, start.offset),
					boundary_at(doc, e, end.offset),
				))
			}
		}
	}
}

impl fmt::Display for Cfi {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{PREFIX}")?;
		if !self.base.is_empty() {
			write!(f, "{}!", self.base)?;
		}
		write!(f, "{}", self.path)?;
		if let Some((start, end)) = &self.range {
			write!(f, ",{start},{end}")?;
		}
		write!(f, ")")
	}
}

impl FromStr for Cfi {
	type Err = CfiError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Cfi::parse(s)
	}
}

impl PartialOrd for Cfi {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Cfi {
	fn cmp(&self, other: &Self) -> Ordering {
		cmp_segments(&self.base, &other.base)
			.then_with(|| cmp_segments(&self.point(true), &other.point(true)))
			.then_with(|| cmp_segments(&self.point(false), &other.point(false)))
			.then_with(|| self.to_string().cmp(&other.to_string()))
	}
}

fn node_steps(doc: &Document, node: NodeId) -> Result<Vec<Step>, CfiError> {
	let root = doc.document_element().ok_or(CfiError::NoDocumentElement)?;
	let mut steps = Vec::new();
	let mut current = node;
	while current != root {
		let parent = doc.parent(current).ok_or(CfiError::Detached)?;
		let elements_before = doc
			.children(parent)
			.take_while(|c| *c != current)
			.filter(|c| doc.is_element(*c))
			.count();
		let step = if doc.is_text(current) {
			Step {
				index: elements_before * 2 + 1,
				id: None,
			}
		} else {
			Step {
				index: (elements_before + 1) * 2,
				id: doc.attr(current, "id").map(String::from),
			}
		};
		steps.push(step);
		current = parent;
	}
	steps.reverse();
	Ok(steps)
}

fn boundary_segment(doc: &Document, at: Boundary) -> Result<Segment, CfiError> {
	if doc.is_text(at.node) {
		return Ok(Segment {
			steps: node_steps(doc, at.node)?,
			offset: Some(at.offset),
		});
	}
	let count = doc.child_count(at.node);
	let (node, offset) = match doc.child(at.node, at.offset) {
		Some(child) if doc.is_text(child) => (child, Some(0)),
		Some(child) => (child, None),
		None => match count.checked_sub(1).and_then(|i| doc.child(at.node, i)) {
			Some(last) if doc.is_text(last) => (last, Some(doc.node_len(last))),
			Some(last) => (last, None),
			None => (at.node, None),
		},
	};
	Ok(Segment {
		steps: node_steps(doc, node)?,
		offset,
	})
}

fn step_child(doc: &Document, parent: NodeId, step: &Step) -> Option<NodeId> {
	if !step.is_text() {
		let nth = (step.index / 2).checked_sub(1)?;
		return doc.children(parent).filter(|c| doc.is_element(*c)).nth(nth);
	}
	let before = step.index / 2;
	let mut elements = 0;
	for child in doc.children(parent) {
		if doc.is_element(child) {
			elements += 1;
			if elements > before {
				break;
			}
		} else if elements == before {
			return Some(child);
		}
	}
	None
}

fn resolve_steps(
	doc: &Document,
	from: NodeId,
	steps: &[Step],
	depth: usize,
) -> Result<NodeId, CfiError> {
	let mut node = from;
	for (i, step) in steps.iter().enumerate() {
		node = step_child(doc, node, step)
			.or_else(|| step.id.as_deref().and_then(|id| doc.element_by_id(id)))
			.ok_or(CfiError::MissingStep(depth + i))?;
	}
	Ok(node)
}

fn boundary_at(doc: &Document, node: NodeId, offset: Option<usize>) -> Boundary {
	if doc.is_text(node) {
		let len = doc.node_len(node);
		Boundary::new(node, offset.unwrap_or(0).min(len))
	} else {
		Boundary::new(node, 0)
	}
}
