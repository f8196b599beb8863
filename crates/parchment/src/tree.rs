//! Arena DOM for content documents, built by html5ever.
//!
//! Only elements and non blank text are kept. Comments, processing
//! instructions and doctypes get ids so the parser can hand them around,
//! but they never carry a leaf and are invisible to every query.

use std::borrow::Cow;
use std::cell::Cell;
use std::cell::Ref;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io;

use html5ever::Attribute;
use html5ever::LocalName;
use html5ever::Namespace;
use html5ever::QualName;
use html5ever::interface::ElementFlags;
use html5ever::interface::NodeOrText;
use html5ever::interface::QuirksMode;
use html5ever::interface::TreeSink;
use html5ever::local_name;
use html5ever::ns;
use html5ever::tendril::StrTendril;
use html5ever::tendril::TendrilSink;
use html5ever::tendril::stream::Utf8LossyDecoder;

use crate::range::Boundary;

#[derive(Debug, thiserror::Error)]
pub enum TreeBuilderError {
	#[error(transparent)]
	Io(#[from] io::Error),
}

#[derive(Debug)]
pub struct Element {
	pub name: QualName,
	pub attrs: BTreeMap<(Namespace, LocalName), String>,
}

impl Element {
	fn attr(&self, name: &str) -> Option<&str> {
		self.attrs
			.get(&(ns!(), LocalName::from(name)))
			.map(|v| v.as_str())
	}
}

#[derive(Debug)]
pub struct Text {
	pub t: StrTendril,
}

#[derive(Debug)]
pub enum Leaf {
	Element(Element),
	Text(Text),
}

#[derive(Debug, Clone, Copy)]
pub struct ElementRef<'a> {
	pub id: NodeId,
	pub el: &'a Element,
}

impl<'a> ElementRef<'a> {
	pub fn local_name(&self) -> &'a LocalName {
		&self.el.name.local
	}

	pub fn attr(&self, name: &str) -> Option<&'a str> {
		self.el.attr(name)
	}
}

#[derive(Debug, Clone, Copy)]
pub struct TextRef<'a> {
	pub id: NodeId,
	pub t: &'a Text,
}

/// One step of a depth first walk, elements are seen on the way in and out.
pub enum EdgeRef<'a> {
	OpenElement(ElementRef<'a>),
	CloseElement(NodeId, LocalName),
	Text(TextRef<'a>),
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
	pub fn value(&self) -> u32 {
		self.0
	}

	fn slot(self) -> usize {
		self.0 as usize
	}
}

#[derive(Debug)]
struct Node {
	parent: Option<NodeId>,
	children: Vec<NodeId>,
	leaf: Option<Leaf>,
}

/// Nodes indexed by id, links kept on both ends.
#[derive(Debug, Default)]
struct Arena {
	nodes: Vec<Node>,
}

impl Arena {
	fn push(&mut self, leaf: Option<Leaf>) -> NodeId {
		let id = NodeId(self.nodes.len() as u32);
		self.nodes.push(Node {
			parent: None,
			children: Vec::new(),
			leaf,
		});
		id
	}

	fn len(&self) -> u32 {
		self.nodes.len() as u32
	}

	fn parent(&self, id: NodeId) -> Option<NodeId> {
		self.nodes.get(id.slot())?.parent
	}

	fn children(&self, id: NodeId) -> &[NodeId] {
		self.nodes
			.get(id.slot())
			.map(|n| n.children.as_slice())
			.unwrap_or_default()
	}

	fn leaf(&self, id: NodeId) -> Option<&Leaf> {
		self.nodes.get(id.slot())?.leaf.as_ref()
	}

	fn text_mut(&mut self, id: NodeId) -> Option<&mut StrTendril> {
		match self.nodes.get_mut(id.slot())?.leaf.as_mut() {
			Some(Leaf::Text(Text { t })) => Some(t),
			_ => None,
		}
	}

	fn detach(&mut self, id: NodeId) {
		let Some(parent) = self.nodes.get_mut(id.slot()).and_then(|n| n.parent.take()) else {
			return;
		};
		if let Some(node) = self.nodes.get_mut(parent.slot()) {
			node.children.retain(|c| *c != id);
		}
	}

	/// Move `child` under `parent`, before `before` when given and present.
	fn attach(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
		debug_assert_ne!(parent, child, "Tried to attach node to itself");
		self.detach(child);
		let Some(node) = self.nodes.get_mut(parent.slot()) else {
			return;
		};
		let at = before
			.and_then(|b| node.children.iter().position(|c| *c == b))
			.unwrap_or(node.children.len());
		node.children.insert(at, child);
		if let Some(node) = self.nodes.get_mut(child.slot()) {
			node.parent = Some(parent);
		}
	}

	/// Add text under `parent`, merged into the text node it would follow.
	fn attach_text(&mut self, parent: NodeId, t: StrTendril, before: Option<NodeId>) {
		if t.trim().is_empty() {
			return;
		}
		let siblings = self.children(parent);
		let preceding = match before {
			Some(b) => siblings.iter().take_while(|c| **c != b).last(),
			None => siblings.last(),
		};
		if let Some(text) = preceding.copied().and_then(|id| self.text_mut(id)) {
			text.push_tendril(&t);
			return;
		}
		let node = self.push(Some(Leaf::Text(Text { t })));
		self.attach(parent, node, before);
	}
}

/// Parsed content document, the live tree a rendering surface walks.
#[derive(Debug)]
pub struct Document {
	root: NodeId,
	body: Option<NodeId>,
	arena: Arena,
	parse_errors: Vec<Cow<'static, str>>,
}

impl Document {
	pub fn parse(markup: &str) -> Document {
		html5ever::parse_document(DocumentSink::default(), Default::default()).one(markup)
	}

	pub fn read_from<R: io::Read>(mut reader: R) -> Result<Document, TreeBuilderError> {
		let parser = html5ever::parse_document(DocumentSink::default(), Default::default());
		Ok(Utf8LossyDecoder::new(parser).read_from(&mut reader)?)
	}

	pub fn root(&self) -> NodeId {
		self.root
	}

	pub fn body(&self) -> Option<NodeId> {
		self.body
	}

	/// The `<html>` element, anchor of every content path.
	pub fn document_element(&self) -> Option<NodeId> {
		self.children(self.root).find(|id| self.is_element(*id))
	}

	pub fn parse_errors(&self) -> &[Cow<'static, str>] {
		&self.parse_errors
	}

	pub fn node_count(&self) -> u32 {
		self.arena.len()
	}

	pub fn leaf(&self, id: NodeId) -> Option<&Leaf> {
		self.arena.leaf(id)
	}

	pub fn is_text(&self, id: NodeId) -> bool {
		matches!(self.leaf(id), Some(Leaf::Text(_)))
	}

	pub fn is_element(&self, id: NodeId) -> bool {
		matches!(self.leaf(id), Some(Leaf::Element(_)))
	}

	pub fn text(&self, id: NodeId) -> Option<&str> {
		match self.leaf(id) {
			Some(Leaf::Text(Text { t })) => Some(&**t),
			_ => None,
		}
	}

	pub fn local_name(&self, id: NodeId) -> Option<&LocalName> {
		match self.leaf(id) {
			Some(Leaf::Element(el)) => Some(&el.name.local),
			_ => None,
		}
	}

	pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
		match self.leaf(id) {
			Some(Leaf::Element(el)) => el.attr(name),
			_ => None,
		}
	}

	pub fn parent(&self, id: NodeId) -> Option<NodeId> {
		self.arena.parent(id)
	}

	/// Element and text children, comments and other markers are skipped.
	pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
		self.arena
			.children(id)
			.iter()
			.copied()
			.filter(|c| self.arena.leaf(*c).is_some())
	}

	pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
		self.children(id).nth(index)
	}

	pub fn child_count(&self, id: NodeId) -> usize {
		self.children(id).count()
	}

	pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
		let parent = self.parent(id)?;
		self.children(parent).position(|c| c == id)
	}

	/// Length of a node in boundary units: chars for text, children otherwise.
	pub fn node_len(&self, id: NodeId) -> usize {
		match self.text(id) {
			Some(t) => t.chars().count(),
			None => self.child_count(id),
		}
	}

	pub fn iter(&self, id: NodeId) -> Edges<'_> {
		Edges::new(&self.arena, id)
	}

	pub fn body_iter(&self) -> Option<Edges<'_>> {
		self.body.map(|id| self.iter(id))
	}

	/// Text nodes below `id` in document order.
	pub fn text_nodes(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
		let own = self.is_text(id).then_some(id);
		own.into_iter().chain(self.iter(id).filter_map(|edge| match edge {
			EdgeRef::Text(t) => Some(t.id),
			_ => None,
		}))
	}

	pub fn text_content(&self, id: NodeId) -> String {
		self.text_nodes(id).filter_map(|n| self.text(n)).collect()
	}

	pub fn element_by_id(&self, value: &str) -> Option<NodeId> {
		self.iter(self.root).find_map(|edge| match edge {
			EdgeRef::OpenElement(el) if el.attr("id") == Some(value) => Some(el.id),
			_ => None,
		})
	}

	pub fn contains(&self, ancestor: NodeId, id: NodeId) -> bool {
		std::iter::successors(Some(id), |n| self.parent(*n)).any(|n| n == ancestor)
	}

	/// Path from the root down to `id`, both included.
	fn lineage(&self, id: NodeId) -> Vec<NodeId> {
		let mut chain: Vec<NodeId> = std::iter::successors(Some(id), |n| self.parent(*n)).collect();
		chain.reverse();
		chain
	}

	/// Order two boundary points the way DOM ranges do.
	pub fn compare_boundaries(&self, a: &Boundary, b: &Boundary) -> Ordering {
		if a.node == b.node {
			return a.offset.cmp(&b.offset);
		}
		let lineage_a = self.lineage(a.node);
		let lineage_b = self.lineage(b.node);
		let shared = lineage_a
			.iter()
			.zip(&lineage_b)
			.take_while(|(x, y)| x == y)
			.count();
		let position = |id: NodeId| self.index_in_parent(id).unwrap_or(0);
		match (lineage_a.get(shared), lineage_b.get(shared)) {
			// a.node contains b.node
			(None, Some(&inner)) => {
				if position(inner) < a.offset {
					Ordering::Greater
				} else {
					Ordering::Less
				}
			}
			(Some(&inner), None) => {
				if position(inner) < b.offset {
					Ordering::Less
				} else {
					Ordering::Greater
				}
			}
			(Some(&x), Some(&y)) => position(x).cmp(&position(y)),
			(None, None) => Ordering::Equal,
		}
	}
}

/// Depth first walk over the element and text nodes below a node.
pub struct Edges<'a> {
	arena: &'a Arena,
	stack: Vec<EdgeRef<'a>>,
}

impl<'a> Edges<'a> {
	fn new(arena: &'a Arena, id: NodeId) -> Self {
		let mut edges = Self {
			arena,
			stack: Vec::new(),
		};
		edges.push_children(id);
		edges
	}

	fn push_children(&mut self, id: NodeId) {
		let arena = self.arena;
		let children = arena.children(id).iter().rev();
		self.stack
			.extend(children.filter_map(|child| match arena.leaf(*child)? {
				Leaf::Element(el) => Some(EdgeRef::OpenElement(ElementRef { id: *child, el })),
				Leaf::Text(t) => Some(EdgeRef::Text(TextRef { id: *child, t })),
			}));
	}
}

impl<'a> Iterator for Edges<'a> {
	type Item = EdgeRef<'a>;

	fn next(&mut self) -> Option<Self::Item> {
		let edge = self.stack.pop()?;
		if let EdgeRef::OpenElement(el) = &edge {
			let (id, name) = (el.id, el.local_name().clone());
			self.stack.push(EdgeRef::CloseElement(id, name));
			self.push_children(id);
		}
		Some(edge)
	}
}

/// Receives parser callbacks and owns the arena until parsing finishes.
struct DocumentSink {
	root: NodeId,
	/// Returned for template contents that do not exist.
	orphan: NodeId,
	body: Cell<Option<NodeId>>,
	arena: RefCell<Arena>,
	parse_errors: RefCell<Vec<Cow<'static, str>>>,
}

impl Default for DocumentSink {
	fn default() -> Self {
		let mut arena = Arena::default();
		let root = arena.push(None);
		let orphan = arena.push(None);
		Self {
			root,
			orphan,
			body: Cell::new(None),
			arena: RefCell::new(arena),
			parse_errors: RefCell::new(Vec::new()),
		}
	}
}

impl TreeSink for DocumentSink {
	type Handle = NodeId;
	type Output = Document;
	type ElemName<'a> = Ref<'a, QualName>;

	fn finish(self) -> Document {
		let arena = self.arena.into_inner();
		log::trace!("Parsed document with {} nodes", arena.len());
		Document {
			root: self.root,
			body: self.body.get(),
			arena,
			parse_errors: self.parse_errors.into_inner(),
		}
	}

	fn parse_error(&self, msg: Cow<'static, str>) {
		log::trace!("Parse error: {msg}");
		self.parse_errors.borrow_mut().push(msg);
	}

	fn get_document(&self) -> NodeId {
		self.root
	}

	fn elem_name<'a>(&'a self, target: &'a NodeId) -> Ref<'a, QualName> {
		Ref::map(self.arena.borrow(), |arena| match arena.leaf(*target) {
			Some(Leaf::Element(el)) => &el.name,
			_ => panic!("Not an element: {target:?}"),
		})
	}

	fn create_element(&self, name: QualName, attrs: Vec<Attribute>, _flags: ElementFlags) -> NodeId {
		let is_body = name.local == local_name!("body");
		let attrs = attrs
			.into_iter()
			.map(|a| ((a.name.ns, a.name.local), a.value.to_string()))
			.collect();
		let id = self
			.arena
			.borrow_mut()
			.push(Some(Leaf::Element(Element { name, attrs })));
		if is_body && self.body.get().is_none() {
			self.body.set(Some(id));
		}
		id
	}

	fn create_comment(&self, _text: StrTendril) -> NodeId {
		self.arena.borrow_mut().push(None)
	}

	fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> NodeId {
		self.arena.borrow_mut().push(None)
	}

	fn append_doctype_to_document(&self, name: StrTendril, _public_id: StrTendril, _system_id: StrTendril) {
		log::trace!("Doctype {name}");
	}

	fn append(&self, parent: &NodeId, child: NodeOrText<NodeId>) {
		let mut arena = self.arena.borrow_mut();
		match child {
			NodeOrText::AppendNode(node) => arena.attach(*parent, node, None),
			NodeOrText::AppendText(t) => arena.attach_text(*parent, t, None),
		}
	}

	fn append_before_sibling(&self, sibling: &NodeId, new_node: NodeOrText<NodeId>) {
		let mut arena = self.arena.borrow_mut();
		let Some(parent) = arena.parent(*sibling) else {
			log::warn!("Sibling {sibling:?} has no parent, dropping node");
			return;
		};
		match new_node {
			NodeOrText::AppendNode(node) => arena.attach(parent, node, Some(*sibling)),
			NodeOrText::AppendText(t) => arena.attach_text(parent, t, Some(*sibling)),
		}
	}

	fn append_based_on_parent_node(&self, element: &NodeId, prev_element: &NodeId, child: NodeOrText<NodeId>) {
		let attached = self.arena.borrow().parent(*element).is_some();
		if attached {
			self.append_before_sibling(element, child)
		} else {
			self.append(prev_element, child)
		}
	}

	fn get_template_contents(&self, target: &NodeId) -> NodeId {
		self.arena
			.borrow()
			.children(*target)
			.first()
			.copied()
			.unwrap_or(self.orphan)
	}

	fn same_node(&self, x: &NodeId, y: &NodeId) -> bool {
		x == y
	}

	fn set_quirks_mode(&self, mode: QuirksMode) {
		log::trace!("Quirks mode {mode:?}");
	}

	fn add_attrs_if_missing(&self, target: &NodeId, add_attrs: Vec<Attribute>) {
		let mut arena = self.arena.borrow_mut();
		let Some(Some(Leaf::Element(el))) = arena.nodes.get_mut(target.slot()).map(|n| n.leaf.as_mut()) else {
			log::error!("Attributes added to non element {target:?}");
			return;
		};
		for attr in add_attrs {
			el.attrs
				.entry((attr.name.ns, attr.name.local))
				.or_insert_with(|| attr.value.to_string());
		}
	}

	fn remove_from_parent(&self, target: &NodeId) {
		self.arena.borrow_mut().detach(*target);
	}

	fn reparent_children(&self, node: &NodeId, new_parent: &NodeId) {
		let mut arena = self.arena.borrow_mut();
		for child in arena.children(*node).to_vec() {
			arena.attach(*new_parent, child, None);
		}
	}
}

#[cfg(test)]
mod tests {
	use std::cmp::Ordering;

	use crate::range::Boundary;
	use crate::tree::Document;
	use crate::tree::EdgeRef;

	#[test]
	fn test_document_skeleton() {
		let _ = env_logger::try_init();
		let doc = Document::parse("testing");

		let html = doc.document_element().expect("Missing html element");
		assert_eq!(doc.local_name(html).map(|n| &**n), Some("html"));
		let names = doc
			.children(html)
			.filter_map(|c| doc.local_name(c).map(|n| n.to_string()))
			.collect::<Vec<_>>();
		assert_eq!(names, vec!["head", "body"]);

		let body = doc.body().expect("Missing body element");
		assert_eq!(doc.text_content(body), "testing");
	}

	#[test]
	fn test_document_skips_whitespace_and_comments() {
		let _ = env_logger::try_init();
		let input = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <title>title</title>
  </head>
  <body>
    <!-- page content -->
    <p id="first">One</p>
    <p>Two <em>and</em> three</p>
  </body>
</html>
"#;
		let doc = Document::parse(input);
		let body = doc.body().unwrap();
		assert_eq!(doc.child_count(body), 2, "Comment or whitespace leaked");

		let first = doc.element_by_id("first").unwrap();
		assert_eq!(doc.index_in_parent(first), Some(0));
		assert_eq!(doc.text_content(first), "One");

		let texts = doc
			.text_nodes(body)
			.filter_map(|n| doc.text(n))
			.collect::<Vec<_>>();
		assert_eq!(texts, vec!["One", "Two ", "and", " three"]);
	}

	#[test]
	fn test_document_iter_balanced() {
		let _ = env_logger::try_init();
		let doc = Document::parse("<p>a<b>b</b></p><p>c</p>");
		let mut depth = 0i32;
		let mut max = 0;
		for edge in doc.body_iter().unwrap() {
			match edge {
				EdgeRef::OpenElement(_) => depth += 1,
				EdgeRef::CloseElement(_, _) => depth -= 1,
				EdgeRef::Text(_) => {}
			}
			max = max.max(depth);
		}
		assert_eq!(depth, 0);
		assert_eq!(max, 2);
	}

	#[test]
	fn test_compare_boundaries() {
		let _ = env_logger::try_init();
		let doc = Document::parse("<p>alpha</p><p>beta</p>");
		let body = doc.body().unwrap();
		let texts = doc.text_nodes(body).collect::<Vec<_>>();
		let a = Boundary::new(texts[0], 3);
		let b = Boundary::new(texts[1], 0);
		assert_eq!(doc.compare_boundaries(&a, &b), Ordering::Less);
		assert_eq!(doc.compare_boundaries(&b, &a), Ordering::Greater);
		assert_eq!(
			doc.compare_boundaries(&a, &Boundary::new(texts[0], 1)),
			Ordering::Greater
		);

		let before_all = Boundary::new(body, 0);
		let after_all = Boundary::new(body, 2);
		assert_eq!(doc.compare_boundaries(&before_all, &a), Ordering::Less);
		assert_eq!(doc.compare_boundaries(&after_all, &b), Ordering::Greater);
	}
}
