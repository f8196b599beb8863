use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
	pub fn value(&self) -> u64 {
		let ListenerId(v) = self;
		*v
	}
}

type Listener<E> = Box<dyn FnMut(&E)>;

/// Synchronous listener registry, held by whichever component emits `E`.
pub struct Emitter<E> {
	next_id: u64,
	listeners: Vec<(ListenerId, Listener<E>)>,
}

impl<E> Default for Emitter<E> {
	fn default() -> Self {
		Self {
			next_id: 0,
			listeners: Vec::new(),
		}
	}
}

impl<E> fmt::Debug for Emitter<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Emitter")
			.field("listeners", &self.listeners.len())
			.finish()
	}
}

impl<E> Emitter<E> {
	pub fn on(&mut self, listener: impl FnMut(&E) + 'static) -> ListenerId {
		let id = ListenerId(self.next_id);
		self.next_id += 1;
		self.listeners.push((id, Box::new(listener)));
		id
	}

	pub fn off(&mut self, id: ListenerId) -> bool {
		let before = self.listeners.len();
		self.listeners.retain(|(l, _)| *l != id);
		before != self.listeners.len()
	}

	pub fn emit(&mut self, event: &E) {
		for (_, listener) in self.listeners.iter_mut() {
			listener(event);
		}
	}

	pub fn clear(&mut self) {
		self.listeners.clear();
	}

	pub fn len(&self) -> usize {
		self.listeners.len()
	}

	pub fn is_empty(&self) -> bool {
		self.listeners.is_empty()
	}
}
