//! Serial execution of deferred work bound to one context.
//!
//! Jobs receive the context mutably and run strictly one after another, a
//! job enqueued while another runs waits for the drain to reach it.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use tokio::sync::oneshot;

pub type LocalFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

type Job<C> = Box<dyn for<'a> FnOnce(&'a mut C) -> LocalFuture<'a, ()>>;

fn job<C, F>(f: F) -> Job<C>
where
	F: for<'a> FnOnce(&'a mut C) -> LocalFuture<'a, ()> + 'static,
{
	Box::new(f)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
	#[error("Task was dropped before it ran")]
	Canceled,
	#[error("Queue is paused")]
	Paused,
}

/// Settles with the value of an enqueued task.
#[derive(Debug)]
pub struct Deferred<R> {
	rx: oneshot::Receiver<R>,
}

impl<R> Deferred<R> {
	/// The task's value if it already ran, without waiting.
	pub fn settled(&mut self) -> Option<Result<R, QueueError>> {
		match self.rx.try_recv() {
			Ok(value) => Some(Ok(value)),
			Err(oneshot::error::TryRecvError::Empty) => None,
			Err(oneshot::error::TryRecvError::Closed) => Some(Err(QueueError::Canceled)),
		}
	}
}

impl<R> Future for Deferred<R> {
	type Output = Result<R, QueueError>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.rx)
			.poll(cx)
			.map_err(|_| QueueError::Canceled)
	}
}

/// Implemented by contexts that own a queue of jobs over themselves.
pub trait Queued: Sized + 'static {
	fn queue(&mut self) -> &mut TaskQueue<Self>;
}

pub struct TaskQueue<C> {
	pending: VecDeque<Job<C>>,
	paused: bool,
	running: bool,
}

impl<C> Default for TaskQueue<C> {
	fn default() -> Self {
		Self {
			pending: VecDeque::new(),
			paused: false,
			running: false,
		}
	}
}

impl<C> fmt::Debug for TaskQueue<C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TaskQueue")
			.field("pending", &self.pending.len())
			.field("paused", &self.paused)
			.field("running", &self.running)
			.finish()
	}
}

impl<C: 'static> TaskQueue<C> {
	pub fn enqueue<F, R>(&mut self, task: F) -> Deferred<R>
	where
		F: for<'a> FnOnce(&'a mut C) -> LocalFuture<'a, R> + 'static,
		R: 'static,
	{
		let (tx, rx) = oneshot::channel();
		self.pending.push_back(job(move |ctx: &mut C| {
			let fut = task(ctx);
			Box::pin(async move {
				let result = fut.await;
				if tx.send(result).is_err() {
					log::trace!("Deferred dropped before task settled");
				}
			})
		}));
		log::trace!("Enqueued task, {} pending", self.pending.len());
		Deferred { rx }
	}

	pub fn enqueue_sync<F, R>(&mut self, task: F) -> Deferred<R>
	where
		F: FnOnce(&mut C) -> R + 'static,
		R: 'static,
	{
		self.enqueue(move |ctx: &mut C| {
			let result = task(ctx);
			Box::pin(async move { result })
		})
	}

	pub fn len(&self) -> usize {
		self.pending.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}

	pub fn is_running(&self) -> bool {
		self.running
	}

	pub fn is_paused(&self) -> bool {
		self.paused
	}

	pub fn pause(&mut self) {
		self.paused = true;
	}

	pub fn resume(&mut self) {
		self.paused = false;
	}

	/// Drop pending work, its deferreds settle as canceled.
	pub fn clear(&mut self) {
		self.pending.clear();
	}

	pub fn stop(&mut self) {
		self.clear();
		self.running = false;
		self.paused = true;
	}
}

impl<C: Queued> TaskQueue<C> {
	/// Run exactly one pending job unless paused.
	pub async fn dequeue(ctx: &mut C) -> bool {
		let next = {
			let q = ctx.queue();
			if q.paused {
				return false;
			}
			q.pending.pop_front()
		};
		match next {
			Some(job) => {
				job(ctx).await;
				true
			}
			None => false,
		}
	}

	/// Drain the queue in order. A flush from inside a running job returns
	/// at once, the outer drain picks up whatever the job enqueued.
	pub async fn flush(ctx: &mut C) -> usize {
		if ctx.queue().running {
			log::trace!("Flush already running");
			return 0;
		}
		ctx.queue().running = true;
		let mut ran = 0;
		while ctx.queue().running && Self::dequeue(ctx).await {
			ran += 1;
		}
		ctx.queue().running = false;
		ran
	}

	/// Run every pending job to completion right now, bypassing pause.
	pub fn dump(ctx: &mut C) -> usize {
		let mut ran = 0;
		while let Some(job) = ctx.queue().pending.pop_front() {
			pollster::block_on(job(ctx));
			ran += 1;
		}
		ran
	}
}
