use std::{
	collections::VecDeque,
	io,
	path::PathBuf,
	sync::{atomic::{AtomicUsize, Ordering}, Arc, Condvar, Mutex, PoisonError},
	thread::{self, JoinHandle}
};
use log::error;
use crate::{error::Result, image::RawImage, png_io};

struct Queue {
	jobs: VecDeque<(RawImage, PathBuf)>,
	closed: bool
}

struct Shared {
	queue: Mutex<Queue>,
	ready: Condvar,
	failures: AtomicUsize
}

/// Writes PNGs on background threads. Dropping it waits for every queued image.
pub struct ImageSaver {
	shared: Arc<Shared>,
	threads: Vec<JoinHandle<()>>
}

fn run_worker(shared: &Shared) {
	loop {
		let job = {
			let mut queue = shared.queue.lock().unwrap_or_else(PoisonError::into_inner);
			loop {
				if let Some(job) = queue.jobs.pop_front() {
					break Some(job);
				}
				if queue.closed {
					break None;
				}
				queue = shared.ready.wait(queue).unwrap_or_else(PoisonError::into_inner);
			}
		};
		let Some((image, path)) = job else {
			return;
		};
		if let Err(e) = png_io::write_rgba(&path, &image) {
			error!("could not save {}: {e}", path.display());
			shared.failures.fetch_add(1, Ordering::SeqCst);
		}
	}
}

impl ImageSaver {
	pub fn new(threads: usize) -> Self {
		let shared = Arc::new(Shared {
			queue: Mutex::new(Queue {jobs: VecDeque::new(), closed: false}),
			ready: Condvar::new(),
			failures: AtomicUsize::new(0)
		});
		let threads = (0..threads.max(1)).map(|_| {
			let shared = shared.clone();
			thread::spawn(move || run_worker(&shared))
		}).collect();
		Self {shared, threads}
	}

	pub fn enqueue(&self, image: RawImage, path: PathBuf) {
		self.shared.queue.lock().unwrap_or_else(PoisonError::into_inner).jobs.push_back((image, path));
		self.shared.ready.notify_one();
	}

	fn shutdown(&mut self) {
		self.shared.queue.lock().unwrap_or_else(PoisonError::into_inner).closed = true;
		self.shared.ready.notify_all();
		for thread in self.threads.drain(..) {
			if thread.join().is_err() {
				self.shared.failures.fetch_add(1, Ordering::SeqCst);
			}
		}
	}

	/// Waits for every queued image and reports whether all of them were written.
	pub fn finish(mut self) -> Result<()> {
		self.shutdown();
		match self.shared.failures.load(Ordering::SeqCst) {
			0 => Ok(()),
			n => Err(io::Error::other(format!("{n} images could not be saved")).into())
		}
	}
}

impl Drop for ImageSaver {
	fn drop(&mut self) {
		self.shutdown();
	}
}
