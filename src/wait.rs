use std::{
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	time::{Duration, Instant},
};

use crate::{Error, Result};

/// Longest single park while a cancel handle is attached, so cancellation is noticed.
const CANCEL_POLL: Duration = Duration::from_millis(10);

/// Flag that aborts a wait from another thread. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::Release);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::Acquire)
	}
}

/// How long a blocking step may take. The default waits forever, like the PRU programs expect.
#[derive(Debug, Clone, Default)]
pub struct WaitPolicy {
	pub timeout: Option<Duration>,
	pub cancel:  Option<CancelHandle>,
}

impl WaitPolicy {
	pub fn unbounded() -> Self {
		Self::default()
	}

	pub fn timeout(timeout: Duration) -> Self {
		Self {
			timeout: Some(timeout),
			cancel:  None,
		}
	}

	pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
		self.cancel = Some(cancel);
		self
	}

	/// Blocks until `ready` returns true.
	///
	/// Between checks `park` is called with the longest time it may block for, `None` meaning
	/// no limit. Readiness wins over cancellation and the deadline if both happen at once.
	pub fn wait_until<R, P>(&self, mut ready: R, mut park: P) -> Result<()>
	where
		R: FnMut() -> bool,
		P: FnMut(Option<Duration>) -> Result<()>,
	{
		let deadline = self.timeout.map(|timeout| Instant::now() + timeout);

		loop {
			if ready() {
				return Ok(());
			}
			if self.cancel.as_ref().is_some_and(CancelHandle::is_cancelled) {
				return Err(Error::Cancelled);
			}

			let mut slice = self.cancel.as_ref().map(|_| CANCEL_POLL);
			if let Some(deadline) = deadline {
				let left = deadline.saturating_duration_since(Instant::now());
				if left.is_zero() {
					// one last look so a late completion isn't reported as a timeout
					if ready() {
						return Ok(());
					}
					return Err(Error::TimedOut(self.timeout.unwrap_or_default()));
				}
				slice = Some(slice.map_or(left, |s| s.min(left)));
			}

			park(slice)?;
		}
	}

	/// [`WaitPolicy::wait_until`] with a spinning park, for waits measured in microseconds.
	pub fn spin_until<R>(&self, ready: R) -> Result<()>
	where
		R: FnMut() -> bool,
	{
		self.wait_until(ready, |_| {
			std::hint::spin_loop();
			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	use std::{cell::Cell, thread};

	use super::*;

	#[test]
	fn returns_when_ready() {
		let checks = Cell::new(0);
		WaitPolicy::unbounded()
			.spin_until(|| {
				checks.set(checks.get() + 1);
				checks.get() == 5
			})
			.unwrap();
		assert_eq!(checks.get(), 5);
	}

	#[test]
	fn ready_before_park() {
		let mut parked = false;
		WaitPolicy::unbounded()
			.wait_until(
				|| true,
				|_| {
					parked = true;
					Ok(())
				},
			)
			.unwrap();
		assert!(!parked);
	}

	#[test]
	fn times_out() {
		let timeout = Duration::from_millis(20);
		let start = Instant::now();
		let err = WaitPolicy::timeout(timeout).spin_until(|| false).unwrap_err();
		assert!(matches!(err, Error::TimedOut(t) if t == timeout));
		assert!(start.elapsed() >= timeout);
	}

	#[test]
	fn park_never_exceeds_deadline() {
		let timeout = Duration::from_millis(30);
		let result = WaitPolicy::timeout(timeout).wait_until(
			|| false,
			|slice| {
				let slice = slice.expect("bounded wait must pass a slice");
				assert!(slice <= timeout);
				thread::sleep(slice);
				Ok(())
			},
		);
		assert!(matches!(result, Err(Error::TimedOut(_))));
	}

	#[test]
	fn cancel_from_other_thread() {
		let cancel = CancelHandle::new();
		let policy = WaitPolicy::unbounded().with_cancel(cancel.clone());

		let canceller = thread::spawn(move || {
			thread::sleep(Duration::from_millis(20));
			cancel.cancel();
		});

		let result = policy.wait_until(
			|| false,
			|slice| {
				assert_eq!(slice, Some(CANCEL_POLL));
				thread::sleep(slice.unwrap_or(CANCEL_POLL));
				Ok(())
			},
		);
		canceller.join().unwrap();
		assert!(matches!(result, Err(Error::Cancelled)));
	}

	#[test]
	fn park_errors_propagate() {
		let result = WaitPolicy::unbounded().wait_until(|| false, |_| Err(Error::InvalidConfig("boom".into())));
		assert!(matches!(result, Err(Error::InvalidConfig(_))));
	}
}
