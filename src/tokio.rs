use std::{
	panic,
	sync::{Arc, Mutex, PoisonError},
	time::Duration,
};

use ::tokio::{runtime::Handle, task};
use tracing::debug;

use crate::{CancelHandle, Config, CoprocessorRuntime, Error, Frame, Result, TransferState, WaitPolicy};

/// Cancels the blocking wait it guards when the waiting future is dropped.
struct CancelOnDrop(CancelHandle);

impl Drop for CancelOnDrop {
	fn drop(&mut self) {
		self.0.cancel();
	}
}

/// The device shared by all clones. Only empty once it was closed.
struct Device<R: CoprocessorRuntime + Send + 'static>(Mutex<Option<crate::Ledscape<R>>>);

impl<R: CoprocessorRuntime + Send + 'static> Drop for Device<R> {
	fn drop(&mut self) {
		let Some(leds) = self.0.get_mut().unwrap_or_else(PoisonError::into_inner).take() else {
			return;
		};

		// teardown joins the PRUs, keep that off the executor threads
		match Handle::try_current() {
			Ok(handle) => {
				debug!("last handle dropped, closing on the blocking pool");
				drop(handle.spawn_blocking(move || leds.close()));
			}
			Err(_) => leds.close(),
		}
	}
}

/// Async front for [`crate::Ledscape`]. Every blocking step runs on tokio's blocking pool.
pub struct Ledscape<R: CoprocessorRuntime + Send + 'static> {
	inner: Arc<Device<R>>,
}

impl<R> Ledscape<R>
where
	R: CoprocessorRuntime + Send + 'static,
{
	pub fn new(leds: crate::Ledscape<R>) -> Self {
		Self {
			inner: Arc::new(Device(Mutex::new(Some(leds)))),
		}
	}

	/// Brings up the PRUs without blocking the executor, see [`crate::Ledscape::open`].
	pub async fn open(runtime: R, config: Config) -> Result<Self> {
		let leds = join(task::spawn_blocking(move || crate::Ledscape::open(runtime, config)).await)??;
		Ok(Self::new(leds))
	}

	async fn blocking<F, T>(&self, f: F) -> Result<T>
	where
		F: FnOnce(&mut crate::Ledscape<R>) -> T + Send + 'static,
		T: Send + 'static,
	{
		let inner = Arc::clone(&self.inner);
		join(
			task::spawn_blocking(move || {
				let mut leds = inner.0.lock().unwrap_or_else(PoisonError::into_inner);
				leds.as_mut().map(f)
			})
			.await,
		)?
		.ok_or(Error::Cancelled)
	}

	/// Runs `f` on frame `slot`.
	pub async fn with_frame<F, T>(&self, slot: usize, f: F) -> Result<T>
	where
		F: FnOnce(&mut Frame<'_>) -> T + Send + 'static,
		T: Send + 'static,
	{
		self.blocking(move |leds| {
			let mut frame = leds.frame(slot)?;
			Ok(f(&mut frame))
		})
		.await?
	}

	pub async fn draw(&self, slot: usize) -> Result<()> {
		self.blocking(move |leds| leds.draw(slot)).await?
	}

	/// Waits for the current transfer. Dropping the future stops the wait, not the transfer.
	pub async fn wait(&self) -> Result<()> {
		self.wait_with(WaitPolicy::unbounded()).await
	}

	pub async fn wait_timeout(&self, timeout: Duration) -> Result<()> {
		self.wait_with(WaitPolicy::timeout(timeout)).await
	}

	pub async fn wait_with(&self, policy: WaitPolicy) -> Result<()> {
		let cancel = CancelHandle::new();
		let policy = policy.with_cancel(cancel.clone());
		let _guard = CancelOnDrop(cancel);

		self.blocking(move |leds| leds.wait_with(&policy)).await?
	}

	pub async fn transfer_state(&self) -> Result<Vec<TransferState>> {
		self.blocking(|leds| leds.transfer_state()).await
	}

	/// Halts and releases the PRUs once no other clone is using them.
	///
	/// While clones are left this only drops this handle, the last one to go closes the
	/// device on the blocking pool.
	pub async fn close(self) -> Result<()> {
		match Arc::try_unwrap(self.inner) {
			Ok(device) => {
				let leds = device.0.lock().unwrap_or_else(PoisonError::into_inner).take();
				match leds {
					Some(leds) => join(task::spawn_blocking(move || leds.close()).await),
					None => Ok(()),
				}
			}
			Err(_) => {
				debug!("still shared, closing when the last handle is dropped");
				Ok(())
			}
		}
	}
}

impl<R: CoprocessorRuntime + Send + 'static> Clone for Ledscape<R> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

fn join<T>(result: std::result::Result<T, task::JoinError>) -> Result<T> {
	match result {
		Ok(value) => Ok(value),
		Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
		// the runtime is shutting down
		Err(_) => Err(Error::Cancelled),
	}
}
