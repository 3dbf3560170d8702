#![cfg(feature = "tokio")]

use std::time::Duration;

use eyre::Result;
use ledscape::{
	sim::{SimConfig, SimEvent, SimRuntime},
	tokio::Ledscape,
	ChannelOrder,
	Config,
	Error,
};

fn sim(delay: Duration) -> SimRuntime {
	SimRuntime::new(SimConfig {
		transfer_delay: delay,
		..SimConfig::default()
	})
}

#[tokio::test]
async fn draw_and_wait() -> Result<()> {
	let sim = sim(Duration::from_millis(5));
	let leds = Ledscape::open(sim.clone(), Config::new(16)).await?;

	let expected = leds
		.with_frame(0, |frame| {
			frame.fill(ChannelOrder::Gbr, 1, 2, 3, 0);
			frame.to_vec()
		})
		.await?;
	leds.draw(0).await?;
	leds.wait().await?;

	assert_eq!(sim.last_frame(0), Some(expected.clone()));
	assert_eq!(sim.last_frame(1), Some(expected));
	leds.close().await?;
	assert_eq!(sim.live_units(), 0);
	Ok(())
}

#[tokio::test]
async fn wait_timeout() -> Result<()> {
	let sim = sim(Duration::from_millis(300));
	let leds = Ledscape::open(sim.clone(), Config::new(16)).await?;

	leds.draw(1).await?;
	let result = leds.wait_timeout(Duration::from_millis(10)).await;
	assert!(matches!(result, Err(Error::TimedOut(_))));

	leds.wait().await?;
	assert_eq!(sim.transfers(0), 1);
	leds.close().await?;
	Ok(())
}

#[tokio::test]
async fn dropped_wait_releases_the_device() -> Result<()> {
	let sim = sim(Duration::from_millis(200));
	let leds = Ledscape::open(sim.clone(), Config::new(16)).await?;
	leds.draw(0).await?;

	let waited = tokio::time::timeout(Duration::from_millis(20), leds.wait()).await;
	assert!(waited.is_err());

	// the blocking wait notices the cancellation and gives the device back
	let states = tokio::time::timeout(Duration::from_secs(1), leds.transfer_state()).await??;
	assert_eq!(states.len(), 2);

	leds.wait().await?;
	leds.close().await?;
	Ok(())
}

#[tokio::test]
async fn bad_slot() -> Result<()> {
	let leds = Ledscape::open(sim(Duration::ZERO), Config::new(4)).await?;
	assert!(matches!(leds.draw(2).await, Err(Error::OutOfRange { .. })));
	assert!(matches!(leds.with_frame(5, |_| ()).await, Err(Error::OutOfRange { .. })));
	Ok(())
}

#[tokio::test]
async fn last_clone_closes_the_device() -> Result<()> {
	let sim = sim(Duration::ZERO);
	let leds = Ledscape::open(sim.clone(), Config::new(4)).await?;
	let other = leds.clone();

	leds.close().await?;
	assert_eq!(sim.live_units(), 2);
	other.draw(0).await?;
	other.wait().await?;

	drop(other);
	let closed = tokio::time::timeout(Duration::from_secs(1), async {
		while sim.live_units() > 0 {
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
	})
	.await;
	assert!(closed.is_ok(), "device still open after the last handle was dropped");
	assert!(sim.events().contains(&SimEvent::Teardown { unit: 1 }));
	Ok(())
}
