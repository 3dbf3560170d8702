use std::time::Duration;

use color_eyre::eyre::Result;
use ledscape::{
	sim::{SimConfig, SimRuntime},
	tokio::Ledscape,
	ChannelOrder,
	Config,
	Error,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const NUM_PIXELS: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let sim = SimRuntime::new(SimConfig {
		transfer_delay: Duration::from_micros(30 * NUM_PIXELS as u64),
		..SimConfig::default()
	});
	let leds = Ledscape::open(sim, Config::new(NUM_PIXELS)).await?;

	for i in 0..60u8 {
		let slot = usize::from(i % 2);
		leds.with_frame(slot, move |frame| frame.fill(ChannelOrder::Grbw, i, 0, 255 - i, i / 2))
			.await?;

		if i > 0 {
			match leds.wait_timeout(Duration::from_millis(100)).await {
				Ok(()) => {}
				Err(Error::TimedOut(after)) => {
					warn!("frame not done after {after:?}, waiting on");
					leds.wait().await?;
				}
				Err(err) => return Err(err.into()),
			}
		}
		leds.draw(slot).await?;
	}
	leds.wait().await?;
	info!("done");

	leds.close().await?;
	Ok(())
}
