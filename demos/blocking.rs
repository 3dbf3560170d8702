use std::{
	env,
	time::{Duration, Instant},
};

use color_eyre::eyre::Result;
use ledscape::{
	sim::{SimConfig, SimRuntime},
	ChannelOrder,
	Ledscape,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const NUM_PIXELS: usize = 64;
const FRAMES: usize = 120;

fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let order: ChannelOrder = env::args().nth(1).as_deref().unwrap_or("GRB").parse()?;

	// a ws281x pixel takes 24 bits at 1.25us each
	let sim = SimRuntime::new(SimConfig {
		transfer_delay: Duration::from_micros(30 * NUM_PIXELS as u64),
		..SimConfig::default()
	});
	let mut leds = Ledscape::open_default(sim, NUM_PIXELS)?;
	let strips = leds.strips();

	let start = Instant::now();
	for i in 0..FRAMES {
		let slot = i % 2;

		// render into the frame that isn't being sent
		let mut frame = leds.frame(slot)?;
		for row in 0..NUM_PIXELS {
			for strip in 0..strips {
				let v = ((row + strip * 4 + i) % 256) as u8;
				frame.set_pixel(row, strip, order, v, 255 - v, v.wrapping_mul(2), 0)?;
			}
		}

		if i > 0 {
			leds.wait()?;
		}
		leds.draw(slot)?;
	}
	leds.wait()?;

	let elapsed = start.elapsed();
	info!(
		"{FRAMES} frames in {elapsed:?}, {:.1} fps",
		FRAMES as f64 / elapsed.as_secs_f64()
	);

	leds.close();
	Ok(())
}
