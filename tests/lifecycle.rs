use std::{path::PathBuf, time::Duration};

use eyre::{ensure, Result};
use ledscape::{
	sim::{SimConfig, SimEvent, SimRuntime},
	ChannelOrder,
	Config,
	Error,
	Ledscape,
	RuntimeError,
	WaitPolicy,
};
use tracing_subscriber::EnvFilter;

fn sim(config: SimConfig) -> SimRuntime {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
	SimRuntime::new(config)
}

fn touched_hardware(events: &[SimEvent]) -> bool {
	events
		.iter()
		.any(|event| matches!(event, SimEvent::ConfigureGpio { .. } | SimEvent::StartProgram { .. }))
}

#[test]
fn insufficient_memory_touches_nothing() {
	let sim = sim(SimConfig {
		shared_size: 4096,
		..SimConfig::default()
	});

	// 2 * 16 * 48 * 4 = 6144 bytes
	let result = Ledscape::open_default(sim.clone(), 16);
	assert!(matches!(
		result,
		Err(Error::InsufficientMemory { frame_size: 3072, available: 4096 })
	));

	assert!(!touched_hardware(&sim.events()));
	assert_eq!(sim.live_units(), 0);
}

#[test]
fn largest_frame_that_fits() -> Result<()> {
	let sim = sim(SimConfig {
		shared_size: 2 * 10 * 48 * 4,
		..SimConfig::default()
	});
	let leds = Ledscape::open_default(sim.clone(), 10)?;
	assert_eq!(leds.frame_size(), 10 * 48 * 4);
	leds.close();

	assert!(matches!(
		Ledscape::open_default(sim, 11),
		Err(Error::InsufficientMemory { .. })
	));
	Ok(())
}

#[test]
fn bring_up_order() -> Result<()> {
	let sim = sim(SimConfig::default());
	let leds = Ledscape::open_with_programs(sim.clone(), 8, "a.bin", "b.bin")?;
	let events = sim.events();

	let last_gpio = events
		.iter()
		.rposition(|event| matches!(event, SimEvent::ConfigureGpio { .. }))
		.unwrap_or_default();
	let start_0 = events.iter().position(|event| {
		*event == SimEvent::StartProgram {
			unit:    0,
			program: PathBuf::from("a.bin"),
		}
	});
	let alive_0 = events.iter().position(|event| *event == SimEvent::Alive { unit: 0 });
	let start_1 = events.iter().position(|event| {
		*event == SimEvent::StartProgram {
			unit:    1,
			program: PathBuf::from("b.bin"),
		}
	});

	ensure!(Some(last_gpio) < start_0, "{events:?}");
	ensure!(start_0 < alive_0 && alive_0 < start_1, "{events:?}");
	assert_eq!(&events[..2], &[SimEvent::Init { unit: 0 }, SimEvent::Init { unit: 1 }]);

	let banks: Vec<(usize, u8)> = events
		.iter()
		.filter_map(|event| match event {
			SimEvent::ConfigureGpio { bank, pin, .. } => Some((*bank, *pin)),
			_ => None,
		})
		.collect();
	assert_eq!(banks.first(), Some(&(0, 2)));
	assert_eq!(banks.last(), Some(&(3, 21)));
	assert_eq!(banks.iter().filter(|(bank, _)| *bank == 2).count(), 21);

	drop(leds);
	Ok(())
}

#[test]
fn failed_start_rolls_back() {
	let sim = sim(SimConfig::default());
	sim.fail_start(1);

	let result = Ledscape::open_default(sim.clone(), 8);
	assert!(matches!(result, Err(Error::Runtime(RuntimeError::Unit { unit: 1, .. }))));

	let events = sim.events();
	assert_eq!(sim.live_units(), 0);
	// unit 0 was already running and is told to halt before teardown
	let aborted = events.iter().position(|event| *event == SimEvent::Aborted { unit: 0 });
	let torn_down = events.iter().position(|event| *event == SimEvent::Teardown { unit: 0 });
	assert!(aborted.is_some() && aborted < torn_down, "{events:?}");
}

#[test]
fn failed_init_rolls_back() {
	let sim = sim(SimConfig::default());
	sim.fail_init(1);

	let result = Ledscape::open_default(sim.clone(), 8);
	assert!(matches!(result, Err(Error::Runtime(RuntimeError::Unit { unit: 1, .. }))));
	assert_eq!(sim.live_units(), 0);
	assert!(!touched_hardware(&sim.events()));
	assert!(sim.events().contains(&SimEvent::Teardown { unit: 0 }));
}

#[test]
fn silent_pru_times_out_at_startup() {
	let sim = sim(SimConfig::default());
	sim.silence(1);

	let mut config = Config::new(8);
	config.startup = WaitPolicy::timeout(Duration::from_millis(50));

	let result = Ledscape::open(sim.clone(), config);
	assert!(matches!(result, Err(Error::TimedOut(_))));
	assert_eq!(sim.live_units(), 0);
}

#[test]
fn close_aborts_then_tears_down() -> Result<()> {
	let sim = sim(SimConfig::default());
	let mut leds = Ledscape::open_default(sim.clone(), 8)?;
	leds.frame(0)?.fill(ChannelOrder::Grbw, 1, 2, 3, 4);
	leds.draw(0)?;
	leds.wait()?;
	leds.close();

	let events = sim.events();
	for unit in 0..2 {
		let aborted = events.iter().position(|event| *event == SimEvent::Aborted { unit });
		let torn_down = events.iter().position(|event| *event == SimEvent::Teardown { unit });
		ensure!(aborted.is_some() && aborted < torn_down, "unit {unit}: {events:?}");
	}
	assert_eq!(sim.live_units(), 0);
	assert_eq!(sim.command_block(0)[2], 0xFF);
	Ok(())
}

#[test]
fn unit_count_follows_program_list() -> Result<()> {
	for units in [1, 3] {
		let sim = sim(SimConfig {
			units,
			transfer_delay: Duration::ZERO,
			..SimConfig::default()
		});
		let programs = (0..units).map(|unit| format!("pru{unit}.bin"));
		let mut leds = Ledscape::open(sim.clone(), Config::new(4).with_programs(programs))?;
		assert_eq!(leds.units(), units);

		leds.draw(1)?;
		leds.wait()?;
		for unit in 0..units {
			assert_eq!(sim.transfers(unit), 1);
		}
	}
	Ok(())
}

#[test]
fn invalid_strip_count() {
	let sim = sim(SimConfig::default());
	let mut config = Config::new(8);
	config.strips = 49;
	assert!(matches!(Ledscape::open(sim.clone(), config), Err(Error::InvalidConfig(_))));
	assert!(sim.events().is_empty());
}

#[test]
fn fewer_strips_still_line_up_with_the_pru_rows() -> Result<()> {
	let sim = sim(SimConfig {
		transfer_delay: Duration::ZERO,
		..SimConfig::default()
	});
	let mut config = Config::new(4);
	config.strips = 24;
	let mut leds = Ledscape::open(sim.clone(), config)?;
	assert_eq!(leds.strips(), 24);
	assert_eq!(leds.frame_size(), 4 * 48 * 4);

	let host = {
		let mut frame = leds.frame(1)?;
		frame.set_pixel(1, 0, ChannelOrder::Rgb, 9, 9, 9, 0)?;
		frame.set_pixel(3, 23, ChannelOrder::Rgb, 7, 7, 7, 0)?;
		assert!(matches!(
			frame.set_pixel(0, 24, ChannelOrder::Rgb, 1, 1, 1, 0),
			Err(Error::OutOfRange { what: "strip", .. })
		));
		frame.to_vec()
	};
	leds.draw(1)?;
	leds.wait()?;

	let read = sim.last_frame(0).unwrap_or_default();
	assert_eq!(read, host);
	let row = 48 * 4;
	assert_eq!(&read[row..row + 4], &[9, 9, 9, 0]);
	assert_eq!(&read[3 * row + 23 * 4..3 * row + 24 * 4], &[7, 7, 7, 0]);
	assert!(sim.violations().is_empty(), "{:?}", sim.violations());
	Ok(())
}
