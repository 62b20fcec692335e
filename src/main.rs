use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use finwave::command::help_lines;
use finwave::config::{AppConfig, Variant};
use finwave::context::ControlContext;
use finwave::servo::ServoDriver;
use finwave::transport;

fn main() {
    init_logging();

    log::info!("finwave starting");

    if let Err(e) = run_app() {
        log::error!("App error: {:#}", e);
        loop {
            log::info!("System halted. Reset the board to try again.");
            thread::sleep(Duration::from_secs(10));
        }
    }
}

#[cfg(target_os = "espidf")]
fn init_logging() {
    // It is necessary to call this function once. Otherwise, some patches to the runtime
    // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_svc::sys::link_patches();

    // Bind the log crate to the ESP Logging facilities
    esp_idf_svc::log::EspLogger::initialize_default();
}

#[cfg(not(target_os = "espidf"))]
fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[cfg(target_os = "espidf")]
fn run_app() -> anyhow::Result<()> {
    use esp_idf_svc::hal::ledc::{config::TimerConfig, LedcDriver, LedcTimerDriver, Resolution};
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::hal::prelude::*;
    use esp_idf_svc::hal::usb_serial;
    use esp_idf_svc::io::vfs::BlockingStdIo;
    use finwave::servo_ledc::{LedcServos, SERVO_FREQUENCY_HZ};

    let peripherals = Peripherals::take()?;
    let p = peripherals.pins;

    // console on the built-in USB serial port
    let usb_serial = usb_serial::UsbSerialDriver::new(
        peripherals.usb_serial,
        p.gpio19,
        p.gpio20,
        &usb_serial::config::Config::default(),
    )?;
    let _blocking_io = BlockingStdIo::usb_serial(usb_serial)?;

    let ledc = peripherals.ledc;
    let timer = LedcTimerDriver::new(
        ledc.timer0,
        &TimerConfig::default()
            .frequency(SERVO_FREQUENCY_HZ.Hz())
            .resolution(Resolution::Bits14),
    )?;

    // left side rear to front on channels 0-3, right side on 4-7
    let drivers = vec![
        LedcDriver::new(ledc.channel0, &timer, p.gpio4)?,
        LedcDriver::new(ledc.channel1, &timer, p.gpio5)?,
        LedcDriver::new(ledc.channel2, &timer, p.gpio6)?,
        LedcDriver::new(ledc.channel3, &timer, p.gpio7)?,
        LedcDriver::new(ledc.channel4, &timer, p.gpio15)?,
        LedcDriver::new(ledc.channel5, &timer, p.gpio16)?,
        LedcDriver::new(ledc.channel6, &timer, p.gpio17)?,
        LedcDriver::new(ledc.channel7, &timer, p.gpio18)?,
    ];

    run_control(AppConfig::default(), Box::new(LedcServos::new(drivers)))
}

/// Host build: simulated servos, console on stdin/stdout. The first argument picks
/// the program (`swim` or `tune`).
#[cfg(not(target_os = "espidf"))]
fn run_app() -> anyhow::Result<()> {
    use finwave::servo_sim::SimulatedServos;

    let mut config = AppConfig::default();
    if let Some(mode) = std::env::args().nth(1) {
        config.variant = match mode.as_str() {
            "swim" => Variant::Locomotion,
            "tune" => Variant::Tuning,
            other => anyhow::bail!("unknown mode '{}', use 'swim' or 'tune'", other),
        };
    }

    run_control(config, Box::new(SimulatedServos::new().with_trace()))
}

fn run_control(config: AppConfig, driver: Box<dyn ServoDriver + '_>) -> anyhow::Result<()> {
    log::info!("Config: {}", serde_json::to_string(&config)?);

    let mut context = ControlContext::new(&config, driver)?;

    let (tx, rx) = mpsc::channel();
    if config.variant == Variant::Tuning {
        transport::spawn_stdin_reader(tx)?;
        transport::write_replies(&help_lines());
    }

    log::info!("Starting control loop, {} ms period", config.timing.update_period_ms);
    loop {
        let now = Instant::now();
        while let Ok(event) = rx.try_recv() {
            context.handle_line(event, now);
        }

        context.step(now);

        let replies = context.take_replies();
        if !replies.is_empty() {
            transport::write_replies(&replies);
        }

        // yield at least one tick to the console thread and the idle task
        let wait = context.until_next(Instant::now()).max(Duration::from_millis(1));
        thread::sleep(wait);
    }
}
