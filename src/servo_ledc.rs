use esp_idf_svc::hal::ledc::LedcDriver;

use anyhow::Result;

use crate::servo::ServoDriver;

/// Hobby servo frame: 50 Hz, 20 ms.
pub const SERVO_FREQUENCY_HZ: u32 = 50;
const PERIOD_US: u32 = 1_000_000 / SERVO_FREQUENCY_HZ;

struct LedcChannel<'d> {
    driver: LedcDriver<'d>,
    max_duty: u32,
    attached: bool,
}

/// Servo outputs on the LEDC peripheral, indexed by channel number.
///
/// The channels borrow the LEDC timer they were created from, so the timer must
/// outlive this driver.
pub struct LedcServos<'d> {
    channels: Vec<LedcChannel<'d>>,
}

impl<'d> LedcServos<'d> {
    pub fn new(drivers: Vec<LedcDriver<'d>>) -> Self {
        let channels = drivers
            .into_iter()
            .map(|driver| LedcChannel {
                max_duty: driver.get_max_duty(),
                driver,
                attached: false,
            })
            .collect();
        Self { channels }
    }

    fn channel_mut(&mut self, channel: u8) -> Result<&mut LedcChannel<'d>> {
        let count = self.channels.len();
        self.channels
            .get_mut(channel as usize)
            .ok_or_else(|| anyhow::anyhow!("LEDC channel {} not available ({} configured)", channel, count))
    }
}

fn pulse_to_duty(pulse_us: u16, max_duty: u32) -> u32 {
    (pulse_us as u64 * max_duty as u64 / PERIOD_US as u64) as u32
}

impl ServoDriver for LedcServos<'_> {
    fn attach(&mut self, channel: u8) -> Result<()> {
        let output = self.channel_mut(channel)?;
        output.driver.enable()?;
        output.attached = true;
        log::info!("LEDC channel {} attached, max duty {}", channel, output.max_duty);
        Ok(())
    }

    fn write_pulse(&mut self, channel: u8, pulse_us: u16) -> Result<()> {
        let output = self.channel_mut(channel)?;
        if !output.attached {
            anyhow::bail!("LEDC channel {} written before attach", channel);
        }
        let duty = pulse_to_duty(pulse_us, output.max_duty);
        output.driver.set_duty(duty)?;
        Ok(())
    }
}
