//! Actuation mapper: Grid intensities → PWM duty cycles.
//!
//! Every slot is clamped into `[0.0, 1.0]` before it gets anywhere near
//! a duty register. NaN and −∞ become 0.0 (off), +∞ becomes 1.0. The
//! clamped value is scaled by the channel's range and rounded half away
//! from zero.

use crate::codec::{GridCommand, GRID_SLOTS};

/// Hardware PWM peripheral.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmInstance {
    Pwm0,
    Pwm1,
    Pwm2,
}

/// One output channel of a PWM peripheral.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmChannel {
    pub instance: PwmInstance,
    pub index: u8,
}

impl PwmChannel {
    pub const fn new(instance: PwmInstance, index: u8) -> Self {
        Self { instance, index }
    }
}

/// A logical intensity slot bound to a PWM channel and its duty range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActuatorChannel {
    pub pwm: PwmChannel,
    /// Duty at full intensity.
    pub max_duty: u16,
}

impl ActuatorChannel {
    pub const fn new(pwm: PwmChannel, max_duty: u16) -> Self {
        Self { pwm, max_duty }
    }

    /// Duty for an already-clamped intensity.
    pub fn duty_for(&self, intensity: f32) -> u16 {
        libm::roundf(intensity * self.max_duty as f32) as u16
    }
}

/// Clamp an intensity into `[0.0, 1.0]`, sending NaN to 0.0.
pub fn clamp_intensity(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Sink for duty-cycle writes.
pub trait ActuatorDriver {
    type Error;

    fn set_duty(&mut self, channel: PwmChannel, duty: u16) -> Result<(), Self::Error>;
}

/// What [`ActuationMapper::apply`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActuationReport {
    /// Duty requested for each slot.
    pub duties: [u16; GRID_SLOTS],
    /// Bit `n` set if slot `n` failed to update.
    pub failed: u8,
}

impl ActuationReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }

    pub fn slot_failed(&self, slot: usize) -> bool {
        slot < GRID_SLOTS && self.failed & (1 << slot) != 0
    }
}

/// Drives the four actuator channels from Grid commands.
pub struct ActuationMapper<D> {
    driver: D,
    channels: [ActuatorChannel; GRID_SLOTS],
    last: GridCommand,
}

impl<D: ActuatorDriver> ActuationMapper<D> {
    pub fn new(driver: D, channels: [ActuatorChannel; GRID_SLOTS]) -> Self {
        Self {
            driver,
            channels,
            last: GridCommand::off(0),
        }
    }

    /// Clamp, scale and write every slot. Channels are written
    /// independently; a failing write is recorded and the rest proceed.
    pub fn apply(&mut self, command: &GridCommand) -> ActuationReport {
        let mut clamped = [0.0f32; GRID_SLOTS];
        for (out, &value) in clamped.iter_mut().zip(command.values.iter()) {
            *out = clamp_intensity(value);
        }
        self.last = GridCommand::new(command.timestamp, clamped);
        self.write_all(&clamped)
    }

    /// Drive every channel to duty 0.
    pub fn all_off(&mut self) -> ActuationReport {
        self.last = GridCommand::off(self.last.timestamp);
        self.write_all(&[0.0; GRID_SLOTS])
    }

    /// The last grid written, after clamping.
    pub fn last_applied(&self) -> GridCommand {
        self.last
    }

    pub fn channels(&self) -> &[ActuatorChannel; GRID_SLOTS] {
        &self.channels
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn write_all(&mut self, intensities: &[f32; GRID_SLOTS]) -> ActuationReport {
        let mut report = ActuationReport { duties: [0; GRID_SLOTS], failed: 0 };
        for (slot, (channel, &intensity)) in
            self.channels.iter().zip(intensities.iter()).enumerate()
        {
            let duty = channel.duty_for(intensity);
            report.duties[slot] = duty;
            if self.driver.set_duty(channel.pwm, duty).is_err() {
                report.failed |= 1 << slot;
            }
        }
        report
    }
}
