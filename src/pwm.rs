//! Actuator outputs on the nRF52840 PWM peripherals.
//!
//! Slots 0 and 1 share PWM0 (one counter, one top value); slots 2 and 3
//! each have their own instance. The counter top is the channel's duty
//! range, so a duty of `max_duty` is fully on.

use embassy_nrf::peripherals::{PWM0, PWM1, PWM2};
use embassy_nrf::pwm::{Instance, Prescaler, SimplePwm};

use haptic_glove::actuation::{ActuatorDriver, PwmChannel, PwmInstance};
use haptic_glove::config::{FOURTH_MAX_DUTY, PAIRED_MAX_DUTY, THIRD_MAX_DUTY};

/// A duty write aimed at a channel the instance was not built with.
#[derive(Clone, Copy, Debug, defmt::Format)]
pub struct NoSuchChannel(pub PwmChannel);

pub struct GlovePwm<'d> {
    pwm0: SimplePwm<'d, PWM0>,
    pwm1: SimplePwm<'d, PWM1>,
    pwm2: SimplePwm<'d, PWM2>,
}

impl<'d> GlovePwm<'d> {
    /// `pwm0` must drive two pins, `pwm1` and `pwm2` one each.
    pub fn new(
        mut pwm0: SimplePwm<'d, PWM0>,
        mut pwm1: SimplePwm<'d, PWM1>,
        mut pwm2: SimplePwm<'d, PWM2>,
    ) -> Self {
        configure(&mut pwm0, PAIRED_MAX_DUTY, 2);
        configure(&mut pwm1, THIRD_MAX_DUTY, 1);
        configure(&mut pwm2, FOURTH_MAX_DUTY, 1);
        Self { pwm0, pwm1, pwm2 }
    }
}

fn configure<T: Instance>(pwm: &mut SimplePwm<'_, T>, top: u16, channels: usize) {
    // 16 MHz / 16 = 1 MHz counter clock.
    pwm.set_prescaler(Prescaler::Div16);
    pwm.set_max_duty(top);
    for ch in 0..channels {
        pwm.set_duty(ch, 0);
    }
}

impl ActuatorDriver for GlovePwm<'_> {
    type Error = NoSuchChannel;

    fn set_duty(&mut self, channel: PwmChannel, duty: u16) -> Result<(), NoSuchChannel> {
        let index = channel.index as usize;
        match (channel.instance, index) {
            (PwmInstance::Pwm0, 0 | 1) => self.pwm0.set_duty(index, duty),
            (PwmInstance::Pwm1, 0) => self.pwm1.set_duty(index, duty),
            (PwmInstance::Pwm2, 0) => self.pwm2.set_duty(index, duty),
            _ => return Err(NoSuchChannel(channel)),
        }
        Ok(())
    }
}
