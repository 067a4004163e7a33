//! Hobby servo on an LEDC PWM channel.

use esp_idf_hal::ledc::LedcDriver;
use feeder_core::{Actuator, ActuatorError};

/// Servo PWM frequency. Configure the LEDC timer with this.
pub const PWM_FREQ_HZ: u32 = 50;
const MIN_PULSE_US: u32 = 600; // 0°
const MAX_PULSE_US: u32 = 2400; // 180°
const PERIOD_US: u32 = 1_000_000 / PWM_FREQ_HZ;

pub struct LedcServo {
    ledc: LedcDriver<'static>,
    max_duty: u32,
}

impl LedcServo {
    pub fn new(ledc: LedcDriver<'static>) -> Self {
        let max_duty = ledc.get_max_duty();
        Self { ledc, max_duty }
    }

    fn angle_to_duty(&self, angle: u8) -> u32 {
        let angle = u32::from(angle.min(180));
        let pulse_us = MIN_PULSE_US + (angle * (MAX_PULSE_US - MIN_PULSE_US)) / 180;
        (pulse_us * self.max_duty) / PERIOD_US
    }
}

impl Actuator for LedcServo {
    fn set_angle(&mut self, angle: u8) -> Result<(), ActuatorError> {
        let duty = self.angle_to_duty(angle);
        self.ledc.set_duty(duty).map_err(|e| ActuatorError::Drive {
            angle,
            message: e.to_string(),
        })
    }
}
