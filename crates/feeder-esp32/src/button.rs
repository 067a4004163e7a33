//! Manual feed button.

use esp_idf_hal::gpio::{AnyInputPin, Input, PinDriver};
use feeder_core::Button;

/// Push button wired to ground with the internal pull-up enabled.
pub struct GpioButton {
    pin: PinDriver<'static, AnyInputPin, Input>,
}

impl GpioButton {
    pub fn new(pin: PinDriver<'static, AnyInputPin, Input>) -> Self {
        Self { pin }
    }
}

impl Button for GpioButton {
    fn is_pressed(&mut self) -> bool {
        self.pin.is_low()
    }
}
