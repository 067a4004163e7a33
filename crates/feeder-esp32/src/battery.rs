//! Battery voltage divider on an ADC1 pin.

use esp_idf_hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_hal::gpio::ADCPin;
use feeder_core::BatterySensor;
use log::warn;

/// Raw 12-bit samples from one ADC channel.
pub struct AdcBattery<T: ADCPin + 'static> {
    channel: AdcChannelDriver<'static, T, AdcDriver<'static, T::Adc>>,
}

impl<T: ADCPin + 'static> AdcBattery<T> {
    pub fn new(channel: AdcChannelDriver<'static, T, AdcDriver<'static, T::Adc>>) -> Self {
        Self { channel }
    }
}

impl<T: ADCPin + 'static> BatterySensor for AdcBattery<T>
where
    AdcChannelDriver<'static, T, AdcDriver<'static, T::Adc>>: Send,
{
    fn read_raw(&mut self) -> Option<u16> {
        match self.channel.read_raw() {
            Ok(raw) => Some(raw),
            Err(e) => {
                warn!("Battery ADC read failed: {}", e);
                None
            }
        }
    }
}
