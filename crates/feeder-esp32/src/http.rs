//! HTTP handlers for the ESP32 feeder.
//!
//! Registers the same `/api/*` endpoints as the Linux router on an
//! `EspHttpServer`. Query strings are parsed with [`QueryParams`] so both
//! front ends read parameters identically.

use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use esp_idf_svc::http::server::{EspHttpConnection, EspHttpServer, Request};
use esp_idf_svc::http::Method;
use esp_idf_svc::io::Write;
use feeder_core::BusyFlag;
use feeder_protocol::query::{feed_times, wifi_credentials};
use feeder_protocol::{encode, encode_status, replies, QueryParams, ScanRecord};
use log::{debug, info};

use crate::device::{uptime_ms, DeferredAction, Device};

type SharedDevice = Arc<Mutex<Device>>;

const TEXT: &str = "text/plain";
const JSON: &str = "application/json";

/// Register every `/api/*` handler.
pub fn register_handlers(
    server: &mut EspHttpServer<'static>,
    device: SharedDevice,
    busy: BusyFlag,
    actions: Sender<DeferredAction>,
) -> anyhow::Result<()> {
    {
        let device = device.clone();
        server.fn_handler("/api/status", Method::Get, move |req| {
            let status = lock(&device)?.status();
            reply(req, 200, JSON, &encode_status(&status)?)
        })?;
    }

    {
        let actions = actions.clone();
        server.fn_handler("/api/feedNow", Method::Get, move |req| {
            reply(req, 200, TEXT, replies::FEEDING)?;
            queue(&actions, DeferredAction::FeedNow)
        })?;
    }

    {
        let device = device.clone();
        server.fn_handler("/api/setFeedTimes", Method::Get, move |req| {
            let slots = feed_times(&QueryParams::from_uri(req.uri()));
            debug!("Replacing feeding schedule with {} slots", slots.len());
            lock(&device)?.feeder.replace_schedule(slots, uptime_ms())?;
            reply(req, 200, TEXT, replies::OK)
        })?;
    }

    {
        let device = device.clone();
        server.fn_handler("/api/setRepeats", Method::Get, move |req| {
            if let Some(repeats) = QueryParams::from_uri(req.uri()).int("repeats") {
                lock(&device)?.feeder.set_repeats(repeats, uptime_ms())?;
            }
            reply(req, 200, TEXT, replies::OK)
        })?;
    }

    {
        let device = device.clone();
        server.fn_handler("/api/setSpeed", Method::Get, move |req| {
            if let Some(speed) = QueryParams::from_uri(req.uri()).float("speed") {
                lock(&device)?.feeder.set_speed(speed, uptime_ms())?;
            }
            reply(req, 200, TEXT, replies::OK)
        })?;
    }

    {
        let device = device.clone();
        server.fn_handler("/api/setPowerMode", Method::Get, move |req| {
            if let Some(enabled) = QueryParams::from_uri(req.uri()).flag("enabled") {
                lock(&device)?.feeder.set_power_save(enabled, uptime_ms())?;
            }
            reply(req, 200, TEXT, replies::OK)
        })?;
    }

    {
        let device = device.clone();
        server.fn_handler("/api/setAngle", Method::Get, move |req| {
            let angle = QueryParams::from_uri(req.uri()).int("angle");
            match angle {
                // Checked before locking: the main loop holds the lock while dispensing.
                Some(angle) if busy.is_busy() => debug!("Angle {} ignored while dispensing", angle),
                Some(angle) => {
                    lock(&device)?.feeder.set_angle(angle, uptime_ms())?;
                }
                None => {}
            }
            reply(req, 200, TEXT, replies::OK)
        })?;
    }

    {
        let actions = actions.clone();
        server.fn_handler("/api/setWiFi", Method::Get, move |req| {
            match wifi_credentials(&QueryParams::from_uri(req.uri())) {
                Some((ssid, password)) => {
                    info!("New WiFi credentials for '{}'", ssid);
                    reply(req, 200, TEXT, replies::OK)?;
                    queue(&actions, DeferredAction::SetWifi { ssid, password })
                }
                None => reply(req, 400, TEXT, replies::MISSING_WIFI_PARAMS),
            }
        })?;
    }

    {
        let actions = actions.clone();
        server.fn_handler("/api/forgetWiFi", Method::Get, move |req| {
            reply(req, 200, TEXT, replies::OK)?;
            queue(&actions, DeferredAction::ForgetWifi)
        })?;
    }

    {
        let actions = actions.clone();
        server.fn_handler("/api/reconnectWiFi", Method::Get, move |req| {
            reply(req, 200, TEXT, replies::OK)?;
            queue(&actions, DeferredAction::ReconnectWifi)
        })?;
    }

    server.fn_handler("/api/scanWiFi", Method::Get, move |req| {
        let networks = lock(&device)?.wifi.scan()?;
        let records: Vec<ScanRecord> = networks.into_iter().map(ScanRecord::from).collect();
        reply(req, 200, JSON, &encode(&records)?)
    })?;

    info!("HTTP handlers registered");
    Ok(())
}

fn lock(device: &SharedDevice) -> anyhow::Result<MutexGuard<'_, Device>> {
    device.lock().map_err(|_| anyhow!("device state poisoned"))
}

fn queue(actions: &Sender<DeferredAction>, action: DeferredAction) -> anyhow::Result<()> {
    actions
        .send(action)
        .map_err(|_| anyhow!("main loop is not receiving actions"))
}

fn reply(
    req: Request<&mut EspHttpConnection<'_>>,
    status: u16,
    content_type: &str,
    body: &str,
) -> anyhow::Result<()> {
    let mut response = req.into_response(
        status,
        None,
        &[("Content-Type", content_type), ("Access-Control-Allow-Origin", "*")],
    )?;
    response.write_all(body.as_bytes())?;
    Ok(())
}
