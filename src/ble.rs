//! BLE peripheral serving the RBP and Device Information services
//!
//! One central at a time. Each connection runs two futures until the link
//! drops: one answering GATT requests and one turning published readings
//! into temperature notifications.

use core::cell::Cell;

use bt_hci::uuid::BluetoothUuid16;
use embassy_futures::{join::join, select::select};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};
use embassy_time::{Duration, Timer};
use log::{error, info, warn};
use trouble_host::prelude::*;

use crate::{
    config::{
        ADVERTISING_INTERVAL_MS, BLE_ADDRESS, DEFAULT_NOTIFY_INTERVAL_MS, DEFAULT_PROBE_TYPE,
        DEVICE_NAME, SERIAL_NUMBER, TEMPERATURE_UNIT,
    },
    logic::{
        LinkState, SharedSettings, apply_interval_write, apply_probe_type_write, outgoing_packet,
    },
    model::Reading,
    rbp::{self, ADV_PAYLOAD_MAX},
};

/// Max number of connections
pub const CONNECTIONS_MAX: usize = 1;

/// Max number of L2CAP channels
pub const L2CAP_CHANNELS_MAX: usize = 2; // Signal + att

/// Latest reading from the sampler; older values are overwritten
pub type ReadingSignal = Signal<CriticalSectionRawMutex, Reading>;

/// Same appearance as in the advertising payload
static GAP_APPEARANCE: BluetoothUuid16 = BluetoothUuid16::new(rbp::APPEARANCE);

#[gatt_server]
pub struct Server {
    pub rbp: RoastmasterService,
    pub device_info: DeviceInformationService,
}

/// Roastmaster probe service
#[gatt_service(uuid = "4ac90000-0b71-11e8-b8f5-b827ebe1d493")]
pub struct RoastmasterService {
    /// Int32 LE, hundredths of a degree
    #[characteristic(uuid = "4ac90001-0b71-11e8-b8f5-b827ebe1d493", read, notify, value = [0u8; 4])]
    pub temperature: [u8; 4],

    /// Notify interval in milliseconds
    #[characteristic(uuid = "4ac90002-0b71-11e8-b8f5-b827ebe1d493", read, write, value = DEFAULT_NOTIFY_INTERVAL_MS)]
    pub notify_interval: u16,

    #[characteristic(uuid = "4ac90003-0b71-11e8-b8f5-b827ebe1d493", read, write, value = DEFAULT_PROBE_TYPE)]
    pub probe_type: u8,
}

#[gatt_service(uuid = service::DEVICE_INFORMATION)]
pub struct DeviceInformationService {
    #[characteristic(uuid = characteristic::SERIAL_NUMBER_STRING, read, value = *SERIAL_NUMBER)]
    pub serial_number: [u8; 7],
}

/// Run the BLE host and serve centrals forever
pub async fn run<C>(controller: C, settings: &SharedSettings, readings: &ReadingSignal)
where
    C: Controller,
{
    let address: Address = Address::random(BLE_ADDRESS);
    info!("Our address = {:?}", address);

    let mut resources: HostResources<DefaultPacketPool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX> =
        HostResources::new();
    let stack = trouble_host::new(controller, &mut resources).set_random_address(address);
    let Host {
        mut peripheral,
        runner,
        ..
    } = stack.build();

    let server = match Server::new_with_config(GapConfig::Peripheral(PeripheralConfig {
        name: DEVICE_NAME,
        appearance: &GAP_APPEARANCE,
    })) {
        Ok(server) => server,
        Err(e) => {
            error!("Error registering services: {}", e);
            return;
        }
    };
    info!("Services registered: RBP {}, DIS", rbp::SERVICE_UUID);

    let mut scan_data = [0u8; ADV_PAYLOAD_MAX];
    let scan_len = match rbp::scan_response_data(DEVICE_NAME, &mut scan_data) {
        Ok(len) => len,
        Err(e) => {
            error!("Scan response: {}", e);
            return;
        }
    };

    let _ = join(ble_task(runner), async {
        loop {
            // Rebuilt every time so a new notify interval is advertised
            let mut adv_data = [0u8; ADV_PAYLOAD_MAX];
            let interval = settings.interval();
            let adv_len = match rbp::advertising_data(interval, &mut adv_data) {
                Ok(len) => len,
                Err(e) => {
                    error!("Advertising payload: {}", e);
                    return;
                }
            };

            match advertise(
                &mut peripheral,
                &server,
                &adv_data[..adv_len],
                &scan_data[..scan_len],
            )
            .await
            {
                Ok(conn) => {
                    let link = Cell::new(LinkState::new());
                    on_connect(&server, &conn, settings, &link);
                    readings.reset();

                    let a = gatt_events_task(&server, &conn, settings, &link);
                    let b = notify_task(&server, &conn, &link, readings);
                    select(a, b).await;
                }
                Err(e) => {
                    warn!("Advertising error: {:?}", e);
                    Timer::after(Duration::from_secs(1)).await;
                }
            }
        }
    })
    .await;
}

async fn ble_task<C: Controller, P: PacketPool>(mut runner: Runner<'_, C, P>) {
    loop {
        if let Err(e) = runner.run().await {
            error!("BLE host error: {:?}", e);
            Timer::after(Duration::from_secs(1)).await;
        }
    }
}

async fn advertise<'values, 'server, C: Controller>(
    peripheral: &mut Peripheral<'values, C, DefaultPacketPool>,
    server: &'server Server<'values>,
    adv_data: &[u8],
    scan_data: &[u8],
) -> Result<GattConnection<'values, 'server, DefaultPacketPool>, BleHostError<C::Error>> {
    let params = AdvertisementParameters {
        interval_min: Duration::from_millis(ADVERTISING_INTERVAL_MS),
        interval_max: Duration::from_millis(ADVERTISING_INTERVAL_MS),
        ..Default::default()
    };
    let advertiser = peripheral
        .advertise(
            &params,
            Advertisement::ConnectableScannableUndirected { adv_data, scan_data },
        )
        .await?;
    info!("Advertising started, payload {:02x?}", adv_data);

    let conn = advertiser.accept().await?.with_attribute_server(server)?;
    info!("Central connected");
    Ok(conn)
}

/// Push current settings into the attribute table and open the link
fn on_connect<P: PacketPool>(
    server: &Server<'_>,
    conn: &GattConnection<'_, '_, P>,
    settings: &SharedSettings,
    link: &Cell<LinkState>,
) {
    if let Err(e) = server.set(&server.rbp.probe_type, &settings.probe_type()) {
        warn!("Failed to set probe type: {:?}", e);
    }
    if let Err(e) = server.set(&server.rbp.notify_interval, &settings.interval()) {
        warn!("Failed to set notify interval: {:?}", e);
    }

    // The stack only notifies subscribed centrals, so subscribe this one
    // ourselves. A later CCCD write still turns notifications off.
    let subscribed = match (
        server.rbp.temperature.cccd_handle,
        server.get_cccd_table(conn.raw()),
    ) {
        (Some(cccd), Some(mut table)) => {
            table.set_notify(cccd, true);
            server.set_cccd_table(conn.raw(), table);
            true
        }
        _ => false,
    };
    if !subscribed {
        warn!("Could not enable temperature notifications on connect");
    }

    let mut state = link.get();
    state.on_connect();
    link.set(state);
    info!("Probe type and notify interval updated on connect");
}

async fn gatt_events_task<P: PacketPool>(
    server: &Server<'_>,
    conn: &GattConnection<'_, '_, P>,
    settings: &SharedSettings,
    link: &Cell<LinkState>,
) {
    let rbp_service = &server.rbp;
    let reason = loop {
        match conn.next().await {
            GattConnectionEvent::Disconnected { reason } => break reason,
            GattConnectionEvent::Gatt { event } => {
                let mut restore_interval = false;
                let mut restore_probe_type = false;

                if let GattEvent::Write(write) = &event {
                    let handle = write.handle();
                    let data = write.data();

                    if Some(handle) == rbp_service.temperature.cccd_handle {
                        let mut state = link.get();
                        let enabled = state.on_cccd_write(data);
                        link.set(state);
                        info!(
                            "CCCD written: {:02x?}, notifications {}",
                            data,
                            if enabled { "enabled" } else { "disabled" }
                        );
                    } else if handle == rbp_service.notify_interval.handle {
                        match apply_interval_write(settings, data) {
                            Ok(interval_ms) => {
                                info!("New notify interval: {} ms", interval_ms);
                            }
                            Err(e) => {
                                warn!("Invalid notify interval data: {}", e);
                                restore_interval = true;
                            }
                        }
                    } else if handle == rbp_service.probe_type.handle {
                        match apply_probe_type_write(settings, data) {
                            Ok(probe_type) => {
                                info!("New probe type value: {:02x}", probe_type);
                            }
                            Err(e) => {
                                warn!("Invalid probe type data: {}", e);
                                restore_probe_type = true;
                            }
                        }
                    } else {
                        info!("Unknown write to handle: {}", handle);
                    }
                }

                match event.accept() {
                    Ok(reply) => reply.send().await,
                    Err(e) => warn!("Error sending response: {:?}", e),
                }

                if restore_interval {
                    let current = settings.interval();
                    if let Err(e) = server.set(&rbp_service.notify_interval, &current) {
                        warn!("Failed to restore notify interval: {:?}", e);
                    }
                }
                if restore_probe_type {
                    let current = settings.probe_type();
                    if let Err(e) = server.set(&rbp_service.probe_type, &current) {
                        warn!("Failed to restore probe type: {:?}", e);
                    }
                }
            }
            _ => {}
        }
    };

    let mut state = link.get();
    state.on_disconnect();
    link.set(state);
    info!("Central disconnected: {:?}", reason);
}

async fn notify_task<P: PacketPool>(
    server: &Server<'_>,
    conn: &GattConnection<'_, '_, P>,
    link: &Cell<LinkState>,
    readings: &ReadingSignal,
) {
    let temperature = &server.rbp.temperature;
    loop {
        let reading = readings.wait().await;

        let packet = match outgoing_packet(&reading, &link.get(), TEMPERATURE_UNIT) {
            Ok(packet) => packet,
            Err(skip) => {
                info!("{}", skip.as_str());
                continue;
            }
        };

        if let Err(e) = temperature.notify(conn, &packet).await {
            warn!("Error sending notification: {:?}", e);
            continue;
        }
        info!(
            "Notification sent: raw={:02x?} int={}",
            packet,
            i32::from_le_bytes(packet)
        );
    }
}
