//! nusb-based HID report transport.
//!
//! The IR command channel is a vendor HID interface with one interrupt IN and
//! one interrupt OUT endpoint. Reports are exchanged raw, without going
//! through the OS HID stack, so the kernel driver is detached on claim.

use std::io::{ErrorKind, Read, Write};
use std::sync::Mutex;
use std::time::Duration;

use nusb::io::{EndpointRead, EndpointWrite};
use nusb::transfer::{In, Interrupt, Out};
use nusb::{DeviceInfo, Endpoint, MaybeFuture, list_devices};
use tracing::{debug, info, instrument, warn};

use super::traits::{HidTransport, TransportError};
use crate::protocol::Packet;
use crate::protocol::constants::REPORT_SIZE;

/// Locate the first connected device matching `vid`/`pid`.
#[instrument(level = "info", fields(vid = format!("{:04X}", vid), pid = format!("{:04X}", pid)))]
pub fn find_device(vid: u16, pid: u16) -> Result<DeviceInfo, TransportError> {
    list_devices()
        .wait()
        .map_err(|e| TransportError::OpenFailed(e.to_string()))?
        .find(|d| d.vendor_id() == vid && d.product_id() == pid)
        .ok_or(TransportError::DeviceNotFound { vid, pid })
}

/// nusb-based HID transport.
pub struct NusbTransport {
    writer: Mutex<EndpointWrite<Interrupt>>,
    /// `None` only while a timed-out reader is being drained.
    reader: Mutex<Option<EndpointRead<Interrupt>>>,
    timeout: Duration,
    vid: u16,
    pid: u16,
}

impl NusbTransport {
    /// Open `device_info` and claim HID `interface`.
    ///
    /// Every read and write gives up after `timeout`.
    #[instrument(level = "info", skip(device_info))]
    pub fn open(
        device_info: &DeviceInfo,
        interface: u8,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let vid = device_info.vendor_id();
        let pid = device_info.product_id();

        info!(
            vendor_id = %format!("{:04X}", vid),
            product_id = %format!("{:04X}", pid),
            "Found device"
        );

        let device = device_info
            .open()
            .wait()
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        let claimed = device
            .detach_and_claim_interface(interface)
            .wait()
            .map_err(|e| TransportError::ClaimInterfaceFailed {
                interface,
                message: e.to_string(),
            })?;

        // Find INTERRUPT endpoints
        let mut in_endpoint: u8 = 0;
        let mut out_endpoint: u8 = 0;

        for config in device.configurations() {
            for iface in config.interfaces() {
                if iface.interface_number() == interface {
                    for alt in iface.alt_settings() {
                        for ep in alt.endpoints() {
                            if ep.transfer_type() == nusb::descriptors::TransferType::Interrupt {
                                if ep.direction() == nusb::transfer::Direction::In {
                                    in_endpoint = ep.address();
                                } else {
                                    out_endpoint = ep.address();
                                }
                            }
                        }
                    }
                }
            }
        }

        if in_endpoint == 0 {
            return Err(TransportError::EndpointNotFound {
                ep_type: "Interrupt".into(),
                direction: "In".into(),
            });
        }
        if out_endpoint == 0 {
            return Err(TransportError::EndpointNotFound {
                ep_type: "Interrupt".into(),
                direction: "Out".into(),
            });
        }

        let writer = claimed
            .endpoint::<Interrupt, Out>(out_endpoint)
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?
            .writer(REPORT_SIZE)
            .with_write_timeout(timeout);

        let reader = report_reader(
            claimed
                .endpoint::<Interrupt, In>(in_endpoint)
                .map_err(|e| TransportError::OpenFailed(e.to_string()))?,
            timeout,
        );

        info!(
            in_ep = %format!("0x{:02X}", in_endpoint),
            out_ep = %format!("0x{:02X}", out_endpoint),
            "Device opened successfully"
        );

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(Some(reader)),
            timeout,
            vid,
            pid,
        })
    }

    /// Cancel the IN transfer a timed-out read left in flight and throw away
    /// whatever it completes with, then rebuild the reader.
    fn discard_pending(&self, slot: &mut Option<EndpointRead<Interrupt>>) {
        let Some(reader) = slot.take() else {
            return;
        };
        let mut endpoint = reader.into_inner();
        endpoint.cancel_all();

        let mut discarded = 0;
        while endpoint.pending() > 0 {
            if endpoint.wait_next_complete(self.timeout).is_none() {
                warn!(pending = endpoint.pending(), "Cancelled transfer did not complete");
                break;
            }
            discarded += 1;
        }
        debug!(discarded, "Dropped stale IN transfers");

        *slot = Some(report_reader(endpoint, self.timeout));
    }

    fn map_io(&self, e: std::io::Error, wrap: fn(String) -> TransportError) -> TransportError {
        match e.kind() {
            ErrorKind::TimedOut => TransportError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            },
            ErrorKind::NotConnected | ErrorKind::BrokenPipe => TransportError::Disconnected,
            _ => wrap(e.to_string()),
        }
    }
}

impl HidTransport for NusbTransport {
    #[instrument(skip(self, packet), fields(cmd = %format!("0x{:02X}", packet.command())))]
    fn write_packet(&self, packet: &Packet) -> Result<(), TransportError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| TransportError::WriteFailed("writer lock poisoned".into()))?;

        // The report marker never goes over the bus.
        writer
            .write_all(packet.report())
            .map_err(|e| self.map_io(e, TransportError::WriteFailed))?;
        writer
            .flush()
            .map_err(|e| self.map_io(e, TransportError::WriteFailed))?;

        debug!(bytes_written = REPORT_SIZE, "Write complete");
        Ok(())
    }

    #[instrument(skip(self, packet))]
    fn read_packet(&self, packet: &mut Packet) -> Result<(), TransportError> {
        let mut slot = self
            .reader
            .lock()
            .map_err(|_| TransportError::ReadFailed("reader lock poisoned".into()))?;
        let reader = slot.as_mut().ok_or(TransportError::Disconnected)?;

        *packet = Packet::empty();
        let n = match reader.read(packet.report_mut()) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::TimedOut => {
                // The timeout leaves the transfer queued; its late completion
                // would otherwise answer the next request.
                self.discard_pending(&mut slot);
                return Err(TransportError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
            Err(e) => return Err(self.map_io(e, TransportError::ReadFailed)),
        };

        if n == 0 {
            return Err(TransportError::ReadFailed("Empty report".into()));
        }
        debug!(bytes_read = n, "Read complete");
        Ok(())
    }

    fn close(&self) {
        info!(
            vid = %format!("{:04X}", self.vid),
            pid = %format!("{:04X}", self.pid),
            "Releasing device"
        );
    }
}

fn report_reader(endpoint: Endpoint<Interrupt, In>, timeout: Duration) -> EndpointRead<Interrupt> {
    endpoint
        .reader(REPORT_SIZE)
        .with_num_transfers(1)
        .with_read_timeout(timeout)
}
