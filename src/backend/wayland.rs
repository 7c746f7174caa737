//! Wayland gamma control through `wlr-gamma-control-unstable-v1`.
//!
//! A site is a Wayland display connection with a single partition (the
//! compositor). Its units are the advertised outputs. The protocol does not
//! expose the current gamma table, so the saved ramps are identity ramps;
//! the compositor restores the real table when a gamma control is
//! destroyed.
//!
//! Events that arrive after startup are read before every write, so a
//! control the compositor revoked is skipped instead of written to.

use memmap2::MmapMut;
use std::cell::RefCell;
use std::io;
use std::os::fd::AsFd;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use wayland_client::{
    Connection, Dispatch, EventQueue, Proxy, QueueHandle,
    backend::WaylandError,
    protocol::{wl_output::WlOutput, wl_registry},
};
use wayland_protocols_wlr::gamma_control::v1::client::{
    zwlr_gamma_control_manager_v1::ZwlrGammaControlManagerV1,
    zwlr_gamma_control_v1::{self, ZwlrGammaControlV1},
};

use crate::gamma::{GammaError, GammaMethod, Ramps, Result, Selection};
use crate::logger::Log;
use crate::utils::parse_index_or_all;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlStatus {
    Pending,
    Ready(u32),
    Failed,
}

/// Globals and gamma control events collected by the event queue.
#[derive(Default)]
pub struct WaylandState {
    outputs: Vec<WlOutput>,
    manager: Option<ZwlrGammaControlManagerV1>,
    controls: Vec<ControlStatus>,
}

impl Dispatch<wl_registry::WlRegistry, ()> for WaylandState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let wl_registry::Event::Global {
            name,
            interface,
            version,
        } = event
        else {
            return;
        };

        if interface == WlOutput::interface().name {
            let output = registry.bind::<WlOutput, _, _>(name, version.min(3), qh, ());
            state.outputs.push(output);
        } else if interface == ZwlrGammaControlManagerV1::interface().name {
            let manager = registry.bind::<ZwlrGammaControlManagerV1, _, _>(name, 1, qh, ());
            state.manager = Some(manager);
        }
    }
}

impl Dispatch<WlOutput, ()> for WaylandState {
    fn event(
        _: &mut Self,
        _: &WlOutput,
        _: <WlOutput as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwlrGammaControlManagerV1, ()> for WaylandState {
    fn event(
        _: &mut Self,
        _: &ZwlrGammaControlManagerV1,
        _: <ZwlrGammaControlManagerV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

/// User data is the output index the control belongs to.
impl Dispatch<ZwlrGammaControlV1, usize> for WaylandState {
    fn event(
        state: &mut Self,
        _: &ZwlrGammaControlV1,
        event: zwlr_gamma_control_v1::Event,
        output: &usize,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let status = match event {
            zwlr_gamma_control_v1::Event::GammaSize { size } => ControlStatus::Ready(size),
            zwlr_gamma_control_v1::Event::Failed => ControlStatus::Failed,
            _ => return,
        };
        if let Some(slot) = state.controls.get_mut(*output) {
            *slot = status;
        }
    }
}

impl WaylandState {
    fn is_failed(&self, output: usize) -> bool {
        self.controls.get(output) == Some(&ControlStatus::Failed)
    }
}

struct Events {
    queue: EventQueue<WaylandState>,
    state: WaylandState,
}

impl Events {
    /// Read whatever the compositor sent without blocking and dispatch it.
    fn poll(&mut self) -> Result<()> {
        if let Some(guard) = self.queue.prepare_read() {
            match guard.read() {
                Ok(_) => {}
                Err(WaylandError::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(protocol_error(e)),
            }
        }
        self.queue
            .dispatch_pending(&mut self.state)
            .map(|_| ())
            .map_err(protocol_error)
    }
}

pub struct WaylandSite {
    conn: Connection,
    events: RefCell<Events>,
}

impl Drop for WaylandSite {
    fn drop(&mut self) {
        // Send the destroy requests of the units dropped before us
        let _ = self.conn.flush();
    }
}

pub struct WaylandOutput {
    control: ZwlrGammaControlV1,
    index: usize,
    size: usize,
}

impl Drop for WaylandOutput {
    fn drop(&mut self) {
        self.control.destroy();
    }
}

#[derive(Debug, Default)]
pub struct WaylandMethod;

impl WaylandMethod {
    pub fn is_available() -> bool {
        std::env::var_os("WAYLAND_DISPLAY").is_some()
    }
}

fn connect(display: Option<&str>) -> Result<Connection> {
    let Some(display) = display else {
        return Connection::connect_to_env()
            .map_err(|e| GammaError::open("wayland", format!("Failed to connect: {}", e)));
    };

    let mut path = PathBuf::from(display);
    if path.is_relative() {
        let runtime = std::env::var_os("XDG_RUNTIME_DIR")
            .ok_or_else(|| GammaError::open("wayland", "XDG_RUNTIME_DIR is not set."))?;
        path = PathBuf::from(runtime).join(display);
    }
    let stream = UnixStream::connect(&path).map_err(|e| {
        GammaError::open("wayland", format!("Failed to connect to {}: {}", path.display(), e))
    })?;
    Connection::from_socket(stream)
        .map_err(|e| GammaError::open("wayland", format!("Failed to connect: {}", e)))
}

fn protocol_error(e: impl std::fmt::Display) -> GammaError {
    GammaError::open("wayland", format!("Protocol error: {}", e))
}

fn roundtrip(site: &mut WaylandSite) -> Result<()> {
    let events = site.events.get_mut();
    events
        .queue
        .roundtrip(&mut events.state)
        .map(|_| ())
        .map_err(protocol_error)
}

/// Gamma tables as the protocol wants them: red, green and blue in host
/// byte order, one after another.
fn ramp_bytes(ramps: &Ramps) -> impl Iterator<Item = [u8; 2]> + '_ {
    ramps.as_slice().iter().map(|value| value.to_ne_bytes())
}

impl GammaMethod for WaylandMethod {
    type Site = WaylandSite;
    type Partition = ();
    type Unit = WaylandOutput;

    fn name(&self) -> &'static str {
        "wayland"
    }

    fn open_site(&mut self, display: Option<&str>) -> Result<(WaylandSite, usize)> {
        let conn = connect(display)?;
        let queue = conn.new_event_queue();
        conn.display().get_registry(&queue.handle(), ());

        let mut site = WaylandSite {
            conn,
            events: RefCell::new(Events {
                queue,
                state: WaylandState::default(),
            }),
        };
        roundtrip(&mut site)?;

        if site.events.get_mut().state.manager.is_none() {
            return Err(GammaError::open(
                "wayland",
                "The compositor does not support wlr-gamma-control-unstable-v1.",
            ));
        }
        Ok((site, 1))
    }

    fn open_partition(&mut self, site: &mut WaylandSite, _partition: usize) -> Result<((), usize)> {
        let state = &mut site.events.get_mut().state;
        let outputs = state.outputs.len();
        state.controls = vec![ControlStatus::Pending; outputs];
        Log::log_debug(&format!("Compositor has {} output(s)", outputs));
        Ok(((), outputs))
    }

    fn open_unit(&mut self, site: &mut WaylandSite, _partition: &mut (), unit: usize) -> Result<(WaylandOutput, Ramps)> {
        let events = site.events.get_mut();
        let qh = events.queue.handle();
        let (Some(manager), Some(output)) = (&events.state.manager, events.state.outputs.get(unit)) else {
            return Err(GammaError::open("wayland", format!("Output {} vanished.", unit)));
        };
        let control = manager.get_gamma_control(output, &qh, unit);
        roundtrip(site)?;

        let status = site
            .events
            .get_mut()
            .state
            .controls
            .get(unit)
            .copied()
            .unwrap_or(ControlStatus::Pending);
        let size = match status {
            ControlStatus::Ready(size) if size >= 2 => size as usize,
            ControlStatus::Failed => {
                control.destroy();
                return Err(GammaError::open(
                    "wayland",
                    format!("Gamma control for output {} is in use by another client.", unit),
                ));
            }
            _ => {
                control.destroy();
                return Err(GammaError::open(
                    "wayland",
                    format!("Could not get gamma ramp size for output {}.", unit),
                ));
            }
        };

        Ok((
            WaylandOutput {
                control,
                index: unit,
                size,
            },
            Ramps::identity(size)?,
        ))
    }

    fn apply_ramps(&self, site: &WaylandSite, _partition: &(), output: &WaylandOutput, ramps: &Ramps) -> Result<()> {
        if ramps.red_len() != output.size {
            return Err(GammaError::open("wayland", "Ramp size does not match output"));
        }

        if let Ok(mut events) = site.events.try_borrow_mut() {
            events.poll()?;
            if events.state.is_failed(output.index) {
                return Err(GammaError::open(
                    "wayland",
                    format!("Gamma control for output {} was revoked.", output.index),
                ));
            }
        }

        let file = tempfile::tempfile()?;
        file.set_len((ramps.len() * 2) as u64)?;
        // SAFETY: the file is private to this process and sized above
        let mut map = unsafe { MmapMut::map_mut(&file)? };
        for (dst, bytes) in map.chunks_exact_mut(2).zip(ramp_bytes(ramps)) {
            dst.copy_from_slice(&bytes);
        }
        map.flush()?;

        output.control.set_gamma(file.as_fd());
        site.conn
            .flush()
            .map_err(|e| GammaError::open("wayland", format!("Failed to send ramps: {}", e)))
    }

    fn invalid_partition(&self, _site: &WaylandSite, _available: usize, partition: usize) -> String {
        format!(
            "Partition {} does not exist. A Wayland display has only partition 0.",
            partition
        )
    }

    fn set_option(&mut self, selection: &mut Selection, key: &str, value: &str) -> Result<bool> {
        match key.to_ascii_lowercase().as_str() {
            "display" => selection.site = Some(value.to_string()),
            "output" | "crtc" => {
                selection.unit = parse_index_or_all(value).ok_or_else(|| {
                    GammaError::invalid_option(
                        key,
                        value,
                        "Output must be `all' or a non-negative integer.",
                    )
                })?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_output_options() {
        let mut method = WaylandMethod;
        let mut selection = Selection::default_template();
        assert!(method.set_option(&mut selection, "display", "wayland-1").unwrap());
        assert!(method.set_option(&mut selection, "output", "2").unwrap());
        assert_eq!(selection.site.as_deref(), Some("wayland-1"));
        assert_eq!(selection.unit, Some(2));
        assert!(method.set_option(&mut selection, "output", "second").is_err());
        assert!(!method.set_option(&mut selection, "card", "0").unwrap());
    }

    #[test]
    fn test_ramp_bytes_are_host_order_and_contiguous() {
        let ramps = Ramps::from_channels(&[1, 2], &[3, 4], &[5, 0xABCD]).unwrap();
        let bytes: Vec<[u8; 2]> = ramp_bytes(&ramps).collect();
        assert_eq!(bytes.len(), 6);
        assert_eq!(bytes[0], 1u16.to_ne_bytes());
        assert_eq!(bytes[5], 0xABCDu16.to_ne_bytes());
    }

    #[test]
    fn test_failed_controls_are_tracked_per_output() {
        let mut state = WaylandState {
            controls: vec![ControlStatus::Ready(256), ControlStatus::Failed],
            ..Default::default()
        };
        assert!(!state.is_failed(0));
        assert!(state.is_failed(1));
        assert!(!state.is_failed(2));

        state.controls[0] = ControlStatus::Failed;
        assert!(state.is_failed(0));
    }

    #[test]
    fn test_missing_socket_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("wayland-missing");
        let mut method = WaylandMethod;
        assert!(method.open_site(missing.to_str()).is_err());
    }
}
