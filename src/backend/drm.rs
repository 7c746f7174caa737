//! Direct Rendering Manager gamma control.
//!
//! Partitions are the graphics cards `/dev/dri/card0`, `card1`, ... and
//! units are their CRTCs. Reading gamma works for any user with access to
//! the device node; writing needs DRM master, so it fails silently while a
//! display server runs.

use regex::Regex;
use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::constants::DRM_DIR;
use crate::gamma::{GammaError, GammaMethod, Ramps, Result, Selection};
use crate::logger::Log;
use crate::utils::parse_index_or_all;

#[allow(dead_code)]
mod ioctl {
    //! Kernel structures from `drm_mode.h`.

    #[repr(C)]
    #[derive(Debug, Default)]
    pub struct CardRes {
        pub fb_id_ptr: u64,
        pub crtc_id_ptr: u64,
        pub connector_id_ptr: u64,
        pub encoder_id_ptr: u64,
        pub count_fbs: u32,
        pub count_crtcs: u32,
        pub count_connectors: u32,
        pub count_encoders: u32,
        pub min_width: u32,
        pub max_width: u32,
        pub min_height: u32,
        pub max_height: u32,
    }

    #[repr(C)]
    #[derive(Debug, Default)]
    pub struct ModeInfo {
        pub clock: u32,
        pub hdisplay: u16,
        pub hsync_start: u16,
        pub hsync_end: u16,
        pub htotal: u16,
        pub hskew: u16,
        pub vdisplay: u16,
        pub vsync_start: u16,
        pub vsync_end: u16,
        pub vtotal: u16,
        pub vscan: u16,
        pub vrefresh: u32,
        pub flags: u32,
        pub kind: u32,
        pub name: [u8; 32],
    }

    #[repr(C)]
    #[derive(Debug, Default)]
    pub struct Crtc {
        pub set_connectors_ptr: u64,
        pub count_connectors: u32,
        pub crtc_id: u32,
        pub fb_id: u32,
        pub x: u32,
        pub y: u32,
        pub gamma_size: u32,
        pub mode_valid: u32,
        pub mode: ModeInfo,
    }

    #[repr(C)]
    #[derive(Debug, Default)]
    pub struct CrtcLut {
        pub crtc_id: u32,
        pub gamma_size: u32,
        pub red: u64,
        pub green: u64,
        pub blue: u64,
    }

    nix::ioctl_readwrite!(get_resources, b'd', 0xA0, CardRes);
    nix::ioctl_readwrite!(get_crtc, b'd', 0xA1, Crtc);
    nix::ioctl_readwrite!(get_gamma, b'd', 0xA4, CrtcLut);
    nix::ioctl_readwrite!(set_gamma, b'd', 0xA5, CrtcLut);
}

/// Device directory holding the card nodes.
pub struct DrmSite {
    dir: PathBuf,
}

/// An opened card with the CRTC ids it reported.
pub struct DrmCard {
    index: usize,
    file: File,
    crtc_ids: Vec<u32>,
}

pub struct DrmCrtc {
    id: u32,
    gamma_size: usize,
}

#[derive(Debug, Default)]
pub struct DrmMethod;

impl DrmMethod {
    /// Whether at least one card node exists.
    pub fn is_available() -> bool {
        count_cards(Path::new(DRM_DIR)) > 0
    }
}

fn card_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^card(\d+)$").ok())
        .as_ref()
}

/// Number of consecutive `cardN` nodes starting at `card0`.
pub fn count_cards(dir: &Path) -> usize {
    let Some(pattern) = card_pattern() else {
        return 0;
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    let mut present: Vec<usize> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            let captures = pattern.captures(name.to_str()?)?;
            captures.get(1)?.as_str().parse().ok()
        })
        .collect();
    present.sort_unstable();
    present
        .iter()
        .enumerate()
        .take_while(|(expected, found)| expected == *found)
        .count()
}

fn card_resources(file: &File) -> std::io::Result<Vec<u32>> {
    let fd = file.as_raw_fd();
    let mut res = ioctl::CardRes::default();
    // SAFETY: `res` is a valid CardRes and all pointers are null
    unsafe { ioctl::get_resources(fd, &mut res) }?;

    let mut crtc_ids = vec![0u32; res.count_crtcs as usize];
    let mut second = ioctl::CardRes {
        count_crtcs: res.count_crtcs,
        crtc_id_ptr: crtc_ids.as_mut_ptr() as u64,
        ..Default::default()
    };
    // SAFETY: crtc_id_ptr points to count_crtcs writable u32s
    unsafe { ioctl::get_resources(fd, &mut second) }?;
    crtc_ids.truncate(second.count_crtcs.min(res.count_crtcs) as usize);
    Ok(crtc_ids)
}

impl GammaMethod for DrmMethod {
    type Site = DrmSite;
    type Partition = DrmCard;
    type Unit = DrmCrtc;

    fn name(&self) -> &'static str {
        "drm"
    }

    fn open_site(&mut self, site: Option<&str>) -> Result<(DrmSite, usize)> {
        let dir = PathBuf::from(site.unwrap_or(DRM_DIR));
        let cards = count_cards(&dir);
        if cards == 0 {
            return Err(GammaError::open(
                "drm",
                format!("No graphics cards found in {}.", dir.display()),
            ));
        }
        Ok((DrmSite { dir }, cards))
    }

    fn open_partition(&mut self, site: &mut DrmSite, partition: usize) -> Result<(DrmCard, usize)> {
        let path = site.dir.join(format!("card{}", partition));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| GammaError::open("drm", format!("Failed to open {}: {}", path.display(), e)))?;
        let crtc_ids = card_resources(&file).map_err(|e| {
            GammaError::open("drm", format!("Failed to get resources of card {}: {}", partition, e))
        })?;
        Log::log_debug(&format!("Card {} has {} CRTC(s)", partition, crtc_ids.len()));

        let units = crtc_ids.len();
        Ok((
            DrmCard {
                index: partition,
                file,
                crtc_ids,
            },
            units,
        ))
    }

    fn open_unit(&mut self, _site: &mut DrmSite, card: &mut DrmCard, unit: usize) -> Result<(DrmCrtc, Ramps)> {
        let fd = card.file.as_raw_fd();
        let id = card.crtc_ids[unit];

        let mut crtc = ioctl::Crtc {
            crtc_id: id,
            ..Default::default()
        };
        // SAFETY: `crtc` is a valid Crtc and set_connectors_ptr is null
        unsafe { ioctl::get_crtc(fd, &mut crtc) }.map_err(std::io::Error::from)?;

        let gamma_size = crtc.gamma_size as usize;
        if gamma_size < 2 {
            return Err(GammaError::open(
                "drm",
                format!(
                    "Could not get gamma ramp size for CRTC {} on card {}.",
                    unit, card.index
                ),
            ));
        }

        let mut red = vec![0u16; gamma_size];
        let mut green = vec![0u16; gamma_size];
        let mut blue = vec![0u16; gamma_size];
        let mut lut = ioctl::CrtcLut {
            crtc_id: id,
            gamma_size: crtc.gamma_size,
            red: red.as_mut_ptr() as u64,
            green: green.as_mut_ptr() as u64,
            blue: blue.as_mut_ptr() as u64,
        };
        // SAFETY: each channel pointer addresses gamma_size writable u16s
        unsafe { ioctl::get_gamma(fd, &mut lut) }.map_err(std::io::Error::from)?;

        let saved = Ramps::from_channels(&red, &green, &blue)?;
        Ok((DrmCrtc { id, gamma_size }, saved))
    }

    fn apply_ramps(&self, _site: &DrmSite, card: &DrmCard, crtc: &DrmCrtc, ramps: &Ramps) -> Result<()> {
        if ramps.red_len() != crtc.gamma_size {
            return Err(GammaError::open("drm", "Ramp size does not match CRTC"));
        }
        let mut lut = ioctl::CrtcLut {
            crtc_id: crtc.id,
            gamma_size: crtc.gamma_size as u32,
            red: ramps.red().as_ptr() as u64,
            green: ramps.green().as_ptr() as u64,
            blue: ramps.blue().as_ptr() as u64,
        };
        // SAFETY: the kernel only reads gamma_size entries from each channel
        unsafe { ioctl::set_gamma(card.file.as_raw_fd(), &mut lut) }.map_err(std::io::Error::from)?;
        Ok(())
    }

    fn invalid_partition(&self, _site: &DrmSite, available: usize, partition: usize) -> String {
        match available {
            0 => format!("Card {} does not exist. No cards exist.", partition),
            1 => format!("Card {} does not exist. Only card 0 exists.", partition),
            _ => format!(
                "Card {} does not exist. Valid cards are [0-{}].",
                partition,
                available - 1
            ),
        }
    }

    fn set_option(&mut self, selection: &mut Selection, key: &str, value: &str) -> Result<bool> {
        let (slot, label) = match key.to_ascii_lowercase().as_str() {
            "card" => (&mut selection.partition, "Card"),
            "crtc" => (&mut selection.unit, "CRTC"),
            _ => return Ok(false),
        };
        *slot = parse_index_or_all(value).ok_or_else(|| {
            GammaError::invalid_option(
                key,
                value,
                format!("{} must be `all' or a non-negative integer.", label),
            )
        })?;
        Ok(true)
    }
}
