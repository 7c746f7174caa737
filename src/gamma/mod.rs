//! Backend-agnostic gamma hierarchy.
//!
//! Hardware is modelled as sites (display connections or device
//! namespaces) holding partitions (screens or graphics cards) holding units
//! (CRTCs). A [`GammaState`] collects [`Selection`]s from config and command
//! line, then resolves them into a hierarchy of opened units through its
//! [`GammaMethod`]. Each unit keeps the ramps captured when it was opened
//! so they can be restored on exit.
//!
//! Fields are declared so that children drop before their parent's method
//! state, and all sites drop before the method itself.

pub mod adjust;
pub mod colorramp;
pub mod error;
pub mod iter;
pub mod method;
pub mod ramps;
pub mod selection;

pub use error::{GammaError, Result};
pub use iter::{UnitIter, UnitRef};
pub use method::GammaMethod;
pub use ramps::Ramps;
pub use selection::{Selection, Selector, UnitSettings};

use crate::logger::Log;
use crate::utils::{parse_flag, parse_gamma};

/// One opened hardware gamma target.
pub struct Unit<M: GammaMethod> {
    pub site_index: usize,
    pub partition_index: usize,
    pub index: usize,
    pub settings: UnitSettings,
    saved: Ramps,
    current: Ramps,
    data: M::Unit,
}

impl<M: GammaMethod> Unit<M> {
    /// Ramps captured when the unit was opened.
    pub fn saved(&self) -> &Ramps {
        &self.saved
    }

    /// Ramps computed by the last update.
    pub fn current(&self) -> &Ramps {
        &self.current
    }

    pub fn data(&self) -> &M::Unit {
        &self.data
    }
}

/// A screen or card. Unused until a selection covers it.
pub struct Partition<M: GammaMethod> {
    units_available: usize,
    units: Vec<Unit<M>>,
    data: Option<M::Partition>,
}

impl<M: GammaMethod> Partition<M> {
    fn unused() -> Self {
        Self {
            units_available: 0,
            units: Vec::new(),
            data: None,
        }
    }

    pub fn is_used(&self) -> bool {
        self.data.is_some()
    }

    pub fn units_available(&self) -> usize {
        self.units_available
    }

    pub fn units(&self) -> &[Unit<M>] {
        &self.units
    }
}

/// A display connection or device namespace.
pub struct Site<M: GammaMethod> {
    id: Option<String>,
    partitions_available: usize,
    partitions: Vec<Partition<M>>,
    data: M::Site,
}

impl<M: GammaMethod> Site<M> {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn partitions_available(&self) -> usize {
        self.partitions_available
    }

    pub fn partitions(&self) -> &[Partition<M>] {
        &self.partitions
    }
}

/// Selections plus the hierarchy opened from them, driven by one method.
pub struct GammaState<M: GammaMethod> {
    sites: Vec<Site<M>>,
    selections: Vec<Selection>,
    preserve_calibrations: bool,
    method: M,
}

impl<M: GammaMethod> GammaState<M> {
    /// Create an empty state holding only the default selection.
    pub fn new(method: M) -> Self {
        Self {
            sites: Vec::new(),
            selections: vec![Selection::default_template()],
            preserve_calibrations: false,
            method,
        }
    }

    pub fn method(&self) -> &M {
        &self.method
    }

    pub fn sites(&self) -> &[Site<M>] {
        &self.sites
    }

    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    pub fn preserve_calibrations(&self) -> bool {
        self.preserve_calibrations
    }

    /// Add a selection initialised from the default one. Returns its index.
    pub fn add_selection(&mut self) -> usize {
        let template = self
            .selections
            .first()
            .cloned()
            .unwrap_or_else(Selection::default_template);
        self.selections.push(template);
        self.selections.len() - 1
    }

    /// Set an option on one selection, or on every selection for `None`.
    ///
    /// `gamma` and `preserve-calibrations` are understood here; any other
    /// key goes to the method.
    pub fn set_option(&mut self, key: &str, value: &str, section: Option<usize>) -> Result<()> {
        let range = match section {
            None => 0..self.selections.len(),
            Some(i) if i < self.selections.len() => i..i + 1,
            Some(i) => return Err(GammaError::NoSuchSelection(i)),
        };

        if key.eq_ignore_ascii_case("preserve-calibrations") {
            self.preserve_calibrations = parse_flag(value).ok_or_else(|| {
                GammaError::invalid_option(key, value, "expected 0 or 1")
            })?;
            return Ok(());
        }

        if key.eq_ignore_ascii_case("gamma") {
            let gamma = parse_gamma(value)
                .map_err(|e| GammaError::invalid_option(key, value, e.to_string()))?;
            for selection in &mut self.selections[range] {
                selection.settings.set_gamma(gamma);
            }
            return Ok(());
        }

        let name = self.method.name();
        for selection in &mut self.selections[range] {
            if !self.method.set_option(selection, key, value)? {
                return Err(GammaError::UnknownOption {
                    method: name,
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Open every site, partition and unit the selections refer to.
    ///
    /// With only the default selection present, it stands for all units of
    /// the default site. Otherwise the default selection only serves as a
    /// template and is skipped. The selection list is consumed.
    pub fn resolve_selections(&mut self) -> Result<()> {
        let selections = std::mem::take(&mut self.selections);
        let pass = if selections.len() > 1 {
            &selections[1..]
        } else {
            &selections[..]
        };

        for selection in pass {
            self.resolve_selection(selection)?;
        }
        Ok(())
    }

    fn find_site(&self, id: Option<&str>) -> Option<usize> {
        self.sites.iter().position(|site| site.id.as_deref() == id)
    }

    fn open_site(&mut self, id: Option<&str>) -> Result<usize> {
        self.sites
            .try_reserve(1)
            .map_err(|_| GammaError::OutOfMemory { what: "site" })?;

        let (data, partitions_available) = self.method.open_site(id)?;

        let mut partitions = Vec::new();
        partitions
            .try_reserve_exact(partitions_available)
            .map_err(|_| GammaError::OutOfMemory { what: "partitions" })?;
        partitions.resize_with(partitions_available, Partition::unused);

        self.sites.push(Site {
            id: id.map(str::to_string),
            partitions_available,
            partitions,
            data,
        });
        Log::log_debug(&format!(
            "Opened site {} with {} partition(s)",
            id.unwrap_or("(default)"),
            partitions_available
        ));
        Ok(self.sites.len() - 1)
    }

    fn resolve_selection(&mut self, selection: &Selection) -> Result<()> {
        let site_index = match self.find_site(selection.site.as_deref()) {
            Some(index) => index,
            None => self.open_site(selection.site.as_deref())?,
        };

        let Self { sites, method, .. } = self;
        let site = &mut sites[site_index];

        let partitions = match selection.partition {
            None => 0..site.partitions_available,
            Some(p) if p < site.partitions_available => p..p + 1,
            Some(p) => {
                return Err(GammaError::InvalidPartition(method.invalid_partition(
                    &site.data,
                    site.partitions_available,
                    p,
                )));
            }
        };

        for partition_index in partitions {
            let Site {
                partitions, data, ..
            } = &mut *site;
            let partition = &mut partitions[partition_index];

            if partition.data.is_none() {
                let (partition_data, units_available) =
                    method.open_partition(data, partition_index)?;
                partition.units_available = units_available;
                partition.data = Some(partition_data);
            }

            open_units(
                method,
                data,
                partition,
                (site_index, partition_index),
                selection,
            )?;
        }
        Ok(())
    }
}

fn open_units<M: GammaMethod>(
    method: &mut M,
    site_data: &mut M::Site,
    partition: &mut Partition<M>,
    (site_index, partition_index): (usize, usize),
    selection: &Selection,
) -> Result<()> {
    let Partition {
        units_available,
        units,
        data,
    } = partition;
    let Some(partition_data) = data.as_mut() else {
        return Ok(());
    };

    let range = match selection.unit {
        None => 0..*units_available,
        Some(u) if u < *units_available => u..u + 1,
        Some(u) => {
            return Err(GammaError::InvalidUnit {
                unit: u,
                valid: describe_valid_units(*units_available),
            });
        }
    };

    for index in range {
        // Opened by an earlier selection: the later selection's settings win
        if let Some(existing) = units.iter_mut().find(|unit| unit.index == index) {
            existing.settings = selection.settings;
            continue;
        }

        units
            .try_reserve(1)
            .map_err(|_| GammaError::OutOfMemory { what: "unit" })?;

        let (data, saved) = method.open_unit(site_data, partition_data, index)?;
        let current = Ramps::zeroed_like(&saved)?;

        units.push(Unit {
            site_index,
            partition_index,
            index,
            settings: selection.settings,
            saved,
            current,
            data,
        });
    }
    Ok(())
}

fn describe_valid_units(available: usize) -> String {
    match available {
        0 => "No CRTCs exist.".to_string(),
        1 => "Only CRTC 0 exists.".to_string(),
        n => format!("Valid CRTCs are [0-{}].", n - 1),
    }
}
