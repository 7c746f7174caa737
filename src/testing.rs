//! In-memory gamma method for tests.
//!
//! [`RecordingMethod`] pretends to drive a configurable set of sites,
//! partitions and units and records every call it receives in an
//! [`EventLog`] that stays readable after the method has been moved into a
//! [`GammaState`](crate::gamma::GammaState) or boxed as a backend.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::gamma::{GammaError, GammaMethod, Ramps, Result, Selection};
use crate::utils::parse_index_or_all;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    OpenSite(Option<String>),
    OpenPartition { site: Option<String>, partition: usize },
    OpenUnit { partition: usize, unit: usize },
    Apply { partition: usize, unit: usize, ramps: Vec<u16> },
}

/// Shared handle to the events a [`RecordingMethod`] saw.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    fn lock(&self) -> MutexGuard<'_, Vec<Event>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, event: Event) {
        self.lock().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    /// Ramps written so far, in order.
    pub fn applied(&self) -> Vec<((usize, usize), Vec<u16>)> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                Event::Apply {
                    partition,
                    unit,
                    ramps,
                } => Some(((*partition, *unit), ramps.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.lock().iter().filter(|e| matches(e)).count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

pub struct RecordingSite {
    id: Option<String>,
    partitions: Vec<usize>,
}

/// Method over a fixed layout: site id to unit count per partition.
pub struct RecordingMethod {
    layout: BTreeMap<Option<String>, Vec<usize>>,
    ramp_size: usize,
    log: EventLog,
}

impl RecordingMethod {
    /// A default site with the given unit count per partition.
    pub fn new(partitions: &[usize]) -> Self {
        let mut layout = BTreeMap::new();
        layout.insert(None, partitions.to_vec());
        Self {
            layout,
            ramp_size: 8,
            log: EventLog::default(),
        }
    }

    pub fn with_site(mut self, id: &str, partitions: &[usize]) -> Self {
        self.layout.insert(Some(id.to_string()), partitions.to_vec());
        self
    }

    pub fn with_ramp_size(mut self, size: usize) -> Self {
        self.ramp_size = size;
        self
    }

    pub fn log(&self) -> EventLog {
        self.log.clone()
    }

    /// The saved red ramp of a unit starts with this marker.
    pub fn calibration_marker(partition: usize, unit: usize) -> u16 {
        (partition * 100 + unit + 1) as u16
    }
}

impl GammaMethod for RecordingMethod {
    type Site = RecordingSite;
    type Partition = usize;
    type Unit = (usize, usize);

    fn name(&self) -> &'static str {
        "recording"
    }

    fn open_site(&mut self, site: Option<&str>) -> Result<(RecordingSite, usize)> {
        let id = site.map(str::to_string);
        let partitions = self
            .layout
            .get(&id)
            .cloned()
            .ok_or_else(|| GammaError::open("recording", format!("No site {:?}", site)))?;
        self.log.push(Event::OpenSite(id.clone()));
        let count = partitions.len();
        Ok((RecordingSite { id, partitions }, count))
    }

    fn open_partition(&mut self, site: &mut RecordingSite, partition: usize) -> Result<(usize, usize)> {
        self.log.push(Event::OpenPartition {
            site: site.id.clone(),
            partition,
        });
        Ok((partition, site.partitions[partition]))
    }

    fn open_unit(
        &mut self,
        _site: &mut RecordingSite,
        partition: &mut usize,
        unit: usize,
    ) -> Result<((usize, usize), Ramps)> {
        self.log.push(Event::OpenUnit {
            partition: *partition,
            unit,
        });
        let mut saved = Ramps::identity(self.ramp_size)?;
        let (red, _, _) = saved.channels_mut();
        red[0] = Self::calibration_marker(*partition, unit);
        Ok(((*partition, unit), saved))
    }

    fn apply_ramps(
        &self,
        _site: &RecordingSite,
        _partition: &usize,
        unit: &(usize, usize),
        ramps: &Ramps,
    ) -> Result<()> {
        self.log.push(Event::Apply {
            partition: unit.0,
            unit: unit.1,
            ramps: ramps.as_slice().to_vec(),
        });
        Ok(())
    }

    fn set_option(&mut self, selection: &mut Selection, key: &str, value: &str) -> Result<bool> {
        let index = || {
            parse_index_or_all(value).ok_or_else(|| {
                GammaError::invalid_option(key, value, "must be `all' or a non-negative integer.")
            })
        };
        match key {
            "site" => selection.site = Some(value.to_string()),
            "partition" => selection.partition = index()?,
            "unit" => selection.unit = index()?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}
