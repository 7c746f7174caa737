//! The contract every gamma adjustment method implements.
//!
//! A method opens the three levels of the hierarchy on request and writes
//! ramps to hardware. Its per-level state lives in the associated types and
//! is released by their `Drop` implementations when the hierarchy is torn
//! down: units first, then their partition, then the site.

use super::error::Result;
use super::ramps::Ramps;
use super::selection::Selection;

pub trait GammaMethod {
    /// State of an open site, e.g. a display connection.
    type Site;
    /// State of an open partition, e.g. a graphics card handle.
    type Partition;
    /// State of an open unit, e.g. a CRTC id.
    type Unit;

    /// Name used on the command line and as config section name.
    fn name(&self) -> &'static str;

    /// Open a site by identifier (`None` is the default site).
    ///
    /// Returns the site state and the number of partitions it has.
    fn open_site(&mut self, site: Option<&str>) -> Result<(Self::Site, usize)>;

    /// Open one partition. Returns its state and the number of units in it.
    fn open_partition(
        &mut self,
        site: &mut Self::Site,
        partition: usize,
    ) -> Result<(Self::Partition, usize)>;

    /// Open one unit and capture its current ramps.
    fn open_unit(
        &mut self,
        site: &mut Self::Site,
        partition: &mut Self::Partition,
        unit: usize,
    ) -> Result<(Self::Unit, Ramps)>;

    /// Write ramps to the unit. Callers ignore failures.
    fn apply_ramps(
        &self,
        site: &Self::Site,
        partition: &Self::Partition,
        unit: &Self::Unit,
        ramps: &Ramps,
    ) -> Result<()>;

    /// Describe why `partition` is out of range for this site.
    fn invalid_partition(&self, site: &Self::Site, available: usize, partition: usize) -> String {
        let _ = site;
        match available {
            0 => format!("Partition {} does not exist. No partitions exist.", partition),
            1 => format!("Partition {} does not exist. Only partition 0 exists.", partition),
            _ => format!(
                "Partition {} does not exist. Valid partitions are [0-{}].",
                partition,
                available - 1
            ),
        }
    }

    /// Apply a method-specific option to a selection.
    ///
    /// Returns `Ok(false)` if the key is not one this method knows.
    fn set_option(&mut self, selection: &mut Selection, key: &str, value: &str) -> Result<bool>;
}
