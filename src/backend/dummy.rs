//! Method that touches no hardware.
//!
//! Exposes a single unit with an identity ramp. Useful for trying settings
//! and for running without a display.

use crate::constants::DUMMY_RAMP_SIZE;
use crate::gamma::{GammaError, GammaMethod, Ramps, Result, Selection};
use crate::logger::Log;
use crate::utils::parse_index_or_all;

#[derive(Debug, Default)]
pub struct DummyMethod;

impl GammaMethod for DummyMethod {
    type Site = ();
    type Partition = ();
    type Unit = usize;

    fn name(&self) -> &'static str {
        "dummy"
    }

    fn open_site(&mut self, site: Option<&str>) -> Result<((), usize)> {
        match site {
            None => Ok(((), 1)),
            Some(id) => Err(GammaError::open("dummy", format!("Unknown site `{}'.", id))),
        }
    }

    fn open_partition(&mut self, _site: &mut (), _partition: usize) -> Result<((), usize)> {
        Ok(((), 1))
    }

    fn open_unit(&mut self, _site: &mut (), _partition: &mut (), unit: usize) -> Result<(usize, Ramps)> {
        Ok((unit, Ramps::identity(DUMMY_RAMP_SIZE)?))
    }

    fn apply_ramps(&self, _site: &(), _partition: &(), unit: &usize, ramps: &Ramps) -> Result<()> {
        let last = |channel: &[u16]| channel.last().copied().unwrap_or(0);
        Log::log_debug(&format!(
            "Dummy CRTC {}: white point {}:{}:{}",
            unit,
            last(ramps.red()),
            last(ramps.green()),
            last(ramps.blue())
        ));
        Ok(())
    }

    fn set_option(&mut self, selection: &mut Selection, key: &str, value: &str) -> Result<bool> {
        if !key.eq_ignore_ascii_case("crtc") {
            return Ok(false);
        }
        selection.unit = parse_index_or_all(value).ok_or_else(|| {
            GammaError::invalid_option(key, value, "CRTC must be `all' or a non-negative integer.")
        })?;
        Ok(true)
    }
}
