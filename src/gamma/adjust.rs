//! Adjustment engine: recompute ramps from settings and push them to
//! hardware, or put the captured ramps back.

use super::colorramp;
use super::selection::{Selector, UnitSettings};
use super::{GammaMethod, GammaState};
use crate::logger::Log;

impl<M: GammaMethod> GammaState<M> {
    /// Write every unit's captured ramps back to hardware.
    pub fn restore(&self) {
        for entry in self.units() {
            if let Err(e) =
                self.method
                    .apply_ramps(entry.site, entry.partition, entry.unit.data(), entry.unit.saved())
            {
                Log::log_debug(&format!("Restoring ramps failed: {}", e));
            }
        }
    }

    /// Recompute every unit's ramps from its settings and write them.
    pub fn update(&mut self) {
        let preserve = self.preserve_calibrations;
        for unit in self.units_mut() {
            let base = preserve.then_some(&unit.saved);
            colorramp::fill(&mut unit.current, base, &unit.settings);
        }

        for entry in self.units() {
            if let Err(e) = self.method.apply_ramps(
                entry.site,
                entry.partition,
                entry.unit.data(),
                entry.unit.current(),
            ) {
                Log::log_debug(&format!("Applying ramps failed: {}", e));
            }
        }
    }

    /// Change the settings of the units the selector addresses.
    ///
    /// A fully concrete selector is looked up directly and ignored if it
    /// does not address an opened unit.
    pub fn update_settings<F>(&mut self, selector: Selector, mut change: F)
    where
        F: FnMut(&mut UnitSettings),
    {
        if let Some((site, partition, unit)) = selector.exact() {
            let target = self
                .sites
                .get_mut(site)
                .and_then(|s| s.partitions.get_mut(partition))
                .filter(|p| p.is_used())
                .and_then(|p| p.units.iter_mut().find(|u| u.index == unit));
            if let Some(target) = target {
                change(&mut target.settings);
            }
            return;
        }

        let all = selector.is_all();
        for unit in self.units_mut() {
            if all || selector.matches(unit.site_index, unit.partition_index, unit.index) {
                change(&mut unit.settings);
            }
        }
    }

    pub fn set_gamma(&mut self, selector: Selector, gamma: [f32; 3]) {
        self.update_settings(selector, |s| s.set_gamma(gamma));
    }

    pub fn set_brightness(&mut self, selector: Selector, brightness: f32) {
        self.update_settings(selector, |s| s.set_brightness(brightness));
    }

    pub fn set_temperature(&mut self, selector: Selector, temperature: f32) {
        self.update_settings(selector, |s| s.set_temperature(temperature));
    }
}
