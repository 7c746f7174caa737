//! Traversal over all opened units.

use super::{GammaMethod, GammaState, Site, Unit};

/// A unit together with the method state of its site and partition.
pub struct UnitRef<'a, M: GammaMethod> {
    pub site: &'a M::Site,
    pub partition: &'a M::Partition,
    pub unit: &'a Unit<M>,
}

/// Visits units site by site, partition by partition, skipping unused
/// partitions. Holds no state beyond the current position.
pub struct UnitIter<'a, M: GammaMethod> {
    sites: &'a [Site<M>],
    site: usize,
    partition: usize,
    unit: usize,
}

impl<'a, M: GammaMethod> UnitIter<'a, M> {
    pub fn new(sites: &'a [Site<M>]) -> Self {
        Self {
            sites,
            site: 0,
            partition: 0,
            unit: 0,
        }
    }
}

impl<'a, M: GammaMethod> Iterator for UnitIter<'a, M> {
    type Item = UnitRef<'a, M>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let site = self.sites.get(self.site)?;

            let Some(partition) = site.partitions.get(self.partition) else {
                self.site += 1;
                self.partition = 0;
                self.unit = 0;
                continue;
            };

            let (Some(partition_data), Some(unit)) =
                (partition.data.as_ref(), partition.units.get(self.unit))
            else {
                self.partition += 1;
                self.unit = 0;
                continue;
            };

            self.unit += 1;
            return Some(UnitRef {
                site: &site.data,
                partition: partition_data,
                unit,
            });
        }
    }
}

impl<M: GammaMethod> GammaState<M> {
    /// Iterate over every opened unit.
    pub fn units(&self) -> UnitIter<'_, M> {
        UnitIter::new(&self.sites)
    }

    /// Mutable access to every opened unit, in the same order as [`units`].
    ///
    /// [`units`]: GammaState::units
    pub fn units_mut(&mut self) -> impl Iterator<Item = &mut Unit<M>> {
        self.sites
            .iter_mut()
            .flat_map(|site| site.partitions.iter_mut())
            .filter(|partition| partition.is_used())
            .flat_map(|partition| partition.units.iter_mut())
    }
}
