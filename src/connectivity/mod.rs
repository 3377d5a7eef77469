//! Donor/receiver connectivity between two grids.
//!
//! The connectivity is produced by an assembly step outside this crate. It is
//! split into the donor side ([`ConnectivityM`]) and the receiver side
//! ([`ConnectivityN`]); a rank holds whichever sides its grid pieces need.
//! Structural edits are tracked in [`ConnectivityEdits`] and folded into the
//! exchange schedule by [`Exchange::update`](crate::exchange::Exchange::update).

pub mod donors;
pub mod edit;
pub mod receivers;

pub use donors::ConnectivityM;
pub use edit::Edit;
pub use receivers::ConnectivityN;

use crate::exchange_error::ExchangeError;
use crate::topology::grid::GridInfo;

/// Which connectivity arrays changed since the last schedule rebuild.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectivityEdits {
    pub num_donors: bool,
    pub donor_extents: bool,
    pub donor_destinations: bool,
    pub donor_destination_ranks: bool,
    pub num_receivers: bool,
    pub receiver_points: bool,
    pub receiver_sources: bool,
    pub receiver_source_ranks: bool,
}

impl ConnectivityEdits {
    pub fn all() -> Self {
        Self::from_bits(u32::MAX)
    }

    pub fn any(&self) -> bool {
        self.to_bits() != 0
    }

    pub fn merge(&self, other: &Self) -> Self {
        Self::from_bits(self.to_bits() | other.to_bits())
    }

    pub fn to_bits(&self) -> u32 {
        [
            self.num_donors,
            self.donor_extents,
            self.donor_destinations,
            self.donor_destination_ranks,
            self.num_receivers,
            self.receiver_points,
            self.receiver_sources,
            self.receiver_source_ranks,
        ]
        .iter()
        .enumerate()
        .fold(0, |bits, (i, &set)| bits | (u32::from(set) << i))
    }

    pub fn from_bits(bits: u32) -> Self {
        let bit = |i: u32| bits & (1 << i) != 0;
        Self {
            num_donors: bit(0),
            donor_extents: bit(1),
            donor_destinations: bit(2),
            donor_destination_ranks: bit(3),
            num_receivers: bit(4),
            receiver_points: bit(5),
            receiver_sources: bit(6),
            receiver_source_ranks: bit(7),
        }
    }
}

/// Connectivity from a donor grid to a receiver grid.
#[derive(Clone, Debug)]
pub struct Connectivity {
    name: String,
    donor_grid: GridInfo,
    receiver_grid: GridInfo,
    donors: Option<ConnectivityM>,
    receivers: Option<ConnectivityN>,
}

impl Connectivity {
    pub fn new(
        name: impl Into<String>,
        donor_grid: GridInfo,
        receiver_grid: GridInfo,
    ) -> Result<Self, ExchangeError> {
        let name = name.into();
        if donor_grid.num_dims() != receiver_grid.num_dims() {
            return Err(ExchangeError::InconsistentConnectivity {
                name,
                reason: format!(
                    "donor grid has {} dimensions, receiver grid {}",
                    donor_grid.num_dims(),
                    receiver_grid.num_dims()
                ),
            });
        }
        Ok(Self {
            name,
            donor_grid,
            receiver_grid,
            donors: None,
            receivers: None,
        })
    }

    /// Attach the donor side held by this rank.
    pub fn with_donors(mut self, donors: ConnectivityM) -> Result<Self, ExchangeError> {
        if donors.grid().info() != &self.donor_grid || donors.destination_grid() != &self.receiver_grid {
            return Err(self.inconsistent("donor side refers to different grids"));
        }
        self.donors = Some(donors);
        Ok(self)
    }

    /// Attach the receiver side held by this rank.
    pub fn with_receivers(mut self, receivers: ConnectivityN) -> Result<Self, ExchangeError> {
        if receivers.grid().info() != &self.receiver_grid || receivers.source_grid() != &self.donor_grid {
            return Err(self.inconsistent("receiver side refers to different grids"));
        }
        self.receivers = Some(receivers);
        Ok(self)
    }

    fn inconsistent(&self, reason: &str) -> ExchangeError {
        ExchangeError::InconsistentConnectivity {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn num_dims(&self) -> usize {
        self.donor_grid.num_dims()
    }
    pub fn donor_grid(&self) -> &GridInfo {
        &self.donor_grid
    }
    pub fn receiver_grid(&self) -> &GridInfo {
        &self.receiver_grid
    }

    pub fn donors(&self) -> Option<&ConnectivityM> {
        self.donors.as_ref()
    }
    pub fn donors_mut(&mut self) -> Option<&mut ConnectivityM> {
        self.donors.as_mut()
    }
    pub fn receivers(&self) -> Option<&ConnectivityN> {
        self.receivers.as_ref()
    }
    pub fn receivers_mut(&mut self) -> Option<&mut ConnectivityN> {
        self.receivers.as_mut()
    }

    /// Edits not yet folded into a schedule.
    pub fn pending_edits(&self) -> ConnectivityEdits {
        let m = self.donors.as_ref().map(|m| m.edits).unwrap_or_default();
        let n = self.receivers.as_ref().map(|n| n.edits).unwrap_or_default();
        m.merge(&n)
    }

    pub(crate) fn take_edits(&mut self) -> ConnectivityEdits {
        let pending = self.pending_edits();
        if let Some(m) = self.donors.as_mut() {
            m.edits = ConnectivityEdits::default();
        }
        if let Some(n) = self.receivers.as_mut() {
            n.edits = ConnectivityEdits::default();
        }
        pending
    }

    /// Raise `edits` again after a failed schedule rebuild. Flags land on
    /// the donor side when present, otherwise on the receiver side.
    pub(crate) fn restore_edits(&mut self, edits: ConnectivityEdits) {
        if let Some(m) = self.donors.as_mut() {
            m.edits = m.edits.merge(&edits);
        } else if let Some(n) = self.receivers.as_mut() {
            n.edits = n.edits.merge(&edits);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_bits_round_trip_each_flag() {
        for i in 0..8 {
            let e = ConnectivityEdits::from_bits(1 << i);
            assert_eq!(e.to_bits(), 1 << i);
            assert!(e.any());
        }
        assert!(!ConnectivityEdits::default().any());
        assert_eq!(ConnectivityEdits::all().to_bits(), 0xFF);
    }
}
