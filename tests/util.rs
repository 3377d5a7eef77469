#![allow(dead_code)]
//! Two-rank line fixture shared by the integration tests.
//!
//! Donor grid A (id 0) and receiver grid B (id 1) both cover points 0..10,
//! split 0..5 on rank 0 and 5..10 on rank 1. Donor `k` (k = 0..=8) has the
//! cell [k, k+2) on A, equal weights, and sends to point 9 - k on B. Donor 4
//! straddles the split and is held by both ranks. Every B point p >= 1
//! receives from the cell starting at 9 - p.
use overset_exchange::prelude::*;
use std::sync::Arc;

pub const N: i32 = 10;

pub fn pt(i: i32) -> Tuple {
    [i, 0, 0]
}

pub fn cell(a: i32, b: i32) -> Range {
    Range::new(1, [a, 0, 0], [b, 0, 0])
}

pub fn halves() -> [Range; 2] {
    [cell(0, 5), cell(5, N)]
}

pub fn grid_a() -> GridInfo {
    GridInfo::new(0, "A", Cart::non_periodic(cell(0, N)))
}

pub fn grid_b() -> GridInfo {
    GridInfo::new(1, "B", Cart::non_periodic(cell(0, N)))
}

pub fn grid_piece(info: GridInfo, rank: usize) -> Arc<Grid> {
    Arc::new(Grid::from_partition(info, rank, &halves(), 1).unwrap())
}

/// Donor ids held by `rank`, in storage order.
pub fn donor_ids(rank: usize) -> Vec<i32> {
    if rank == 0 { (0..=4).collect() } else { (4..=8).collect() }
}

/// B points received on `rank`, deliberately out of order.
pub fn receiver_points(rank: usize) -> Vec<i32> {
    if rank == 0 { vec![3, 1, 4, 2] } else { vec![7, 5, 9, 6, 8] }
}

pub fn donors(rank: usize) -> ConnectivityM {
    let ids = donor_ids(rank);
    let mut m = ConnectivityM::new(grid_piece(grid_a(), rank), grid_b());
    m.resize(ids.len(), 2);
    {
        let mut extents = m.edit_extents();
        for (slot, &k) in extents.iter_mut().zip(&ids) {
            *slot = cell(k, k + 2);
        }
    }
    {
        let mut coefs = m.edit_interp_coefs();
        coefs.fill(0.5);
    }
    {
        let mut dest = m.edit_destinations();
        for (slot, &k) in dest.iter_mut().zip(&ids) {
            *slot = pt(9 - k);
        }
    }
    m
}

pub fn receivers(rank: usize) -> ConnectivityN {
    let points = receiver_points(rank);
    let mut n = ConnectivityN::new(grid_piece(grid_b(), rank), grid_a());
    n.resize(points.len());
    n.edit_points()
        .iter_mut()
        .zip(&points)
        .for_each(|(slot, &p)| *slot = pt(p));
    n.edit_sources()
        .iter_mut()
        .zip(&points)
        .for_each(|(slot, &p)| *slot = pt(9 - p));
    n
}

pub fn connectivity(rank: usize) -> Connectivity {
    Connectivity::new("A->B", grid_a(), grid_b())
        .and_then(|c| c.with_donors(donors(rank)))
        .and_then(|c| c.with_receivers(receivers(rank)))
        .unwrap()
}

pub fn quiet() -> ExchangeOptions {
    ExchangeOptions {
        log_status: false,
        ..ExchangeOptions::default()
    }
}

pub fn build(comm: RayonComm) -> Exchange<RayonComm> {
    let rank = comm.rank();
    Exchange::create(connectivity(rank), comm, quiet(), Profiler::new()).unwrap()
}

/// Local range of `rank` on either grid.
pub fn local(rank: usize) -> Range {
    halves()[rank]
}

/// Field over the local range whose value is the global index.
pub fn ramp(rank: usize) -> Vec<f64> {
    local(rank).points().map(|p| f64::from(p[0])).collect()
}

/// Interpolated value of donor `k` on the ramp.
pub fn donor_value(k: i32) -> f64 {
    f64::from(k) + 0.5
}

/// Serial 4×3 plane fixture, periodic in x on the donor grid.
///
/// Donor 0 is the interior cell [1,3)×[1,3) and sends to B point (3,2).
/// Donor 1 is [3,5)×[0,2), which wraps across the x seam onto column 0, and
/// sends to B point (0,1).
pub fn plane() -> Range {
    Range::new(2, [0, 0, 0], [4, 3, 0])
}

pub fn plane_connectivity() -> Connectivity {
    let a = GridInfo::new(0, "P", Cart::new(plane(), [true, false, false], PeriodicStorage::Unique));
    let b = GridInfo::new(1, "Q", Cart::non_periodic(plane()));

    let mut m = ConnectivityM::new(Arc::new(Grid::new(a.clone(), plane(), vec![])), b.clone());
    m.resize(2, 2);
    m.edit_extents().copy_from_slice(&[
        Range::new(2, [1, 1, 0], [3, 3, 0]),
        Range::new(2, [3, 0, 0], [5, 2, 0]),
    ]);
    m.edit_interp_coefs().fill(0.5);
    m.edit_destinations().copy_from_slice(&[[3, 2, 0], [0, 1, 0]]);

    let mut n = ConnectivityN::new(Arc::new(Grid::new(b.clone(), plane(), vec![])), a.clone());
    n.resize(2);
    n.edit_points().copy_from_slice(&[[3, 2, 0], [0, 1, 0]]);
    n.edit_sources().copy_from_slice(&[[1, 1, 0], [3, 0, 0]]);

    Connectivity::new("P->Q", a, b)
        .and_then(|c| c.with_donors(m))
        .and_then(|c| c.with_receivers(n))
        .unwrap()
}

/// `x + 10 y` over the plane, stored in `layout`.
pub fn plane_field(layout: ArrayLayout) -> Vec<f64> {
    let idx = overset_exchange::topology::RangeIndexer::new(plane(), layout);
    let mut field = vec![0.0; plane().count()];
    for p in plane().points() {
        field[idx.to_index(&p)] = f64::from(p[0] + 10 * p[1]);
    }
    field
}
