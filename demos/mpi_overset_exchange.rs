// Interpolates a linear field from grid A onto grid B, where B is A mirrored
// end to end, across however many MPI ranks are launched:
//
//     mpirun -n 4 cargo run --example mpi_overset_exchange --features mpi-support
//
// Every rank owns five points of each grid. Donor k is the cell [k, k+2) of A
// and sends to point N-1-k of B, so most values cross ranks.
use overset_exchange::prelude::*;
use std::sync::Arc;

const PER_RANK: i32 = 5;

fn line(num_points: i32) -> Range {
    Range::new(1, [0, 0, 0], [num_points, 0, 0])
}

fn main() -> Result<(), ExchangeError> {
    let comm = MpiComm::new()?;
    let (rank, size) = (comm.rank(), comm.size());
    let n = PER_RANK * size as i32;
    let partition: Vec<Range> = (0..size as i32)
        .map(|r| Range::new(1, [r * PER_RANK, 0, 0], [(r + 1) * PER_RANK, 0, 0]))
        .collect();
    let local = partition[rank];

    let grid_a = GridInfo::new(0, "A", Cart::non_periodic(line(n)));
    let grid_b = GridInfo::new(1, "B", Cart::non_periodic(line(n)));
    let piece_a = Arc::new(Grid::from_partition(grid_a.clone(), rank, &partition, 1)?);
    let piece_b = Arc::new(Grid::from_partition(grid_b.clone(), rank, &partition, 1)?);

    // a cell straddling two ranks is held by both
    let donors: Vec<i32> = (0..n - 1)
        .filter(|&k| local.contains(&[k, 0, 0]) || local.contains(&[k + 1, 0, 0]))
        .collect();
    let mut m = ConnectivityM::new(piece_a, grid_b.clone());
    m.resize(donors.len(), 2);
    for (slot, &k) in m.edit_extents().iter_mut().zip(&donors) {
        *slot = Range::new(1, [k, 0, 0], [k + 2, 0, 0]);
    }
    m.edit_interp_coefs().fill(0.5);
    for (slot, &k) in m.edit_destinations().iter_mut().zip(&donors) {
        *slot = [n - 1 - k, 0, 0];
    }

    let points: Vec<i32> = local.points().map(|p| p[0]).filter(|&p| p > 0).collect();
    let mut r = ConnectivityN::new(piece_b, grid_a.clone());
    r.resize(points.len());
    for (slot, &p) in r.edit_points().iter_mut().zip(&points) {
        *slot = [p, 0, 0];
    }
    for (slot, &p) in r.edit_sources().iter_mut().zip(&points) {
        *slot = [n - 1 - p, 0, 0];
    }

    let connectivity = Connectivity::new("A->B", grid_a, grid_b)?
        .with_donors(m)?
        .with_receivers(r)?;
    let mut exchanger = Exchanger::with_profiler(comm, ExchangeOptions::default(), Profiler::new());
    let ex = exchanger.bind(connectivity)?;

    let field_a: Vec<f64> = local.points().map(|p| f64::from(p[0])).collect();
    let mut donor_values = vec![0.0; donors.len()];
    ex.collect(
        CollectOp::Interpolate,
        local,
        ArrayLayout::ColumnMajor,
        vec![&field_a[..]].into(),
        vec![&mut donor_values[..]].into(),
    )?;

    let tag = CommTag::new(0x4000);
    let mut receiver_values = vec![0.0; points.len()];
    {
        let mut requests = [
            ex.receive(tag, vec![&mut receiver_values[..]].into())?,
            ex.send(tag, vec![&donor_values[..]].into())?,
        ];
        wait_all(&mut requests)?;
    }

    let mut field_b = vec![f64::NAN; local.count()];
    ex.disperse(
        DisperseOp::Overwrite,
        local,
        ArrayLayout::ColumnMajor,
        vec![&receiver_values[..]].into(),
        vec![&mut field_b[..]].into(),
    )?;

    let wrong = points
        .iter()
        .zip(&receiver_values)
        .filter(|&(&p, &v)| v != f64::from(n - 1 - p) + 0.5)
        .count();
    println!("rank {rank}: B = {field_b:?} ({wrong} wrong)");

    if rank == 0 {
        for t in exchanger.profiler().report() {
            println!("{:<24} {:>6} calls {:?}", t.name, t.calls, t.total);
        }
    }
    exchanger.unbind(0, 1)?;
    Ok(())
}
