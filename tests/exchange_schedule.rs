mod util;

use overset_exchange::exchange::{CollectRecv, CollectSend, RecvRecord, SendRecord};
use overset_exchange::prelude::*;
use util::*;

#[test]
fn schedule_pairs_senders_with_receivers() {
    let schedules = run_local(2, |comm| build(comm).schedule().clone());

    let s0 = &schedules[0];
    assert_eq!(s0.sends(), &[SendRecord { rank: 1, count: 5 }]);
    assert_eq!(s0.recvs(), &[RecvRecord { rank: 1, count: 4 }]);
    assert_eq!(s0.collect_sends(), &[CollectSend { rank: 1, points: vec![pt(4)] }]);
    assert_eq!(s0.collect_recvs(), &[CollectRecv { rank: 1, num_points: 1 }]);
    assert_eq!(s0.donors_sorted(), &[4, 3, 2, 1, 0]);
    assert_eq!(s0.receivers_sorted(), &[1, 3, 0, 2]);

    let s1 = &schedules[1];
    assert_eq!(s1.sends(), &[SendRecord { rank: 0, count: 4 }]);
    assert_eq!(s1.recvs(), &[RecvRecord { rank: 0, count: 5 }]);
    assert_eq!(s1.collect_recvs(), &[CollectRecv { rank: 0, num_points: 1 }]);
    assert_eq!(s1.receivers_sorted(), &[1, 3, 0, 4, 2]);
    // the straddling donor is sent by the owner of its lower corner only
    assert_eq!(s1.donor_send_indices()[0], None);
    assert_eq!(s1.donor_dest_ranks()[0], Some(1));
}

#[test]
fn send_counts_match_communicating_donors() {
    for s in run_local(2, |comm| build(comm).schedule().clone()) {
        let total: usize = s.sends().iter().map(|r| r.count).sum();
        assert_eq!(total, s.donor_send_indices().iter().flatten().count());
        let total: usize = s.recvs().iter().map(|r| r.count).sum();
        assert_eq!(total, s.receiver_recv_indices().iter().flatten().count());
    }
}

#[test]
fn update_without_edits_is_idempotent() {
    run_local(2, |comm| {
        let mut ex = build(comm);
        let before = ex.schedule().clone();
        ex.update().unwrap();
        assert_eq!(ex.schedule(), &before);
        ex.rebuild_all().unwrap();
        assert_eq!(ex.schedule(), &before);
    });
}

#[test]
fn destination_edit_on_one_rank_rebuilds_everywhere() {
    let results = run_local(2, |comm| {
        let rank = comm.rank();
        let mut ex = build(comm);
        let before = ex.schedule().clone();
        if rank == 0 {
            // donors 1 and 2 trade destinations
            let mut dest = ex.connectivity_mut().donors_mut().unwrap().edit_destinations();
            dest.swap(1, 2);
        }
        assert_eq!(ex.connectivity().pending_edits().donor_destinations, rank == 0);
        ex.update().unwrap();
        assert!(!ex.connectivity().pending_edits().any());
        (before, ex.schedule().clone())
    });
    let (before, after) = &results[0];
    assert_eq!(after.donors_sorted(), &[4, 3, 1, 2, 0]);
    assert_eq!(after.sends(), before.sends());
    let (before, after) = &results[1];
    assert_eq!(after, before);
}

#[test]
fn pending_edits_block_data_transfer() {
    run_local(2, |comm| {
        let rank = comm.rank();
        let mut ex = build(comm);
        {
            let n = ex.connectivity_mut().receivers_mut().unwrap();
            let first = n.points()[0];
            n.edit_points()[0] = first;
        }
        let mut out = vec![0.0; receiver_points(rank).len()];
        let err = ex.receive(CommTag::new(0x3000), vec![&mut out[..]].into()).unwrap_err();
        assert!(matches!(err, ExchangeError::ScheduleOutOfDate(_)));
        ex.update().unwrap();
        assert_eq!(ex.schedule().receivers_sorted().len(), out.len());
    });
}

#[test]
fn info_reports_local_participation() {
    let infos = run_local(2, |comm| build(comm).info());
    for info in infos {
        assert_eq!(info.name, "A->B");
        assert_eq!((info.donor_grid, info.receiver_grid, info.num_dims), (0, 1, 1));
        assert!(info.has_donor_side && info.has_receiver_side);
    }
}

#[test]
fn options_round_trip_through_json() {
    let opts = ExchangeOptions {
        log_status: false,
        ..ExchangeOptions::default()
    };
    let text = serde_json::to_string(&opts).unwrap();
    let back: ExchangeOptions = serde_json::from_str(&text).unwrap();
    assert_eq!(back, opts);

    let partial: ExchangeOptions = serde_json::from_str(r#"{"log_status": false}"#).unwrap();
    assert_eq!(partial.tags, ExchangeOptions::default().tags);
}

#[test]
fn schedule_serializes_for_inspection() {
    let s = run_local(2, |comm| build(comm).schedule().clone()).remove(0);
    let json = serde_json::to_value(&s).unwrap();
    assert_eq!(json["sends"][0]["count"], 5);
    assert_eq!(json["collect_recvs"][0]["rank"], 1);
}

#[test]
fn exchanger_binds_one_exchange_per_grid_pair() {
    run_local(2, |comm| {
        let rank = comm.rank();
        let mut exchanger = Exchanger::with_profiler(comm, quiet(), Profiler::new());
        exchanger.bind(connectivity(rank)).unwrap();
        assert!(matches!(
            exchanger.bind(connectivity(rank)),
            Err(ExchangeError::AlreadyBound { donor_grid: 0, receiver_grid: 1 })
        ));
        assert_eq!(exchanger.keys().collect::<Vec<_>>(), vec![(0, 1)]);
        exchanger.update_all().unwrap();
        assert!(exchanger.exchange(0, 1).is_some());

        let conn = exchanger.unbind(0, 1).unwrap();
        assert_eq!(conn.name(), "A->B");
        assert!(exchanger.is_empty());
        assert!(matches!(
            exchanger.unbind(0, 1),
            Err(ExchangeError::NotBound { .. })
        ));
    });
}
