use overset_exchange::algs::communicator::{
    CommTag, Communicator, NoComm, RayonComm, Wait, run_local,
};
use std::sync::atomic::{AtomicUsize, Ordering};

fn pair() -> (RayonComm, RayonComm) {
    let mut w = RayonComm::world(2);
    let c1 = w.pop().unwrap();
    let c0 = w.pop().unwrap();
    (c0, c1)
}

#[test]
fn rayon_round_trip() {
    let tag = CommTag(0x1000);
    let (c0, c1) = pair();

    let msg = b"hello";
    c0.isend(1, tag.base(), msg);

    let mut buf = [0u8; 5];
    let h = c1.irecv(0, tag.base(), &mut buf);
    let got = h.wait().unwrap();
    assert_eq!(&got, msg);
}

#[test]
fn rayon_fifo_order() {
    let tag = CommTag(0x1001);
    let (c0, c1) = pair();

    for i in 0..10u8 {
        c0.isend(1, tag.base(), &[i]);
    }
    let mut out = Vec::new();
    for _ in 0..10 {
        let mut b = [0u8; 1];
        let h = c1.irecv(0, tag.base(), &mut b);
        out.push(h.wait().unwrap()[0]);
    }
    assert_eq!(out, (0u8..10u8).collect::<Vec<_>>());
}

#[test]
fn truncation_is_ok() {
    let tag = CommTag(0x1002);
    let (c0, c1) = pair();

    c0.isend(1, tag.base(), &[1, 2, 3, 4, 5, 6]);
    let mut b = [0u8; 4];
    let h = c1.irecv(0, tag.base(), &mut b);
    assert_eq!(h.wait().unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn tags_keep_messages_apart() {
    let tag = CommTag(0x1003);
    let (c0, c1) = pair();

    c0.isend(1, tag.offset(1).base(), &[2]);
    c0.isend(1, tag.base(), &[1]);
    let mut b = [0u8; 1];
    let mut h = c1.irecv(0, tag.base(), &mut b);
    assert!(h.test());
    assert_eq!(h.wait().unwrap(), vec![1]);
    let h = c1.irecv(0, tag.offset(1).base(), &mut b);
    assert_eq!(h.wait().unwrap(), vec![2]);
}

#[test]
fn groups_are_isolated() {
    let tag = CommTag(0x1004);
    let (a0, _a1) = pair();
    let (_b0, b1) = pair();

    a0.isend(1, tag.base(), &[7]);
    let mut b = [0u8; 1];
    let mut h = b1.irecv(0, tag.base(), &mut b);
    assert!(!h.test());
}

#[test]
fn no_comm_delivers_to_itself() {
    let c = NoComm;
    assert_eq!((c.rank(), c.size()), (0, 1));
    assert!(c.is_no_comm());
    c.barrier();

    let mut b = [0u8; 4];
    assert_eq!(c.irecv(0, 7, &mut b).wait(), None);
    c.isend(0, 7, &[1, 2, 3, 4, 5]);
    assert_eq!(c.irecv(0, 7, &mut b).wait(), Some(vec![1, 2, 3, 4]));
}

#[test]
fn barrier_waits_for_every_rank() {
    let arrived = AtomicUsize::new(0);
    let seen = run_local(4, |comm| {
        arrived.fetch_add(1, Ordering::SeqCst);
        comm.barrier();
        arrived.load(Ordering::SeqCst)
    });
    assert_eq!(seen, vec![4; 4]);
}
