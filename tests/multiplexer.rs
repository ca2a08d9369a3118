use joycond::multiplexer::EventMultiplexer;
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;
use std::time::Duration;

#[test]
fn stale_readiness_is_skipped_within_a_batch() {
    let (a, mut a_peer) = UnixStream::pair().unwrap();
    let (b, mut b_peer) = UnixStream::pair().unwrap();
    let mut mux = EventMultiplexer::new(10).unwrap();
    let first = mux.add_subscriber(&[a.as_raw_fd()], "a").unwrap();
    let second = mux.add_subscriber(&[b.as_raw_fd()], "b").unwrap();

    a_peer.write_all(&[1]).unwrap();
    b_peer.write_all(&[1]).unwrap();

    // Whoever runs first deregisters the other, as a removal would.
    let mut seen = Vec::new();
    let batch = mux
        .wait_and_dispatch(Some(Duration::from_millis(100)), |mux, readiness| {
            seen.push(readiness.owner);
            let other = if readiness.subscriber == first { second } else { first };
            if mux.owner_of(other).is_some() {
                mux.remove_subscriber(other)?;
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(batch, 2);
    assert_eq!(seen.len(), 1);
    assert_eq!(mux.len(), 1);
}

#[test]
fn wait_is_bounded_by_max_events() {
    let mut streams = Vec::new();
    let mut mux = EventMultiplexer::new(2).unwrap();
    for i in 0..3 {
        let (ours, mut theirs) = UnixStream::pair().unwrap();
        theirs.write_all(&[1]).unwrap();
        mux.add_subscriber(&[ours.as_raw_fd()], i).unwrap();
        streams.push((ours, theirs));
    }

    assert_eq!(mux.wait(Some(Duration::from_millis(100))).unwrap().len(), 2);

    for (ours, _) in &mut streams {
        let mut buf = [0u8; 1];
        ours.read_exact(&mut buf).unwrap();
    }
    assert!(mux.wait(Some(Duration::ZERO)).unwrap().is_empty());
}

#[test]
fn grouped_fds_share_one_owner() {
    let (a, _a_peer) = UnixStream::pair().unwrap();
    let (b, mut b_peer) = UnixStream::pair().unwrap();
    let mut mux = EventMultiplexer::new(10).unwrap();
    let id = mux
        .add_subscriber(&[a.as_raw_fd(), b.as_raw_fd()], "controller")
        .unwrap();

    b_peer.write_all(&[1]).unwrap();
    let ready = mux.wait(Some(Duration::from_millis(100))).unwrap();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].fd, b.as_raw_fd());
    assert_eq!(ready[0].subscriber, id);
    assert_eq!(ready[0].owner, "controller");
    assert_eq!(mux.subscriber_of(a.as_raw_fd()), Some(id));
}
