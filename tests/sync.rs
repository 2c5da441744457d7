//! Two roots kept in sync over loopback links

use std::thread;
use std::time::{Duration, Instant};

use mixer_osc_control::codec::{self, Argument};
use mixer_osc_control::mixer::Mixer;
use mixer_osc_control::network::{ring_pair, slip, ByteTransport, OscConnector};
use mixer_osc_control::tree::ExecuteOutcome;
use mixer_osc_control::{NodeConfig, OscRoot};

/// Poll both roots until neither has anything left to handle.
/// Returns the number of rounds that carried traffic.
fn settle(a: &mut OscRoot, b: &mut OscRoot) -> usize {
    for round in 0..32 {
        let handled = a.poll() + b.poll();
        if handled == 0 {
            return round;
        }
    }
    panic!("links never went quiet");
}

fn linked_pair() -> (OscRoot, Mixer, OscRoot, Mixer) {
    let mut authority = OscRoot::new(true, false);
    let mut mirror = OscRoot::new(false, false);
    let (a_end, b_end) = ring_pair(8192);
    authority.add_connector(Box::new(OscConnector::stream("to-mirror", a_end)));
    mirror.add_connector(Box::new(OscConnector::stream("to-authority", b_end)));

    let authority_mixer = Mixer::new(&mut authority, "ch1", 2).unwrap();
    let mirror_mixer = Mixer::new(&mut mirror, "ch1", 2).unwrap();
    (authority, authority_mixer, mirror, mirror_mixer)
}

#[test]
fn mirror_change_round_trips_without_loop() {
    let (mut authority, authority_mixer, mut mirror, mirror_mixer) = linked_pair();

    let f0 = mirror_mixer.eq[1].f0();
    assert_eq!(mirror.set(f0, 500.0), ExecuteOutcome::Changed);

    let rounds = settle(&mut authority, &mut mirror);
    assert!(rounds >= 1);

    assert_eq!(authority_mixer.eq[1].params(&authority).f0, 500.0);
    assert_eq!(mirror_mixer.eq[1].params(&mirror).f0, 500.0);

    // The mirror sent one message, the authority echoed it once, and the
    // echo stopped at the mirror
    assert_eq!(mirror.stats().messages_sent, 1);
    assert_eq!(authority.stats().messages_sent, 1);
    assert_eq!(mirror.stats().packets_received, 1);
}

#[test]
fn authority_change_reaches_mirror() {
    let (mut authority, authority_mixer, mut mirror, mirror_mixer) = linked_pair();

    authority.set(authority_mixer.eq[0].gain(), -6.0);
    settle(&mut authority, &mut mirror);

    assert_eq!(mirror_mixer.eq[0].params(&mirror).gain, -6.0);
    assert_eq!(mirror.stats().messages_sent, 0);
}

#[test]
fn authority_config_announced_at_init() {
    let mut authority = OscRoot::new(true, true);
    let mut mirror = OscRoot::new(false, false);
    let (a_end, b_end) = ring_pair(8192);
    authority.add_connector(Box::new(OscConnector::stream("to-mirror", a_end)));
    mirror.add_connector(Box::new(OscConnector::stream("to-authority", b_end)));

    let mirror_mixer = Mixer::new(&mut mirror, "ch1", 1).unwrap();
    let _authority_mixer = Mixer::new(&mut authority, "ch1", 1).unwrap();

    let mut config = NodeConfig::new();
    config.insert("/ch1/eq/0/f0".into(), vec![Argument::Float32(1000.0)]);
    config.insert("/ch1/reverb/delay".into(), vec![Argument::Int32(480)]);
    authority.load_node_config(&config);

    settle(&mut authority, &mut mirror);
    assert_eq!(mirror_mixer.eq[0].params(&mirror).f0, 1000.0);
    assert_eq!(mirror_mixer.reverb.params(&mirror).delay, 480);
}

#[test]
fn resync_with_trigger_address() {
    let (mut authority, authority_mixer, mut mirror, mirror_mixer) = linked_pair();

    // Values diverge while the link is down
    let gain = authority_mixer.eq[0].gain();
    let down = authority.connector_ids();
    let link = authority.remove_connector(down[0]).unwrap();
    authority.set(gain, 3.0);
    authority.add_connector(link);

    assert!(authority.trigger_address("/ch1/eq"));
    settle(&mut authority, &mut mirror);
    assert_eq!(mirror_mixer.eq[0].params(&mirror).gain, 3.0);
}

#[test]
fn driver_thread_feeds_root() {
    let mut root = OscRoot::new(false, false);
    let (local, mut device) = ring_pair(4096);
    root.add_connector(Box::new(OscConnector::stream("usb", local)));
    let mixer = Mixer::new(&mut root, "ch1", 1).unwrap();

    let driver = thread::spawn(move || {
        let packet = codec::encode_message("/ch1/reverb/gain", &[Argument::Float32(0.75)]).unwrap();
        let mut framed = Vec::new();
        slip::encode(&packet, &mut framed);
        // Deliver in small pieces, like a serial line would
        for chunk in framed.chunks(3) {
            device.write(chunk);
            thread::sleep(Duration::from_millis(1));
        }
        device
    });

    let deadline = Instant::now() + Duration::from_secs(5);
    while mixer.reverb.params(&root).gain != 0.75 && Instant::now() < deadline {
        root.poll();
        thread::sleep(Duration::from_millis(1));
    }
    driver.join().unwrap();
    assert_eq!(mixer.reverb.params(&root).gain, 0.75);
}

#[cfg(feature = "udp")]
#[test]
fn udp_roots_stay_in_sync() {
    use mixer_osc_control::network::UdpTransport;

    let mut authority = OscRoot::new(true, false);
    let authority_link = UdpTransport::bind("127.0.0.1:0".parse().unwrap(), None).unwrap();
    let authority_addr = authority_link.local_addr().unwrap();
    authority.add_connector(Box::new(OscConnector::datagram("udp", authority_link)));

    let mut mirror = OscRoot::new(false, false);
    let mirror_link = UdpTransport::bind("127.0.0.1:0".parse().unwrap(), Some(authority_addr)).unwrap();
    mirror.add_connector(Box::new(OscConnector::datagram("udp", mirror_link)));

    let authority_mixer = Mixer::new(&mut authority, "ch1", 1).unwrap();
    let mirror_mixer = Mixer::new(&mut mirror, "ch1", 1).unwrap();

    mirror.set(mirror_mixer.eq[0].f0(), 2000.0);

    let deadline = Instant::now() + Duration::from_secs(5);
    while authority.stats().messages_sent == 0 && Instant::now() < deadline {
        authority.poll();
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(authority_mixer.eq[0].params(&authority).f0, 2000.0);

    // The echo lands on the mirror and stops there
    let deadline = Instant::now() + Duration::from_secs(5);
    while mirror.stats().packets_received == 0 && Instant::now() < deadline {
        mirror.poll();
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(mirror.stats().packets_received, 1);
    assert_eq!(mirror.stats().messages_sent, 1);
}
