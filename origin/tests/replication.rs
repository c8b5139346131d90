//! End-to-end replication between two sessions over a loopback channel

use floating_origin::prelude::*;
use floating_origin::sync::Delivery;

const DT: f32 = 1.0 / 60.0;

fn init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

struct Peer {
    session: OriginSession,
    player: KinematicPlayer,
}

impl Peer {
    fn new(id: u32, config: &OriginConfig) -> Self {
        let mut world = World::new();
        world.spawn_origin_rig();
        let mut session = OriginSession::new(world, config.clone()).unwrap();
        let player = KinematicPlayer::new(PlayerId(id));
        session.assign_local_player(&player);
        Self { session, player }
    }
}

/// Owner `a` broadcasts to observer `b`
struct Link {
    a: Peer,
    b: Peer,
    channel: LoopbackChannel,
    time: f32,
}

impl Link {
    fn new(config: OriginConfig) -> Self {
        let a = Peer::new(1, &config);
        let mut b = Peer::new(2, &config);
        b.session.assign_remote_player(a.player.id, false);
        Self {
            a,
            b,
            channel: LoopbackChannel::new(0.05, 0.15),
            time: 0.0,
        }
    }

    /// Run one frame, returning b's view of a
    fn step(&mut self) -> Option<RenderedPose> {
        self.time += DT;
        self.channel.advance(DT);

        self.a.player.step(DT);
        self.a.session.update(DT, &mut self.a.player, &mut self.channel);
        let report = self.b.session.update(DT, &mut self.b.player, &mut self.channel);

        for sender in self.channel.take_requests() {
            if sender != self.a.player.id {
                continue;
            }
            if let Some(payload) = self.a.session.serialize_local(&self.a.player) {
                let sent = self.channel.send(sender, payload);
                self.a.session.post_serialization(sent);
            }
        }
        let deliveries: Vec<Delivery> = self.channel.deliver_due();
        for delivery in deliveries {
            if delivery.sender == self.a.player.id {
                self.b.session.receive(delivery.sender, &delivery.payload, delivery.info);
            }
        }

        report
            .rendered
            .iter()
            .find(|(owner, _)| *owner == self.a.player.id)
            .map(|(_, pose)| *pose)
    }

    /// Position of `a` relative to its own anchor
    fn owner_anchor_relative(&self) -> Vec3 {
        let anchor = self.a.session.manager().anchor_position(self.a.session.world());
        self.a.player.position() - anchor
    }
}

#[test]
fn test_observer_tracks_owner_across_shifts() {
    init();
    let config = OriginConfig {
        distance_move_threshold: 50.0,
        check_interval: 0.5,
        ..Default::default()
    };
    let mut link = Link::new(config);
    link.a.player.velocity = Vec3::new(40.0, 0.0, 0.0);

    let mut last_x = f32::MIN;
    let mut rendered_frames = 0;
    for _ in 0..(8.0 / DT) as usize {
        if let Some(pose) = link.step() {
            rendered_frames += 1;
            // Constant velocity, so the observed path never jumps backwards.
            assert!(pose.position.x >= last_x - 1e-2, "{} < {}", pose.position.x, last_x);
            // Observation can lag at most by the playout delay plus a broadcast interval.
            let lag = link.owner_anchor_relative().x - pose.position.x;
            assert!(lag < 40.0 * 0.7, "lag {lag}");
            last_x = pose.position.x;
        }
    }

    assert!(rendered_frames > 0);
    assert!(link.a.session.manager().stats().origin_shifts_performed >= 4);
    assert_eq!(link.b.session.manager().stats().origin_shifts_performed, 0);
}

#[test]
fn test_exit_from_external_authority_snaps_next_render() {
    init();
    let mut link = Link::new(OriginConfig::default());

    for _ in 0..60 {
        link.step();
    }

    link.a.session.external_authority_entered();
    assert!(!link.a.session.local_sync().unwrap().borrow().is_active());
    // The vehicle carries the player far away while replication is suspended.
    link.a.player.origin.position += Vec3::new(0.0, 0.0, 80.0);
    for _ in 0..60 {
        link.step();
    }
    link.a.session.external_authority_exited();
    assert!(link.a.session.local_sync().unwrap().borrow().synced().discontinuity);

    let mut snapped = None;
    for _ in 0..120 {
        if let Some(pose) = link.step() {
            if pose.position.z > 1.0 {
                snapped = Some(pose);
                break;
            }
        }
    }

    let pose = snapped.expect("observer never saw the player leave the vehicle");
    assert!(pose.snapped);
    assert!((pose.position.z - 80.0).abs() < 1e-3, "blended into {:?}", pose.position);
    assert!(!link.a.session.local_sync().unwrap().borrow().synced().discontinuity);
}

#[test]
fn test_malformed_payloads_are_dropped() {
    init();
    let mut link = Link::new(OriginConfig::default());
    let info = DeserializationInfo {
        send_time: 0.0,
        receive_time: 0.1,
    };

    assert!(!link.b.session.receive(PlayerId(1), b"\xff\xfe", info));
    assert!(!link.b.session.receive(
        PlayerId(1),
        br#"{"position":[0,0],"rotation_yaw":0,"discontinuity":false}"#,
        info
    ));

    let sync = link.b.session.remote_sync(PlayerId(1)).unwrap();
    assert!(sync.borrow().buffer().is_empty());

    // Good traffic still flows afterwards.
    for _ in 0..60 {
        link.step();
    }
    assert!(!sync.borrow().buffer().is_empty());
}

#[test]
fn test_lost_first_broadcast_keeps_discontinuity() {
    init();
    let mut link = Link::new(OriginConfig::default());
    link.channel = LoopbackChannel::new(0.05, 0.15).with_loss(1);

    for _ in 0..60 {
        link.step();
    }

    let sync = link.a.session.local_sync().unwrap();
    assert!(sync.borrow().synced().discontinuity);
    assert_eq!(link.channel.in_flight(), 0);
}
