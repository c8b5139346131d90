//! Headless floating-origin simulation
//!
//! Two participants share a lossy loopback channel. The first flies away from
//! the origin, spends a few seconds in a vehicle, then keeps flying; the second
//! stands still and watches. Usage: `origin-sim [config.json]`.

use floating_origin::prelude::*;
use floating_origin::sync::Delivery;
use tracing::{debug, info};

const FRAME_TIME: f32 = 1.0 / 60.0;
const DURATION: f32 = 20.0;
const VEHICLE_ENTER: f32 = 8.0;
const VEHICLE_EXIT: f32 = 11.0;

struct Participant {
    session: OriginSession,
    player: KinematicPlayer,
    was_seated: bool,
}

impl Participant {
    fn new(id: PlayerId, config: &OriginConfig) -> Result<Self, OriginError> {
        let mut world = World::new();
        world.spawn_origin_rig();
        let mut session = OriginSession::new(world, config.clone())?;
        let player = KinematicPlayer::new(id);
        session.assign_local_player(&player);
        Ok(Self {
            session,
            player,
            was_seated: false,
        })
    }

    fn step(&mut self, channel: &mut LoopbackChannel) -> FrameReport {
        self.player.step(FRAME_TIME);
        let report = self.session.update(FRAME_TIME, &mut self.player, channel);

        // A vehicle is a tracked object, so it carries its passenger across shifts.
        if report.shifted && self.session.manager().in_external_authority() {
            if let Some(shift) = self.session.manager().origin_shift_history().last() {
                self.player.origin.position += shift.delta;
            }
        }

        if self.player.seated != self.was_seated {
            if self.player.seated {
                self.session.seat_entered();
            } else {
                self.session.seat_exited();
            }
            self.was_seated = self.player.seated;
        }
        report
    }

    fn broadcast(&mut self, channel: &mut LoopbackChannel) {
        if let Some(payload) = self.session.serialize_local(&self.player) {
            let sent = channel.send(self.player.id, payload);
            self.session.post_serialization(sent);
        }
    }

    fn receive(&mut self, delivery: &Delivery) {
        self.session.receive(delivery.sender, &delivery.payload, delivery.info);
    }
}

fn main() -> Result<(), OriginError> {
    floating_origin::init_logging();
    info!("Starting floating origin simulation");

    let config = match std::env::args().nth(1) {
        Some(path) => OriginConfig::load_from_file(&path)?,
        None => OriginConfig::default(),
    };
    info!(?config, "Using configuration");

    let mut channel = LoopbackChannel::new(0.1, 0.2).with_loss(7);
    let mut flyer = Participant::new(PlayerId(1), &config)?;
    let mut watcher = Participant::new(PlayerId(2), &config)?;
    flyer.session.assign_remote_player(watcher.player.id, false);
    watcher.session.assign_remote_player(flyer.player.id, false);

    flyer.player.velocity = Vec3::new(60.0, 0.0, 25.0);
    let vehicle = StationNotifier::new("vehicle");

    let frames = (DURATION / FRAME_TIME).round() as u32;
    for frame in 0..frames {
        let time = frame as f32 * FRAME_TIME;
        channel.advance(FRAME_TIME);

        if (time - VEHICLE_ENTER).abs() < FRAME_TIME / 2.0 {
            if let Some(event) = vehicle.player_entered(&flyer.player) {
                flyer.session.handle_station_event(event);
                flyer.player.seated = false;
                flyer.was_seated = false;
                flyer.player.velocity = Vec3::new(0.0, 0.0, 90.0);
            }
        }
        if (time - VEHICLE_EXIT).abs() < FRAME_TIME / 2.0 {
            if let Some(event) = vehicle.player_exited(&flyer.player) {
                flyer.session.handle_station_event(event);
                flyer.player.velocity = Vec3::new(60.0, 0.0, 25.0);
            }
        }

        let flyer_report = flyer.step(&mut channel);
        let watcher_report = watcher.step(&mut channel);
        if flyer_report.shifted {
            debug!(time, "Flyer shifted origin");
        }

        for sender in channel.take_requests() {
            if sender == flyer.player.id {
                flyer.broadcast(&mut channel);
            } else if sender == watcher.player.id {
                watcher.broadcast(&mut channel);
            }
        }
        for delivery in channel.deliver_due() {
            if delivery.sender == flyer.player.id {
                watcher.receive(&delivery);
            } else {
                flyer.receive(&delivery);
            }
        }

        if frame % 60 == 0 {
            let manager = flyer.session.manager();
            let absolute = manager.current_to_world(flyer.player.position().as_dvec3());
            let observed = watcher_report
                .rendered
                .iter()
                .find(|(owner, _)| *owner == flyer.player.id)
                .map(|(_, pose)| pose.position);
            info!(
                time,
                local = ?flyer.player.position(),
                absolute = ?absolute,
                observed = ?observed,
                shifts = manager.stats().origin_shifts_performed,
                external = manager.in_external_authority(),
                "Flyer"
            );
        }
    }

    let stats = flyer.session.manager().stats();
    info!(
        shifts = stats.origin_shifts_performed,
        total_offset = ?stats.total_origin_offset,
        world_offset = ?stats.world_offset,
        "Simulation finished"
    );
    Ok(())
}
