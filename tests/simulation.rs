//! End-to-end scenarios driving the whole pipeline: broad phase, narrow
//! phase, solver and islands together.

use glam::Vec2;
use physics2d::{
    BodyDesc, BodyKey, Bounds, Collider, CollisionFilter, Contact, ContactListener, Material,
    PhysicsConfig, PhysicsWorld, Shape,
};
use std::cell::RefCell;
use std::rc::Rc;

const DT: f32 = 1.0 / 60.0;

fn ground(world: &mut PhysicsWorld, y: f32) -> BodyKey {
    world.create_body(
        &BodyDesc::fixed()
            .with_position(Vec2::new(0.0, y))
            .with_collider(
                Collider::new(Shape::rect(20.0, 1.0)).with_material(Material::new(0.6, 0.0, 1.0)),
            ),
    )
}

fn unit_box(world: &mut PhysicsWorld, position: Vec2) -> BodyKey {
    world.create_body(
        &BodyDesc::dynamic().with_position(position).with_collider(
            Collider::new(Shape::rect(0.5, 0.5)).with_material(Material::new(0.5, 0.0, 1.0)),
        ),
    )
}

#[test]
fn falling_box_settles_on_the_ground() {
    let mut world = PhysicsWorld::new();
    ground(&mut world, -5.0);
    let falling = unit_box(&mut world, Vec2::new(0.0, 5.0));

    for _ in 0..300 {
        world.update(DT);
    }

    let (velocity, angular) = world.velocity(falling).unwrap();
    assert!(velocity.length() < 0.02, "still moving: {velocity:?}");
    assert!(angular.abs() < 0.05);

    // ground top is at -4; the box rests half a unit above, penetration
    // bounded by the contact skin
    let y = world.position(falling).unwrap().y;
    assert!(y > -3.5 - 0.005, "penetrating too deep: {y}");
    assert!(y < -3.4, "floating: {y}");
}

#[test]
fn warm_starting_converges_at_rest() {
    let mut build = || {
        let mut world = PhysicsWorld::new();
        ground(&mut world, -5.0);
        // start slightly sunk into the ground so there is work to do
        let key = unit_box(&mut world, Vec2::new(0.0, -3.55));
        (world, key)
    };

    let (mut world, key) = build();
    let before = world.position(key).unwrap();
    world.update(DT);
    let mid = world.position(key).unwrap();
    world.update(DT);
    let after = world.position(key).unwrap();

    let first_delta = (mid - before).length();
    let second_delta = (after - mid).length();
    assert!(
        second_delta <= first_delta + 1e-4,
        "solver diverging: {first_delta} then {second_delta}"
    );
}

#[test]
fn box_stack_stays_standing() {
    let mut world = PhysicsWorld::new();
    ground(&mut world, -5.0);
    let mut stack = Vec::new();
    for i in 0..3 {
        stack.push(unit_box(&mut world, Vec2::new(0.0, -3.45 + i as f32 * 1.01)));
    }

    for _ in 0..300 {
        world.update(DT);
    }

    for (i, &key) in stack.iter().enumerate() {
        let position = world.position(key).unwrap();
        assert!(
            position.x.abs() < 0.2,
            "box {i} slid sideways to {position:?}"
        );
        let expected_y = -3.5 + i as f32;
        assert!(
            (position.y - expected_y).abs() < 0.1,
            "box {i} at {position:?}, expected y near {expected_y}"
        );
    }

    // the whole stack plus the contacts between the boxes form one island
    assert_eq!(world.islands().count(), 1);
    assert_eq!(world.islands().island(0).len(), 3);
}

#[test]
fn restitution_bounces_a_ball() {
    let mut world = PhysicsWorld::new();
    world.create_body(
        &BodyDesc::fixed()
            .with_position(Vec2::new(0.0, -2.0))
            .with_collider(
                Collider::new(Shape::rect(20.0, 1.0)).with_material(Material::new(0.2, 0.8, 1.0)),
            ),
    );
    let ball = world.create_body(
        &BodyDesc::dynamic()
            .with_position(Vec2::new(0.0, 2.0))
            .with_collider(
                Collider::new(Shape::circle(0.5)).with_material(Material::new(0.2, 0.8, 1.0)),
            ),
    );

    let mut peak_after_bounce = f32::NEG_INFINITY;
    let mut bounced = false;
    for _ in 0..600 {
        world.update(DT);
        let (velocity, _) = world.velocity(ball).unwrap();
        if velocity.y > 0.1 {
            bounced = true;
        }
        if bounced {
            peak_after_bounce = peak_after_bounce.max(world.position(ball).unwrap().y);
        }
    }

    assert!(bounced, "ball never bounced");
    // dropped ~2.5 units with e = 0.8: the rebound should clear a decent
    // fraction of that
    assert!(
        peak_after_bounce > -0.5,
        "bounce too weak, peak {peak_after_bounce}"
    );
}

#[derive(Default)]
struct EventLog {
    begun: Vec<bool>, // sensor flag per begin
    ended: usize,
}

struct Recorder(Rc<RefCell<EventLog>>);

impl ContactListener for Recorder {
    fn on_contact_begin(&mut self, contact: &Contact) {
        self.0.borrow_mut().begun.push(contact.sensor);
    }
    fn on_contact_end(&mut self, _contact: &Contact) {
        self.0.borrow_mut().ended += 1;
    }
}

#[test]
fn sensors_report_but_do_not_collide() {
    let log = Rc::new(RefCell::new(EventLog::default()));
    let mut world = PhysicsWorld::new();
    world.set_contact_listener(Box::new(Recorder(log.clone())));

    // a static sensor plate in the fall path
    world.create_body(
        &BodyDesc::fixed()
            .with_position(Vec2::new(0.0, 0.0))
            .with_collider(Collider::new(Shape::rect(2.0, 0.2)).sensor()),
    );
    let ball = world.create_body(
        &BodyDesc::dynamic()
            .with_position(Vec2::new(0.0, 3.0))
            .with_collider(Collider::new(Shape::circle(0.4))),
    );

    for _ in 0..240 {
        world.update(DT);
    }

    let log = log.borrow();
    assert_eq!(log.begun.len(), 1, "sensor overlap must begin exactly once");
    assert!(log.begun[0], "the begin event must carry the sensor flag");
    assert_eq!(log.ended, 1, "sensor overlap must end once the ball is past");
    // no impulse from the sensor: the ball fell straight through
    assert!(world.position(ball).unwrap().y < -2.0);
}

#[test]
fn begin_end_fire_once_per_touch_episode() {
    let log = Rc::new(RefCell::new(EventLog::default()));
    let mut world = PhysicsWorld::new();
    world.set_contact_listener(Box::new(Recorder(log.clone())));

    ground(&mut world, -5.0);
    let ball = world.create_body(
        &BodyDesc::dynamic()
            .with_position(Vec2::new(0.0, -3.0))
            .with_collider(
                Collider::new(Shape::circle(0.5)).with_material(Material::new(0.3, 0.0, 1.0)),
            ),
    );

    for _ in 0..120 {
        world.update(DT);
    }
    assert_eq!(log.borrow().begun.len(), 1, "resting contact must not churn");
    assert_eq!(log.borrow().ended, 0);

    // yank the ball away: exactly one end event
    world.set_velocity(ball, Vec2::new(0.0, 50.0), 0.0);
    for _ in 0..60 {
        world.update(DT);
    }
    assert_eq!(log.borrow().ended, 1);
}

#[test]
fn negative_groups_pass_through_each_other() {
    let mut world = PhysicsWorld::with_config(PhysicsConfig {
        gravity: Vec2::ZERO,
        ..PhysicsConfig::default()
    });
    let filter = CollisionFilter::default().with_group(-7);
    let a = world.create_body(
        &BodyDesc::dynamic()
            .with_velocity(Vec2::new(2.0, 0.0), 0.0)
            .with_collider(Collider::new(Shape::circle(0.5)).with_filter(filter)),
    );
    let b = world.create_body(
        &BodyDesc::dynamic()
            .with_position(Vec2::new(3.0, 0.0))
            .with_collider(Collider::new(Shape::circle(0.5)).with_filter(filter)),
    );

    for _ in 0..120 {
        world.update(DT);
    }

    // a sailed straight through b
    assert!(world.position(a).unwrap().x > 3.5);
    assert_eq!(world.velocity(b).unwrap().0, Vec2::ZERO);
}

#[test]
fn compound_body_rests_on_its_children() {
    let mut world = PhysicsWorld::new();
    ground(&mut world, -5.0);

    // an upright dumbbell: two discs joined rigidly, resting on the lower one
    let dumbbell = world.create_body(
        &BodyDesc::dynamic()
            .with_position(Vec2::new(0.0, 0.0))
            .with_collider(Collider::new(Shape::compound(vec![
                Collider::new(Shape::circle_at(Vec2::new(0.0, -0.75), 0.5)),
                Collider::new(Shape::circle_at(Vec2::new(0.0, 0.75), 0.5)),
            ]))),
    );

    let mass = world.body(dumbbell).unwrap().mass();
    assert!((mass - 2.0 * std::f32::consts::PI * 0.25).abs() < 1e-3);

    for _ in 0..300 {
        world.update(DT);
    }

    let position = world.position(dumbbell).unwrap();
    let (velocity, _) = world.velocity(dumbbell).unwrap();
    assert!(velocity.length() < 0.05, "still moving: {velocity:?}");
    // lower disc on the ground top at -4: body origin 1.25 above the
    // contact point
    assert!((position.y + 2.75).abs() < 0.05, "rest height off: {position:?}");
}

#[test]
fn two_separate_piles_are_two_islands() {
    let mut world = PhysicsWorld::new();
    ground(&mut world, -5.0);
    unit_box(&mut world, Vec2::new(-8.0, -3.4));
    unit_box(&mut world, Vec2::new(-8.0, -2.3));
    unit_box(&mut world, Vec2::new(8.0, -3.4));

    for _ in 0..120 {
        world.update(DT);
    }

    assert_eq!(world.islands().count(), 2);
    let mut sizes: Vec<usize> = world.islands().iter().map(|i| i.len()).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![1, 2]);
}

#[test]
fn identical_worlds_stay_identical() {
    let build = || {
        let mut world = PhysicsWorld::new();
        ground(&mut world, -5.0);
        let a = unit_box(&mut world, Vec2::new(0.1, 2.0));
        let b = unit_box(&mut world, Vec2::new(-0.2, 4.0));
        (world, a, b)
    };
    let (mut world1, a1, b1) = build();
    let (mut world2, a2, b2) = build();

    for _ in 0..200 {
        world1.update(DT);
        world2.update(DT);
    }

    assert_eq!(world1.position(a1), world2.position(a2));
    assert_eq!(world1.position(b1), world2.position(b2));
}

#[test]
fn world_queries_see_all_bodies() {
    let mut world = PhysicsWorld::new();
    let a = unit_box(&mut world, Vec2::new(0.0, 0.0));
    let b = unit_box(&mut world, Vec2::new(5.0, 0.0));

    let mut hits = Vec::new();
    world.query_aabb(
        Bounds::from_center_extents(Vec2::ZERO, Vec2::splat(1.0)),
        |key| hits.push(key),
    );
    assert!(hits.contains(&a));
    assert!(!hits.contains(&b));

    let mut ray_hits = Vec::new();
    world.query_ray(Vec2::new(-10.0, 0.0), Vec2::X, 100.0, |key| {
        ray_hits.push(key)
    });
    assert!(ray_hits.contains(&a));
    assert!(ray_hits.contains(&b));
}
