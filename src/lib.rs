//! 2D rigid body physics core: dynamic AABB tree broad phase, SAT + clipping
//! narrow phase, and a sequential impulse solver with warm starting.
//!
//! The hosting layer owns scene data and rendering; this crate consumes
//! body/collider descriptors and a fixed-step `PhysicsWorld::update`, and
//! produces updated transforms plus contact begin/end notifications.

pub mod body;
pub mod bounds;
pub mod broadphase;
pub mod bvh;
pub mod collide;
pub mod collider;
pub mod contact;
pub mod island;
pub mod math;
pub mod shapes;
pub mod solver;
pub mod world;

pub use body::{BodyDesc, BodyKey, BodySet, BodyType, RigidBody};
pub use bounds::Bounds;
pub use collide::{Manifold, ManifoldPoint, WorldManifold};
pub use collider::{CategoryBits, Collider, ColliderHandle, CollisionFilter, Material};
pub use contact::{BodyPair, Contact, ContactListener};
pub use island::Islands;
pub use math::{Rot2, Transform2d};
pub use shapes::{MassData, Shape, ShapeCircle, ShapeCompound, ShapeEdge, ShapePolygon};
pub use world::{PhysicsConfig, PhysicsWorld};
