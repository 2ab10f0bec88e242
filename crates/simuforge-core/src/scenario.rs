//! Scenario materialisation.
//!
//! A scenario is a pure function from `(name, params, physics)` to an ordered
//! list of body descriptors (plus any joint descriptors). The ordering *is*
//! the determinism contract: body ids are dense `[0, N)` in emission order,
//! ground first, and two calls with identical inputs return byte-identical
//! descriptor sequences. Placement jitter draws from a `ChaCha8Rng` seeded
//! with `physics.seed`, so randomness never breaks reproducibility.
//!
//! Body names are presentation tags for external renderers only; the
//! authoritative static/dynamic classification is [`BodyKind`].

use glam::{Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::math::Transform;
use crate::spec::{PhysicsSettings, ScenarioName, ScenarioParams, ScenarioSpec};

/// Vertical clearance inserted between stacked bodies to avoid initial
/// overlap.
pub const STACK_GAP: f32 = 1e-3;

/// Half-extents of the ground slab shared by every builtin scenario.
const GROUND_HALF: Vec3 = Vec3::new(50.0, 0.5, 50.0);

/// Thickness of the friction-ramp slab.
const RAMP_THICKNESS: f32 = 0.5;

// =============================================================================
// Identifiers
// =============================================================================

/// Dense body identifier assigned in scenario emission order.
///
/// Ids start at 0, increase by 1 per descriptor and are stable across runs
/// of the same spec. Ordering by id is the iteration order for every metric
/// reduction.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyId(u32);

impl BodyId {
    /// Creates an id from its raw index.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// The raw index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BodyId({})", self.0)
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Descriptors
// =============================================================================

/// Static or dynamic body classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyKind {
    /// Integrated by the solver.
    Dynamic,
    /// Immovable; infinite mass.
    Static,
}

/// Collider shape of a body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    /// Axis-aligned box in local space.
    Box {
        /// Half-extents along each local axis.
        half_extents: Vec3,
    },
    /// Sphere.
    Sphere {
        /// Sphere radius.
        radius: f32,
    },
    /// Capsule aligned with the local Y axis.
    Capsule {
        /// Cap radius.
        radius: f32,
        /// Half the length of the cylindrical segment.
        half_height: f32,
    },
    /// Cylinder aligned with the local Y axis.
    Cylinder {
        /// Cylinder radius.
        radius: f32,
        /// Half the cylinder height.
        half_height: f32,
    },
}

impl Shape {
    /// Radius of the shape's bounding sphere.
    ///
    /// Used for the scalar-inertia approximation in the metric extraction.
    #[must_use]
    pub fn bounding_radius(&self) -> f32 {
        match *self {
            Self::Box { half_extents } => half_extents.length(),
            Self::Sphere { radius } => radius,
            Self::Capsule {
                radius,
                half_height,
            } => radius + half_height,
            Self::Cylinder {
                radius,
                half_height,
            } => radius.hypot(half_height),
        }
    }
}

/// Everything the solver needs to instantiate one body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyDescriptor {
    /// Dense id in emission order.
    pub id: BodyId,
    /// Presentation tag; never consulted by physics.
    pub name: String,
    /// Static or dynamic.
    pub kind: BodyKind,
    /// Collider shape.
    pub shape: Shape,
    /// Initial pose.
    pub initial_transform: Transform,
    /// Initial linear velocity (m/s).
    pub initial_linear_velocity: Vec3,
    /// Initial angular velocity (rad/s).
    pub initial_angular_velocity: Vec3,
    /// Mass in kilograms; `f32::INFINITY` for static bodies.
    pub mass: f32,
    /// Friction coefficient.
    pub friction: f32,
    /// Restitution coefficient.
    pub restitution: f32,
}

impl BodyDescriptor {
    /// Whether this body participates in the dynamic sums.
    #[must_use]
    pub const fn is_dynamic(&self) -> bool {
        matches!(self.kind, BodyKind::Dynamic)
    }
}

/// Joint connection emitted by a scenario.
///
/// None of the builtins emit joints today; the descriptor exists so the
/// solver contract covers constrained scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDescriptor {
    /// First connected body.
    pub body_a: BodyId,
    /// Second connected body.
    pub body_b: BodyId,
    /// Joint behaviour.
    pub kind: JointKind,
}

/// Supported joint behaviours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JointKind {
    /// Rigidly locks the two bodies together.
    Fixed,
    /// Rotation about a single axis.
    Revolute {
        /// Hinge axis in world space.
        axis: Vec3,
    },
}

/// The materialised output of a scenario builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioSetup {
    /// Bodies in id order.
    pub bodies: Vec<BodyDescriptor>,
    /// Joints between the bodies above.
    pub joints: Vec<JointDescriptor>,
}

// =============================================================================
// Builders
// =============================================================================

/// Materialises a scenario selection into descriptors.
///
/// Pure in `(scenario, physics)`: identical inputs produce byte-identical
/// output. The spec is assumed validated.
///
/// # Errors
///
/// Builders currently cannot fail past validation; the `Result` keeps the
/// signature stable for scenarios with richer construction.
pub fn build_scenario(scenario: &ScenarioSpec, physics: &PhysicsSettings) -> Result<ScenarioSetup> {
    let params = scenario.params();
    let setup = match scenario.name() {
        ScenarioName::BoxStack => build_box_stack(params, physics.seed),
        ScenarioName::RollingSphere => build_rolling_sphere(params),
        ScenarioName::BouncingBall => build_bouncing_ball(params),
        ScenarioName::FrictionRamp => build_friction_ramp(params),
    };
    Ok(setup)
}

/// Emits the shared ground slab as body 0.
fn ground(friction: f32) -> BodyDescriptor {
    BodyDescriptor {
        id: BodyId::new(0),
        name: "ground".to_string(),
        kind: BodyKind::Static,
        shape: Shape::Box {
            half_extents: GROUND_HALF,
        },
        initial_transform: Transform::from_position(Vec3::new(0.0, -GROUND_HALF.y, 0.0)),
        initial_linear_velocity: Vec3::ZERO,
        initial_angular_velocity: Vec3::ZERO,
        mass: f32::INFINITY,
        friction,
        restitution: 0.0,
    }
}

fn build_box_stack(params: &ScenarioParams, seed: u64) -> ScenarioSetup {
    let count = params.count.unwrap_or(10);
    let box_size = params.box_size.unwrap_or(Vec3::ONE);
    let friction = params.friction.unwrap_or(0.5);
    let jitter = params.jitter.unwrap_or(0.0);
    let half = box_size * 0.5;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut bodies = vec![ground(friction)];
    for i in 0..count {
        // Jitter scales to zero by default, so the rng draw never perturbs
        // the descriptor bytes unless asked for.
        let dx = rng.gen_range(-1.0_f32..1.0) * jitter;
        let dz = rng.gen_range(-1.0_f32..1.0) * jitter;
        #[allow(clippy::cast_precision_loss)]
        let y = half.y + STACK_GAP + i as f32 * (box_size.y + STACK_GAP);
        bodies.push(BodyDescriptor {
            id: BodyId::new(i + 1),
            name: format!("box_{i}"),
            kind: BodyKind::Dynamic,
            shape: Shape::Box { half_extents: half },
            initial_transform: Transform::from_position(Vec3::new(dx, y, dz)),
            initial_linear_velocity: Vec3::ZERO,
            initial_angular_velocity: Vec3::ZERO,
            mass: 1.0,
            friction,
            restitution: 0.0,
        });
    }

    ScenarioSetup {
        bodies,
        joints: Vec::new(),
    }
}

fn build_rolling_sphere(params: &ScenarioParams) -> ScenarioSetup {
    let radius = params.radius.unwrap_or(0.5);
    let initial_velocity = params.initial_velocity.unwrap_or(Vec3::new(5.0, 0.0, 0.0));
    let friction = params.friction.unwrap_or(0.5);

    let sphere = BodyDescriptor {
        id: BodyId::new(1),
        name: "sphere".to_string(),
        kind: BodyKind::Dynamic,
        shape: Shape::Sphere { radius },
        initial_transform: Transform::from_position(Vec3::new(0.0, radius, 0.0)),
        initial_linear_velocity: initial_velocity,
        initial_angular_velocity: Vec3::ZERO,
        mass: 1.0,
        friction,
        restitution: 0.0,
    };

    ScenarioSetup {
        bodies: vec![ground(friction), sphere],
        joints: Vec::new(),
    }
}

fn build_bouncing_ball(params: &ScenarioParams) -> ScenarioSetup {
    let radius = params.radius.unwrap_or(0.5);
    let drop_height = params.drop_height.unwrap_or(10.0);
    let restitution = params.restitution.unwrap_or(0.8);
    let friction = params.friction.unwrap_or(0.5);

    let ball = BodyDescriptor {
        id: BodyId::new(1),
        name: "ball".to_string(),
        kind: BodyKind::Dynamic,
        shape: Shape::Sphere { radius },
        initial_transform: Transform::from_position(Vec3::new(0.0, drop_height, 0.0)),
        initial_linear_velocity: Vec3::ZERO,
        initial_angular_velocity: Vec3::ZERO,
        mass: 1.0,
        friction,
        restitution,
    };

    ScenarioSetup {
        bodies: vec![ground(friction), ball],
        joints: Vec::new(),
    }
}

fn build_friction_ramp(params: &ScenarioParams) -> ScenarioSetup {
    let angle = params.ramp_angle.unwrap_or(0.5);
    let length = params.ramp_length.unwrap_or(10.0);
    let friction = params.friction.unwrap_or(0.3);

    let rotation = Quat::from_rotation_z(angle);
    let half_length = length * 0.5;
    // Lift the ramp so its lower end rests near the ground plane.
    let ramp_center = Vec3::new(0.0, half_length * angle.sin() + RAMP_THICKNESS, 0.0);
    let ramp_transform = Transform::new(ramp_center, rotation);

    let ramp = BodyDescriptor {
        id: BodyId::new(1),
        name: "ramp".to_string(),
        kind: BodyKind::Static,
        shape: Shape::Box {
            half_extents: Vec3::new(half_length, RAMP_THICKNESS * 0.5, 2.0),
        },
        initial_transform: ramp_transform,
        initial_linear_velocity: Vec3::ZERO,
        initial_angular_velocity: Vec3::ZERO,
        mass: f32::INFINITY,
        friction,
        restitution: 0.0,
    };

    // Block at rest near the upper end of the ramp, sitting on its surface.
    let block_half = 0.25_f32;
    let local = Vec3::new(
        half_length - 2.0 * block_half,
        RAMP_THICKNESS * 0.5 + block_half + STACK_GAP,
        0.0,
    );
    let block = BodyDescriptor {
        id: BodyId::new(2),
        name: "block".to_string(),
        kind: BodyKind::Dynamic,
        shape: Shape::Box {
            half_extents: Vec3::splat(block_half),
        },
        initial_transform: Transform::new(ramp_transform.transform_point(local), rotation),
        initial_linear_velocity: Vec3::ZERO,
        initial_angular_velocity: Vec3::ZERO,
        mass: 1.0,
        friction,
        restitution: 0.0,
    };

    ScenarioSetup {
        bodies: vec![ground(friction), ramp, block],
        joints: Vec::new(),
    }
}

// =============================================================================
// Parameter schemas
// =============================================================================

/// One scenario parameter as surfaced by the `scenarios` command.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ParamInfo {
    /// Parameter key as written in documents.
    pub name: &'static str,
    /// Default applied when the key is absent.
    pub default: &'static str,
    /// Short description.
    pub doc: &'static str,
}

/// Schema of one builtin scenario.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScenarioInfo {
    /// Scenario name tag.
    pub name: &'static str,
    /// One-line summary.
    pub summary: &'static str,
    /// Accepted parameters.
    pub params: &'static [ParamInfo],
}

/// Enumerates the builtin scenarios and their parameter schemas.
#[must_use]
pub fn builtin_scenarios() -> &'static [ScenarioInfo] {
    &[
        ScenarioInfo {
            name: "box_stack",
            summary: "Vertical stack of dynamic boxes on a ground slab",
            params: &[
                ParamInfo {
                    name: "count",
                    default: "10",
                    doc: "number of stacked boxes",
                },
                ParamInfo {
                    name: "box_size",
                    default: "[1, 1, 1]",
                    doc: "full box dimensions (m)",
                },
                ParamInfo {
                    name: "friction",
                    default: "0.5",
                    doc: "friction coefficient",
                },
                ParamInfo {
                    name: "jitter",
                    default: "0",
                    doc: "max lateral placement offset (m), seeded",
                },
            ],
        },
        ScenarioInfo {
            name: "rolling_sphere",
            summary: "Sphere launched horizontally across the ground",
            params: &[
                ParamInfo {
                    name: "radius",
                    default: "0.5",
                    doc: "sphere radius (m)",
                },
                ParamInfo {
                    name: "initial_velocity",
                    default: "[5, 0, 0]",
                    doc: "launch velocity (m/s)",
                },
                ParamInfo {
                    name: "friction",
                    default: "0.5",
                    doc: "friction coefficient",
                },
            ],
        },
        ScenarioInfo {
            name: "bouncing_ball",
            summary: "Sphere dropped from a height onto the ground",
            params: &[
                ParamInfo {
                    name: "radius",
                    default: "0.5",
                    doc: "sphere radius (m)",
                },
                ParamInfo {
                    name: "drop_height",
                    default: "10",
                    doc: "release height (m)",
                },
                ParamInfo {
                    name: "restitution",
                    default: "0.8",
                    doc: "bounce restitution",
                },
            ],
        },
        ScenarioInfo {
            name: "friction_ramp",
            summary: "Dynamic block resting on an inclined static ramp",
            params: &[
                ParamInfo {
                    name: "ramp_angle",
                    default: "0.5",
                    doc: "inclination (rad)",
                },
                ParamInfo {
                    name: "ramp_length",
                    default: "10",
                    doc: "ramp length (m)",
                },
                ParamInfo {
                    name: "friction",
                    default: "0.3",
                    doc: "friction coefficient",
                },
            ],
        },
    ]
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn physics_with_seed(seed: u64) -> PhysicsSettings {
        PhysicsSettings {
            timestep: 1.0 / 60.0,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            solver_iterations: 4,
            enhanced_determinism: true,
            seed,
        }
    }

    fn builtin(name: ScenarioName, params: ScenarioParams) -> ScenarioSpec {
        ScenarioSpec::Builtin { name, params }
    }

    mod id_tests {
        use super::*;

        #[test]
        fn ids_are_dense_and_ordered() {
            for name in ScenarioName::ALL {
                let setup = build_scenario(
                    &builtin(name, ScenarioParams::default()),
                    &physics_with_seed(0),
                )
                .unwrap();
                for (i, body) in setup.bodies.iter().enumerate() {
                    assert_eq!(body.id.index() as usize, i, "scenario {name}");
                }
            }
        }

        #[test]
        fn ground_is_body_zero_and_static() {
            for name in ScenarioName::ALL {
                let setup = build_scenario(
                    &builtin(name, ScenarioParams::default()),
                    &physics_with_seed(0),
                )
                .unwrap();
                let ground = &setup.bodies[0];
                assert_eq!(ground.kind, BodyKind::Static);
                assert!(ground.mass.is_infinite());
                assert_eq!(
                    ground.shape,
                    Shape::Box {
                        half_extents: Vec3::new(50.0, 0.5, 50.0)
                    }
                );
                assert_eq!(
                    ground.initial_transform.position,
                    Vec3::new(0.0, -0.5, 0.0)
                );
            }
        }
    }

    mod determinism_tests {
        use super::*;

        #[test]
        fn identical_inputs_identical_descriptors() {
            for name in ScenarioName::ALL {
                let a = build_scenario(
                    &builtin(name, ScenarioParams::default()),
                    &physics_with_seed(42),
                )
                .unwrap();
                let b = build_scenario(
                    &builtin(name, ScenarioParams::default()),
                    &physics_with_seed(42),
                )
                .unwrap();
                assert_eq!(a, b, "scenario {name}");
            }
        }

        #[test]
        fn jitter_is_seed_stable() {
            let params = ScenarioParams {
                count: Some(5),
                jitter: Some(0.05),
                ..ScenarioParams::default()
            };
            let a = build_scenario(
                &builtin(ScenarioName::BoxStack, params.clone()),
                &physics_with_seed(7),
            )
            .unwrap();
            let b = build_scenario(
                &builtin(ScenarioName::BoxStack, params.clone()),
                &physics_with_seed(7),
            )
            .unwrap();
            let c = build_scenario(
                &builtin(ScenarioName::BoxStack, params),
                &physics_with_seed(8),
            )
            .unwrap();
            assert_eq!(a, b);
            assert_ne!(a, c);
        }

        #[test]
        fn zero_jitter_ignores_seed() {
            let a = build_scenario(
                &builtin(ScenarioName::BoxStack, ScenarioParams::default()),
                &physics_with_seed(1),
            )
            .unwrap();
            let b = build_scenario(
                &builtin(ScenarioName::BoxStack, ScenarioParams::default()),
                &physics_with_seed(2),
            )
            .unwrap();
            assert_eq!(a, b);
        }
    }

    mod box_stack_tests {
        use super::*;

        #[test]
        fn default_stack_has_ten_boxes() {
            let setup = build_scenario(
                &builtin(ScenarioName::BoxStack, ScenarioParams::default()),
                &physics_with_seed(0),
            )
            .unwrap();
            assert_eq!(setup.bodies.len(), 11);
            assert!(setup.joints.is_empty());
            assert!(setup.bodies[1..].iter().all(BodyDescriptor::is_dynamic));
        }

        #[test]
        fn boxes_are_gapped_and_non_overlapping() {
            let setup = build_scenario(
                &builtin(ScenarioName::BoxStack, ScenarioParams::default()),
                &physics_with_seed(0),
            )
            .unwrap();
            let first = setup.bodies[1].initial_transform.position.y;
            assert!((first - (0.5 + STACK_GAP)).abs() < 1e-6);
            for pair in setup.bodies[1..].windows(2) {
                let gap = pair[1].initial_transform.position.y
                    - pair[0].initial_transform.position.y
                    - 1.0;
                assert!((gap - STACK_GAP).abs() < 1e-5);
            }
        }

        #[test]
        fn unit_mass_boxes() {
            let setup = build_scenario(
                &builtin(ScenarioName::BoxStack, ScenarioParams::default()),
                &physics_with_seed(0),
            )
            .unwrap();
            assert!(setup.bodies[1..].iter().all(|b| b.mass == 1.0));
        }
    }

    mod sphere_tests {
        use super::*;

        #[test]
        fn rolling_sphere_rests_on_ground_with_velocity() {
            let setup = build_scenario(
                &builtin(ScenarioName::RollingSphere, ScenarioParams::default()),
                &physics_with_seed(0),
            )
            .unwrap();
            let sphere = &setup.bodies[1];
            assert_eq!(sphere.shape, Shape::Sphere { radius: 0.5 });
            assert_eq!(sphere.initial_transform.position, Vec3::new(0.0, 0.5, 0.0));
            assert_eq!(sphere.initial_linear_velocity, Vec3::new(5.0, 0.0, 0.0));
        }

        #[test]
        fn bouncing_ball_starts_at_rest_at_drop_height() {
            let params = ScenarioParams {
                drop_height: Some(5.0),
                restitution: Some(1.0),
                ..ScenarioParams::default()
            };
            let setup = build_scenario(
                &builtin(ScenarioName::BouncingBall, params),
                &physics_with_seed(0),
            )
            .unwrap();
            let ball = &setup.bodies[1];
            assert_eq!(ball.initial_transform.position, Vec3::new(0.0, 5.0, 0.0));
            assert_eq!(ball.initial_linear_velocity, Vec3::ZERO);
            assert_eq!(ball.restitution, 1.0);
        }
    }

    mod ramp_tests {
        use super::*;

        #[test]
        fn ramp_is_static_and_inclined() {
            let setup = build_scenario(
                &builtin(ScenarioName::FrictionRamp, ScenarioParams::default()),
                &physics_with_seed(0),
            )
            .unwrap();
            assert_eq!(setup.bodies.len(), 3);
            let ramp = &setup.bodies[1];
            assert_eq!(ramp.kind, BodyKind::Static);
            assert_eq!(ramp.initial_transform.rotation, Quat::from_rotation_z(0.5));
        }

        #[test]
        fn block_sits_above_the_upper_end() {
            let setup = build_scenario(
                &builtin(ScenarioName::FrictionRamp, ScenarioParams::default()),
                &physics_with_seed(0),
            )
            .unwrap();
            let ramp = &setup.bodies[1];
            let block = &setup.bodies[2];
            assert!(block.is_dynamic());
            assert_eq!(block.initial_transform.rotation, ramp.initial_transform.rotation);
            assert!(
                block.initial_transform.position.y > ramp.initial_transform.position.y,
                "block should start above the ramp centre"
            );
        }
    }

    mod shape_tests {
        use super::*;

        #[test]
        fn bounding_radius_per_shape() {
            let b = Shape::Box {
                half_extents: Vec3::new(3.0, 0.0, 4.0),
            };
            assert!((b.bounding_radius() - 5.0).abs() < 1e-6);
            assert_eq!(Shape::Sphere { radius: 2.0 }.bounding_radius(), 2.0);
            assert_eq!(
                Shape::Capsule {
                    radius: 0.5,
                    half_height: 1.0
                }
                .bounding_radius(),
                1.5
            );
            let c = Shape::Cylinder {
                radius: 3.0,
                half_height: 4.0,
            };
            assert!((c.bounding_radius() - 5.0).abs() < 1e-6);
        }
    }

    mod schema_tests {
        use super::*;

        #[test]
        fn schemas_cover_all_builtins() {
            let infos = builtin_scenarios();
            assert_eq!(infos.len(), ScenarioName::ALL.len());
            for (info, name) in infos.iter().zip(ScenarioName::ALL) {
                assert_eq!(info.name, name.as_str());
                assert!(!info.params.is_empty());
            }
        }
    }
}
