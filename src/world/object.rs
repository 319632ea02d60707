//! Networked object trait and embeddable base state.

use glam::{Quat, Vec3};

use crate::replication::PropertyBag;

/// Identifier shared by an object and its remote mirrors.
pub type ObjectId = u32;

/// Common state for a networked object.
///
/// Embed one of these in an object type and hand it out through
/// [`NetObject::base`]; the trait's default methods do the rest.
#[derive(Debug, Clone)]
pub struct ObjectBase {
    /// Network identifier, `0` until spawned into a registry.
    pub net_id: ObjectId,
    /// Whether the object is replicated to peers.
    pub replicates: bool,
    /// World position.
    pub position: Vec3,
    /// World rotation.
    pub rotation: Quat,
    /// Declared replicated properties.
    pub properties: PropertyBag,
}

impl Default for ObjectBase {
    fn default() -> Self {
        Self {
            net_id: 0,
            replicates: false,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            properties: PropertyBag::new(),
        }
    }
}

impl ObjectBase {
    /// Base state for a replicated object.
    pub fn replicated() -> Self {
        Self {
            replicates: true,
            ..Self::default()
        }
    }
}

/// An application object visible to the replication and RPC layers.
pub trait NetObject {
    /// Shared object state.
    fn base(&self) -> &ObjectBase;

    /// Mutable shared object state.
    fn base_mut(&mut self) -> &mut ObjectBase;

    /// Type name used by spawn packets to pick a factory on the far side.
    fn type_name(&self) -> &str;

    /// Network identifier.
    fn net_id(&self) -> ObjectId {
        self.base().net_id
    }

    /// Assign the network identifier.
    fn set_net_id(&mut self, net_id: ObjectId) {
        self.base_mut().net_id = net_id;
    }

    /// Whether the object is replicated to peers.
    fn replicates(&self) -> bool {
        self.base().replicates
    }

    /// Flag the object replicable or not.
    fn set_replicates(&mut self, replicates: bool) {
        self.base_mut().replicates = replicates;
    }

    /// World position.
    fn position(&self) -> Vec3 {
        self.base().position
    }

    /// Set the world position.
    fn set_position(&mut self, position: Vec3) {
        self.base_mut().position = position;
    }

    /// World rotation.
    fn rotation(&self) -> Quat {
        self.base().rotation
    }

    /// Set the world rotation.
    fn set_rotation(&mut self, rotation: Quat) {
        self.base_mut().rotation = rotation;
    }

    /// Declared replicated properties.
    fn properties(&self) -> &PropertyBag {
        &self.base().properties
    }

    /// Mutable declared replicated properties.
    fn properties_mut(&mut self) -> &mut PropertyBag {
        &mut self.base_mut().properties
    }

    /// Called when the object enters a registry.
    fn on_spawn(&mut self) {}

    /// Called when the object leaves a registry.
    fn on_destroy(&mut self) {}

    /// Called after inbound replication applied property values.
    fn on_replicated(&mut self) {}

    /// Per-frame update hook.
    fn tick(&mut self, _dt: f32) {}
}
