//! Object registry boundary and the default [`World`] container.

use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};

use super::object::{NetObject, ObjectId};

/// Creates a fresh instance of a registered object type.
pub type ObjectFactory = Box<dyn Fn() -> Box<dyn NetObject>>;

/// Container boundary the replication and RPC layers resolve objects
/// through.
pub trait ObjectRegistry {
    /// Instantiate a registered type under the given network id.
    ///
    /// Returns `None` when the type is unknown or the id is already taken.
    fn create_by_type(&mut self, type_name: &str, net_id: ObjectId) -> Option<&mut (dyn NetObject + 'static)>;

    /// Remove the object with the given id. Returns whether it existed.
    fn destroy_by_id(&mut self, net_id: ObjectId) -> bool;

    /// The object with the given id.
    fn lookup(&self, net_id: ObjectId) -> Option<&dyn NetObject>;

    /// Mutable access to the object with the given id.
    fn lookup_mut(&mut self, net_id: ObjectId) -> Option<&mut (dyn NetObject + 'static)>;

    /// Ids of every live object, in stable order.
    fn ids(&self) -> Vec<ObjectId>;

    /// Run every object's per-frame update hook.
    fn tick_objects(&mut self, dt: f32);
}

/// Id-keyed object store with type-name factories.
///
/// Iteration order follows the id, so replication output is deterministic.
pub struct World {
    objects: BTreeMap<ObjectId, Box<dyn NetObject>>,
    factories: HashMap<String, ObjectFactory>,
    next_net_id: ObjectId,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create an empty world.
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            factories: HashMap::new(),
            next_net_id: 1,
        }
    }

    /// Register a factory for `type_name`, used by inbound spawn packets.
    pub fn register_type(&mut self, type_name: &str, factory: ObjectFactory) {
        debug!("registered object type {type_name:?}");
        self.factories.insert(type_name.to_string(), factory);
    }

    /// Add an object, assigning it the next network id. Returns the id.
    pub fn spawn(&mut self, mut object: Box<dyn NetObject>) -> ObjectId {
        let net_id = self.next_net_id;
        self.next_net_id += 1;
        object.set_net_id(net_id);
        object.on_spawn();
        self.objects.insert(net_id, object);
        net_id
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the world holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Remove every object, running destroy hooks.
    pub fn clear(&mut self) {
        for object in self.objects.values_mut() {
            object.on_destroy();
        }
        self.objects.clear();
        self.next_net_id = 1;
    }
}

impl ObjectRegistry for World {
    fn create_by_type(&mut self, type_name: &str, net_id: ObjectId) -> Option<&mut (dyn NetObject + 'static)> {
        if self.objects.contains_key(&net_id) {
            warn!("object id {net_id} already in use, ignoring spawn of {type_name:?}");
            return None;
        }
        let Some(factory) = self.factories.get(type_name) else {
            warn!("no factory for object type {type_name:?}");
            return None;
        };

        let mut object = factory();
        object.set_net_id(net_id);
        object.on_spawn();
        self.objects.insert(net_id, object);
        // keep locally assigned ids clear of ids dictated by the host
        self.next_net_id = self.next_net_id.max(net_id + 1);

        self.objects.get_mut(&net_id).map(|object| object.as_mut())
    }

    fn destroy_by_id(&mut self, net_id: ObjectId) -> bool {
        match self.objects.remove(&net_id) {
            Some(mut object) => {
                object.on_destroy();
                true
            }
            None => false,
        }
    }

    fn lookup(&self, net_id: ObjectId) -> Option<&dyn NetObject> {
        self.objects.get(&net_id).map(|object| object.as_ref())
    }

    fn lookup_mut(&mut self, net_id: ObjectId) -> Option<&mut (dyn NetObject + 'static)> {
        self.objects.get_mut(&net_id).map(|object| object.as_mut())
    }

    fn ids(&self) -> Vec<ObjectId> {
        self.objects.keys().copied().collect()
    }

    fn tick_objects(&mut self, dt: f32) {
        for object in self.objects.values_mut() {
            object.tick(dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::ObjectBase;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Marker {
        base: ObjectBase,
        destroyed: Option<Rc<Cell<bool>>>,
    }

    impl NetObject for Marker {
        fn base(&self) -> &ObjectBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut ObjectBase {
            &mut self.base
        }

        fn type_name(&self) -> &str {
            "Marker"
        }

        fn on_spawn(&mut self) {
            self.base.position.y = 1.0;
        }

        fn on_destroy(&mut self) {
            if let Some(flag) = &self.destroyed {
                flag.set(true);
            }
        }

        fn tick(&mut self, _dt: f32) {
            self.base.position.x += 1.0;
        }
    }

    #[test]
    fn test_spawn_assigns_increasing_ids() {
        let mut world = World::new();
        let first = world.spawn(Box::new(Marker::default()));
        let second = world.spawn(Box::new(Marker::default()));

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(world.lookup(first).unwrap().net_id(), first);
        // the spawn hook ran
        assert_eq!(world.lookup(first).unwrap().position().y, 1.0);
    }

    #[test]
    fn test_create_by_type_uses_given_id() {
        let mut world = World::new();
        world.register_type("Marker", Box::new(|| Box::new(Marker::default())));

        let object = world.create_by_type("Marker", 40).unwrap();
        assert_eq!(object.net_id(), 40);

        // locally assigned ids stay clear of the dictated one
        let local = world.spawn(Box::new(Marker::default()));
        assert_eq!(local, 41);
    }

    #[test]
    fn test_create_by_type_unknown_or_duplicate() {
        let mut world = World::new();
        world.register_type("Marker", Box::new(|| Box::new(Marker::default())));

        assert!(world.create_by_type("Ghost", 1).is_none());
        assert!(world.create_by_type("Marker", 5).is_some());
        assert!(world.create_by_type("Marker", 5).is_none());
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn test_destroy_runs_hook() {
        let mut world = World::new();
        let destroyed = Rc::new(Cell::new(false));
        let id = world.spawn(Box::new(Marker {
            destroyed: Some(Rc::clone(&destroyed)),
            ..Marker::default()
        }));

        assert!(world.destroy_by_id(id));
        assert!(destroyed.get());
        assert!(!world.destroy_by_id(id));
        assert!(world.lookup(id).is_none());
    }

    #[test]
    fn test_clear_removes_all_and_restarts_ids() {
        let mut world = World::new();
        let destroyed = Rc::new(Cell::new(false));
        world.spawn(Box::new(Marker {
            destroyed: Some(Rc::clone(&destroyed)),
            ..Marker::default()
        }));
        world.spawn(Box::new(Marker::default()));

        world.clear();
        assert!(world.is_empty());
        assert!(destroyed.get());
        assert_eq!(world.spawn(Box::new(Marker::default())), 1);
    }

    #[test]
    fn test_ids_in_stable_order() {
        let mut world = World::new();
        world.register_type("Marker", Box::new(|| Box::new(Marker::default())));
        world.create_by_type("Marker", 9);
        world.create_by_type("Marker", 3);
        world.create_by_type("Marker", 6);

        assert_eq!(world.ids(), vec![3, 6, 9]);
    }

    #[test]
    fn test_tick_objects() {
        let mut world = World::new();
        let id = world.spawn(Box::new(Marker::default()));
        world.tick_objects(0.016);
        world.tick_objects(0.016);

        let marker = world.lookup(id).unwrap();
        assert_eq!(marker.position().x, 2.0);
    }
}
