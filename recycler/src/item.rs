use std::any::{Any, TypeId};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::animation::Animation;
use crate::{Error, Result, SlotId, StableId, StableIdAllocator};

/// Identity of a concrete item kind.
///
/// Two items share a view type iff they are of the same Rust type, which also makes them
/// interchangeable in a slot.
#[derive(Clone, Copy)]
pub struct ViewType {
    id: TypeId,
    name: &'static str,
}

impl ViewType {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ViewType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ViewType {}

impl Hash for ViewType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ViewType").field(&self.name).finish()
    }
}

/// Content equality and hashing across item kinds.
///
/// Implemented for every `PartialEq + Hash` type, so item kinds only need to derive (or write)
/// those two impls. The diff engine treats `content_eq` as the "same content" test, so an item
/// kind whose equality ignores visible state will never be re-rendered on change.
pub trait ItemContent: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn as_content(&self) -> &dyn ItemContent;

    fn view_type(&self) -> ViewType;

    fn content_eq(&self, other: &dyn ItemContent) -> bool;

    fn content_hash(&self) -> u64;
}

impl<T: PartialEq + Hash + Send + Sync + 'static> ItemContent for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_content(&self) -> &dyn ItemContent {
        self
    }

    fn view_type(&self) -> ViewType {
        ViewType::of::<T>()
    }

    fn content_eq(&self, other: &dyn ItemContent) -> bool {
        other.as_any().downcast_ref::<T>().is_some_and(|o| self == o)
    }

    fn content_hash(&self) -> u64 {
        let mut h = DefaultHasher::new();
        self.hash(&mut h);
        h.finish()
    }
}

/// Creates the rendering surface for one item kind.
pub type SlotFactory<V> = Arc<dyn Fn() -> V + Send + Sync>;

/// A diffable, optionally self-animating record backing one row of a list.
///
/// `V` is the host's rendering surface (whatever a slot owns: a widget handle, a cell buffer,
/// a node id, ...).
pub trait Item<V>: ItemContent {
    /// Factory for slots that can display this kind of item.
    ///
    /// Only consulted for the first item of each kind the adapter sees.
    fn slot_factory(&self) -> SlotFactory<V>;

    /// Writes this item's state into `view`.
    fn bind(&self, view: &mut V);

    /// Releases anything `bind` attached to `view`.
    fn unbind(&self, view: &mut V) {
        let _ = view;
    }

    /// Called when the host could not recycle a slot because it still has transient state
    /// (typically an animation). Return `true` once the state has been cleared.
    fn on_failed_to_recycle(&self, view: &mut V) -> bool {
        let _ = view;
        rwarn!(
            kind = self.view_type().name(),
            "item did not handle on_failed_to_recycle"
        );
        false
    }

    /// Whether a transition from `self` to `next` should run [`Item::animate_change`] instead of
    /// the host animator's default change animation.
    fn can_animate_change(&self, next: &dyn Item<V>) -> bool {
        let _ = next;
        false
    }

    /// Builds a fresh animation that moves `view` from this item's state to `next`'s.
    ///
    /// The animation is returned unstarted. `None` means the kind does not implement custom
    /// change animations.
    fn animate_change(&self, view: &mut V, next: &dyn Item<V>) -> Option<Box<dyn Animation>> {
        let _ = (view, next);
        None
    }

    /// Builds an animation towards `next` that picks up where `interrupted` currently is.
    ///
    /// `None` means splicing is not supported: the caller lets `interrupted` finish and then runs
    /// a fresh [`Item::animate_change`].
    fn continue_change(
        &self,
        view: &mut V,
        next: &dyn Item<V>,
        interrupted: &dyn Animation,
    ) -> Option<Box<dyn Animation>> {
        let _ = (view, next, interrupted);
        None
    }
}

impl<'a, V: 'static> dyn Item<V> + 'a {
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

struct Entry<V> {
    id: StableId,
    view_type: ViewType,
    // Raw `SlotId` of the slot currently showing this item, `0` when unbound.
    holder: AtomicU64,
    item: Box<dyn Item<V>>,
}

/// Shared handle to an item in an adapter's sequence.
///
/// Cloning is cheap and preserves identity: the stable id is assigned once in
/// [`ItemRef::new`] and every clone reports the same id and the same bound slot.
pub struct ItemRef<V>(Arc<Entry<V>>);

impl<V: 'static> ItemRef<V> {
    pub fn new(item: impl Item<V> + 'static) -> Self {
        let view_type = item.view_type();
        Self(Arc::new(Entry {
            id: StableIdAllocator::allocate(),
            view_type,
            holder: AtomicU64::new(0),
            item: Box::new(item),
        }))
    }

    pub fn stable_id(&self) -> StableId {
        self.0.id
    }

    pub fn view_type(&self) -> ViewType {
        self.0.view_type
    }

    pub fn get(&self) -> &(dyn Item<V> + 'static) {
        &*self.0.item
    }

    /// The slot this item is bound to, if any.
    pub fn holder(&self) -> Option<SlotId> {
        SlotId::from_raw(self.0.holder.load(Ordering::Acquire))
    }

    pub fn is_bound(&self) -> bool {
        self.holder().is_some()
    }

    /// Whether both handles point at the same item (not merely equal content).
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub fn same_content(&self, other: &Self) -> bool {
        if Self::ptr_eq(self, other) {
            return true;
        }
        let (a, b) = (self.get(), other.get());
        a.content_hash() == b.content_hash() && a.content_eq(b.as_content())
    }

    pub(crate) fn attach(&self, slot: SlotId) -> Result<()> {
        self.0
            .holder
            .compare_exchange(0, slot.get(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|raw| match SlotId::from_raw(raw) {
                Some(other) => Error::ItemAlreadyBound(other),
                None => Error::SlotNotBound(slot),
            })
    }

    pub(crate) fn detach(&self, slot: SlotId) {
        let _ = self.0.holder.compare_exchange(
            slot.get(),
            0,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

impl<V: 'static> ItemRef<V> {
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.get().downcast_ref::<T>()
    }
}

impl<V> Clone for ItemRef<V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<V: 'static> fmt::Debug for ItemRef<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemRef")
            .field("stable_id", &self.0.id)
            .field("view_type", &self.0.view_type)
            .field("holder", &self.holder())
            .finish_non_exhaustive()
    }
}
