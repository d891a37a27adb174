use std::fmt;
use std::rc::Rc;

use crate::{Error, ItemRef, Result, SlotId, ViewType};

/// Click dispatch installed on a bound slot. Receives the item bound at dispatch time.
pub type ClickDispatch<V> = Rc<dyn Fn(&ItemRef<V>)>;

/// Long-click dispatch installed on a bound slot. Returns whether the event was consumed.
pub type LongClickDispatch<V> = Rc<dyn Fn(&ItemRef<V>) -> bool>;

/// A reusable rendering unit showing at most one item at a time.
///
/// A slot owns its surface for its whole life; items come and go through [`Slot::bind`] and
/// [`Slot::unbind`].
pub struct Slot<V> {
    id: SlotId,
    view_type: ViewType,
    view: V,
    item: Option<ItemRef<V>>,
    on_click: Option<ClickDispatch<V>>,
    on_long_click: Option<LongClickDispatch<V>>,
}

impl<V: 'static> Slot<V> {
    pub fn new(view_type: ViewType, view: V) -> Self {
        Self {
            id: SlotId::next(),
            view_type,
            view,
            item: None,
            on_click: None,
            on_long_click: None,
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn view_type(&self) -> ViewType {
        self.view_type
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn item(&self) -> Option<&ItemRef<V>> {
        self.item.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.item.is_some()
    }

    /// Shows `item` in this slot.
    ///
    /// Fails if the slot already shows an item or if `item` is shown by another slot.
    pub fn bind(&mut self, item: ItemRef<V>) -> Result<()> {
        if self.item.is_some() {
            return Err(Error::SlotAlreadyBound(self.id));
        }
        if item.view_type() != self.view_type {
            rwarn!(
                slot = self.id.get(),
                expected = self.view_type.name(),
                actual = item.view_type().name(),
                "binding item into a slot created for another kind"
            );
        }
        item.attach(self.id)?;
        item.get().bind(&mut self.view);
        self.item = Some(item);
        Ok(())
    }

    /// Releases the bound item and clears the dispatch closures.
    pub fn unbind(&mut self) -> Result<ItemRef<V>> {
        let Some(item) = self.item.take() else {
            return Err(Error::SlotNotBound(self.id));
        };
        item.get().unbind(&mut self.view);
        self.on_click = None;
        self.on_long_click = None;
        item.detach(self.id);
        Ok(item)
    }

    /// Gives the bound item a chance to clear transient state the host could not recycle.
    pub fn failed_to_recycle(&mut self) -> bool {
        match &self.item {
            Some(item) => item.get().on_failed_to_recycle(&mut self.view),
            None => false,
        }
    }

    pub fn set_on_click(&mut self, dispatch: Option<ClickDispatch<V>>) {
        self.on_click = dispatch;
    }

    pub fn set_on_long_click(&mut self, dispatch: Option<LongClickDispatch<V>>) {
        self.on_long_click = dispatch;
    }

    /// Delivers a click to the installed dispatch.
    ///
    /// Returns `false` if the slot is unbound or nothing is installed.
    pub fn click(&self) -> bool {
        match (&self.item, &self.on_click) {
            (Some(item), Some(dispatch)) => {
                dispatch(item);
                true
            }
            _ => false,
        }
    }

    /// Delivers a long click; returns whether any listener consumed it.
    pub fn long_click(&self) -> bool {
        match (&self.item, &self.on_long_click) {
            (Some(item), Some(dispatch)) => dispatch(item),
            _ => false,
        }
    }
}

impl<V: 'static> fmt::Debug for Slot<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("id", &self.id)
            .field("view_type", &self.view_type)
            .field("item", &self.item)
            .finish_non_exhaustive()
    }
}
