//! Runtime frames.
//!
//! A frame is an append-only list of value cells plus a shared link to the
//! frame it was created in.  There is no lookup by name here: the resolver
//! already turned every local reference into a `(depth, slot)` pair, and
//! cells are appended in the same order the resolver handed out slots.

use std::cell::RefCell;
use std::rc::Rc;

use log::trace;

use crate::error::RuntimeError;
use crate::value::Value;

/// Shared, interior-mutable handle to a frame.  Closures hold these, so a
/// frame lives as long as any function that captured it.
pub type Frame = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    values: Vec<Value>,
    enclosing: Option<Frame>,
}

impl Environment {
    pub fn new(enclosing: Option<Frame>) -> Self {
        Environment {
            values: Vec::new(),
            enclosing,
        }
    }

    /// Wrap a fresh frame chained to `enclosing` in a shareable handle.
    pub fn frame(enclosing: Option<Frame>) -> Frame {
        Rc::new(RefCell::new(Self::new(enclosing)))
    }

    /// Append a cell and return its slot index.
    pub fn define(&mut self, value: Value) -> usize {
        self.values.push(value);
        self.values.len() - 1
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Read slot `slot` of the frame `depth` hops out from `frame`.
    pub fn get_at(frame: &Frame, depth: usize, slot: usize) -> Result<Value, RuntimeError> {
        let target = Self::ancestor(frame, depth)?;
        let value = target
            .borrow()
            .values
            .get(slot)
            .cloned()
            .ok_or(RuntimeError::InvalidSlot { depth, slot });

        trace!("get_at({}, {}) -> {:?}", depth, slot, value);

        value
    }

    /// Overwrite slot `slot` of the frame `depth` hops out from `frame`.
    pub fn assign_at(
        frame: &Frame,
        depth: usize,
        slot: usize,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let target = Self::ancestor(frame, depth)?;
        let mut target = target.borrow_mut();

        match target.values.get_mut(slot) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(RuntimeError::InvalidSlot { depth, slot }),
        }
    }

    /// Walk `depth` enclosing links.
    fn ancestor(frame: &Frame, depth: usize) -> Result<Frame, RuntimeError> {
        let mut current: Frame = Rc::clone(frame);

        for _ in 0..depth {
            let next = current
                .borrow()
                .enclosing
                .clone()
                .ok_or(RuntimeError::InvalidSlot { depth, slot: 0 })?;
            current = next;
        }

        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_appended_in_order() {
        let mut env = Environment::new(None);

        assert_eq!(env.define(Value::Number(1.0)), 0);
        assert_eq!(env.define(Value::Number(2.0)), 1);
        assert_eq!(env.len(), 2);
    }

    #[test]
    fn depth_walks_enclosing_links() {
        let outer = Environment::frame(None);
        outer.borrow_mut().define(Value::String("outer".into()));

        let inner = Environment::frame(Some(Rc::clone(&outer)));
        inner.borrow_mut().define(Value::String("inner".into()));

        assert_eq!(
            Environment::get_at(&inner, 0, 0).unwrap(),
            Value::String("inner".into())
        );
        assert_eq!(
            Environment::get_at(&inner, 1, 0).unwrap(),
            Value::String("outer".into())
        );
    }

    #[test]
    fn assignment_is_visible_through_every_handle() {
        let shared = Environment::frame(None);
        shared.borrow_mut().define(Value::Number(0.0));

        let a = Environment::frame(Some(Rc::clone(&shared)));
        let b = Environment::frame(Some(Rc::clone(&shared)));

        Environment::assign_at(&a, 1, 0, Value::Number(42.0)).unwrap();

        assert_eq!(Environment::get_at(&b, 1, 0).unwrap(), Value::Number(42.0));
    }

    #[test]
    fn bad_addresses_are_errors_not_panics() {
        let frame = Environment::frame(None);

        assert_eq!(
            Environment::get_at(&frame, 0, 3),
            Err(RuntimeError::InvalidSlot { depth: 0, slot: 3 })
        );
        assert!(Environment::get_at(&frame, 2, 0).is_err());
    }
}
