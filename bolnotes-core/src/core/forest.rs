//! Arena-backed outline forest.
//!
//! Every field lives in a slot of a [`Forest`] and is addressed by a
//! generational [`FieldId`]. Each field carries four links:
//!
//! - `parent`: set on *every* child, not only the first one;
//! - `child`: the parent's first child;
//! - `previous` / `next`: the sibling chain.
//!
//! All structural edits funnel through one relocation routine
//! ([`Forest::place`]) which validates the target before touching any link,
//! so a rejected edit never leaves the forest half-modified.
//!
//! A field is *linked* when it has a position: it is the forest head, or it
//! has a parent or a previous sibling. Fields created with [`Forest::create`]
//! start unlinked and may carry a subtree of their own before being placed.

use log::{debug, warn};
use serde::Serialize;
use std::fmt;

use crate::core::delete::{DestroyResult, DestroyScope};
use crate::core::field::{FieldKind, FieldValue, Timestamp};
use crate::{BolnotesError, Result};

/// Stable handle to a field in a [`Forest`].
///
/// The generation changes every time a slot is reused, so a handle to a
/// destroyed field never resolves to whatever replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FieldId {
    index: u32,
    generation: u32,
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// One of the four links a field carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Relation {
    Parent,
    Child,
    Previous,
    Next,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Parent => "parent",
            Self::Child => "child",
            Self::Previous => "previous",
            Self::Next => "next",
        };
        f.write_str(name)
    }
}

/// The first disagreement between a field's links and an observed copy of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldMismatch {
    pub relation: Relation,
    /// What the forest holds.
    pub expected: Option<FieldId>,
    /// What the caller observed.
    pub observed: Option<FieldId>,
}

/// Where [`Forest::place`] should put a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// First child of the given field; existing children follow it.
    FirstChildOf(FieldId),
    /// Last child of the given field.
    LastChildOf(FieldId),
    /// Immediately after the given linked field, under the same parent.
    After(FieldId),
    /// Immediately before the given linked field, under the same parent.
    Before(FieldId),
    /// The new head of the forest.
    FirstRoot,
    /// After the last top-level field.
    LastRoot,
}

/// A field: its value plus its four links.
#[derive(Debug, Clone)]
pub struct Field {
    value: FieldValue,
    parent: Option<FieldId>,
    child: Option<FieldId>,
    previous: Option<FieldId>,
    next: Option<FieldId>,
}

impl Field {
    fn new(value: FieldValue) -> Self {
        Self {
            value,
            parent: None,
            child: None,
            previous: None,
            next: None,
        }
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    pub fn kind(&self) -> FieldKind {
        self.value.kind()
    }

    pub fn parent(&self) -> Option<FieldId> {
        self.parent
    }

    pub fn child(&self) -> Option<FieldId> {
        self.child
    }

    pub fn previous(&self) -> Option<FieldId> {
        self.previous
    }

    pub fn next(&self) -> Option<FieldId> {
        self.next
    }

    fn link(&self, relation: Relation) -> Option<FieldId> {
        match relation {
            Relation::Parent => self.parent,
            Relation::Child => self.child,
            Relation::Previous => self.previous,
            Relation::Next => self.next,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    field: Option<Field>,
}

/// Owns every field of one outline and the head of its top-level chain.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    slots: Vec<Slot>,
    free: Vec<u32>,
    head: Option<FieldId>,
    live: usize,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live fields, linked or not.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// The first top-level field.
    pub fn head(&self) -> Option<FieldId> {
        self.head
    }

    /// Allocates an unlinked field holding `value`.
    pub fn create(&mut self, value: FieldValue) -> FieldId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.field = Some(Field::new(value));
            return FieldId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            field: Some(Field::new(value)),
        });
        FieldId {
            index,
            generation: 0,
        }
    }

    pub fn contains(&self, id: FieldId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: FieldId) -> Option<&Field> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.field.as_ref())
    }

    /// Like [`get`](Self::get) but reports a stale handle as an error.
    pub fn field(&self, id: FieldId) -> Result<&Field> {
        self.get(id).ok_or(BolnotesError::FieldNotFound(id))
    }

    fn field_mut(&mut self, id: FieldId) -> Result<&mut Field> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.field.as_mut())
            .ok_or(BolnotesError::FieldNotFound(id))
    }

    pub fn value(&self, id: FieldId) -> Result<&FieldValue> {
        Ok(&self.field(id)?.value)
    }

    /// Mutable access to a field's payload. Links are not reachable from here.
    pub fn value_mut(&mut self, id: FieldId) -> Result<&mut FieldValue> {
        Ok(&mut self.field_mut(id)?.value)
    }

    /// Replaces a field's payload (and therefore possibly its kind) in place.
    pub fn set_value(&mut self, id: FieldId, value: FieldValue) -> Result<FieldValue> {
        Ok(std::mem::replace(&mut self.field_mut(id)?.value, value))
    }

    /// Changes a field's kind without restructuring the tree.
    pub fn convert(&mut self, id: FieldId, kind: FieldKind, timestamp: Timestamp) -> Result<()> {
        let field = self.field_mut(id)?;
        let value = std::mem::replace(&mut field.value, FieldValue::Blank);
        field.value = value.into_kind(kind, timestamp);
        Ok(())
    }

    /// Returns `true` if the field has a position in the forest.
    pub fn is_linked(&self, id: FieldId) -> Result<bool> {
        let field = self.field(id)?;
        Ok(self.head == Some(id) || field.parent.is_some() || field.previous.is_some())
    }

    // ── traversal ───────────────────────────────────────────────────

    /// Iterates the top-level chain.
    pub fn roots(&self) -> Siblings<'_> {
        Siblings {
            forest: self,
            cursor: self.head,
        }
    }

    /// Iterates the direct children of `id` (empty for a stale handle).
    pub fn children(&self, id: FieldId) -> Siblings<'_> {
        Siblings {
            forest: self,
            cursor: self.get(id).and_then(|f| f.child),
        }
    }

    /// Pre-order walk of the whole forest yielding `(id, depth)`.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            forest: self,
            stack: self.head.map(|h| (h, 0)).into_iter().collect(),
            follow_siblings_of_start: true,
        }
    }

    /// Pre-order walk of `id` and its descendants, depths relative to `id`.
    pub fn walk_subtree(&self, id: FieldId) -> Walk<'_> {
        Walk {
            forest: self,
            stack: if self.contains(id) { vec![(id, 0)] } else { Vec::new() },
            follow_siblings_of_start: false,
        }
    }

    fn last_sibling(&self, first: FieldId) -> Result<FieldId> {
        let mut current = first;
        let mut steps = 0;
        while let Some(next) = self.field(current)?.next {
            current = next;
            steps += 1;
            if steps > self.slots.len() {
                return Err(BolnotesError::Consistency(format!(
                    "sibling chain starting at {first} loops"
                )));
            }
        }
        Ok(current)
    }

    /// Number of parent hops from `id` to the top level.
    pub fn depth(&self, id: FieldId) -> Result<usize> {
        let mut depth = 0;
        let mut current = self.field(id)?.parent;
        while let Some(parent) = current {
            depth += 1;
            if depth > self.slots.len() {
                return Err(BolnotesError::Consistency(format!(
                    "ancestor chain of {id} loops"
                )));
            }
            current = self.field(parent)?.parent;
        }
        Ok(depth)
    }

    /// `true` if the field has a parent and no previous sibling.
    pub fn is_first_child(&self, id: FieldId) -> Result<bool> {
        let field = self.field(id)?;
        Ok(field.previous.is_none() && field.parent.is_some())
    }

    /// `true` if neither the field nor any of its ancestors has a next sibling.
    pub fn is_last_in_document(&self, id: FieldId) -> Result<bool> {
        let mut current = Some(id);
        let mut steps = 0;
        while let Some(cursor) = current {
            let field = self.field(cursor)?;
            if field.next.is_some() {
                return Ok(false);
            }
            current = field.parent;
            steps += 1;
            if steps > self.slots.len() {
                return Err(BolnotesError::Consistency(format!(
                    "ancestor chain of {id} loops"
                )));
            }
        }
        Ok(true)
    }

    /// `true` if `candidate` is `id` itself or lies inside `id`'s subtree.
    pub fn is_within(&self, candidate: FieldId, id: FieldId) -> Result<bool> {
        let mut current = Some(candidate);
        let mut steps = 0;
        while let Some(cursor) = current {
            if cursor == id {
                return Ok(true);
            }
            current = self.field(cursor)?.parent;
            steps += 1;
            if steps > self.slots.len() {
                return Err(BolnotesError::Consistency(format!(
                    "ancestor chain of {candidate} loops"
                )));
            }
        }
        Ok(false)
    }

    // ── passive link writes ─────────────────────────────────────────
    //
    // These change exactly one pointer and repair nothing. Callers are
    // responsible for writing the reciprocal side themselves.

    pub(crate) fn set_parent_passive(&mut self, id: FieldId, parent: Option<FieldId>) -> Result<()> {
        self.field_mut(id)?.parent = parent;
        Ok(())
    }

    pub(crate) fn set_child_passive(&mut self, id: FieldId, child: Option<FieldId>) -> Result<()> {
        self.field_mut(id)?.child = child;
        Ok(())
    }

    pub(crate) fn set_previous_passive(
        &mut self,
        id: FieldId,
        previous: Option<FieldId>,
    ) -> Result<()> {
        self.field_mut(id)?.previous = previous;
        Ok(())
    }

    pub(crate) fn set_next_passive(&mut self, id: FieldId, next: Option<FieldId>) -> Result<()> {
        self.field_mut(id)?.next = next;
        Ok(())
    }

    pub(crate) fn set_head_passive(&mut self, head: Option<FieldId>) {
        self.head = head;
    }

    // ── structural primitives (no validation) ───────────────────────

    /// Removes `id` from its position, closing the gap. Its subtree stays attached to it.
    fn unlink(&mut self, id: FieldId) -> Result<()> {
        let (parent, previous, next) = {
            let field = self.field(id)?;
            (field.parent, field.previous, field.next)
        };
        match previous {
            Some(prev) => self.set_next_passive(prev, next)?,
            None => match parent {
                Some(parent) => self.set_child_passive(parent, next)?,
                None if self.head == Some(id) => self.head = next,
                None => {}
            },
        }
        if let Some(next) = next {
            self.set_previous_passive(next, previous)?;
        }
        let field = self.field_mut(id)?;
        field.parent = None;
        field.previous = None;
        field.next = None;
        Ok(())
    }

    fn link_after(&mut self, anchor: FieldId, id: FieldId) -> Result<()> {
        let (parent, next) = {
            let field = self.field(anchor)?;
            (field.parent, field.next)
        };
        {
            let field = self.field_mut(id)?;
            field.parent = parent;
            field.previous = Some(anchor);
            field.next = next;
        }
        self.set_next_passive(anchor, Some(id))?;
        if let Some(next) = next {
            self.set_previous_passive(next, Some(id))?;
        }
        Ok(())
    }

    fn link_before(&mut self, anchor: FieldId, id: FieldId) -> Result<()> {
        let (parent, previous) = {
            let field = self.field(anchor)?;
            (field.parent, field.previous)
        };
        {
            let field = self.field_mut(id)?;
            field.parent = parent;
            field.previous = previous;
            field.next = Some(anchor);
        }
        self.set_previous_passive(anchor, Some(id))?;
        match previous {
            Some(prev) => self.set_next_passive(prev, Some(id))?,
            None => match parent {
                Some(parent) => self.set_child_passive(parent, Some(id))?,
                None => self.head = Some(id),
            },
        }
        Ok(())
    }

    fn link_first_child(&mut self, parent: FieldId, id: FieldId) -> Result<()> {
        let old_first = self.field(parent)?.child;
        {
            let field = self.field_mut(id)?;
            field.parent = Some(parent);
            field.previous = None;
            field.next = old_first;
        }
        if let Some(old_first) = old_first {
            self.set_previous_passive(old_first, Some(id))?;
        }
        self.set_child_passive(parent, Some(id))
    }

    // ── validated relocation ────────────────────────────────────────

    /// Moves `id` (with its subtree) to `placement`.
    ///
    /// Every check runs before the first link changes.
    ///
    /// # Errors
    ///
    /// - [`BolnotesError::FieldNotFound`] for a stale handle.
    /// - [`BolnotesError::Consistency`] if the move would link a field to
    ///   itself or put it inside its own subtree.
    /// - [`BolnotesError::InvalidMove`] if a sibling anchor has no position.
    pub fn place(&mut self, id: FieldId, placement: Placement) -> Result<()> {
        self.field(id)?;
        let anchor = match placement {
            Placement::FirstChildOf(anchor)
            | Placement::LastChildOf(anchor)
            | Placement::After(anchor)
            | Placement::Before(anchor) => Some(anchor),
            Placement::FirstRoot | Placement::LastRoot => None,
        };
        if let Some(anchor) = anchor {
            self.field(anchor)?;
            if anchor == id {
                warn!("rejected {placement:?}: {id} would link to itself");
                return Err(BolnotesError::Consistency(format!(
                    "{id} cannot be linked to itself"
                )));
            }
            if self.is_within(anchor, id)? {
                warn!("rejected {placement:?}: {id} would become its own ancestor");
                return Err(BolnotesError::Consistency(format!(
                    "moving {id} next to or under {anchor} would make it its own ancestor"
                )));
            }
        }
        if let Placement::After(anchor) | Placement::Before(anchor) = placement {
            if !self.is_linked(anchor)? {
                return Err(BolnotesError::InvalidMove(format!(
                    "{anchor} has no position in the outline"
                )));
            }
        }

        self.unlink(id)?;
        match placement {
            Placement::FirstChildOf(parent) => self.link_first_child(parent, id),
            Placement::LastChildOf(parent) => match self.field(parent)?.child {
                Some(first) => {
                    let last = self.last_sibling(first)?;
                    self.link_after(last, id)
                }
                None => self.link_first_child(parent, id),
            },
            Placement::After(anchor) => self.link_after(anchor, id),
            Placement::Before(anchor) => self.link_before(anchor, id),
            Placement::FirstRoot => match self.head {
                Some(head) => self.link_before(head, id),
                None => {
                    self.head = Some(id);
                    Ok(())
                }
            },
            Placement::LastRoot => match self.head {
                Some(head) => {
                    let last = self.last_sibling(head)?;
                    self.link_after(last, id)
                }
                None => {
                    self.head = Some(id);
                    Ok(())
                }
            },
        }
    }

    /// Removes `id` (with its subtree) from its position, leaving it unlinked.
    pub fn detach(&mut self, id: FieldId) -> Result<()> {
        self.field(id)?;
        self.unlink(id)
    }

    // ── self-repairing setters ──────────────────────────────────────

    /// Makes `parent` the parent of `id`, or detaches `id` when `None`.
    ///
    /// With `Some`, `id` becomes the first child of `parent` and the
    /// previous children follow it. Nothing happens if `parent.child` is
    /// already `id`.
    pub fn set_parent(&mut self, id: FieldId, parent: Option<FieldId>) -> Result<()> {
        match parent {
            Some(parent) => {
                if self.field(parent)?.child == Some(id) {
                    return Ok(());
                }
                self.place(id, Placement::FirstChildOf(parent))
            }
            None => {
                if self.field(id)?.parent.is_some() {
                    self.detach(id)?;
                }
                Ok(())
            }
        }
    }

    /// Makes `child` the first child of `id`, or detaches the current first
    /// child when `None`.
    pub fn set_child(&mut self, id: FieldId, child: Option<FieldId>) -> Result<()> {
        match child {
            Some(child) => self.set_parent(child, Some(id)),
            None => match self.field(id)?.child {
                Some(first) => self.detach(first),
                None => Ok(()),
            },
        }
    }

    /// Places `next` immediately after `id`, or detaches the current next
    /// sibling when `None`.
    pub fn set_next(&mut self, id: FieldId, next: Option<FieldId>) -> Result<()> {
        match next {
            Some(next) => {
                if self.field(id)?.next == Some(next) {
                    return Ok(());
                }
                self.place(next, Placement::After(id))
            }
            None => match self.field(id)?.next {
                Some(next) => self.detach(next),
                None => Ok(()),
            },
        }
    }

    /// Places `id` immediately after `previous`, or detaches `id` when `None`.
    pub fn set_previous(&mut self, id: FieldId, previous: Option<FieldId>) -> Result<()> {
        match previous {
            Some(previous) => self.set_next(previous, Some(id)),
            None => {
                if self.field(id)?.previous.is_some() {
                    self.detach(id)?;
                }
                Ok(())
            }
        }
    }

    // ── copy / destroy ──────────────────────────────────────────────

    /// Creates a copy of `id`'s value.
    ///
    /// With `replace_in_place` the copy takes over `id`'s position and
    /// children, and `id` is left unlinked and childless. Otherwise the copy
    /// is unlinked.
    pub fn duplicate(&mut self, id: FieldId, replace_in_place: bool) -> Result<FieldId> {
        let value = self.field(id)?.value.clone();
        let copy = self.create(value);
        if !replace_in_place {
            return Ok(copy);
        }

        if self.is_linked(id)? {
            self.link_before(id, copy)?;
        }
        let first_child = self.field(id)?.child;
        self.set_child_passive(copy, first_child)?;
        self.set_child_passive(id, None)?;
        let mut cursor = first_child;
        while let Some(child) = cursor {
            self.set_parent_passive(child, Some(copy))?;
            cursor = self.field(child)?.next;
        }
        self.unlink(id)?;
        Ok(copy)
    }

    /// Destroys `id` and, depending on `scope`, its children and following
    /// siblings.
    ///
    /// Children that are not destroyed are promoted into `id`'s position,
    /// keeping their order. The field's own subtree is handled before its
    /// following siblings.
    pub fn destroy(&mut self, id: FieldId, scope: DestroyScope) -> Result<DestroyResult> {
        self.field(id)?;
        let tail: Vec<FieldId> = if scope.siblings_after {
            let mut tail = Vec::new();
            let mut cursor = self.field(id)?.next;
            while let Some(next) = cursor {
                tail.push(next);
                cursor = self.field(next)?.next;
            }
            tail
        } else {
            Vec::new()
        };

        let mut result = DestroyResult::default();
        self.destroy_one(id, scope.children, &mut result)?;
        for sibling in tail {
            self.destroy_one(sibling, scope.children, &mut result)?;
        }
        debug!(
            "destroyed {} field(s), {} affected",
            result.destroyed_count,
            result.affected_ids.len()
        );
        Ok(result)
    }

    fn destroy_one(
        &mut self,
        id: FieldId,
        with_children: bool,
        result: &mut DestroyResult,
    ) -> Result<()> {
        let children: Vec<FieldId> = self.children(id).collect();
        if with_children {
            // Leaves first: reverse pre-order puts every child before its parent.
            let subtree: Vec<FieldId> = self.walk_subtree(id).map(|(f, _)| f).skip(1).collect();
            for descendant in subtree.into_iter().rev() {
                self.release(descendant)?;
                result.record_destroyed(descendant);
            }
            self.set_child_passive(id, None)?;
        } else {
            let linked = self.is_linked(id)?;
            for child in children {
                self.unlink(child)?;
                if linked {
                    self.link_before(id, child)?;
                }
                result.affected_ids.push(child);
            }
        }
        self.unlink(id)?;
        self.release(id)?;
        result.record_destroyed(id);
        Ok(())
    }

    /// Frees a slot. Links into the slot must already be gone.
    fn release(&mut self, id: FieldId) -> Result<()> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation && slot.field.is_some())
            .ok_or(BolnotesError::FieldNotFound(id))?;
        slot.field = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Ok(())
    }

    // ── consistency ─────────────────────────────────────────────────

    /// Compares `reference`'s links against an externally observed copy.
    ///
    /// Relations are checked in the order parent, child, previous, next;
    /// the first disagreement is returned.
    pub fn check_field_consistency(
        &self,
        reference: FieldId,
        observed_parent: Option<FieldId>,
        observed_child: Option<FieldId>,
        observed_previous: Option<FieldId>,
        observed_next: Option<FieldId>,
    ) -> Result<Option<FieldMismatch>> {
        let field = self.field(reference)?;
        let observed = [
            (Relation::Parent, observed_parent),
            (Relation::Child, observed_child),
            (Relation::Previous, observed_previous),
            (Relation::Next, observed_next),
        ];
        Ok(observed.into_iter().find_map(|(relation, observed)| {
            let expected = field.link(relation);
            (expected != observed).then_some(FieldMismatch {
                relation,
                expected,
                observed,
            })
        }))
    }

    /// Audits every live field against the link invariants.
    ///
    /// # Errors
    ///
    /// Returns [`BolnotesError::Consistency`] describing the first violation.
    pub fn verify(&self) -> Result<()> {
        let broken = |msg: String| Err(BolnotesError::Consistency(msg));

        if let Some(head) = self.head {
            let field = match self.get(head) {
                Some(field) => field,
                None => return broken(format!("head {head} is not a live field")),
            };
            if field.parent.is_some() || field.previous.is_some() {
                return broken(format!("head {head} has a parent or previous sibling"));
            }
        }

        for (index, slot) in self.slots.iter().enumerate() {
            let Some(field) = slot.field.as_ref() else {
                continue;
            };
            let id = FieldId {
                index: index as u32,
                generation: slot.generation,
            };
            for relation in [
                Relation::Parent,
                Relation::Child,
                Relation::Previous,
                Relation::Next,
            ] {
                if let Some(target) = field.link(relation) {
                    if target == id {
                        return broken(format!("{id} is its own {relation}"));
                    }
                    if !self.contains(target) {
                        return broken(format!("{relation} of {id} is stale ({target})"));
                    }
                }
            }
            if let Some(child) = field.child {
                if let Some(c) = self.get(child) {
                    if c.parent != Some(id) || c.previous.is_some() {
                        return broken(format!("first child {child} of {id} does not point back"));
                    }
                }
            }
            if let Some(next) = field.next {
                if let Some(n) = self.get(next) {
                    if n.previous != Some(id) {
                        return broken(format!("next {next} of {id} does not point back"));
                    }
                    if n.parent != field.parent {
                        return broken(format!("siblings {id} and {next} have different parents"));
                    }
                }
            }
            if let Some(previous) = field.previous {
                if self.get(previous).and_then(|p| p.next) != Some(id) {
                    return broken(format!("previous {previous} of {id} does not point back"));
                }
            } else if let Some(parent) = field.parent {
                if self.get(parent).and_then(|p| p.child) != Some(id) {
                    return broken(format!("parent {parent} does not list {id} as first child"));
                }
            }
            // Bounded ancestor walk catches parent cycles.
            self.depth(id)?;
        }

        // Sibling chains are acyclic if every linked field is reached once.
        let mut seen = vec![false; self.slots.len()];
        let mut budget = self.live;
        let mut stack: Vec<FieldId> = self.head.into_iter().collect();
        while let Some(id) = stack.pop() {
            if seen[id.index as usize] {
                return broken(format!("{id} is reachable twice"));
            }
            seen[id.index as usize] = true;
            if budget == 0 {
                return broken("more reachable fields than live fields".to_string());
            }
            budget -= 1;
            let field = self.field(id)?;
            stack.extend(field.next);
            stack.extend(field.child);
        }
        Ok(())
    }
}

/// Iterator over a sibling chain.
pub struct Siblings<'a> {
    forest: &'a Forest,
    cursor: Option<FieldId>,
}

impl Iterator for Siblings<'_> {
    type Item = FieldId;

    fn next(&mut self) -> Option<FieldId> {
        let current = self.cursor?;
        self.cursor = self.forest.get(current).and_then(|f| f.next);
        Some(current)
    }
}

/// Pre-order (parent, children, then next sibling) iterator yielding `(id, depth)`.
pub struct Walk<'a> {
    forest: &'a Forest,
    stack: Vec<(FieldId, usize)>,
    follow_siblings_of_start: bool,
}

impl Iterator for Walk<'_> {
    type Item = (FieldId, usize);

    fn next(&mut self) -> Option<(FieldId, usize)> {
        let (id, depth) = self.stack.pop()?;
        if let Some(field) = self.forest.get(id) {
            if depth > 0 || self.follow_siblings_of_start {
                if let Some(next) = field.next {
                    self.stack.push((next, depth));
                }
            }
            if let Some(child) = field.child {
                self.stack.push((child, depth + 1));
            }
        }
        Some((id, depth))
    }
}
